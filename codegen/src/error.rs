//! Error taxonomy for a generation run.
//!
//! Every variant is fatal to the run. Identifier conflicts and schema errors
//! are raised before anything is written; render failures are collected so
//! that the remaining artifacts still get written.

use std::fmt;
use std::path::PathBuf;

use opgen_model::LoadError;
use thiserror::Error;

use crate::artifact::ArtifactKind;

/// Boxed error from the template-rendering collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by the generator.
#[derive(Debug, Error)]
pub enum Error {
    /// An argument type has no pack-format code, so no fingerprint exists.
    #[error(
        "function `{function}`: argument `{argument}` has type `{type_name}`, \
         which has no pack format code"
    )]
    Schema {
        /// Function name.
        function: String,
        /// Argument name.
        argument: String,
        /// The unmapped type as written in metadata.
        type_name: String,
    },

    /// Two or more fingerprints share one persisted id.
    #[error("{}", ConflictList(.conflicts))]
    IdentifierConflict {
        /// Every conflicting id, in ascending order.
        conflicts: Vec<IdConflict>,
    },

    /// A function has no id because the registry was not reconciled first.
    #[error("function `{qualified_name}` has no id in the identifier registry")]
    Unregistered {
        /// Fingerprint of the function.
        qualified_name: String,
    },

    /// One or more artifacts failed to render.
    #[error("{}", FailureList(.0))]
    Render(Vec<RenderFailure>),

    /// A file could not be read or written.
    #[error("{}: {source}", .path.display())]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The metadata could not be loaded.
    #[error(transparent)]
    Metadata(#[from] LoadError),

    /// The persisted identifier table is malformed.
    #[error("{}: {message}", .path.display())]
    RegistryFormat {
        /// Registry file.
        path: PathBuf,
        /// What is wrong.
        message: String,
    },

    /// The generator configuration file is malformed.
    #[error("{}: {source}", .path.display())]
    Config {
        /// Configuration file.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Error {
        let path = path.into();
        move |source| Error::Io { path, source }
    }
}

/// One id claimed by more than one qualified name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdConflict {
    /// The duplicated id.
    pub id: u32,
    /// Every qualified name mapped to the id, in registry order.
    pub names: Vec<String>,
}

/// A template that failed to render.
#[derive(Debug, Error)]
#[error("{kind}: cannot render {}: {source}", .template.display())]
pub struct RenderFailure {
    /// Artifact kind being generated.
    pub kind: ArtifactKind,
    /// Template path.
    pub template: PathBuf,
    /// Cause reported by the renderer.
    #[source]
    pub source: BoxError,
}

struct ConflictList<'a>(&'a [IdConflict]);

impl fmt::Display for ConflictList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "duplicated function ids in the identifier registry:")?;
        for conflict in self.0 {
            writeln!(
                f,
                "  ID {} duplicated between [{}].",
                conflict.id,
                conflict.names.join(", ")
            )?;
        }
        write!(f, "Correct the ids in the registry file manually.")
    }
}

struct FailureList<'a>(&'a [RenderFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} template(s) failed to render:", self.0.len())?;
        for failure in self.0 {
            write!(f, "\n  {failure}")?;
        }
        Ok(())
    }
}
