//! Generator configuration.
//!
//! All paths are explicit: the generator never derives them from the location
//! of its own executable. A [`GeneratorConfig`] is built from a project root
//! with conventional defaults, optionally overridden by an `opgen.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use opgen_model::MetadataSources;
use serde::Deserialize;

use crate::error::Error;

/// Name of the optional configuration file looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "opgen.toml";

/// Resolved paths for one generation run.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Root of the project being generated into.
    pub project_root: PathBuf,
    /// Directory holding the `.hbs` templates.
    pub template_dir: PathBuf,
    /// Directory generated files are written under.
    pub output_dir: PathBuf,
    /// Metadata source files.
    pub metadata: MetadataSources,
    /// Committed identifier table.
    pub registry: PathBuf,
}

/// Overrides read from `opgen.toml`. Relative paths resolve against the
/// project root.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    template_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    registry: Option<PathBuf>,
    #[serde(default)]
    metadata: MetadataOverrides,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct MetadataOverrides {
    functions: Option<PathBuf>,
    solvers: Option<PathBuf>,
    function_types: Option<PathBuf>,
    solver_types: Option<PathBuf>,
}

impl GeneratorConfig {
    /// Returns the conventional layout under `root`:
    ///
    /// ```text
    /// <root>/templates/                     templates
    /// <root>/                               outputs
    /// <root>/metadata/functions.yaml        function definitions
    /// <root>/metadata/solvers.yaml          solver definitions
    /// <root>/metadata/function_types.yaml   function type configurations
    /// <root>/metadata/solver_types.yaml     solver type configurations
    /// <root>/metadata/function_order.yaml   committed identifier table
    /// ```
    #[must_use]
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let metadata_dir = root.join("metadata");
        Self {
            template_dir: root.join("templates"),
            output_dir: root.clone(),
            metadata: MetadataSources {
                functions: metadata_dir.join("functions.yaml"),
                solvers: metadata_dir.join("solvers.yaml"),
                function_types: metadata_dir.join("function_types.yaml"),
                solver_types: metadata_dir.join("solver_types.yaml"),
            },
            registry: metadata_dir.join("function_order.yaml"),
            project_root: root,
        }
    }

    /// Builds the configuration for `root`, applying overrides from
    /// `config_file` if given, or from `<root>/opgen.toml` if that exists.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named configuration file is missing,
    /// or any configuration file cannot be read or parsed.
    pub fn load(root: impl Into<PathBuf>, config_file: Option<&Path>) -> Result<Self, Error> {
        let mut config = Self::for_root(root);
        let path = match config_file {
            Some(path) => path.to_path_buf(),
            None => {
                let default = config.project_root.join(CONFIG_FILE_NAME);
                if !default.exists() {
                    return Ok(config);
                }
                default
            }
        };
        let text = fs::read_to_string(&path).map_err(Error::io(&path))?;
        config.apply_overrides(&path, &text)?;
        tracing::debug!(path = %path.display(), "applied generator configuration");
        Ok(config)
    }

    /// Applies the overrides in `text`, the contents of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if `text` is not a valid configuration document.
    pub fn apply_overrides(&mut self, path: &Path, text: &str) -> Result<(), Error> {
        let file: ConfigFile = toml::from_str(text).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })?;
        let root = self.project_root.clone();
        let resolve = |p: PathBuf| if p.is_absolute() { p } else { root.join(p) };

        if let Some(dir) = file.template_dir {
            self.template_dir = resolve(dir);
        }
        if let Some(dir) = file.output_dir {
            self.output_dir = resolve(dir);
        }
        if let Some(registry) = file.registry {
            self.registry = resolve(registry);
        }
        let m = file.metadata;
        if let Some(p) = m.functions {
            self.metadata.functions = resolve(p);
        }
        if let Some(p) = m.solvers {
            self.metadata.solvers = resolve(p);
        }
        if let Some(p) = m.function_types {
            self.metadata.function_types = resolve(p);
        }
        if let Some(p) = m.solver_types {
            self.metadata.solver_types = resolve(p);
        }
        Ok(())
    }

    /// Resolves an output path relative to the output directory.
    #[must_use]
    pub fn output_path(&self, relative: &str) -> PathBuf {
        self.output_dir.join(relative)
    }

    /// Resolves a template name relative to the template directory.
    #[must_use]
    pub fn template_path(&self, name: &str) -> PathBuf {
        self.template_dir.join(name)
    }
}
