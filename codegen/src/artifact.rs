//! Artifact kind → template and output path tables.
//!
//! Deterministic mappings from each kind of generated artifact to the view it
//! is rendered from and the files it produces. Template names are relative to
//! the configured template directory, outputs to the output directory.

use std::fmt;
use std::str::FromStr;

/// One category of generated output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtifactKind {
    /// Registration of every function and solver with its type configurations.
    Init,
    /// One instantiation unit per function type configuration.
    FunctionTypes,
    /// One instantiation unit per solver type configuration.
    SolverTypes,
    /// Version stamps.
    Version,
    /// Solver interface bindings.
    SolverInterface,
    /// Function interface bindings.
    FunctionInterface,
    /// Loader and saver utilities for serialized networks.
    SerializationUtils,
    /// Serialization schema for functions and solvers.
    Schema,
    /// Function factory keyed by persisted function id.
    FunctionFactory,
    /// Placeholder implementations for functions that have none yet.
    Skeleton,
}

impl ArtifactKind {
    /// Every artifact kind, in generation order.
    pub const ALL: [ArtifactKind; 10] = [
        ArtifactKind::Init,
        ArtifactKind::FunctionTypes,
        ArtifactKind::SolverTypes,
        ArtifactKind::Version,
        ArtifactKind::SolverInterface,
        ArtifactKind::FunctionInterface,
        ArtifactKind::SerializationUtils,
        ArtifactKind::Schema,
        ArtifactKind::FunctionFactory,
        ArtifactKind::Skeleton,
    ];

    /// Returns the kebab-case name used on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Init => "init",
            ArtifactKind::FunctionTypes => "function-types",
            ArtifactKind::SolverTypes => "solver-types",
            ArtifactKind::Version => "version",
            ArtifactKind::SolverInterface => "solver-interface",
            ArtifactKind::FunctionInterface => "function-interface",
            ArtifactKind::SerializationUtils => "serialization-utils",
            ArtifactKind::Schema => "schema",
            ArtifactKind::FunctionFactory => "function-factory",
            ArtifactKind::Skeleton => "skeleton",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArtifactKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = ArtifactKind::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown artifact kind `{s}` (expected one of: {})", known.join(", "))
            })
    }
}

/// The projection of the metadata model an artifact is rendered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    /// Functions grouped by category.
    Functions,
    /// Functions flattened, with per-argument pack codes and persisted ids.
    FunctionList,
    /// Solvers only.
    Solvers,
    /// Functions and solvers together.
    Combined,
    /// Functions supporting one type configuration; rendered once per configuration.
    FunctionsByTypeConfig,
    /// Solvers supporting one type configuration; rendered once per configuration.
    SolversByTypeConfig,
    /// The version string.
    Version,
}

impl ViewKind {
    /// Returns true if the view is rendered once per type configuration.
    #[must_use]
    pub fn is_per_type_config(self) -> bool {
        matches!(
            self,
            ViewKind::FunctionsByTypeConfig | ViewKind::SolversByTypeConfig
        )
    }
}

/// A template and the file it renders to.
///
/// Output paths may contain `{config}`, replaced by the type configuration
/// name for per-configuration views, or `{snake_name}` for skeletons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateTarget {
    /// Template file name, relative to the template directory.
    pub template: &'static str,
    /// Output path, relative to the output directory.
    pub output: &'static str,
}

/// Placeholder for the type configuration name in output paths.
pub const CONFIG_PLACEHOLDER: &str = "{config}";

/// Placeholder for the function's snake-case name in skeleton paths.
pub const SNAKE_NAME_PLACEHOLDER: &str = "{snake_name}";

/// Everything needed to produce one artifact kind.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactSpec {
    /// The artifact kind.
    pub kind: ArtifactKind,
    /// The view the templates are rendered with.
    pub view: ViewKind,
    /// Templates and their outputs.
    pub targets: &'static [TemplateTarget],
}

/// Table of every rendered artifact kind, in generation order.
///
/// [`ArtifactKind::Skeleton`] is absent: skeletons are produced by the
/// [`SkeletonSynthesizer`](crate::skeleton::SkeletonSynthesizer) from
/// [`SKELETON_TARGETS`].
pub const ARTIFACTS: &[ArtifactSpec] = &[
    ArtifactSpec {
        kind: ArtifactKind::Init,
        view: ViewKind::Combined,
        targets: &[
            TemplateTarget {
                template: "init.cpp.hbs",
                output: "src/init.cpp",
            },
        ],
    },
    ArtifactSpec {
        kind: ArtifactKind::FunctionTypes,
        view: ViewKind::FunctionsByTypeConfig,
        targets: &[
            TemplateTarget {
                template: "function_types.cpp.hbs",
                output: "src/function/types/{config}.cpp",
            },
        ],
    },
    ArtifactSpec {
        kind: ArtifactKind::SolverTypes,
        view: ViewKind::SolversByTypeConfig,
        targets: &[
            TemplateTarget {
                template: "solver_types.cpp.hbs",
                output: "src/solver/types/{config}.cpp",
            },
        ],
    },
    ArtifactSpec {
        kind: ArtifactKind::Version,
        view: ViewKind::Version,
        targets: &[
            TemplateTarget {
                template: "version.py.hbs",
                output: "bindings/python/_version.py",
            },
            TemplateTarget {
                template: "version.cpp.hbs",
                output: "src/version.cpp",
            },
            TemplateTarget {
                template: "requirements.txt.hbs",
                output: "doc/requirements.txt",
            },
        ],
    },
    ArtifactSpec {
        kind: ArtifactKind::SolverInterface,
        view: ViewKind::Solvers,
        targets: &[
            TemplateTarget {
                template: "solver.pyx.hbs",
                output: "bindings/python/solver.pyx",
            },
            TemplateTarget {
                template: "solver.pxd.hbs",
                output: "bindings/python/solver.pxd",
            },
        ],
    },
    ArtifactSpec {
        kind: ArtifactKind::FunctionInterface,
        view: ViewKind::Functions,
        targets: &[
            TemplateTarget {
                template: "function.pyx.hbs",
                output: "bindings/python/function.pyx",
            },
            TemplateTarget {
                template: "function.pxd.hbs",
                output: "bindings/python/function.pxd",
            },
            TemplateTarget {
                template: "function_bases.py.hbs",
                output: "bindings/python/function_bases.py",
            },
        ],
    },
    ArtifactSpec {
        kind: ArtifactKind::SerializationUtils,
        view: ViewKind::Functions,
        targets: &[
            TemplateTarget {
                template: "load_function.py.hbs",
                output: "bindings/python/utils/load_function.py",
            },
            TemplateTarget {
                template: "save_function.py.hbs",
                output: "bindings/python/utils/save_function.py",
            },
        ],
    },
    ArtifactSpec {
        kind: ArtifactKind::Schema,
        view: ViewKind::Combined,
        targets: &[
            TemplateTarget {
                template: "opgen.proto.hbs",
                output: "src/proto/opgen.proto",
            },
        ],
    },
    ArtifactSpec {
        kind: ArtifactKind::FunctionFactory,
        view: ViewKind::FunctionList,
        targets: &[
            TemplateTarget {
                template: "create_function.cpp.hbs",
                output: "src/utils/create_function.cpp",
            },
        ],
    },
];

/// Skeleton implementation files written for every function that lacks one.
pub const SKELETON_TARGETS: &[TemplateTarget] = &[
    TemplateTarget {
        template: "function_impl.cpp.hbs",
        output: "src/function/generic/{snake_name}.cpp",
    },
    TemplateTarget {
        template: "function_impl.hpp.hbs",
        output: "include/function/{snake_name}.hpp",
    },
];

/// Returns the table entry for `kind`, or `None` for kinds not rendered
/// through the table.
#[must_use]
pub fn artifact_spec(kind: ArtifactKind) -> Option<&'static ArtifactSpec> {
    ARTIFACTS.iter().find(|spec| spec.kind == kind)
}
