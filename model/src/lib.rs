//! Function and solver metadata for the opgen code generator.
//!
//! The `opgen-model` crate loads the YAML description of every function
//! (operator) and solver (optimizer), normalizes it into a [`MetadataModel`],
//! and defines the binary pack-format codes of argument types.
//!
//! # Entry Point
//!
//! ```no_run
//! use std::path::PathBuf;
//! use opgen_model::{load_model, MetadataSources};
//!
//! let sources = MetadataSources {
//!     functions: PathBuf::from("metadata/functions.yaml"),
//!     solvers: PathBuf::from("metadata/solvers.yaml"),
//!     function_types: PathBuf::from("metadata/function_types.yaml"),
//!     solver_types: PathBuf::from("metadata/solver_types.yaml"),
//! };
//! let model = load_model(&sources).expect("metadata should load");
//! println!("{} functions, {} solvers", model.functions.len(), model.solvers.len());
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

pub mod loader;
pub mod model;
pub mod pack;

pub use loader::{build_model, load_model, LoadError, MetadataSources, Source};
pub use model::{
    to_snake_case, ArgumentDefinition, FunctionDefinition, MetadataModel, PortDefinition,
    SolverDefinition, TypeConfigs,
};
pub use pack::{pack_format, TypeTag};
