//! YAML metadata loading and normalization.
//!
//! Source layout:
//!
//! ```text
//! functions.yaml        category -> function name -> definition
//! solvers.yaml          solver name -> definition
//! function_types.yaml   function name -> type config name -> [types]
//! solver_types.yaml     solver name -> type config name -> [types]
//! ```
//!
//! Mappings are deserialized into [`IndexMap`]s so declaration order survives
//! loading. Order is semantically meaningful: it decides the order of every
//! generated artifact and the order in which new identifiers are assigned.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::model::{
    to_snake_case, ArgumentDefinition, FunctionDefinition, MetadataModel, PortDefinition,
    SolverDefinition, TypeConfigs,
};
use crate::pack::TypeTag;

/// Errors raised while loading metadata.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A metadata file could not be read.
    #[error("cannot read metadata file {}: {source}", .path.display())]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A metadata file is not valid YAML or does not have the expected shape.
    #[error("{origin}: {source}")]
    Yaml {
        /// File path or other description of the source.
        origin: String,
        /// Underlying parse error.
        #[source]
        source: serde_yaml::Error,
    },

    /// The metadata parsed but is inconsistent.
    #[error("{origin}: {message}")]
    Invalid {
        /// File path or other description of the source.
        origin: String,
        /// What is wrong.
        message: String,
    },
}

/// Locations of the four metadata files.
#[derive(Debug, Clone)]
pub struct MetadataSources {
    /// Function definitions. Required.
    pub functions: PathBuf,
    /// Solver definitions. Required.
    pub solvers: PathBuf,
    /// Function type configurations. Optional; a missing file means none.
    pub function_types: PathBuf,
    /// Solver type configurations. Optional; a missing file means none.
    pub solver_types: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawArgument {
    #[serde(rename = "type")]
    type_: TypeTag,
    #[serde(default)]
    default: Option<serde_yaml::Value>,
    #[serde(default)]
    doc: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawPort {
    #[serde(default)]
    doc: String,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    variadic: bool,
}

#[derive(Debug, Deserialize)]
struct RawOverload {
    #[serde(default)]
    arguments: Option<IndexMap<String, RawArgument>>,
}

#[derive(Debug, Deserialize)]
struct RawFunction {
    #[serde(default)]
    snake_name: Option<String>,
    #[serde(default)]
    doc: String,
    #[serde(default)]
    inputs: IndexMap<String, Option<RawPort>>,
    #[serde(default)]
    arguments: Option<IndexMap<String, RawArgument>>,
    #[serde(default)]
    outputs: IndexMap<String, Option<RawPort>>,
    #[serde(default)]
    overloads: Vec<RawOverload>,
}

#[derive(Debug, Deserialize)]
struct RawSolver {
    #[serde(default)]
    snake_name: Option<String>,
    #[serde(default)]
    doc: String,
    #[serde(default)]
    arguments: IndexMap<String, RawArgument>,
}

type RawFunctions = IndexMap<String, Option<IndexMap<String, RawFunction>>>;
type RawSolvers = IndexMap<String, RawSolver>;
type RawTypeTable = IndexMap<String, TypeConfigs>;

/// Loads and normalizes the complete metadata model from disk.
///
/// # Errors
///
/// Returns an error if a required file is missing or unreadable, any file is
/// malformed, or the definitions are inconsistent.
pub fn load_model(sources: &MetadataSources) -> Result<MetadataModel, LoadError> {
    let functions = read_required(&sources.functions)?;
    let solvers = read_required(&sources.solvers)?;
    let function_types = read_optional(&sources.function_types)?;
    let solver_types = read_optional(&sources.solver_types)?;

    build_model(
        Source::new(&sources.functions, &functions),
        Source::new(&sources.solvers, &solvers),
        Source::new(&sources.function_types, &function_types),
        Source::new(&sources.solver_types, &solver_types),
    )
}

/// One metadata document together with a description of where it came from.
#[derive(Debug, Clone, Copy)]
pub struct Source<'a> {
    origin: &'a Path,
    text: &'a str,
}

impl<'a> Source<'a> {
    /// Wraps a document read from `origin`.
    #[must_use]
    pub fn new(origin: &'a Path, text: &'a str) -> Self {
        Self { origin, text }
    }

    fn origin(&self) -> String {
        self.origin.display().to_string()
    }

    fn parse<T: DeserializeOwned + Default>(&self) -> Result<T, LoadError> {
        if is_blank(self.text) {
            return Ok(T::default());
        }
        serde_yaml::from_str(self.text).map_err(|source| LoadError::Yaml {
            origin: self.origin(),
            source,
        })
    }
}

/// Builds a [`MetadataModel`] from already-read documents.
///
/// # Errors
///
/// Returns an error if any document is malformed or a function name is
/// declared under more than one category.
pub fn build_model(
    functions: Source<'_>,
    solvers: Source<'_>,
    function_types: Source<'_>,
    solver_types: Source<'_>,
) -> Result<MetadataModel, LoadError> {
    let raw_functions: RawFunctions = functions.parse()?;
    let raw_solvers: RawSolvers = solvers.parse()?;
    let function_table: RawTypeTable = function_types.parse()?;
    let solver_table: RawTypeTable = solver_types.parse()?;
    check_config_names(&function_types, &function_table)?;
    check_config_names(&solver_types, &solver_table)?;

    let mut model = MetadataModel::default();
    let mut category_of: IndexMap<String, String> = IndexMap::new();

    for (category, entries) in raw_functions {
        for (name, raw) in entries.unwrap_or_default() {
            if let Some(previous) = category_of.insert(name.clone(), category.clone()) {
                return Err(LoadError::Invalid {
                    origin: functions.origin(),
                    message: format!(
                        "function `{name}` is declared in both `{previous}` and `{category}`"
                    ),
                });
            }
            let type_configs = function_table.get(&name).cloned().unwrap_or_default();
            flatten_function(&functions, &category, &name, raw, type_configs, &mut model)?;
        }
    }

    for (name, raw) in raw_solvers {
        let type_configs = solver_table.get(&name).cloned().unwrap_or_default();
        model.solvers.push(SolverDefinition {
            snake_name: raw.snake_name.unwrap_or_else(|| to_snake_case(&name)),
            doc: raw.doc,
            arguments: convert_arguments(&solvers, &name, raw.arguments)?,
            type_configs,
            name,
        });
    }

    warn_unknown_entries(&function_types, &function_table, |name| {
        model.find_function(name).is_some()
    });
    warn_unknown_entries(&solver_types, &solver_table, |name| {
        model.find_solver(name).is_some()
    });

    Ok(model)
}

/// Expands one raw function into its primary definition plus one definition
/// per overload.
fn flatten_function(
    source: &Source<'_>,
    category: &str,
    name: &str,
    raw: RawFunction,
    type_configs: TypeConfigs,
    model: &mut MetadataModel,
) -> Result<(), LoadError> {
    let snake_name = raw.snake_name.unwrap_or_else(|| to_snake_case(name));
    let inputs = convert_ports(raw.inputs);
    let outputs = convert_ports(raw.outputs);

    let signatures =
        std::iter::once(raw.arguments).chain(raw.overloads.into_iter().map(|o| o.arguments));
    for (overload, arguments) in signatures.enumerate() {
        let declares_arguments = arguments.is_some();
        model.functions.push(FunctionDefinition {
            name: name.to_string(),
            snake_name: snake_name.clone(),
            category: category.to_string(),
            doc: raw.doc.clone(),
            overload,
            inputs: inputs.clone(),
            declares_arguments,
            arguments: convert_arguments(source, name, arguments.unwrap_or_default())?,
            outputs: outputs.clone(),
            type_configs: type_configs.clone(),
        });
    }
    Ok(())
}

fn convert_arguments(
    source: &Source<'_>,
    owner: &str,
    raw: IndexMap<String, RawArgument>,
) -> Result<Vec<ArgumentDefinition>, LoadError> {
    raw.into_iter()
        .map(|(name, arg)| {
            let default = arg
                .default
                .map(serde_json::to_value)
                .transpose()
                .map_err(|e| LoadError::Invalid {
                    origin: source.origin(),
                    message: format!("`{owner}.{name}`: unsupported default value: {e}"),
                })?;
            Ok(ArgumentDefinition {
                name,
                type_: arg.type_,
                default,
                doc: arg.doc,
            })
        })
        .collect()
}

fn convert_ports(raw: IndexMap<String, Option<RawPort>>) -> Vec<PortDefinition> {
    raw.into_iter()
        .map(|(name, port)| {
            let port = port.unwrap_or_default();
            PortDefinition {
                name,
                doc: port.doc,
                optional: port.optional,
                variadic: port.variadic,
            }
        })
        .collect()
}

/// Configuration names become output file names, so they must be a single
/// plain path component.
fn check_config_names(source: &Source<'_>, table: &RawTypeTable) -> Result<(), LoadError> {
    for (owner, configs) in table {
        for config in configs.keys() {
            let plain = !config.is_empty()
                && config != "."
                && config != ".."
                && !config.contains(['/', '\\']);
            if !plain {
                return Err(LoadError::Invalid {
                    origin: source.origin(),
                    message: format!(
                        "`{owner}`: type configuration name `{config}` is not a plain file name"
                    ),
                });
            }
        }
    }
    Ok(())
}

fn warn_unknown_entries(
    source: &Source<'_>,
    table: &RawTypeTable,
    is_known: impl Fn(&str) -> bool,
) {
    for name in table.keys().filter(|name| !is_known(name)) {
        tracing::warn!(
            origin = %source.origin(),
            name = %name,
            "type configuration refers to an undeclared definition"
        );
    }
}

fn read_required(path: &Path) -> Result<String, LoadError> {
    fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_optional(path: &Path) -> Result<String, LoadError> {
    if path.exists() {
        read_required(path)
    } else {
        tracing::debug!(path = %path.display(), "optional metadata file absent");
        Ok(String::new())
    }
}

/// Returns true if the document holds nothing but comments and whitespace.
pub(crate) fn is_blank(text: &str) -> bool {
    text.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#') || line == "---"
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FUNCTIONS: &str = r#"
Arithmetic:
  Add:
    doc: Elementwise addition.
    inputs:
      x: {doc: First operand.}
      y:
    arguments:
      x: {type: int64}
      y: {type: int64}
    outputs:
      z: {}
    overloads:
      - arguments:
          x: {type: float}
          y: {type: float}
Layer:
  BatchNormalization:
    snake_name: batch_norm
    arguments:
      axes: {type: repeated int64, default: [1]}
      eps: {type: float, default: 1.0e-05}
      batch_stat: {type: bool, default: true}
  Identity:
    inputs:
      x: {}
"#;

    const SOLVERS: &str = r#"
Sgd:
  doc: Stochastic gradient descent.
  arguments:
    lr: {type: float, default: 0.001}
Adam:
  arguments:
    alpha: {type: float}
"#;

    const FUNCTION_TYPES: &str = r#"
Add:
  float: [float]
  half: [Half]
Identity:
  float: [float]
"#;

    fn build(functions: &str, solvers: &str, types: &str) -> Result<MetadataModel, LoadError> {
        build_model(
            Source::new(Path::new("functions.yaml"), functions),
            Source::new(Path::new("solvers.yaml"), solvers),
            Source::new(Path::new("function_types.yaml"), types),
            Source::new(Path::new("solver_types.yaml"), ""),
        )
    }

    #[test]
    fn flattens_categories_and_overloads_in_order() {
        let model = build(FUNCTIONS, SOLVERS, FUNCTION_TYPES).unwrap();
        let names: Vec<(&str, usize)> = model
            .functions
            .iter()
            .map(|f| (f.name.as_str(), f.overload))
            .collect();
        assert_eq!(
            names,
            vec![
                ("Add", 0),
                ("Add", 1),
                ("BatchNormalization", 0),
                ("Identity", 0)
            ]
        );
        assert_eq!(model.functions[1].arguments[0].type_, TypeTag::Float);
        assert_eq!(model.functions[1].category, "Arithmetic");
    }

    #[test]
    fn resolves_defaults() {
        let model = build(FUNCTIONS, SOLVERS, FUNCTION_TYPES).unwrap();
        let add = model.find_function("Add").unwrap();
        assert_eq!(add.snake_name, "add");
        assert_eq!(add.inputs[1].name, "y");
        assert_eq!(add.inputs[1].doc, "");
        assert!(!add.inputs[1].optional);

        let bn = model.find_function("BatchNormalization").unwrap();
        assert_eq!(bn.snake_name, "batch_norm");
        assert_eq!(bn.arguments[0].default, Some(serde_json::json!([1])));
        assert_eq!(bn.arguments[2].default, Some(serde_json::json!(true)));
        assert!(bn.type_configs.is_empty());
    }

    #[test]
    fn attaches_type_configs_to_every_overload() {
        let model = build(FUNCTIONS, SOLVERS, FUNCTION_TYPES).unwrap();
        for add in model.functions.iter().filter(|f| f.name == "Add") {
            let configs: Vec<&str> = add.type_configs.keys().map(String::as_str).collect();
            assert_eq!(configs, vec!["float", "half"]);
        }
    }

    #[test]
    fn solvers_keep_declaration_order() {
        let model = build(FUNCTIONS, SOLVERS, "").unwrap();
        let names: Vec<&str> = model.solvers.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Sgd", "Adam"]);
        assert_eq!(model.solvers[0].snake_name, "sgd");
    }

    #[test]
    fn unknown_types_load_verbatim() {
        let src = "Misc:\n  Foo:\n    arguments:\n      w: {type: repeated float}\n";
        let model = build(src, "", "").unwrap();
        assert_eq!(
            model.functions[0].arguments[0].type_,
            TypeTag::Other("repeated float".into())
        );
    }

    #[test]
    fn rejects_name_declared_in_two_categories() {
        let src = "A:\n  Foo: {}\nB:\n  Foo: {}\n";
        let err = build(src, "", "").unwrap_err();
        assert!(matches!(err, LoadError::Invalid { .. }));
        assert!(err.to_string().contains("`Foo`"));
    }

    #[test]
    fn records_whether_an_argument_list_is_declared() {
        let src = r#"
Misc:
  Foo:
    arguments: {}
  Bar: {}
  Baz:
    overloads:
      - arguments: {}
"#;
        let model = build(src, "", "").unwrap();
        let declared: Vec<(&str, usize, bool)> = model
            .functions
            .iter()
            .map(|f| (f.name.as_str(), f.overload, f.declares_arguments))
            .collect();
        assert_eq!(
            declared,
            vec![
                ("Foo", 0, true),
                ("Bar", 0, false),
                ("Baz", 0, false),
                ("Baz", 1, true)
            ]
        );
        assert!(model.functions[0].arguments.is_empty());
    }

    #[test]
    fn rejects_type_config_names_that_are_not_file_names() {
        for bad in ["../escape", "a/b", "..", "\"\""] {
            let types = format!("Identity:\n  {bad}: [float]\n");
            let err = build(FUNCTIONS, SOLVERS, &types).unwrap_err();
            assert!(matches!(err, LoadError::Invalid { .. }), "{bad}");
            assert!(err.to_string().contains("not a plain file name"), "{bad}");
        }
    }

    #[test]
    fn malformed_yaml_reports_origin() {
        let err = build("Layer:\n  Affine: [unterminated", "", "").unwrap_err();
        assert!(err.to_string().starts_with("functions.yaml"));
    }

    #[test]
    fn comment_only_documents_are_empty() {
        assert!(is_blank("# header\n\n---\n"));
        let model = build("# nothing yet\n", "", "").unwrap();
        assert!(model.functions.is_empty());
    }

    #[test]
    fn load_model_reads_files_and_tolerates_missing_type_tables() {
        let dir = tempfile::tempdir().unwrap();
        let sources = MetadataSources {
            functions: dir.path().join("functions.yaml"),
            solvers: dir.path().join("solvers.yaml"),
            function_types: dir.path().join("function_types.yaml"),
            solver_types: dir.path().join("solver_types.yaml"),
        };
        fs::write(&sources.functions, FUNCTIONS).unwrap();
        fs::write(&sources.solvers, SOLVERS).unwrap();

        let model = load_model(&sources).unwrap();
        assert_eq!(model.functions.len(), 4);
        assert_eq!(model.solvers.len(), 2);
    }

    #[test]
    fn load_model_requires_function_file() {
        let dir = tempfile::tempdir().unwrap();
        let sources = MetadataSources {
            functions: dir.path().join("functions.yaml"),
            solvers: dir.path().join("solvers.yaml"),
            function_types: dir.path().join("function_types.yaml"),
            solver_types: dir.path().join("solver_types.yaml"),
        };
        let err = load_model(&sources).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
