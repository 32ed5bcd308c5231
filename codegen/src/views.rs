//! Read-only projections of the metadata model handed to templates.
//!
//! A [`Snapshot`] is built once per run from the immutable model and the
//! reconciled registry. Every artifact's context is derived from that single
//! snapshot, so all artifacts of one run enumerate the same functions in the
//! same order: templates that cross-reference function names (bindings,
//! schema, loaders) always agree.

use opgen_model::{ArgumentDefinition, MetadataModel, PortDefinition, TypeConfigs};
use serde::Serialize;

use crate::artifact::ViewKind;
use crate::error::Error;
use crate::registry::{fingerprint, IdentifierRegistry};

/// Template view of one argument.
#[derive(Debug, Clone, Serialize)]
pub struct ArgumentView<'a> {
    /// Argument name.
    pub name: &'a str,
    /// Declared type name.
    #[serde(rename = "type")]
    pub type_name: &'a str,
    /// Pack-format code; `None` only for solver arguments of unmapped type.
    pub pack_format: Option<&'static str>,
    /// Default value, if any.
    pub default: Option<&'a serde_json::Value>,
    /// Documentation string.
    pub doc: &'a str,
}

impl<'a> ArgumentView<'a> {
    fn new(arg: &'a ArgumentDefinition) -> Self {
        Self {
            name: &arg.name,
            type_name: arg.type_.as_str(),
            pack_format: arg.type_.pack_format(),
            default: arg.default.as_ref(),
            doc: &arg.doc,
        }
    }
}

/// Template view of one type configuration.
#[derive(Debug, Clone, Serialize)]
pub struct TypeConfigView<'a> {
    /// Configuration name.
    pub name: &'a str,
    /// Concrete element types.
    pub types: &'a [String],
}

fn type_config_views(configs: &TypeConfigs) -> Vec<TypeConfigView<'_>> {
    configs
        .iter()
        .map(|(name, types)| TypeConfigView { name, types })
        .collect()
}

/// Template view of one function definition, including its persisted id.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionView<'a> {
    /// Function name.
    pub name: &'a str,
    /// Snake-case name.
    pub snake_name: &'a str,
    /// Category.
    pub category: &'a str,
    /// Documentation string.
    pub doc: &'a str,
    /// Overload position (0 for the primary definition).
    pub overload: usize,
    /// Fingerprint used as the registry key.
    pub qualified_name: String,
    /// Persisted id.
    pub id: u32,
    /// Concatenated pack-format codes of all arguments.
    pub pack_format: String,
    /// Inputs.
    pub inputs: &'a [PortDefinition],
    /// Arguments.
    pub arguments: Vec<ArgumentView<'a>>,
    /// Outputs.
    pub outputs: &'a [PortDefinition],
    /// Type configurations.
    pub type_configs: Vec<TypeConfigView<'a>>,
}

/// Template view of one solver definition.
#[derive(Debug, Clone, Serialize)]
pub struct SolverView<'a> {
    /// Solver name.
    pub name: &'a str,
    /// Snake-case name.
    pub snake_name: &'a str,
    /// Documentation string.
    pub doc: &'a str,
    /// Arguments.
    pub arguments: Vec<ArgumentView<'a>>,
    /// Type configurations.
    pub type_configs: Vec<TypeConfigView<'a>>,
}

#[derive(Serialize)]
struct CategoryView<'s, 'a> {
    name: &'a str,
    functions: Vec<&'s FunctionView<'a>>,
}

/// An item paired with the element types of one configuration.
#[derive(Serialize)]
struct Configured<'s, T> {
    #[serde(flatten)]
    item: &'s T,
    types: &'s [String],
}

#[derive(Serialize)]
struct FunctionsContext<'s, 'a> {
    functions: &'s [FunctionView<'a>],
    categories: Vec<CategoryView<'s, 'a>>,
}

#[derive(Serialize)]
struct FunctionListContext<'s, 'a> {
    functions: &'s [FunctionView<'a>],
    function_count: usize,
}

#[derive(Serialize)]
struct SolversContext<'s, 'a> {
    solvers: &'s [SolverView<'a>],
}

#[derive(Serialize)]
struct CombinedContext<'s, 'a> {
    functions: &'s [FunctionView<'a>],
    categories: Vec<CategoryView<'s, 'a>>,
    solvers: &'s [SolverView<'a>],
    function_type_configs: Vec<&'a str>,
    solver_type_configs: Vec<&'a str>,
}

#[derive(Serialize)]
struct FunctionTypeContext<'s, 'a> {
    type_config: &'a str,
    functions: Vec<Configured<'s, FunctionView<'a>>>,
}

#[derive(Serialize)]
struct SolverTypeContext<'s, 'a> {
    type_config: &'a str,
    solvers: Vec<Configured<'s, SolverView<'a>>>,
}

#[derive(Serialize)]
struct VersionContext<'v> {
    version: &'v str,
    generator: &'static str,
}

/// A rendered-ready context for one output file.
#[derive(Debug, Clone)]
pub struct ViewContext {
    /// Type configuration name for per-configuration views.
    pub type_config: Option<String>,
    /// Named context passed to the template.
    pub value: serde_json::Value,
}

/// Consistent projection of one model snapshot.
#[derive(Debug)]
pub struct Snapshot<'a> {
    model: &'a MetadataModel,
    functions: Vec<FunctionView<'a>>,
    solvers: Vec<SolverView<'a>>,
}

const GENERATOR: &str = concat!("opgen ", env!("CARGO_PKG_VERSION"));

impl<'a> Snapshot<'a> {
    /// Projects `model`, attaching the ids held by `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] for an unmapped argument type, or
    /// [`Error::Unregistered`] if a function has no id in `registry`.
    pub fn new(model: &'a MetadataModel, registry: &IdentifierRegistry) -> Result<Self, Error> {
        let mut functions = Vec::with_capacity(model.functions.len());
        for function in &model.functions {
            let qualified_name = fingerprint(function)?;
            let id = registry
                .get(&qualified_name)
                .ok_or_else(|| Error::Unregistered {
                    qualified_name: qualified_name.clone(),
                })?;
            let arguments: Vec<ArgumentView<'a>> =
                function.arguments.iter().map(ArgumentView::new).collect();
            let pack_format = arguments.iter().filter_map(|a| a.pack_format).collect();
            functions.push(FunctionView {
                name: &function.name,
                snake_name: &function.snake_name,
                category: &function.category,
                doc: &function.doc,
                overload: function.overload,
                qualified_name,
                id,
                pack_format,
                inputs: &function.inputs,
                arguments,
                outputs: &function.outputs,
                type_configs: type_config_views(&function.type_configs),
            });
        }

        let solvers = model
            .solvers
            .iter()
            .map(|solver| SolverView {
                name: &solver.name,
                snake_name: &solver.snake_name,
                doc: &solver.doc,
                arguments: solver.arguments.iter().map(ArgumentView::new).collect(),
                type_configs: type_config_views(&solver.type_configs),
            })
            .collect();

        Ok(Self {
            model,
            functions,
            solvers,
        })
    }

    /// All function views, in model order.
    #[must_use]
    pub fn functions(&self) -> &[FunctionView<'a>] {
        &self.functions
    }

    /// All solver views, in model order.
    #[must_use]
    pub fn solvers(&self) -> &[SolverView<'a>] {
        &self.solvers
    }

    fn categories(&self) -> Vec<CategoryView<'_, 'a>> {
        self.model
            .categories()
            .into_iter()
            .map(|name| CategoryView {
                name,
                functions: self.functions.iter().filter(|f| f.category == name).collect(),
            })
            .collect()
    }

    /// Builds the contexts for `view`: one for most views, one per type
    /// configuration for per-configuration views.
    ///
    /// # Errors
    ///
    /// Returns an error if a context cannot be converted to JSON.
    pub fn contexts(
        &self,
        view: ViewKind,
        version: &str,
    ) -> Result<Vec<ViewContext>, serde_json::Error> {
        let single = |value: serde_json::Value| {
            vec![ViewContext {
                type_config: None,
                value,
            }]
        };
        let contexts = match view {
            ViewKind::Functions => single(serde_json::to_value(FunctionsContext {
                functions: &self.functions,
                categories: self.categories(),
            })?),
            ViewKind::FunctionList => single(serde_json::to_value(FunctionListContext {
                functions: &self.functions,
                function_count: self.functions.len(),
            })?),
            ViewKind::Solvers => single(serde_json::to_value(SolversContext {
                solvers: &self.solvers,
            })?),
            ViewKind::Combined => single(serde_json::to_value(CombinedContext {
                functions: &self.functions,
                categories: self.categories(),
                solvers: &self.solvers,
                function_type_configs: self.model.function_type_config_names(),
                solver_type_configs: self.model.solver_type_config_names(),
            })?),
            ViewKind::FunctionsByTypeConfig => self
                .model
                .function_type_config_names()
                .into_iter()
                .map(|config| -> Result<ViewContext, serde_json::Error> {
                    let functions = self
                        .functions
                        .iter()
                        .filter(|f| f.overload == 0)
                        .filter_map(|f| {
                            configured_types(&f.type_configs, config)
                                .map(|types| Configured { item: f, types })
                        })
                        .collect();
                    let value = serde_json::to_value(FunctionTypeContext {
                        type_config: config,
                        functions,
                    })?;
                    Ok(ViewContext {
                        type_config: Some(config.to_string()),
                        value,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            ViewKind::SolversByTypeConfig => self
                .model
                .solver_type_config_names()
                .into_iter()
                .map(|config| -> Result<ViewContext, serde_json::Error> {
                    let solvers = self
                        .solvers
                        .iter()
                        .filter_map(|s| {
                            configured_types(&s.type_configs, config)
                                .map(|types| Configured { item: s, types })
                        })
                        .collect();
                    let value = serde_json::to_value(SolverTypeContext {
                        type_config: config,
                        solvers,
                    })?;
                    Ok(ViewContext {
                        type_config: Some(config.to_string()),
                        value,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            ViewKind::Version => single(serde_json::to_value(VersionContext {
                version,
                generator: GENERATOR,
            })?),
        };
        Ok(contexts)
    }
}

fn configured_types<'s>(configs: &'s [TypeConfigView<'_>], name: &str) -> Option<&'s [String]> {
    configs.iter().find(|c| c.name == name).map(|c| c.types)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::registry::reconcile;
    use opgen_model::{build_model, Source};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    const FUNCTIONS: &str = r#"
Arithmetic:
  Add:
    arguments:
      x: {type: int64}
      y: {type: int64}
    overloads:
      - arguments:
          x: {type: float}
          y: {type: float}
Layer:
  Affine:
    arguments:
      base_axis: {type: int64, default: 1}
  Identity: {}
"#;

    const SOLVERS: &str = r#"
Sgd:
  arguments:
    lr: {type: float}
Adam:
  arguments:
    alpha: {type: float}
"#;

    const FUNCTION_TYPES: &str = r#"
Affine:
  float: [float]
  half: [Half]
Identity:
  float: [float]
"#;

    const SOLVER_TYPES: &str = r#"
Adam:
  float: [float]
"#;

    fn model() -> MetadataModel {
        build_model(
            Source::new(Path::new("functions.yaml"), FUNCTIONS),
            Source::new(Path::new("solvers.yaml"), SOLVERS),
            Source::new(Path::new("function_types.yaml"), FUNCTION_TYPES),
            Source::new(Path::new("solver_types.yaml"), SOLVER_TYPES),
        )
        .unwrap()
    }

    fn names(value: &serde_json::Value, key: &str) -> Vec<String> {
        value[key]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["name"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn function_views_carry_ids_and_pack_codes() {
        let model = model();
        let (registry, _) = reconcile(&model, IdentifierRegistry::new()).unwrap();
        let snapshot = Snapshot::new(&model, &registry).unwrap();
        let summary: Vec<(&str, u32, &str)> = snapshot
            .functions()
            .iter()
            .map(|f| (f.qualified_name.as_str(), f.id, f.pack_format.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Add_ii", 0, "ii"),
                ("Add_ff", 1, "ff"),
                ("Affine_i", 2, "i"),
                ("Identity", 3, ""),
            ]
        );
    }

    #[test]
    fn snapshot_requires_reconciled_registry() {
        let model = model();
        let err = Snapshot::new(&model, &IdentifierRegistry::new()).unwrap_err();
        assert!(matches!(err, Error::Unregistered { .. }));
    }

    #[test]
    fn every_function_view_lists_the_same_order() {
        let model = model();
        let (registry, _) = reconcile(&model, IdentifierRegistry::new()).unwrap();
        let snapshot = Snapshot::new(&model, &registry).unwrap();
        let expected = vec!["Add", "Add", "Affine", "Identity"];
        for view in [ViewKind::Functions, ViewKind::FunctionList, ViewKind::Combined] {
            let contexts = snapshot.contexts(view, "1.0.0").unwrap();
            assert_eq!(names(&contexts[0].value, "functions"), expected, "{view:?}");
        }
    }

    #[test]
    fn categories_group_functions() {
        let model = model();
        let (registry, _) = reconcile(&model, IdentifierRegistry::new()).unwrap();
        let snapshot = Snapshot::new(&model, &registry).unwrap();
        let contexts = snapshot.contexts(ViewKind::Functions, "1.0.0").unwrap();
        let categories = contexts[0].value["categories"].as_array().unwrap();
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0]["name"], "Arithmetic");
        assert_eq!(names(&categories[1], "functions"), vec!["Affine", "Identity"]);
    }

    #[test]
    fn per_config_views_filter_functions() {
        let model = model();
        let (registry, _) = reconcile(&model, IdentifierRegistry::new()).unwrap();
        let snapshot = Snapshot::new(&model, &registry).unwrap();
        let contexts = snapshot
            .contexts(ViewKind::FunctionsByTypeConfig, "1.0.0")
            .unwrap();
        let configs: Vec<Option<&str>> =
            contexts.iter().map(|c| c.type_config.as_deref()).collect();
        assert_eq!(configs, vec![Some("float"), Some("half")]);
        assert_eq!(names(&contexts[0].value, "functions"), vec!["Affine", "Identity"]);
        assert_eq!(names(&contexts[1].value, "functions"), vec!["Affine"]);
        assert_eq!(contexts[1].value["functions"][0]["types"][0], "Half");
        assert_eq!(contexts[1].value["functions"][0]["id"], 2);
    }

    #[test]
    fn solver_views_keep_order_and_configs() {
        let model = model();
        let (registry, _) = reconcile(&model, IdentifierRegistry::new()).unwrap();
        let snapshot = Snapshot::new(&model, &registry).unwrap();
        let solvers = snapshot.contexts(ViewKind::Solvers, "1.0.0").unwrap();
        assert_eq!(names(&solvers[0].value, "solvers"), vec!["Sgd", "Adam"]);
        let typed = snapshot
            .contexts(ViewKind::SolversByTypeConfig, "1.0.0")
            .unwrap();
        assert_eq!(typed.len(), 1);
        assert_eq!(names(&typed[0].value, "solvers"), vec!["Adam"]);
    }

    #[test]
    fn version_view_stamps_version() {
        let model = MetadataModel::default();
        let snapshot = Snapshot::new(&model, &IdentifierRegistry::new()).unwrap();
        let contexts = snapshot.contexts(ViewKind::Version, "1.2.3").unwrap();
        assert_eq!(contexts[0].value["version"], "1.2.3");
        assert!(contexts[0].value["generator"]
            .as_str()
            .unwrap()
            .starts_with("opgen "));
    }

    #[test]
    fn argument_defaults_reach_the_context() {
        let model = model();
        let (registry, _) = reconcile(&model, IdentifierRegistry::new()).unwrap();
        let snapshot = Snapshot::new(&model, &registry).unwrap();
        let contexts = snapshot.contexts(ViewKind::FunctionList, "1.0.0").unwrap();
        let affine = &contexts[0].value["functions"][2];
        assert_eq!(affine["arguments"][0]["default"], 1);
        assert_eq!(affine["arguments"][0]["type"], "int64");
        assert_eq!(affine["arguments"][0]["pack_format"], "i");
        assert_eq!(contexts[0].value["function_count"], 4);
    }
}
