//! Core metadata model types.
//!
//! A [`MetadataModel`] is the normalized, read-only view of every function and
//! solver definition: categories are flattened into a single ordered list,
//! overload variants are expanded into separate definitions, and defaults are
//! resolved. Declaration order from the source files is preserved everywhere.

use indexmap::IndexMap;
use serde::Serialize;

use crate::pack::TypeTag;

/// Named type configurations: configuration name -> concrete element types.
///
/// For example `float: [float]` or `half: [Half]`.
pub type TypeConfigs = IndexMap<String, Vec<String>>;

/// A typed argument of a function or solver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArgumentDefinition {
    /// Argument name.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub type_: TypeTag,
    /// Default value, if the metadata declares one.
    pub default: Option<serde_json::Value>,
    /// Documentation string.
    pub doc: String,
}

/// An input or output of a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortDefinition {
    /// Port name.
    pub name: String,
    /// Documentation string.
    pub doc: String,
    /// Whether the port may be omitted.
    pub optional: bool,
    /// Whether the port accepts a variable number of values.
    pub variadic: bool,
}

/// A function (operator) definition.
///
/// Several definitions may share a [`name`](Self::name): each overload of a
/// function is its own definition with its own argument signature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDefinition {
    /// Function name, e.g. `"Affine"`.
    pub name: String,
    /// Snake-case name used for file names and bindings, e.g. `"affine"`.
    pub snake_name: String,
    /// Category the function was declared under.
    pub category: String,
    /// Documentation string.
    pub doc: String,
    /// Position among the overloads sharing this name (0 for the primary).
    pub overload: usize,
    /// Inputs in declaration order.
    pub inputs: Vec<PortDefinition>,
    /// Whether the metadata has an `arguments` key for this definition,
    /// even an empty one. Decides the `_` separator of the fingerprint.
    pub declares_arguments: bool,
    /// Arguments in declaration order.
    pub arguments: Vec<ArgumentDefinition>,
    /// Outputs in declaration order.
    pub outputs: Vec<PortDefinition>,
    /// Type configurations the function is instantiated for.
    pub type_configs: TypeConfigs,
}

/// A solver (optimizer) definition. Solvers never receive a persisted id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolverDefinition {
    /// Solver name, e.g. `"Adam"`.
    pub name: String,
    /// Snake-case name.
    pub snake_name: String,
    /// Documentation string.
    pub doc: String,
    /// Arguments in declaration order.
    pub arguments: Vec<ArgumentDefinition>,
    /// Type configurations the solver is instantiated for.
    pub type_configs: TypeConfigs,
}

/// The complete, normalized metadata for one generation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetadataModel {
    /// All function definitions in declaration order, overloads included.
    pub functions: Vec<FunctionDefinition>,
    /// All solver definitions in declaration order.
    pub solvers: Vec<SolverDefinition>,
}

impl MetadataModel {
    /// Returns the category names in first-declaration order.
    #[must_use]
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for function in &self.functions {
            if !seen.contains(&function.category.as_str()) {
                seen.push(&function.category);
            }
        }
        seen
    }

    /// Returns the functions declared under `category`, in order.
    pub fn functions_in<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a FunctionDefinition> + 'a {
        self.functions
            .iter()
            .filter(move |function| function.category == category)
    }

    /// Returns one definition per distinct function name (the first overload).
    pub fn primary_functions(&self) -> impl Iterator<Item = &FunctionDefinition> {
        self.functions.iter().filter(|function| function.overload == 0)
    }

    /// Looks up the primary definition of a function by name.
    #[must_use]
    pub fn find_function(&self, name: &str) -> Option<&FunctionDefinition> {
        self.primary_functions().find(|function| function.name == name)
    }

    /// Looks up a solver by name.
    #[must_use]
    pub fn find_solver(&self, name: &str) -> Option<&SolverDefinition> {
        self.solvers.iter().find(|solver| solver.name == name)
    }

    /// Returns every type configuration name used by any function, in
    /// first-use order.
    #[must_use]
    pub fn function_type_config_names(&self) -> Vec<&str> {
        collect_config_names(self.primary_functions().map(|f| &f.type_configs))
    }

    /// Returns every type configuration name used by any solver, in
    /// first-use order.
    #[must_use]
    pub fn solver_type_config_names(&self) -> Vec<&str> {
        collect_config_names(self.solvers.iter().map(|s| &s.type_configs))
    }
}

fn collect_config_names<'a>(tables: impl Iterator<Item = &'a TypeConfigs>) -> Vec<&'a str> {
    let mut names: Vec<&str> = Vec::new();
    for table in tables {
        for name in table.keys() {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
    }
    names
}

/// Converts a `PascalCase` function name into `snake_case`.
///
/// Runs of capitals are kept together except for the last capital before a
/// lowercase letter, so `"BatchNormalization"` becomes `"batch_normalization"`
/// and `"RNNCell"` becomes `"rnn_cell"`.
#[must_use]
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut result = String::with_capacity(name.len() + 4);
    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                let prev = chars[i - 1];
                let next_is_lower = chars.get(i + 1).is_some_and(|c| c.is_lowercase());
                if prev.is_lowercase()
                    || prev.is_ascii_digit()
                    || (prev.is_uppercase() && next_is_lower)
                {
                    result.push('_');
                }
            }
            result.extend(ch.to_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}
