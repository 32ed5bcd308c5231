//! Template rendering.
//!
//! The orchestrator only depends on [`TemplateRenderer`]; [`HandlebarsRenderer`]
//! is the implementation used by the command-line generator.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use handlebars::Handlebars;

/// Renders one template file against a named context.
pub trait TemplateRenderer {
    /// Renders the template at `template` with `context`.
    ///
    /// # Errors
    ///
    /// Returns an error if the template is missing, malformed, or references
    /// a value the context does not provide.
    fn render(&self, template: &Path, context: &serde_json::Value) -> Result<String>;
}

mod helpers {
    use handlebars::handlebars_helper;

    handlebars_helper!(upper: |s: str| s.to_uppercase());
    handlebars_helper!(join: |list: array, sep: str| {
        list.iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(sep)
    });
}

/// Handlebars-backed renderer.
///
/// Runs in strict mode so a missing context key is an error rather than an
/// empty string, and emits values verbatim since the outputs are source code.
pub struct HandlebarsRenderer {
    registry: Handlebars<'static>,
}

impl HandlebarsRenderer {
    /// Creates a renderer with the `upper` and `join` helpers registered.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);
        registry.register_helper("upper", Box::new(helpers::upper));
        registry.register_helper("join", Box::new(helpers::join));
        Self { registry }
    }
}

impl Default for HandlebarsRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer for HandlebarsRenderer {
    fn render(&self, template: &Path, context: &serde_json::Value) -> Result<String> {
        let source = fs::read_to_string(template)
            .with_context(|| format!("reading template {}", template.display()))?;
        self.registry
            .render_template(&source, context)
            .with_context(|| format!("rendering template {}", template.display()))
    }
}
