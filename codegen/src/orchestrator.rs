//! Renders every selected artifact from one model snapshot.

use std::collections::BTreeSet;
use std::path::PathBuf;

use opgen_model::MetadataModel;

use crate::artifact::{ArtifactKind, ARTIFACTS, CONFIG_PLACEHOLDER};
use crate::config::GeneratorConfig;
use crate::error::{Error, RenderFailure};
use crate::registry::IdentifierRegistry;
use crate::render::TemplateRenderer;
use crate::views::Snapshot;
use crate::writer::{self, WriteOutcome};

/// Files produced by [`Orchestrator::generate_all`].
#[derive(Debug, Default)]
pub struct GenerationReport {
    /// Artifact kinds rendered, in generation order.
    pub artifacts: Vec<ArtifactKind>,
    /// Files created or replaced.
    pub written: Vec<PathBuf>,
    /// Files whose content was already current.
    pub unchanged: Vec<PathBuf>,
}

impl GenerationReport {
    /// Total number of files rendered.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.written.len() + self.unchanged.len()
    }
}

/// Drives rendering of the artifact table.
pub struct Orchestrator<'a, R> {
    config: &'a GeneratorConfig,
    renderer: &'a R,
    version: &'a str,
}

impl<'a, R: TemplateRenderer> Orchestrator<'a, R> {
    /// Creates an orchestrator writing under `config.output_dir`.
    pub fn new(config: &'a GeneratorConfig, renderer: &'a R, version: &'a str) -> Self {
        Self {
            config,
            renderer,
            version,
        }
    }

    /// Renders every artifact in `targets` (other than skeletons) from a
    /// single snapshot of `model` and `registry`.
    ///
    /// A template that fails to render is recorded and the remaining
    /// artifacts are still generated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Render`] with every failure once all artifacts have
    /// been attempted, or the first I/O error encountered.
    pub fn generate_all(
        &self,
        model: &MetadataModel,
        registry: &IdentifierRegistry,
        targets: &BTreeSet<ArtifactKind>,
    ) -> Result<GenerationReport, Error> {
        let snapshot = Snapshot::new(model, registry)?;
        let mut report = GenerationReport::default();
        let mut failures = Vec::new();

        for spec in ARTIFACTS.iter().filter(|spec| targets.contains(&spec.kind)) {
            let span = tracing::info_span!("artifact", kind = %spec.kind);
            let _guard = span.enter();

            let contexts = match snapshot.contexts(spec.view, self.version) {
                Ok(contexts) => contexts,
                Err(e) => {
                    for target in spec.targets {
                        failures.push(RenderFailure {
                            kind: spec.kind,
                            template: self.config.template_path(target.template),
                            source: e.to_string().into(),
                        });
                    }
                    continue;
                }
            };
            if contexts.is_empty() {
                tracing::info!("no type configurations, nothing to render");
            }

            for context in &contexts {
                for target in spec.targets {
                    let template = self.config.template_path(target.template);
                    let relative = match &context.type_config {
                        Some(name) => target.output.replace(CONFIG_PLACEHOLDER, name),
                        None => target.output.to_string(),
                    };
                    let output = self.config.output_path(&relative);

                    let text = match self.renderer.render(&template, &context.value) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::error!(template = %template.display(), "{e:#}");
                            failures.push(RenderFailure {
                                kind: spec.kind,
                                template,
                                source: e.into(),
                            });
                            continue;
                        }
                    };
                    match writer::write_if_changed(&output, &text)? {
                        WriteOutcome::Written => {
                            tracing::info!(path = %output.display(), "generated");
                            report.written.push(output);
                        }
                        WriteOutcome::Unchanged => {
                            tracing::debug!(path = %output.display(), "unchanged");
                            report.unchanged.push(output);
                        }
                    }
                }
            }
            report.artifacts.push(spec.kind);
        }

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(Error::Render(failures))
        }
    }
}
