//! opgen code generator.
//!
//! Reads the function and solver metadata, keeps the committed function-id
//! table in step with it, and renders every derived artifact (registration
//! code, bindings, serialization schema, factory, version stamps, skeleton
//! implementations) from a single consistent snapshot.
//!
//! A run proceeds in a fixed order:
//!
//! 1. load the [`MetadataModel`](opgen_model::MetadataModel);
//! 2. load the [`IdentifierRegistry`] and [`reconcile`] it with the model,
//!    aborting before anything is written on a schema error or id conflict;
//! 3. persist the registry;
//! 4. render the artifact table through the [`Orchestrator`];
//! 5. create missing skeletons through the [`SkeletonSynthesizer`].

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

pub mod artifact;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod render;
pub mod skeleton;
pub mod views;
pub mod writer;

use std::collections::BTreeSet;
use std::path::PathBuf;

pub use artifact::{ArtifactKind, ViewKind};
pub use config::GeneratorConfig;
pub use error::{Error, IdConflict, RenderFailure};
pub use orchestrator::{GenerationReport, Orchestrator};
pub use registry::{fingerprint, reconcile, Diagnostics, IdentifierRegistry};
pub use render::{HandlebarsRenderer, TemplateRenderer};
pub use skeleton::{ImplementationIndex, SkeletonSynthesizer};
pub use writer::WriteOutcome;

/// Everything a generation run did.
#[derive(Debug)]
pub struct RunReport {
    /// Number of function definitions, overloads included.
    pub function_count: usize,
    /// Number of solver definitions.
    pub solver_count: usize,
    /// Registry reconciliation outcome.
    pub diagnostics: Diagnostics,
    /// Whether the registry file was rewritten.
    pub registry: WriteOutcome,
    /// Rendered artifacts.
    pub generation: GenerationReport,
    /// Skeleton files created.
    pub skeletons: BTreeSet<PathBuf>,
}

/// Runs the generator with the Handlebars renderer.
///
/// # Errors
///
/// See [`run_with`].
pub fn run(
    config: &GeneratorConfig,
    version: &str,
    targets: &BTreeSet<ArtifactKind>,
) -> Result<RunReport, Error> {
    run_with(config, &HandlebarsRenderer::new(), version, targets)
}

/// Runs the generator, rendering every artifact in `targets` with `renderer`.
///
/// # Errors
///
/// Returns an error if the metadata or registry cannot be loaded, a function
/// cannot be fingerprinted, the registry holds duplicated ids, any template
/// fails to render, or any file cannot be written.
pub fn run_with<R: TemplateRenderer>(
    config: &GeneratorConfig,
    renderer: &R,
    version: &str,
    targets: &BTreeSet<ArtifactKind>,
) -> Result<RunReport, Error> {
    let model = opgen_model::load_model(&config.metadata)?;
    tracing::info!(
        functions = model.functions.len(),
        solvers = model.solvers.len(),
        "loaded metadata"
    );

    let registry = IdentifierRegistry::load(&config.registry)?;
    let (registry, diagnostics) = reconcile(&model, registry)?;
    for name in &diagnostics.stale {
        tracing::warn!(fingerprint = %name, "registry entry kept for a function no longer defined");
    }
    let registry_outcome = registry.persist(&config.registry)?;
    tracing::info!(
        path = %config.registry.display(),
        assigned = diagnostics.assigned.len(),
        ?registry_outcome,
        "identifier registry up to date"
    );

    let generation = Orchestrator::new(config, renderer, version).generate_all(
        &model,
        &registry,
        targets,
    )?;

    let skeletons = if targets.contains(&ArtifactKind::Skeleton) {
        let synthesizer = SkeletonSynthesizer::new(config, renderer);
        let index = ImplementationIndex::scan(synthesizer.target_dirs())?;
        synthesizer.synthesize_missing(&model, &index)?
    } else {
        BTreeSet::new()
    };

    Ok(RunReport {
        function_count: model.functions.len(),
        solver_count: model.solvers.len(),
        diagnostics,
        registry: registry_outcome,
        generation,
        skeletons,
    })
}
