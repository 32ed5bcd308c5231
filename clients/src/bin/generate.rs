//! `opgen-generate` — Regenerates every artifact derived from the function and
//! solver metadata.
//!
//! Reconciles the committed function-id table, renders the artifact templates,
//! and creates skeletons for functions without an implementation.
//!
//! **Usage:**
//! ```
//! opgen-generate <VERSION> [--root <dir>] [--config <file>] [--only <kind>...]
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use opgen_codegen::{ArtifactKind, GeneratorConfig, WriteOutcome};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Regenerate function and solver artifacts from the metadata.
#[derive(Parser)]
#[command(
    name = "opgen-generate",
    about = "Regenerate function and solver artifacts from the metadata"
)]
struct Args {
    /// Version string stamped into the generated version files.
    version: String,

    /// Project root holding `metadata/` and `templates/`.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Generator configuration file (defaults to `<root>/opgen.toml` if present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Restrict generation to these artifact kinds (repeatable).
    #[arg(long = "only", value_name = "KIND")]
    only: Vec<ArtifactKind>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = GeneratorConfig::load(&args.root, args.config.as_deref())
        .context("loading generator configuration")?;
    let targets: BTreeSet<ArtifactKind> = if args.only.is_empty() {
        ArtifactKind::ALL.into_iter().collect()
    } else {
        args.only.into_iter().collect()
    };

    println!(
        "Generating opgen artifacts v{} from {} ({} artifact kinds)",
        args.version,
        config.metadata.functions.display(),
        targets.len()
    );

    let report = opgen_codegen::run(&config, &args.version, &targets)
        .context("generation failed")?;

    println!(
        "{} functions, {} solvers; {} new ids, {} retained, {} stale",
        report.function_count,
        report.solver_count,
        report.diagnostics.assigned.len(),
        report.diagnostics.retained,
        report.diagnostics.stale.len()
    );
    for assignment in &report.diagnostics.assigned {
        println!("  + {}: {}", assignment.qualified_name, assignment.id);
    }
    if report.registry == WriteOutcome::Written {
        println!("Updated {}", config.registry.display());
    }

    println!(
        "Files written ({}), unchanged ({}):",
        report.generation.written.len(),
        report.generation.unchanged.len()
    );
    for file in &report.generation.written {
        println!("  {}", file.display());
    }
    if !report.skeletons.is_empty() {
        println!("Skeletons created ({}):", report.skeletons.len());
        for file in &report.skeletons {
            println!("  {}", file.display());
        }
    }

    println!("Generation complete.");
    Ok(())
}
