//! Placeholder implementation files for functions that have none yet.
//!
//! Skeletons are purely additive: a file that already exists is never
//! touched, whether it was hand-written or produced by an earlier run.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use opgen_model::{FunctionDefinition, MetadataModel};
use serde::Serialize;
use walkdir::WalkDir;

use crate::artifact::{ArtifactKind, SKELETON_TARGETS, SNAKE_NAME_PLACEHOLDER};
use crate::config::GeneratorConfig;
use crate::error::{Error, RenderFailure};
use crate::render::TemplateRenderer;
use crate::writer;

/// Files that already exist under the skeleton target directories.
#[derive(Debug, Clone, Default)]
pub struct ImplementationIndex {
    paths: BTreeSet<PathBuf>,
}

impl ImplementationIndex {
    /// Indexes every file below `dirs`. Directories that do not exist are
    /// treated as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be traversed.
    pub fn scan<I, P>(dirs: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut paths = BTreeSet::new();
        for dir in dirs {
            let dir = dir.as_ref();
            if !dir.exists() {
                continue;
            }
            for entry in WalkDir::new(dir) {
                let entry = entry.map_err(|e| Error::Io {
                    path: e.path().unwrap_or(dir).to_path_buf(),
                    source: io::Error::from(e),
                })?;
                if entry.file_type().is_file() {
                    paths.insert(entry.into_path());
                }
            }
        }
        Ok(Self { paths })
    }

    /// Returns true if `path` is indexed.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    /// Number of indexed files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Returns true if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[derive(Serialize)]
struct SkeletonContext<'a> {
    function: &'a FunctionDefinition,
    overloads: Vec<&'a FunctionDefinition>,
}

/// Creates skeleton files for functions without an implementation.
pub struct SkeletonSynthesizer<'a, R> {
    config: &'a GeneratorConfig,
    renderer: &'a R,
}

impl<'a, R: TemplateRenderer> SkeletonSynthesizer<'a, R> {
    /// Creates a synthesizer writing under `config.output_dir`.
    pub fn new(config: &'a GeneratorConfig, renderer: &'a R) -> Self {
        Self { config, renderer }
    }

    /// Directories skeleton files are written to.
    #[must_use]
    pub fn target_dirs(&self) -> BTreeSet<PathBuf> {
        SKELETON_TARGETS
            .iter()
            .filter_map(|target| {
                self.config
                    .output_path(target.output)
                    .parent()
                    .map(Path::to_path_buf)
            })
            .collect()
    }

    fn skeleton_path(&self, output: &str, snake_name: &str) -> PathBuf {
        self.config
            .output_path(&output.replace(SNAKE_NAME_PLACEHOLDER, snake_name))
    }

    /// Renders and creates every skeleton missing from `existing`. Overloads
    /// of one function share a single skeleton.
    ///
    /// Returns the files created.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Render`] listing every template that failed, or the
    /// first I/O error.
    pub fn synthesize_missing(
        &self,
        model: &MetadataModel,
        existing: &ImplementationIndex,
    ) -> Result<BTreeSet<PathBuf>, Error> {
        let mut created = BTreeSet::new();
        let mut failures = Vec::new();

        for function in model.primary_functions() {
            let pending: Vec<_> = SKELETON_TARGETS
                .iter()
                .map(|target| (target, self.skeleton_path(target.output, &function.snake_name)))
                .filter(|(_, path)| !existing.contains(path))
                .collect();
            if pending.is_empty() {
                continue;
            }

            let context = SkeletonContext {
                function,
                overloads: model
                    .functions
                    .iter()
                    .filter(|f| f.name == function.name)
                    .collect(),
            };
            let context = match serde_json::to_value(&context) {
                Ok(value) => value,
                Err(e) => {
                    for (target, _) in &pending {
                        failures.push(RenderFailure {
                            kind: ArtifactKind::Skeleton,
                            template: self.config.template_path(target.template),
                            source: e.to_string().into(),
                        });
                    }
                    continue;
                }
            };

            for (target, path) in pending {
                let template = self.config.template_path(target.template);
                let text = match self.renderer.render(&template, &context) {
                    Ok(text) => text,
                    Err(e) => {
                        failures.push(RenderFailure {
                            kind: ArtifactKind::Skeleton,
                            template,
                            source: e.into(),
                        });
                        continue;
                    }
                };
                if writer::create_new(&path, &text)? {
                    tracing::info!(
                        function = %function.name,
                        path = %path.display(),
                        "created skeleton"
                    );
                    created.insert(path);
                }
            }
        }

        if failures.is_empty() {
            Ok(created)
        } else {
            Err(Error::Render(failures))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use opgen_model::{build_model, Source};
    use pretty_assertions::assert_eq;
    use std::fs;

    struct Echo;

    impl TemplateRenderer for Echo {
        fn render(&self, template: &Path, context: &serde_json::Value) -> anyhow::Result<String> {
            Ok(format!(
                "{} {} overloads={}\n",
                template.file_name().unwrap().to_string_lossy(),
                context["function"]["name"].as_str().unwrap(),
                context["overloads"].as_array().unwrap().len()
            ))
        }
    }

    const FUNCTIONS: &str = r#"
Math:
  Add:
    arguments:
      x: {type: int64}
    overloads:
      - arguments:
          x: {type: float}
  BatchNormalization: {}
"#;

    fn model() -> MetadataModel {
        build_model(
            Source::new(Path::new("functions.yaml"), FUNCTIONS),
            Source::new(Path::new("solvers.yaml"), ""),
            Source::new(Path::new("function_types.yaml"), ""),
            Source::new(Path::new("solver_types.yaml"), ""),
        )
        .unwrap()
    }

    #[test]
    fn one_skeleton_per_function_name() {
        let dir = tempfile::tempdir().unwrap();
        let config = GeneratorConfig::for_root(dir.path());
        let created = SkeletonSynthesizer::new(&config, &Echo)
            .synthesize_missing(&model(), &ImplementationIndex::default())
            .unwrap();
        let expected: BTreeSet<PathBuf> = [
            "src/function/generic/add.cpp",
            "include/function/add.hpp",
            "src/function/generic/batch_normalization.cpp",
            "include/function/batch_normalization.hpp",
        ]
        .iter()
        .map(|p| dir.path().join(p))
        .collect();
        assert_eq!(created, expected);
        assert_eq!(
            fs::read_to_string(dir.path().join("src/function/generic/add.cpp")).unwrap(),
            "function_impl.cpp.hbs Add overloads=2\n"
        );
    }

    #[test]
    fn existing_files_are_never_touched() {
        let dir = tempfile::tempdir().unwrap();
        let config = GeneratorConfig::for_root(dir.path());
        let handwritten = dir.path().join("src/function/generic/add.cpp");
        fs::create_dir_all(handwritten.parent().unwrap()).unwrap();
        fs::write(&handwritten, "// real implementation\n").unwrap();

        let synthesizer = SkeletonSynthesizer::new(&config, &Echo);
        let index = ImplementationIndex::scan(synthesizer.target_dirs()).unwrap();
        assert_eq!(index.len(), 1);
        let created = synthesizer.synthesize_missing(&model(), &index).unwrap();

        assert!(!created.contains(&handwritten));
        assert!(created.contains(&dir.path().join("include/function/add.hpp")));
        assert_eq!(
            fs::read_to_string(&handwritten).unwrap(),
            "// real implementation\n"
        );
    }

    #[test]
    fn second_run_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = GeneratorConfig::for_root(dir.path());
        let synthesizer = SkeletonSynthesizer::new(&config, &Echo);
        synthesizer
            .synthesize_missing(&model(), &ImplementationIndex::default())
            .unwrap();
        let index = ImplementationIndex::scan(synthesizer.target_dirs()).unwrap();
        assert_eq!(index.len(), 4);
        let created = synthesizer.synthesize_missing(&model(), &index).unwrap();
        assert!(created.is_empty());
    }

    #[test]
    fn stale_index_still_does_not_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let config = GeneratorConfig::for_root(dir.path());
        let header = dir.path().join("include/function/add.hpp");
        fs::create_dir_all(header.parent().unwrap()).unwrap();
        fs::write(&header, "keep").unwrap();
        let created = SkeletonSynthesizer::new(&config, &Echo)
            .synthesize_missing(&model(), &ImplementationIndex::default())
            .unwrap();
        assert!(!created.contains(&header));
        assert_eq!(fs::read_to_string(&header).unwrap(), "keep");
    }

    #[test]
    fn scan_ignores_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let index = ImplementationIndex::scan([dir.path().join("absent")]).unwrap();
        assert!(index.is_empty());
    }
}
