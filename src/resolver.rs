use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::plan::StepSpec;

/// Side-effect-free existence query used to pick fallback candidates.
pub trait ArtifactLocator {
    fn locate(&self, identifier: &str) -> PathBuf;

    fn exists(&self, identifier: &str) -> bool {
        self.locate(identifier).is_file()
    }
}

/// Resolves candidates relative to a notebook directory.
#[derive(Debug, Clone)]
pub struct FsLocator {
    root: PathBuf,
}

impl FsLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ArtifactLocator for FsLocator {
    fn locate(&self, identifier: &str) -> PathBuf {
        let path = Path::new(identifier);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStep {
    pub identifier: String,
    /// Set when no candidate existed and the last one was kept as a placeholder.
    pub deferred: bool,
}

impl ResolvedStep {
    pub fn name(&self) -> String {
        Path::new(&self.identifier)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.identifier.clone())
    }
}

pub fn resolve_step(spec: &StepSpec, locator: &dyn ArtifactLocator) -> ResolvedStep {
    if let Some(found) = spec.candidates().iter().find(|c| locator.exists(c)) {
        debug!(chain = %spec, resolved = found.as_str(), "Resolved step");
        return ResolvedStep {
            identifier: found.clone(),
            deferred: false,
        };
    }

    let placeholder = spec.candidates().last().cloned().unwrap_or_default();
    warn!(
        chain = %spec,
        placeholder = placeholder.as_str(),
        "No candidate found; deferring to last candidate"
    );
    ResolvedStep {
        identifier: placeholder,
        deferred: true,
    }
}

pub fn resolve_steps(specs: &[StepSpec], locator: &dyn ArtifactLocator) -> Vec<ResolvedStep> {
    specs.iter().map(|spec| resolve_step(spec, locator)).collect()
}
