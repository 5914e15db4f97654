use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failure classes a step can halt a run with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    Execution,
    Persistence,
}

impl FailureKind {
    pub fn exit_code(self) -> u8 {
        match self {
            FailureKind::NotFound => 2,
            FailureKind::Execution => 3,
            FailureKind::Persistence => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FailureKind::NotFound => "not_found",
            FailureKind::Execution => "execution",
            FailureKind::Persistence => "persistence",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Terminal failure of a single step. `message` is what the console shows,
/// `diagnostic` is what gets persisted.
#[derive(Debug, Clone, Error)]
#[error("{kind} failure in step '{step}': {message}")]
pub struct StepFailure {
    pub step: String,
    pub kind: FailureKind,
    pub message: String,
    pub diagnostic: String,
}

impl StepFailure {
    pub fn not_found(step: impl Into<String>, path: &std::path::Path) -> Self {
        let message = format!("Notebook not found: {}", path.display());
        Self {
            step: step.into(),
            kind: FailureKind::NotFound,
            diagnostic: message.clone(),
            message,
        }
    }

    pub fn execution(
        step: impl Into<String>,
        message: impl Into<String>,
        diagnostic: impl Into<String>,
    ) -> Self {
        Self {
            step: step.into(),
            kind: FailureKind::Execution,
            message: message.into(),
            diagnostic: diagnostic.into(),
        }
    }

    pub fn persistence(step: impl Into<String>, err: &StorageError) -> Self {
        Self {
            step: step.into(),
            kind: FailureKind::Persistence,
            message: err.to_string(),
            diagnostic: format!("{err:?}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to write object '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload of '{key}' was rejected: {detail}")]
    Rejected { key: String, detail: String },

    #[error("Invalid object key '{0}'")]
    InvalidKey(String),

    #[error("Object store request for '{key}' failed: {source}")]
    Remote {
        key: String,
        #[source]
        source: object_store::Error,
    },

    #[error("Failed to configure object store client: {0}")]
    Client(#[source] object_store::Error),

    #[error("Failed to start object store runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum InjectError {
    #[error("Failed to read notebook {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Notebook {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Notebook {0} has no 'cells' array")]
    MissingCells(PathBuf),

    #[error("Failed to write injected notebook {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
#[error("{summary}")]
pub struct ExecutionError {
    pub summary: String,
    pub diagnostic: String,
}

impl ExecutionError {
    pub fn new(summary: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            diagnostic: diagnostic.into(),
        }
    }
}
