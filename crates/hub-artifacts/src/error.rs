use thiserror::Error;

use ml_registry::TaskType;

/// Failures while producing an artifact bundle. All of them abort the
/// import before the registry is contacted.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("Model '{0}' not found on the hub")]
    ModelNotFound(String),

    #[error("File '{file}' not found in '{repo}'")]
    FileNotFound { repo: String, file: String },

    #[error("Hub request failed: {0}")]
    Hub(String),

    #[error("Model '{model}' does not support task '{task}': {reason}")]
    UnsupportedTask {
        model: String,
        task: TaskType,
        reason: String,
    },

    #[error("Model '{model}' has unsupported architecture '{model_type}'")]
    UnsupportedModel { model: String, model_type: String },

    #[error("Invalid source file {path}: {reason}")]
    InvalidSource { path: String, reason: String },

    #[error("Tracing failed: {0}")]
    Trace(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AcquireError>;
