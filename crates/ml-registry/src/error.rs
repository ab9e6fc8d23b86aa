use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Invalid registry settings: {0}")]
    Settings(String),

    #[error("Cannot reach cluster: {0}")]
    Connection(String),

    #[error("Request to cluster timed out: {0}")]
    Timeout(String),

    #[error("Cluster rejected credentials (HTTP {status}): {reason}")]
    Unauthorized { status: u16, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Cluster rejected request (HTTP {status}): {reason}")]
    Rejected { status: u16, reason: String },

    #[error("Invalid artifact {path}: {reason}")]
    InvalidArtifact { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
