//! ml-registry: client for a search cluster's trained-model registry.
//!
//! This crate provides:
//! - Registry key, task and configuration types (`ModelId`, `TaskType`, `TrainedModelConfig`)
//! - The `ModelRegistry` trait and the chunked `import_model` procedure
//! - `ElasticsearchRegistry` (HTTP) and `InMemoryRegistry` (testing)

pub mod config;
pub mod elasticsearch;
pub mod error;
pub mod import;
pub mod memory;
pub mod model_id;
pub mod registry;
pub mod task;
pub mod vocabulary;

pub use config::{
    DEFAULT_INPUT_FIELD, ModelInput, PYTORCH_MODEL_TYPE, TaskSettings, Tokenization, TokenizerKind,
    TrainedModelConfig, labels_in_id_order,
};
pub use elasticsearch::{
    Auth, ConnectionSettings, DEFAULT_REQUEST_TIMEOUT, ElasticsearchRegistry, redact_url,
};
pub use error::RegistryError;
pub use import::{
    DEFAULT_CHUNK_SIZE, ExistsPolicy, ImportSummary, ModelUpload, UploadOptions, import_model,
};
pub use memory::{InMemoryRegistry, RegistryCall, StoredModel};
pub use model_id::{MAX_MODEL_ID_LEN, ModelId, ModelIdError};
pub use registry::{DefinitionPart, DeploymentOptions, ModelRegistry, WaitFor};
pub use task::{TaskType, UnknownTask};
pub use vocabulary::Vocabulary;
