//! ModelRegistry trait abstraction over the cluster's trained-model API.
//!
//! Implementations:
//! - `ElasticsearchRegistry` - HTTP client for a live cluster
//! - `InMemoryRegistry` - For testing

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::{ModelId, TrainedModelConfig, Vocabulary};

/// One base64-encoded slice of a model definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionPart {
    /// Zero-based part index, sent in the request path rather than the body
    #[serde(skip)]
    pub index: usize,
    /// Base64 of this slice of the traced model file
    pub definition: String,
    /// Size of the whole (unencoded) model file in bytes
    pub total_definition_length: u64,
    pub total_parts: usize,
}

/// Options for starting a deployment once a model is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentOptions {
    pub wait_for: WaitFor,
    pub number_of_allocations: Option<u32>,
    pub threads_per_allocation: Option<u32>,
}

impl Default for DeploymentOptions {
    fn default() -> Self {
        Self {
            wait_for: WaitFor::Started,
            number_of_allocations: None,
            threads_per_allocation: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitFor {
    Starting,
    Started,
    FullyAllocated,
}

impl WaitFor {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitFor::Starting => "starting",
            WaitFor::Started => "started",
            WaitFor::FullyAllocated => "fully_allocated",
        }
    }
}

/// Remote store of importable inference models, keyed by `ModelId`.
///
/// The primitives mirror the cluster's REST surface; `import_model` composes
/// them into a full registration.
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Verify the cluster is reachable and accepts our credentials
    async fn ping(&self) -> Result<()>;

    /// Check whether a model is registered under `id`
    async fn model_exists(&self, id: &ModelId) -> Result<bool>;

    /// Remove a model and its definition
    async fn delete_model(&self, id: &ModelId) -> Result<()>;

    /// Create the model record from its configuration
    async fn put_config(&self, id: &ModelId, config: &TrainedModelConfig) -> Result<()>;

    /// Store one part of the model definition
    async fn put_definition_part(&self, id: &ModelId, part: &DefinitionPart) -> Result<()>;

    /// Store the tokenizer vocabulary
    async fn put_vocabulary(&self, id: &ModelId, vocabulary: &Vocabulary) -> Result<()>;

    /// Start serving the model
    async fn start_deployment(&self, id: &ModelId, options: &DeploymentOptions) -> Result<()>;

    /// Stop serving the model. A model without a deployment is not an error.
    async fn stop_deployment(&self, id: &ModelId) -> Result<()>;
}
