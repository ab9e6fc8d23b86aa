//! Full model registration composed from `ModelRegistry` primitives.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::fs::{self, File};
use tokio::io::AsyncReadExt;

use crate::error::{RegistryError, Result};
use crate::registry::{DefinitionPart, DeploymentOptions, ModelRegistry};
use crate::{ModelId, TrainedModelConfig, Vocabulary};

/// Raw bytes per definition part before base64 encoding.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// What to do when a model with the same id is already registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExistsPolicy {
    /// Stop any deployment, delete the model, then import
    #[default]
    Replace,
    /// Abort with `RegistryError::AlreadyExists`
    Fail,
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub chunk_size: usize,
    pub exists: ExistsPolicy,
    /// Start a deployment after the import when set
    pub start: Option<DeploymentOptions>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            exists: ExistsPolicy::default(),
            start: None,
        }
    }
}

/// Artifacts handed to the registry for one model.
#[derive(Debug, Clone, Copy)]
pub struct ModelUpload<'a> {
    pub model_path: &'a Path,
    pub vocab_path: &'a Path,
    pub config: &'a TrainedModelConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub model_id: ModelId,
    pub total_parts: usize,
    pub total_bytes: u64,
    /// A previous model with the same id was removed first
    pub replaced: bool,
    pub started: bool,
}

/// Register a traced model, its configuration and its vocabulary.
///
/// Artifacts are validated locally before the cluster is contacted. The
/// sequence is config, definition parts in order, then vocabulary. Nothing
/// is retried and a failure part-way leaves whatever was already stored.
pub async fn import_model<R: ModelRegistry + ?Sized>(
    registry: &R,
    id: &ModelId,
    upload: &ModelUpload<'_>,
    options: &UploadOptions,
) -> Result<ImportSummary> {
    if options.chunk_size == 0 {
        return Err(RegistryError::Settings("chunk size must be positive".to_string()));
    }

    let total_bytes = fs::metadata(upload.model_path).await?.len();
    if total_bytes == 0 {
        return Err(RegistryError::InvalidArtifact {
            path: upload.model_path.display().to_string(),
            reason: "model file is empty".to_string(),
        });
    }
    let vocabulary = read_vocabulary(upload.vocab_path).await?;
    let total_parts = total_bytes.div_ceil(options.chunk_size as u64) as usize;

    registry.ping().await?;

    let replaced = if registry.model_exists(id).await? {
        match options.exists {
            ExistsPolicy::Fail => return Err(RegistryError::AlreadyExists(id.to_string())),
            ExistsPolicy::Replace => {
                tracing::info!("Model {} already exists, replacing it", id);
                registry.stop_deployment(id).await?;
                registry.delete_model(id).await?;
                true
            }
        }
    } else {
        false
    };

    tracing::info!("Creating model {}", id);
    registry.put_config(id, upload.config).await?;

    tracing::info!(
        "Uploading {} bytes in {} part(s) from {}",
        total_bytes,
        total_parts,
        upload.model_path.display()
    );
    let mut file = File::open(upload.model_path).await?;
    let mut remaining = total_bytes;
    for index in 0..total_parts {
        let len = remaining.min(options.chunk_size as u64) as usize;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf).await?;
        remaining -= len as u64;

        let part = DefinitionPart {
            index,
            definition: STANDARD.encode(&buf),
            total_definition_length: total_bytes,
            total_parts,
        };
        registry.put_definition_part(id, &part).await?;
        tracing::debug!("Uploaded part {}/{}", index + 1, total_parts);
    }

    tracing::info!("Uploading vocabulary ({} tokens)", vocabulary.len());
    registry.put_vocabulary(id, &vocabulary).await?;

    let started = match &options.start {
        Some(deployment) => {
            tracing::info!("Starting deployment of {}", id);
            registry.start_deployment(id, deployment).await?;
            true
        }
        None => false,
    };

    Ok(ImportSummary {
        model_id: id.clone(),
        total_parts,
        total_bytes,
        replaced,
        started,
    })
}

async fn read_vocabulary(path: &Path) -> Result<Vocabulary> {
    let content = fs::read_to_string(path).await?;
    let vocabulary: Vocabulary =
        serde_json::from_str(&content).map_err(|e| RegistryError::InvalidArtifact {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    if vocabulary.is_empty() {
        return Err(RegistryError::InvalidArtifact {
            path: path.display().to_string(),
            reason: "vocabulary is empty".to_string(),
        });
    }
    Ok(vocabulary)
}
