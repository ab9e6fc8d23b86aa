//! Acquire-then-register orchestration.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tokio::fs;

use hub_artifacts::{AcquireError, ArtifactBundle, ModelSource, SOURCE_DIR};
use ml_registry::{
    ImportSummary, ModelId, ModelRegistry, ModelUpload, RegistryError, TaskType,
    TrainedModelConfig, UploadOptions, import_model,
};

/// What happens to the local artifacts once the model is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanupPolicy {
    /// Leave artifacts on disk for re-use
    #[default]
    Keep,
    /// Delete the bundle and downloaded hub files
    RemoveArtifacts,
}

/// One import: which model, where its artifacts go, and how to register it.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    /// Hub model id, e.g. `sentence-transformers/msmarco-MiniLM-L-12-v3`
    pub model: String,
    pub task: TaskType,
    pub output_dir: PathBuf,
    /// Registry key; derived from `model` and `task` when absent
    pub model_id: Option<ModelId>,
    /// Used verbatim instead of the acquired configuration when present
    pub config_override: Option<TrainedModelConfig>,
    pub upload: UploadOptions,
    pub cleanup: CleanupPolicy,
}

impl ImportRequest {
    pub fn new(model: impl Into<String>, task: TaskType, output_dir: PathBuf) -> Self {
        Self {
            model: model.into(),
            task,
            output_dir,
            model_id: None,
            config_override: None,
            upload: UploadOptions::default(),
            cleanup: CleanupPolicy::default(),
        }
    }

    /// The registry key this request imports under.
    pub fn resolved_model_id(&self) -> ModelId {
        self.model_id
            .clone()
            .unwrap_or_else(|| ModelId::derive(&self.model, self.task))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStage {
    Acquiring,
    Registering,
    Registered,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to acquire model artifacts: {0}")]
    Acquire(#[from] AcquireError),

    #[error("Failed to register model '{model_id}': {source}")]
    Register {
        model_id: ModelId,
        #[source]
        source: RegistryError,
    },

    #[error("Model registered but artifact cleanup failed: {0}")]
    Cleanup(#[source] io::Error),
}

impl ImportError {
    /// Stage that was running when the import failed.
    pub fn stage(&self) -> ImportStage {
        match self {
            ImportError::Acquire(_) => ImportStage::Acquiring,
            ImportError::Register { .. } => ImportStage::Registering,
            ImportError::Cleanup(_) => ImportStage::Registered,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub model_id: ModelId,
    pub bundle: ArtifactBundle,
    pub summary: ImportSummary,
    pub config_overridden: bool,
    pub cleaned_up: bool,
}

/// Acquire the artifact bundle for `request.model`, then register it.
///
/// The registry is borrowed: the caller owns the connection and decides when
/// it is released. If acquisition fails the registry is never touched.
pub async fn run_import<S, R>(
    source: &S,
    registry: &R,
    request: &ImportRequest,
) -> Result<ImportOutcome, ImportError>
where
    S: ModelSource + ?Sized,
    R: ModelRegistry + ?Sized,
{
    tracing::info!(
        stage = ?ImportStage::Acquiring,
        "Acquiring {} ({}) into {}",
        request.model,
        request.task,
        request.output_dir.display()
    );
    fs::create_dir_all(&request.output_dir)
        .await
        .map_err(AcquireError::from)?;
    let bundle = source
        .acquire(&request.model, request.task, &request.output_dir)
        .await?;

    let model_id = request.resolved_model_id();
    tracing::info!(stage = ?ImportStage::Registering, "Registering {} as {}", request.model, model_id);

    let config_overridden = request.config_override.is_some();
    let config = request.config_override.as_ref().unwrap_or(&bundle.config);
    if config_overridden {
        tracing::info!("Using configuration override instead of the derived configuration");
    }

    let upload = ModelUpload {
        model_path: &bundle.model_path,
        vocab_path: &bundle.vocab_path,
        config,
    };
    let summary = import_model(registry, &model_id, &upload, &request.upload)
        .await
        .map_err(|source| ImportError::Register {
            model_id: model_id.clone(),
            source,
        })?;
    tracing::info!(stage = ?ImportStage::Registered, "Model {} stored", model_id);

    let cleaned_up = match request.cleanup {
        CleanupPolicy::Keep => false,
        CleanupPolicy::RemoveArtifacts => {
            remove_artifacts(&bundle, &request.output_dir)
                .await
                .map_err(ImportError::Cleanup)?;
            true
        }
    };

    Ok(ImportOutcome {
        model_id,
        bundle,
        summary,
        config_overridden,
        cleaned_up,
    })
}

/// Delete the bundle's files and the hub download directory.
///
/// The output directory itself is left in place; it was supplied by the
/// caller and may hold other models.
async fn remove_artifacts(bundle: &ArtifactBundle, output_dir: &std::path::Path) -> io::Result<()> {
    for file in bundle.files() {
        if fs::try_exists(file).await? {
            fs::remove_file(file).await?;
            tracing::debug!("Removed {}", file.display());
        }
    }

    let source_dir = output_dir.join(SOURCE_DIR);
    if fs::try_exists(&source_dir).await? {
        fs::remove_dir_all(&source_dir).await?;
        tracing::debug!("Removed {}", source_dir.display());
    }

    tracing::info!("Cleaned up artifacts in {}", output_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_id_prefers_explicit() {
        let mut request = ImportRequest::new("org/model", TaskType::TextEmbedding, PathBuf::from("models"));
        assert_eq!(request.resolved_model_id().as_str(), "org__model__text_embedding");

        request.model_id = Some(ModelId::parse("custom-id").unwrap());
        assert_eq!(request.resolved_model_id().as_str(), "custom-id");
    }

    #[test]
    fn test_error_stages() {
        let acquire = ImportError::Acquire(AcquireError::ModelNotFound("x".into()));
        assert_eq!(acquire.stage(), ImportStage::Acquiring);

        let register = ImportError::Register {
            model_id: ModelId::parse("x").unwrap(),
            source: RegistryError::Timeout("slow".into()),
        };
        assert_eq!(register.stage(), ImportStage::Registering);

        let cleanup = ImportError::Cleanup(io::Error::other("busy"));
        assert_eq!(cleanup.stage(), ImportStage::Registered);
    }
}
