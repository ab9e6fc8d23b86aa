//! ModelSource trait and its implementations.
//!
//! Implementations:
//! - `HubModelSource` - fetches metadata from the hub and traces the model
//! - `LocalArtifactSource` - re-uses a previously produced artifact directory

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use ml_registry::{TaskType, TokenizerKind, TrainedModelConfig, Vocabulary};

use crate::derive::{HubModelConfig, HubTokenizerConfig, derive_config, resolve_kind};
use crate::download::HubClient;
use crate::error::{AcquireError, Result};
use crate::tracer::{TRACED_MODEL_FILE, Tracer, same_file};
use crate::vocab;

/// Registry configuration written next to the traced model
pub const CONFIG_FILE: &str = "config.json";

/// Registry vocabulary written next to the traced model
pub const VOCABULARY_FILE: &str = "vocabulary.json";

/// Subdirectory holding the raw hub files used to derive the artifacts
pub const SOURCE_DIR: &str = "source";

/// The three artifacts a registration needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactBundle {
    /// Traced model file
    pub model_path: PathBuf,
    /// Configuration descriptor (also persisted at `config_path`)
    pub config: TrainedModelConfig,
    pub config_path: PathBuf,
    /// Vocabulary file
    pub vocab_path: PathBuf,
}

impl ArtifactBundle {
    /// Paths of every file in the bundle.
    pub fn files(&self) -> [&Path; 3] {
        [&self.model_path, &self.config_path, &self.vocab_path]
    }
}

/// Produces the artifacts for a model into a caller-chosen directory.
#[async_trait]
pub trait ModelSource: Send + Sync {
    /// Materialize the artifact bundle for `model` and `task` in `output_dir`.
    ///
    /// `output_dir` and any missing parents are created. Existing artifacts
    /// are overwritten.
    async fn acquire(&self, model: &str, task: TaskType, output_dir: &Path)
    -> Result<ArtifactBundle>;
}

/// Acquires models from a hub and obtains the traced file from a `Tracer`.
pub struct HubModelSource {
    hub: HubClient,
    tracer: Box<dyn Tracer>,
}

impl HubModelSource {
    pub fn new(hub: HubClient, tracer: Box<dyn Tracer>) -> Self {
        Self { hub, tracer }
    }

    async fn fetch_text(&self, model: &str, file: &str, dir: &Path) -> Result<String> {
        let path = self.hub.fetch(model, file, &dir.join(file)).await?;
        Ok(fs::read_to_string(path).await?)
    }

    async fn fetch_vocabulary(
        &self,
        model: &str,
        kind: TokenizerKind,
        dir: &Path,
    ) -> Result<Vocabulary> {
        let mut contents = Vec::new();
        for file in vocab::required_files(kind) {
            contents.push(self.fetch_text(model, file, dir).await?);
        }

        match kind {
            TokenizerKind::Bert | TokenizerKind::Mpnet => vocab::word_piece(&contents[0]),
            TokenizerKind::Roberta => vocab::byte_pair(&contents[0], &contents[1]),
            TokenizerKind::XlmRoberta => vocab::unigram(&contents[0]),
        }
    }
}

#[async_trait]
impl ModelSource for HubModelSource {
    async fn acquire(
        &self,
        model: &str,
        task: TaskType,
        output_dir: &Path,
    ) -> Result<ArtifactBundle> {
        let source_dir = output_dir.join(SOURCE_DIR);
        fs::create_dir_all(&source_dir).await?;

        let config_json = match self.fetch_text(model, CONFIG_FILE, &source_dir).await {
            Err(AcquireError::FileNotFound { .. }) => {
                return Err(AcquireError::ModelNotFound(model.to_string()));
            }
            other => other?,
        };
        let hub_config = HubModelConfig::parse(&config_json, CONFIG_FILE)?;
        let kind = resolve_kind(model, &hub_config)?;

        let tokenizer_config = match self
            .hub
            .fetch_optional(
                model,
                "tokenizer_config.json",
                &source_dir.join("tokenizer_config.json"),
            )
            .await?
        {
            Some(path) => {
                HubTokenizerConfig::parse(&fs::read_to_string(path).await?, "tokenizer_config.json")?
            }
            None => HubTokenizerConfig::default(),
        };

        let config = derive_config(model, task, kind, &hub_config, &tokenizer_config)?;
        let vocabulary = self.fetch_vocabulary(model, kind, &source_dir).await?;
        tracing::debug!("Built {} vocabulary with {} tokens", kind.as_str(), vocabulary.len());

        let model_path = output_dir.join(TRACED_MODEL_FILE);
        self.tracer.trace(model, task, &model_path).await?;

        let config_path = output_dir.join(CONFIG_FILE);
        write_json(&config_path, &config).await?;
        let vocab_path = output_dir.join(VOCABULARY_FILE);
        write_json(&vocab_path, &vocabulary).await?;

        tracing::info!("Saved artifacts for {} to {}", model, output_dir.display());
        Ok(ArtifactBundle {
            model_path,
            config,
            config_path,
            vocab_path,
        })
    }
}

/// Re-uses artifacts produced by an earlier acquisition.
///
/// When the artifact directory differs from the output directory the files
/// are copied so the bundle always lives under `output_dir`.
pub struct LocalArtifactSource {
    dir: PathBuf,
}

impl LocalArtifactSource {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl ModelSource for LocalArtifactSource {
    async fn acquire(
        &self,
        model: &str,
        task: TaskType,
        output_dir: &Path,
    ) -> Result<ArtifactBundle> {
        fs::create_dir_all(output_dir).await?;

        for file in [TRACED_MODEL_FILE, VOCABULARY_FILE, CONFIG_FILE] {
            let src = self.dir.join(file);
            if !fs::try_exists(&src).await? {
                return Err(AcquireError::InvalidSource {
                    path: src.display().to_string(),
                    reason: "missing from artifact directory".to_string(),
                });
            }
            let dest = output_dir.join(file);
            if !same_file(&src, &dest).await {
                fs::copy(&src, &dest).await?;
            }
        }

        let config_path = output_dir.join(CONFIG_FILE);
        let config: TrainedModelConfig =
            serde_json::from_str(&fs::read_to_string(&config_path).await?).map_err(|e| {
                AcquireError::InvalidSource {
                    path: config_path.display().to_string(),
                    reason: e.to_string(),
                }
            })?;

        if let Some(tag) = config.task_tag() {
            if tag != task.as_str() {
                return Err(AcquireError::UnsupportedTask {
                    model: model.to_string(),
                    task,
                    reason: format!("artifacts in {} were built for '{}'", self.dir.display(), tag),
                });
            }
        }

        tracing::info!("Re-using artifacts for {} from {}", model, self.dir.display());
        Ok(ArtifactBundle {
            model_path: output_dir.join(TRACED_MODEL_FILE),
            config,
            config_path,
            vocab_path: output_dir.join(VOCABULARY_FILE),
        })
    }
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).map_err(|e| AcquireError::InvalidSource {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    fs::write(path, content).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write_artifacts(dir: &Path, task: TaskType) {
        fs::create_dir_all(dir).await.unwrap();
        fs::write(dir.join(TRACED_MODEL_FILE), b"graph").await.unwrap();
        fs::write(dir.join(VOCABULARY_FILE), r#"{"vocabulary":["a"]}"#)
            .await
            .unwrap();
        let config = TrainedModelConfig::for_task(
            task,
            &ml_registry::Tokenization::new(TokenizerKind::Bert, false, 128),
            &ml_registry::TaskSettings::default(),
            None,
        );
        write_json(&dir.join(CONFIG_FILE), &config).await.unwrap();
    }

    #[tokio::test]
    async fn test_local_source_copies_into_output() {
        let temp = TempDir::new().unwrap();
        let previous = temp.path().join("previous");
        write_artifacts(&previous, TaskType::TextEmbedding).await;
        let output = temp.path().join("nested/output");

        let bundle = LocalArtifactSource::new(previous)
            .acquire("org/model", TaskType::TextEmbedding, &output)
            .await
            .unwrap();

        for file in bundle.files() {
            assert!(file.starts_with(&output), "{} not under output", file.display());
            assert!(file.exists());
        }
        assert_eq!(bundle.config.task_tag(), Some("text_embedding"));
    }

    #[tokio::test]
    async fn test_local_source_in_place() {
        let temp = TempDir::new().unwrap();
        write_artifacts(temp.path(), TaskType::FillMask).await;

        let bundle = LocalArtifactSource::new(temp.path().to_path_buf())
            .acquire("org/model", TaskType::FillMask, temp.path())
            .await
            .unwrap();

        assert_eq!(bundle.model_path, temp.path().join(TRACED_MODEL_FILE));
    }

    #[tokio::test]
    async fn test_local_source_same_dir_by_another_path() {
        let temp = TempDir::new().unwrap();
        let models = temp.path().join("models");
        write_artifacts(&models, TaskType::TextEmbedding).await;
        let artifacts = models.join("..").join("models");

        let bundle = LocalArtifactSource::new(artifacts)
            .acquire("org/model", TaskType::TextEmbedding, &models)
            .await
            .unwrap();

        assert_eq!(fs::read(&bundle.model_path).await.unwrap(), b"graph");
        assert_eq!(
            fs::read_to_string(&bundle.vocab_path).await.unwrap(),
            r#"{"vocabulary":["a"]}"#
        );
        assert_eq!(bundle.config.task_tag(), Some("text_embedding"));
    }

    #[tokio::test]
    async fn test_local_source_rejects_other_task() {
        let temp = TempDir::new().unwrap();
        write_artifacts(temp.path(), TaskType::FillMask).await;

        let err = LocalArtifactSource::new(temp.path().to_path_buf())
            .acquire("org/model", TaskType::Ner, temp.path())
            .await
            .unwrap_err();

        assert!(matches!(err, AcquireError::UnsupportedTask { .. }));
    }

    #[tokio::test]
    async fn test_local_source_missing_files() {
        let temp = TempDir::new().unwrap();

        let err = LocalArtifactSource::new(temp.path().join("empty"))
            .acquire("org/model", TaskType::FillMask, &temp.path().join("out"))
            .await
            .unwrap_err();

        assert!(matches!(err, AcquireError::InvalidSource { .. }));
    }
}
