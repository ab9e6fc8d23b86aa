//! End-to-end import tests with a fixture source and the in-memory registry.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tempfile::TempDir;

use hub_artifacts::{
    AcquireError, ArtifactBundle, CONFIG_FILE, ModelSource, SOURCE_DIR, TRACED_MODEL_FILE,
    VOCABULARY_FILE,
};
use ml_registry::{
    ExistsPolicy, InMemoryRegistry, ModelId, RegistryCall, RegistryError, TaskSettings, TaskType,
    Tokenization, TokenizerKind, TrainedModelConfig, UploadOptions,
};
use model_import::{CleanupPolicy, ImportError, ImportRequest, ImportStage, run_import};

const MODEL: &str = "sentence-transformers/msmarco-MiniLM-L-12-v3";
const MODEL_BYTES: &[u8] = b"traced-model-graph-bytes";

/// Writes a fixed bundle, the way a hub source would after tracing.
#[derive(Default)]
struct FixtureSource {
    acquired: AtomicUsize,
}

#[async_trait]
impl ModelSource for FixtureSource {
    async fn acquire(
        &self,
        _model: &str,
        task: TaskType,
        output_dir: &Path,
    ) -> Result<ArtifactBundle, AcquireError> {
        self.acquired.fetch_add(1, Ordering::SeqCst);

        std::fs::create_dir_all(output_dir.join(SOURCE_DIR))?;
        std::fs::write(output_dir.join(SOURCE_DIR).join("vocab.txt"), "[PAD]\n[UNK]\n")?;

        let config = TrainedModelConfig::for_task(
            task,
            &Tokenization::new(TokenizerKind::Bert, true, 512),
            &TaskSettings {
                embedding_size: Some(384),
                ..Default::default()
            },
            Some("fixture".to_string()),
        );
        let config_path = output_dir.join(CONFIG_FILE);
        std::fs::write(&config_path, serde_json::to_string(&config).unwrap())?;

        let model_path = output_dir.join(TRACED_MODEL_FILE);
        std::fs::write(&model_path, MODEL_BYTES)?;
        let vocab_path = output_dir.join(VOCABULARY_FILE);
        std::fs::write(&vocab_path, r#"{"vocabulary":["[PAD]","[UNK]"]}"#)?;

        Ok(ArtifactBundle {
            model_path,
            config,
            config_path,
            vocab_path,
        })
    }
}

/// Fails every acquisition as an unknown hub model would.
struct MissingModelSource;

#[async_trait]
impl ModelSource for MissingModelSource {
    async fn acquire(
        &self,
        model: &str,
        _task: TaskType,
        _output_dir: &Path,
    ) -> Result<ArtifactBundle, AcquireError> {
        Err(AcquireError::ModelNotFound(model.to_string()))
    }
}

fn request(output_dir: &Path) -> ImportRequest {
    let mut request = ImportRequest::new(MODEL, TaskType::TextEmbedding, output_dir.to_path_buf());
    request.upload = UploadOptions {
        chunk_size: 8,
        ..Default::default()
    };
    request
}

#[tokio::test]
async fn test_import_registers_acquired_bundle() {
    let temp = TempDir::new().unwrap();
    let registry = InMemoryRegistry::new();
    let source = FixtureSource::default();

    let outcome = run_import(&source, &registry, &request(temp.path()))
        .await
        .unwrap();

    let id = ModelId::derive(MODEL, TaskType::TextEmbedding);
    assert_eq!(outcome.model_id, id);
    assert!(!outcome.config_overridden);
    assert!(!outcome.cleaned_up);
    assert_eq!(outcome.summary.total_parts, 3);
    assert_eq!(outcome.summary.total_bytes, MODEL_BYTES.len() as u64);

    let stored = registry.model(&id).unwrap();
    assert_eq!(stored.config, outcome.bundle.config);
    assert_eq!(stored.definition().unwrap(), MODEL_BYTES);
    assert_eq!(stored.vocabulary.unwrap().len(), 2);
    assert_eq!(source.acquired.load(Ordering::SeqCst), 1);

    // Artifacts are kept by default
    for file in outcome.bundle.files() {
        assert!(file.exists());
    }
}

#[tokio::test]
async fn test_failed_acquisition_never_contacts_registry() {
    let temp = TempDir::new().unwrap();
    let registry = InMemoryRegistry::new();

    let err = run_import(&MissingModelSource, &registry, &request(temp.path()))
        .await
        .unwrap_err();

    assert_eq!(err.stage(), ImportStage::Acquiring);
    assert!(matches!(err, ImportError::Acquire(AcquireError::ModelNotFound(_))));
    assert!(registry.calls().is_empty());
    assert_eq!(registry.model_count(), 0);
}

#[tokio::test]
async fn test_override_replaces_derived_config() {
    let temp = TempDir::new().unwrap();
    let registry = InMemoryRegistry::new();
    let override_config: TrainedModelConfig = serde_json::from_str(
        r#"{"description": "operator supplied", "inference_config": {"text_embedding": {"embedding_size": 768}}}"#,
    )
    .unwrap();

    let mut request = request(temp.path());
    request.config_override = Some(override_config.clone());
    let outcome = run_import(&FixtureSource::default(), &registry, &request)
        .await
        .unwrap();

    assert!(outcome.config_overridden);
    let stored = registry.model(&outcome.model_id).unwrap();
    assert_eq!(stored.config, override_config);
    assert_ne!(stored.config, outcome.bundle.config);
}

#[tokio::test]
async fn test_empty_override_is_used_verbatim() {
    let temp = TempDir::new().unwrap();
    let registry = InMemoryRegistry::new();
    let empty: TrainedModelConfig = serde_json::from_str("{}").unwrap();

    let mut request = request(temp.path());
    request.config_override = Some(empty);
    let outcome = run_import(&FixtureSource::default(), &registry, &request)
        .await
        .unwrap();

    assert!(outcome.config_overridden);
    let stored = registry.model(&outcome.model_id).unwrap().config;
    assert_eq!(serde_json::to_value(&stored).unwrap(), serde_json::json!({}));
}

#[tokio::test]
async fn test_creates_nested_output_dir() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("a/b/c");

    let outcome = run_import(
        &FixtureSource::default(),
        &InMemoryRegistry::new(),
        &request(&output),
    )
    .await
    .unwrap();

    assert!(output.is_dir());
    assert!(outcome.bundle.model_path.starts_with(&output));
}

#[tokio::test]
async fn test_explicit_model_id() {
    let temp = TempDir::new().unwrap();
    let registry = InMemoryRegistry::new();
    let id = ModelId::parse("sentence-transformers__msmarco-minilm-l-12-v3").unwrap();

    let mut request = request(temp.path());
    request.model_id = Some(id.clone());
    let outcome = run_import(&FixtureSource::default(), &registry, &request)
        .await
        .unwrap();

    assert_eq!(outcome.model_id, id);
    assert!(registry.model(&id).is_some());
    assert!(
        registry
            .model(&ModelId::derive(MODEL, TaskType::TextEmbedding))
            .is_none()
    );
}

#[tokio::test]
async fn test_same_model_different_tasks_get_distinct_ids() {
    let temp = TempDir::new().unwrap();
    let registry = InMemoryRegistry::new();
    let source = FixtureSource::default();

    let embedding = run_import(&source, &registry, &request(&temp.path().join("embedding")))
        .await
        .unwrap();
    let mut fill_mask = request(&temp.path().join("fill_mask"));
    fill_mask.task = TaskType::FillMask;
    let fill_mask = run_import(&source, &registry, &fill_mask).await.unwrap();

    assert_ne!(embedding.model_id, fill_mask.model_id);
    assert_eq!(registry.model_count(), 2);
}

#[tokio::test]
async fn test_cleanup_removes_artifacts() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("models");
    std::fs::create_dir_all(&output).unwrap();
    std::fs::write(output.join("unrelated.txt"), "keep me").unwrap();

    let mut request = request(&output);
    request.cleanup = CleanupPolicy::RemoveArtifacts;
    let outcome = run_import(&FixtureSource::default(), &InMemoryRegistry::new(), &request)
        .await
        .unwrap();

    assert!(outcome.cleaned_up);
    for file in outcome.bundle.files() {
        assert!(!file.exists(), "{} still present", file.display());
    }
    assert!(!output.join(SOURCE_DIR).exists());
    assert!(output.join("unrelated.txt").exists());
}

#[tokio::test]
async fn test_unreachable_registry_keeps_artifacts() {
    let temp = TempDir::new().unwrap();
    let registry = InMemoryRegistry::new();
    registry.set_unreachable("connection refused");

    let mut request = request(temp.path());
    request.cleanup = CleanupPolicy::RemoveArtifacts;
    let err = run_import(&FixtureSource::default(), &registry, &request)
        .await
        .unwrap_err();

    assert_eq!(err.stage(), ImportStage::Registering);
    assert!(matches!(
        err,
        ImportError::Register {
            source: RegistryError::Connection(_),
            ..
        }
    ));
    assert_eq!(registry.calls(), vec![RegistryCall::Ping]);
    assert!(temp.path().join(TRACED_MODEL_FILE).exists());
}

#[tokio::test]
async fn test_existing_model_with_fail_policy() {
    let temp = TempDir::new().unwrap();
    let registry = InMemoryRegistry::new();
    let source = FixtureSource::default();
    run_import(&source, &registry, &request(temp.path()))
        .await
        .unwrap();

    let mut again = request(temp.path());
    again.upload.exists = ExistsPolicy::Fail;
    let err = run_import(&source, &registry, &again).await.unwrap_err();

    assert!(matches!(
        err,
        ImportError::Register {
            source: RegistryError::AlreadyExists(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_reimport_replaces_existing_model() {
    let temp = TempDir::new().unwrap();
    let registry = InMemoryRegistry::new();
    let source = FixtureSource::default();

    run_import(&source, &registry, &request(temp.path()))
        .await
        .unwrap();
    let second = run_import(&source, &registry, &request(temp.path()))
        .await
        .unwrap();

    assert!(second.summary.replaced);
    assert_eq!(registry.model_count(), 1);
    assert!(registry.calls().contains(&RegistryCall::Delete(second.model_id.clone())));
}
