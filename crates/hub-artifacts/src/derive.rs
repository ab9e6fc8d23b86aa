//! Derive a trained-model configuration from hub metadata files.

use serde::Deserialize;
use serde_json::{Map, Value};

use ml_registry::{
    TaskSettings, TaskType, Tokenization, TokenizerKind, TrainedModelConfig, labels_in_id_order,
};

use crate::error::{AcquireError, Result};

/// Fallback when neither the tokenizer nor the model declares a limit.
const DEFAULT_MAX_SEQUENCE_LENGTH: usize = 512;

/// Tokenizers without a real limit report a sentinel around 1e30.
const MAX_PLAUSIBLE_SEQUENCE_LENGTH: f64 = 65_536.0;

/// The subset of a hub `config.json` needed for registration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubModelConfig {
    pub model_type: Option<String>,
    pub hidden_size: Option<usize>,
    /// DistilBERT names its hidden size `dim`
    pub dim: Option<usize>,
    pub max_position_embeddings: Option<usize>,
    pub id2label: Option<Map<String, Value>>,
}

/// The subset of a hub `tokenizer_config.json` needed for registration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubTokenizerConfig {
    pub do_lower_case: Option<bool>,
    pub model_max_length: Option<f64>,
}

impl HubModelConfig {
    pub fn parse(json: &str, path: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| AcquireError::InvalidSource {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn embedding_size(&self) -> Option<usize> {
        self.hidden_size.or(self.dim)
    }
}

impl HubTokenizerConfig {
    pub fn parse(json: &str, path: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| AcquireError::InvalidSource {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Map a hub `model_type` onto the registry's tokenizer families.
pub fn tokenizer_kind(model_type: &str) -> Option<TokenizerKind> {
    match model_type {
        "bert" | "distilbert" | "electra" | "mobilebert" => Some(TokenizerKind::Bert),
        "mpnet" => Some(TokenizerKind::Mpnet),
        "roberta" | "bart" => Some(TokenizerKind::Roberta),
        "xlm-roberta" => Some(TokenizerKind::XlmRoberta),
        _ => None,
    }
}

/// Resolve the tokenizer family, failing for architectures the registry cannot serve.
pub fn resolve_kind(model: &str, hub: &HubModelConfig) -> Result<TokenizerKind> {
    let model_type = hub.model_type.as_deref().unwrap_or("unknown");
    tokenizer_kind(model_type).ok_or_else(|| AcquireError::UnsupportedModel {
        model: model.to_string(),
        model_type: model_type.to_string(),
    })
}

/// Longest input the model accepts, in tokens.
pub fn max_sequence_length(
    kind: TokenizerKind,
    hub: &HubModelConfig,
    tokenizer: &HubTokenizerConfig,
) -> usize {
    if let Some(limit) = tokenizer.model_max_length {
        if limit > 0.0 && limit <= MAX_PLAUSIBLE_SEQUENCE_LENGTH {
            return limit as usize;
        }
    }

    match hub.max_position_embeddings {
        Some(positions) if kind.offsets_positions() && positions > 2 => positions - 2,
        Some(positions) => positions,
        None => DEFAULT_MAX_SEQUENCE_LENGTH,
    }
}

/// Build the registry configuration for `model` serving `task`.
pub fn derive_config(
    model: &str,
    task: TaskType,
    kind: TokenizerKind,
    hub: &HubModelConfig,
    tokenizer: &HubTokenizerConfig,
) -> Result<TrainedModelConfig> {
    let tokenization = Tokenization::new(
        kind,
        tokenizer.do_lower_case.unwrap_or(false),
        max_sequence_length(kind, hub, tokenizer),
    );

    let unsupported = |reason: &str| AcquireError::UnsupportedTask {
        model: model.to_string(),
        task,
        reason: reason.to_string(),
    };

    let labels = hub
        .id2label
        .as_ref()
        .map(labels_in_id_order)
        .filter(|labels| !labels.is_empty());

    let settings = match task {
        TaskType::TextEmbedding => TaskSettings {
            embedding_size: hub.embedding_size(),
            ..Default::default()
        },
        TaskType::Ner | TaskType::TextClassification => TaskSettings {
            classification_labels: Some(
                labels.ok_or_else(|| unsupported("config.json has no id2label"))?,
            ),
            ..Default::default()
        },
        TaskType::ZeroShotClassification => {
            let labels = labels.ok_or_else(|| unsupported("config.json has no id2label"))?;
            if !labels.iter().any(|l| l.eq_ignore_ascii_case("entailment")) {
                return Err(unsupported("zero-shot models need an 'entailment' label"));
            }
            TaskSettings {
                classification_labels: Some(labels),
                ..Default::default()
            }
        }
        _ => TaskSettings::default(),
    };

    let description = format!("Model {} for task type '{}'", model, task);
    Ok(TrainedModelConfig::for_task(
        task,
        &tokenization,
        &settings,
        Some(description),
    ))
}
