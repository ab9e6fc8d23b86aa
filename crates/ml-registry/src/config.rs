//! Trained-model configuration document sent when a model is created.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::TaskType;

/// Name of the single input field the registry feeds text through.
pub const DEFAULT_INPUT_FIELD: &str = "text_field";

/// Model configuration as accepted by `PUT _ml/trained_models/{id}`.
///
/// `inference_config` holds exactly one entry keyed by the task tag. Fields
/// absent from a parsed document stay absent when it is serialized again,
/// and top-level fields not modelled here are carried in `extra`, so an
/// operator-supplied override reaches the cluster as written.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrainedModelConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub inference_config: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<ModelInput>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,

    /// Top-level fields such as `tags` or `platform_architecture`
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInput {
    pub field_names: Vec<String>,
}

impl Default for ModelInput {
    fn default() -> Self {
        Self {
            field_names: vec![DEFAULT_INPUT_FIELD.to_string()],
        }
    }
}

/// Model type of every traced model this crate builds.
pub const PYTORCH_MODEL_TYPE: &str = "pytorch";

/// Tokenizer family the registry uses to prepare model input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    Bert,
    Mpnet,
    Roberta,
    XlmRoberta,
}

impl TokenizerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenizerKind::Bert => "bert",
            TokenizerKind::Mpnet => "mpnet",
            TokenizerKind::Roberta => "roberta",
            TokenizerKind::XlmRoberta => "xlm_roberta",
        }
    }

    /// Whether position ids are offset by the padding index, which costs two
    /// usable positions.
    pub fn offsets_positions(&self) -> bool {
        !matches!(self, TokenizerKind::Bert)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tokenization {
    pub kind: TokenizerKind,
    pub do_lower_case: bool,
    pub with_special_tokens: bool,
    pub max_sequence_length: usize,
    pub truncate: Truncate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truncate {
    First,
    Second,
    None,
}

impl Truncate {
    fn as_str(&self) -> &'static str {
        match self {
            Truncate::First => "first",
            Truncate::Second => "second",
            Truncate::None => "none",
        }
    }
}

impl Tokenization {
    pub fn new(kind: TokenizerKind, do_lower_case: bool, max_sequence_length: usize) -> Self {
        Self {
            kind,
            do_lower_case,
            with_special_tokens: true,
            max_sequence_length,
            truncate: Truncate::First,
        }
    }

    fn to_json(&self) -> Value {
        let mut body = json!({
            "with_special_tokens": self.with_special_tokens,
            "max_sequence_length": self.max_sequence_length,
            "truncate": self.truncate.as_str(),
        });
        // Byte-level BPE tokenizers have no lower-casing option
        if !matches!(self.kind, TokenizerKind::Roberta) {
            body["do_lower_case"] = Value::Bool(self.do_lower_case);
        }
        let mut wrapped = Map::new();
        wrapped.insert(self.kind.as_str().to_string(), body);
        Value::Object(wrapped)
    }
}

/// Task-specific settings layered on top of tokenization.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskSettings {
    pub embedding_size: Option<usize>,
    pub classification_labels: Option<Vec<String>>,
}

impl TrainedModelConfig {
    /// Build the configuration for a model with the given tokenization.
    pub fn for_task(
        task: TaskType,
        tokenization: &Tokenization,
        settings: &TaskSettings,
        description: Option<String>,
    ) -> Self {
        let mut body = Map::new();
        body.insert("tokenization".to_string(), tokenization.to_json());

        match task {
            TaskType::TextEmbedding => {
                if let Some(size) = settings.embedding_size {
                    body.insert("embedding_size".to_string(), json!(size));
                }
            }
            TaskType::Ner | TaskType::TextClassification => {
                if let Some(labels) = &settings.classification_labels {
                    body.insert("classification_labels".to_string(), json!(labels));
                }
            }
            TaskType::ZeroShotClassification => {
                if let Some(labels) = &settings.classification_labels {
                    body.insert("classification_labels".to_string(), json!(labels));
                }
                body.insert(
                    "hypothesis_template".to_string(),
                    json!("This example is {}."),
                );
                body.insert("multi_label".to_string(), json!(false));
            }
            TaskType::QuestionAnswering => {
                body.insert("max_answer_length".to_string(), json!(15));
            }
            TaskType::FillMask
            | TaskType::TextSimilarity
            | TaskType::PassThrough
            | TaskType::TextExpansion => {}
        }

        let mut inference_config = Map::new();
        inference_config.insert(task.as_str().to_string(), Value::Object(body));

        Self {
            description,
            model_type: Some(PYTORCH_MODEL_TYPE.to_string()),
            inference_config,
            input: Some(ModelInput::default()),
            metadata: None,
            extra: Map::new(),
        }
    }

    /// Task tag of the first inference config entry, if any.
    pub fn task_tag(&self) -> Option<&str> {
        self.inference_config.keys().next().map(String::as_str)
    }
}

/// Order an `id2label` map by numeric id.
///
/// Hub configs key labels by stringified ids ("0", "1", ...). Keys that are
/// not integers sort after numeric ones in lexical order.
pub fn labels_in_id_order(id2label: &Map<String, Value>) -> Vec<String> {
    let mut numeric: BTreeMap<u64, String> = BTreeMap::new();
    let mut other: BTreeMap<String, String> = BTreeMap::new();

    for (key, value) in id2label {
        let label = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        match key.parse::<u64>() {
            Ok(id) => {
                numeric.insert(id, label);
            }
            Err(_) => {
                other.insert(key.clone(), label);
            }
        }
    }

    numeric.into_values().chain(other.into_values()).collect()
}
