//! Inference task types understood by the trained-model registry.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unsupported task type '{0}' (expected one of: {list})", list = TaskType::tags().join(", "))]
pub struct UnknownTask(pub String);

/// The inference task a model performs.
///
/// The tag doubles as the key of the task body inside a trained-model
/// `inference_config`, so it must match the cluster's spelling exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    FillMask,
    Ner,
    TextClassification,
    TextEmbedding,
    ZeroShotClassification,
    QuestionAnswering,
    TextSimilarity,
    PassThrough,
    TextExpansion,
}

impl TaskType {
    pub const ALL: [TaskType; 9] = [
        TaskType::FillMask,
        TaskType::Ner,
        TaskType::TextClassification,
        TaskType::TextEmbedding,
        TaskType::ZeroShotClassification,
        TaskType::QuestionAnswering,
        TaskType::TextSimilarity,
        TaskType::PassThrough,
        TaskType::TextExpansion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::FillMask => "fill_mask",
            TaskType::Ner => "ner",
            TaskType::TextClassification => "text_classification",
            TaskType::TextEmbedding => "text_embedding",
            TaskType::ZeroShotClassification => "zero_shot_classification",
            TaskType::QuestionAnswering => "question_answering",
            TaskType::TextSimilarity => "text_similarity",
            TaskType::PassThrough => "pass_through",
            TaskType::TextExpansion => "text_expansion",
        }
    }

    fn tags() -> Vec<&'static str> {
        Self::ALL.iter().map(TaskType::as_str).collect()
    }
}

impl Display for TaskType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = UnknownTask;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|task| task.as_str() == s)
            .ok_or_else(|| UnknownTask(s.to_string()))
    }
}

impl serde::Serialize for TaskType {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for TaskType {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
