//! ModelId: key of a model in the trained-model registry.
//!
//! The cluster accepts up to 64 characters of lowercase alphanumerics,
//! `-`, `_` and `.`, starting and ending with an alphanumeric.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::TaskType;

/// Longest id the registry accepts.
pub const MAX_MODEL_ID_LEN: usize = 64;

static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s\\/]").unwrap());
static VALID_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9](?:[a-z0-9_.\-]*[a-z0-9])?$").unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelIdError {
    #[error("Model id is empty")]
    Empty,
    #[error("Model id '{0}' is longer than {MAX_MODEL_ID_LEN} characters")]
    TooLong(String),
    #[error(
        "Invalid model id '{0}': use lowercase alphanumerics, '-', '_' or '.', starting and ending with an alphanumeric"
    )]
    InvalidFormat(String),
}

/// Registry key for an imported model.
///
/// # Examples
/// ```
/// use ml_registry::{ModelId, TaskType};
///
/// let id = ModelId::derive("sentence-transformers/msmarco-MiniLM-L-12-v3", TaskType::TextEmbedding);
/// assert_eq!(id.as_str(), "sentence-transformers__msmarco-minilm-l-12-v3__text_embedding");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelId(String);

impl ModelId {
    /// Derive the registry key for a hub model and task.
    ///
    /// Pure: the same `(source, task)` always yields the same id. Separators
    /// become `__`, other characters the registry rejects become `_`, and
    /// only the trailing 64 characters are kept so the task suffix survives
    /// long repository names.
    pub fn derive(source: &str, task: TaskType) -> Self {
        let joined = format!("{}__{}", source.trim(), task.as_str());
        let separated = SEPARATORS.replace_all(&joined, "__").to_lowercase();

        let cleaned: Vec<char> = separated
            .chars()
            .map(|c| {
                if c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        let start = cleaned.len().saturating_sub(MAX_MODEL_ID_LEN);
        let tail: String = cleaned[start..].iter().collect();
        let trimmed = tail.trim_matches(|c: char| !c.is_ascii_alphanumeric());

        Self(trimmed.to_string())
    }

    /// Validate an operator-supplied id.
    pub fn parse(s: &str) -> Result<Self, ModelIdError> {
        if s.is_empty() {
            return Err(ModelIdError::Empty);
        }
        if s.len() > MAX_MODEL_ID_LEN {
            return Err(ModelIdError::TooLong(s.to_string()));
        }
        if !VALID_ID.is_match(s) {
            return Err(ModelIdError::InvalidFormat(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ModelId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ModelId {
    type Err = ModelIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for ModelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_replaces_namespace_separator() {
        let id = ModelId::derive("sentence-transformers/msmarco-MiniLM-L-12-v3", TaskType::TextEmbedding);
        assert_eq!(
            id.as_str(),
            "sentence-transformers__msmarco-minilm-l-12-v3__text_embedding"
        );
        assert!(ModelId::parse(id.as_str()).is_ok());
    }

    #[test]
    fn test_derive_is_deterministic() {
        let a = ModelId::derive("elastic/distilbert-base-cased-finetuned-conll03-english", TaskType::Ner);
        let b = ModelId::derive("elastic/distilbert-base-cased-finetuned-conll03-english", TaskType::Ner);
        assert_eq!(a, b);
    }

    #[test]
    fn test_derive_distinguishes_tasks() {
        let embedding = ModelId::derive("org/model", TaskType::TextEmbedding);
        let similarity = ModelId::derive("org/model", TaskType::TextSimilarity);
        assert_ne!(embedding, similarity);
    }

    #[test]
    fn test_derive_keeps_trailing_64_chars() {
        let long = format!("org/{}", "a".repeat(100));
        let id = ModelId::derive(&long, TaskType::FillMask);
        assert_eq!(id.as_str().len(), MAX_MODEL_ID_LEN);
        assert!(id.as_str().ends_with("__fill_mask"));
        assert!(ModelId::parse(id.as_str()).is_ok());
    }

    #[test]
    fn test_derive_strips_leading_separators() {
        // Truncation can land on a separator; the id must still start alphanumeric
        let source = format!("{}/{}", "x".repeat(3), "b".repeat(57));
        let id = ModelId::derive(&source, TaskType::Ner);
        assert!(id.as_str().starts_with('b'));
        assert!(ModelId::parse(id.as_str()).is_ok());
    }

    #[test]
    fn test_derive_replaces_invalid_characters() {
        let id = ModelId::derive("Org Name\\Model:v2", TaskType::PassThrough);
        assert_eq!(id.as_str(), "org__name__model_v2__pass_through");
    }

    #[test]
    fn test_parse_rejects_invalid_ids() {
        assert_eq!(ModelId::parse(""), Err(ModelIdError::Empty));
        assert!(matches!(ModelId::parse("Upper"), Err(ModelIdError::InvalidFormat(_))));
        assert!(matches!(ModelId::parse("_lead"), Err(ModelIdError::InvalidFormat(_))));
        assert!(matches!(ModelId::parse("trail-"), Err(ModelIdError::InvalidFormat(_))));
        assert!(matches!(
            ModelId::parse(&"a".repeat(65)),
            Err(ModelIdError::TooLong(_))
        ));
        assert!(ModelId::parse("sentence-transformers__msmarco-minilm-l-12-v3").is_ok());
    }
}
