//! Vocabulary document stored alongside a model definition.

use serde::{Deserialize, Serialize};

/// Body of `PUT _ml/trained_models/{id}/vocabulary`.
///
/// `merges` is present for byte-level BPE tokenizers, `scores` for
/// unigram (sentencepiece) tokenizers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub vocabulary: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merges: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<Vec<f64>>,
}

impl Vocabulary {
    pub fn word_piece(tokens: Vec<String>) -> Self {
        Self {
            vocabulary: tokens,
            merges: None,
            scores: None,
        }
    }

    pub fn len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocabulary.is_empty()
    }
}
