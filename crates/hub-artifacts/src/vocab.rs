//! Build registry vocabularies from hub tokenizer files.

use std::collections::HashMap;

use serde_json::Value;

use ml_registry::{TokenizerKind, Vocabulary};

use crate::error::{AcquireError, Result};

/// Hub files each tokenizer family needs, in fetch order.
pub fn required_files(kind: TokenizerKind) -> &'static [&'static str] {
    match kind {
        TokenizerKind::Bert | TokenizerKind::Mpnet => &["vocab.txt"],
        TokenizerKind::Roberta => &["vocab.json", "merges.txt"],
        TokenizerKind::XlmRoberta => &["tokenizer.json"],
    }
}

fn invalid(path: &str, reason: impl Into<String>) -> AcquireError {
    AcquireError::InvalidSource {
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// WordPiece `vocab.txt`: one token per line, line number is the id.
pub fn word_piece(vocab_txt: &str) -> Result<Vocabulary> {
    let tokens: Vec<String> = vocab_txt.lines().map(String::from).collect();
    if tokens.is_empty() {
        return Err(invalid("vocab.txt", "no tokens"));
    }
    Ok(Vocabulary::word_piece(tokens))
}

/// Byte-level BPE: `vocab.json` maps token to id, `merges.txt` lists merges.
pub fn byte_pair(vocab_json: &str, merges_txt: &str) -> Result<Vocabulary> {
    let ids: HashMap<String, usize> =
        serde_json::from_str(vocab_json).map_err(|e| invalid("vocab.json", e.to_string()))?;

    let mut slots: Vec<Option<String>> = vec![None; ids.len()];
    for (token, id) in ids {
        let slot = slots
            .get_mut(id)
            .ok_or_else(|| invalid("vocab.json", format!("id {} out of range", id)))?;
        if slot.replace(token).is_some() {
            return Err(invalid("vocab.json", format!("duplicate id {}", id)));
        }
    }
    // Every slot is filled: ids are unique and all below the token count
    let vocabulary: Vec<String> = slots.into_iter().flatten().collect();
    if vocabulary.is_empty() {
        return Err(invalid("vocab.json", "no tokens"));
    }

    let merges = merges_txt
        .lines()
        .filter(|line| !line.starts_with("#version") && !line.trim().is_empty())
        .map(String::from)
        .collect();

    Ok(Vocabulary {
        vocabulary,
        merges: Some(merges),
        scores: None,
    })
}

/// Unigram (sentencepiece) vocabulary from a `tokenizer.json`.
pub fn unigram(tokenizer_json: &str) -> Result<Vocabulary> {
    let root: Value =
        serde_json::from_str(tokenizer_json).map_err(|e| invalid("tokenizer.json", e.to_string()))?;

    let model = &root["model"];
    if model["type"].as_str() != Some("Unigram") {
        return Err(invalid("tokenizer.json", "model is not a Unigram tokenizer"));
    }
    let entries = model["vocab"]
        .as_array()
        .ok_or_else(|| invalid("tokenizer.json", "missing model.vocab"))?;

    let mut vocabulary = Vec::with_capacity(entries.len());
    let mut scores = Vec::with_capacity(entries.len());
    for entry in entries {
        let (Some(piece), Some(score)) = (entry[0].as_str(), entry[1].as_f64()) else {
            return Err(invalid("tokenizer.json", format!("bad vocab entry {}", entry)));
        };
        vocabulary.push(piece.to_string());
        scores.push(score);
    }
    if vocabulary.is_empty() {
        return Err(invalid("tokenizer.json", "no tokens"));
    }

    Ok(Vocabulary {
        vocabulary,
        merges: None,
        scores: Some(scores),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_piece_keeps_line_order() {
        let vocab = word_piece("[PAD]\n[UNK]\n[CLS]\n[SEP]\nhello\n").unwrap();
        assert_eq!(vocab.vocabulary, vec!["[PAD]", "[UNK]", "[CLS]", "[SEP]", "hello"]);
        assert!(vocab.merges.is_none());
    }

    #[test]
    fn test_word_piece_handles_crlf() {
        let vocab = word_piece("[PAD]\r\n[UNK]\r\n").unwrap();
        assert_eq!(vocab.vocabulary, vec!["[PAD]", "[UNK]"]);
    }

    #[test]
    fn test_empty_vocab_txt_is_invalid() {
        assert!(matches!(word_piece(""), Err(AcquireError::InvalidSource { .. })));
    }

    #[test]
    fn test_byte_pair_orders_by_id_and_skips_header() {
        let vocab = byte_pair(
            r#"{"<s>": 0, "Ġthe": 2, "</s>": 1}"#,
            "#version: 0.2\nĠ t\nh e\n\n",
        )
        .unwrap();
        assert_eq!(vocab.vocabulary, vec!["<s>", "</s>", "Ġthe"]);
        assert_eq!(vocab.merges.unwrap(), vec!["Ġ t", "h e"]);
    }

    #[test]
    fn test_byte_pair_rejects_gaps() {
        let err = byte_pair(r#"{"a": 0, "b": 5}"#, "").unwrap_err();
        assert!(matches!(err, AcquireError::InvalidSource { .. }));
    }

    #[test]
    fn test_unigram_scores() {
        let vocab = unigram(
            r#"{"model": {"type": "Unigram", "unk_id": 3, "vocab": [["<s>", 0.0], ["▁the", -3.5]]}}"#,
        )
        .unwrap();
        assert_eq!(vocab.vocabulary, vec!["<s>", "▁the"]);
        assert_eq!(vocab.scores.unwrap(), vec![0.0, -3.5]);
    }

    #[test]
    fn test_unigram_rejects_other_models() {
        let err = unigram(r#"{"model": {"type": "WordPiece", "vocab": {}}}"#).unwrap_err();
        assert!(matches!(err, AcquireError::InvalidSource { .. }));
    }

    #[test]
    fn test_required_files() {
        assert_eq!(required_files(TokenizerKind::Roberta), &["vocab.json", "merges.txt"]);
    }
}
