//! Extraction response parsing
//!
//! The service is asked for bare JSON but sometimes wraps it in a markdown
//! code fence. After cleanup the payload must be an object with an `items`
//! array; `title` and `description` fall back to defaults.

use serde_json::Value;

use vocab_audio_core::vocab::{DEFAULT_LIST_DESCRIPTION, DEFAULT_LIST_TITLE};
use vocab_audio_core::{VocabItem, VocabList};

use crate::LlmError;

/// Remove a leading ```` ```json ```` / ```` ``` ```` fence and its closing fence
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let inner = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest
    } else {
        return trimmed;
    };

    let inner = inner.trim();
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Text of one item field
///
/// Models occasionally return lists (`["a", "b"]`) or numbers where a string
/// is expected. Scalars are stringified and arrays joined with ", "; objects
/// carry no usable text and count as absent.
fn field_text(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| field_text(Some(part)))
            .collect::<Vec<_>>()
            .join(", "),
        Value::Null | Value::Object(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// `None` for non-object items and items without a source word
fn parse_item(item: &Value) -> Option<VocabItem> {
    let fields = item.as_object()?;
    let field = |key: &str| field_text(fields.get(key));

    Some(VocabItem {
        source_word: field("sourceWord")?,
        target_translation: field("targetTranslation").unwrap_or_default(),
        secondary_translation: field("secondaryTranslation"),
        example_sentence: field("exampleSentence"),
        alternate_meanings: field("alternateMeanings"),
        elaboration: field("elaboration"),
    })
}

/// Parse the assistant message content into a vocabulary list
pub fn parse_vocab_response(content: &str) -> Result<VocabList, LlmError> {
    let cleaned = strip_code_fences(content);

    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| LlmError::InvalidResponse(format!("Invalid JSON response: {}", e)))?;

    let object = value
        .as_object()
        .ok_or_else(|| LlmError::InvalidResponse("Parsed data is not an object".to_string()))?;

    let items = match object.get("items") {
        Some(Value::Array(items)) => items,
        _ => {
            return Err(LlmError::InvalidResponse(
                "Parsed data does not contain items array".to_string(),
            ))
        },
    };

    let text_field = |key: &str, default: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(default)
            .to_string()
    };

    let mut parsed = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match parse_item(item) {
            Some(item) => parsed.push(item),
            None => tracing::warn!(index, "Skipping item without a usable source word"),
        }
    }

    Ok(VocabList::new(
        text_field("title", DEFAULT_LIST_TITLE),
        text_field("description", DEFAULT_LIST_DESCRIPTION),
        parsed,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```  "), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_fenced_payload() {
        let content = r#"```json
{
  "title": "Les 4",
  "items": [
    {"sourceWord": "huis", "targetTranslation": "ev", "secondaryTranslation": "дом",
     "exampleSentence": "Het huis is groot.", "alternateMeanings": "", "elaboration": null},
    {"sourceWord": "  ", "targetTranslation": "boş"}
  ]
}
```"#;

        let list = parse_vocab_response(content).unwrap();
        assert_eq!(list.title, "Les 4");
        assert_eq!(list.description, DEFAULT_LIST_DESCRIPTION);
        assert_eq!(list.items.len(), 1);

        let item = &list.items[0];
        assert_eq!(item.source_word, "huis");
        assert_eq!(item.secondary_translation.as_deref(), Some("дом"));
        assert_eq!(item.alternate_meanings, None);
        assert_eq!(item.elaboration, None);
    }

    #[test]
    fn test_irregular_items_do_not_sink_the_response() {
        let content = r#"{
  "items": [
    {"sourceWord": "fiets", "targetTranslation": "bisiklet",
     "alternateMeanings": ["rijwiel", "tweewieler"], "elaboration": {"note": "de"}},
    {"sourceWord": 12, "targetTranslation": "on iki"},
    "boom",
    {"sourceWord": ["", " "], "targetTranslation": "boş"},
    {"sourceWord": "stoel", "targetTranslation": "sandalye"}
  ]
}"#;

        let list = parse_vocab_response(content).unwrap();
        let words: Vec<&str> = list.items.iter().map(|i| i.source_word.as_str()).collect();
        assert_eq!(words, vec!["fiets", "12", "stoel"]);

        let fiets = &list.items[0];
        assert_eq!(fiets.alternate_meanings.as_deref(), Some("rijwiel, tweewieler"));
        assert_eq!(fiets.elaboration, None);
        assert_eq!(list.items[2].target_translation, "sandalye");
    }

    #[test]
    fn test_defaults_applied() {
        let list = parse_vocab_response(r#"{"items": []}"#).unwrap();
        assert_eq!(list.title, DEFAULT_LIST_TITLE);
        assert!(list.is_empty());
    }

    #[test]
    fn test_missing_items_rejected() {
        let err = parse_vocab_response(r#"{"title": "x"}"#).unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(ref m) if m.contains("items array")));

        let err = parse_vocab_response(r#"{"items": {"sourceWord": "x"}}"#).unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }

    #[test]
    fn test_non_json_rejected() {
        let err = parse_vocab_response("Sure! Here is your list: huis - ev").unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(ref m) if m.contains("Invalid JSON")));

        let err = parse_vocab_response("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(ref m) if m.contains("not an object")));
    }
}
