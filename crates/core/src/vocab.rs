//! Vocabulary items and lists

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const DEFAULT_LIST_TITLE: &str = "Extracted Vocabulary List";
pub const DEFAULT_LIST_DESCRIPTION: &str = "Vocabulary extracted from PDF";

/// One vocabulary entry
///
/// Items are immutable once produced by extraction. The identity key used
/// for de-duplication is the case-folded source word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VocabItem {
    pub source_word: String,
    #[serde(default)]
    pub target_translation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_translation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_sentence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_meanings: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elaboration: Option<String>,
}

impl VocabItem {
    pub fn new(source_word: impl Into<String>, target_translation: impl Into<String>) -> Self {
        Self {
            source_word: source_word.into(),
            target_translation: target_translation.into(),
            ..Default::default()
        }
    }

    pub fn with_secondary(mut self, translation: impl Into<String>) -> Self {
        self.secondary_translation = Some(translation.into());
        self
    }

    pub fn with_sentence(mut self, sentence: impl Into<String>) -> Self {
        self.example_sentence = Some(sentence.into());
        self
    }

    pub fn with_alternate_meanings(mut self, meanings: impl Into<String>) -> Self {
        self.alternate_meanings = Some(meanings.into());
        self
    }

    pub fn with_elaboration(mut self, elaboration: impl Into<String>) -> Self {
        self.elaboration = Some(elaboration.into());
        self
    }

    /// Case-folded source word
    pub fn identity_key(&self) -> String {
        self.source_word.trim().to_lowercase()
    }

    /// Alternate meanings and elaboration as one utterance, if either is set
    ///
    /// Renders as `Alternate meanings: X. <elaboration>`.
    pub fn supplementary_text(&self) -> Option<String> {
        let mut text = String::new();
        if let Some(meanings) = non_blank(&self.alternate_meanings) {
            text.push_str(&format!("Alternate meanings: {}. ", meanings));
        }
        if let Some(elaboration) = non_blank(&self.elaboration) {
            text.push_str(elaboration);
        }
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

/// Trimmed field value, `None` when missing or blank
pub fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// A titled, ordered vocabulary list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabList {
    pub title: String,
    pub description: String,
    pub items: Vec<VocabItem>,
}

impl Default for VocabList {
    fn default() -> Self {
        Self {
            title: DEFAULT_LIST_TITLE.to_string(),
            description: DEFAULT_LIST_DESCRIPTION.to_string(),
            items: Vec::new(),
        }
    }
}

impl VocabList {
    pub fn new(title: impl Into<String>, description: impl Into<String>, items: Vec<VocabItem>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Keep the first item per case-folded source word, preserving order
///
/// Items with a blank source word are dropped.
pub fn dedupe_by_source_word(items: impl IntoIterator<Item = VocabItem>) -> Vec<VocabItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| {
            let key = item.identity_key();
            !key.is_empty() && seen.insert(key)
        })
        .collect()
}
