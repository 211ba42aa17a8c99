//! Prompt Building
//!
//! Constructs the extraction prompt for three-column vocabulary tables.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use unicode_segmentation::UnicodeSegmentation;

use vocab_audio_config::constants::extraction::TRUNCATION_MARKER;
use vocab_audio_config::LanguageNames;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

const SYSTEM_PROMPT: &str = "You are a helpful assistant that extracts vocabulary from text and provides translations. Always respond with valid JSON only.";

/// Builds the system and user messages for one extraction call
#[derive(Debug, Clone, Default)]
pub struct ExtractionPrompt {
    languages: LanguageNames,
}

impl ExtractionPrompt {
    pub fn new(languages: LanguageNames) -> Self {
        Self { languages }
    }

    pub fn languages(&self) -> &LanguageNames {
        &self.languages
    }

    pub fn build(&self, text: &str, include_secondary: bool) -> Vec<Message> {
        vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(self.user_prompt(text, include_secondary)),
        ]
    }

    fn user_prompt(&self, text: &str, include_secondary: bool) -> String {
        let LanguageNames {
            source,
            target,
            secondary,
        } = &self.languages;

        let translations = if include_secondary {
            format!("{} and {}", target, secondary)
        } else {
            target.clone()
        };
        let secondary_field = if include_secondary {
            format!(
                "\n      \"secondaryTranslation\": \"{} translation\",",
                secondary
            )
        } else {
            String::new()
        };

        format!(
            r#"You are extracting {source} vocabulary from a document that contains a structured vocabulary list. The document has three columns:
1. Left column: {source} words/phrases (sometimes with articles)
2. Middle column: Example sentences or definitions in {source}
3. Right column: Numerical values or short notes

Extract ALL {source} vocabulary words from the text and provide translations in {translations}.
For each word, also provide the example sentence from the middle column if available.

Important extraction rules:
- Extract EVERY {source} word/phrase you find, not just a few
- Look for words in the left column of the table structure
- Include words with articles but clean them up in the final output
- Use the middle column text as the {source} example sentence
- Ignore the numerical values in the right column
- If a word appears multiple times, only include it once
- Focus on actual vocabulary words, not common articles or prepositions

Format the response as a JSON object with this structure:
{{
  "title": "Extracted Vocabulary List",
  "description": "Vocabulary extracted from PDF",
  "items": [
    {{
      "sourceWord": "{source} word (cleaned, without articles)",
      "targetTranslation": "{target} translation",{secondary_field}
      "exampleSentence": "Example sentence from middle column",
      "alternateMeanings": "Alternative meanings in {target}",
      "elaboration": "Brief explanation"
    }}
  ]
}}

Text to extract from:
{text}

Extract as many vocabulary words as possible from the text. Only return valid JSON, no other text.
"#
        )
    }
}

/// Cut `text` to `max_chars` characters and append the truncation marker
///
/// Characters are counted as grapheme clusters.
pub fn truncate_input(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.grapheme_indices(true).nth(max_chars) {
        Some((byte_offset, _)) => {
            tracing::debug!(
                max_chars,
                original_bytes = text.len(),
                "Input too long, truncating"
            );
            Cow::Owned(format!("{}{}", &text[..byte_offset], TRUNCATION_MARKER))
        },
        None => Cow::Borrowed(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_with_secondary() {
        let prompt = ExtractionPrompt::default();
        let messages = prompt.build("aanpak De aanpak is goed.", true);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("valid JSON only"));
        assert!(messages[1].content.contains("translations in Turkish and Russian"));
        assert!(messages[1].content.contains("\"secondaryTranslation\""));
        assert!(messages[1].content.contains("aanpak De aanpak is goed."));
    }

    #[test]
    fn test_prompt_without_secondary() {
        let prompt = ExtractionPrompt::default();
        let messages = prompt.build("tekst", false);

        assert!(messages[1].content.contains("translations in Turkish."));
        assert!(!messages[1].content.contains("secondaryTranslation"));
    }

    #[test]
    fn test_truncate_short_text_untouched() {
        let text = "kort";
        assert!(matches!(truncate_input(text, 10), Cow::Borrowed("kort")));
        assert!(matches!(truncate_input(text, 4), Cow::Borrowed(_)));
    }

    #[test]
    fn test_truncate_appends_marker() {
        let text = "a".repeat(8005);
        let truncated = truncate_input(&text, 8000);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        assert_eq!(truncated.len(), 8000 + TRUNCATION_MARKER.len());
    }

    #[test]
    fn test_truncate_respects_multibyte() {
        let text = "çöğüşı".repeat(3);
        let truncated = truncate_input(&text, 4);
        assert!(truncated.starts_with("çöğü"));
        assert!(truncated.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::System.to_string(), "system");
        assert_eq!(serde_json::to_value(Role::User).unwrap(), "user");
    }
}
