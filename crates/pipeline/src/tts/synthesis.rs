//! Vocabulary-to-speech synthesis
//!
//! Single-voice mode flattens a part into one text and makes one speech
//! call. Multi-voice mode makes one call per populated field in that field's
//! voice, combines each item's segments and puts a silence segment between
//! items.

use std::sync::Arc;

use vocab_audio_config::constants::audio::PAUSE_MARKER;
use vocab_audio_config::{AudioConfig, LanguageNames, VoiceMode, VoiceSelection};
use vocab_audio_core::vocab::non_blank;
use vocab_audio_core::{
    AudioFormat, CancellationToken, EncodedAudio, SpeechRequest, SpeechSynthesizer, VocabItem,
};

use crate::audio::AudioAssembler;
use crate::PipelineError;

#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    pub voice_mode: VoiceMode,
    pub voices: VoiceSelection,
    pub languages: LanguageNames,
    pub include_secondary: bool,
    pub pause_seconds: f64,
    pub max_chars: usize,
    pub max_estimated_tokens: usize,
    pub format: AudioFormat,
}

impl SynthesisConfig {
    pub fn from_settings(audio: &AudioConfig, languages: &LanguageNames) -> Self {
        Self {
            voice_mode: audio.voice_mode,
            voices: audio.voices.clone(),
            languages: languages.clone(),
            include_secondary: audio.include_secondary,
            pause_seconds: audio.pause_seconds,
            max_chars: audio.max_chars,
            max_estimated_tokens: audio.max_estimated_tokens,
            format: AudioFormat::Mp3,
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self::from_settings(&AudioConfig::default(), &LanguageNames::default())
    }
}

/// Spoken fields of an item, in speaking order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Source,
    Target,
    Secondary,
    Sentence,
    Supplementary,
}

fn item_fields(item: &VocabItem, include_secondary: bool) -> Vec<(Field, String)> {
    let mut fields = Vec::with_capacity(5);
    if !item.source_word.trim().is_empty() {
        fields.push((Field::Source, item.source_word.trim().to_string()));
    }
    if !item.target_translation.trim().is_empty() {
        fields.push((Field::Target, item.target_translation.trim().to_string()));
    }
    if include_secondary {
        if let Some(secondary) = non_blank(&item.secondary_translation) {
            fields.push((Field::Secondary, secondary.to_string()));
        }
    }
    if let Some(sentence) = non_blank(&item.example_sentence) {
        fields.push((Field::Sentence, sentence.to_string()));
    }
    if let Some(extra) = item.supplementary_text() {
        fields.push((Field::Supplementary, extra));
    }
    fields
}

/// Flatten items into one text, with a pause marker between items
pub fn compose_continuous_text(items: &[VocabItem], include_secondary: bool) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(items.len() * 2);
    for (i, item) in items.iter().enumerate() {
        let fields: Vec<String> = item_fields(item, include_secondary)
            .into_iter()
            .map(|(_, text)| text)
            .collect();
        if !fields.is_empty() {
            parts.push(fields.join(". "));
        }
        if i + 1 < items.len() {
            parts.push(PAUSE_MARKER.to_string());
        }
    }
    parts.join(". ")
}

/// Size of a composed text as the speech service sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeechLimits {
    pub chars: usize,
    pub estimated_tokens: usize,
}

/// Reject text above the character ceiling or the length/4 token estimate
pub fn check_speech_limits(
    text: &str,
    max_chars: usize,
    max_estimated_tokens: usize,
) -> Result<SpeechLimits, PipelineError> {
    let chars = text.chars().count();
    let estimated_tokens = chars.div_ceil(4);

    if chars > max_chars {
        return Err(PipelineError::SpeechLimit(format!(
            "Text is {} characters, but the speech limit is {} characters. Please reduce the number of items per file.",
            chars, max_chars
        )));
    }
    if estimated_tokens > max_estimated_tokens {
        return Err(PipelineError::SpeechLimit(format!(
            "Estimated {} tokens, but the speech limit is {} tokens. Please reduce the number of items per file.",
            estimated_tokens, max_estimated_tokens
        )));
    }
    Ok(SpeechLimits {
        chars,
        estimated_tokens,
    })
}

pub struct AudioSynthesisPipeline {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    assembler: AudioAssembler,
    config: SynthesisConfig,
}

impl AudioSynthesisPipeline {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        assembler: AudioAssembler,
        config: SynthesisConfig,
    ) -> Self {
        Self {
            synthesizer,
            assembler,
            config,
        }
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    pub fn assembler(&self) -> &AudioAssembler {
        &self.assembler
    }

    /// Synthesize one part
    ///
    /// The token is checked before the part and before every item; a call
    /// already in flight is allowed to finish.
    pub async fn synthesize_items(
        &self,
        items: &[VocabItem],
        cancel: &CancellationToken,
    ) -> Result<EncodedAudio, PipelineError> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        match self.config.voice_mode {
            VoiceMode::Single => self.single_voice(items).await,
            VoiceMode::Multi => self.multi_voice(items, cancel).await,
        }
    }

    async fn single_voice(&self, items: &[VocabItem]) -> Result<EncodedAudio, PipelineError> {
        let text = compose_continuous_text(items, self.config.include_secondary);
        let limits =
            check_speech_limits(&text, self.config.max_chars, self.config.max_estimated_tokens)?;
        tracing::debug!(
            items = items.len(),
            chars = limits.chars,
            estimated_tokens = limits.estimated_tokens,
            "Single-voice text composed"
        );

        let request = SpeechRequest::new(text, self.config.voices.source.clone())
            .with_language(self.config.languages.source.clone())
            .with_format(self.config.format);
        Ok(self.synthesizer.synthesize(&request).await?)
    }

    fn request_for(&self, field: Field, text: String) -> SpeechRequest {
        let (voice, language) = match field {
            Field::Target => (&self.config.voices.target, &self.config.languages.target),
            Field::Secondary => (&self.config.voices.secondary, &self.config.languages.secondary),
            Field::Source | Field::Sentence | Field::Supplementary => {
                (&self.config.voices.source, &self.config.languages.source)
            },
        };
        SpeechRequest::new(text, voice.clone())
            .with_language(language.clone())
            .with_format(self.config.format)
    }

    async fn multi_voice(
        &self,
        items: &[VocabItem],
        cancel: &CancellationToken,
    ) -> Result<EncodedAudio, PipelineError> {
        let mut segments = Vec::with_capacity(items.len() * 2);

        for (i, item) in items.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::debug!(item = i + 1, "Multi-voice synthesis cancelled");
                return Err(PipelineError::Cancelled);
            }

            let mut item_segments = Vec::new();
            for (field, text) in item_fields(item, self.config.include_secondary) {
                let request = self.request_for(field, text);
                item_segments.push(self.synthesizer.synthesize(&request).await?);
            }

            if !item_segments.is_empty() {
                segments.push(self.assembler.combine_blocking(item_segments).await?);
            }

            if i + 1 < items.len() {
                segments.push(self.assembler.generate_silence(self.config.pause_seconds)?);
            }
        }

        tracing::debug!(items = items.len(), segments = segments.len(), "Multi-voice segments ready");
        self.assembler.combine_blocking(segments).await
    }
}
