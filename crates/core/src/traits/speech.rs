//! Speech synthesis trait

use crate::{AudioFormat, EncodedAudio, Result};
use async_trait::async_trait;

/// One utterance to synthesize
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub text: String,
    /// Service voice identifier (e.g. `alloy`)
    pub voice: String,
    /// Language name used for pronunciation instructions
    pub language: Option<String>,
    pub format: AudioFormat,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: voice.into(),
            language: None,
            format: AudioFormat::Mp3,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }
}

/// Text-to-Speech interface
///
/// Implementations:
/// - `OpenAiSpeechClient` - hosted speech endpoint returning MP3 bytes
///
/// # Example
///
/// ```ignore
/// let tts: Arc<dyn SpeechSynthesizer> = Arc::new(OpenAiSpeechClient::new(config)?);
/// let request = SpeechRequest::new("het huis", "alloy").with_language("Dutch");
/// let audio = tts.synthesize(&request).await?;
/// ```
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync + 'static {
    /// Synthesize one utterance
    ///
    /// Blank text yields an empty artifact without contacting the service.
    async fn synthesize(&self, request: &SpeechRequest) -> Result<EncodedAudio>;

    /// Model name for logging
    fn model_name(&self) -> &str;
}
