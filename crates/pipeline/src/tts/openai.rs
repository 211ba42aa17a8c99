//! OpenAI-compatible speech backend
//!
//! `POST {endpoint}/audio/speech` with a JSON body; the response body is
//! the encoded audio.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use vocab_audio_config::OpenAiConfig;
use vocab_audio_core::{EncodedAudio, Error, Result, SpeechRequest, SpeechSynthesizer};

/// Speech client configuration
#[derive(Clone)]
pub struct SpeechClientConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for SpeechClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechClientConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Default for SpeechClientConfig {
    fn default() -> Self {
        Self::from_settings(&OpenAiConfig::default())
    }
}

impl SpeechClientConfig {
    pub fn from_settings(openai: &OpenAiConfig) -> Self {
        Self {
            endpoint: openai.base_url.clone(),
            api_key: openai.api_key.clone().unwrap_or_default(),
            model: openai.tts_model.clone(),
            timeout: Duration::from_secs(openai.timeout_secs),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }
}

/// Pronunciation instructions for a language name
pub fn pronunciation_instructions(language: Option<&str>) -> String {
    match language.map(str::trim).filter(|l| !l.is_empty()) {
        Some(language) => format!(
            "Speak in clear {} with proper pronunciation. Speak at a moderate pace for language learning.",
            language
        ),
        None => "Speak clearly and at a moderate pace for language learning.".to_string(),
    }
}

#[derive(Debug, Serialize)]
struct SpeechBody<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    instructions: String,
    response_format: &'static str,
}

pub struct OpenAiSpeechClient {
    config: SpeechClientConfig,
    client: Client,
}

impl OpenAiSpeechClient {
    pub fn new(config: SpeechClientConfig) -> Result<Self> {
        let local = config.endpoint.starts_with("http://localhost")
            || config.endpoint.starts_with("http://127.0.0.1");
        if config.api_key.trim().is_empty() && !local {
            return Err(Error::Configuration(
                "API key required for remote endpoints".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn speech_url(&self) -> String {
        format!("{}/audio/speech", self.config.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeechClient {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<EncodedAudio> {
        let input = request.text.trim();
        if input.is_empty() {
            tracing::debug!("Empty text, skipping speech call");
            return Ok(EncodedAudio::empty(request.format));
        }

        let body = SpeechBody {
            model: &self.config.model,
            voice: &request.voice,
            input,
            instructions: pronunciation_instructions(request.language.as_deref()),
            response_format: request.format.as_str(),
        };

        tracing::debug!(
            voice = %request.voice,
            language = request.language.as_deref().unwrap_or("-"),
            chars = input.len(),
            "Sending speech request"
        );

        let response = self
            .client
            .post(self.speech_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(self.config.timeout)
                } else {
                    Error::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Speech API error");
            return Err(Error::from_status(status.as_u16(), error_text));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("Failed to read speech audio: {}", e)))?;
        tracing::debug!(bytes = bytes.len(), "Speech audio received");

        Ok(EncodedAudio::new(bytes, request.format))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use vocab_audio_core::AudioFormat;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(endpoint: String) -> OpenAiSpeechClient {
        OpenAiSpeechClient::new(SpeechClientConfig::default().with_endpoint(endpoint)).unwrap()
    }

    #[test]
    fn test_instructions() {
        assert_eq!(
            pronunciation_instructions(Some("Dutch")),
            "Speak in clear Dutch with proper pronunciation. Speak at a moderate pace for language learning."
        );
        assert_eq!(
            pronunciation_instructions(None),
            "Speak clearly and at a moderate pace for language learning."
        );
    }

    #[tokio::test]
    async fn test_synthesize_returns_audio_bytes() {
        let router = Router::new().route(
            "/audio/speech",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["voice"], "nova");
                assert_eq!(body["input"], "ev");
                assert_eq!(body["response_format"], "mp3");
                assert!(body["instructions"].as_str().unwrap().contains("Turkish"));
                vec![0xFFu8, 0xFB, 0x90, 0x00]
            }),
        );
        let client = client(serve(router).await);

        let request = SpeechRequest::new("  ev ", "nova").with_language("Turkish");
        let audio = client.synthesize(&request).await.unwrap();
        assert_eq!(audio.len(), 4);
        assert_eq!(audio.format, AudioFormat::Mp3);
    }

    #[tokio::test]
    async fn test_blank_text_short_circuits() {
        // Nothing listens on this port; a network call would fail.
        let client = client("http://127.0.0.1:9".to_string());
        let audio = client
            .synthesize(&SpeechRequest::new("   ", "alloy"))
            .await
            .unwrap();
        assert!(audio.is_empty());
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let router = Router::new().route(
            "/audio/speech",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let client = client(serve(router).await);

        let err = client
            .synthesize(&SpeechRequest::new("huis", "alloy"))
            .await
            .unwrap_err();
        assert_eq!(err, Error::RateLimited("slow down".to_string()));
    }

    #[test]
    fn test_remote_endpoint_requires_key() {
        let config = SpeechClientConfig {
            api_key: String::new(),
            ..SpeechClientConfig::default()
        };
        assert!(matches!(
            OpenAiSpeechClient::new(config),
            Err(Error::Configuration(_))
        ));
    }
}
