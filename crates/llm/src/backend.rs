//! OpenAI-compatible extraction backend

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use vocab_audio_config::{LanguageNames, OpenAiConfig};
use vocab_audio_core::{ExtractionOptions, VocabExtractor, VocabList};

use crate::prompt::{truncate_input, ExtractionPrompt, Message};
use crate::response::parse_vocab_response;
use crate::LlmError;

/// Extraction client configuration
#[derive(Clone)]
pub struct ExtractionClientConfig {
    /// API root, e.g. `https://api.openai.com/v1`
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Request deadline
    pub timeout: Duration,
    pub max_input_chars: usize,
    pub languages: LanguageNames,
}

impl std::fmt::Debug for ExtractionClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionClientConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .field("max_input_chars", &self.max_input_chars)
            .finish_non_exhaustive()
    }
}

impl Default for ExtractionClientConfig {
    fn default() -> Self {
        Self::from_settings(&OpenAiConfig::default(), &LanguageNames::default())
    }
}

impl ExtractionClientConfig {
    pub fn from_settings(openai: &OpenAiConfig, languages: &LanguageNames) -> Self {
        Self {
            endpoint: openai.base_url.clone(),
            api_key: openai.api_key.clone().unwrap_or_default(),
            model: openai.chat_model.clone(),
            temperature: openai.temperature,
            max_tokens: openai.max_tokens,
            timeout: Duration::from_secs(openai.timeout_secs),
            max_input_chars: openai.max_input_chars,
            languages: languages.clone(),
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

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Outcome of an API key check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiKeyStatus {
    pub valid: bool,
    pub message: String,
}

impl ApiKeyStatus {
    fn new(valid: bool, message: impl Into<String>) -> Self {
        Self {
            valid,
            message: message.into(),
        }
    }
}

/// Chat-completions client that turns document text into a vocabulary list
pub struct OpenAiExtractionClient {
    config: ExtractionClientConfig,
    prompt: ExtractionPrompt,
    client: Client,
}

impl OpenAiExtractionClient {
    pub fn new(config: ExtractionClientConfig) -> Result<Self, LlmError> {
        let local = config.endpoint.starts_with("http://localhost")
            || config.endpoint.starts_with("http://127.0.0.1");
        if config.api_key.trim().is_empty() && !local {
            return Err(LlmError::Configuration(
                "API key required for remote endpoints".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self {
            prompt: ExtractionPrompt::new(config.languages.clone()),
            config,
            client,
        })
    }

    pub fn config(&self) -> &ExtractionClientConfig {
        &self.config
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'))
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.config.endpoint.trim_end_matches('/'))
    }

    fn transport_error(&self, err: reqwest::Error) -> LlmError {
        if err.is_timeout() {
            LlmError::Timeout(self.config.timeout)
        } else {
            LlmError::Network(err.to_string())
        }
    }

    /// Extract vocabulary from one unit of text
    pub async fn extract_vocab(
        &self,
        text: &str,
        options: &ExtractionOptions,
    ) -> Result<VocabList, LlmError> {
        let input = truncate_input(text, self.config.max_input_chars);
        let request = ChatRequest {
            model: &self.config.model,
            messages: self.prompt.build(&input, options.include_secondary),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        tracing::debug!(
            model = %self.config.model,
            chars = input.len(),
            "Sending extraction request"
        );

        let response = self
            .client
            .post(self.chat_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Extraction API error");
            return Err(LlmError::from_status(status.as_u16(), error_text));
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(self.config.timeout)
            } else {
                LlmError::InvalidResponse(e.to_string())
            }
        })?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                LlmError::InvalidResponse("Unexpected response structure from chat API".to_string())
            })?;

        let list = parse_vocab_response(&content)?;
        tracing::debug!(items = list.items.len(), "Extraction response parsed");
        Ok(list)
    }

    /// Check an API key against the models listing
    pub async fn validate_api_key(&self, api_key: &str) -> ApiKeyStatus {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return ApiKeyStatus::new(false, "API key is required");
        }

        match self.client.get(self.models_url()).bearer_auth(api_key).send().await {
            Ok(response) if response.status().is_success() => {
                ApiKeyStatus::new(true, "API key is valid")
            },
            Ok(response) if response.status().as_u16() == 401 => {
                ApiKeyStatus::new(false, "Invalid API key")
            },
            Ok(response) => {
                ApiKeyStatus::new(false, format!("API error: {}", response.status().as_u16()))
            },
            Err(e) => {
                tracing::debug!(error = %e, "API key validation failed");
                ApiKeyStatus::new(false, "Network error during validation")
            },
        }
    }
}

#[async_trait]
impl VocabExtractor for OpenAiExtractionClient {
    async fn extract(
        &self,
        text: &str,
        options: &ExtractionOptions,
    ) -> vocab_audio_core::Result<VocabList> {
        Ok(self.extract_vocab(text, options).await?)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Json;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::Router;
    use vocab_audio_core::VocabItem;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client_for(endpoint: &str) -> OpenAiExtractionClient {
        let config = ExtractionClientConfig::default()
            .with_endpoint(endpoint)
            .with_api_key("sk-test");
        OpenAiExtractionClient::new(config).unwrap()
    }

    #[test]
    fn test_remote_endpoint_requires_key() {
        let config = ExtractionClientConfig::default()
            .with_endpoint("https://api.openai.com/v1")
            .with_api_key("");
        assert!(matches!(
            OpenAiExtractionClient::new(config),
            Err(LlmError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_extracts_fenced_json() {
        let router = Router::new().route(
            "/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                assert_eq!(headers["authorization"], "Bearer sk-test");
                assert_eq!(body["model"], "gpt-4o-mini");
                assert_eq!(body["messages"][0]["role"], "system");
                let content = "```json\n{\"items\":[{\"sourceWord\":\"huis\",\"targetTranslation\":\"ev\"}]}\n```";
                Json(serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": content}}]
                }))
            }),
        );
        let endpoint = serve(router).await;

        let list = client_for(&endpoint)
            .extract_vocab("huis Het huis is groot. 1.5", &ExtractionOptions::default())
            .await
            .unwrap();

        assert_eq!(list.title, "Extracted Vocabulary List");
        assert_eq!(list.items, vec![VocabItem::new("huis", "ev")]);
    }

    #[tokio::test]
    async fn test_status_codes_mapped() {
        let router = Router::new()
            .route("/a/chat/completions", post(|| async { (StatusCode::UNAUTHORIZED, "bad key") }))
            .route("/b/chat/completions", post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }))
            .route("/c/chat/completions", post(|| async { (StatusCode::BAD_REQUEST, "too big") }))
            .route("/d/chat/completions", post(|| async { (StatusCode::BAD_GATEWAY, "upstream") }));
        let endpoint = serve(router).await;
        let options = ExtractionOptions::default();

        let err = client_for(&format!("{}/a", endpoint)).extract_vocab("x", &options).await.unwrap_err();
        assert!(matches!(err, LlmError::Authentication(_)));

        let err = client_for(&format!("{}/b", endpoint)).extract_vocab("x", &options).await.unwrap_err();
        assert!(matches!(err, LlmError::RateLimited(_)));

        let err = client_for(&format!("{}/c", endpoint)).extract_vocab("x", &options).await.unwrap_err();
        assert!(matches!(err, LlmError::InvalidRequest(_)));

        let err = client_for(&format!("{}/d", endpoint)).extract_vocab("x", &options).await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 502, .. }));
        let core: vocab_audio_core::Error = err.into();
        assert!(matches!(core, vocab_audio_core::Error::Service { status: 502, .. }));
    }

    #[tokio::test]
    async fn test_timeout_reported() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let endpoint = serve(router).await;
        let config = ExtractionClientConfig::default()
            .with_endpoint(endpoint)
            .with_api_key("sk-test")
            .with_timeout(Duration::from_millis(100));
        let client = OpenAiExtractionClient::new(config).unwrap();

        let err = client.extract_vocab("x", &ExtractionOptions::default()).await.unwrap_err();
        assert!(matches!(err, LlmError::Timeout(d) if d == Duration::from_millis(100)));
    }

    #[tokio::test]
    async fn test_validate_api_key() {
        let router = Router::new().route(
            "/models",
            get(|headers: HeaderMap| async move {
                if headers["authorization"] == "Bearer sk-good" {
                    (StatusCode::OK, "{\"data\":[]}")
                } else {
                    (StatusCode::UNAUTHORIZED, "{}")
                }
            }),
        );
        let endpoint = serve(router).await;
        let client = client_for(&endpoint);

        assert!(client.validate_api_key("sk-good").await.valid);

        let status = client.validate_api_key("sk-bad").await;
        assert!(!status.valid);
        assert_eq!(status.message, "Invalid API key");

        let status = client.validate_api_key("   ").await;
        assert_eq!(status.message, "API key is required");
    }
}
