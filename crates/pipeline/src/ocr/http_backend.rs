//! HTTP OCR Backend - Calls an external OCR sidecar
//!
//! The sidecar receives one rendered page image per request and answers
//! with the recognized text. The language pack (e.g. `nld+eng`) travels in
//! the `X-Language` header.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use vocab_audio_config::OcrConfig;
use vocab_audio_core::{Error, OcrEngine, PageImage, Result};

/// HTTP OCR backend configuration
#[derive(Debug, Clone)]
pub struct HttpOcrConfig {
    /// Base URL of the OCR service
    pub url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for HttpOcrConfig {
    fn default() -> Self {
        Self::from(&OcrConfig::default())
    }
}

impl From<&OcrConfig> for HttpOcrConfig {
    fn from(config: &OcrConfig) -> Self {
        Self {
            url: config.endpoint.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// Response from the OCR service
#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    error: Option<String>,
}

pub struct HttpOcrEngine {
    config: HttpOcrConfig,
    client: Client,
}

impl HttpOcrEngine {
    pub fn new(config: HttpOcrConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Create with custom URL
    pub fn new_with_url(url: impl Into<String>) -> Result<Self> {
        Self::new(HttpOcrConfig {
            url: url.into(),
            ..Default::default()
        })
    }
}

#[async_trait]
impl OcrEngine for HttpOcrEngine {
    async fn recognize(&self, page: &PageImage, languages: &str) -> Result<String> {
        let url = format!("{}/ocr", self.config.url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", page.mime_type.as_str())
            .header("X-Language", languages)
            .body(page.bytes.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(self.config.timeout)
                } else {
                    Error::Network(format!("OCR request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            return Err(Error::Ocr(format!(
                "OCR service returned error: {}",
                response.status()
            )));
        }

        let result: OcrResponse = response
            .json()
            .await
            .map_err(|e| Error::Ocr(format!("Failed to parse OCR response: {}", e)))?;

        if let Some(error) = result.error {
            return Err(Error::Ocr(error));
        }

        tracing::debug!(
            page = page.page_number,
            chars = result.text.len(),
            "Page recognized"
        );
        Ok(result.text)
    }

    /// Probe `GET {url}/health`
    async fn health_check(&self) -> bool {
        let health_url = format!("{}/health", self.config.url);
        match self.client.get(&health_url).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(url = %self.config.url, "OCR service reachable");
                true
            },
            Ok(resp) => {
                tracing::warn!(status = resp.status().as_u16(), "OCR service unhealthy");
                false
            },
            Err(e) => {
                tracing::warn!(error = %e, "OCR service not reachable");
                false
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use bytes::Bytes;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn page() -> PageImage {
        PageImage {
            page_number: 1,
            bytes: Bytes::from_static(b"\x89PNG"),
            mime_type: "image/png".to_string(),
        }
    }

    #[tokio::test]
    async fn test_recognize_sends_language_header() {
        let router = Router::new().route(
            "/ocr",
            post(|headers: HeaderMap, body: Bytes| async move {
                let lang = headers
                    .get("x-language")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(serde_json::json!({ "text": format!("{}:{}", lang, body.len()) }))
            }),
        );
        let engine = HttpOcrEngine::new_with_url(serve(router).await).unwrap();

        let text = engine.recognize(&page(), "nld+eng").await.unwrap();
        assert_eq!(text, "nld+eng:4");
    }

    #[tokio::test]
    async fn test_service_error() {
        let router = Router::new()
            .route(
                "/ocr",
                post(|| async { Json(serde_json::json!({ "error": "unreadable image" })) }),
            )
            .route("/health", get(|| async { "ok" }));
        let engine = HttpOcrEngine::new_with_url(serve(router).await).unwrap();

        assert!(engine.health_check().await);
        let err = engine.recognize(&page(), "nld+eng").await.unwrap_err();
        assert_eq!(err, Error::Ocr("unreadable image".to_string()));
    }
}
