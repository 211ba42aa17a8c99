//! Vocabulary extraction over an OpenAI-compatible chat API
//!
//! Features:
//! - Prompt construction for table-shaped vocabulary documents
//! - Input truncation with an explicit marker
//! - Response cleanup (code fences) and schema validation
//! - HTTP status mapping to typed errors
//! - API key validation

pub mod backend;
pub mod prompt;
pub mod response;

pub use backend::{ApiKeyStatus, ExtractionClientConfig, OpenAiExtractionClient};
pub use prompt::{truncate_input, ExtractionPrompt, Message, Role};
pub use response::{parse_vocab_response, strip_code_fences};

use std::time::Duration;
use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API authentication failed: {0}")]
    Authentication(String),

    #[error("API rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LlmError {
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 => LlmError::Authentication(body),
            429 => LlmError::RateLimited(body),
            400 => LlmError::InvalidRequest(body),
            _ => LlmError::Api { status, body },
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Network(err.to_string())
    }
}

impl From<LlmError> for vocab_audio_core::Error {
    fn from(err: LlmError) -> Self {
        use vocab_audio_core::Error;
        match err {
            LlmError::Authentication(msg) => Error::Authentication(msg),
            LlmError::RateLimited(msg) => Error::RateLimited(msg),
            LlmError::InvalidRequest(msg) => Error::InvalidRequest(msg),
            LlmError::Api { status, body } => Error::Service {
                status,
                message: body,
            },
            LlmError::Network(msg) => Error::Network(msg),
            LlmError::InvalidResponse(msg) => Error::InvalidResponse(msg),
            LlmError::Timeout(after) => Error::Timeout(after),
            LlmError::Configuration(msg) => Error::Configuration(msg),
        }
    }
}
