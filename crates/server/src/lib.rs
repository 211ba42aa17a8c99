//! Vocab Audio Server
//!
//! HTTP API for vocabulary extraction and audio generation runs.

pub mod http;
pub mod metrics;
pub mod state;

pub use http::create_router;
pub use metrics::{init_metrics, record_audio_file, record_extraction, record_request};
pub use state::AppState;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use vocab_audio_config::ConfigError;
use vocab_audio_pipeline::{FailureReason, PipelineError};

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ConfigError> for ServerError {
    fn from(err: ConfigError) -> Self {
        ServerError::InvalidRequest(err.to_string())
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::NotReady(_) => StatusCode::CONFLICT,
            ServerError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Pipeline(err) => match err.reason() {
                FailureReason::Authentication => StatusCode::UNAUTHORIZED,
                FailureReason::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                FailureReason::InvalidInput | FailureReason::SpeechLimit => {
                    StatusCode::BAD_REQUEST
                },
                FailureReason::NoVocabulary => StatusCode::UNPROCESSABLE_ENTITY,
                FailureReason::Timeout => StatusCode::GATEWAY_TIMEOUT,
                FailureReason::Cancelled => StatusCode::CONFLICT,
                FailureReason::Network
                | FailureReason::InvalidResponse
                | FailureReason::AudioDecode
                | FailureReason::Service => StatusCode::BAD_GATEWAY,
            },
        }
    }

    fn reason(&self) -> Option<FailureReason> {
        match self {
            ServerError::Pipeline(err) => Some(err.reason()),
            _ => None,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
            "reason": self.reason(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vocab_audio_core::Error as CoreError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CoreError::Authentication("bad".into()).into(), StatusCode::UNAUTHORIZED),
            (CoreError::RateLimited("slow".into()).into(), StatusCode::TOO_MANY_REQUESTS),
            (CoreError::Timeout(Duration::from_secs(60)).into(), StatusCode::GATEWAY_TIMEOUT),
            (CoreError::Network("reset".into()).into(), StatusCode::BAD_GATEWAY),
            (PipelineError::NoVocabulary, StatusCode::UNPROCESSABLE_ENTITY),
            (PipelineError::InvalidInput("empty".into()), StatusCode::BAD_REQUEST),
        ];
        for (err, expected) in cases {
            assert_eq!(ServerError::Pipeline(err).status(), expected);
        }
        assert_eq!(ServerError::NotFound("run".into()).status(), StatusCode::NOT_FOUND);
    }
}
