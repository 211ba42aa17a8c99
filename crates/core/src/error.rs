//! Error types shared across service boundaries

use std::time::Duration;
use thiserror::Error;

/// Errors returned by the service traits
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    /// Response could not be parsed or did not match the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Service error ({status}): {message}")]
    Service { status: u16, message: String },

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Map a non-success HTTP status from a remote service
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 => Error::Authentication(body),
            429 => Error::RateLimited(body),
            400 => Error::InvalidRequest(body),
            _ => Error::Service {
                status,
                message: body,
            },
        }
    }

    /// Errors that no amount of re-chunking will fix
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Authentication(_) | Error::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(Error::from_status(401, "no"), Error::Authentication(_)));
        assert!(matches!(Error::from_status(429, "slow"), Error::RateLimited(_)));
        assert!(matches!(Error::from_status(400, "bad"), Error::InvalidRequest(_)));
        assert_eq!(
            Error::from_status(503, "down"),
            Error::Service {
                status: 503,
                message: "down".to_string()
            }
        );
    }

    #[test]
    fn test_fatal() {
        assert!(Error::Authentication("x".into()).is_fatal());
        assert!(!Error::Timeout(Duration::from_secs(60)).is_fatal());
    }
}
