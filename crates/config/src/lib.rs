//! Configuration management for vocab-audio
//!
//! Supports loading configuration from:
//! - YAML/TOML/JSON files (`config/default`, `config/{env}`)
//! - Environment variables (VOCAB_AUDIO_ prefix, `__` section separator)
//! - Runtime overrides of the concurrency section

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, load_settings_from, AudioConfig, ConcurrencyConfig, ExtractionConfig,
    GenerationMode, LanguageNames, ObservabilityConfig, OcrConfig, OpenAiConfig,
    RuntimeEnvironment, ServerConfig, Settings, VoiceMode, VoiceSelection,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
