//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::{audio, concurrency, endpoints, extraction, ocr};
use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation, warnings only
    #[default]
    Development,
    Staging,
    /// Production mode - API key required
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub server: ServerConfig,

    /// Remote extraction and speech service
    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Concurrency ceilings and the extraction rate limit
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    #[serde(default)]
    pub ocr: OcrConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_openai()?;
        self.extraction.validate()?;
        self.concurrency.validate()?;
        self.audio.validate()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::invalid("server.port", "Port cannot be 0"));
        }
        Ok(())
    }

    fn validate_openai(&self) -> Result<(), ConfigError> {
        if self.openai.base_url.trim().is_empty() {
            return Err(ConfigError::invalid("openai.base_url", "Base URL cannot be empty"));
        }
        if !(0.0..=2.0).contains(&self.openai.temperature) {
            return Err(ConfigError::invalid(
                "openai.temperature",
                format!("Must be between 0.0 and 2.0, got {}", self.openai.temperature),
            ));
        }
        if self.openai.timeout_secs == 0 {
            return Err(ConfigError::invalid("openai.timeout_secs", "Timeout cannot be 0"));
        }
        if self.environment.is_production() && self.openai.api_key.is_none() {
            return Err(ConfigError::MissingField("openai.api_key".to_string()));
        }
        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds (audio downloads and extraction can be slow)
    #[serde(default = "default_request_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// CORS allowed origins
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_seconds: default_request_timeout(),
            cors_enabled: true,
            cors_origins: Vec::new(),
        }
    }
}

/// OpenAI-compatible service configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Falls back to `OPENAI_API_KEY`
    #[serde(default = "default_api_key")]
    pub api_key: Option<String>,

    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    #[serde(default = "default_tts_model")]
    pub tts_model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-request deadline
    #[serde(default = "default_openai_timeout")]
    pub timeout_secs: u64,

    /// Input beyond this is truncated with a marker
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("chat_model", &self.chat_model)
            .field("tts_model", &self.tts_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_input_chars", &self.max_input_chars)
            .finish()
    }
}

fn default_base_url() -> String {
    endpoints::OPENAI_BASE_URL.to_string()
}

fn default_api_key() -> Option<String> {
    std::env::var(endpoints::API_KEY_ENV)
        .ok()
        .filter(|key| !key.trim().is_empty())
}

fn default_chat_model() -> String {
    endpoints::CHAT_MODEL.to_string()
}

fn default_tts_model() -> String {
    endpoints::TTS_MODEL.to_string()
}

fn default_temperature() -> f32 {
    extraction::TEMPERATURE
}

fn default_max_tokens() -> u32 {
    extraction::MAX_TOKENS
}

fn default_openai_timeout() -> u64 {
    extraction::TIMEOUT_SECS
}

fn default_max_input_chars() -> usize {
    extraction::MAX_INPUT_CHARS
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: default_api_key(),
            chat_model: default_chat_model(),
            tts_model: default_tts_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_openai_timeout(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

/// Display names of the three languages involved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageNames {
    /// Language of the vocabulary being learned
    #[serde(default = "default_source_language")]
    pub source: String,
    #[serde(default = "default_target_language")]
    pub target: String,
    #[serde(default = "default_secondary_language")]
    pub secondary: String,
}

fn default_source_language() -> String {
    "Dutch".to_string()
}

fn default_target_language() -> String {
    "Turkish".to_string()
}

fn default_secondary_language() -> String {
    "Russian".to_string()
}

impl Default for LanguageNames {
    fn default() -> Self {
        Self {
            source: default_source_language(),
            target: default_target_language(),
            secondary: default_secondary_language(),
        }
    }
}

/// Extraction flow and adaptive re-chunking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_direct_limit")]
    pub direct_limit_chars: usize,

    #[serde(default = "default_fallback_threshold")]
    pub fallback_threshold_chars: usize,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_shrink_factor")]
    pub shrink_factor: f64,

    #[serde(default = "default_min_chunk")]
    pub min_chunk_chars: usize,

    #[serde(default = "default_sub_chunk_delay")]
    pub sub_chunk_delay_ms: u64,

    #[serde(default = "default_extraction_sequential_delay")]
    pub sequential_delay_ms: u64,

    #[serde(default = "default_true")]
    pub include_secondary: bool,

    #[serde(default)]
    pub languages: LanguageNames,
}

fn default_direct_limit() -> usize {
    extraction::DIRECT_LIMIT_CHARS
}

fn default_fallback_threshold() -> usize {
    extraction::FALLBACK_THRESHOLD_CHARS
}

fn default_chunk_size() -> usize {
    extraction::CHUNK_SIZE
}

fn default_max_retries() -> u32 {
    extraction::MAX_RETRIES
}

fn default_shrink_factor() -> f64 {
    extraction::SHRINK_FACTOR
}

fn default_min_chunk() -> usize {
    extraction::MIN_CHUNK_CHARS
}

fn default_sub_chunk_delay() -> u64 {
    extraction::SUB_CHUNK_DELAY_MS
}

fn default_extraction_sequential_delay() -> u64 {
    extraction::SEQUENTIAL_DELAY_MS
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            direct_limit_chars: default_direct_limit(),
            fallback_threshold_chars: default_fallback_threshold(),
            chunk_size: default_chunk_size(),
            max_retries: default_max_retries(),
            shrink_factor: default_shrink_factor(),
            min_chunk_chars: default_min_chunk(),
            sub_chunk_delay_ms: default_sub_chunk_delay(),
            sequential_delay_ms: default_extraction_sequential_delay(),
            include_secondary: true,
            languages: LanguageNames::default(),
        }
    }
}

impl ExtractionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::invalid("extraction.chunk_size", "Chunk size cannot be 0"));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::invalid(
                "extraction.max_retries",
                "At least one attempt is required",
            ));
        }
        if !(self.shrink_factor > 0.0 && self.shrink_factor < 1.0) {
            return Err(ConfigError::invalid(
                "extraction.shrink_factor",
                format!("Must be between 0.0 and 1.0 (exclusive), got {}", self.shrink_factor),
            ));
        }
        if self.fallback_threshold_chars > self.direct_limit_chars {
            return Err(ConfigError::invalid(
                "extraction.fallback_threshold_chars",
                "Cannot exceed direct_limit_chars",
            ));
        }
        Ok(())
    }
}

/// Concurrency ceilings and the extraction rate limit
///
/// This is the only section that can be changed while the server runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Parallel mode for pages, chunks and audio parts
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_max_ocr")]
    pub max_concurrent_ocr: usize,

    #[serde(default = "default_max_extraction")]
    pub max_concurrent_extraction: usize,

    #[serde(default = "default_max_tts")]
    pub max_concurrent_tts: usize,

    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_max_requests: usize,

    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_ms: u64,
}

fn default_max_ocr() -> usize {
    concurrency::MAX_CONCURRENT_OCR
}

fn default_max_extraction() -> usize {
    concurrency::MAX_CONCURRENT_EXTRACTION
}

fn default_max_tts() -> usize {
    concurrency::MAX_CONCURRENT_TTS
}

fn default_rate_limit_requests() -> usize {
    concurrency::RATE_LIMIT_MAX_REQUESTS
}

fn default_rate_limit_window() -> u64 {
    concurrency::RATE_LIMIT_WINDOW_MS
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_concurrent_ocr: default_max_ocr(),
            max_concurrent_extraction: default_max_extraction(),
            max_concurrent_tts: default_max_tts(),
            rate_limit_max_requests: default_rate_limit_requests(),
            rate_limit_window_ms: default_rate_limit_window(),
        }
    }
}

impl ConcurrencyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("concurrency.max_concurrent_ocr", self.max_concurrent_ocr),
            ("concurrency.max_concurrent_extraction", self.max_concurrent_extraction),
            ("concurrency.max_concurrent_tts", self.max_concurrent_tts),
        ] {
            if !(1..=32).contains(&value) {
                return Err(ConfigError::invalid(
                    field,
                    format!("Must be between 1 and 32, got {}", value),
                ));
            }
        }
        if self.rate_limit_max_requests == 0 {
            return Err(ConfigError::invalid(
                "concurrency.rate_limit_max_requests",
                "At least one request per window is required",
            ));
        }
        if self.rate_limit_window_ms == 0 {
            return Err(ConfigError::invalid(
                "concurrency.rate_limit_window_ms",
                "Window cannot be 0",
            ));
        }
        Ok(())
    }
}

/// OCR sidecar configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_ocr_endpoint")]
    pub endpoint: String,

    /// Language pack hint, e.g. `nld+eng`
    #[serde(default = "default_ocr_languages")]
    pub languages: String,

    #[serde(default = "default_ocr_timeout")]
    pub timeout_secs: u64,
}

fn default_ocr_endpoint() -> String {
    endpoints::OCR_DEFAULT.to_string()
}

fn default_ocr_languages() -> String {
    ocr::LANGUAGES.to_string()
}

fn default_ocr_timeout() -> u64 {
    ocr::TIMEOUT_SECS
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            endpoint: default_ocr_endpoint(),
            languages: default_ocr_languages(),
            timeout_secs: default_ocr_timeout(),
        }
    }
}

/// How audio parts are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    #[default]
    Parallel,
    Sequential,
}

/// One speech call per part, or one per field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VoiceMode {
    #[default]
    Single,
    Multi,
}

/// Voice per language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceSelection {
    #[serde(default = "default_source_voice")]
    pub source: String,
    #[serde(default = "default_target_voice")]
    pub target: String,
    #[serde(default = "default_secondary_voice")]
    pub secondary: String,
}

fn default_source_voice() -> String {
    "alloy".to_string()
}

fn default_target_voice() -> String {
    "nova".to_string()
}

fn default_secondary_voice() -> String {
    "echo".to_string()
}

impl Default for VoiceSelection {
    fn default() -> Self {
        Self {
            source: default_source_voice(),
            target: default_target_voice(),
            secondary: default_secondary_voice(),
        }
    }
}

/// Audio synthesis and assembly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_items_per_file")]
    pub items_per_file: usize,

    #[serde(default)]
    pub generation_mode: GenerationMode,

    #[serde(default)]
    pub voice_mode: VoiceMode,

    #[serde(default)]
    pub voices: VoiceSelection,

    /// Include the secondary translation in synthesized audio
    #[serde(default = "default_true")]
    pub include_secondary: bool,

    #[serde(default = "default_pause_seconds")]
    pub pause_seconds: f64,

    #[serde(default = "default_sample_rate")]
    pub default_sample_rate: u32,

    #[serde(default = "default_audio_sequential_delay")]
    pub sequential_delay_ms: u64,

    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    #[serde(default = "default_max_estimated_tokens")]
    pub max_estimated_tokens: usize,

    /// How long a finished run and its audio stay downloadable
    #[serde(default = "default_run_retention")]
    pub run_retention_secs: u64,
}

fn default_items_per_file() -> usize {
    audio::ITEMS_PER_FILE
}

fn default_pause_seconds() -> f64 {
    audio::PAUSE_SECONDS
}

fn default_sample_rate() -> u32 {
    audio::DEFAULT_SAMPLE_RATE
}

fn default_audio_sequential_delay() -> u64 {
    audio::SEQUENTIAL_DELAY_MS
}

fn default_max_chars() -> usize {
    audio::MAX_CHARS
}

fn default_max_estimated_tokens() -> usize {
    audio::MAX_ESTIMATED_TOKENS
}

fn default_run_retention() -> u64 {
    audio::RUN_RETENTION_SECS
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            items_per_file: default_items_per_file(),
            generation_mode: GenerationMode::default(),
            voice_mode: VoiceMode::default(),
            voices: VoiceSelection::default(),
            include_secondary: true,
            pause_seconds: default_pause_seconds(),
            default_sample_rate: default_sample_rate(),
            sequential_delay_ms: default_audio_sequential_delay(),
            max_chars: default_max_chars(),
            max_estimated_tokens: default_max_estimated_tokens(),
            run_retention_secs: default_run_retention(),
        }
    }
}

impl AudioConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(audio::MIN_ITEMS_PER_FILE..=audio::MAX_ITEMS_PER_FILE).contains(&self.items_per_file) {
            return Err(ConfigError::invalid(
                "audio.items_per_file",
                format!(
                    "Must be between {} and {}, got {}",
                    audio::MIN_ITEMS_PER_FILE,
                    audio::MAX_ITEMS_PER_FILE,
                    self.items_per_file
                ),
            ));
        }
        if !(0.0..=10.0).contains(&self.pause_seconds) {
            return Err(ConfigError::invalid(
                "audio.pause_seconds",
                format!("Must be between 0 and 10 seconds, got {}", self.pause_seconds),
            ));
        }
        if !(8000..=96_000).contains(&self.default_sample_rate) {
            return Err(ConfigError::invalid(
                "audio.default_sample_rate",
                format!("Unsupported sample rate {}", self.default_sample_rate),
            ));
        }
        Ok(())
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON log lines
    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// OTLP collector, used with the `telemetry` feature
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
            otlp_endpoint: None,
        }
    }
}

/// Load settings from `config/` relative to the working directory
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from(Path::new("config"), env)
}

/// Load settings from files in `dir`, then environment variables
///
/// Sources, later ones overriding earlier ones:
/// 1. `{dir}/default.{yaml,toml,json}`
/// 2. `{dir}/{env}.{yaml,toml,json}`
/// 3. `VOCAB_AUDIO__SECTION__KEY` environment variables
///
/// A missing `openai.api_key` falls back to `OPENAI_API_KEY`.
pub fn load_settings_from(dir: &Path, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(
        File::with_name(&dir.join("default").to_string_lossy()).required(false),
    );

    if let Some(env_name) = env {
        builder = builder
            .add_source(File::with_name(&dir.join(env_name).to_string_lossy()).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("VOCAB_AUDIO")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let mut settings: Settings = config.try_deserialize()?;

    if settings.openai.api_key.is_none() {
        settings.openai.api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
    }

    settings.validate()?;

    tracing::debug!(env = ?env, dir = %dir.display(), "Settings loaded");
    Ok(settings)
}
