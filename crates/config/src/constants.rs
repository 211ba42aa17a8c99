//! Centralized default values
//!
//! Single source of truth for the defaults used by `Settings` and by
//! components constructed without a settings file.

/// Service endpoints and models
pub mod endpoints {
    /// OpenAI-compatible API root
    pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

    /// Chat model used for vocabulary extraction
    pub const CHAT_MODEL: &str = "gpt-4o-mini";

    /// Speech model
    pub const TTS_MODEL: &str = "gpt-4o-mini-tts";

    /// OCR sidecar
    pub const OCR_DEFAULT: &str = "http://127.0.0.1:8884";

    /// Environment variable consulted for the API key
    pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
}

/// Extraction and adaptive re-chunking
pub mod extraction {
    /// Documents up to this size are sent as one call
    pub const DIRECT_LIMIT_CHARS: usize = 8000;

    /// A failed direct call falls back to chunking above this size
    pub const FALLBACK_THRESHOLD_CHARS: usize = 4000;

    pub const CHUNK_SIZE: usize = 3000;

    /// Top-level attempts per chunk
    pub const MAX_RETRIES: u32 = 3;

    /// Size multiplier applied after each failed attempt
    pub const SHRINK_FACTOR: f64 = 0.7;

    /// Sub-chunk size floor
    pub const MIN_CHUNK_CHARS: usize = 500;

    pub const SUB_CHUNK_DELAY_MS: u64 = 500;

    /// Delay between chunks in sequential mode
    pub const SEQUENTIAL_DELAY_MS: u64 = 2000;

    /// Longer input is truncated before it is sent
    pub const MAX_INPUT_CHARS: usize = 8000;

    pub const TRUNCATION_MARKER: &str = "\n\n[Text truncated due to length limits]";

    pub const TEMPERATURE: f32 = 0.3;
    pub const MAX_TOKENS: u32 = 4000;
    pub const TIMEOUT_SECS: u64 = 60;
}

/// Concurrency ceilings and rate limits
pub mod concurrency {
    pub const MAX_CONCURRENT_OCR: usize = 4;
    pub const MAX_CONCURRENT_EXTRACTION: usize = 8;
    pub const MAX_CONCURRENT_TTS: usize = 4;

    /// Extraction calls admitted per window
    pub const RATE_LIMIT_MAX_REQUESTS: usize = 8;
    pub const RATE_LIMIT_WINDOW_MS: u64 = 60_000;
}

/// Audio synthesis and assembly
pub mod audio {
    pub const ITEMS_PER_FILE: usize = 20;
    pub const MIN_ITEMS_PER_FILE: usize = 1;
    pub const MAX_ITEMS_PER_FILE: usize = 200;

    /// Silence between items in multi-voice mode
    pub const PAUSE_SECONDS: f64 = 1.0;

    /// Sample rate of generated silence
    pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

    /// Delay between parts in sequential mode
    pub const SEQUENTIAL_DELAY_MS: u64 = 1000;

    /// Speech service input ceiling
    pub const MAX_CHARS: usize = 4000;
    pub const MAX_ESTIMATED_TOKENS: usize = 4000;

    /// Finished runs are dropped from memory after this long
    pub const RUN_RETENTION_SECS: u64 = 3600;

    /// Inserted between items in single-voice text
    pub const PAUSE_MARKER: &str = "...";
}

/// OCR
pub mod ocr {
    /// Two-language pack: source language plus English
    pub const LANGUAGES: &str = "nld+eng";
    pub const TIMEOUT_SECS: u64 = 120;
}
