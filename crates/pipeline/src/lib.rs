//! Extraction and audio pipeline for vocab-audio
//!
//! Features:
//! - Bounded-concurrency task runner with settle-all semantics
//! - Sliding-window rate limiter for extraction calls
//! - Adaptive shrink-and-subdivide chunk processing
//! - Document and page-image extraction orchestration
//! - Single-voice and multi-voice speech synthesis
//! - Audio decoding, concatenation and WAV assembly
//! - Cancellable audio generation runs

pub mod audio;
pub mod extraction;
pub mod generation;
pub mod ocr;
pub mod rate_limit;
pub mod scheduler;
pub mod tts;

pub use audio::{concat_buffers, AudioAssembler, AudioDecoder};
pub use extraction::{
    split_chunks, AdaptiveChunkProcessor, AdaptiveConfig, ExtractionMethod,
    ExtractionOrchestrator, ExtractionOutcome, ExtractionProgress, ProgressObserver,
    RateLimitedExtractor, UnitFailure, UnitKind,
};
pub use generation::{
    split_parts, AudioGenerationRun, GenerationEvent, GenerationSettings, RunSummary,
};
pub use ocr::{HttpOcrEngine, HttpOcrConfig, InMemoryPages, OcrPageReader, PageTextReport};
pub use rate_limit::SlidingWindowRateLimiter;
pub use scheduler::{RunReport, TaskFailure, TaskProgress, TaskRunner};
pub use tts::{
    check_speech_limits, compose_continuous_text, AudioSynthesisPipeline, OpenAiSpeechClient,
    SpeechClientConfig, SynthesisConfig,
};

use serde::Serialize;
use thiserror::Error;
use vocab_audio_core::Error as CoreError;

/// Pipeline errors
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    #[error(transparent)]
    Service(#[from] CoreError),

    #[error("No vocabulary could be extracted")]
    NoVocabulary,

    #[error("Audio decode error: {0}")]
    Decode(String),

    #[error("Speech input too large: {0}")]
    SpeechLimit(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cancelled")]
    Cancelled,
}

/// Failure category shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Authentication,
    RateLimited,
    Network,
    Timeout,
    InvalidResponse,
    NoVocabulary,
    AudioDecode,
    SpeechLimit,
    InvalidInput,
    Service,
    Cancelled,
}

impl PipelineError {
    pub fn reason(&self) -> FailureReason {
        match self {
            PipelineError::Service(err) => match err {
                CoreError::Authentication(_) => FailureReason::Authentication,
                CoreError::RateLimited(_) => FailureReason::RateLimited,
                CoreError::Network(_) => FailureReason::Network,
                CoreError::Timeout(_) => FailureReason::Timeout,
                CoreError::InvalidResponse(_) => FailureReason::InvalidResponse,
                CoreError::InvalidRequest(_) => FailureReason::InvalidInput,
                CoreError::Audio(_) => FailureReason::AudioDecode,
                CoreError::Service { .. } | CoreError::Ocr(_) | CoreError::Configuration(_) => {
                    FailureReason::Service
                },
            },
            PipelineError::NoVocabulary => FailureReason::NoVocabulary,
            PipelineError::Decode(_) => FailureReason::AudioDecode,
            PipelineError::SpeechLimit(_) => FailureReason::SpeechLimit,
            PipelineError::InvalidInput(_) => FailureReason::InvalidInput,
            PipelineError::Cancelled => FailureReason::Cancelled,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }
}
