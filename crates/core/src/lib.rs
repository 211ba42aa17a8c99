//! Core traits and types for vocab-audio
//!
//! This crate provides the foundational types used across all other crates:
//! - Vocabulary items and lists produced by extraction
//! - Audio file entries and their lifecycle
//! - PCM buffers and WAV encoding
//! - Service traits for pluggable backends (extraction, speech, OCR)
//! - Cancellation token shared by long-running runs
//! - Error types

pub mod audio;
pub mod audio_file;
pub mod cancel;
pub mod error;
pub mod traits;
pub mod vocab;

pub use audio::{AudioFormat, EncodedAudio, PcmBuffer, WAV_HEADER_LEN};
pub use audio_file::{AudioFileEntry, FileId, FileStatus};
pub use cancel::CancellationToken;
pub use error::{Error, Result};
pub use vocab::{dedupe_by_source_word, VocabItem, VocabList};

pub use traits::{
    ExtractionOptions, OcrEngine, PageImage, PageSource, SpeechRequest, SpeechSynthesizer,
    VocabExtractor,
};
