//! Service traits for vocab-audio
//!
//! External services sit behind these traits so that backends can be
//! swapped and tests can run against in-memory fakes.
//!
//! ```text
//! Extraction:
//!   - VocabExtractor: document text → vocabulary list
//!
//! Speech:
//!   - SpeechSynthesizer: text + voice → compressed audio
//!
//! OCR:
//!   - PageSource: rendered page images of a document
//!   - OcrEngine: page image → recognized text
//! ```

mod extraction;
mod ocr;
mod speech;

pub use extraction::{ExtractionOptions, VocabExtractor};
pub use ocr::{OcrEngine, PageImage, PageSource};
pub use speech::{SpeechRequest, SpeechSynthesizer};
