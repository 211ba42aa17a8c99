//! OCR path: page sources, the HTTP OCR engine and page-text assembly

pub mod http_backend;
pub mod pages;

pub use http_backend::{HttpOcrConfig, HttpOcrEngine};
pub use pages::{InMemoryPages, OcrPageReader, PageTextReport};
