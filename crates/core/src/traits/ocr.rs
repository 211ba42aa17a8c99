//! OCR traits

use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// A rendered document page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 1-based page number
    pub page_number: usize,
    pub bytes: Bytes,
    pub mime_type: String,
}

/// Source of rendered page images
#[async_trait]
pub trait PageSource: Send + Sync {
    fn page_count(&self) -> usize;

    /// Render page `page_number` (1-based)
    async fn render_page(&self, page_number: usize) -> Result<PageImage>;
}

/// Text recognition over a single page image
#[async_trait]
pub trait OcrEngine: Send + Sync + 'static {
    /// Recognize text using a language pack hint such as `nld+eng`
    async fn recognize(&self, page: &PageImage, languages: &str) -> Result<String>;

    async fn health_check(&self) -> bool {
        true
    }
}
