//! Vocabulary extraction trait

use crate::{Result, VocabList};
use async_trait::async_trait;
use std::sync::Arc;

/// Per-request extraction flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtractionOptions {
    /// Ask for the secondary-language translation as well
    pub include_secondary: bool,
}

/// Remote text-extraction service
///
/// A call succeeds when the service returns a parseable list; an empty
/// item list is still `Ok` and callers decide whether that counts as failure.
#[async_trait]
pub trait VocabExtractor: Send + Sync + 'static {
    /// Extract vocabulary from one unit of text
    async fn extract(&self, text: &str, options: &ExtractionOptions) -> Result<VocabList>;

    /// Model name for logging
    fn model_name(&self) -> &str;
}

#[async_trait]
impl<T: VocabExtractor + ?Sized> VocabExtractor for Arc<T> {
    async fn extract(&self, text: &str, options: &ExtractionOptions) -> Result<VocabList> {
        (**self).extract(text, options).await
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}
