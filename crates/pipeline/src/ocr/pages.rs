//! Page-image text recognition
//!
//! Pages are recognized in parallel (bounded by `max_concurrent_ocr`) or one
//! at a time. Successful page texts are joined with `'\n'` in page order no
//! matter which page finished first; failed pages become failure records.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use vocab_audio_config::ConcurrencyConfig;
use vocab_audio_core::{Error, OcrEngine, PageImage, PageSource, Result};

use crate::extraction::{notify, ProgressObserver, UnitFailure, UnitKind};
use crate::scheduler::TaskRunner;
use crate::PipelineError;

/// Page images that are already rendered
#[derive(Debug, Clone, Default)]
pub struct InMemoryPages {
    pages: Vec<PageImage>,
}

impl InMemoryPages {
    pub fn new(images: impl IntoIterator<Item = Bytes>, mime_type: &str) -> Self {
        let pages = images
            .into_iter()
            .enumerate()
            .map(|(i, bytes)| PageImage {
                page_number: i + 1,
                bytes,
                mime_type: mime_type.to_string(),
            })
            .collect();
        Self { pages }
    }
}

#[async_trait]
impl PageSource for InMemoryPages {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    async fn render_page(&self, page_number: usize) -> Result<PageImage> {
        page_number
            .checked_sub(1)
            .and_then(|i| self.pages.get(i))
            .cloned()
            .ok_or_else(|| Error::Ocr(format!("Page {} out of range", page_number)))
    }
}

/// Joined text of a document plus per-page failures
#[derive(Debug, Clone)]
pub struct PageTextReport {
    pub text: String,
    pub total_pages: usize,
    pub recognized_pages: usize,
    pub failures: Vec<UnitFailure>,
}

pub struct OcrPageReader {
    engine: Arc<dyn OcrEngine>,
    languages: String,
}

impl OcrPageReader {
    pub fn new(engine: Arc<dyn OcrEngine>, languages: impl Into<String>) -> Self {
        Self {
            engine,
            languages: languages.into(),
        }
    }

    async fn read_page(&self, pages: &dyn PageSource, page_number: usize) -> Result<String> {
        let image = pages.render_page(page_number).await?;
        self.engine.recognize(&image, &self.languages).await
    }

    pub async fn read_pages(
        &self,
        pages: &dyn PageSource,
        concurrency: &ConcurrencyConfig,
        observer: Option<&ProgressObserver>,
    ) -> std::result::Result<PageTextReport, PipelineError> {
        let total = pages.page_count();
        if total == 0 {
            return Err(PipelineError::InvalidInput("Document has no pages".to_string()));
        }

        let mut texts = Vec::with_capacity(total);
        let mut failures = Vec::new();

        if concurrency.enabled && total > 1 {
            tracing::info!(pages = total, max_concurrent = concurrency.max_concurrent_ocr, "Parallel OCR");
            let runner = TaskRunner::new(concurrency.max_concurrent_ocr);
            let reader = self;
            let report = runner
                .run(
                    (1..=total).collect(),
                    move |page_number, _| async move { reader.read_page(pages, page_number).await },
                    |progress| {
                        notify(
                            observer,
                            UnitKind::Page,
                            progress.completed,
                            progress.total,
                            progress.index + 1,
                            progress.outcome.err().map(ToString::to_string),
                        )
                    },
                )
                .await;

            texts.extend(report.results.into_iter().map(|(_, text)| text));
            failures.extend(report.errors.into_iter().map(|failure| UnitFailure {
                kind: UnitKind::Page,
                number: failure.item,
                message: failure.error.to_string(),
            }));
        } else {
            tracing::info!(pages = total, "Sequential OCR");
            for page_number in 1..=total {
                let outcome = self.read_page(pages, page_number).await;
                notify(
                    observer,
                    UnitKind::Page,
                    page_number,
                    total,
                    page_number,
                    outcome.as_ref().err().map(ToString::to_string),
                );
                match outcome {
                    Ok(text) => texts.push(text),
                    Err(e) => failures.push(UnitFailure {
                        kind: UnitKind::Page,
                        number: page_number,
                        message: e.to_string(),
                    }),
                }
            }
        }

        for failure in &failures {
            tracing::warn!(page = failure.number, error = %failure.message, "Page recognition failed");
        }

        if texts.is_empty() {
            let message = failures
                .first()
                .map(|f| f.message.clone())
                .unwrap_or_else(|| "No page could be recognized".to_string());
            return Err(Error::Ocr(message).into());
        }

        Ok(PageTextReport {
            recognized_pages: texts.len(),
            text: texts.join("\n"),
            total_pages: total,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::ExtractionProgress;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Later pages finish first; page 3 fails
    struct SlowFirstPages;

    #[async_trait]
    impl OcrEngine for SlowFirstPages {
        async fn recognize(&self, page: &PageImage, languages: &str) -> Result<String> {
            assert_eq!(languages, "nld+eng");
            let delay = 100 - page.page_number as u64 * 10;
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if page.page_number == 3 {
                return Err(Error::Ocr("blurred".into()));
            }
            Ok(format!("page {}", page.page_number))
        }
    }

    fn pages(count: usize) -> InMemoryPages {
        InMemoryPages::new(
            (0..count).map(|_| Bytes::from_static(b"img")),
            "image/png",
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_pages_keep_order() {
        let reader = OcrPageReader::new(Arc::new(SlowFirstPages), "nld+eng");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let observer: ProgressObserver =
            Arc::new(move |p: &ExtractionProgress| sink.lock().push(p.completed));

        let report = reader
            .read_pages(&pages(5), &ConcurrencyConfig::default(), Some(&observer))
            .await
            .unwrap();

        assert_eq!(report.text, "page 1\npage 2\npage 4\npage 5");
        assert_eq!(report.recognized_pages, 4);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].number, 3);
        assert_eq!(*seen.lock(), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_pages() {
        let reader = OcrPageReader::new(Arc::new(SlowFirstPages), "nld+eng");
        let concurrency = ConcurrencyConfig {
            enabled: false,
            ..Default::default()
        };

        let report = reader.read_pages(&pages(3), &concurrency, None).await.unwrap();
        assert_eq!(report.text, "page 1\npage 2");
        assert_eq!(report.total_pages, 3);
    }

    #[tokio::test]
    async fn test_no_pages() {
        let reader = OcrPageReader::new(Arc::new(SlowFirstPages), "nld+eng");
        let err = reader
            .read_pages(&InMemoryPages::default(), &ConcurrencyConfig::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_page_out_of_range() {
        let source = pages(1);
        assert!(source.render_page(0).await.is_err());
        assert_eq!(source.render_page(1).await.unwrap().page_number, 1);
        assert!(source.render_page(2).await.is_err());
    }
}
