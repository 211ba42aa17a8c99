//! Extraction orchestration
//!
//! Small documents go to the extraction service in one call. Larger ones
//! (or small ones whose direct call failed above the fallback threshold)
//! are split into fixed-size chunks and driven through the adaptive chunk
//! processor, in parallel or sequentially. Chunk results are merged in
//! chunk order and de-duplicated by source word.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use vocab_audio_config::{ConcurrencyConfig, ExtractionConfig};
use vocab_audio_core::{
    dedupe_by_source_word, Error, ExtractionOptions, PageSource, VocabExtractor, VocabList,
};

use super::adaptive::{AdaptiveChunkProcessor, AdaptiveConfig};
use super::chunking::{char_len, split_chunks};
use super::limited::{FatalLatch, RateLimitedExtractor};
use super::{notify, ProgressObserver, UnitFailure, UnitKind};
use crate::ocr::OcrPageReader;
use crate::rate_limit::SlidingWindowRateLimiter;
use crate::scheduler::TaskRunner;
use crate::PipelineError;

/// How the final list was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Direct,
    Parallel,
    Sequential,
}

impl ExtractionMethod {
    pub fn label(&self) -> &'static str {
        match self {
            ExtractionMethod::Direct => "direct",
            ExtractionMethod::Parallel => "parallel",
            ExtractionMethod::Sequential => "sequential",
        }
    }

    fn title_label(&self) -> &'static str {
        match self {
            ExtractionMethod::Direct => "Direct",
            ExtractionMethod::Parallel => "Parallel",
            ExtractionMethod::Sequential => "Sequential",
        }
    }
}

/// Merged list plus chunk accounting
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionOutcome {
    pub list: VocabList,
    /// Chunks that yielded at least one item
    pub processed_chunks: usize,
    pub total_chunks: usize,
    pub method: ExtractionMethod,
    pub errors: Vec<UnitFailure>,
}

/// Result of driving all chunks, before merging
struct ChunkResults {
    lists: Vec<VocabList>,
    failures: Vec<UnitFailure>,
}

const ABANDONED_MESSAGE: &str = "No vocabulary extracted after retries";

pub struct ExtractionOrchestrator {
    /// Undecorated service client
    service: Arc<dyn VocabExtractor>,
    limiter: Arc<SlidingWindowRateLimiter>,
    /// `service` behind the limiter, used for direct calls
    extractor: Arc<dyn VocabExtractor>,
    config: ExtractionConfig,
    adaptive: AdaptiveConfig,
    concurrency: ConcurrencyConfig,
    observer: Option<ProgressObserver>,
}

impl ExtractionOrchestrator {
    /// Every call made through this orchestrator waits on `limiter` first
    pub fn new(
        extractor: Arc<dyn VocabExtractor>,
        limiter: Arc<SlidingWindowRateLimiter>,
        config: &ExtractionConfig,
        concurrency: ConcurrencyConfig,
    ) -> Self {
        Self {
            extractor: Arc::new(RateLimitedExtractor::new(extractor.clone(), limiter.clone())),
            service: extractor,
            limiter,
            adaptive: AdaptiveConfig::from(config),
            config: config.clone(),
            concurrency,
            observer: None,
        }
    }

    pub fn with_progress(mut self, observer: ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Extract vocabulary from plain document text
    pub async fn extract_document(
        &self,
        text: &str,
        options: &ExtractionOptions,
    ) -> Result<ExtractionOutcome, PipelineError> {
        if text.trim().is_empty() {
            return Err(PipelineError::InvalidInput("Document text is empty".to_string()));
        }

        let len = char_len(text);
        if len > self.config.direct_limit_chars {
            tracing::info!(chars = len, "Document exceeds direct limit, chunking");
            return self.extract_chunked(text, options).await;
        }

        let failure = match self.extractor.extract(text, options).await {
            Ok(list) if !list.is_empty() => {
                let items = dedupe_by_source_word(list.items);
                tracing::info!(items = items.len(), "Direct extraction succeeded");
                return Ok(ExtractionOutcome {
                    list: VocabList::new(list.title, list.description, items),
                    processed_chunks: 1,
                    total_chunks: 1,
                    method: ExtractionMethod::Direct,
                    errors: Vec::new(),
                });
            },
            Ok(_) => PipelineError::NoVocabulary,
            Err(e) => PipelineError::Service(e),
        };

        let fatal = matches!(&failure, PipelineError::Service(e) if e.is_fatal());
        if !fatal && len > self.config.fallback_threshold_chars {
            tracing::warn!(chars = len, error = %failure, "Direct extraction failed, falling back to chunks");
            return self.extract_chunked(text, options).await;
        }

        tracing::error!(error = %failure, "Direct extraction failed");
        Err(failure)
    }

    /// Recognize page images, then extract from the joined text
    pub async fn extract_pages(
        &self,
        reader: &OcrPageReader,
        pages: &dyn PageSource,
        options: &ExtractionOptions,
    ) -> Result<ExtractionOutcome, PipelineError> {
        let report = reader
            .read_pages(pages, &self.concurrency, self.observer.as_ref())
            .await?;
        tracing::info!(
            recognized = report.recognized_pages,
            total = report.total_pages,
            chars = report.text.len(),
            "Pages recognized"
        );

        let mut outcome = self.extract_document(&report.text, options).await?;
        let mut errors = report.failures;
        errors.append(&mut outcome.errors);
        outcome.errors = errors;
        Ok(outcome)
    }

    async fn extract_chunked(
        &self,
        text: &str,
        options: &ExtractionOptions,
    ) -> Result<ExtractionOutcome, PipelineError> {
        let chunks = split_chunks(text, self.config.chunk_size);
        let total = chunks.len();
        // The latch sits behind the limiter so a call that was waiting for a
        // slot when another chunk hit a fatal error never reaches the service.
        let latch = Arc::new(FatalLatch::new(self.service.clone()));
        let limited = Arc::new(RateLimitedExtractor::new(latch.clone(), self.limiter.clone()));
        let processor = AdaptiveChunkProcessor::new(limited, self.adaptive.clone());

        let (method, results) = if self.concurrency.enabled && total > 1 {
            (
                ExtractionMethod::Parallel,
                self.run_parallel(&processor, &latch, chunks, options).await?,
            )
        } else {
            (
                ExtractionMethod::Sequential,
                self.run_sequential(&processor, chunks, options).await?,
            )
        };

        let processed = results.lists.len();
        let items = dedupe_by_source_word(results.lists.into_iter().flat_map(|list| list.items));
        tracing::info!(
            method = method.label(),
            processed,
            total,
            items = items.len(),
            "Chunked extraction finished"
        );

        if items.is_empty() {
            return Err(PipelineError::NoVocabulary);
        }

        Ok(ExtractionOutcome {
            list: VocabList::new(
                format!("Extracted Vocabulary List ({} Fallback)", method.title_label()),
                format!(
                    "Vocabulary extracted from PDF using {} fallback method ({}/{} chunks processed)",
                    method.label(),
                    processed,
                    total
                ),
                items,
            ),
            processed_chunks: processed,
            total_chunks: total,
            method,
            errors: results.failures,
        })
    }

    /// Chunks through the task runner; the first fatal error fails the whole
    /// extraction, as in sequential mode, and chunks not yet started are skipped
    async fn run_parallel(
        &self,
        processor: &AdaptiveChunkProcessor,
        latch: &FatalLatch,
        chunks: Vec<String>,
        options: &ExtractionOptions,
    ) -> Result<ChunkResults, PipelineError> {
        let total = chunks.len();
        let runner = TaskRunner::new(self.concurrency.max_concurrent_extraction);
        tracing::info!(chunks = total, max_concurrent = runner.max_concurrent(), "Parallel chunk extraction");

        let observer = self.observer.as_ref();
        let report = runner
            .run(
                chunks,
                move |chunk: String, index| async move {
                    if let Some(err) = latch.tripped() {
                        tracing::debug!(chunk = index + 1, "Skipping chunk after fatal error");
                        return Err(err);
                    }
                    processor.process(&chunk, index + 1, total, options).await
                },
                |progress| {
                    let error = match progress.outcome {
                        Ok(Some(_)) => None,
                        Ok(None) => Some(ABANDONED_MESSAGE.to_string()),
                        Err(e) => Some(e.to_string()),
                    };
                    notify(
                        observer,
                        UnitKind::Chunk,
                        progress.completed,
                        progress.total,
                        progress.index + 1,
                        error,
                    );
                },
            )
            .await;

        if let Some(err) = latch.tripped() {
            tracing::error!(
                failed_chunks = report.errors.len(),
                error = %err,
                "Fatal extraction error"
            );
            return Err(err.into());
        }

        let mut results = ChunkResults {
            lists: Vec::new(),
            failures: Vec::new(),
        };
        for (index, outcome) in report.results {
            match outcome {
                Some(list) => results.lists.push(list),
                None => results.failures.push(chunk_failure(index + 1, ABANDONED_MESSAGE)),
            }
        }
        for failure in report.errors {
            results
                .failures
                .push(chunk_failure(failure.index + 1, failure.error.to_string()));
        }
        results.failures.sort_by_key(|f| f.number);
        Ok(results)
    }

    async fn run_sequential(
        &self,
        processor: &AdaptiveChunkProcessor,
        chunks: Vec<String>,
        options: &ExtractionOptions,
    ) -> Result<ChunkResults, PipelineError> {
        let total = chunks.len();
        let delay = Duration::from_millis(self.config.sequential_delay_ms);
        tracing::info!(chunks = total, "Sequential chunk extraction");

        let mut results = ChunkResults {
            lists: Vec::new(),
            failures: Vec::new(),
        };
        for (i, chunk) in chunks.iter().enumerate() {
            let number = i + 1;
            tracing::debug!(chunk = number, total, chars = char_len(chunk), "Processing chunk");

            match processor.process(chunk, number, total, options).await {
                Ok(Some(list)) => {
                    notify(self.observer.as_ref(), UnitKind::Chunk, number, total, number, None);
                    results.lists.push(list);
                },
                Ok(None) => {
                    notify(
                        self.observer.as_ref(),
                        UnitKind::Chunk,
                        number,
                        total,
                        number,
                        Some(ABANDONED_MESSAGE.to_string()),
                    );
                    results.failures.push(chunk_failure(number, ABANDONED_MESSAGE));
                },
                Err(e) => {
                    tracing::error!(chunk = number, error = %e, "Fatal extraction error");
                    return Err(e.into());
                },
            }

            if number < total {
                tokio::time::sleep(delay).await;
            }
        }
        Ok(results)
    }
}

fn chunk_failure(number: usize, message: impl Into<String>) -> UnitFailure {
    UnitFailure {
        kind: UnitKind::Chunk,
        number,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use vocab_audio_core::VocabItem;

    /// Answers with one item named after the first word of the input
    struct FirstWord {
        calls: Mutex<Vec<usize>>,
        fail_over: usize,
        empty: bool,
    }

    impl FirstWord {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_over: usize::MAX,
                empty: false,
            }
        }
    }

    #[async_trait]
    impl VocabExtractor for FirstWord {
        async fn extract(
            &self,
            text: &str,
            _options: &ExtractionOptions,
        ) -> vocab_audio_core::Result<VocabList> {
            let len = char_len(text);
            self.calls.lock().push(len);
            if len > self.fail_over {
                return Err(Error::Timeout(Duration::from_secs(60)));
            }
            if self.empty {
                return Ok(VocabList::default());
            }
            let word = text.split_whitespace().next().unwrap_or("leeg");
            Ok(VocabList::new(
                "Les 1",
                "Woorden",
                vec![VocabItem::new(word, "x"), VocabItem::new(word.to_uppercase(), "y")],
            ))
        }

        fn model_name(&self) -> &str {
            "first-word"
        }
    }

    fn orchestrator(extractor: Arc<FirstWord>, concurrency: ConcurrencyConfig) -> ExtractionOrchestrator {
        ExtractionOrchestrator::new(
            extractor,
            Arc::new(SlidingWindowRateLimiter::new(100, Duration::from_secs(60))),
            &ExtractionConfig::default(),
            concurrency,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_direct_extraction() {
        let extractor = Arc::new(FirstWord::new());
        let outcome = orchestrator(extractor.clone(), ConcurrencyConfig::default())
            .extract_document("huis woning", &ExtractionOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.method, ExtractionMethod::Direct);
        assert_eq!(outcome.list.title, "Les 1");
        // "huis" and "HUIS" share one identity key.
        assert_eq!(outcome.list.items.len(), 1);
        assert_eq!((outcome.processed_chunks, outcome.total_chunks), (1, 1));
        assert_eq!(extractor.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_document_rejected() {
        let err = orchestrator(Arc::new(FirstWord::new()), ConcurrencyConfig::default())
            .extract_document("  \n ", &ExtractionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_small_document_failure_propagates() {
        let extractor = Arc::new(FirstWord {
            fail_over: 10,
            ..FirstWord::new()
        });
        let err = orchestrator(extractor.clone(), ConcurrencyConfig::default())
            .extract_document(&"woord ".repeat(500), &ExtractionOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Service(Error::Timeout(_))));
        assert_eq!(extractor.calls.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_direct_result_is_no_vocabulary() {
        let extractor = Arc::new(FirstWord {
            empty: true,
            ..FirstWord::new()
        });
        let err = orchestrator(extractor, ConcurrencyConfig::default())
            .extract_document("huis", &ExtractionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoVocabulary));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_direct_call_falls_back_to_chunks() {
        let extractor = Arc::new(FirstWord {
            fail_over: 3000,
            ..FirstWord::new()
        });
        let text = "woord ".repeat(1000);
        let outcome = orchestrator(extractor.clone(), ConcurrencyConfig::default())
            .extract_document(&text, &ExtractionOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.method, ExtractionMethod::Parallel);
        assert_eq!((outcome.processed_chunks, outcome.total_chunks), (2, 2));
        assert_eq!(outcome.list.title, "Extracted Vocabulary List (Parallel Fallback)");
        assert_eq!(
            outcome.list.description,
            "Vocabulary extracted from PDF using parallel fallback method (2/2 chunks processed)"
        );
        assert_eq!(extractor.calls.lock()[0], 6000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_mode_waits_between_chunks() {
        let extractor = Arc::new(FirstWord::new());
        let concurrency = ConcurrencyConfig {
            enabled: false,
            ..Default::default()
        };
        let text = "a".repeat(9000);

        let start = tokio::time::Instant::now();
        let outcome = orchestrator(extractor, concurrency)
            .extract_document(&text, &ExtractionOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.method, ExtractionMethod::Sequential);
        assert_eq!(outcome.total_chunks, 3);
        assert!(outcome.list.title.ends_with("(Sequential Fallback)"));
        assert_eq!(start.elapsed(), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_chunks_abandoned() {
        let extractor = Arc::new(FirstWord {
            fail_over: 0,
            ..FirstWord::new()
        });
        let err = orchestrator(extractor, ConcurrencyConfig::default())
            .extract_document(&"a".repeat(9000), &ExtractionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoVocabulary));
    }

    /// Accepts the first call, rejects the key on every later one
    struct KeyRevoked {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl VocabExtractor for KeyRevoked {
        async fn extract(
            &self,
            _text: &str,
            _options: &ExtractionOptions,
        ) -> vocab_audio_core::Result<VocabList> {
            let call = {
                let mut calls = self.calls.lock();
                *calls += 1;
                *calls
            };
            if call > 1 {
                return Err(Error::Authentication("Invalid API key".to_string()));
            }
            Ok(VocabList::new("Les 1", "Woorden", vec![VocabItem::new("huis", "ev")]))
        }

        fn model_name(&self) -> &str {
            "key-revoked"
        }
    }

    async fn revoked_key_run(enabled: bool) -> (PipelineError, usize) {
        let extractor = Arc::new(KeyRevoked {
            calls: Mutex::new(0),
        });
        let concurrency = ConcurrencyConfig {
            enabled,
            max_concurrent_extraction: 1,
            ..Default::default()
        };
        let err = ExtractionOrchestrator::new(
            extractor.clone(),
            Arc::new(SlidingWindowRateLimiter::new(100, Duration::from_secs(60))),
            &ExtractionConfig::default(),
            concurrency,
        )
        .extract_document(&"a".repeat(12_000), &ExtractionOptions::default())
        .await
        .unwrap_err();
        let calls = *extractor.calls.lock();
        (err, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_stops_parallel_chunks() {
        // Chunk 1 succeeds, chunk 2 is rejected, chunks 3 and 4 never call out.
        let (err, calls) = revoked_key_run(true).await;
        assert!(matches!(err, PipelineError::Service(Error::Authentication(_))));
        assert_eq!(calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_fails_both_modes_alike() {
        let (parallel, parallel_calls) = revoked_key_run(true).await;
        let (sequential, sequential_calls) = revoked_key_run(false).await;
        assert_eq!(parallel.to_string(), sequential.to_string());
        assert_eq!(parallel_calls, sequential_calls);
    }
}
