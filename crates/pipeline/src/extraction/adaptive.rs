//! Adaptive shrink-and-subdivide chunk processing
//!
//! A chunk that fails (error or empty list) is cut into smaller consecutive
//! sub-chunks of the original text, which get one attempt each. The size
//! shrinks by `shrink_factor` per failed round and the chunk is abandoned
//! once the retry budget is spent or the size drops below the floor.

use std::sync::Arc;
use std::time::Duration;

use vocab_audio_config::ExtractionConfig;
use vocab_audio_core::{Error, ExtractionOptions, VocabExtractor, VocabItem, VocabList};

use super::chunking::{char_len, prefix, split_chunks};

/// Retry state of one chunk, owned by a single `process` call
#[derive(Debug)]
struct ChunkJob {
    chunk_number: usize,
    total_chunks: usize,
    current_size: usize,
    retries: u32,
}

/// Tuning for the retry loop
#[derive(Debug, Clone)]
pub struct AdaptiveConfig {
    pub max_retries: u32,
    pub shrink_factor: f64,
    pub min_chunk_chars: usize,
    pub sub_chunk_delay: Duration,
}

impl From<&ExtractionConfig> for AdaptiveConfig {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            shrink_factor: config.shrink_factor,
            min_chunk_chars: config.min_chunk_chars,
            sub_chunk_delay: Duration::from_millis(config.sub_chunk_delay_ms),
        }
    }
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self::from(&ExtractionConfig::default())
    }
}

#[derive(Clone)]
pub struct AdaptiveChunkProcessor {
    extractor: Arc<dyn VocabExtractor>,
    config: AdaptiveConfig,
}

impl AdaptiveChunkProcessor {
    pub fn new(extractor: Arc<dyn VocabExtractor>, config: AdaptiveConfig) -> Self {
        Self { extractor, config }
    }

    /// Extract one chunk, shrinking and subdividing on failure
    ///
    /// Returns `Ok(None)` when the chunk is abandoned. Only fatal errors
    /// (authentication, configuration) are returned as `Err`.
    pub async fn process(
        &self,
        chunk: &str,
        chunk_number: usize,
        total_chunks: usize,
        options: &ExtractionOptions,
    ) -> Result<Option<VocabList>, Error> {
        let mut job = ChunkJob {
            chunk_number,
            total_chunks,
            current_size: char_len(chunk),
            retries: 0,
        };
        let mut attempt_text = chunk;

        loop {
            match self.extractor.extract(attempt_text, options).await {
                Ok(list) if !list.is_empty() => {
                    tracing::debug!(
                        chunk = job.chunk_number,
                        total = job.total_chunks,
                        items = list.len(),
                        "Chunk extracted"
                    );
                    return Ok(Some(list));
                },
                Ok(_) => tracing::warn!(
                    chunk = job.chunk_number,
                    attempt = job.retries + 1,
                    "Chunk returned no items"
                ),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::warn!(
                    chunk = job.chunk_number,
                    attempt = job.retries + 1,
                    error = %e,
                    "Chunk extraction failed"
                ),
            }

            job.retries += 1;
            if job.retries >= self.config.max_retries {
                tracing::warn!(
                    chunk = job.chunk_number,
                    retries = job.retries,
                    "Retry budget spent, abandoning chunk"
                );
                return Ok(None);
            }

            let new_size = (job.current_size as f64 * self.config.shrink_factor).floor() as usize;
            if new_size < self.config.min_chunk_chars {
                tracing::warn!(
                    chunk = job.chunk_number,
                    size = new_size,
                    floor = self.config.min_chunk_chars,
                    "Chunk too small to subdivide, abandoning"
                );
                return Ok(None);
            }
            job.current_size = new_size;

            if let Some(list) = self.process_sub_chunks(chunk, &job, options).await? {
                return Ok(Some(list));
            }

            attempt_text = prefix(chunk, job.current_size);
        }
    }

    /// One attempt per sub-chunk of the original text, in order
    async fn process_sub_chunks(
        &self,
        chunk: &str,
        job: &ChunkJob,
        options: &ExtractionOptions,
    ) -> Result<Option<VocabList>, Error> {
        let sub_chunks = split_chunks(chunk, job.current_size);
        let count = sub_chunks.len();
        tracing::debug!(
            chunk = job.chunk_number,
            size = job.current_size,
            sub_chunks = count,
            "Subdividing chunk"
        );

        let mut items: Vec<VocabItem> = Vec::new();
        for (i, sub_chunk) in sub_chunks.iter().enumerate() {
            match self.extractor.extract(sub_chunk, options).await {
                Ok(list) => items.extend(list.items),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::warn!(
                    chunk = job.chunk_number,
                    sub_chunk = i + 1,
                    error = %e,
                    "Sub-chunk failed"
                ),
            }

            if i + 1 < count {
                tokio::time::sleep(self.config.sub_chunk_delay).await;
            }
        }

        if items.is_empty() {
            return Ok(None);
        }

        tracing::info!(
            chunk = job.chunk_number,
            items = items.len(),
            "Chunk recovered from sub-chunks"
        );
        Ok(Some(VocabList::new(
            format!("Chunk {} Results", job.chunk_number),
            "Extracted from sub-chunks",
            items,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Records the size of every call and fails those over `max_ok` chars
    struct SizeGate {
        max_ok: usize,
        calls: Mutex<Vec<usize>>,
        fatal: bool,
    }

    impl SizeGate {
        fn new(max_ok: usize) -> Self {
            Self {
                max_ok,
                calls: Mutex::new(Vec::new()),
                fatal: false,
            }
        }

        fn calls(&self) -> Vec<usize> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl VocabExtractor for SizeGate {
        async fn extract(
            &self,
            text: &str,
            _options: &ExtractionOptions,
        ) -> vocab_audio_core::Result<VocabList> {
            let len = char_len(text);
            self.calls.lock().push(len);
            if self.fatal {
                return Err(Error::Authentication("invalid key".into()));
            }
            if len > self.max_ok {
                return Err(Error::InvalidResponse("truncated JSON".into()));
            }
            Ok(VocabList::new(
                "t",
                "d",
                vec![VocabItem::new(format!("w{}", len), "x")],
            ))
        }

        fn model_name(&self) -> &str {
            "size-gate"
        }
    }

    fn processor(gate: Arc<SizeGate>) -> AdaptiveChunkProcessor {
        AdaptiveChunkProcessor::new(gate, AdaptiveConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let gate = Arc::new(SizeGate::new(usize::MAX));
        let result = processor(gate.clone())
            .process(&"a".repeat(3000), 1, 1, &ExtractionOptions::default())
            .await
            .unwrap();

        assert_eq!(result.unwrap().items[0].source_word, "w3000");
        assert_eq!(gate.calls(), vec![3000]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_chunk_is_abandoned() {
        let gate = Arc::new(SizeGate::new(0));
        let result = processor(gate.clone())
            .process(&"a".repeat(3000), 2, 5, &ExtractionOptions::default())
            .await
            .unwrap();

        assert!(result.is_none());
        // Three top-level attempts (3000, 2100, 1470) plus sub-chunk rounds
        // at 2100 and 1470.
        assert_eq!(gate.calls(), vec![3000, 2100, 900, 2100, 1470, 1470, 60, 1470]);
        assert!(gate.calls().iter().skip(1).all(|&len| len <= 2100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_from_sub_chunks() {
        let gate = Arc::new(SizeGate::new(1000));
        let result = processor(gate.clone())
            .process(&"a".repeat(3000), 4, 7, &ExtractionOptions::default())
            .await
            .unwrap()
            .unwrap();

        // Only the 900-char tail of the first round fits.
        assert_eq!(gate.calls(), vec![3000, 2100, 900]);
        assert_eq!(result.title, "Chunk 4 Results");
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].source_word, "w900");
    }

    #[tokio::test(start_paused = true)]
    async fn test_small_chunk_hits_floor() {
        let gate = Arc::new(SizeGate::new(0));
        let result = processor(gate.clone())
            .process(&"a".repeat(600), 1, 1, &ExtractionOptions::default())
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(gate.calls(), vec![600]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sub_chunk_delay() {
        let gate = Arc::new(SizeGate::new(1000));
        let start = tokio::time::Instant::now();
        processor(gate)
            .process(&"a".repeat(3000), 1, 1, &ExtractionOptions::default())
            .await
            .unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_fatal_error_propagates() {
        let gate = Arc::new(SizeGate {
            fatal: true,
            ..SizeGate::new(usize::MAX)
        });
        let err = processor(gate.clone())
            .process(&"a".repeat(3000), 1, 1, &ExtractionOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Authentication(_)));
        assert_eq!(gate.calls().len(), 1);
    }
}
