//! Extractor wrappers: rate limiting and fail-fast on fatal errors

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use vocab_audio_core::{Error, ExtractionOptions, Result, VocabExtractor, VocabList};

use crate::rate_limit::SlidingWindowRateLimiter;

pub struct RateLimitedExtractor {
    inner: Arc<dyn VocabExtractor>,
    limiter: Arc<SlidingWindowRateLimiter>,
}

impl RateLimitedExtractor {
    pub fn new(inner: Arc<dyn VocabExtractor>, limiter: Arc<SlidingWindowRateLimiter>) -> Self {
        Self { inner, limiter }
    }
}

#[async_trait]
impl VocabExtractor for RateLimitedExtractor {
    async fn extract(&self, text: &str, options: &ExtractionOptions) -> Result<VocabList> {
        self.limiter.acquire().await;
        self.inner.extract(text, options).await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

/// Refuses further calls once any call has failed fatally
///
/// Shared by all chunks of one extraction so that a rejected key stops
/// every sibling instead of each one spending a rate-limit slot on it.
pub struct FatalLatch {
    inner: Arc<dyn VocabExtractor>,
    tripped: Mutex<Option<Error>>,
}

impl FatalLatch {
    pub fn new(inner: Arc<dyn VocabExtractor>) -> Self {
        Self {
            inner,
            tripped: Mutex::new(None),
        }
    }

    /// First fatal error seen, if any
    pub fn tripped(&self) -> Option<Error> {
        self.tripped.lock().clone()
    }
}

#[async_trait]
impl VocabExtractor for FatalLatch {
    async fn extract(&self, text: &str, options: &ExtractionOptions) -> Result<VocabList> {
        if let Some(err) = self.tripped() {
            return Err(err);
        }
        let result = self.inner.extract(text, options).await;
        if let Err(e) = &result {
            if e.is_fatal() {
                self.tripped.lock().get_or_insert_with(|| e.clone());
            }
        }
        result
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use vocab_audio_core::VocabItem;

    struct Counting(AtomicUsize);

    #[async_trait]
    impl VocabExtractor for Counting {
        async fn extract(&self, _text: &str, _options: &ExtractionOptions) -> Result<VocabList> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(VocabList::new("t", "d", vec![VocabItem::new("huis", "ev")]))
        }

        fn model_name(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_wait_for_slot() {
        let inner = Arc::new(Counting(AtomicUsize::new(0)));
        let limiter = Arc::new(SlidingWindowRateLimiter::new(2, Duration::from_secs(10)));
        let limited = RateLimitedExtractor::new(inner.clone(), limiter.clone());

        let start = tokio::time::Instant::now();
        for _ in 0..3 {
            limited
                .extract("tekst", &ExtractionOptions::default())
                .await
                .unwrap();
        }

        assert_eq!(inner.0.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(limited.model_name(), "counting");
    }

    struct Unauthorized(AtomicUsize);

    #[async_trait]
    impl VocabExtractor for Unauthorized {
        async fn extract(&self, _text: &str, _options: &ExtractionOptions) -> Result<VocabList> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(Error::Authentication("Invalid API key".to_string()))
        }

        fn model_name(&self) -> &str {
            "unauthorized"
        }
    }

    #[tokio::test]
    async fn test_latch_stops_after_fatal_error() {
        let inner = Arc::new(Unauthorized(AtomicUsize::new(0)));
        let latch = FatalLatch::new(inner.clone());
        let options = ExtractionOptions::default();

        assert!(latch.tripped().is_none());
        for _ in 0..3 {
            let err = latch.extract("tekst", &options).await.unwrap_err();
            assert!(matches!(err, Error::Authentication(_)));
        }
        assert_eq!(inner.0.load(Ordering::SeqCst), 1);
        assert!(latch.tripped().is_some());
    }

    #[tokio::test]
    async fn test_latch_ignores_recoverable_errors() {
        struct Flaky;

        #[async_trait]
        impl VocabExtractor for Flaky {
            async fn extract(&self, _text: &str, _options: &ExtractionOptions) -> Result<VocabList> {
                Err(Error::Timeout(Duration::from_secs(60)))
            }

            fn model_name(&self) -> &str {
                "flaky"
            }
        }

        let latch = FatalLatch::new(Arc::new(Flaky));
        let _ = latch.extract("tekst", &ExtractionOptions::default()).await;
        assert!(latch.tripped().is_none());
    }
}
