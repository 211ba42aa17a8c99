//! Application State
//!
//! Shared state across all handlers.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use vocab_audio_config::{ConcurrencyConfig, Settings};
use vocab_audio_core::{OcrEngine, SpeechSynthesizer, VocabExtractor};
use vocab_audio_llm::{ExtractionClientConfig, OpenAiExtractionClient};
use vocab_audio_pipeline::{
    AudioGenerationRun, HttpOcrConfig, HttpOcrEngine, OpenAiSpeechClient, SlidingWindowRateLimiter,
    SpeechClientConfig,
};

use crate::ServerError;

/// Application state
#[derive(Clone)]
pub struct AppState {
    /// Settings; only the concurrency section changes at runtime
    pub config: Arc<RwLock<Settings>>,
    /// `None` until an API key is configured
    pub extractor: Option<Arc<dyn VocabExtractor>>,
    pub speech: Option<Arc<dyn SpeechSynthesizer>>,
    pub ocr: Arc<dyn OcrEngine>,
    /// Shared by every extraction request
    pub limiter: Arc<SlidingWindowRateLimiter>,
    pub runs: Arc<RwLock<HashMap<String, Arc<AudioGenerationRun>>>>,
}

impl AppState {
    /// Build the hosted service clients from settings
    pub fn new(config: Settings) -> Result<Self, ServerError> {
        let extractor: Option<Arc<dyn VocabExtractor>> = match OpenAiExtractionClient::new(
            ExtractionClientConfig::from_settings(&config.openai, &config.extraction.languages),
        ) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "Extraction client not configured");
                None
            },
        };

        let speech: Option<Arc<dyn SpeechSynthesizer>> =
            match OpenAiSpeechClient::new(SpeechClientConfig::from_settings(&config.openai)) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    tracing::warn!(error = %e, "Speech client not configured");
                    None
                },
            };

        let ocr = HttpOcrEngine::new(HttpOcrConfig::from(&config.ocr))
            .map_err(|e| ServerError::Internal(format!("Failed to create OCR client: {}", e)))?;

        Ok(Self::with_services(config, extractor, speech, Arc::new(ocr)))
    }

    /// State with explicit service implementations
    pub fn with_services(
        config: Settings,
        extractor: Option<Arc<dyn VocabExtractor>>,
        speech: Option<Arc<dyn SpeechSynthesizer>>,
        ocr: Arc<dyn OcrEngine>,
    ) -> Self {
        let limiter = Arc::new(SlidingWindowRateLimiter::from_config(&config.concurrency));
        Self {
            config: Arc::new(RwLock::new(config)),
            extractor,
            speech,
            ocr,
            limiter,
            runs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Snapshot of the current settings
    pub fn settings(&self) -> Settings {
        self.config.read().clone()
    }

    pub fn concurrency(&self) -> ConcurrencyConfig {
        self.config.read().concurrency.clone()
    }

    /// Validate and apply new concurrency settings
    ///
    /// The rate limiter picks up the new limits immediately; scheduling
    /// ceilings apply to work started afterwards.
    pub fn update_concurrency(&self, concurrency: ConcurrencyConfig) -> Result<(), ServerError> {
        concurrency.validate()?;
        self.limiter.apply_config(&concurrency);
        self.config.write().concurrency = concurrency;
        tracing::info!("Concurrency settings updated");
        Ok(())
    }

    pub fn insert_run(&self, id: String, run: Arc<AudioGenerationRun>) {
        self.evict_expired_runs();
        self.runs.write().insert(id, run);
    }

    pub fn run(&self, id: &str) -> Result<Arc<AudioGenerationRun>, ServerError> {
        self.evict_expired_runs();
        self.runs
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ServerError::NotFound(format!("Unknown run: {}", id)))
    }

    /// Cancel a run and drop it with all of its audio
    pub fn remove_run(&self, id: &str) -> Result<(), ServerError> {
        let run = self
            .runs
            .write()
            .remove(id)
            .ok_or_else(|| ServerError::NotFound(format!("Unknown run: {}", id)))?;
        run.cancel();
        tracing::info!(run_id = %id, "Audio run removed");
        Ok(())
    }

    /// Drop runs that finished more than `audio.run_retention_secs` ago
    ///
    /// Returns how many runs were evicted. Runs still generating are kept.
    pub fn evict_expired_runs(&self) -> usize {
        let retention = Duration::from_secs(self.config.read().audio.run_retention_secs);
        let mut runs = self.runs.write();
        let before = runs.len();
        runs.retain(|_, run| match run.finished_at() {
            Some(finished_at) => finished_at.elapsed() < retention,
            None => true,
        });
        let evicted = before - runs.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = runs.len(), "Evicted expired audio runs");
        }
        evicted
    }

    /// Periodically evict expired runs, even while the API is idle
    pub fn spawn_run_sweeper(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(every);
            ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                state.evict_expired_runs();
            }
        })
    }

    pub fn is_ready(&self) -> bool {
        self.extractor.is_some() && self.speech.is_some()
    }
}
