//! Sliding-window rate limiter
//!
//! Admits at most `max_requests` calls within any trailing `window`. Waiters
//! compute their delay from the current log, sleep without holding the lock
//! and re-check on wake, since other callers may have taken the slot.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

use vocab_audio_config::ConcurrencyConfig;

#[derive(Debug)]
struct LimiterState {
    /// Admission timestamps, oldest first
    log: VecDeque<Instant>,
    max_requests: usize,
    window: Duration,
}

impl LimiterState {
    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.log.front() {
            if now.duration_since(*oldest) >= self.window {
                self.log.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Shared limiter for calls into the extraction service
#[derive(Debug)]
pub struct SlidingWindowRateLimiter {
    state: Mutex<LimiterState>,
}

impl SlidingWindowRateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            state: Mutex::new(LimiterState {
                log: VecDeque::new(),
                max_requests: max_requests.max(1),
                window,
            }),
        }
    }

    pub fn from_config(config: &ConcurrencyConfig) -> Self {
        Self::new(
            config.rate_limit_max_requests,
            Duration::from_millis(config.rate_limit_window_ms),
        )
    }

    /// Wait until a call may be made, then record it
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock();
                let now = Instant::now();
                state.prune(now);

                if state.log.len() < state.max_requests {
                    state.log.push_back(now);
                    return;
                }

                // The call that has to leave the window before we fit.
                let blocking = state.log[state.log.len() - state.max_requests];
                state.window.saturating_sub(now.duration_since(blocking))
            };

            tracing::debug!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Replace the limits; the next `acquire` uses them
    pub fn set_limits(&self, max_requests: usize, window: Duration) {
        let mut state = self.state.lock();
        state.max_requests = max_requests.max(1);
        state.window = window;
        tracing::info!(
            max_requests = state.max_requests,
            window_ms = window.as_millis() as u64,
            "Rate limits updated"
        );
    }

    pub fn apply_config(&self, config: &ConcurrencyConfig) {
        self.set_limits(
            config.rate_limit_max_requests,
            Duration::from_millis(config.rate_limit_window_ms),
        );
    }

    pub fn limits(&self) -> (usize, Duration) {
        let state = self.state.lock();
        (state.max_requests, state.window)
    }

    /// Admissions still inside the window
    pub fn recent_calls(&self) -> usize {
        let mut state = self.state.lock();
        state.prune(Instant::now());
        state.log.len()
    }
}

impl Default for SlidingWindowRateLimiter {
    fn default() -> Self {
        Self::from_config(&ConcurrencyConfig::default())
    }
}
