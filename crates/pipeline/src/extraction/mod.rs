//! Document extraction
//!
//! ```text
//! document ──► direct call (≤ direct limit) ──► list
//!     │              │ failed and > fallback threshold
//!     ▼              ▼
//!   split_chunks ──► TaskRunner / sequential ──► AdaptiveChunkProcessor
//!                                                   │
//!                        merge in chunk order ◄─────┘
//!                        dedupe by source word
//! ```
//!
//! Every extraction call passes through the shared rate limiter.

pub mod adaptive;
pub mod chunking;
pub mod limited;
pub mod orchestrator;

pub use adaptive::{AdaptiveChunkProcessor, AdaptiveConfig};
pub use chunking::{char_len, prefix, split_chunks};
pub use limited::{FatalLatch, RateLimitedExtractor};
pub use orchestrator::{ExtractionMethod, ExtractionOrchestrator, ExtractionOutcome};

use serde::Serialize;
use std::sync::Arc;

/// Unit of work reported by progress and failure records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Page,
    Chunk,
}

/// A page or chunk that contributed nothing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitFailure {
    pub kind: UnitKind,
    /// 1-based page or chunk number
    pub number: usize,
    pub message: String,
}

/// Emitted once per page or chunk reaching a terminal state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionProgress {
    pub kind: UnitKind,
    pub completed: usize,
    pub total: usize,
    pub number: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Progress callback shared with concurrent workers
pub type ProgressObserver = Arc<dyn Fn(&ExtractionProgress) + Send + Sync>;

pub(crate) fn notify(
    observer: Option<&ProgressObserver>,
    kind: UnitKind,
    completed: usize,
    total: usize,
    number: usize,
    error: Option<String>,
) {
    if let Some(observer) = observer {
        observer(&ExtractionProgress {
            kind,
            completed,
            total,
            number,
            error,
        });
    }
}
