//! Observer trait for batch and per-stage pipeline events.
//!
//! Inject an [`Arc<dyn PipelineObserver>`] via
//! [`crate::config::PrintConfigBuilder::observer`] to receive a structured
//! event for every stage start and finish of every candidate, plus batch-level
//! milestones.
//!
//! The callback approach keeps the library ignorant of how the host
//! application reports progress: forward events to a channel, a log sink, a
//! database row or a terminal progress bar.
//!
//! # Example
//!
//! ```rust
//! use printfit::{PipelineObserver, PrintConfig, StageEvent, StageStatus};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct SkipCounter {
//!     skipped: AtomicUsize,
//! }
//!
//! impl PipelineObserver for SkipCounter {
//!     fn on_stage(&self, event: &StageEvent) {
//!         if let StageStatus::Finished(outcome) = &event.status {
//!             if !outcome.is_ok() {
//!                 self.skipped.fetch_add(1, Ordering::SeqCst);
//!             }
//!         }
//!     }
//! }
//!
//! let counter = Arc::new(SkipCounter { skipped: AtomicUsize::new(0) });
//! let config = PrintConfig::builder()
//!     .observer(counter as Arc<dyn PipelineObserver>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{Stage, StageOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Where a stage is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageStatus {
    Started,
    Finished(StageOutcome),
}

/// One entry of the per-stage event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEvent {
    /// Candidate index within the batch.
    pub candidate: usize,
    pub stage: Stage,
    pub status: StageStatus,
    pub message: String,
}

/// Receives pipeline events.
///
/// Candidates run concurrently, so every method may be called from several
/// threads at once. All methods default to no-ops.
pub trait PipelineObserver: Send + Sync {
    /// Called once before the first generator attempt.
    fn on_batch_start(&self, target: usize) {
        let _ = target;
    }

    /// Called after each generator attempt.
    fn on_acquisition_attempt(&self, attempt: u32, requested: usize, received: usize) {
        let _ = (attempt, requested, received);
    }

    /// Called when a stage starts and again when it finishes.
    fn on_stage(&self, event: &StageEvent) {
        let _ = event;
    }

    /// Called when a candidate finished every mandatory stage.
    fn on_candidate_complete(&self, index: usize) {
        let _ = index;
    }

    /// Called when a candidate is dropped.
    fn on_candidate_failed(&self, index: usize, error: &str) {
        let _ = (index, error);
    }

    /// Called once after every candidate was attempted.
    fn on_batch_complete(&self, total: usize, succeeded: usize) {
        let _ = (total, succeeded);
    }
}

/// Observer that ignores everything. Used when none is configured.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Type stored in [`crate::config::PrintConfig`].
pub type ObserverHandle = Arc<dyn PipelineObserver>;
