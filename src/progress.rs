//! Progress-callback trait for per-batch pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through a session. The authoritative state
//! lives in [`crate::state::ProgressTracker`]; callbacks are a push-style
//! convenience for terminals and logs.
//!
//! # Example
//!
//! ```rust
//! use edgequake_study::{PipelineConfig, PipelineProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for CountingCallback {
//!     fn on_batch_complete(&self, ordinal: usize, total: usize, questions: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("batch {}/{}: {} questions", ordinal + 1, total, questions);
//!     }
//! }
//!
//! let cb = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//! let config = PipelineConfig::builder()
//!     .progress_callback(cb as Arc<dyn PipelineProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::state::Phase;
use std::sync::Arc;

/// Called by the pipeline as it processes a session.
///
/// Batches run concurrently, so `on_batch_start`, `on_batch_complete` and
/// `on_batch_error` may be called from different tasks at the same time.
/// All methods default to no-ops.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once after planning.
    fn on_session_start(&self, total_batches: usize) {
        let _ = total_batches;
    }

    /// Called before the first generator attempt for a batch.
    fn on_batch_start(&self, ordinal: usize, total_batches: usize) {
        let _ = (ordinal, total_batches);
    }

    /// Called when a batch produced a result (complete or partial).
    ///
    /// `questions` is the number of question drafts the generator returned.
    fn on_batch_complete(&self, ordinal: usize, total_batches: usize, questions: usize) {
        let _ = (ordinal, total_batches, questions);
    }

    /// Called when a batch is recorded as missing.
    fn on_batch_error(&self, ordinal: usize, total_batches: usize, error: &str) {
        let _ = (ordinal, total_batches, error);
    }

    /// Called on every phase transition.
    fn on_phase(&self, phase: Phase, percent: u8) {
        let _ = (phase, percent);
    }

    /// Called once when the session reaches a terminal state.
    ///
    /// `error` is the sanitized message for failed sessions.
    fn on_session_complete(&self, succeeded_batches: usize, total_batches: usize, error: Option<&str>) {
        let _ = (succeeded_batches, total_batches, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        phases: Mutex<Vec<(Phase, u8)>>,
    }

    impl PipelineProgressCallback for TrackingCallback {
        fn on_batch_start(&self, _ordinal: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, _ordinal: usize, _total: usize, _questions: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_error(&self, _ordinal: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_phase(&self, phase: Phase, percent: u8) {
            self.phases.lock().unwrap().push((phase, percent));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_session_start(4);
        cb.on_batch_start(0, 4);
        cb.on_batch_complete(0, 4, 12);
        cb.on_batch_error(1, 4, "rate limited");
        cb.on_phase(Phase::Aggregating, 85);
        cb.on_session_complete(3, 4, None);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_batch_start(0, 2);
        tracker.on_batch_complete(0, 2, 5);
        tracker.on_batch_start(1, 2);
        tracker.on_batch_error(1, 2, "unauthenticated");
        tracker.on_phase(Phase::Aggregating, 85);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(
            tracker.phases.lock().unwrap().as_slice(),
            &[(Phase::Aggregating, 85)]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_session_start(1);
        cb.on_batch_complete(0, 1, 3);
    }
}
