//! Session state machine and progress tracking.
//!
//! ```text
//! Pending ──start──▶ Processing ──complete──▶ Completed
//!                        │
//!                        └──────fail────────▶ Failed
//! ```
//!
//! Terminal states absorb: every update after `Completed`/`Failed` returns
//! [`StateError::Terminal`] and leaves the state untouched.
//!
//! ## Percent
//!
//! Batch generation owns the 0–80 band (`floor(80 * done / total)`); the
//! post-generation phases then step through fixed markers (85, 90, 95, 97,
//! 98) and only `complete` writes 100. A lower value is never written while
//! processing, so the sequence observed by any subscriber is non-decreasing.
//!
//! ## Single writer
//!
//! The state lives in a `tokio::sync::watch` channel. Every mutation goes
//! through `send_if_modified`, which holds the channel's internal lock for
//! the duration of the closure, so concurrent batch completions cannot race
//! on `batches_done` or percent. No lock is held across an `.await`.

use crate::error::StateError;
use crate::model::{DocumentType, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Percent reached when every batch has resolved.
pub const GENERATION_BAND: u8 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Failed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Pending => "pending",
            Status::Processing => "processing",
            Status::Completed => "completed",
            Status::Failed => "failed",
        })
    }
}

/// What the pipeline is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Queued,
    Planning,
    Classifying,
    Generating,
    Aggregating,
    BuildingMockTest,
    CompilingNotes,
    BuildingFlashcards,
    Persisting,
    Done,
}

impl Phase {
    /// Fixed percent marker reached on entering the phase, if any.
    pub fn marker(&self) -> Option<u8> {
        match self {
            Phase::Aggregating => Some(85),
            Phase::BuildingMockTest => Some(90),
            Phase::CompilingNotes => Some(95),
            Phase::BuildingFlashcards => Some(97),
            Phase::Persisting => Some(98),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Queued => "queued",
            Phase::Planning => "planning",
            Phase::Classifying => "classifying",
            Phase::Generating => "generating",
            Phase::Aggregating => "aggregating",
            Phase::BuildingMockTest => "building mock test",
            Phase::CompilingNotes => "compiling notes",
            Phase::BuildingFlashcards => "building flashcards",
            Phase::Persisting => "persisting",
            Phase::Done => "done",
        })
    }
}

/// Observable processing state of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingState {
    pub session_id: SessionId,
    pub status: Status,
    pub phase: Phase,
    pub document_type: Option<DocumentType>,
    pub batches_total: usize,
    pub batches_done: usize,
    pub batches_failed: usize,
    pub percent: u8,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProcessingState {
    pub fn pending(session_id: SessionId) -> Self {
        Self {
            session_id,
            status: Status::Pending,
            phase: Phase::Queued,
            document_type: None,
            batches_total: 0,
            batches_done: 0,
            batches_failed: 0,
            percent: 0,
            error_message: None,
            started_at: None,
            completed_at: None,
        }
    }

    fn bump_percent(&mut self, percent: u8) -> bool {
        // 100 is reserved for `complete`.
        let percent = percent.min(99);
        if percent > self.percent {
            self.percent = percent;
            true
        } else {
            false
        }
    }

    fn require_processing(&self) -> Result<(), StateError> {
        match self.status {
            Status::Processing => Ok(()),
            Status::Pending => Err(StateError::NotStarted),
            s => Err(StateError::Terminal(s.to_string())),
        }
    }
}

/// Owner of a session's [`ProcessingState`].
///
/// Cheap to clone; all clones write to the same channel.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    tx: Arc<watch::Sender<ProcessingState>>,
}

impl ProgressTracker {
    pub fn new(session_id: SessionId) -> Self {
        let (tx, _rx) = watch::channel(ProcessingState::pending(session_id));
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> ProcessingState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProcessingState> {
        self.tx.subscribe()
    }

    pub fn is_terminal(&self) -> bool {
        self.tx.borrow().status.is_terminal()
    }

    /// Whether both handles drive the same session run.
    pub fn same_as(&self, other: &ProgressTracker) -> bool {
        Arc::ptr_eq(&self.tx, &other.tx)
    }

    /// `Pending → Processing`.
    pub fn start(&self, batches_total: usize) -> Result<(), StateError> {
        self.update(|s| match s.status {
            Status::Pending => {
                s.status = Status::Processing;
                s.phase = Phase::Planning;
                s.batches_total = batches_total;
                s.percent = 0;
                s.started_at = Some(Utc::now());
                Ok(true)
            }
            Status::Processing => Err(StateError::AlreadyStarted),
            t => Err(StateError::Terminal(t.to_string())),
        })
    }

    pub fn set_document_type(&self, document_type: DocumentType) -> Result<(), StateError> {
        self.update(|s| {
            s.require_processing()?;
            let changed = s.document_type != Some(document_type);
            s.document_type = Some(document_type);
            Ok(changed)
        })
    }

    /// Enter `phase`, bumping percent to its marker when it has one.
    pub fn set_phase(&self, phase: Phase) -> Result<u8, StateError> {
        let mut percent = 0;
        self.update(|s| {
            s.require_processing()?;
            let mut changed = s.phase != phase;
            s.phase = phase;
            if let Some(marker) = phase.marker() {
                changed |= s.bump_percent(marker);
            }
            percent = s.percent;
            Ok(changed)
        })?;
        Ok(percent)
    }

    /// One batch resolved (successfully or not).
    pub fn record_batch(&self, succeeded: bool) -> Result<(), StateError> {
        self.update(|s| {
            s.require_processing()?;
            if s.batches_done >= s.batches_total {
                return Ok(false);
            }
            s.batches_done += 1;
            if !succeeded {
                s.batches_failed += 1;
            }
            let band = u64::from(GENERATION_BAND);
            let pct = band * s.batches_done as u64 / s.batches_total.max(1) as u64;
            s.bump_percent(pct as u8);
            Ok(true)
        })
    }

    /// `Processing → Completed`; percent becomes 100.
    pub fn complete(&self) -> Result<(), StateError> {
        self.update(|s| {
            s.require_processing()?;
            s.status = Status::Completed;
            s.phase = Phase::Done;
            s.percent = 100;
            s.completed_at = Some(Utc::now());
            Ok(true)
        })
    }

    /// `Pending | Processing → Failed` with a caller-safe message.
    pub fn fail(&self, message: impl Into<String>) -> Result<(), StateError> {
        let message = message.into();
        self.update(|s| {
            if s.status.is_terminal() {
                return Err(StateError::Terminal(s.status.to_string()));
            }
            s.status = Status::Failed;
            s.phase = Phase::Done;
            s.error_message = Some(message);
            Ok(true)
        })
    }

    fn update<F>(&self, f: F) -> Result<(), StateError>
    where
        F: FnOnce(&mut ProcessingState) -> Result<bool, StateError>,
    {
        let mut outcome = Ok(());
        self.tx.send_if_modified(|state| match f(state) {
            Ok(changed) => changed,
            Err(e) => {
                outcome = Err(e);
                false
            }
        });
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> ProgressTracker {
        ProgressTracker::new(SessionId::new("s-test"))
    }

    #[test]
    fn starts_pending() {
        let t = tracker();
        let s = t.snapshot();
        assert_eq!(s.status, Status::Pending);
        assert_eq!(s.percent, 0);
    }

    #[test]
    fn processing_updates_require_start() {
        let t = tracker();
        assert_eq!(t.record_batch(true), Err(StateError::NotStarted));
        assert_eq!(t.set_phase(Phase::Aggregating), Err(StateError::NotStarted));
    }

    #[test]
    fn batch_progress_uses_generation_band() {
        let t = tracker();
        t.start(4).unwrap();
        t.record_batch(true).unwrap();
        assert_eq!(t.snapshot().percent, 20);
        t.record_batch(false).unwrap();
        t.record_batch(true).unwrap();
        t.record_batch(true).unwrap();
        let s = t.snapshot();
        assert_eq!(s.percent, GENERATION_BAND);
        assert_eq!(s.batches_done, 4);
        assert_eq!(s.batches_failed, 1);
    }

    #[test]
    fn extra_batch_records_are_ignored() {
        let t = tracker();
        t.start(1).unwrap();
        t.record_batch(true).unwrap();
        t.record_batch(true).unwrap();
        assert_eq!(t.snapshot().batches_done, 1);
    }

    #[test]
    fn percent_is_monotonic_and_100_only_at_completion() {
        let t = tracker();
        let mut rx = t.subscribe();
        t.start(3).unwrap();
        let mut seen = vec![rx.borrow_and_update().percent];
        for _ in 0..3 {
            t.record_batch(true).unwrap();
            seen.push(rx.borrow_and_update().percent);
        }
        for phase in [
            Phase::Aggregating,
            Phase::BuildingMockTest,
            Phase::CompilingNotes,
            Phase::BuildingFlashcards,
            Phase::Persisting,
        ] {
            t.set_phase(phase).unwrap();
            let s = rx.borrow_and_update().clone();
            assert!(s.percent < 100, "100 before completion at {phase}");
            seen.push(s.percent);
        }
        // Re-entering an earlier phase must not lower percent.
        t.set_phase(Phase::Generating).unwrap();
        seen.push(t.snapshot().percent);
        t.complete().unwrap();
        seen.push(t.snapshot().percent);

        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
        assert_eq!(*seen.last().unwrap(), 100);
        assert!(t.snapshot().completed_at.is_some());
    }

    #[test]
    fn terminal_states_absorb() {
        let t = tracker();
        t.start(2).unwrap();
        t.complete().unwrap();
        assert!(matches!(t.fail("late"), Err(StateError::Terminal(_))));
        assert!(matches!(t.record_batch(true), Err(StateError::Terminal(_))));
        assert!(matches!(t.start(2), Err(StateError::Terminal(_))));
        assert_eq!(t.snapshot().status, Status::Completed);

        let t = tracker();
        t.start(2).unwrap();
        t.fail("The document contains no readable text.").unwrap();
        assert!(matches!(t.complete(), Err(StateError::Terminal(_))));
        let s = t.snapshot();
        assert_eq!(s.status, Status::Failed);
        assert_eq!(
            s.error_message.as_deref(),
            Some("The document contains no readable text.")
        );
        assert!(s.completed_at.is_none());
    }

    #[test]
    fn pending_session_can_fail_directly() {
        let t = tracker();
        t.fail("Processing was cancelled.").unwrap();
        assert_eq!(t.snapshot().status, Status::Failed);
    }

    #[tokio::test]
    async fn concurrent_batch_updates_do_not_race() {
        let t = tracker();
        t.start(64).unwrap();
        let handles: Vec<_> = (0..64)
            .map(|i| {
                let t = t.clone();
                tokio::spawn(async move { t.record_batch(i % 8 != 0) })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }
        let s = t.snapshot();
        assert_eq!(s.batches_done, 64);
        assert_eq!(s.batches_failed, 8);
        assert_eq!(s.percent, GENERATION_BAND);
    }

    #[test]
    fn clones_share_a_run_but_new_trackers_do_not() {
        let t = tracker();
        assert!(t.same_as(&t.clone()));
        assert!(!t.same_as(&tracker()));
    }

    #[test]
    fn state_round_trips_through_json() {
        let t = tracker();
        t.start(2).unwrap();
        t.set_document_type(DocumentType::Mixed).unwrap();
        let s = t.snapshot();
        let json = serde_json::to_string(&s).unwrap();
        let back: ProcessingState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
