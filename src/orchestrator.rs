//! Session orchestration: the entry point that drives a source through the
//! whole pipeline.
//!
//! ## Pipeline Steps
//!
//! 1. **Plan**: split the source into batches. An empty source fails here,
//!    before any generator call.
//! 2. **Start**: `Pending → Processing`, state persisted.
//! 3. **Classify**: once per document.
//! 4. **Generate**: batches dispatched in ordinal order through
//!    `buffer_unordered(concurrency)`, each inside the retry wrapper. Results
//!    are fed to the [`Aggregator`] as they complete.
//! 5. **Derive**: aggregate, mock test, notes, flashcards.
//! 6. **Persist**: every artifact, then `Completed`.
//!
//! A batch failure never fails the session on its own; only "nothing
//! succeeded" or "nothing usable came back" does.
//!
//! ## Cancellation
//!
//! [`Pipeline::cancel`] and `session_timeout_secs` both stop dispatch. Calls
//! already in flight get `cancel_grace_ms` to finish; whatever is still
//! running after that is dropped and recorded as abandoned. Collected
//! results are still aggregated and persisted, then the session fails with
//! a cancelled or timed-out reason. A cancel that arrives after generation
//! but before persisting is honoured the same way; once `Persisting` has
//! begun the session can no longer be cancelled.
//!
//! Finished sessions are dropped from the in-memory map once their terminal
//! state is in the store; later lookups read the store.

use crate::artifacts::{
    Artifact, ArtifactKind, BatchOutcome, BatchReport, Diagnostics, MockTest,
};
use crate::config::PipelineConfig;
use crate::error::{BatchError, PipelineError, StateError};
use crate::generate::{ContentGenerator, GenerationRequest};
use crate::model::{Batch, BatchScope, DocumentType, SessionId, SessionMeta, Source};
use crate::pipeline::aggregate::{AggregatedSession, Aggregator};
use crate::pipeline::notes::NotesConfig;
use crate::pipeline::retry::{generate_with_retry, RetryOutcome};
use crate::pipeline::{classify, flashcards, mock_test, notes, plan};
use crate::state::{Phase, ProcessingState, ProgressTracker};
use crate::store::SessionStore;
use crate::stream::{state_stream, StateStream};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Summary of a completed session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub state: ProcessingState,
    pub document_type: DocumentType,
    /// Artifact kinds written to the store, in write order.
    pub saved: Vec<ArtifactKind>,
    pub diagnostics: Diagnostics,
    pub questions: usize,
    pub mnemonics: usize,
    pub cheat_points: usize,
    pub flashcards: usize,
    pub mock_test: Option<MockTest>,
}

struct SessionHandle {
    tracker: ProgressTracker,
    cancel: Arc<watch::Sender<bool>>,
}

/// Drives sessions through the pipeline.
///
/// One `Pipeline` can run many sessions concurrently; each has its own
/// tracker and cancellation flag. Wrap it in an `Arc` to use
/// [`Pipeline::start`].
pub struct Pipeline {
    generator: Arc<dyn ContentGenerator>,
    store: Arc<dyn SessionStore>,
    config: PipelineConfig,
    sessions: Mutex<HashMap<SessionId, SessionHandle>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("generator", &self.generator.name())
            .field("config", &self.config)
            .finish()
    }
}

impl Pipeline {
    /// # Errors
    /// [`PipelineError::InvalidConfig`] if `config` breaks a constraint
    /// [`PipelineConfig::validate`] checks. A concurrency of 0 is raised to 1.
    pub fn new(
        generator: Arc<dyn ContentGenerator>,
        store: Arc<dyn SessionStore>,
        mut config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        config.concurrency = config.concurrency.max(1);
        config.validate()?;
        Ok(Self {
            generator,
            store,
            config,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process `source` as session `session_id` and wait for the result.
    ///
    /// # Errors
    /// Any fatal [`PipelineError`]. The session's state is `Failed` with the
    /// error's [`PipelineError::user_message`] by the time this returns.
    pub async fn run(
        &self,
        session_id: SessionId,
        source: Source,
    ) -> Result<SessionReport, PipelineError> {
        let (tracker, cancel_rx) = self.register(&session_id)?;
        self.drive(session_id, source, tracker, cancel_rx).await
    }

    /// Start processing in the background and return immediately.
    ///
    /// The session is registered before this returns, so
    /// [`Pipeline::get_state`] and [`Pipeline::subscribe`] work right away.
    /// The returned handle may be dropped.
    pub fn start(
        self: &Arc<Self>,
        session_id: SessionId,
        source: Source,
    ) -> Result<JoinHandle<Result<SessionReport, PipelineError>>, PipelineError> {
        let (tracker, cancel_rx) = self.register(&session_id)?;
        let this = Arc::clone(self);
        Ok(tokio::spawn(async move {
            this.drive(session_id, source, tracker, cancel_rx).await
        }))
    }

    /// Current state: the live tracker if this pipeline knows the session,
    /// otherwise whatever the store last persisted.
    pub async fn get_state(&self, session_id: &SessionId) -> Result<ProcessingState, PipelineError> {
        if let Some(tracker) = self.tracker(session_id) {
            return Ok(tracker.snapshot());
        }
        self.store
            .load_state(session_id)
            .await?
            .ok_or_else(|| PipelineError::UnknownSession(session_id.to_string()))
    }

    /// Request cancellation.
    ///
    /// Returns `false` if the session already finished or is persisting its
    /// final artifacts. A `true` result means the session will end `Failed`
    /// with a cancelled reason.
    pub async fn cancel(&self, session_id: &SessionId) -> Result<bool, PipelineError> {
        {
            let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(handle) = sessions.get(session_id) {
                let state = handle.tracker.snapshot();
                if state.status.is_terminal() || matches!(state.phase, Phase::Persisting | Phase::Done)
                {
                    return Ok(false);
                }
                info!("Session {}: cancellation requested", session_id);
                handle.cancel.send_replace(true);
                return Ok(true);
            }
        }
        match self.store.load_state(session_id).await? {
            Some(_) => Ok(false),
            None => Err(PipelineError::UnknownSession(session_id.to_string())),
        }
    }

    /// Number of sessions still held in memory.
    pub fn active_sessions(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Stream of state snapshots, ending after the terminal state.
    pub fn subscribe(&self, session_id: &SessionId) -> Result<StateStream, PipelineError> {
        self.tracker(session_id)
            .map(|t| state_stream(t.subscribe()))
            .ok_or_else(|| PipelineError::UnknownSession(session_id.to_string()))
    }

    fn tracker(&self, session_id: &SessionId) -> Option<ProgressTracker> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .map(|h| h.tracker.clone())
    }

    /// Create the tracker and cancel flag. A finished session id may be reused.
    fn register(
        &self,
        session_id: &SessionId,
    ) -> Result<(ProgressTracker, watch::Receiver<bool>), PipelineError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = sessions.get(session_id) {
            if !existing.tracker.is_terminal() {
                return Err(PipelineError::SessionAlreadyRunning(session_id.to_string()));
            }
        }
        let tracker = ProgressTracker::new(session_id.clone());
        let (cancel_tx, cancel_rx) = watch::channel(false);
        sessions.insert(
            session_id.clone(),
            SessionHandle {
                tracker: tracker.clone(),
                cancel: Arc::new(cancel_tx),
            },
        );
        Ok((tracker, cancel_rx))
    }

    /// Forget a finished session, unless its id was already taken by a new run.
    fn evict(&self, session_id: &SessionId, tracker: &ProgressTracker) {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        if sessions
            .get(session_id)
            .is_some_and(|h| h.tracker.same_as(tracker))
        {
            sessions.remove(session_id);
            debug!("Session {}: released", session_id);
        }
    }

    /// Run the session and settle its terminal state.
    async fn drive(
        &self,
        session_id: SessionId,
        source: Source,
        tracker: ProgressTracker,
        cancel_rx: watch::Receiver<bool>,
    ) -> Result<SessionReport, PipelineError> {
        let started = Instant::now();
        info!("Session {}: starting", session_id);

        let result = self.execute(&session_id, source, &tracker, cancel_rx).await;
        let snapshot = tracker.snapshot();
        let cb = self.config.progress_callback.as_ref();

        match result {
            Ok(report) => {
                info!(
                    "Session {}: completed in {:?} ({} question(s), {}/{} batch(es))",
                    session_id,
                    started.elapsed(),
                    report.questions,
                    snapshot.batches_done - snapshot.batches_failed,
                    snapshot.batches_total
                );
                if let Some(cb) = cb {
                    cb.on_session_complete(
                        snapshot.batches_done - snapshot.batches_failed,
                        snapshot.batches_total,
                        None,
                    );
                }
                self.evict(&session_id, &tracker);
                Ok(report)
            }
            Err(e) => {
                error!("Session {}: failed: {}", session_id, e);
                let message = e.user_message();
                if let Err(state_err) = tracker.fail(message.clone()) {
                    debug!("Session {}: fail ignored: {}", session_id, state_err);
                }
                // The live tracker stays the only record if the store missed it.
                let persisted = match self.store.save_state(&tracker.snapshot()).await {
                    Ok(()) => true,
                    Err(store_err) => {
                        error!(
                            "Session {}: could not persist failed state: {}",
                            session_id, store_err
                        );
                        false
                    }
                };
                if let Some(cb) = cb {
                    let s = tracker.snapshot();
                    cb.on_session_complete(
                        s.batches_done - s.batches_failed,
                        s.batches_total,
                        Some(&message),
                    );
                }
                if persisted {
                    self.evict(&session_id, &tracker);
                }
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        session_id: &SessionId,
        source: Source,
        tracker: &ProgressTracker,
        mut cancel_rx: watch::Receiver<bool>,
    ) -> Result<SessionReport, PipelineError> {
        let config = &self.config;
        let meta = SessionMeta::for_source(session_id, &source, Utc::now());

        // A reused id must not serve artifacts from its previous run.
        self.store.clear_artifacts(session_id).await?;

        // ── Step 1: Plan ─────────────────────────────────────────────────
        let batches = plan::plan(&source, config)?;
        let total = batches.len();
        info!(
            "Session {}: {} batch(es) from {}",
            session_id,
            total,
            match &source {
                Source::Topic { .. } => "topic".to_string(),
                Source::File { pages, .. } => format!("{} page(s)", pages.len()),
            }
        );

        // ── Step 2: Start ────────────────────────────────────────────────
        tracker.start(total).map_err(state_error)?;
        self.store.save_state(&tracker.snapshot()).await?;
        if let Some(ref cb) = config.progress_callback {
            cb.on_session_start(total);
        }

        // ── Step 3: Classify ─────────────────────────────────────────────
        self.enter_phase(session_id, tracker, Phase::Classifying)?;
        let document_type = classify::classify_source(&source, config.classifier_sample_chars);
        tracker.set_document_type(document_type).map_err(state_error)?;
        info!("Session {}: document classified as {}", session_id, document_type);

        // ── Step 4: Generate ─────────────────────────────────────────────
        self.enter_phase(session_id, tracker, Phase::Generating)?;
        self.store.save_state(&tracker.snapshot()).await?;

        let planned: Vec<(usize, String, BatchScope)> = batches
            .iter()
            .map(|b| (b.ordinal, b.id.clone(), b.scope))
            .collect();
        let mut collected = Collected::new();
        let stop = self
            .generate(session_id, batches, document_type, tracker, &mut cancel_rx, &mut collected)
            .await;

        for (ordinal, batch_id, scope) in planned {
            if !collected.reports.contains_key(&ordinal) {
                collected.abandon(ordinal, batch_id, scope);
            }
        }

        let succeeded = collected.aggregator.received();
        let Collected {
            aggregator,
            reports,
            first_error,
        } = collected;

        if let Some(stop) = stop {
            warn!(
                "Session {}: stopped with {}/{} batch(es) collected",
                session_id, succeeded, total
            );
            if succeeded > 0 {
                let session = aggregator.finish();
                let diagnostics = build_diagnostics(&session, reports);
                match self.derive(&session, &meta, diagnostics, None) {
                    Ok(artifacts) => self.persist_partial(session_id, &artifacts).await,
                    Err(e) => error!(
                        "Session {}: could not derive collected results: {}",
                        session_id, e
                    ),
                }
            }
            return Err(stop);
        }

        if succeeded == 0 {
            return Err(PipelineError::AllBatchesFailed {
                total,
                first_error: first_error.unwrap_or_else(|| "unknown error".to_string()),
            });
        }

        // ── Step 5: Derive ───────────────────────────────────────────────
        self.enter_phase(session_id, tracker, Phase::Aggregating)?;
        let session = aggregator.finish();
        let diagnostics = build_diagnostics(&session, reports);
        if session.is_empty() {
            self.persist(session_id, &[Artifact::Diagnostics(diagnostics)]).await?;
            return Err(PipelineError::NoUsableContent);
        }
        let artifacts = self.derive(&session, &meta, diagnostics.clone(), Some(tracker))?;

        // ── Step 6: Persist ──────────────────────────────────────────────
        if let Err(stop) = self.begin_persisting(session_id, tracker, &cancel_rx) {
            warn!("Session {}: cancelled before persisting", session_id);
            self.persist_partial(session_id, &artifacts).await;
            return Err(stop);
        }
        let saved = self.persist(session_id, &artifacts).await?;
        tracker.complete().map_err(state_error)?;
        self.store.save_state(&tracker.snapshot()).await?;

        let mock_test = artifacts.iter().find_map(|a| match a {
            Artifact::MockTest(t) => Some(t.clone()),
            _ => None,
        });
        let flashcards = artifacts
            .iter()
            .find_map(|a| match a {
                Artifact::Flashcards(d) => Some(d.len()),
                _ => None,
            })
            .unwrap_or(0);

        Ok(SessionReport {
            state: tracker.snapshot(),
            document_type,
            saved,
            diagnostics,
            questions: session.questions.len(),
            mnemonics: session.mnemonics.len(),
            cheat_points: session.cheat_sheet.len(),
            flashcards,
            mock_test,
        })
    }

    /// Run every batch through the retry wrapper with bounded concurrency.
    ///
    /// Returns the reason generation stopped early, if it did.
    async fn generate(
        &self,
        session_id: &SessionId,
        batches: Vec<Batch>,
        document_type: DocumentType,
        tracker: &ProgressTracker,
        cancel_rx: &mut watch::Receiver<bool>,
        collected: &mut Collected,
    ) -> Option<PipelineError> {
        let config = &self.config;
        let total = batches.len();
        let policy = config.retry_policy();
        let call_timeout = config.api_timeout();
        let deadline = config
            .session_timeout_secs
            .map(|secs| (secs, tokio::time::Instant::now() + Duration::from_secs(secs)));

        let generator = Arc::clone(&self.generator);
        let cb = config.progress_callback.clone();
        let mut results = stream::iter(batches.into_iter().map(|batch| {
            let generator = Arc::clone(&generator);
            let cb = cb.clone();
            let request = GenerationRequest::for_batch(&batch, document_type);
            async move {
                if let Some(ref cb) = cb {
                    cb.on_batch_start(batch.ordinal, total);
                }
                debug!("Batch {}: dispatched ({})", batch.ordinal, batch.scope);
                let start = Instant::now();
                let outcome =
                    generate_with_retry(generator.as_ref(), &request, &policy, call_timeout).await;
                (batch, outcome, start.elapsed())
            }
        }))
        .buffer_unordered(config.concurrency);

        let stop = loop {
            tokio::select! {
                biased;
                _ = cancelled(cancel_rx) => break Some(PipelineError::Cancelled),
                secs = deadline_elapsed(deadline) => break Some(PipelineError::TimedOut { secs }),
                next = results.next() => match next {
                    Some((batch, outcome, elapsed)) => {
                        self.record(tracker, collected, batch, outcome, elapsed, total);
                    }
                    None => break None,
                },
            }
        };

        if stop.is_some() {
            info!(
                "Session {}: draining in-flight batches for up to {:?}",
                session_id,
                config.cancel_grace()
            );
            let grace = tokio::time::sleep(config.cancel_grace());
            tokio::pin!(grace);
            loop {
                tokio::select! {
                    _ = &mut grace => break,
                    next = results.next() => match next {
                        Some((batch, outcome, elapsed)) => {
                            self.record(tracker, collected, batch, outcome, elapsed, total);
                        }
                        None => break,
                    },
                }
            }
        }
        stop
    }

    fn record(
        &self,
        tracker: &ProgressTracker,
        collected: &mut Collected,
        batch: Batch,
        outcome: RetryOutcome,
        elapsed: Duration,
        total: usize,
    ) {
        let cb = self.config.progress_callback.as_ref();
        let report = match outcome.result {
            Ok(result) => {
                let questions = result.questions.len();
                let missing_fields = result.missing_fields();
                debug!(
                    "Batch {}: {} question(s), {} mnemonic(s), {} cheat point(s) in {:?}",
                    batch.ordinal,
                    questions,
                    result.mnemonics.len(),
                    result.cheat_points.len(),
                    elapsed
                );
                collected.aggregator.insert(result);
                record_progress(tracker, true);
                if let Some(cb) = cb {
                    cb.on_batch_complete(batch.ordinal, total, questions);
                }
                BatchReport {
                    ordinal: batch.ordinal,
                    batch_id: batch.id,
                    scope: batch.scope,
                    attempts: outcome.attempts,
                    duration_ms: elapsed.as_millis() as u64,
                    outcome: if missing_fields.is_empty() {
                        BatchOutcome::Complete
                    } else {
                        BatchOutcome::Partial
                    },
                    missing_fields,
                    error: None,
                }
            }
            Err(e) => {
                warn!(
                    "Batch {} ({}): recorded as missing after {} attempt(s): {}",
                    batch.ordinal, batch.scope, outcome.attempts, e
                );
                collected.aggregator.mark_missing(batch.ordinal);
                collected.first_error.get_or_insert_with(|| e.to_string());
                record_progress(tracker, false);
                if let Some(cb) = cb {
                    cb.on_batch_error(batch.ordinal, total, e.kind());
                }
                BatchReport {
                    ordinal: batch.ordinal,
                    batch_id: batch.id,
                    scope: batch.scope,
                    attempts: outcome.attempts,
                    duration_ms: elapsed.as_millis() as u64,
                    outcome: BatchOutcome::Missing,
                    missing_fields: Vec::new(),
                    error: Some(BatchError::GenerationFailed {
                        ordinal: batch.ordinal,
                        attempts: outcome.attempts,
                        kind: e.kind().to_string(),
                        detail: sanitize_detail(&e.to_string()),
                    }),
                }
            }
        };
        collected.reports.insert(report.ordinal, report);
    }

    /// Build every derived artifact. Phase markers advance only when a
    /// tracker is given.
    fn derive(
        &self,
        session: &AggregatedSession,
        meta: &SessionMeta,
        diagnostics: Diagnostics,
        tracker: Option<&ProgressTracker>,
    ) -> Result<Vec<Artifact>, PipelineError> {
        let id = &meta.session_id;
        let phase = |p: Phase| match tracker {
            Some(t) => self.enter_phase(id, t, p),
            None => Ok(()),
        };

        let mut artifacts = vec![
            Artifact::QuestionBank(session.questions.clone()),
            Artifact::MnemonicSet(session.mnemonics.clone()),
            Artifact::CheatSheet(session.cheat_sheet.clone()),
        ];

        phase(Phase::BuildingMockTest)?;
        match mock_test::build(&session.questions, meta) {
            Ok(test) => artifacts.push(Artifact::MockTest(test)),
            Err(e) => warn!("Session {}: mock test skipped: {}", id, e),
        }

        phase(Phase::CompilingNotes)?;
        artifacts.push(Artifact::Notes(notes::compile(
            session,
            &NotesConfig::from(&self.config),
        )));

        phase(Phase::BuildingFlashcards)?;
        artifacts.push(Artifact::Flashcards(flashcards::build(session)));

        artifacts.push(Artifact::Diagnostics(diagnostics));
        Ok(artifacts)
    }

    async fn persist(
        &self,
        session_id: &SessionId,
        artifacts: &[Artifact],
    ) -> Result<Vec<ArtifactKind>, PipelineError> {
        let mut saved = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            self.store.save(session_id, artifact).await?;
            debug!("Session {}: saved {}", session_id, artifact.kind());
            saved.push(artifact.kind());
        }
        Ok(saved)
    }

    /// Save what a stopped session collected. Failures are logged; the
    /// session's own stop reason is what gets reported.
    async fn persist_partial(&self, session_id: &SessionId, artifacts: &[Artifact]) {
        if let Err(e) = self.persist(session_id, artifacts).await {
            error!(
                "Session {}: could not persist collected results: {}",
                session_id, e
            );
        }
    }

    /// Enter `Persisting` unless a cancel got in first. Checked under the
    /// session map lock, the same lock [`Pipeline::cancel`] takes.
    fn begin_persisting(
        &self,
        session_id: &SessionId,
        tracker: &ProgressTracker,
        cancel_rx: &watch::Receiver<bool>,
    ) -> Result<(), PipelineError> {
        let percent = {
            let _sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
            if *cancel_rx.borrow() {
                return Err(PipelineError::Cancelled);
            }
            tracker.set_phase(Phase::Persisting).map_err(state_error)?
        };
        self.announce_phase(session_id, Phase::Persisting, percent);
        Ok(())
    }

    fn enter_phase(
        &self,
        session_id: &SessionId,
        tracker: &ProgressTracker,
        phase: Phase,
    ) -> Result<(), PipelineError> {
        let percent = tracker.set_phase(phase).map_err(state_error)?;
        self.announce_phase(session_id, phase, percent);
        Ok(())
    }

    fn announce_phase(&self, session_id: &SessionId, phase: Phase, percent: u8) {
        info!("Session {}: {} ({}%)", session_id, phase, percent);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_phase(phase, percent);
        }
    }
}

/// Generation-time bookkeeping.
struct Collected {
    aggregator: Aggregator,
    reports: BTreeMap<usize, BatchReport>,
    first_error: Option<String>,
}

impl Collected {
    fn new() -> Self {
        Self {
            aggregator: Aggregator::new(),
            reports: BTreeMap::new(),
            first_error: None,
        }
    }

    fn abandon(&mut self, ordinal: usize, batch_id: String, scope: BatchScope) {
        warn!("Batch {}: abandoned", ordinal);
        self.aggregator.mark_missing(ordinal);
        self.reports.insert(
            ordinal,
            BatchReport {
                ordinal,
                batch_id,
                scope,
                attempts: 0,
                duration_ms: 0,
                outcome: BatchOutcome::Missing,
                missing_fields: Vec::new(),
                error: Some(BatchError::Abandoned { ordinal }),
            },
        );
    }
}

fn build_diagnostics(session: &AggregatedSession, reports: BTreeMap<usize, BatchReport>) -> Diagnostics {
    Diagnostics {
        batches: reports.into_values().collect(),
        missing_ordinals: session.missing_ordinals.clone(),
        dropped_invalid_questions: session.dropped_invalid_questions,
        dropped_duplicate_questions: session.dropped_duplicate_questions,
    }
}

fn record_progress(tracker: &ProgressTracker, succeeded: bool) {
    if let Err(e) = tracker.record_batch(succeeded) {
        debug!("Progress update ignored: {}", e);
    }
}

fn state_error(e: StateError) -> PipelineError {
    PipelineError::Internal(format!("state transition rejected: {e}"))
}

/// Keep the first line only and cap its length for the diagnostics artifact.
fn sanitize_detail(detail: &str) -> String {
    const MAX: usize = 200;
    let line = detail.lines().next().unwrap_or_default();
    if line.chars().count() > MAX {
        format!("{}…", line.chars().take(MAX).collect::<String>())
    } else {
        line.to_string()
    }
}

/// Resolves once the flag is set. Never resolves if the sender is gone.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|c| *c).await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn deadline_elapsed(deadline: Option<(u64, tokio::time::Instant)>) -> u64 {
    match deadline {
        Some((secs, at)) => {
            tokio::time::sleep_until(at).await;
            secs
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_detail_keeps_first_line_and_caps() {
        assert_eq!(sanitize_detail("503\nstack trace"), "503");
        let long = "x".repeat(500);
        assert_eq!(sanitize_detail(&long).chars().count(), 201);
    }

    #[test]
    fn cancelled_waits_for_the_flag() {
        let (tx, mut rx) = watch::channel(false);
        let mut fut = tokio_test::task::spawn(cancelled(&mut rx));
        tokio_test::assert_pending!(fut.poll());
        tx.send_replace(true);
        assert!(fut.is_woken());
        tokio_test::assert_ready!(fut.poll());
    }

    #[test]
    fn cancelled_stays_pending_without_sender() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        let mut fut = tokio_test::task::spawn(cancelled(&mut rx));
        tokio_test::assert_pending!(fut.poll());
    }
}
