//! A deterministic, in-memory [`ContentGenerator`].
//!
//! Each batch ordinal can be given a queue of scripted outcomes; once the
//! queue is drained the generator falls back to either a failure or a small
//! synthetic result derived from the request. Every call is counted, which
//! is how tests prove that a stage made no generator calls, and the
//! document type each call was routed with is kept per ordinal.
//!
//! ```rust
//! use edgequake_study::generate::scripted::ScriptedGenerator;
//! use edgequake_study::GenerationError;
//!
//! let gen = ScriptedGenerator::new()
//!     .fail_then_succeed(0, GenerationError::Transient("503".into()), 1)
//!     .always_fail(2, GenerationError::Unauthenticated("401".into()));
//! assert_eq!(gen.call_count(), 0);
//! ```

use super::{ContentGenerator, GenerationRequest};
use crate::error::GenerationError;
use crate::model::{
    BatchResult, Difficulty, DocumentType, MnemonicDraft, OptionDraft, QuestionDraft,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Scripted {
    Succeed(BatchResult),
    Fail(GenerationError),
}

/// Scriptable generator for tests and offline wiring.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    scripts: Mutex<HashMap<usize, VecDeque<Scripted>>>,
    permanent: HashMap<usize, GenerationError>,
    fallback_error: Option<GenerationError>,
    delay: Option<Duration>,
    delays: HashMap<usize, Duration>,
    calls: AtomicUsize,
    /// Document type of every call, per ordinal, in call order.
    calls_by_ordinal: Mutex<HashMap<usize, Vec<DocumentType>>>,
}

impl ScriptedGenerator {
    /// Every call succeeds with [`ScriptedGenerator::sample_result`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful result for `ordinal`.
    pub fn respond(self, ordinal: usize, result: BatchResult) -> Self {
        self.push(ordinal, Scripted::Succeed(result))
    }

    /// Queue one failure for `ordinal`.
    pub fn fail(self, ordinal: usize, error: GenerationError) -> Self {
        self.push(ordinal, Scripted::Fail(error))
    }

    /// `times` failures for `ordinal`, then the default result.
    pub fn fail_then_succeed(mut self, ordinal: usize, error: GenerationError, times: usize) -> Self {
        for _ in 0..times {
            self = self.fail(ordinal, error.clone());
        }
        self
    }

    /// Every call for `ordinal` fails with `error`.
    pub fn always_fail(mut self, ordinal: usize, error: GenerationError) -> Self {
        self.permanent.insert(ordinal, error);
        self
    }

    /// Calls without a scripted outcome fail with `error` instead of succeeding.
    pub fn fail_by_default(mut self, error: GenerationError) -> Self {
        self.fallback_error = Some(error);
        self
    }

    /// Sleep before answering every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sleep before answering calls for `ordinal` (overrides `with_delay`).
    pub fn with_delay_for(mut self, ordinal: usize, delay: Duration) -> Self {
        self.delays.insert(ordinal, delay);
        self
    }

    /// Total calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls received for one ordinal.
    pub fn calls_for(&self, ordinal: usize) -> usize {
        self.document_types_for(ordinal).len()
    }

    /// The document type each call for `ordinal` carried, in call order.
    pub fn document_types_for(&self, ordinal: usize) -> Vec<DocumentType> {
        self.calls_by_ordinal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&ordinal)
            .cloned()
            .unwrap_or_default()
    }

    /// The synthetic content returned when nothing is scripted.
    ///
    /// Three valid questions, two mnemonics, three cheat points and two key
    /// concepts, all tagged with the batch ordinal so batches never dedupe
    /// into each other.
    pub fn sample_result(request: &GenerationRequest) -> BatchResult {
        let subject = if request.is_topic() {
            request.text.trim().to_string()
        } else {
            "General".to_string()
        };
        let ord = request.ordinal;
        let questions = (0..3)
            .map(|i| QuestionDraft {
                text: format!("Batch {ord} question {i}: which statement about {subject} is correct?"),
                options: (0..4)
                    .map(|o| OptionDraft::new(format!("Statement {o}"), o == i % 4))
                    .collect(),
                explanation: format!("Statement {} is the one supported by the text.", i % 4),
                difficulty: match i {
                    0 => Difficulty::Easy,
                    1 => Difficulty::Medium,
                    _ => Difficulty::Hard,
                },
                subject: subject.clone(),
            })
            .collect();
        let mnemonics = (0..2)
            .map(|i| MnemonicDraft {
                topic: format!("{subject} list {ord}.{i}"),
                device: format!("MNEMO-{ord}-{i}"),
                explanation: "Each letter stands for one item.".to_string(),
            })
            .collect();
        BatchResult {
            batch_id: request.batch_id.clone(),
            ordinal: ord,
            questions,
            mnemonics,
            cheat_points: (0..3)
                .map(|i| format!("Batch {ord} fact {i} about {subject}"))
                .collect(),
            key_concepts: (0..2).map(|i| format!("Concept {ord}.{i}")).collect(),
        }
    }

    fn push(self, ordinal: usize, outcome: Scripted) -> Self {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(ordinal)
            .or_default()
            .push_back(outcome);
        self
    }

    fn next_scripted(&self, ordinal: usize) -> Option<Scripted> {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&ordinal)
            .and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<BatchResult, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.calls_by_ordinal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(request.ordinal)
            .or_default()
            .push(request.document_type);

        if let Some(delay) = self.delays.get(&request.ordinal).copied().or(self.delay) {
            tokio::time::sleep(delay).await;
        }

        if let Some(e) = self.permanent.get(&request.ordinal) {
            return Err(e.clone());
        }

        match self.next_scripted(request.ordinal) {
            Some(Scripted::Succeed(mut result)) => {
                result.batch_id = request.batch_id.clone();
                result.ordinal = request.ordinal;
                Ok(result)
            }
            Some(Scripted::Fail(e)) => Err(e),
            None => match &self.fallback_error {
                Some(e) => Err(e.clone()),
                None => Ok(Self::sample_result(request)),
            },
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
