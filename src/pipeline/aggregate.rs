//! Merge per-batch results into one session-level view.
//!
//! Results arrive in completion order, which under `buffer_unordered` is
//! arbitrary. The [`Aggregator`] keys them by ordinal in a `BTreeMap`, so
//! the merged output is always in document order no matter how batches
//! finished, and a retried batch simply overwrites its slot.
//!
//! Merging applies the question invariants: drafts without exactly one
//! correct option (or with a blank stem / fewer than two options) are
//! dropped, and duplicates are removed by normalized text with the lowest
//! ordinal winning. Ids (`q-0001`, `m-0001`) are assigned after filtering so
//! they are dense and follow final order.

use crate::artifacts::{CheatSheet, Mnemonic, MnemonicSet, Question, QuestionBank};
use crate::model::{BatchResult, ResultField};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, warn};

/// Everything derived from the batch results of one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedSession {
    pub questions: QuestionBank,
    pub mnemonics: MnemonicSet,
    pub cheat_sheet: CheatSheet,
    pub key_concepts: Vec<String>,
    /// Ordinals with no result (failed or abandoned), ascending.
    pub missing_ordinals: Vec<usize>,
    /// Ordinals whose result lacked some sections.
    pub partial_batches: BTreeMap<usize, Vec<ResultField>>,
    pub dropped_invalid_questions: usize,
    pub dropped_duplicate_questions: usize,
}

impl AggregatedSession {
    /// No question, mnemonic or cheat-sheet point survived.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty() && self.mnemonics.is_empty() && self.cheat_sheet.is_empty()
    }

    /// Distinct question subjects in first-seen order.
    pub fn subjects(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.questions
            .questions
            .iter()
            .filter(|q| seen.insert(normalize(&q.subject)))
            .map(|q| q.subject.clone())
            .collect()
    }
}

/// Incremental, completion-order-independent collector.
#[derive(Debug, Default)]
pub struct Aggregator {
    results: BTreeMap<usize, BatchResult>,
    missing: BTreeSet<usize>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a batch result, replacing any earlier result for its ordinal.
    pub fn insert(&mut self, result: BatchResult) {
        let ordinal = result.ordinal;
        self.missing.remove(&ordinal);
        if self.results.insert(ordinal, result).is_some() {
            debug!("Batch {}: result replaced", ordinal);
        }
    }

    /// Record that `ordinal` produced nothing.
    pub fn mark_missing(&mut self, ordinal: usize) {
        self.results.remove(&ordinal);
        self.missing.insert(ordinal);
    }

    pub fn received(&self) -> usize {
        self.results.len()
    }

    pub fn missing(&self) -> usize {
        self.missing.len()
    }

    pub fn finish(self) -> AggregatedSession {
        merge(self.results, self.missing)
    }
}

/// Aggregate a complete set of results in one call.
pub fn aggregate(
    results: impl IntoIterator<Item = BatchResult>,
    missing: impl IntoIterator<Item = usize>,
) -> AggregatedSession {
    let mut agg = Aggregator::new();
    for ordinal in missing {
        agg.mark_missing(ordinal);
    }
    for result in results {
        agg.insert(result);
    }
    agg.finish()
}

fn merge(results: BTreeMap<usize, BatchResult>, missing: BTreeSet<usize>) -> AggregatedSession {
    let mut session = AggregatedSession {
        missing_ordinals: missing.into_iter().collect(),
        ..Default::default()
    };

    let mut seen_questions = HashSet::new();
    let mut seen_mnemonics = HashSet::new();
    let mut seen_points = HashSet::new();
    let mut seen_concepts = HashSet::new();

    for (ordinal, result) in results {
        let missing_fields = result.missing_fields();
        if !missing_fields.is_empty() {
            warn!(
                "Batch {}: partial result, missing {}",
                ordinal,
                missing_fields
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            session.partial_batches.insert(ordinal, missing_fields);
        }

        for draft in result.questions {
            if !draft.is_valid() {
                session.dropped_invalid_questions += 1;
                continue;
            }
            if !seen_questions.insert(normalize(&draft.text)) {
                session.dropped_duplicate_questions += 1;
                continue;
            }
            let id = format!("q-{:04}", session.questions.questions.len() + 1);
            session.questions.questions.push(Question {
                id,
                text: draft.text,
                options: draft.options,
                explanation: draft.explanation,
                difficulty: draft.difficulty,
                subject: draft.subject,
                source_ordinal: ordinal,
            });
        }

        for draft in result.mnemonics {
            if draft.device.trim().is_empty() || !seen_mnemonics.insert(normalize(&draft.device)) {
                continue;
            }
            let id = format!("m-{:04}", session.mnemonics.mnemonics.len() + 1);
            session.mnemonics.mnemonics.push(Mnemonic {
                id,
                topic: draft.topic,
                device: draft.device,
                explanation: draft.explanation,
                source_ordinal: ordinal,
            });
        }

        session.cheat_sheet.points.extend(
            result
                .cheat_points
                .into_iter()
                .filter(|p| !p.trim().is_empty() && seen_points.insert(normalize(p))),
        );
        session.key_concepts.extend(
            result
                .key_concepts
                .into_iter()
                .filter(|c| !c.trim().is_empty() && seen_concepts.insert(normalize(c))),
        );
    }

    debug!(
        "Aggregated {} question(s), {} mnemonic(s), {} cheat point(s); dropped {} invalid, {} duplicate",
        session.questions.len(),
        session.mnemonics.len(),
        session.cheat_sheet.len(),
        session.dropped_invalid_questions,
        session.dropped_duplicate_questions
    );
    session
}

/// Case-folded, whitespace-collapsed, trailing punctuation trimmed.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['.', '?', '!', ':', ';', ','])
        .trim_end()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, MnemonicDraft, OptionDraft, QuestionDraft};

    fn question(text: &str) -> QuestionDraft {
        QuestionDraft {
            text: text.into(),
            options: vec![OptionDraft::new("yes", true), OptionDraft::new("no", false)],
            explanation: String::new(),
            difficulty: Difficulty::Medium,
            subject: "General".into(),
        }
    }

    fn result(ordinal: usize, questions: &[&str]) -> BatchResult {
        BatchResult {
            batch_id: format!("batch-{ordinal:03}"),
            ordinal,
            questions: questions.iter().map(|q| question(q)).collect(),
            mnemonics: vec![MnemonicDraft {
                topic: "t".into(),
                device: format!("DEV{ordinal}"),
                explanation: String::new(),
            }],
            cheat_points: vec![format!("point {ordinal}")],
            key_concepts: vec!["Shared concept".into()],
        }
    }

    fn texts(s: &AggregatedSession) -> Vec<&str> {
        s.questions.questions.iter().map(|q| q.text.as_str()).collect()
    }

    #[test]
    fn order_is_by_ordinal_not_arrival() {
        let mut agg = Aggregator::new();
        agg.insert(result(2, &["c"]));
        agg.insert(result(0, &["a"]));
        agg.insert(result(1, &["b"]));
        let s = agg.finish();
        assert_eq!(texts(&s), vec!["a", "b", "c"]);
        assert_eq!(s.questions.ids(), vec!["q-0001", "q-0002", "q-0003"]);
        assert_eq!(s.mnemonics.mnemonics[2].device, "DEV2");
        assert_eq!(s.cheat_sheet.points, vec!["point 0", "point 1", "point 2"]);
    }

    #[test]
    fn duplicates_keep_lowest_ordinal() {
        let s = aggregate(
            vec![result(1, &["What is  the HEART?"]), result(0, &["what is the heart"])],
            [],
        );
        assert_eq!(texts(&s), vec!["what is the heart"]);
        assert_eq!(s.questions.questions[0].source_ordinal, 0);
        assert_eq!(s.dropped_duplicate_questions, 1);
        assert_eq!(s.key_concepts, vec!["Shared concept"]);
    }

    #[test]
    fn invalid_questions_are_dropped_and_counted() {
        let mut r = result(0, &["good"]);
        let mut two_correct = question("two correct");
        two_correct.options[1].is_correct = true;
        let mut none_correct = question("none correct");
        none_correct.options[0].is_correct = false;
        let mut one_option = question("one option");
        one_option.options.pop();
        r.questions.extend([two_correct, none_correct, one_option, question("  ")]);

        let s = aggregate(vec![r], []);
        assert_eq!(texts(&s), vec!["good"]);
        assert_eq!(s.dropped_invalid_questions, 4);
    }

    #[test]
    fn bank_size_equals_filtered_sum() {
        let results: Vec<_> = (0..5)
            .map(|i| result(i, &[&format!("q{i}a"), &format!("q{i}b"), "common"]))
            .collect();
        let s = aggregate(results, []);
        // 5 × 2 unique + 1 shared
        assert_eq!(s.questions.len(), 11);
        assert_eq!(s.dropped_duplicate_questions, 4);
    }

    #[test]
    fn retry_replaces_instead_of_appending() {
        let mut agg = Aggregator::new();
        agg.insert(result(0, &["first try"]));
        agg.insert(result(0, &["second try"]));
        let s = agg.finish();
        assert_eq!(texts(&s), vec!["second try"]);
    }

    #[test]
    fn missing_and_partial_batches_are_recorded() {
        let mut partial = result(1, &[]);
        partial.mnemonics.clear();
        let s = aggregate(vec![result(0, &["a"]), partial], [3, 2]);
        assert_eq!(s.missing_ordinals, vec![2, 3]);
        assert_eq!(
            s.partial_batches.get(&1),
            Some(&vec![ResultField::Questions, ResultField::Mnemonics])
        );
        assert!(!s.is_empty());
    }

    #[test]
    fn late_result_clears_missing_mark() {
        let mut agg = Aggregator::new();
        agg.mark_missing(0);
        agg.insert(result(0, &["late"]));
        assert_eq!(agg.missing(), 0);
        assert_eq!(agg.received(), 1);
        assert!(agg.finish().missing_ordinals.is_empty());
    }

    #[test]
    fn empty_session() {
        let s = aggregate(Vec::new(), [0, 1]);
        assert!(s.is_empty());
        assert_eq!(s.missing_ordinals, vec![0, 1]);
    }

    #[test]
    fn normalize_folds_case_space_and_punctuation() {
        assert_eq!(normalize("  What IS\tthe heart?! "), "what is the heart");
        assert_eq!(normalize("a . "), "a");
    }
}
