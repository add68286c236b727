//! Notes compilation.
//!
//! Notes are a read-only digest of the aggregated session: a one-paragraph
//! summary, the most important questions, every cheat-sheet point and
//! mnemonic, key concepts and the subject list. They are always recomputed
//! from the aggregated state and never fail.
//!
//! ## Importance score
//!
//! | Signal | Points |
//! |---|---|
//! | difficulty (easy / medium / hard) | 1 / 2 / 3 |
//! | explanation of at least 80 characters | +1 |
//! | first question of its subject | +2 |
//!
//! The top `important_question_cap` by score are selected, ties broken by
//! bank order, and emitted in bank order.

use super::aggregate::AggregatedSession;
use crate::artifacts::{Notes, Question};
use crate::config::PipelineConfig;
use std::collections::HashSet;

const DETAILED_EXPLANATION_CHARS: usize = 80;
const SUMMARY_LIST_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotesConfig {
    /// Upper bound on questions flagged important. Default: 10.
    pub important_question_cap: usize,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            important_question_cap: 10,
        }
    }
}

impl From<&PipelineConfig> for NotesConfig {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            important_question_cap: config.important_question_cap,
        }
    }
}

/// Compile notes from the aggregated session.
pub fn compile(session: &AggregatedSession, config: &NotesConfig) -> Notes {
    if session.is_empty() {
        return Notes::empty();
    }

    let subjects = session.subjects();
    Notes {
        summary: summary(session, &subjects),
        important_question_ids: important_questions(
            &session.questions.questions,
            config.important_question_cap,
        ),
        cheat_sheet_excerpt: session.cheat_sheet.points.clone(),
        mnemonic_ids: session
            .mnemonics
            .mnemonics
            .iter()
            .map(|m| m.id.clone())
            .collect(),
        key_concepts: session.key_concepts.clone(),
        subjects,
        is_empty: false,
    }
}

fn score(question: &Question, first_of_subject: bool) -> u32 {
    question.difficulty.weight()
        + u32::from(question.explanation.chars().count() >= DETAILED_EXPLANATION_CHARS)
        + if first_of_subject { 2 } else { 0 }
}

fn important_questions(questions: &[Question], cap: usize) -> Vec<String> {
    let mut seen_subjects = HashSet::new();
    let mut scored: Vec<(usize, u32)> = questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let first = seen_subjects.insert(q.subject.to_lowercase());
            (i, score(q, first))
        })
        .collect();

    // Stable sort: equal scores keep bank order.
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    let mut picked: Vec<usize> = scored.into_iter().take(cap).map(|(i, _)| i).collect();
    picked.sort_unstable();
    picked.into_iter().map(|i| questions[i].id.clone()).collect()
}

fn summary(session: &AggregatedSession, subjects: &[String]) -> String {
    let mut parts = Vec::new();

    let q = session.questions.len();
    if q > 0 {
        parts.push(format!(
            "These notes cover {} question{} across {}.",
            q,
            plural(q),
            list_phrase(subjects, "subject")
        ));
    }
    if !session.key_concepts.is_empty() {
        parts.push(format!(
            "Key concepts include {}.",
            join_limited(&session.key_concepts)
        ));
    }

    let m = session.mnemonics.len();
    let c = session.cheat_sheet.len();
    parts.push(format!(
        "{} mnemonic{} and {} cheat-sheet point{} are included for revision.",
        m,
        plural(m),
        c,
        plural(c)
    ));

    if !session.missing_ordinals.is_empty() {
        let n = session.missing_ordinals.len();
        parts.push(format!(
            "{} part{} of the source could not be processed and {} not covered.",
            n,
            plural(n),
            if n == 1 { "is" } else { "are" }
        ));
    }
    parts.join(" ")
}

fn list_phrase(items: &[String], noun: &str) -> String {
    match items.len() {
        0 => format!("no named {noun}"),
        1 => format!("one {noun} ({})", items[0]),
        n => format!("{n} {noun}s ({})", join_limited(items)),
    }
}

fn join_limited(items: &[String]) -> String {
    let shown = items
        .iter()
        .take(SUMMARY_LIST_LIMIT)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if items.len() > SUMMARY_LIST_LIMIT {
        format!("{shown} and {} more", items.len() - SUMMARY_LIST_LIMIT)
    } else {
        shown
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
