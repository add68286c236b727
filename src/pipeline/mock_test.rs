//! Mock test assembly.
//!
//! A mock test is a timed selection over the session's question bank. It is
//! built purely from aggregated state: no generator call, no I/O, and the
//! same bank and metadata always give the same test.

use crate::artifacts::{MockTest, QuestionBank};
use crate::model::SessionMeta;
use thiserror::Error;

/// Minutes allowed per question.
pub const MINUTES_PER_QUESTION: f64 = 1.5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MockTestError {
    /// There is nothing to put in the test.
    #[error("Question bank is empty")]
    NoQuestions,
}

/// Build a mock test over every question in `bank`.
pub fn build(bank: &QuestionBank, meta: &SessionMeta) -> Result<MockTest, MockTestError> {
    if bank.is_empty() {
        return Err(MockTestError::NoQuestions);
    }
    Ok(MockTest {
        name: format!(
            "{} Mock Test ({})",
            meta.name,
            meta.created_at.format("%Y-%m-%d %H:%M")
        ),
        question_ids: bank.ids(),
        duration_minutes: duration_minutes(bank.len()),
        created_at: meta.created_at,
    })
}

/// `round(n × 1.5)` minutes, never less than one.
pub fn duration_minutes(question_count: usize) -> u32 {
    let minutes = (question_count as f64 * MINUTES_PER_QUESTION).round();
    (minutes as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::Question;
    use crate::model::{Difficulty, OptionDraft, SessionId};
    use chrono::{TimeZone, Utc};

    fn bank(n: usize) -> QuestionBank {
        QuestionBank {
            questions: (1..=n)
                .map(|i| Question {
                    id: format!("q-{i:04}"),
                    text: format!("Question {i}"),
                    options: vec![OptionDraft::new("a", true), OptionDraft::new("b", false)],
                    explanation: String::new(),
                    difficulty: Difficulty::Medium,
                    subject: "General".into(),
                    source_ordinal: 0,
                })
                .collect(),
        }
    }

    fn meta() -> SessionMeta {
        SessionMeta::new(
            SessionId::new("s-1"),
            "Cardiology",
            Utc.with_ymd_and_hms(2026, 3, 14, 9, 5, 0).unwrap(),
        )
    }

    #[test]
    fn duration_formula() {
        assert_eq!(duration_minutes(0), 1);
        assert_eq!(duration_minutes(1), 2); // 1.5 rounds half away from zero
        assert_eq!(duration_minutes(2), 3);
        assert_eq!(duration_minutes(3), 5); // 4.5
        assert_eq!(duration_minutes(10), 15);
        assert_eq!(duration_minutes(25), 38); // 37.5
    }

    #[test]
    fn builds_over_whole_bank() {
        let t = build(&bank(3), &meta()).unwrap();
        assert_eq!(t.question_ids, vec!["q-0001", "q-0002", "q-0003"]);
        assert_eq!(t.duration_minutes, 5);
        assert_eq!(t.name, "Cardiology Mock Test (2026-03-14 09:05)");
        assert_eq!(t.created_at, meta().created_at);
    }

    #[test]
    fn deterministic() {
        assert_eq!(build(&bank(7), &meta()), build(&bank(7), &meta()));
    }

    #[test]
    fn empty_bank_is_an_error() {
        assert_eq!(build(&bank(0), &meta()), Err(MockTestError::NoQuestions));
    }
}
