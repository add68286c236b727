//! Output artifacts of a study session.
//!
//! Every type here is `Serialize + Deserialize` so a [`crate::store::SessionStore`]
//! can persist it and hand back a structurally identical value.

use crate::error::BatchError;
use crate::model::{BatchScope, Difficulty, OptionDraft, ResultField};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated, de-duplicated question with a stable id (`q-0001`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub options: Vec<OptionDraft>,
    pub explanation: String,
    pub difficulty: Difficulty,
    pub subject: String,
    /// Ordinal of the batch the question came from.
    pub source_ordinal: usize,
}

impl Question {
    pub fn correct_option(&self) -> Option<&OptionDraft> {
        self.options.iter().find(|o| o.is_correct)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionBank {
    pub questions: Vec<Question>,
}

impl QuestionBank {
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.questions.iter().map(|q| q.id.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }
}

/// A memory device with a stable id (`m-0001`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mnemonic {
    pub id: String,
    pub topic: String,
    pub device: String,
    pub explanation: String,
    pub source_ordinal: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MnemonicSet {
    pub mnemonics: Vec<Mnemonic>,
}

impl MnemonicSet {
    pub fn len(&self) -> usize {
        self.mnemonics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mnemonics.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheatSheet {
    pub points: Vec<String>,
}

impl CheatSheet {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A timed test over questions already in the bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockTest {
    pub name: String,
    pub question_ids: Vec<String>,
    pub duration_minutes: u32,
    pub created_at: DateTime<Utc>,
}

/// Composite study notes derived from the aggregated session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notes {
    pub summary: String,
    pub important_question_ids: Vec<String>,
    pub cheat_sheet_excerpt: Vec<String>,
    pub mnemonic_ids: Vec<String>,
    pub key_concepts: Vec<String>,
    pub subjects: Vec<String>,
    pub is_empty: bool,
}

impl Notes {
    /// Notes for a session with no content.
    pub fn empty() -> Self {
        Self {
            summary: "No study content was generated for this session.".to_string(),
            is_empty: true,
            ..Default::default()
        }
    }
}

/// Where a flashcard was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum FlashcardSource {
    Question(String),
    Mnemonic(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: String,
    pub front: String,
    pub back: String,
    pub source: FlashcardSource,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardDeck {
    pub cards: Vec<Flashcard>,
}

impl FlashcardDeck {
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// How one batch resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    Complete,
    Partial,
    Missing,
}

/// Per-batch record kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub ordinal: usize,
    pub batch_id: String,
    pub scope: BatchScope,
    pub attempts: u32,
    pub duration_ms: u64,
    pub outcome: BatchOutcome,
    pub missing_fields: Vec<ResultField>,
    pub error: Option<BatchError>,
}

/// What went wrong (or didn't) while generating a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub batches: Vec<BatchReport>,
    pub missing_ordinals: Vec<usize>,
    pub dropped_invalid_questions: usize,
    pub dropped_duplicate_questions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    QuestionBank,
    MnemonicSet,
    CheatSheet,
    MockTest,
    Notes,
    Flashcards,
    Diagnostics,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 7] = [
        ArtifactKind::QuestionBank,
        ArtifactKind::MnemonicSet,
        ArtifactKind::CheatSheet,
        ArtifactKind::MockTest,
        ArtifactKind::Notes,
        ArtifactKind::Flashcards,
        ArtifactKind::Diagnostics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::QuestionBank => "question_bank",
            ArtifactKind::MnemonicSet => "mnemonic_set",
            ArtifactKind::CheatSheet => "cheat_sheet",
            ArtifactKind::MockTest => "mock_test",
            ArtifactKind::Notes => "notes",
            ArtifactKind::Flashcards => "flashcards",
            ArtifactKind::Diagnostics => "diagnostics",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any artifact a session produces, tagged with its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Artifact {
    QuestionBank(QuestionBank),
    MnemonicSet(MnemonicSet),
    CheatSheet(CheatSheet),
    MockTest(MockTest),
    Notes(Notes),
    Flashcards(FlashcardDeck),
    Diagnostics(Diagnostics),
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Artifact::QuestionBank(_) => ArtifactKind::QuestionBank,
            Artifact::MnemonicSet(_) => ArtifactKind::MnemonicSet,
            Artifact::CheatSheet(_) => ArtifactKind::CheatSheet,
            Artifact::MockTest(_) => ArtifactKind::MockTest,
            Artifact::Notes(_) => ArtifactKind::Notes,
            Artifact::Flashcards(_) => ArtifactKind::Flashcards,
            Artifact::Diagnostics(_) => ArtifactKind::Diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_kind_matches_variant() {
        let a = Artifact::CheatSheet(CheatSheet {
            points: vec!["QRS < 120 ms".into()],
        });
        assert_eq!(a.kind(), ArtifactKind::CheatSheet);
        assert_eq!(a.kind().to_string(), "cheat_sheet");
    }

    #[test]
    fn artifact_json_is_tagged() {
        let a = Artifact::MockTest(MockTest {
            name: "Cardiology Mock Test".into(),
            question_ids: vec!["q-0001".into()],
            duration_minutes: 2,
            created_at: DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        });
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["kind"], "mock_test");
        assert_eq!(json["data"]["duration_minutes"], 2);
        let back: Artifact = serde_json::from_value(json).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn empty_notes_are_flagged() {
        let n = Notes::empty();
        assert!(n.is_empty);
        assert!(!n.summary.is_empty());
        assert!(n.important_question_ids.is_empty());
    }
}
