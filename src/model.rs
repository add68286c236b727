//! Core input and intermediate types shared by every pipeline stage.
//!
//! Everything here is plain data: sources are immutable once built, batches
//! are produced once by the planner, and a [`BatchResult`] is never mutated
//! after the generator returns it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one study session. Opaque to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// What the pipeline turns into study material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    /// Extracted document text, one entry per page, in page order.
    File {
        pages: Vec<String>,
        title: Option<String>,
    },
    /// A bare topic typed by the user.
    Topic { topic: String },
}

impl Source {
    pub fn file(pages: Vec<String>) -> Self {
        Source::File { pages, title: None }
    }

    pub fn file_with_title(pages: Vec<String>, title: impl Into<String>) -> Self {
        Source::File {
            pages,
            title: Some(title.into()),
        }
    }

    pub fn topic(topic: impl Into<String>) -> Self {
        Source::Topic {
            topic: topic.into(),
        }
    }

    /// True when there is nothing to generate from.
    pub fn is_empty(&self) -> bool {
        match self {
            Source::File { pages, .. } => pages.iter().all(|p| p.trim().is_empty()),
            Source::Topic { topic } => topic.trim().is_empty(),
        }
    }

    pub fn page_count(&self) -> usize {
        match self {
            Source::File { pages, .. } => pages.len(),
            Source::Topic { .. } => 0,
        }
    }

    /// Human-readable name used for derived artifacts.
    pub fn display_name(&self) -> Option<&str> {
        match self {
            Source::File { title, .. } => title.as_deref().filter(|t| !t.trim().is_empty()),
            Source::Topic { topic } => Some(topic.trim()).filter(|t| !t.is_empty()),
        }
    }
}

/// Which part of the source a batch covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchScope {
    /// 1-indexed, inclusive page range.
    Pages { start: usize, end: usize },
    Topic,
}

impl BatchScope {
    pub fn page_count(&self) -> usize {
        match self {
            BatchScope::Pages { start, end } => end + 1 - start,
            BatchScope::Topic => 0,
        }
    }
}

impl fmt::Display for BatchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchScope::Pages { start, end } if start == end => write!(f, "page {start}"),
            BatchScope::Pages { start, end } => write!(f, "pages {start}-{end}"),
            BatchScope::Topic => f.write_str("topic"),
        }
    }
}

/// A contiguous chunk of source text sized for one generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: String,
    pub ordinal: usize,
    pub scope: BatchScope,
    pub text: String,
}

impl Batch {
    pub fn batch_id(ordinal: usize) -> String {
        format!("batch-{ordinal:03}")
    }
}

/// Whether the source already contains assessment items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DocumentType {
    /// Question papers, worksheets: items are extracted verbatim.
    ContainsAssessmentItems,
    /// Prose notes / textbook content: items are synthesized.
    #[default]
    ExpositoryNotes,
    /// Both: existing items are extracted and more are synthesized.
    Mixed,
}

impl DocumentType {
    /// True when the generator should invent new questions.
    pub fn synthesizes_questions(&self) -> bool {
        !matches!(self, DocumentType::ContainsAssessmentItems)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentType::ContainsAssessmentItems => "contains assessment items",
            DocumentType::ExpositoryNotes => "expository notes",
            DocumentType::Mixed => "mixed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Lenient parse: anything unrecognised is `Medium`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "easy" | "simple" | "basic" | "low" => Difficulty::Easy,
            "hard" | "difficult" | "advanced" | "high" => Difficulty::Hard,
            _ => Difficulty::Medium,
        }
    }

    pub fn weight(&self) -> u32 {
        match self {
            Difficulty::Easy => 1,
            Difficulty::Medium => 2,
            Difficulty::Hard => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDraft {
    pub text: String,
    pub is_correct: bool,
}

impl OptionDraft {
    pub fn new(text: impl Into<String>, is_correct: bool) -> Self {
        Self {
            text: text.into(),
            is_correct,
        }
    }
}

/// One multiple-choice question as returned by the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub text: String,
    pub options: Vec<OptionDraft>,
    pub explanation: String,
    pub difficulty: Difficulty,
    pub subject: String,
}

impl QuestionDraft {
    /// Exactly one correct option, at least two options, non-blank stem.
    pub fn is_valid(&self) -> bool {
        !self.text.trim().is_empty()
            && self.options.len() >= 2
            && self.options.iter().all(|o| !o.text.trim().is_empty())
            && self.options.iter().filter(|o| o.is_correct).count() == 1
    }

    pub fn correct_option(&self) -> Option<&OptionDraft> {
        self.options.iter().find(|o| o.is_correct)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MnemonicDraft {
    /// What the mnemonic helps remember.
    pub topic: String,
    /// The memory device itself (acronym, rhyme, ...).
    pub device: String,
    pub explanation: String,
}

/// Structured output of one generation call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchResult {
    pub batch_id: String,
    pub ordinal: usize,
    pub questions: Vec<QuestionDraft>,
    pub mnemonics: Vec<MnemonicDraft>,
    pub cheat_points: Vec<String>,
    pub key_concepts: Vec<String>,
}

/// The mandatory collections of a [`BatchResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultField {
    Questions,
    Mnemonics,
    CheatPoints,
}

impl fmt::Display for ResultField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResultField::Questions => "questions",
            ResultField::Mnemonics => "mnemonics",
            ResultField::CheatPoints => "cheat_points",
        })
    }
}

impl BatchResult {
    pub fn empty(batch_id: impl Into<String>, ordinal: usize) -> Self {
        Self {
            batch_id: batch_id.into(),
            ordinal,
            ..Default::default()
        }
    }

    /// Mandatory fields that came back empty. Non-empty means partial success.
    pub fn missing_fields(&self) -> Vec<ResultField> {
        let mut missing = Vec::new();
        if self.questions.is_empty() {
            missing.push(ResultField::Questions);
        }
        if self.mnemonics.is_empty() {
            missing.push(ResultField::Mnemonics);
        }
        if self.cheat_points.is_empty() {
            missing.push(ResultField::CheatPoints);
        }
        missing
    }

    /// True when the result carries nothing at all.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
            && self.mnemonics.is_empty()
            && self.cheat_points.is_empty()
            && self.key_concepts.is_empty()
    }
}

/// Metadata the derived artifacts are named from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub session_id: SessionId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl SessionMeta {
    pub fn new(session_id: SessionId, name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            session_id,
            name: name.into(),
            created_at,
        }
    }

    /// Name from the source, falling back to the session id.
    pub fn for_source(session_id: &SessionId, source: &Source, created_at: DateTime<Utc>) -> Self {
        let name = source
            .display_name()
            .map(str::to_string)
            .unwrap_or_else(|| session_id.to_string());
        Self::new(session_id.clone(), name, created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(correct: &[bool]) -> QuestionDraft {
        QuestionDraft {
            text: "Which chamber pumps blood to the aorta?".into(),
            options: correct
                .iter()
                .enumerate()
                .map(|(i, c)| OptionDraft::new(format!("option {i}"), *c))
                .collect(),
            explanation: String::new(),
            difficulty: Difficulty::Medium,
            subject: "Cardiology".into(),
        }
    }

    #[test]
    fn question_validity_requires_exactly_one_correct() {
        assert!(question(&[true, false, false]).is_valid());
        assert!(!question(&[true, true, false]).is_valid());
        assert!(!question(&[false, false]).is_valid());
        assert!(!question(&[true]).is_valid());
    }

    #[test]
    fn difficulty_parse_is_lenient() {
        assert_eq!(Difficulty::parse_lenient("HARD"), Difficulty::Hard);
        assert_eq!(Difficulty::parse_lenient(" easy "), Difficulty::Easy);
        assert_eq!(Difficulty::parse_lenient("moderate"), Difficulty::Medium);
        assert_eq!(Difficulty::parse_lenient(""), Difficulty::Medium);
    }

    #[test]
    fn empty_sources() {
        assert!(Source::file(vec![]).is_empty());
        assert!(Source::file(vec!["  ".into(), "\n".into()]).is_empty());
        assert!(Source::topic("   ").is_empty());
        assert!(!Source::topic("Cardiology").is_empty());
    }

    #[test]
    fn missing_fields_reports_partial_results() {
        let mut r = BatchResult::empty("batch-000", 0);
        r.cheat_points.push("ECG leads".into());
        assert_eq!(
            r.missing_fields(),
            vec![ResultField::Questions, ResultField::Mnemonics]
        );
    }

    #[test]
    fn scope_display() {
        assert_eq!(BatchScope::Pages { start: 4, end: 6 }.to_string(), "pages 4-6");
        assert_eq!(BatchScope::Pages { start: 7, end: 7 }.to_string(), "page 7");
        assert_eq!(BatchScope::Topic.to_string(), "topic");
    }

    #[test]
    fn session_meta_prefers_source_name() {
        let id = SessionId::new("s-1");
        let now = Utc::now();
        assert_eq!(
            SessionMeta::for_source(&id, &Source::topic("Cardiology"), now).name,
            "Cardiology"
        );
        assert_eq!(
            SessionMeta::for_source(&id, &Source::file(vec!["x".into()]), now).name,
            "s-1"
        );
    }
}
