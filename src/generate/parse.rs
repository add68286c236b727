//! Parsing and validation of model replies.
//!
//! Models are asked for a single JSON object but routinely wrap it in
//! ```` ```json ```` fences, prefix it with chatter, or return individual
//! items in slightly different shapes. This module turns whatever came back
//! into a typed [`BatchResult`]:
//!
//! 1. Strip outer code fences.
//! 2. Cut from the first `{` to the last `}`.
//! 3. Deserialize the envelope, then each item on its own, so one malformed
//!    question drops that question and not the whole batch.
//! 4. Normalise text (invisible Unicode, whitespace).
//!
//! An unparseable envelope is a [`GenerationError::Transient`]: asking again
//! usually yields valid JSON.

use super::GenerationRequest;
use crate::error::GenerationError;
use crate::model::{BatchResult, Difficulty, MnemonicDraft, OptionDraft, QuestionDraft};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?\s*\n(.*)\n```\s*$").unwrap());

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static RE_OPTION_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:\(?[A-Ha-h]\)|[A-Ha-h][.:])\s+").unwrap());

const INVISIBLE: [char; 6] = ['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}', '\u{00AD}'];

#[derive(Debug, Default, Deserialize)]
struct RawReply {
    #[serde(default)]
    questions: Vec<Value>,
    #[serde(default)]
    mnemonics: Vec<Value>,
    #[serde(default, alias = "cheat_points", alias = "cheatsheet")]
    cheat_sheet: Vec<Value>,
    #[serde(default, alias = "concepts")]
    key_concepts: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawOption {
    Text(String),
    Full {
        text: String,
        #[serde(default, alias = "correct")]
        is_correct: bool,
    },
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    #[serde(alias = "text", alias = "stem")]
    question: String,
    #[serde(default)]
    options: Vec<RawOption>,
    #[serde(default, alias = "answer_index")]
    correct_index: Option<usize>,
    /// Letter ("B") or the option text itself.
    #[serde(default, alias = "correct_answer")]
    answer: Option<String>,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default, alias = "topic")]
    subject: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMnemonic {
    #[serde(default, alias = "concept")]
    topic: String,
    #[serde(alias = "device", alias = "text")]
    mnemonic: String,
    #[serde(default)]
    explanation: String,
}

/// Parse a raw model reply into a [`BatchResult`] for `request`.
pub fn parse_reply(raw: &str, request: &GenerationRequest) -> Result<BatchResult, GenerationError> {
    let json = extract_json_object(raw).ok_or_else(|| {
        GenerationError::Transient("malformed reply: no JSON object found".to_string())
    })?;
    let reply: RawReply = serde_json::from_str(json)
        .map_err(|e| GenerationError::Transient(format!("malformed reply: {e}")))?;

    let total_questions = reply.questions.len();
    let questions: Vec<QuestionDraft> = reply
        .questions
        .into_iter()
        .filter_map(|v| serde_json::from_value::<RawQuestion>(v).ok())
        .filter_map(into_question)
        .collect();

    let mnemonics: Vec<MnemonicDraft> = reply
        .mnemonics
        .into_iter()
        .filter_map(|v| serde_json::from_value::<RawMnemonic>(v).ok())
        .filter_map(|m| {
            let device = clean_text(&m.mnemonic);
            (!device.is_empty()).then(|| MnemonicDraft {
                topic: clean_text(&m.topic),
                device,
                explanation: clean_text(&m.explanation),
            })
        })
        .collect();

    let result = BatchResult {
        batch_id: request.batch_id.clone(),
        ordinal: request.ordinal,
        questions,
        mnemonics,
        cheat_points: strings(reply.cheat_sheet),
        key_concepts: strings(reply.key_concepts),
    };

    if result.questions.len() < total_questions {
        debug!(
            "Batch {}: dropped {} malformed question(s) from reply",
            request.ordinal,
            total_questions - result.questions.len()
        );
    }
    Ok(result)
}

/// The outermost `{ ... }` of the reply, fences removed.
fn extract_json_object(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let inner = match RE_OUTER_FENCES.captures(trimmed) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(trimmed),
        None => trimmed,
    };
    let start = inner.find('{')?;
    let end = inner.rfind('}')?;
    (end > start).then(|| &inner[start..=end])
}

fn into_question(raw: RawQuestion) -> Option<QuestionDraft> {
    let text = clean_text(&raw.question);
    if text.is_empty() {
        return None;
    }

    let mut options: Vec<OptionDraft> = raw
        .options
        .into_iter()
        .map(|o| match o {
            RawOption::Text(t) => OptionDraft::new(strip_label(&t), false),
            RawOption::Full { text, is_correct } => OptionDraft::new(strip_label(&text), is_correct),
        })
        .collect();

    // An explicit index or answer overrides per-option flags.
    let marked = raw
        .correct_index
        .filter(|&i| i < options.len())
        .or_else(|| raw.answer.as_deref().and_then(|a| answer_index(a, &options)));
    if let Some(idx) = marked {
        for (i, o) in options.iter_mut().enumerate() {
            o.is_correct = i == idx;
        }
    }

    Some(QuestionDraft {
        text,
        options,
        explanation: clean_text(&raw.explanation),
        difficulty: raw
            .difficulty
            .as_deref()
            .map(Difficulty::parse_lenient)
            .unwrap_or_default(),
        subject: raw
            .subject
            .map(|s| clean_text(&s))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "General".to_string()),
    })
}

/// Resolve "B", "b)", or the option text to an index.
fn answer_index(answer: &str, options: &[OptionDraft]) -> Option<usize> {
    let a = answer.trim().trim_end_matches([')', '.', ':']).trim();
    if a.chars().count() == 1 {
        let c = a.chars().next()?.to_ascii_uppercase();
        if c.is_ascii_uppercase() {
            let idx = (c as u8 - b'A') as usize;
            return (idx < options.len()).then_some(idx);
        }
    }
    let wanted = clean_text(&strip_label(a)).to_lowercase();
    options
        .iter()
        .position(|o| o.text.to_lowercase() == wanted)
}

fn strip_label(s: &str) -> String {
    clean_text(&RE_OPTION_LABEL.replace(s, ""))
}

fn strings(values: Vec<Value>) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(clean_text(&s)),
            Value::Object(map) => map
                .get("text")
                .or_else(|| map.get("point"))
                .and_then(Value::as_str)
                .map(clean_text),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect()
}

/// Remove invisible Unicode and collapse whitespace runs.
pub fn clean_text(s: &str) -> String {
    let visible: String = s.chars().filter(|c| !INVISIBLE.contains(c)).collect();
    RE_WHITESPACE.replace_all(visible.trim(), " ").into_owned()
}
