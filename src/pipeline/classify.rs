//! Document type classification.
//!
//! Decides once per document whether the text already contains assessment
//! items (question papers, worksheets) or is expository prose, which in turn
//! tells the generator to *extract* or *synthesize* questions. Classifying
//! per document rather than per batch keeps routing consistent: a question
//! paper whose last batch happens to be an answer key must not flip into
//! synthesis mode halfway through.
//!
//! The classifier is a line-based regex heuristic. It never fails; when the
//! signals are weak it answers [`DocumentType::ExpositoryNotes`], because
//! synthesizing from a question paper is recoverable while treating notes as
//! a question paper silently drops their content.

use crate::model::{DocumentType, Source};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static RE_QUESTION_STEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:q(?:uestion)?\s*\.?\s*)?\d{1,3}\s*[.):]\s+\S").unwrap()
});

static RE_OPTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:\([A-Ea-e]\)|[A-Ea-e][.)])\s+\S").unwrap());

static RE_ANSWER_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:ans(?:wer)?|correct\s+answer|key|solution|explanation)\s*[:.\-]").unwrap()
});

/// Lines with at least this many words count as prose.
const PROSE_MIN_WORDS: usize = 12;
/// Share of non-blank lines that must look like assessment items.
const ASSESSMENT_RATIO: f64 = 0.30;
/// Share of non-blank lines that must be prose for it to matter.
const PROSE_RATIO: f64 = 0.25;
const PROSE_MIN_LINES: usize = 5;

/// Line counts the decision is made from.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Signals {
    non_blank: usize,
    stems: usize,
    options: usize,
    keys: usize,
    prose: usize,
}

impl Signals {
    fn of(sample: &str) -> Self {
        let mut s = Signals::default();
        for line in sample.lines().map(str::trim).filter(|l| !l.is_empty()) {
            s.non_blank += 1;
            if RE_OPTION.is_match(line) {
                s.options += 1;
            } else if RE_ANSWER_KEY.is_match(line) {
                s.keys += 1;
            } else if RE_QUESTION_STEM.is_match(line) || line.ends_with('?') {
                s.stems += 1;
            } else if line.split_whitespace().count() >= PROSE_MIN_WORDS {
                s.prose += 1;
            }
        }
        s
    }

    /// At least two option-bearing questions, or options with an answer key.
    fn has_items(&self) -> bool {
        (self.stems >= 2 && self.options >= 4) || (self.options >= 2 && self.keys >= 1)
    }

    fn ratio(&self, n: usize) -> f64 {
        if self.non_blank == 0 {
            0.0
        } else {
            n as f64 / self.non_blank as f64
        }
    }
}

/// Classify a text sample.
pub fn classify(sample: &str) -> DocumentType {
    let s = Signals::of(sample);
    let items = s.has_items();
    let assessment_strong = items && s.ratio(s.stems + s.options + s.keys) >= ASSESSMENT_RATIO;
    let prose_strong = s.prose >= PROSE_MIN_LINES && s.ratio(s.prose) >= PROSE_RATIO;

    let doc_type = match (items, assessment_strong, prose_strong) {
        (_, true, true) | (true, false, true) => DocumentType::Mixed,
        (_, true, false) => DocumentType::ContainsAssessmentItems,
        _ => DocumentType::ExpositoryNotes,
    };
    debug!("Classified sample as {} ({:?})", doc_type, s);
    doc_type
}

/// Representative sample: the first `max_chars` characters of the document
/// in page order. Topics are their own sample.
pub fn sample(source: &Source, max_chars: usize) -> String {
    match source {
        Source::Topic { topic } => topic.clone(),
        Source::File { pages, .. } => {
            let mut out = String::new();
            let mut remaining = max_chars;
            for page in pages {
                if remaining == 0 {
                    break;
                }
                let taken: String = page.chars().take(remaining).collect();
                remaining -= taken.chars().count();
                out.push_str(&taken);
                out.push('\n');
            }
            out
        }
    }
}

/// Classify a whole source from its representative sample.
pub fn classify_source(source: &Source, max_chars: usize) -> DocumentType {
    classify(&sample(source, max_chars))
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUESTION_PAPER: &str = "\
1. Which valve separates the left atrium and left ventricle?
A) Tricuspid
B) Mitral
C) Pulmonary
D) Aortic
Answer: B
2. The normal PR interval is:
(a) 0.06-0.10 s
(b) 0.12-0.20 s
(c) 0.22-0.30 s
(d) 0.32-0.40 s
Answer: b
";

    const NOTES: &str = "\
The cardiac cycle consists of systole and diastole, during which the chambers contract and relax in sequence.
During ventricular systole, pressure rises until it exceeds aortic pressure and the aortic valve opens for ejection.
Diastole allows the ventricles to fill passively, with the atrial kick contributing the final portion of filling.
Cardiac output equals stroke volume multiplied by heart rate and is regulated by preload, afterload and contractility.
The Frank-Starling mechanism describes how increased end-diastolic volume leads to a stronger subsequent contraction.
Sympathetic stimulation increases both heart rate and contractility through beta-one adrenergic receptors in the heart.
";

    #[test]
    fn question_paper_is_assessment() {
        assert_eq!(classify(QUESTION_PAPER), DocumentType::ContainsAssessmentItems);
    }

    #[test]
    fn prose_is_expository() {
        assert_eq!(classify(NOTES), DocumentType::ExpositoryNotes);
    }

    #[test]
    fn notes_with_practice_questions_are_mixed() {
        let text = format!("{NOTES}\n{QUESTION_PAPER}");
        assert_eq!(classify(&text), DocumentType::Mixed);
    }

    #[test]
    fn ambiguous_input_defaults_to_expository() {
        assert_eq!(classify(""), DocumentType::ExpositoryNotes);
        assert_eq!(classify("Chapter 3\nHeart\nA) see figure"), DocumentType::ExpositoryNotes);
        assert_eq!(classify("What is the heart?"), DocumentType::ExpositoryNotes);
    }

    #[test]
    fn sample_respects_char_budget_and_page_order() {
        let source = Source::file(vec!["ééééé".into(), "second".into(), "third".into()]);
        let s = sample(&source, 8);
        assert_eq!(s, "ééééé\nsec\n");
    }

    #[test]
    fn classify_source_uses_sample() {
        let source = Source::file(vec![QUESTION_PAPER.into(), NOTES.into()]);
        // Budget only covers the question paper.
        assert_eq!(
            classify_source(&source, QUESTION_PAPER.len()),
            DocumentType::ContainsAssessmentItems
        );
        assert_eq!(
            classify_source(&Source::topic("Cardiology"), 100),
            DocumentType::ExpositoryNotes
        );
    }
}
