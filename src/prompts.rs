//! System prompts for study-material generation.
//!
//! All prompt text lives here so it can be inspected in unit tests without a
//! live model. Callers can replace the system prompt through
//! [`crate::config::GeneratorConfig::system_prompt`]; the per-batch user
//! message is always built by [`user_message`].

use crate::model::DocumentType;

/// The JSON shape every reply must follow.
pub const REPLY_SCHEMA: &str = r#"{
  "questions": [
    {
      "question": "string",
      "options": ["string", "string", "string", "string"],
      "correct_index": 0,
      "explanation": "string",
      "difficulty": "easy | medium | hard",
      "subject": "string"
    }
  ],
  "mnemonics": [
    { "topic": "string", "mnemonic": "string", "explanation": "string" }
  ],
  "cheat_sheet": ["string"],
  "key_concepts": ["string"]
}"#;

/// Default system prompt. `{schema}` is replaced with [`REPLY_SCHEMA`].
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an experienced examiner and tutor. You turn study material into exam-ready content for students.

Follow these rules precisely:

1. QUESTIONS
   - Multiple choice only, with four options unless the source shows otherwise
   - Exactly one option is correct; give its zero-based position in "correct_index"
   - Options must be plausible, mutually exclusive and free of "all of the above"
   - Explanations say why the correct option is right in one or two sentences

2. MNEMONICS
   - Only for lists or sequences worth memorising
   - Spell out what each letter or word stands for in the explanation

3. CHEAT SHEET
   - Short, self-contained facts, formulas and thresholds
   - One fact per entry, no numbering

4. KEY CONCEPTS
   - Names of the central ideas covered, a few words each

5. OUTPUT FORMAT
   - Output ONLY a single JSON object with this exact shape:
{schema}
   - Do NOT wrap the JSON in code fences
   - Do NOT add commentary before or after the JSON
   - Use empty arrays for sections with nothing to say"#;

/// Appended for documents that already contain questions.
pub const EXTRACT_INSTRUCTIONS: &str = r#"

6. MODE: EXTRACT
   The text is a question paper or worksheet. Reproduce its questions
   faithfully instead of inventing new ones. Use the answer key when the
   text has one; otherwise pick the correct option yourself and explain it.
   Keep the original wording of stems and options."#;

/// Appended for expository text.
pub const SYNTHESIZE_INSTRUCTIONS: &str = r#"

6. MODE: SYNTHESIZE
   The text is explanatory material. Write new questions that test
   understanding of it, between 5 and 12 depending on how much the text
   covers. Every question must be answerable from the text alone."#;

/// Appended for documents that mix both.
pub const MIXED_INSTRUCTIONS: &str = r#"

6. MODE: MIXED
   The text contains both explanations and questions. Reproduce the
   existing questions faithfully, then add new questions for explained
   material that no existing question covers."#;

/// Appended when the source is a bare topic.
pub const TOPIC_INSTRUCTIONS: &str = r#"

6. MODE: TOPIC
   There is no source document. Draw on standard curriculum knowledge of
   the topic. Write between 8 and 12 questions spanning its core areas,
   at mixed difficulty."#;

/// Build the complete system prompt for a request.
pub fn system_prompt(base: Option<&str>, document_type: DocumentType, is_topic: bool) -> String {
    let mut prompt = base
        .unwrap_or(DEFAULT_SYSTEM_PROMPT)
        .replace("{schema}", REPLY_SCHEMA);
    prompt.push_str(mode_instructions(document_type, is_topic));
    prompt
}

fn mode_instructions(document_type: DocumentType, is_topic: bool) -> &'static str {
    if is_topic {
        return TOPIC_INSTRUCTIONS;
    }
    match document_type {
        DocumentType::ContainsAssessmentItems => EXTRACT_INSTRUCTIONS,
        DocumentType::ExpositoryNotes => SYNTHESIZE_INSTRUCTIONS,
        DocumentType::Mixed => MIXED_INSTRUCTIONS,
    }
}

/// The user turn: the batch text, labelled with its scope.
pub fn user_message(scope_label: &str, text: &str, is_topic: bool) -> String {
    if is_topic {
        format!("Topic: {}", text.trim())
    } else {
        format!("Source material ({scope_label}):\n\n\"\"\"\n{}\n\"\"\"", text.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_embedded() {
        let p = system_prompt(None, DocumentType::ExpositoryNotes, false);
        assert!(p.contains("\"correct_index\": 0"));
        assert!(!p.contains("{schema}"));
        assert!(p.contains("MODE: SYNTHESIZE"));
    }

    #[test]
    fn mode_follows_document_type() {
        assert!(system_prompt(None, DocumentType::ContainsAssessmentItems, false)
            .contains("MODE: EXTRACT"));
        assert!(system_prompt(None, DocumentType::Mixed, false).contains("MODE: MIXED"));
        assert!(system_prompt(None, DocumentType::ContainsAssessmentItems, true)
            .contains("MODE: TOPIC"));
    }

    #[test]
    fn custom_base_prompt_keeps_mode() {
        let p = system_prompt(Some("Be brief. {schema}"), DocumentType::Mixed, false);
        assert!(p.starts_with("Be brief. {"));
        assert!(p.ends_with(MIXED_INSTRUCTIONS));
    }

    #[test]
    fn user_message_shapes() {
        assert_eq!(user_message("topic", " Cardiology ", true), "Topic: Cardiology");
        let m = user_message("pages 4-6", "[Page 4]\nbody", false);
        assert!(m.starts_with("Source material (pages 4-6):"));
        assert!(m.contains("[Page 4]\nbody"));
    }
}
