//! # edgequake-study
//!
//! Turn a document or a bare topic into study material with an LLM:
//! a question bank, a mock test, mnemonics, a cheat sheet, notes and
//! flashcards.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / text / URL / topic
//!  │
//!  ├─ 1. Extract   per-page text (pdfium behind the `pdf` feature)
//!  ├─ 2. Plan      ordered, non-overlapping batches
//!  ├─ 3. Classify  extract vs synthesize, once per document
//!  ├─ 4. Generate  bounded concurrent LLM calls with retry
//!  ├─ 5. Aggregate ordinal-ordered merge, validation, de-dup
//!  ├─ 6. Derive    mock test, notes, flashcards (no LLM calls)
//!  └─ 7. Persist   one artifact per kind + processing state
//! ```
//!
//! A failed batch degrades the session instead of failing it: the session
//! completes with whatever the other batches produced, and the missing
//! parts are listed in the diagnostics artifact and the notes summary.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_study::{
//!     extract_input, ExtractConfig, FileStore, GeneratorConfig, LlmGenerator, Pipeline,
//!     PipelineConfig, SessionId,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let generator = LlmGenerator::new(GeneratorConfig::default())?;
//!     let store = FileStore::new("sessions");
//!     let pipeline = Pipeline::new(Arc::new(generator), Arc::new(store), PipelineConfig::default())?;
//!
//!     let source = extract_input("cardiology.pdf", &ExtractConfig::default()).await?;
//!     let report = pipeline.run(SessionId::new("cardio-1"), source).await?;
//!     eprintln!("{} questions, {} flashcards", report.questions, report.flashcards);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `studygen` binary (clap + anyhow + indicatif + tracing-subscriber) |
//! | `pdf`   | on      | PDF text extraction through pdfium |
//!
//! Disable both when embedding the library with your own extractor:
//! ```toml
//! edgequake-study = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod artifacts;
pub mod config;
pub mod error;
pub mod generate;
pub mod model;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod state;
pub mod store;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use artifacts::{
    Artifact, ArtifactKind, BatchOutcome, BatchReport, CheatSheet, Diagnostics, Flashcard,
    FlashcardDeck, MnemonicSet, MockTest, Notes, Question, QuestionBank,
};
pub use config::{
    ExtractConfig, GeneratorConfig, GeneratorConfigBuilder, PipelineConfig, PipelineConfigBuilder,
};
pub use error::{BatchError, GenerationError, PipelineError, StateError, StoreError};
pub use generate::llm::LlmGenerator;
pub use generate::scripted::ScriptedGenerator;
pub use generate::{ContentGenerator, GenerationRequest};
pub use model::{
    Batch, BatchResult, BatchScope, Difficulty, DocumentType, MnemonicDraft, OptionDraft,
    QuestionDraft, SessionId, Source,
};
pub use orchestrator::{Pipeline, SessionReport};
pub use pipeline::extract::{extract_input, PlainTextExtractor, TextExtractor};
pub use progress::{PipelineProgressCallback, ProgressCallback};
pub use state::{Phase, ProcessingState, ProgressTracker, Status};
pub use store::{FileStore, MemoryStore, SessionStore};
pub use stream::{state_stream, StateStream};
