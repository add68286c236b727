//! Pipeline stages for study-material generation.
//!
//! Each submodule implements exactly one step. Only [`retry`] touches the
//! generator; everything after it is a synchronous transform over
//! aggregated state.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ plan ──▶ classify ──▶ retry(generate) ──▶ aggregate
//! (URL/path)  (pages)   (batches) (once/doc)   (bounded, N-way)       │
//!                                                                     ▼
//!                                   flashcards ◀── notes ◀── mock_test
//! ```
//!
//! 1. [`input`] / [`extract`]: resolve a path or URL and pull page text
//! 2. [`plan`]: split pages into ordered, non-overlapping batches
//! 3. [`classify`]: decide extract vs synthesize once per document
//! 4. [`retry`]: one generator call per attempt, backoff between attempts
//! 5. [`aggregate`]: ordinal-ordered merge with validation and de-dup
//! 6. [`mock_test`], [`notes`], [`flashcards`]: derived artifacts

pub mod aggregate;
pub mod classify;
pub mod extract;
pub mod flashcards;
pub mod input;
pub mod mock_test;
pub mod notes;
pub mod plan;
pub mod retry;
