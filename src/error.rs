//! Error types for the edgequake-study library.
//!
//! The split mirrors the two ways a study session can go wrong:
//!
//! * [`PipelineError`]: **Fatal**: the session cannot produce anything
//!   useful (empty source, every batch failed, cancelled, store down). The
//!   session transitions to `Failed` and [`PipelineError::user_message`] is
//!   what callers see on the [`crate::state::ProcessingState`].
//!
//! * [`BatchError`]: **Non-fatal**: one batch could not be generated after
//!   its retry budget, but the other batches are fine. Stored inside
//!   [`crate::artifacts::BatchReport`] so the diagnostics artifact can show
//!   which part of the document is missing.
//!
//! [`GenerationError`] is the error vocabulary of the content generation
//! boundary; the orchestrator's retry wrapper is the only code that ever
//! inspects it.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Source errors ─────────────────────────────────────────────────────
    /// The source has no pages, or every page / the topic is blank.
    #[error("Source contains no extractable text")]
    EmptyContent,

    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file is neither a PDF nor UTF-8 text.
    #[error("Unsupported document format: '{path}'")]
    UnsupportedFormat { path: PathBuf },

    /// Text extraction failed for the document.
    #[error("Text extraction failed for '{path}': {detail}")]
    ExtractionFailed { path: PathBuf, detail: String },

    /// PDF requires a password but none (or a wrong one) was provided.
    #[error("PDF '{path}' is encrypted and the password is missing or wrong")]
    PasswordRequired { path: PathBuf },

    /// Could not bind to a pdfium library.
    #[error("Failed to bind to pdfium library: {0}\nSet PDFIUM_LIB_PATH=/path/to/libpdfium.")]
    PdfiumBindingFailed(String),

    // ── Generation errors ─────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Every batch failed after all retries; nothing to aggregate.
    #[error("All {total} batches failed.\nFirst error: {first_error}")]
    AllBatchesFailed { total: usize, first_error: String },

    /// Aggregation produced no question, mnemonic or cheat-sheet point.
    #[error("Generation produced no usable study content")]
    NoUsableContent,

    // ── Session errors ────────────────────────────────────────────────────
    /// The session was cancelled by the caller.
    #[error("Session was cancelled")]
    Cancelled,

    /// The session exceeded its configured deadline.
    #[error("Session timed out after {secs}s")]
    TimedOut { secs: u64 },

    /// `start` was called twice for the same session id.
    #[error("Session '{0}' is already running")]
    SessionAlreadyRunning(String),

    /// No live or persisted state exists for the session id.
    #[error("Unknown session '{0}'")]
    UnknownSession(String),

    /// The persistence store rejected a read or write.
    #[error(transparent)]
    Store(#[from] StoreError),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Short, caller-safe description for [`crate::state::ProcessingState::error_message`].
    ///
    /// Never includes adapter payloads, paths or provider hints.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::EmptyContent => {
                "The document contains no readable text.".to_string()
            }
            PipelineError::FileNotFound { .. }
            | PipelineError::PermissionDenied { .. }
            | PipelineError::InvalidInput { .. } => "The document could not be opened.".to_string(),
            PipelineError::DownloadFailed { .. } | PipelineError::DownloadTimeout { .. } => {
                "The document could not be downloaded.".to_string()
            }
            PipelineError::UnsupportedFormat { .. } => {
                "This document format is not supported.".to_string()
            }
            PipelineError::ExtractionFailed { .. } | PipelineError::PdfiumBindingFailed(_) => {
                "Text could not be extracted from the document.".to_string()
            }
            PipelineError::PasswordRequired { .. } => {
                "The document is password protected.".to_string()
            }
            PipelineError::ProviderNotConfigured { .. } => {
                "The content generation service is not configured.".to_string()
            }
            PipelineError::AllBatchesFailed { total, .. } => format!(
                "Study material generation failed for all {total} parts of the document."
            ),
            PipelineError::NoUsableContent => {
                "No study material could be generated from this content.".to_string()
            }
            PipelineError::Cancelled => "Processing was cancelled.".to_string(),
            PipelineError::TimedOut { .. } => {
                "Processing was cancelled because it took too long.".to_string()
            }
            PipelineError::SessionAlreadyRunning(_) => {
                "This session is already being processed.".to_string()
            }
            PipelineError::UnknownSession(_) => "Unknown session.".to_string(),
            PipelineError::Store(_) => "Study material could not be saved.".to_string(),
            PipelineError::InvalidConfig(_) | PipelineError::Internal(_) => {
                "An internal error occurred while processing the document.".to_string()
            }
        }
    }
}

/// Errors at the content generation boundary.
///
/// Only the two retryable kinds are ever retried; see
/// [`GenerationError::is_retryable`].
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum GenerationError {
    /// HTTP 429 or equivalent. `retry_after_secs` is the server hint, if any.
    #[error("Rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    /// 401/403 or a missing key: retrying will not help.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// The provider refused the content (safety / content filter).
    #[error("Content rejected: {0}")]
    ContentRejected(String),

    /// Timeouts, 5xx, malformed replies and anything else worth another try.
    #[error("Transient failure: {0}")]
    Transient(String),
}

impl GenerationError {
    /// Whether the retry wrapper may try this batch again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationError::RateLimited { .. } | GenerationError::Transient(_)
        )
    }

    /// Stable lowercase name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::RateLimited { .. } => "rate_limited",
            GenerationError::Unauthenticated(_) => "unauthenticated",
            GenerationError::ContentRejected(_) => "content_rejected",
            GenerationError::Transient(_) => "transient",
        }
    }
}

/// A non-fatal error for a single batch.
///
/// Stored in the batch report when a batch is recorded as missing. The
/// session continues unless every batch ends up here.
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BatchError {
    /// The generator failed permanently or the retry budget ran out.
    #[error("Batch {ordinal}: generation failed after {attempts} attempt(s) ({kind}): {detail}")]
    GenerationFailed {
        ordinal: usize,
        attempts: u32,
        kind: String,
        detail: String,
    },

    /// The batch was still in flight when the session was cancelled.
    #[error("Batch {ordinal}: abandoned on cancellation")]
    Abandoned { ordinal: usize },
}

/// Persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid session id '{0}'")]
    InvalidSessionId(String),

    #[error("Store I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to (de)serialise {what}: {source}")]
    Serde {
        what: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Illegal state machine transitions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    /// The session already reached `Completed` or `Failed`.
    #[error("Session is already in terminal state {0}")]
    Terminal(String),

    /// A processing update arrived before `start`.
    #[error("Session has not started processing")]
    NotStarted,

    /// `start` was called on a session that is already processing.
    #[error("Session is already processing")]
    AlreadyStarted,
}
