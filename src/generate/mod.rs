//! The content generation boundary.
//!
//! Everything that talks to a generative model sits behind
//! [`ContentGenerator`]. The orchestrator only ever sees a typed
//! [`BatchResult`] or a [`GenerationError`]; loosely structured model output
//! is parsed and validated inside the adapter ([`parse`]) and never leaks
//! past it.
//!
//! Two implementations ship with the crate:
//!
//! * [`llm::LlmGenerator`]: prompts an `edgequake-llm` provider for JSON.
//! * [`scripted::ScriptedGenerator`]: deterministic, in-memory, counts its
//!   calls; the single seam the pipeline tests mock.

pub mod llm;
pub mod parse;
pub mod scripted;

use crate::error::GenerationError;
use crate::model::{Batch, BatchResult, BatchScope, DocumentType};
use async_trait::async_trait;
use std::sync::Arc;

/// Everything the generator needs for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub batch_id: String,
    pub ordinal: usize,
    pub scope: BatchScope,
    /// Batch text, or the bare topic for topic sources.
    pub text: String,
    pub document_type: DocumentType,
}

impl GenerationRequest {
    pub fn for_batch(batch: &Batch, document_type: DocumentType) -> Self {
        Self {
            batch_id: batch.id.clone(),
            ordinal: batch.ordinal,
            scope: batch.scope,
            text: batch.text.clone(),
            document_type,
        }
    }

    pub fn is_topic(&self) -> bool {
        matches!(self.scope, BatchScope::Topic)
    }
}

/// Produces study content for one batch.
///
/// Implementations must be `Send + Sync`: the orchestrator shares one
/// generator across concurrently running batch tasks.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<BatchResult, GenerationError>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "generator"
    }
}

#[async_trait]
impl ContentGenerator for Arc<dyn ContentGenerator> {
    async fn generate(&self, request: &GenerationRequest) -> Result<BatchResult, GenerationError> {
        (**self).generate(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
