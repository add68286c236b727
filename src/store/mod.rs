//! Persistence for session artifacts and processing state.
//!
//! The [`SessionStore`] trait is the only way the orchestrator writes
//! anything durable. Two backends ship with the crate:
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`MemoryStore`] | tests and embedding; JSON held in a map |
//! | [`FileStore`] | the CLI; one JSON file per artifact under `root/<session>/` |
//!
//! Both serialise through `serde_json`, so a saved-then-loaded value is
//! structurally identical to the original regardless of backend.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::artifacts::{Artifact, ArtifactKind};
use crate::error::StoreError;
use crate::model::SessionId;
use crate::state::ProcessingState;
use async_trait::async_trait;

/// Durable storage for one or more sessions.
///
/// Implementations must be `Send + Sync`; the orchestrator shares one store
/// across all running sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Save an artifact, replacing any previous artifact of the same kind.
    async fn save(&self, session_id: &SessionId, artifact: &Artifact) -> Result<(), StoreError>;

    /// Save the latest processing state of a session.
    async fn save_state(&self, state: &ProcessingState) -> Result<(), StoreError>;

    async fn load(
        &self,
        session_id: &SessionId,
        kind: ArtifactKind,
    ) -> Result<Option<Artifact>, StoreError>;

    async fn load_state(&self, session_id: &SessionId) -> Result<Option<ProcessingState>, StoreError>;

    /// Remove one artifact. Removing an artifact that does not exist is not
    /// an error.
    async fn delete(&self, session_id: &SessionId, kind: ArtifactKind) -> Result<(), StoreError>;

    /// Remove every artifact of a session, keeping its processing state.
    /// Called before a session id is processed again.
    async fn clear_artifacts(&self, session_id: &SessionId) -> Result<(), StoreError> {
        for kind in ArtifactKind::ALL {
            self.delete(session_id, kind).await?;
        }
        Ok(())
    }
}

/// Reject ids that are empty or could escape a directory.
pub(crate) fn validate_session_id(id: &SessionId) -> Result<(), StoreError> {
    let s = id.as_str();
    let ok = !s.is_empty()
        && s.len() <= 128
        && s != "."
        && s != ".."
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidSessionId(s.to_string()))
    }
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T, what: &str) -> Result<String, StoreError> {
    serde_json::to_string_pretty(value).map_err(|source| StoreError::Serde {
        what: what.to_string(),
        source,
    })
}

pub(crate) fn from_json<T: serde::de::DeserializeOwned>(json: &str, what: &str) -> Result<T, StoreError> {
    serde_json::from_str(json).map_err(|source| StoreError::Serde {
        what: what.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_validation() {
        for ok in ["abc", "s-1", "2024_05_01.a"] {
            assert!(validate_session_id(&SessionId::new(ok)).is_ok(), "{ok}");
        }
        for bad in ["", ".", "..", "../etc", "a/b", "a\\b", "with space"] {
            assert!(validate_session_id(&SessionId::new(bad)).is_err(), "{bad}");
        }
    }
}
