//! In-memory [`SessionStore`] for tests and embedding.
//!
//! Values are kept as serialised JSON behind `std::sync::RwLock`, so loading
//! exercises the same serde path as the file store. Locks are never held
//! across an `.await`.

use super::{from_json, to_json, validate_session_id, SessionStore};
use crate::artifacts::{Artifact, ArtifactKind};
use crate::error::StoreError;
use crate::model::SessionId;
use crate::state::ProcessingState;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
pub struct MemoryStore {
    artifacts: RwLock<HashMap<(SessionId, ArtifactKind), String>>,
    states: RwLock<HashMap<SessionId, String>>,
    state_writes: AtomicUsize,
    fail_artifact_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent artifact save fail with an I/O error.
    pub fn fail_artifact_saves(&self, fail: bool) {
        self.fail_artifact_saves.store(fail, Ordering::SeqCst);
    }

    /// Kinds saved for `session_id`, sorted.
    pub fn saved_kinds(&self, session_id: &SessionId) -> Vec<ArtifactKind> {
        let mut kinds: Vec<_> = self
            .artifacts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|(id, _)| id == session_id)
            .map(|(_, kind)| *kind)
            .collect();
        kinds.sort();
        kinds
    }

    /// Number of `save_state` calls across all sessions.
    pub fn state_writes(&self) -> usize {
        self.state_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn save(&self, session_id: &SessionId, artifact: &Artifact) -> Result<(), StoreError> {
        validate_session_id(session_id)?;
        if self.fail_artifact_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                path: format!("memory://{session_id}/{}", artifact.kind()).into(),
                source: std::io::Error::other("injected failure"),
            });
        }
        let json = to_json(artifact, artifact.kind().as_str())?;
        self.artifacts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((session_id.clone(), artifact.kind()), json);
        Ok(())
    }

    async fn save_state(&self, state: &ProcessingState) -> Result<(), StoreError> {
        validate_session_id(&state.session_id)?;
        let json = to_json(state, "state")?;
        self.states
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(state.session_id.clone(), json);
        self.state_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load(
        &self,
        session_id: &SessionId,
        kind: ArtifactKind,
    ) -> Result<Option<Artifact>, StoreError> {
        validate_session_id(session_id)?;
        let json = self
            .artifacts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(session_id.clone(), kind))
            .cloned();
        json.map(|j| from_json(&j, kind.as_str())).transpose()
    }

    async fn load_state(&self, session_id: &SessionId) -> Result<Option<ProcessingState>, StoreError> {
        validate_session_id(session_id)?;
        let json = self
            .states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned();
        json.map(|j| from_json(&j, "state")).transpose()
    }

    async fn delete(&self, session_id: &SessionId, kind: ArtifactKind) -> Result<(), StoreError> {
        validate_session_id(session_id)?;
        self.artifacts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(session_id.clone(), kind));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::CheatSheet;

    #[tokio::test]
    async fn round_trip() {
        let store = MemoryStore::new();
        let id = SessionId::new("s-1");
        let artifact = Artifact::CheatSheet(CheatSheet {
            points: vec!["QRS < 120 ms".into()],
        });
        store.save(&id, &artifact).await.unwrap();
        assert_eq!(
            store.load(&id, ArtifactKind::CheatSheet).await.unwrap(),
            Some(artifact)
        );
        assert_eq!(store.load(&id, ArtifactKind::Notes).await.unwrap(), None);
        assert_eq!(store.saved_kinds(&id), vec![ArtifactKind::CheatSheet]);

        let state = ProcessingState::pending(id.clone());
        store.save_state(&state).await.unwrap();
        assert_eq!(store.load_state(&id).await.unwrap(), Some(state));
        assert_eq!(store.state_writes(), 1);
    }

    #[tokio::test]
    async fn clearing_keeps_state_and_other_sessions() {
        let store = MemoryStore::new();
        let id = SessionId::new("s-3");
        let other = SessionId::new("s-4");
        let artifact = Artifact::CheatSheet(CheatSheet::default());
        store.save(&id, &artifact).await.unwrap();
        store.save(&other, &artifact).await.unwrap();
        store.save_state(&ProcessingState::pending(id.clone())).await.unwrap();

        store.clear_artifacts(&id).await.unwrap();
        assert!(store.saved_kinds(&id).is_empty());
        assert_eq!(store.saved_kinds(&other), vec![ArtifactKind::CheatSheet]);
        assert!(store.load_state(&id).await.unwrap().is_some());

        // Deleting what is already gone is fine.
        store.delete(&id, ArtifactKind::MockTest).await.unwrap();
    }

    #[tokio::test]
    async fn injected_failures_only_affect_artifacts() {
        let store = MemoryStore::new();
        let id = SessionId::new("s-2");
        store.fail_artifact_saves(true);
        let artifact = Artifact::CheatSheet(CheatSheet::default());
        assert!(matches!(store.save(&id, &artifact).await, Err(StoreError::Io { .. })));
        assert!(store.save_state(&ProcessingState::pending(id)).await.is_ok());
    }
}
