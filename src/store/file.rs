//! File-system [`SessionStore`].
//!
//! Layout:
//!
//! ```text
//! root/
//! └── <session_id>/
//!     ├── state.json
//!     ├── question_bank.json
//!     ├── mock_test.json
//!     └── ...
//! ```
//!
//! Every write goes to a sibling `.tmp` file first and is then renamed over
//! the target, so a reader never sees a half-written JSON file.

use super::{from_json, to_json, validate_session_id, SessionStore};
use crate::artifacts::{Artifact, ArtifactKind};
use crate::error::StoreError;
use crate::model::SessionId;
use crate::state::ProcessingState;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

const STATE_FILE: &str = "state.json";

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one session's files.
    pub fn session_dir(&self, session_id: &SessionId) -> Result<PathBuf, StoreError> {
        validate_session_id(session_id)?;
        Ok(self.root.join(session_id.as_str()))
    }

    pub fn artifact_path(&self, session_id: &SessionId, kind: ArtifactKind) -> Result<PathBuf, StoreError> {
        Ok(self.session_dir(session_id)?.join(format!("{}.json", kind.as_str())))
    }

    fn state_path(&self, session_id: &SessionId) -> Result<PathBuf, StoreError> {
        Ok(self.session_dir(session_id)?.join(STATE_FILE))
    }

    async fn write_atomic(&self, path: &Path, contents: &str) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
        debug!("Wrote {}", path.display());
        Ok(())
    }

    async fn read_optional(&self, path: &Path) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(path).await {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn save(&self, session_id: &SessionId, artifact: &Artifact) -> Result<(), StoreError> {
        let path = self.artifact_path(session_id, artifact.kind())?;
        let json = to_json(artifact, artifact.kind().as_str())?;
        self.write_atomic(&path, &json).await
    }

    async fn save_state(&self, state: &ProcessingState) -> Result<(), StoreError> {
        let path = self.state_path(&state.session_id)?;
        let json = to_json(state, "state")?;
        self.write_atomic(&path, &json).await
    }

    async fn load(
        &self,
        session_id: &SessionId,
        kind: ArtifactKind,
    ) -> Result<Option<Artifact>, StoreError> {
        let path = self.artifact_path(session_id, kind)?;
        self.read_optional(&path)
            .await?
            .map(|j| from_json(&j, kind.as_str()))
            .transpose()
    }

    async fn load_state(&self, session_id: &SessionId) -> Result<Option<ProcessingState>, StoreError> {
        let path = self.state_path(session_id)?;
        self.read_optional(&path)
            .await?
            .map(|j| from_json(&j, "state"))
            .transpose()
    }

    async fn delete(&self, session_id: &SessionId, kind: ArtifactKind) -> Result<(), StoreError> {
        let path = self.artifact_path(session_id, kind)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{MockTest, Notes};
    use chrono::Utc;

    #[tokio::test]
    async fn round_trip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let id = SessionId::new("cardio-1");

        let test = Artifact::MockTest(MockTest {
            name: "Cardiology Mock Test".into(),
            question_ids: vec!["q-0001".into(), "q-0002".into()],
            duration_minutes: 3,
            created_at: Utc::now(),
        });
        store.save(&id, &test).await.unwrap();
        store.save(&id, &Artifact::Notes(Notes::empty())).await.unwrap();

        assert!(dir.path().join("cardio-1/mock_test.json").exists());
        assert!(!dir.path().join("cardio-1/mock_test.json.tmp").exists());
        assert_eq!(store.load(&id, ArtifactKind::MockTest).await.unwrap(), Some(test));
        assert_eq!(
            store.load(&id, ArtifactKind::Notes).await.unwrap(),
            Some(Artifact::Notes(Notes::empty()))
        );
        assert_eq!(store.load(&id, ArtifactKind::Flashcards).await.unwrap(), None);

        let state = ProcessingState::pending(id.clone());
        store.save_state(&state).await.unwrap();
        assert_eq!(store.load_state(&id).await.unwrap(), Some(state));
    }

    #[tokio::test]
    async fn cleared_session_keeps_its_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let id = SessionId::new("rerun");
        store.save(&id, &Artifact::Notes(Notes::empty())).await.unwrap();
        store.save_state(&ProcessingState::pending(id.clone())).await.unwrap();

        store.clear_artifacts(&id).await.unwrap();
        assert!(!dir.path().join("rerun/notes.json").exists());
        assert!(dir.path().join("rerun/state.json").exists());
        assert_eq!(store.load(&id, ArtifactKind::Notes).await.unwrap(), None);
    }

    #[tokio::test]
    async fn unknown_session_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert_eq!(store.load_state(&SessionId::new("nope")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn path_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let err = store
            .save_state(&ProcessingState::pending(SessionId::new("../escape")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidSessionId(_)));
    }

    #[tokio::test]
    async fn corrupt_file_is_a_serde_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let id = SessionId::new("s");
        std::fs::create_dir_all(dir.path().join("s")).unwrap();
        std::fs::write(dir.path().join("s/state.json"), "{ not json").unwrap();
        assert!(matches!(
            store.load_state(&id).await,
            Err(StoreError::Serde { .. })
        ));
    }
}
