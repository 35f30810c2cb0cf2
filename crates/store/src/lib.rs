//! Durable client-local state of the running opname session.
//!
//! A small JSON document survives restarts so the client can resume the
//! session it was working on: the session id, the location it covers, and
//! the scanned/pending counters shown on the dashboard. The counters are
//! never incremented in place; they mirror the counts derived from the
//! scan session's entry list each time it changes.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use opname_core::scan_session::SessionCounts;
use opname_core::session::{LocationKind, OpnameSession};
use opname_core::types::DbId;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("State file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("State file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persisted state of the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocalState {
    pub session_id: Option<DbId>,
    pub location_id: Option<DbId>,
    pub location_kind: Option<LocationKind>,
    #[serde(default)]
    pub scanned_count: usize,
    #[serde(default)]
    pub pending_count: usize,
}

impl LocalState {
    /// State for a freshly started or resumed session.
    pub fn for_session(session: &OpnameSession) -> Self {
        Self {
            session_id: Some(session.id),
            location_id: Some(session.location_id),
            location_kind: Some(session.location_kind),
            scanned_count: 0,
            pending_count: 0,
        }
    }

    pub fn has_session(&self) -> bool {
        self.session_id.is_some()
    }

    /// Mirror counts derived from the entry list.
    pub fn record_counts(&mut self, counts: SessionCounts) {
        self.scanned_count = counts.scanned;
        self.pending_count = counts.pending;
    }
}

/// File-backed store for [`LocalState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved state. A missing file is an empty state.
    pub async fn load(&self) -> Result<LocalState, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(LocalState::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the state, replacing the previous file atomically.
    pub async fn save(&self, state: &LocalState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!(
            path = %self.path.display(),
            session_id = ?state.session_id,
            scanned = state.scanned_count,
            pending = state.pending_count,
            "Local opname state saved",
        );
        Ok(())
    }

    /// Forget the session. Clearing an absent file is not an error.
    pub async fn clear(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn store(dir: &tempfile::TempDir) -> StateStore {
        StateStore::new(dir.path().join("nested").join("state.json"))
    }

    #[tokio::test]
    async fn missing_file_loads_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = store(&dir).load().await.unwrap();
        assert_eq!(state, LocalState::default());
        assert!(!state.has_session());
    }

    #[tokio::test]
    async fn saved_state_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let session = OpnameSession::start(12, 1, 4, LocationKind::Department, Utc::now());
        let mut state = LocalState::for_session(&session);
        state.record_counts(SessionCounts {
            scanned: 5,
            pending: 2,
            edited: 1,
            all_good: 2,
        });
        store.save(&state).await.unwrap();

        let reloaded = StateStore::new(store.path()).load().await.unwrap();
        assert_eq!(reloaded, state);
        assert_eq!(reloaded.session_id, Some(12));
        assert_eq!(reloaded.location_kind, Some(LocationKind::Department));
        assert_eq!(reloaded.pending_count, 2);
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.save(&LocalState::default()).await.unwrap();
        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();
        let err = StateStore::new(path).load().await.unwrap_err();
        assert!(matches!(err, StoreError::Json(_)));
    }
}
