//! Snapshot persistence for the local backend.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::BackendState;

/// File name of the snapshot inside the data directory.
pub const SNAPSHOT_FILE: &str = "patlimer.json";

/// Serialized form of the local backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    saved_at: DateTime<Utc>,
    #[serde(default)]
    state: BackendState,
}

impl Snapshot {
    /// Capture the given state with the current timestamp.
    pub fn new(state: BackendState) -> Self {
        Self {
            saved_at: Utc::now(),
            state,
        }
    }

    /// When the snapshot was written.
    pub fn saved_at(&self) -> DateTime<Utc> {
        self.saved_at
    }

    /// Consume the snapshot and return the stored state.
    pub fn into_state(self) -> BackendState {
        self.state
    }
}

/// Reads and writes backend snapshots under a data directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    /// Create a store rooted at the provided directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Full path of the snapshot file.
    pub fn path(&self) -> PathBuf {
        self.root.join(SNAPSHOT_FILE)
    }

    /// Load the persisted snapshot, returning `None` if none was written yet.
    pub fn load(&self) -> Result<Option<Snapshot>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let snapshot = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Some(snapshot))
    }

    /// Persist the given state, creating the data directory if needed.
    pub fn persist(&self, state: &BackendState) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))?;
        let snapshot = Snapshot::new(state.clone());
        let serialised =
            serde_json::to_vec_pretty(&snapshot).context("failed to serialize snapshot")?;
        write_atomically(&self.path(), &serialised)
    }
}

fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, contents)
        .with_context(|| format!("failed to write {}", staging.display()))?;
    fs::rename(&staging, path)
        .with_context(|| format!("failed to replace {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_snapshot_loads_as_none() -> Result<()> {
        let dir = tempdir()?;
        let store = SnapshotStore::new(dir.path());
        assert!(store.load()?.is_none());
        Ok(())
    }

    #[test]
    fn snapshot_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let store = SnapshotStore::new(dir.path().join("nested"));
        let mut state = BackendState::default();
        state.create_race_event("Spring Cup")?;
        let before = Utc::now();

        store.persist(&state)?;
        assert!(store.path().exists());

        let snapshot = store.load()?.expect("snapshot should exist");
        assert!(snapshot.saved_at() >= before);
        let restored = snapshot.into_state();
        assert_eq!(restored.race_events().len(), 1);
        assert_eq!(restored.race_events()[0].name, "Spring Cup");
        Ok(())
    }

    #[test]
    fn corrupt_snapshot_reports_path() -> Result<()> {
        let dir = tempdir()?;
        let store = SnapshotStore::new(dir.path());
        fs::write(store.path(), "{ not json")?;

        let err = store.load().unwrap_err();
        assert!(err.to_string().contains(SNAPSHOT_FILE));
        Ok(())
    }
}
