//! Persisted history layout and the durable snapshot seam.
//!
//! The whole store is written after every mutation as one JSON document:
//!
//! ```json
//! { "cursorIndex": 1,
//!   "actionLog": ["a", "b#c"],
//!   "stacks": { "a": { "items": [{ "annotation": "add base", "feature": {..} }], "index": 0 } } }
//! ```
//!
//! Action records are stored as their ids joined with `#`. A cursor of `-1`
//! means the log is empty or fully undone.

#[cfg(test)]
#[path = "snapshot_test.rs"]
mod snapshot_test;

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use geometry::FeatureId;
use serde::{Deserialize, Serialize};

use crate::stack::VersionStack;

/// The serialized form of a whole [`crate::HistoryStore`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    pub cursor_index: i64,
    pub action_log: Vec<String>,
    pub stacks: BTreeMap<FeatureId, VersionStack>,
}

/// Error from writing, erasing, or loading a durable snapshot.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("snapshot io failed: {0}")]
    Io(#[from] io::Error),
    #[error("snapshot encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Destination for durable snapshots.
///
/// The store calls [`SnapshotSink::write`] after every push, undo, and redo,
/// and [`SnapshotSink::erase`] on clear. Failures are logged by the store and
/// never retried.
pub trait SnapshotSink: Send {
    /// Replace the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] when the snapshot could not be stored.
    fn write(&mut self, snapshot: &HistorySnapshot) -> Result<(), PersistError>;

    /// Remove the stored snapshot. Erasing nothing is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] when an existing snapshot could not be removed.
    fn erase(&mut self) -> Result<(), PersistError>;
}

/// Stores the snapshot as a JSON file, replacing it atomically via rename.
#[derive(Debug, Clone)]
pub struct FileSnapshotSink {
    path: PathBuf,
}

impl FileSnapshotSink {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored snapshot, if any.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Io`] when the file exists but cannot be read,
    /// and [`PersistError::Encode`] when it is not a valid snapshot.
    pub fn load(&self) -> Result<Option<HistorySnapshot>, PersistError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotSink for FileSnapshotSink {
    fn write(&mut self, snapshot: &HistorySnapshot) -> Result<(), PersistError> {
        let bytes = serde_json::to_vec(snapshot)?;
        let staging = self.staging_path();
        fs::write(&staging, bytes)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }

    fn erase(&mut self) -> Result<(), PersistError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
