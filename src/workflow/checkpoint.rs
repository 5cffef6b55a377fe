//! Session Checkpoints
//!
//! A checkpoint is a snapshot of `{node, context}` taken right before a
//! session pauses for human input. It is durable state keyed by session
//! id, so the host may restart between suspend and resume.
//!
//! File-backed checkpoints are saved to
//! `{state_dir}/checkpoints/{session_id}.json`.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::context::Context;
use super::node::Node;
use crate::error::WorkflowError;

/// Identifier of one end-to-end session.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a fresh random session id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for SessionId {
    type Err = WorkflowError;

    /// Parses a caller-supplied id. Ids key file paths, so only
    /// ASCII alphanumerics, `-` and `_` are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let valid = !s.is_empty()
            && s.len() <= 128
            && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(WorkflowError::InvalidSessionId(s.to_string()))
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of a suspended session.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Checkpoint {
    /// Session this checkpoint belongs to
    pub session_id: SessionId,

    /// Node the session is suspended at
    pub node: Node,

    /// Full context at suspension time
    pub context: Context,

    /// When the checkpoint was taken
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(session_id: SessionId, node: Node, context: Context) -> Self {
        Self {
            session_id,
            node,
            context,
            saved_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("checkpoint is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("checkpoint store lock was poisoned")]
    Poisoned,
}

/// Durable storage for session checkpoints.
///
/// At most one checkpoint is live per session: `save` replaces any
/// previous checkpoint of the same session.
pub trait CheckpointStore: Send + Sync {
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;

    /// Returns `Ok(None)` when the session has no live checkpoint.
    fn load(&self, session_id: &SessionId) -> Result<Option<Checkpoint>, CheckpointError>;

    /// Atomically removes and returns the session's checkpoint.
    ///
    /// Of several concurrent callers at most one receives the checkpoint.
    /// Saving it again hands the session back to later callers.
    fn claim(&self, session_id: &SessionId) -> Result<Option<Checkpoint>, CheckpointError>;

    /// Removes the session's checkpoint. Clearing a missing checkpoint is not an error.
    fn clear(&self, session_id: &SessionId) -> Result<(), CheckpointError>;

    /// All live checkpoints, oldest first.
    fn list(&self) -> Result<Vec<Checkpoint>, CheckpointError>;
}

/// Stores each checkpoint as a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, session_id: &SessionId) -> PathBuf {
        self.dir.join(format!("{}.json", session_id))
    }

    fn claimed_path_for(&self, session_id: &SessionId) -> PathBuf {
        self.dir.join(format!("{}{}", session_id, CLAIMED_SUFFIX))
    }
}

/// File name suffix of a checkpoint held by a running resume.
const CLAIMED_SUFFIX: &str = ".running.json";

impl CheckpointStore for FileCheckpointStore {
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        fs::create_dir_all(&self.dir)?;

        let path = self.path_for(&checkpoint.session_id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(checkpoint)?;

        // Write then rename so a crash never leaves a half-written checkpoint
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;

        let claimed = self.claimed_path_for(&checkpoint.session_id);
        if claimed.exists() {
            fs::remove_file(&claimed)?;
        }

        info!(
            "Saved checkpoint for session {} at {}",
            checkpoint.session_id, checkpoint.node
        );
        Ok(())
    }

    fn load(&self, session_id: &SessionId) -> Result<Option<Checkpoint>, CheckpointError> {
        let path = self.path_for(session_id);
        if !path.exists() {
            debug!("No checkpoint at {}", path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let checkpoint: Checkpoint = serde_json::from_str(&content)?;

        info!("Loaded checkpoint for session {} at {}", session_id, checkpoint.node);
        Ok(Some(checkpoint))
    }

    fn claim(&self, session_id: &SessionId) -> Result<Option<Checkpoint>, CheckpointError> {
        let path = self.path_for(session_id);
        let claimed = self.claimed_path_for(session_id);

        // Rename is atomic: only one caller moves the live file
        match fs::rename(&path, &claimed) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No checkpoint to claim at {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        let content = fs::read_to_string(&claimed)?;
        let checkpoint: Checkpoint = serde_json::from_str(&content)?;

        info!("Claimed checkpoint for session {} at {}", session_id, checkpoint.node);
        Ok(Some(checkpoint))
    }

    fn clear(&self, session_id: &SessionId) -> Result<(), CheckpointError> {
        for path in [self.path_for(session_id), self.claimed_path_for(session_id)] {
            if path.exists() {
                fs::remove_file(&path)?;
                info!("Deleted checkpoint: {}", path.display());
            }
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<Checkpoint>, CheckpointError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut checkpoints = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if path.to_string_lossy().ends_with(CLAIMED_SUFFIX) {
                continue;
            }

            let parsed = fs::read_to_string(&path)
                .map_err(CheckpointError::from)
                .and_then(|content| serde_json::from_str::<Checkpoint>(&content).map_err(CheckpointError::from));

            match parsed {
                Ok(checkpoint) => checkpoints.push(checkpoint),
                Err(e) => warn!("Skipping unreadable checkpoint {}: {}", path.display(), e),
            }
        }

        checkpoints.sort_by_key(|c| c.saved_at);
        Ok(checkpoints)
    }
}

/// Keeps checkpoints in process memory. Suitable for tests and for hosts
/// that do not need suspension to survive a restart.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    entries: Mutex<HashMap<SessionId, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let mut entries = self.entries.lock().map_err(|_| CheckpointError::Poisoned)?;
        entries.insert(checkpoint.session_id.clone(), checkpoint.clone());
        Ok(())
    }

    fn load(&self, session_id: &SessionId) -> Result<Option<Checkpoint>, CheckpointError> {
        let entries = self.entries.lock().map_err(|_| CheckpointError::Poisoned)?;
        Ok(entries.get(session_id).cloned())
    }

    fn claim(&self, session_id: &SessionId) -> Result<Option<Checkpoint>, CheckpointError> {
        let mut entries = self.entries.lock().map_err(|_| CheckpointError::Poisoned)?;
        Ok(entries.remove(session_id))
    }

    fn clear(&self, session_id: &SessionId) -> Result<(), CheckpointError> {
        let mut entries = self.entries.lock().map_err(|_| CheckpointError::Poisoned)?;
        entries.remove(session_id);
        Ok(())
    }

    fn list(&self) -> Result<Vec<Checkpoint>, CheckpointError> {
        let entries = self.entries.lock().map_err(|_| CheckpointError::Poisoned)?;
        let mut checkpoints: Vec<Checkpoint> = entries.values().cloned().collect();
        checkpoints.sort_by_key(|c| c.saved_at);
        Ok(checkpoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::context::{fields, ContextPatch};
    use tempfile::tempdir;

    fn sample_checkpoint() -> Checkpoint {
        let mut context = Context::with_prompt("build a retail demo");
        context.apply(
            ContextPatch::new()
                .set(fields::DEMO_DESCRIPTION, "Retail ops")
                .set(fields::QUESTIONS, vec!["q1", "q2", "q3", "q4", "q5"]),
        );
        Checkpoint::new(SessionId::generate(), Node::AwaitApproval, context)
    }

    #[test]
    fn test_session_id_parse_accepts_uuid() {
        let id = SessionId::generate();
        let parsed: SessionId = id.as_str().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_session_id_parse_rejects_paths() {
        for bad in ["", "  ", "../etc/passwd", "a/b", "a b", "id.json"] {
            assert!(bad.parse::<SessionId>().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_file_store_roundtrip() {
        let temp_dir = tempdir().unwrap();
        let store = FileCheckpointStore::new(temp_dir.path().join("checkpoints"));
        let checkpoint = sample_checkpoint();

        store.save(&checkpoint).unwrap();
        let loaded = store.load(&checkpoint.session_id).unwrap().unwrap();

        assert_eq!(loaded, checkpoint);
    }

    #[test]
    fn test_file_store_load_missing() {
        let temp_dir = tempdir().unwrap();
        let store = FileCheckpointStore::new(temp_dir.path());
        assert!(store.load(&SessionId::generate()).unwrap().is_none());
    }

    #[test]
    fn test_file_store_save_replaces() {
        let temp_dir = tempdir().unwrap();
        let store = FileCheckpointStore::new(temp_dir.path());
        let mut checkpoint = sample_checkpoint();
        store.save(&checkpoint).unwrap();

        checkpoint.context.apply(ContextPatch::new().set(fields::HUMAN_INPUT, "add returns"));
        store.save(&checkpoint).unwrap();

        let all = store.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].context.get_str(fields::HUMAN_INPUT), "add returns");
    }

    #[test]
    fn test_file_store_clear() {
        let temp_dir = tempdir().unwrap();
        let store = FileCheckpointStore::new(temp_dir.path());
        let checkpoint = sample_checkpoint();

        store.save(&checkpoint).unwrap();
        store.clear(&checkpoint.session_id).unwrap();

        assert!(store.load(&checkpoint.session_id).unwrap().is_none());
        // Clearing twice is fine
        assert!(store.clear(&checkpoint.session_id).is_ok());
    }

    #[test]
    fn test_file_store_list_skips_corrupt_files() {
        let temp_dir = tempdir().unwrap();
        let store = FileCheckpointStore::new(temp_dir.path());
        store.save(&sample_checkpoint()).unwrap();
        fs::write(temp_dir.path().join("broken.json"), "{ not json").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_file_store_load_corrupt_is_error() {
        let temp_dir = tempdir().unwrap();
        let store = FileCheckpointStore::new(temp_dir.path());
        let id = SessionId::generate();
        fs::write(temp_dir.path().join(format!("{}.json", id)), "{").unwrap();

        assert!(matches!(store.load(&id), Err(CheckpointError::Corrupt(_))));
    }

    #[test]
    fn test_file_store_list_missing_dir() {
        let store = FileCheckpointStore::new("/nonexistent/demoforge/checkpoints");
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_claim_is_exclusive() {
        let temp_dir = tempdir().unwrap();
        let store = FileCheckpointStore::new(temp_dir.path());
        let checkpoint = sample_checkpoint();
        store.save(&checkpoint).unwrap();

        assert_eq!(store.claim(&checkpoint.session_id).unwrap(), Some(checkpoint.clone()));
        assert!(store.claim(&checkpoint.session_id).unwrap().is_none());
        assert!(store.load(&checkpoint.session_id).unwrap().is_none());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_save_after_claim_releases() {
        let temp_dir = tempdir().unwrap();
        let store = FileCheckpointStore::new(temp_dir.path());
        let checkpoint = sample_checkpoint();
        store.save(&checkpoint).unwrap();

        let claimed = store.claim(&checkpoint.session_id).unwrap().unwrap();
        store.save(&claimed).unwrap();

        let files: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        assert_eq!(store.claim(&checkpoint.session_id).unwrap(), Some(checkpoint));
    }

    #[test]
    fn test_file_store_clear_removes_claimed() {
        let temp_dir = tempdir().unwrap();
        let store = FileCheckpointStore::new(temp_dir.path());
        let checkpoint = sample_checkpoint();
        store.save(&checkpoint).unwrap();
        store.claim(&checkpoint.session_id).unwrap();

        store.clear(&checkpoint.session_id).unwrap();

        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_memory_store_claim_is_exclusive() {
        let store = MemoryCheckpointStore::new();
        let checkpoint = sample_checkpoint();
        store.save(&checkpoint).unwrap();

        assert_eq!(store.claim(&checkpoint.session_id).unwrap(), Some(checkpoint.clone()));
        assert!(store.claim(&checkpoint.session_id).unwrap().is_none());
    }

    #[test]
    fn test_memory_store_lifecycle() {
        let store = MemoryCheckpointStore::new();
        let checkpoint = sample_checkpoint();

        store.save(&checkpoint).unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
        assert_eq!(store.load(&checkpoint.session_id).unwrap(), Some(checkpoint.clone()));

        store.clear(&checkpoint.session_id).unwrap();
        assert!(store.load(&checkpoint.session_id).unwrap().is_none());
        assert!(store.list().unwrap().is_empty());
    }
}
