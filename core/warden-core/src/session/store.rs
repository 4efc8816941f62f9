//! Session state persistence.
//!
//! One `SessionState` record per session id; this store is the sole
//! writer. Optionally backed by a versioned JSON file
//! (`~/.warden/sessions.json`).
//!
//! # Defensive Design
//!
//! Loads handle empty files, corrupt JSON, and version mismatches by
//! returning an empty store with a logged warning; a single malformed
//! persisted record must never crash the orchestration loop.
//!
//! # Atomic Writes
//!
//! Saves go through a temp file + rename so a crash mid-write cannot
//! leave a truncated state file.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{Result, WardenError};
use crate::session::types::SessionState;

const STORE_VERSION: u32 = 1;

/// The on-disk JSON structure for the state file.
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    sessions: HashMap<String, SessionState>,
}

/// Keyed store of session records, optionally backed by a file.
///
/// Create with [`SessionStore::load`] to read from the state file, or
/// [`SessionStore::new_in_memory`] for tests. Mutable access to a record
/// goes through [`SessionStore::get_mut`], which hands out the only live
/// borrow for that session (single-writer-per-key).
pub struct SessionStore {
    sessions: HashMap<String, SessionState>,
    file_path: Option<PathBuf>,
}

impl SessionStore {
    pub fn new_in_memory() -> Self {
        SessionStore {
            sessions: HashMap::new(),
            file_path: None,
        }
    }

    pub fn new(file_path: &Path) -> Self {
        SessionStore {
            sessions: HashMap::new(),
            file_path: Some(file_path.to_path_buf()),
        }
    }

    pub fn load(file_path: &Path) -> Self {
        if !file_path.exists() {
            return SessionStore::new(file_path);
        }

        let content = match fs::read_to_string(file_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %file_path.display(), error = %e, "Unreadable state file, starting empty");
                return SessionStore::new(file_path);
            }
        };

        if content.trim().is_empty() {
            return SessionStore::new(file_path);
        }

        match serde_json::from_str::<StoreFile>(&content) {
            Ok(store_file) if store_file.version == STORE_VERSION => SessionStore {
                sessions: store_file.sessions,
                file_path: Some(file_path.to_path_buf()),
            },
            Ok(store_file) => {
                tracing::warn!(
                    version = store_file.version,
                    expected = STORE_VERSION,
                    "Unsupported state file version, starting empty"
                );
                SessionStore::new(file_path)
            }
            Err(e) => {
                tracing::warn!(path = %file_path.display(), error = %e, "Corrupt state file, starting empty");
                SessionStore::new(file_path)
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        let Some(file_path) = self.file_path.as_ref() else {
            // In-memory stores have nothing to persist.
            return Ok(());
        };

        let store_file = StoreFile {
            version: STORE_VERSION,
            sessions: self.sessions.clone(),
        };

        let content =
            serde_json::to_string_pretty(&store_file).map_err(|e| WardenError::Json {
                context: "Serializing session store".to_string(),
                source: e,
            })?;

        let parent_dir = file_path.parent().ok_or_else(|| WardenError::Io {
            context: format!("State file path has no parent: {}", file_path.display()),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "no parent"),
        })?;
        fs::create_dir_all(parent_dir).map_err(|e| WardenError::Io {
            context: format!("Creating state dir {}", parent_dir.display()),
            source: e,
        })?;

        let mut temp_file = NamedTempFile::new_in(parent_dir).map_err(|e| WardenError::Io {
            context: "Creating temp state file".to_string(),
            source: e,
        })?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| WardenError::Io {
                context: "Writing temp state file".to_string(),
                source: e,
            })?;
        temp_file.flush().map_err(|e| WardenError::Io {
            context: "Flushing temp state file".to_string(),
            source: e,
        })?;
        temp_file.persist(file_path).map_err(|e| WardenError::Io {
            context: format!("Persisting state file {}", file_path.display()),
            source: e.error,
        })?;

        Ok(())
    }

    /// Creates a session record, or returns the existing one when the id
    /// is already known (session-created events can replay).
    pub fn create(&mut self, session_id: &str) -> &mut SessionState {
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionState::new(session_id))
    }

    /// Replaces the record for `session_id` wholesale. Used by compaction
    /// rehydration.
    pub fn insert(&mut self, state: SessionState) {
        self.sessions.insert(state.session_id.clone(), state);
    }

    pub fn get(&self, session_id: &str) -> Result<&SessionState> {
        self.sessions
            .get(session_id)
            .ok_or_else(|| WardenError::SessionNotFound(session_id.to_string()))
    }

    /// Exclusive accessor for one session's state.
    pub fn get_mut(&mut self, session_id: &str) -> Result<&mut SessionState> {
        self.sessions
            .get_mut(session_id)
            .ok_or_else(|| WardenError::SessionNotFound(session_id.to_string()))
    }

    /// Permanently discards a session. Further operations against the id
    /// are contract violations and fail with `SessionNotFound`.
    pub fn remove(&mut self, session_id: &str) -> Result<()> {
        self.sessions
            .remove(session_id)
            .map(|_| ())
            .ok_or_else(|| WardenError::SessionNotFound(session_id.to_string()))
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn all_sessions(&self) -> impl Iterator<Item = &SessionState> {
        self.sessions.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WorkflowPhase;
    use tempfile::tempdir;

    #[test]
    fn test_empty_store_has_no_sessions() {
        let store = SessionStore::new_in_memory();
        assert!(store.get("abc").is_err());
    }

    #[test]
    fn test_create_then_get() {
        let mut store = SessionStore::new_in_memory();
        store.create("s1");
        assert_eq!(store.get("s1").unwrap().session_id, "s1");
    }

    #[test]
    fn test_create_is_idempotent() {
        let mut store = SessionStore::new_in_memory();
        store.create("s1").set_phase(WorkflowPhase::Intent);
        // Replayed session-created event must not wipe existing state.
        store.create("s1");
        assert_eq!(store.get("s1").unwrap().phase, WorkflowPhase::Intent);
    }

    #[test]
    fn test_remove_discards_permanently() {
        let mut store = SessionStore::new_in_memory();
        store.create("s1");
        store.remove("s1").unwrap();
        assert!(matches!(
            store.get_mut("s1"),
            Err(WardenError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_remove_unknown_is_a_contract_violation() {
        let mut store = SessionStore::new_in_memory();
        assert!(matches!(
            store.remove("never-created"),
            Err(WardenError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_persistence_round_trip() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("sessions.json");

        {
            let mut store = SessionStore::new(&file);
            let state = store.create("s1");
            state.set_phase(WorkflowPhase::Implementation);
            store.save().unwrap();
        }

        let store = SessionStore::load(&file);
        assert_eq!(
            store.get("s1").unwrap().phase,
            WorkflowPhase::Implementation
        );
        assert_eq!(store.get("s1").unwrap().phase_history.len(), 1);
    }

    #[test]
    fn test_load_nonexistent_file_returns_empty_store() {
        let temp = tempdir().unwrap();
        let store = SessionStore::load(&temp.path().join("nope.json"));
        assert_eq!(store.all_sessions().count(), 0);
    }

    #[test]
    fn test_load_empty_file_returns_empty_store() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("empty.json");
        fs::write(&file, "").unwrap();
        let store = SessionStore::load(&file);
        assert_eq!(store.all_sessions().count(), 0);
    }

    #[test]
    fn test_load_corrupt_json_returns_empty_store() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("corrupt.json");
        fs::write(&file, "{invalid json}").unwrap();
        let store = SessionStore::load(&file);
        assert_eq!(store.all_sessions().count(), 0);
    }

    #[test]
    fn test_load_unsupported_version_returns_empty_store() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("v9.json");
        fs::write(&file, r#"{"version":9,"sessions":{}}"#).unwrap();
        let store = SessionStore::load(&file);
        assert_eq!(store.all_sessions().count(), 0);
    }

    #[test]
    fn test_in_memory_save_is_a_noop() {
        let mut store = SessionStore::new_in_memory();
        store.create("s1");
        assert!(store.save().is_ok());
    }
}
