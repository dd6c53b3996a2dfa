//! Persisted engine state: the device's vector clock, the last successful
//! sync time, and the remote document id once one exists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::sync::clock::VectorClock;
use crate::sync::error::PersistError;
use crate::sync::{read_json, write_json_atomic};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    #[serde(default)]
    pub vector_clock: VectorClock,
    #[serde(default)]
    pub last_sync_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub remote_doc_id: Option<String>,
}

/// File-backed [`EngineState`].
#[derive(Debug)]
pub struct StateFile {
    path: PathBuf,
    state: EngineState,
}

impl StateFile {
    /// Opens the state file; a missing file reads as the default state.
    pub fn open(path: PathBuf) -> Result<Self, PersistError> {
        let state = read_json(&path)?.unwrap_or_default();
        Ok(Self { path, state })
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Mutates the state and persists it in one step.
    pub fn update(
        &mut self,
        f: impl FnOnce(&mut EngineState),
    ) -> Result<&EngineState, PersistError> {
        f(&mut self.state);
        write_json_atomic(&self.path, &self.state)?;
        Ok(&self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_reads_default() {
        let temp_dir = TempDir::new().unwrap();
        let state = StateFile::open(temp_dir.path().join("state.json")).unwrap();

        assert_eq!(state.state(), &EngineState::default());
    }

    #[test]
    fn test_update_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");

        let mut state = StateFile::open(path.clone()).unwrap();
        state
            .update(|s| {
                s.vector_clock.bump("ada");
                s.remote_doc_id = Some("doc-1".to_string());
                s.last_sync_time = Some(Utc::now());
            })
            .unwrap();

        let reopened = StateFile::open(path).unwrap();
        assert_eq!(reopened.state().vector_clock.get("ada"), 1);
        assert_eq!(reopened.state().remote_doc_id.as_deref(), Some("doc-1"));
        assert!(reopened.state().last_sync_time.is_some());
    }
}
