//! Offline-first synchronization engine.
//!
//! Local mutations are appended to a durable [`queue::OperationQueue`];
//! the [`orchestrator::SyncOrchestrator`] drains the queue, pulls the
//! remote snapshot, merges it with local state record by record, persists
//! the result, and uploads it back — all without a coordinating server.
//! Causality across devices is tracked with a per-actor
//! [`clock::VectorClock`]; conflicting concurrent edits are settled by the
//! [`resolver`].

pub mod clock;
pub mod error;
pub mod merge;
pub mod orchestrator;
pub mod queue;
pub mod resolver;
pub mod snapshot;
pub mod state;

pub use clock::VectorClock;
pub use error::{PersistError, StoreError, SyncError};
pub use merge::{merge_collection, merge_snapshots, CollectionMerge, SnapshotMerge};
pub use orchestrator::{
    Remote, SyncHandle, SyncOrchestrator, SyncPhase, SyncReport, SyncSetup, SyncStatus,
};
pub use queue::{DrainReport, OpStatus, Operation, OperationQueue, Transmit, MAX_RETRIES};
pub use resolver::{resolve, ConflictLog, ConflictStrategy, RecordConflict, Resolution, Winner};
pub use snapshot::Snapshot;
pub use state::{EngineState, StateFile};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;

use crate::models::{Collection, SyncRecord};

/// Local store collaborator consumed by the engine.
///
/// Operations are individually atomic per record; the engine replaces each
/// collection wholesale when persisting a merge.
#[allow(async_fn_in_trait)]
pub trait LocalStore {
    async fn get_all(&self, collection: Collection) -> Result<Vec<SyncRecord>, StoreError>;
    async fn save(&self, collection: Collection, record: &SyncRecord) -> Result<(), StoreError>;
    async fn save_batch(
        &self,
        collection: Collection,
        records: &[SyncRecord],
    ) -> Result<(), StoreError>;
    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError>;
    async fn clear(&self, collection: Collection) -> Result<(), StoreError>;
}

/// Writes a JSON file atomically via temp file + rename.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PersistError::IoError(parent.to_path_buf(), e))?;
    }

    let bytes = serde_json::to_vec_pretty(value).map_err(PersistError::EncodeError)?;
    let temp_path = path.with_extension("json.tmp");

    fs::write(&temp_path, bytes).map_err(|e| PersistError::IoError(temp_path.clone(), e))?;
    fs::rename(&temp_path, path).map_err(|e| PersistError::IoError(path.to_path_buf(), e))?;

    Ok(())
}

/// Reads a JSON file; a missing file reads as `None`.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistError> {
    match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| PersistError::ParseError(path.to_path_buf(), e)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(PersistError::IoError(path.to_path_buf(), e)),
    }
}
