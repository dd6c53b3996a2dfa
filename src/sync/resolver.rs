//! Per-record conflict resolution.
//!
//! The record is the atomic unit of conflict: no field-level merging is
//! attempted. `resolve` is a pure function; when the `manual` strategy
//! flags a pair for review, the merge engine collects it and the
//! orchestrator appends it to the durable [`ConflictLog`] for the host
//! application to settle out of band.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::models::{Collection, SyncRecord};
use crate::sync::error::PersistError;
use crate::sync::{read_json, write_json_atomic};

/// How a local/remote pair for the same record id is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictStrategy {
    /// Higher modification timestamp wins; exact ties keep local.
    #[default]
    LastWriteWins,
    RemoteWins,
    LocalWins,
    /// Local wins for now, but the pair is logged for manual review.
    Manual,
}

/// Which side of a conflicting pair was (or should be) kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Local,
    Remote,
}

/// Outcome of resolving one local/remote pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub winner: Winner,
    /// True when the pair should be queued for manual review.
    pub needs_review: bool,
}

/// Picks a winner between two versions of the same record.
///
/// Ties under last-write-wins deterministically favor local so repeated
/// merges cannot oscillate between devices.
pub fn resolve(
    local: &SyncRecord,
    remote: &SyncRecord,
    strategy: ConflictStrategy,
) -> Resolution {
    match strategy {
        ConflictStrategy::LastWriteWins => {
            let winner = if remote.modified_at() > local.modified_at() {
                Winner::Remote
            } else {
                Winner::Local
            };
            Resolution {
                winner,
                needs_review: false,
            }
        }
        ConflictStrategy::RemoteWins => Resolution {
            winner: Winner::Remote,
            needs_review: false,
        },
        ConflictStrategy::LocalWins => Resolution {
            winner: Winner::Local,
            needs_review: false,
        },
        ConflictStrategy::Manual => Resolution {
            winner: Winner::Local,
            needs_review: true,
        },
    }
}

/// A conflicting pair awaiting manual resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordConflict {
    pub id: Uuid,
    pub collection: Collection,
    pub local: SyncRecord,
    pub remote: SyncRecord,
    pub detected_at: DateTime<Utc>,
}

impl RecordConflict {
    pub fn new(collection: Collection, local: SyncRecord, remote: SyncRecord) -> Self {
        Self {
            id: Uuid::new_v4(),
            collection,
            local,
            remote,
            detected_at: Utc::now(),
        }
    }
}

/// Durable list of conflicts deferred for out-of-band resolution.
///
/// Persisted as a JSON file in the data directory; the host application
/// enumerates entries and resolves them one at a time.
#[derive(Debug)]
pub struct ConflictLog {
    path: PathBuf,
    entries: Vec<RecordConflict>,
}

impl ConflictLog {
    /// Opens the log, loading any persisted entries.
    pub fn open(path: PathBuf) -> Result<Self, PersistError> {
        let entries = read_json(&path)?.unwrap_or_default();
        Ok(Self { path, entries })
    }

    /// Appends conflicts and persists the log.
    pub fn append(&mut self, conflicts: Vec<RecordConflict>) -> Result<(), PersistError> {
        if conflicts.is_empty() {
            return Ok(());
        }
        for conflict in &conflicts {
            tracing::info!(
                "Conflict on {} record {} queued for manual review",
                conflict.collection,
                conflict.local.id
            );
        }
        self.entries.extend(conflicts);
        write_json_atomic(&self.path, &self.entries)
    }

    /// All unresolved conflicts, oldest first.
    pub fn list(&self) -> &[RecordConflict] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Settles one conflict, removing it from the log and returning the
    /// record the host chose to keep. Returns `Ok(None)` for unknown ids.
    pub fn settle(
        &mut self,
        id: Uuid,
        keep: Winner,
    ) -> Result<Option<(Collection, SyncRecord)>, PersistError> {
        let index = match self.entries.iter().position(|c| c.id == id) {
            Some(index) => index,
            None => return Ok(None),
        };
        let conflict = self.entries.remove(index);
        write_json_atomic(&self.path, &self.entries)?;

        let record = match keep {
            Winner::Local => conflict.local,
            Winner::Remote => conflict.remote,
        };
        Ok(Some((conflict.collection, record)))
    }
}
