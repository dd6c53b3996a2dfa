//! Full exported state of all synchronized collections.
//!
//! A snapshot is produced by exporting the local store at pull time and by
//! decrypting the remote document at fetch time; the merge engine's output
//! replaces both wholesale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{Collection, SyncRecord};
use crate::sync::clock::VectorClock;

/// Everything one device knows: one record array per collection, the
/// device's vector clock, and when the state was last modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub collections: BTreeMap<Collection, Vec<SyncRecord>>,
    pub vector_clock: VectorClock,
    pub last_modified: DateTime<Utc>,
}

impl Snapshot {
    /// An empty snapshot with every known collection present.
    pub fn empty(vector_clock: VectorClock) -> Self {
        let mut collections = BTreeMap::new();
        for collection in Collection::ALL {
            collections.insert(collection, Vec::new());
        }
        Self {
            collections,
            vector_clock,
            last_modified: Utc::now(),
        }
    }

    /// Records for one collection; absent collections read as empty.
    pub fn records(&self, collection: Collection) -> &[SyncRecord] {
        self.collections
            .get(&collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total record count across all collections.
    pub fn len(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str) -> SyncRecord {
        serde_json::from_value(json!({ "id": id, "updated_at": "2026-01-05T10:00:00Z" }))
            .unwrap()
    }

    #[test]
    fn test_empty_snapshot_has_all_collections() {
        let snapshot = Snapshot::empty(VectorClock::new());
        for collection in Collection::ALL {
            assert!(snapshot.records(collection).is_empty());
        }
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_len_counts_all_collections() {
        let mut snapshot = Snapshot::empty(VectorClock::new());
        snapshot
            .collections
            .get_mut(&Collection::Transactions)
            .unwrap()
            .push(record("t1"));
        snapshot
            .collections
            .get_mut(&Collection::Goals)
            .unwrap()
            .push(record("g1"));

        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot.is_empty());
    }

    #[test]
    fn test_snapshot_serde_roundtrip() {
        let mut snapshot = Snapshot::empty(VectorClock::new());
        snapshot.vector_clock.bump("ada");
        snapshot
            .collections
            .get_mut(&Collection::Transactions)
            .unwrap()
            .push(record("t1"));

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, back);
    }
}
