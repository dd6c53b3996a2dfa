//! Merge engine: reconciles two full snapshots record by record.
//!
//! Merging a collection is an outer join keyed by record id, with the
//! conflict resolver picking a winner where both sides have a copy.
//! Deletions are NOT distinguished from absence — there are no tombstones,
//! so a record removed on one side while still present on the other is
//! resurrected by the merge. That limitation is deliberate until delete
//! semantics are settled; see DESIGN.md.

use chrono::Utc;
use std::collections::BTreeMap;

use crate::models::{Collection, SyncRecord};
use crate::sync::resolver::{resolve, ConflictStrategy, RecordConflict, Winner};
use crate::sync::snapshot::Snapshot;

/// Result of merging one collection.
#[derive(Debug, Clone)]
pub struct CollectionMerge {
    pub records: Vec<SyncRecord>,
    pub conflicts: Vec<RecordConflict>,
}

/// Result of merging two snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotMerge {
    pub snapshot: Snapshot,
    pub conflicts: Vec<RecordConflict>,
}

/// Merges two versions of one collection.
///
/// Every id present on either side appears exactly once in the output.
/// Output order is by id; downstream consumers re-sort by domain fields.
pub fn merge_collection(
    collection: Collection,
    local: &[SyncRecord],
    remote: &[SyncRecord],
    strategy: ConflictStrategy,
) -> CollectionMerge {
    let mut merged: BTreeMap<String, SyncRecord> = local
        .iter()
        .map(|record| (record.id.clone(), record.clone()))
        .collect();
    let mut conflicts = Vec::new();

    for remote_record in remote {
        match merged.get(&remote_record.id) {
            None => {
                merged.insert(remote_record.id.clone(), remote_record.clone());
            }
            Some(local_record) => {
                // Identical copies are not a conflict.
                if local_record == remote_record {
                    continue;
                }
                let resolution = resolve(local_record, remote_record, strategy);
                if resolution.needs_review {
                    conflicts.push(RecordConflict::new(
                        collection,
                        local_record.clone(),
                        remote_record.clone(),
                    ));
                }
                if resolution.winner == Winner::Remote {
                    merged.insert(remote_record.id.clone(), remote_record.clone());
                }
            }
        }
    }

    CollectionMerge {
        records: merged.into_values().collect(),
        conflicts,
    }
}

/// Merges a local snapshot with a remote one.
///
/// Every known collection is merged with [`merge_collection`], the vector
/// clocks are combined coordinate-wise, and `last_modified` is stamped with
/// the current time. An absent remote (first sync, or the fetch/decrypt
/// degraded) makes this the identity function on the local snapshot.
pub fn merge_snapshots(
    local: &Snapshot,
    remote: Option<&Snapshot>,
    strategy: ConflictStrategy,
) -> SnapshotMerge {
    let remote = match remote {
        Some(remote) => remote,
        None => {
            return SnapshotMerge {
                snapshot: local.clone(),
                conflicts: Vec::new(),
            }
        }
    };

    let mut collections = BTreeMap::new();
    let mut conflicts = Vec::new();

    for collection in Collection::ALL {
        let merge = merge_collection(
            collection,
            local.records(collection),
            remote.records(collection),
            strategy,
        );
        collections.insert(collection, merge.records);
        conflicts.extend(merge.conflicts);
    }

    SnapshotMerge {
        snapshot: Snapshot {
            collections,
            vector_clock: local.vector_clock.merge(&remote.vector_clock),
            last_modified: Utc::now(),
        },
        conflicts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::clock::VectorClock;
    use serde_json::json;

    fn record(id: &str, updated_at: &str, amount: i64) -> SyncRecord {
        serde_json::from_value(json!({
            "id": id,
            "updated_at": updated_at,
            "amount_cents": amount
        }))
        .unwrap()
    }

    fn snapshot(transactions: Vec<SyncRecord>, clock: VectorClock) -> Snapshot {
        let mut snapshot = Snapshot::empty(clock);
        snapshot
            .collections
            .insert(Collection::Transactions, transactions);
        snapshot
    }

    #[test]
    fn test_merge_union_of_ids_exactly_once() {
        let local = vec![
            record("t1", "2026-01-05T10:00:00Z", 10),
            record("t2", "2026-01-05T10:00:00Z", 20),
        ];
        let remote = vec![
            record("t2", "2026-01-05T09:00:00Z", 25),
            record("t3", "2026-01-05T10:00:00Z", 30),
        ];

        let merge = merge_collection(
            Collection::Transactions,
            &local,
            &remote,
            ConflictStrategy::LastWriteWins,
        );

        let mut ids: Vec<&str> = merge.records.iter().map(|r| r.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["t1", "t2", "t3"]);
    }

    #[test]
    fn test_merge_identity_on_empty_side() {
        let records = vec![record("t1", "2026-01-05T10:00:00Z", 10)];

        let merge = merge_collection(
            Collection::Transactions,
            &records,
            &[],
            ConflictStrategy::LastWriteWins,
        );
        assert_eq!(merge.records, records);

        let merge = merge_collection(
            Collection::Transactions,
            &[],
            &records,
            ConflictStrategy::LastWriteWins,
        );
        assert_eq!(merge.records, records);
    }

    #[test]
    fn test_concurrent_edit_newer_remote_wins() {
        let local = vec![record("t1", "2026-01-05T10:00:00Z", 10)];
        let remote = vec![record("t1", "2026-01-05T10:05:00Z", 20)];

        let merge = merge_collection(
            Collection::Transactions,
            &local,
            &remote,
            ConflictStrategy::LastWriteWins,
        );

        assert_eq!(merge.records.len(), 1);
        assert_eq!(merge.records[0].fields["amount_cents"], json!(20));
        assert!(merge.conflicts.is_empty());
    }

    #[test]
    fn test_deleted_record_is_resurrected() {
        // Local deleted t1 after the last sync; the remote copy still has
        // it. Without tombstones the merge cannot tell deletion from
        // absence, so t1 comes back. This pins the documented behavior.
        let local = vec![];
        let remote = vec![record("t1", "2026-01-01T10:00:00Z", 10)];

        let merge = merge_collection(
            Collection::Transactions,
            &local,
            &remote,
            ConflictStrategy::LastWriteWins,
        );
        assert_eq!(merge.records.len(), 1);
        assert_eq!(merge.records[0].id, "t1");
    }

    #[test]
    fn test_manual_strategy_collects_conflicts() {
        let local = vec![record("t1", "2026-01-05T10:00:00Z", 10)];
        let remote = vec![record("t1", "2026-01-05T10:05:00Z", 20)];

        let merge = merge_collection(
            Collection::Transactions,
            &local,
            &remote,
            ConflictStrategy::Manual,
        );

        // Local is the interim winner; the pair is queued for review.
        assert_eq!(merge.records[0].fields["amount_cents"], json!(10));
        assert_eq!(merge.conflicts.len(), 1);
        assert_eq!(merge.conflicts[0].local.fields["amount_cents"], json!(10));
        assert_eq!(merge.conflicts[0].remote.fields["amount_cents"], json!(20));
    }

    #[test]
    fn test_identical_copies_are_not_conflicts() {
        let shared = record("t1", "2026-01-05T10:00:00Z", 10);

        let merge = merge_collection(
            Collection::Transactions,
            std::slice::from_ref(&shared),
            std::slice::from_ref(&shared),
            ConflictStrategy::Manual,
        );
        assert!(merge.conflicts.is_empty());
        assert_eq!(merge.records, vec![shared]);
    }

    #[test]
    fn test_snapshot_merge_combines_clocks() {
        let mut local_clock = VectorClock::new();
        local_clock.bump("ada");
        local_clock.bump("ada");
        let mut remote_clock = VectorClock::new();
        remote_clock.bump("ben");

        let local = snapshot(vec![record("t1", "2026-01-05T10:00:00Z", 10)], local_clock);
        let remote = snapshot(vec![record("t2", "2026-01-05T10:00:00Z", 20)], remote_clock);

        let merge = merge_snapshots(&local, Some(&remote), ConflictStrategy::LastWriteWins);

        assert_eq!(merge.snapshot.vector_clock.get("ada"), 2);
        assert_eq!(merge.snapshot.vector_clock.get("ben"), 1);
        assert_eq!(merge.snapshot.records(Collection::Transactions).len(), 2);
        assert!(merge.snapshot.last_modified >= local.last_modified);
    }

    #[test]
    fn test_snapshot_merge_absent_remote_is_identity() {
        let mut clock = VectorClock::new();
        clock.bump("ada");
        let local = snapshot(vec![record("t1", "2026-01-05T10:00:00Z", 10)], clock);

        let merge = merge_snapshots(&local, None, ConflictStrategy::LastWriteWins);
        assert_eq!(merge.snapshot, local);
        assert!(merge.conflicts.is_empty());
    }
}
