//! Durable queue of pending local mutations awaiting transmission.
//!
//! Queue state is persisted on every transition, so a crash mid-drain
//! resumes from the last persisted state and re-attempts anything not yet
//! completed. Delivery is therefore at-least-once; transmission stays safe
//! to repeat because the remote transport replaces the whole document
//! rather than applying individual operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::sync::clock::VectorClock;
use crate::sync::error::{PersistError, SyncError};
use crate::sync::{read_json, write_json_atomic};

/// Transmission attempts allowed before an operation is dropped.
pub const MAX_RETRIES: u32 = 3;

/// Lifecycle of a queued operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpStatus {
    Pending,
    Completed,
    Failed,
}

/// One queued, not-yet-transmitted local mutation.
///
/// The payload is opaque to the engine. The clock snapshot is taken when
/// the operation is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub actor_id: String,
    pub payload: serde_json::Value,
    pub clock: VectorClock,
    pub status: OpStatus,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Operation {
    pub fn new(
        actor_id: impl Into<String>,
        payload: serde_json::Value,
        clock: VectorClock,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            actor_id: actor_id.into(),
            payload,
            clock,
            status: OpStatus::Pending,
            retry_count: 0,
            last_error: None,
        }
    }
}

/// Transmits one operation to the remote side.
///
/// The orchestrator's transmitter uploads the current local snapshot
/// (whole-document replace); tests substitute failing or counting stubs.
#[allow(async_fn_in_trait)]
pub trait Transmit {
    async fn transmit(&mut self, op: &Operation) -> Result<(), SyncError>;
}

/// Summary of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Operations transmitted and removed.
    pub sent: usize,
    /// Operations dropped after exceeding the retry bound.
    pub dropped: usize,
    /// True when another drain was already in progress and this call was a
    /// no-op.
    pub busy: bool,
}

/// Durable, ordered log of pending operations.
#[derive(Debug)]
pub struct OperationQueue {
    path: PathBuf,
    ops: Vec<Operation>,
    draining: bool,
}

impl OperationQueue {
    /// Opens the queue, loading any operations persisted by a previous run.
    pub fn open(path: PathBuf) -> Result<Self, PersistError> {
        let ops = read_json(&path)?.unwrap_or_default();
        Ok(Self {
            path,
            ops,
            draining: false,
        })
    }

    /// Appends a pending operation and persists the queue.
    pub fn enqueue(&mut self, op: Operation) -> Result<(), PersistError> {
        tracing::debug!("Queued operation {} from {}", op.id, op.actor_id);
        self.ops.push(op);
        self.persist()
    }

    /// Operations still awaiting transmission, in insertion order.
    pub fn operations(&self) -> &[Operation] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Attempts to transmit every pending operation, in insertion order.
    ///
    /// Success removes the operation; failure increments its retry count
    /// and leaves it for the next drain, until the count exceeds
    /// [`MAX_RETRIES`] and the operation is dropped with a warning. Each
    /// transition is persisted before moving on.
    ///
    /// Drain is non-reentrant: a call while another drain is in progress
    /// reports `busy` and does nothing.
    pub async fn drain<X: Transmit>(&mut self, tx: &mut X) -> Result<DrainReport, PersistError> {
        if !self.begin_drain() {
            tracing::debug!("Drain already in progress, skipping");
            return Ok(DrainReport {
                busy: true,
                ..DrainReport::default()
            });
        }
        let result = self.drain_inner(tx).await;
        self.draining = false;
        result
    }

    /// Claims the drain guard; false when a drain is already running.
    fn begin_drain(&mut self) -> bool {
        if self.draining {
            return false;
        }
        self.draining = true;
        true
    }

    async fn drain_inner<X: Transmit>(&mut self, tx: &mut X) -> Result<DrainReport, PersistError> {
        let mut report = DrainReport::default();
        let mut index = 0;

        while index < self.ops.len() {
            match tx.transmit(&self.ops[index]).await {
                Ok(()) => {
                    self.ops[index].status = OpStatus::Completed;
                    let op = self.ops.remove(index);
                    self.persist()?;
                    tracing::debug!("Transmitted operation {}", op.id);
                    report.sent += 1;
                }
                Err(e) => {
                    let op = &mut self.ops[index];
                    op.status = OpStatus::Failed;
                    op.retry_count += 1;
                    op.last_error = Some(e.to_string());

                    if op.retry_count > MAX_RETRIES {
                        let op = self.ops.remove(index);
                        self.persist()?;
                        tracing::warn!(
                            "Dropping operation {} after {} failed attempts: {}",
                            op.id,
                            op.retry_count,
                            op.last_error.as_deref().unwrap_or("unknown error")
                        );
                        report.dropped += 1;
                    } else {
                        self.persist()?;
                        index += 1;
                    }
                }
            }
        }

        Ok(report)
    }

    fn persist(&self) -> Result<(), PersistError> {
        write_json_atomic(&self.path, &self.ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_queue() -> (OperationQueue, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let queue = OperationQueue::open(temp_dir.path().join("queue.json")).unwrap();
        (queue, temp_dir)
    }

    fn op(actor: &str) -> Operation {
        Operation::new(actor, json!({ "op": "upsert" }), VectorClock::new())
    }

    /// Transmitter that fails the first `failures` calls, then succeeds.
    struct FlakyTransmit {
        failures: usize,
        attempts: usize,
    }

    impl Transmit for FlakyTransmit {
        async fn transmit(&mut self, _op: &Operation) -> Result<(), SyncError> {
            self.attempts += 1;
            if self.attempts <= self.failures {
                Err(SyncError::Transport(TransportError::Http(
                    "connection refused".to_string(),
                )))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_enqueue_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("queue.json");

        let mut queue = OperationQueue::open(path.clone()).unwrap();
        queue.enqueue(op("ada")).unwrap();
        queue.enqueue(op("ada")).unwrap();
        assert_eq!(queue.len(), 2);

        let reopened = OperationQueue::open(path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.operations()[0].status, OpStatus::Pending);
    }

    #[tokio::test]
    async fn test_drain_success_empties_queue() {
        let (mut queue, _temp) = test_queue();
        queue.enqueue(op("ada")).unwrap();
        queue.enqueue(op("ada")).unwrap();

        let mut tx = FlakyTransmit {
            failures: 0,
            attempts: 0,
        };
        let report = queue.drain(&mut tx).await.unwrap();

        assert_eq!(report.sent, 2);
        assert_eq!(report.dropped, 0);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_failed_op_stays_for_next_drain() {
        let (mut queue, _temp) = test_queue();
        queue.enqueue(op("ada")).unwrap();

        let mut tx = FlakyTransmit {
            failures: 1,
            attempts: 0,
        };
        let report = queue.drain(&mut tx).await.unwrap();
        assert_eq!(report.sent, 0);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.operations()[0].retry_count, 1);
        assert!(queue.operations()[0].last_error.is_some());

        // Second drain succeeds.
        let report = queue.drain(&mut tx).await.unwrap();
        assert_eq!(report.sent, 1);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_op_dropped_after_four_failures() {
        let (mut queue, _temp) = test_queue();
        queue.enqueue(op("ada")).unwrap();

        let mut tx = FlakyTransmit {
            failures: usize::MAX,
            attempts: 0,
        };

        // Drains 1-3: retry_count reaches 3, operation still queued.
        for expected_retries in 1..=3u32 {
            let report = queue.drain(&mut tx).await.unwrap();
            assert_eq!(report.dropped, 0);
            assert_eq!(queue.operations()[0].retry_count, expected_retries);
        }

        // Fourth failure pushes retry_count past the bound; dropped.
        let report = queue.drain(&mut tx).await.unwrap();
        assert_eq!(report.dropped, 1);
        assert!(queue.is_empty());
        assert_eq!(tx.attempts, 4);

        // A later drain has nothing to retry.
        let report = queue.drain(&mut tx).await.unwrap();
        assert_eq!(report, DrainReport::default());
        assert_eq!(tx.attempts, 4);
    }

    #[tokio::test]
    async fn test_drain_is_non_reentrant() {
        let (mut queue, _temp) = test_queue();
        queue.enqueue(op("ada")).unwrap();

        assert!(queue.begin_drain());
        let mut tx = FlakyTransmit {
            failures: 0,
            attempts: 0,
        };
        let report = queue.drain(&mut tx).await.unwrap();
        assert!(report.busy);
        assert_eq!(queue.len(), 1);
        assert_eq!(tx.attempts, 0);
    }

    #[tokio::test]
    async fn test_drain_preserves_insertion_order() {
        let (mut queue, _temp) = test_queue();
        let first = op("ada");
        let first_id = first.id;
        queue.enqueue(first).unwrap();

        // First op fails once, second op is attempted after it.
        let mut tx = FlakyTransmit {
            failures: 1,
            attempts: 0,
        };
        queue.enqueue(op("ada")).unwrap();
        let report = queue.drain(&mut tx).await.unwrap();

        assert_eq!(report.sent, 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.operations()[0].id, first_id);
    }
}
