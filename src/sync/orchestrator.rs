//! Sync orchestrator: drives the end-to-end cycle.
//!
//! One cycle runs drain queue → export local → pull remote → merge →
//! persist locally → upload → record sync time. At most one cycle runs at
//! a time; triggers (timer, connectivity, visibility, manual) funnel
//! through a capacity-one coalescing channel so an excess trigger is
//! dropped rather than queued.
//!
//! Collaborators are injected once at construction and never looked up
//! through ambient state.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::time::{timeout, MissedTickBehavior};
use uuid::Uuid;

use crate::crypto::SecretBox;
use crate::models::Collection;
use crate::sync::error::{PersistError, SyncError};
use crate::sync::merge::merge_snapshots;
use crate::sync::queue::{DrainReport, Operation, OperationQueue, Transmit};
use crate::sync::resolver::{ConflictLog, ConflictStrategy, RecordConflict, Winner};
use crate::sync::snapshot::Snapshot;
use crate::sync::state::StateFile;
use crate::sync::LocalStore;
use crate::transport::{DocumentEnvelope, RemoteTransport};

/// Timeout applied to every remote transport call.
const NETWORK_TIMEOUT: Duration = Duration::from_secs(30);

/// Default periodic trigger interval.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);

/// The remote side of sync: a transport plus the household secret.
///
/// Without a secret the snapshot travels in plaintext.
pub struct Remote<T> {
    pub transport: T,
    pub secret: Option<SecretBox>,
}

impl<T> Remote<T> {
    pub fn new(transport: T, secret: Option<SecretBox>) -> Self {
        Self { transport, secret }
    }
}

/// Construction parameters for the orchestrator.
pub struct SyncSetup {
    /// This device's actor identity; owns one vector clock counter.
    pub actor_id: String,
    /// Household identity, shared by all family members.
    pub group_id: String,
    /// Remote document id, if already known (joining an existing share).
    pub remote_doc_id: Option<String>,
    /// Directory for the engine's durable files.
    pub data_dir: PathBuf,
    pub strategy: ConflictStrategy,
    pub interval: Duration,
}

/// Orchestrator state machine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Syncing,
    Error,
}

/// Status published to the host application on every transition.
#[derive(Debug, Clone)]
pub struct SyncStatus {
    pub phase: SyncPhase,
    pub online: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Outcome of one `sync_now` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncReport {
    Completed {
        drained: DrainReport,
        /// True when a usable remote snapshot was fetched and merged.
        remote_seen: bool,
        /// Conflicts queued for manual review this cycle.
        conflicts: usize,
        /// True when the merged snapshot was uploaded.
        uploaded: bool,
    },
    /// Offline: new cycles are suppressed until connectivity returns.
    SkippedOffline,
    /// Another cycle is already running; this call was dropped.
    AlreadySyncing,
}

/// What woke the orchestrator up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Timer,
    Manual,
    Online,
    Visible,
}

/// Cloneable handle the host application uses to talk to a running
/// orchestrator.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    trigger_tx: mpsc::Sender<Trigger>,
    online_tx: Arc<watch::Sender<bool>>,
    status_rx: watch::Receiver<SyncStatus>,
}

impl SyncHandle {
    /// Requests a sync cycle. Dropped (not queued) when one request is
    /// already pending.
    pub fn request_sync(&self) {
        if self.trigger_tx.try_send(Trigger::Manual).is_err() {
            tracing::debug!("Sync request dropped, one already pending");
        }
    }

    /// The host became visible/foreground again.
    pub fn notify_visible(&self) {
        let _ = self.trigger_tx.try_send(Trigger::Visible);
    }

    /// Connectivity changed. Coming back online requests a cycle.
    pub fn set_online(&self, online: bool) {
        let was_online = self.online_tx.send_replace(online);
        if online && !was_online {
            let _ = self.trigger_tx.try_send(Trigger::Online);
        }
    }

    /// Current status snapshot.
    pub fn status(&self) -> SyncStatus {
        self.status_rx.borrow().clone()
    }

    /// Subscribe to status transitions.
    pub fn watch_status(&self) -> watch::Receiver<SyncStatus> {
        self.status_rx.clone()
    }
}

/// Drives the sync cycle against injected collaborators.
pub struct SyncOrchestrator<S, T> {
    actor_id: String,
    group_id: String,
    strategy: ConflictStrategy,
    interval: Duration,
    store: S,
    remote: Option<Remote<T>>,
    queue: OperationQueue,
    conflicts: ConflictLog,
    state: StateFile,
    syncing: AtomicBool,
    status_tx: watch::Sender<SyncStatus>,
    trigger_tx: mpsc::Sender<Trigger>,
    trigger_rx: mpsc::Receiver<Trigger>,
    online_tx: Arc<watch::Sender<bool>>,
    online_rx: watch::Receiver<bool>,
}

impl<S: LocalStore, T: RemoteTransport> SyncOrchestrator<S, T> {
    /// Builds the orchestrator, loading the queue, conflict log and engine
    /// state persisted by previous runs.
    pub fn new(setup: SyncSetup, store: S, remote: Option<Remote<T>>) -> Result<Self, SyncError> {
        std::fs::create_dir_all(&setup.data_dir)
            .map_err(|e| PersistError::IoError(setup.data_dir.clone(), e))?;

        let queue = OperationQueue::open(setup.data_dir.join("queue.json"))?;
        let conflicts = ConflictLog::open(setup.data_dir.join("conflicts.json"))?;
        let mut state = StateFile::open(setup.data_dir.join("sync_state.json"))?;

        // A doc id from setup seeds the state file; a previously adopted
        // one wins.
        if state.state().remote_doc_id.is_none() {
            if let Some(doc_id) = setup.remote_doc_id {
                state.update(|s| s.remote_doc_id = Some(doc_id))?;
            }
        }

        let (status_tx, _) = watch::channel(SyncStatus {
            phase: SyncPhase::Idle,
            online: true,
            last_sync: state.state().last_sync_time,
            last_error: None,
        });
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (online_tx, online_rx) = watch::channel(true);

        Ok(Self {
            actor_id: setup.actor_id,
            group_id: setup.group_id,
            strategy: setup.strategy,
            interval: setup.interval,
            store,
            remote,
            queue,
            conflicts,
            state,
            syncing: AtomicBool::new(false),
            status_tx,
            trigger_tx,
            trigger_rx,
            online_tx: Arc::new(online_tx),
            online_rx,
        })
    }

    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    /// The injected local store, for host-application reads and writes.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// The remote document id, once one exists.
    pub fn remote_doc_id(&self) -> Option<&str> {
        self.state.state().remote_doc_id.as_deref()
    }

    /// Adopts a remote document created by another family member.
    pub fn adopt_remote_document(&mut self, doc_id: String) -> Result<(), SyncError> {
        self.state.update(|s| s.remote_doc_id = Some(doc_id))?;
        Ok(())
    }

    /// Operations still awaiting transmission.
    pub fn pending_operations(&self) -> usize {
        self.queue.len()
    }

    /// Conflicts awaiting manual resolution.
    pub fn conflicts(&self) -> &[RecordConflict] {
        self.conflicts.list()
    }

    /// Handle for the host application.
    pub fn handle(&self) -> SyncHandle {
        SyncHandle {
            trigger_tx: self.trigger_tx.clone(),
            online_tx: self.online_tx.clone(),
            status_rx: self.status_tx.subscribe(),
        }
    }

    /// Current status snapshot.
    pub fn status(&self) -> SyncStatus {
        self.status_tx.borrow().clone()
    }

    /// Records a local mutation: bumps this actor's clock counter, appends
    /// the operation to the durable queue, and — when online with a remote
    /// document configured — attempts immediate transmission.
    ///
    /// Queue persistence failures propagate: losing a local write is a
    /// correctness issue.
    pub async fn queue_operation(&mut self, payload: serde_json::Value) -> Result<(), SyncError> {
        let actor_id = self.actor_id.clone();
        let clock = self
            .state
            .update(|s| {
                s.vector_clock.bump(&actor_id);
            })?
            .vector_clock
            .clone();

        let op = Operation::new(actor_id, payload, clock);
        self.queue.enqueue(op)?;

        if !*self.online_rx.borrow() {
            return Ok(());
        }
        let doc_id = match self.state.state().remote_doc_id.clone() {
            Some(doc_id) => doc_id,
            None => return Ok(()),
        };
        if let Some(remote) = &self.remote {
            let local = export_local(&self.store, &self.state).await?;
            let envelope = seal_snapshot(remote, &local)?;
            let mut push = SnapshotPush {
                transport: &remote.transport,
                doc_id: &doc_id,
                envelope,
            };
            self.queue.drain(&mut push).await?;
        }
        Ok(())
    }

    /// Runs one full sync cycle, unless offline or one is already running.
    pub async fn sync_now(&mut self) -> Result<SyncReport, SyncError> {
        if !*self.online_rx.borrow() {
            tracing::debug!("Offline, skipping sync cycle");
            return Ok(SyncReport::SkippedOffline);
        }
        if self.syncing.swap(true, Ordering::SeqCst) {
            tracing::debug!("Sync already in progress, ignoring");
            return Ok(SyncReport::AlreadySyncing);
        }

        self.publish_status(SyncPhase::Syncing, None);
        let result = self.run_cycle().await;
        self.syncing.store(false, Ordering::SeqCst);

        match &result {
            Ok(report) => {
                tracing::debug!("Sync cycle finished: {:?}", report);
                self.publish_status(SyncPhase::Idle, None);
            }
            Err(e) => {
                tracing::warn!("Sync cycle failed: {}", e);
                self.publish_status(SyncPhase::Error, Some(e.to_string()));
            }
        }
        result
    }

    /// Runs the trigger loop: periodic timer plus coalesced external
    /// triggers. Never returns; drive it under `select!` with a shutdown
    /// signal.
    pub async fn run(&mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let trigger = tokio::select! {
                _ = ticker.tick() => Trigger::Timer,
                Some(trigger) = self.trigger_rx.recv() => trigger,
                result = self.online_rx.changed() => {
                    if result.is_err() {
                        continue;
                    }
                    let online = *self.online_rx.borrow_and_update();
                    tracing::info!("Connectivity changed: {}", if online { "online" } else { "offline" });
                    self.publish_current_status();
                    continue;
                }
            };

            if !*self.online_rx.borrow() {
                tracing::debug!("Offline, ignoring {:?} trigger", trigger);
                continue;
            }

            tracing::debug!("Sync triggered by {:?}", trigger);
            if let Err(e) = self.sync_now().await {
                tracing::warn!("Triggered sync failed: {}", e);
            }
        }
    }

    /// Settles a logged conflict: re-saves the chosen record and queues an
    /// operation so the choice propagates. `Ok(false)` for unknown ids.
    pub async fn resolve_conflict(&mut self, id: Uuid, keep: Winner) -> Result<bool, SyncError> {
        let (collection, record) = match self.conflicts.settle(id, keep)? {
            Some(settled) => settled,
            None => return Ok(false),
        };
        self.store.save(collection, &record).await?;
        self.queue_operation(serde_json::json!({
            "op": "resolve-conflict",
            "collection": collection.as_str(),
            "record_id": record.id,
        }))
        .await?;
        Ok(true)
    }

    async fn run_cycle(&mut self) -> Result<SyncReport, SyncError> {
        let remote_doc_id = self.state.state().remote_doc_id.clone();

        // 1. Drain pending operations against the remote document.
        let drained = match (&self.remote, remote_doc_id.as_deref()) {
            (Some(remote), Some(doc_id)) if !self.queue.is_empty() => {
                let local = export_local(&self.store, &self.state).await?;
                let envelope = seal_snapshot(remote, &local)?;
                let mut push = SnapshotPush {
                    transport: &remote.transport,
                    doc_id,
                    envelope,
                };
                self.queue.drain(&mut push).await?
            }
            _ => DrainReport::default(),
        };

        // 2. Export the local snapshot.
        let local = export_local(&self.store, &self.state).await?;

        // 3. Fetch the remote snapshot; failures degrade to "no remote".
        let remote_snapshot = match (&self.remote, remote_doc_id.as_deref()) {
            (Some(remote), Some(doc_id)) => fetch_remote(remote, doc_id).await,
            _ => None,
        };
        let remote_seen = remote_snapshot.is_some();

        // 4. Merge.
        let merge = merge_snapshots(&local, remote_snapshot.as_ref(), self.strategy);
        let conflict_count = merge.conflicts.len();
        self.conflicts.append(merge.conflicts)?;

        // 5. Persist the merged snapshot wholesale.
        for collection in Collection::ALL {
            self.store.clear(collection).await?;
            self.store
                .save_batch(collection, merge.snapshot.records(collection))
                .await?;
        }

        // 6. Upload the merged snapshot, creating the document on first
        // push.
        let mut uploaded = false;
        let mut created_doc_id = None;
        if let Some(remote) = &self.remote {
            let envelope = seal_snapshot(remote, &merge.snapshot)?;
            match remote_doc_id.as_deref() {
                Some(doc_id) => {
                    timeout(NETWORK_TIMEOUT, remote.transport.replace(doc_id, &envelope))
                        .await
                        .map_err(|_| SyncError::Timeout("snapshot upload".to_string()))??;
                }
                None => {
                    let doc_id = timeout(NETWORK_TIMEOUT, remote.transport.create(&envelope))
                        .await
                        .map_err(|_| SyncError::Timeout("document creation".to_string()))??;
                    tracing::info!("Created remote document {}", doc_id);
                    created_doc_id = Some(doc_id);
                }
            }
            uploaded = true;
        }

        // 7. Record the sync and the merged clock.
        self.state.update(|s| {
            s.vector_clock = merge.snapshot.vector_clock.clone();
            s.last_sync_time = Some(Utc::now());
            if created_doc_id.is_some() {
                s.remote_doc_id = created_doc_id;
            }
        })?;

        Ok(SyncReport::Completed {
            drained,
            remote_seen,
            conflicts: conflict_count,
            uploaded,
        })
    }

    fn publish_status(&self, phase: SyncPhase, last_error: Option<String>) {
        let _ = self.status_tx.send(SyncStatus {
            phase,
            online: *self.online_rx.borrow(),
            last_sync: self.state.state().last_sync_time,
            last_error,
        });
    }

    fn publish_current_status(&self) {
        let current = self.status_tx.borrow().clone();
        let _ = self.status_tx.send(SyncStatus {
            online: *self.online_rx.borrow(),
            ..current
        });
    }
}

/// Queue transmitter that replaces the remote document with the sealed
/// local snapshot. Redelivery is harmless because the replace is
/// idempotent.
struct SnapshotPush<'a, T: RemoteTransport> {
    transport: &'a T,
    doc_id: &'a str,
    envelope: DocumentEnvelope,
}

impl<T: RemoteTransport> Transmit for SnapshotPush<'_, T> {
    async fn transmit(&mut self, _op: &Operation) -> Result<(), SyncError> {
        timeout(NETWORK_TIMEOUT, self.transport.replace(self.doc_id, &self.envelope))
            .await
            .map_err(|_| SyncError::Timeout("queue drain upload".to_string()))?
            .map_err(SyncError::from)
    }
}

/// Exports the full local state: every collection plus the persisted clock.
async fn export_local<S: LocalStore>(
    store: &S,
    state: &StateFile,
) -> Result<Snapshot, SyncError> {
    let mut collections = BTreeMap::new();
    for collection in Collection::ALL {
        collections.insert(collection, store.get_all(collection).await?);
    }
    Ok(Snapshot {
        collections,
        vector_clock: state.state().vector_clock.clone(),
        last_modified: Utc::now(),
    })
}

fn seal_snapshot<T>(remote: &Remote<T>, snapshot: &Snapshot) -> Result<DocumentEnvelope, SyncError> {
    match &remote.secret {
        Some(secret) => {
            let opaque = secret
                .encrypt(snapshot)
                .map_err(|e| SyncError::Encrypt(e.to_string()))?;
            Ok(DocumentEnvelope::sealed(opaque))
        }
        None => {
            let data = serde_json::to_value(snapshot)
                .map_err(|e| SyncError::Encrypt(e.to_string()))?;
            Ok(DocumentEnvelope::plain(data))
        }
    }
}

/// Fetches and opens the remote snapshot. Every failure mode — timeout,
/// transport error, missing document, undecryptable or unparseable payload
/// — degrades to `None` so the cycle proceeds as a first sync.
async fn fetch_remote<T: RemoteTransport>(remote: &Remote<T>, doc_id: &str) -> Option<Snapshot> {
    let envelope = match timeout(NETWORK_TIMEOUT, remote.transport.read(doc_id)).await {
        Err(_) => {
            tracing::warn!("Remote fetch timed out, continuing without remote snapshot");
            return None;
        }
        Ok(Err(e)) => {
            tracing::warn!("Remote fetch failed ({}), continuing without remote snapshot", e);
            return None;
        }
        Ok(Ok(None)) => {
            tracing::debug!("Remote document {} does not exist yet", doc_id);
            return None;
        }
        Ok(Ok(Some(envelope))) => envelope,
    };

    let body = envelope.record;
    let snapshot = if body.encrypted {
        let opaque = body.data.as_str()?;
        match &remote.secret {
            Some(secret) => secret.decrypt(opaque),
            None => {
                tracing::warn!("Remote snapshot is encrypted but no shared secret is configured");
                None
            }
        }
    } else {
        serde_json::from_value(body.data).ok()
    };

    if snapshot.is_none() {
        tracing::warn!("Could not read remote snapshot, treating it as absent");
    }
    snapshot
}
