//! Hearthbook Core Library
//!
//! Local-first household ledger: records are edited independently, often
//! offline, on each family member's device and reconciled through a shared
//! encrypted document in a remote blob store.

pub mod config;
pub mod crypto;
pub mod db;
pub mod models;
pub mod sync;
pub mod transport;

pub use config::{Config, ConfigError};
pub use crypto::{CryptoError, SecretBox};
pub use db::{init_db, RecordRepository};
pub use models::{Budget, Collection, Goal, SyncRecord, Transaction};
pub use sync::{
    ConflictStrategy, LocalStore, Operation, OperationQueue, Remote, Snapshot, SyncError,
    SyncHandle, SyncOrchestrator, SyncReport, SyncSetup, SyncStatus, VectorClock,
};
pub use transport::{DocumentEnvelope, HttpTransport, RemoteTransport, TransportError};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
