//! Sync engine error types.

use std::io;
use std::path::PathBuf;

use crate::transport::TransportError;

/// Errors from the durable files the engine owns (operation queue,
/// conflict log, engine state).
#[derive(Debug)]
pub enum PersistError {
    /// I/O error reading or writing a file.
    IoError(PathBuf, io::Error),
    /// Error parsing a persisted JSON file.
    ParseError(PathBuf, serde_json::Error),
    /// Error serializing state for persistence.
    EncodeError(serde_json::Error),
}

impl std::fmt::Display for PersistError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistError::IoError(path, e) => {
                write!(f, "I/O error for {}: {}", path.display(), e)
            }
            PersistError::ParseError(path, e) => {
                write!(f, "Failed to parse {}: {}", path.display(), e)
            }
            PersistError::EncodeError(e) => write!(f, "Failed to encode state: {}", e),
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistError::IoError(_, e) => Some(e),
            PersistError::ParseError(_, e) => Some(e),
            PersistError::EncodeError(e) => Some(e),
        }
    }
}

/// Errors from the local store collaborator.
#[derive(Debug)]
pub enum StoreError {
    /// Database error.
    Database(sqlx::Error),
    /// Record body could not be encoded or decoded.
    Serialize(serde_json::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "Store error: {}", e),
            StoreError::Serialize(e) => write!(f, "Record encoding error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Database(e) => Some(e),
            StoreError::Serialize(e) => Some(e),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialize(e)
    }
}

/// Errors that can occur while driving a sync cycle.
#[derive(Debug)]
pub enum SyncError {
    /// No remote is configured for an operation that requires one.
    NotConfigured,
    /// Remote transport failure.
    Transport(TransportError),
    /// A network call exceeded its timeout.
    Timeout(String),
    /// Local store failure. Losing a local write is a correctness issue,
    /// so this is propagated rather than swallowed.
    Store(StoreError),
    /// Engine file (queue, conflict log, state) failure.
    Persist(PersistError),
    /// Snapshot could not be encrypted for upload.
    Encrypt(String),
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::NotConfigured => write!(
                f,
                "Sync not configured. Add remote_url and shared_secret to config."
            ),
            SyncError::Transport(e) => write!(f, "Transport error: {}", e),
            SyncError::Timeout(what) => write!(f, "Timed out during {}", what),
            SyncError::Store(e) => write!(f, "{}", e),
            SyncError::Persist(e) => write!(f, "{}", e),
            SyncError::Encrypt(e) => write!(f, "Encryption error: {}", e),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Transport(e) => Some(e),
            SyncError::Store(e) => Some(e),
            SyncError::Persist(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for SyncError {
    fn from(e: TransportError) -> Self {
        SyncError::Transport(e)
    }
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        SyncError::Store(e)
    }
}

impl From<PersistError> for SyncError {
    fn from(e: PersistError) -> Self {
        SyncError::Persist(e)
    }
}
