//! Error types for the sync layer.

use crate::remote::RemoteError;

/// Local pending store failures.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("queue error: {0}")]
    Queue(#[from] dompet_engine::Error),

    #[error("pending store lock poisoned")]
    Poisoned,

    #[error("pending store unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by the transaction facade and the sync engine.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("local storage error: {0}")]
    Storage(#[from] StorageError),

    /// The write could not reach the remote store and could not be queued
    #[error(transparent)]
    Remote(RemoteError),

    /// Input rejected locally; nothing was sent or queued
    #[error("invalid transaction: {0}")]
    Invalid(dompet_engine::Error),

    /// The remote store refused the write
    #[error("rejected by remote store: {0}")]
    Rejected(RemoteError),

    #[error("offline buffering unavailable: {0}")]
    OfflineBufferingUnavailable(String),

    #[error("operation {0} not found")]
    NotFound(String),
}

impl From<RemoteError> for SyncError {
    fn from(err: RemoteError) -> Self {
        if err.is_transient() {
            SyncError::Remote(err)
        } else {
            SyncError::Rejected(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
