//! Local pending store.
//!
//! Durable, per-user queue of writes waiting for the remote store. Every
//! implementation applies the same queue rules from `dompet_engine`; they
//! differ only in where the operations live.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::StorageError;
use async_trait::async_trait;
use dompet_engine::{EnqueueOutcome, PendingOperation};

pub type StoreResult<T> = std::result::Result<T, StorageError>;

#[async_trait]
pub trait PendingStore: Send + Sync {
    /// Append an operation, cancelling writes it supersedes.
    async fn enqueue(&self, op: PendingOperation) -> StoreResult<EnqueueOutcome>;

    /// Every queued operation of the user, oldest first, including failed ones.
    async fn list_pending(&self, user_id: &str) -> StoreResult<Vec<PendingOperation>>;

    /// Remove an acknowledged operation. Returns whether it was still queued.
    async fn remove(&self, op_id: &str) -> StoreResult<bool>;

    /// Operations still waiting to sync (failed ones excluded).
    async fn count(&self, user_id: &str) -> StoreResult<usize>;

    /// Drop every operation of the user. Irreversible.
    async fn clear(&self, user_id: &str) -> StoreResult<usize>;

    /// `pending -> syncing`; `false` if the operation is gone.
    async fn begin(&self, op_id: &str) -> StoreResult<bool>;

    /// `syncing -> pending` after a transient failure.
    async fn release(&self, op_id: &str, reason: &str) -> StoreResult<()>;

    /// `syncing -> failed` after a permanent failure.
    async fn fail(&self, op_id: &str, reason: &str) -> StoreResult<()>;

    /// Return operations left `syncing` by an interrupted drain to `pending`.
    async fn requeue_interrupted(&self, user_id: &str) -> StoreResult<usize>;

    /// Return failed operations to `pending`.
    async fn retry_failed(&self, user_id: &str) -> StoreResult<usize>;

    /// Remove a failed operation.
    async fn discard(&self, op_id: &str) -> StoreResult<PendingOperation>;

    /// Failed operations of the user.
    async fn failed(&self, user_id: &str) -> StoreResult<Vec<PendingOperation>>;
}

/// Store used when local storage could not be opened.
///
/// Every call fails, which switches the facade to online-only mode.
#[derive(Debug, Clone)]
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn err<T>(&self) -> StoreResult<T> {
        Err(StorageError::Unavailable(self.reason.clone()))
    }
}

#[async_trait]
impl PendingStore for UnavailableStore {
    async fn enqueue(&self, _op: PendingOperation) -> StoreResult<EnqueueOutcome> {
        self.err()
    }

    async fn list_pending(&self, _user_id: &str) -> StoreResult<Vec<PendingOperation>> {
        self.err()
    }

    async fn remove(&self, _op_id: &str) -> StoreResult<bool> {
        self.err()
    }

    async fn count(&self, _user_id: &str) -> StoreResult<usize> {
        self.err()
    }

    async fn clear(&self, _user_id: &str) -> StoreResult<usize> {
        self.err()
    }

    async fn begin(&self, _op_id: &str) -> StoreResult<bool> {
        self.err()
    }

    async fn release(&self, _op_id: &str, _reason: &str) -> StoreResult<()> {
        self.err()
    }

    async fn fail(&self, _op_id: &str, _reason: &str) -> StoreResult<()> {
        self.err()
    }

    async fn requeue_interrupted(&self, _user_id: &str) -> StoreResult<usize> {
        self.err()
    }

    async fn retry_failed(&self, _user_id: &str) -> StoreResult<usize> {
        self.err()
    }

    async fn discard(&self, _op_id: &str) -> StoreResult<PendingOperation> {
        self.err()
    }

    async fn failed(&self, _user_id: &str) -> StoreResult<Vec<PendingOperation>> {
        self.err()
    }
}
