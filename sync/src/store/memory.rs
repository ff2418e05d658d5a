//! In-memory pending store, for tests and embedding.

use super::{PendingStore, StoreResult};
use crate::error::StorageError;
use async_trait::async_trait;
use dompet_engine::{EnqueueOutcome, PendingOperation, PendingQueue};
use std::sync::{Mutex, MutexGuard};

/// [`PendingStore`] over an in-memory [`PendingQueue`]. Not durable.
#[derive(Debug, Default)]
pub struct MemoryStore {
    queue: Mutex<PendingQueue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self) -> StoreResult<MutexGuard<'_, PendingQueue>> {
        self.queue.lock().map_err(|_| StorageError::Poisoned)
    }
}

#[async_trait]
impl PendingStore for MemoryStore {
    async fn enqueue(&self, op: PendingOperation) -> StoreResult<EnqueueOutcome> {
        Ok(self.queue()?.enqueue(op))
    }

    async fn list_pending(&self, user_id: &str) -> StoreResult<Vec<PendingOperation>> {
        Ok(self.queue()?.list(user_id).to_vec())
    }

    async fn remove(&self, op_id: &str) -> StoreResult<bool> {
        Ok(self.queue()?.remove(op_id).is_some())
    }

    async fn count(&self, user_id: &str) -> StoreResult<usize> {
        Ok(self.queue()?.count(user_id))
    }

    async fn clear(&self, user_id: &str) -> StoreResult<usize> {
        Ok(self.queue()?.clear(user_id))
    }

    async fn begin(&self, op_id: &str) -> StoreResult<bool> {
        Ok(self.queue()?.begin(op_id)?)
    }

    async fn release(&self, op_id: &str, reason: &str) -> StoreResult<()> {
        Ok(self.queue()?.release(op_id, reason)?)
    }

    async fn fail(&self, op_id: &str, reason: &str) -> StoreResult<()> {
        Ok(self.queue()?.fail(op_id, reason)?)
    }

    async fn requeue_interrupted(&self, user_id: &str) -> StoreResult<usize> {
        Ok(self.queue()?.requeue_interrupted(user_id))
    }

    async fn retry_failed(&self, user_id: &str) -> StoreResult<usize> {
        Ok(self.queue()?.retry_failed(user_id))
    }

    async fn discard(&self, op_id: &str) -> StoreResult<PendingOperation> {
        Ok(self.queue()?.discard(op_id)?)
    }

    async fn failed(&self, user_id: &str) -> StoreResult<Vec<PendingOperation>> {
        Ok(self.queue()?.failed(user_id).into_iter().cloned().collect())
    }
}
