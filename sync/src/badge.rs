//! Pending-count badge.
//!
//! Publishes the number of operations waiting to sync for each user. The
//! facade refreshes it after every queue mutation and the sync engine after
//! every drain.

use dashmap::DashMap;
use dompet_engine::UserId;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

#[derive(Debug, Default)]
pub struct PendingBadge {
    counts: DashMap<UserId, watch::Sender<usize>>,
    /// Serializes read-then-publish per user
    refreshing: DashMap<UserId, Arc<Mutex<()>>>,
}

impl PendingBadge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn publish(&self, user_id: &str, count: usize) {
        let sender = self
            .counts
            .entry(user_id.to_string())
            .or_insert_with(|| watch::channel(0).0);
        sender.send_if_modified(|current| {
            let changed = *current != count;
            *current = count;
            changed
        });
        tracing::trace!(user_id = %user_id, count, "Pending badge updated");
    }

    /// Read the user's count with `read` and publish it.
    ///
    /// Refreshes of one user run one at a time from read to publish, so the
    /// value left on the badge was read after every earlier refresh.
    pub async fn refresh<F, Fut, E>(&self, user_id: &str, read: F) -> Result<usize, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<usize, E>>,
    {
        let lock = self
            .refreshing
            .entry(user_id.to_string())
            .or_default()
            .value()
            .clone();
        let _guard = lock.lock().await;

        let count = read().await?;
        self.publish(user_id, count);
        Ok(count)
    }

    /// Last published count (0 if nothing was published).
    pub fn count(&self, user_id: &str) -> usize {
        self.counts
            .get(user_id)
            .map(|sender| *sender.borrow())
            .unwrap_or(0)
    }

    pub fn subscribe(&self, user_id: &str) -> watch::Receiver<usize> {
        self.counts
            .entry(user_id.to_string())
            .or_insert_with(|| watch::channel(0).0)
            .subscribe()
    }
}
