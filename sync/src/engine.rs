//! Sync engine: drains a user's pending queue against the remote store.
//!
//! # Single flight
//!
//! Each user has a gate (`tokio::sync::Mutex<()>`). A drain takes the gate
//! with `try_lock`; a call that finds it held returns
//! [`SyncOutcome::AlreadyRunning`] without touching the queue or the network.
//! Drains for different users run independently.
//!
//! # Drain
//!
//! 1. Requeue operations left `syncing` by an interrupted drain
//! 2. Snapshot the user's queue
//! 3. Send each admitted operation in order (see [`DrainCursor`])
//! 4. Publish the new pending count and notify the user

use crate::badge::PendingBadge;
use crate::error::StorageError;
use crate::notify::{Notice, Notifier};
use crate::remote::RemoteStore;
use crate::store::PendingStore;
use dashmap::DashMap;
use dompet_engine::{Admission, Disposition, DrainCursor, DrainReport, Outcome, UserId};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Result of a sync request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Another drain for this user is in flight; nothing was done
    AlreadyRunning,
    Completed(DrainReport),
}

impl SyncOutcome {
    pub fn report(&self) -> Option<&DrainReport> {
        match self {
            SyncOutcome::AlreadyRunning => None,
            SyncOutcome::Completed(report) => Some(report),
        }
    }
}

pub struct SyncEngine {
    store: Arc<dyn PendingStore>,
    remote: Arc<dyn RemoteStore>,
    badge: Arc<PendingBadge>,
    notifier: Arc<dyn Notifier>,
    gates: DashMap<UserId, Arc<Mutex<()>>>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn PendingStore>,
        remote: Arc<dyn RemoteStore>,
        badge: Arc<PendingBadge>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            remote,
            badge,
            notifier,
            gates: DashMap::new(),
        }
    }

    fn gate(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.gates
            .entry(user_id.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Whether a drain for the user is in flight.
    pub fn is_syncing(&self, user_id: &str) -> bool {
        self.gates
            .get(user_id)
            .map(|gate| gate.try_lock().is_err())
            .unwrap_or(false)
    }

    /// Drain the user's pending queue.
    ///
    /// Safe to call concurrently and repeatedly: a call made while a drain is
    /// in flight is a no-op.
    pub async fn sync_pending_data(&self, user_id: &str) -> Result<SyncOutcome, StorageError> {
        let gate = self.gate(user_id);
        let Ok(_guard) = gate.try_lock() else {
            tracing::debug!(user_id = %user_id, "Sync already running");
            return Ok(SyncOutcome::AlreadyRunning);
        };

        let requeued = self.store.requeue_interrupted(user_id).await?;
        if requeued > 0 {
            tracing::warn!(user_id = %user_id, requeued, "Requeued interrupted operations");
        }

        let snapshot = self.store.list_pending(user_id).await?;
        let mut cursor = DrainCursor::new(&snapshot);

        tracing::debug!(user_id = %user_id, queued = snapshot.len(), "Draining pending operations");

        for op in &snapshot {
            match cursor.admit(op) {
                Admission::Apply => {}
                Admission::Blocked => {
                    tracing::debug!(op_id = %op.id, target = %op.target(), "Blocked behind failed operation");
                    continue;
                }
                Admission::Skip => continue,
            }

            // Cancelled or cleared since the snapshot
            if !self.store.begin(&op.id).await? {
                continue;
            }

            let outcome = match self.remote.apply(op).await {
                Ok(()) => Outcome::Applied,
                Err(e) => e.into_outcome(),
            };

            match cursor.record(op, outcome) {
                Disposition::Remove => {
                    self.store.remove(&op.id).await?;
                    tracing::debug!(op_id = %op.id, kind = %op.kind, target = %op.target(), "Operation synced");
                }
                Disposition::Retry { reason } => {
                    self.store.release(&op.id, &reason).await?;
                    tracing::warn!(op_id = %op.id, %reason, "Sync interrupted, will retry");
                }
                Disposition::Fail { reason } => {
                    self.store.fail(&op.id, &reason).await?;
                    tracing::error!(op_id = %op.id, target = %op.target(), %reason, "Operation rejected");
                }
            }

            if cursor.is_interrupted() {
                break;
            }
        }

        let report = cursor.finish();
        let pending = self
            .badge
            .refresh(user_id, || self.store.count(user_id))
            .await?;
        self.announce(&report);

        tracing::info!(
            user_id = %user_id,
            applied = report.applied.len(),
            failed = report.failed.len(),
            blocked = report.blocked.len(),
            interrupted = report.is_interrupted(),
            pending,
            "Drain finished"
        );

        Ok(SyncOutcome::Completed(report))
    }

    fn announce(&self, report: &DrainReport) {
        if !report.applied.is_empty() {
            self.notifier.notify(Notice::synced(report.applied.len()));
        }
        for failed in &report.failed {
            self.notifier.notify(Notice::sync_failed(&failed.reason));
        }
        if report.is_interrupted() {
            self.notifier.notify(Notice::sync_interrupted());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ChannelNotifier;
    use crate::remote::{InMemoryRemote, RemoteError};
    use crate::store::MemoryStore;
    use dompet_engine::{EntityType, OperationStatus, PendingOperation};
    use serde_json::json;

    struct Harness {
        store: Arc<MemoryStore>,
        remote: Arc<InMemoryRemote>,
        badge: Arc<PendingBadge>,
        engine: SyncEngine,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let remote = Arc::new(InMemoryRemote::new());
        let badge = PendingBadge::new_shared();
        let (notifier, _rx) = ChannelNotifier::channel();
        let engine = SyncEngine::new(
            store.clone(),
            remote.clone(),
            badge.clone(),
            Arc::new(notifier),
        );
        Harness {
            store,
            remote,
            badge,
            engine,
        }
    }

    fn expense(id: &str, target: &str) -> PendingOperation {
        PendingOperation::create(
            id,
            "user-1",
            EntityType::Expense,
            target,
            json!({"description": "Kopi", "amount": 25000}),
            1000,
        )
    }

    #[tokio::test]
    async fn drain_empties_queue_and_badge() {
        let h = harness();
        h.store.enqueue(expense("op-1", "a")).await.unwrap();
        h.badge.publish("user-1", 1);

        let outcome = h.engine.sync_pending_data("user-1").await.unwrap();
        let report = outcome.report().unwrap();
        assert_eq!(report.applied, vec!["op-1".to_string()]);

        assert_eq!(h.store.count("user-1").await.unwrap(), 0);
        assert_eq!(h.badge.count("user-1"), 0);
        assert!(h.remote.document("user-1", EntityType::Expense, "a").is_some());
    }

    #[tokio::test]
    async fn empty_queue_makes_no_calls() {
        let h = harness();
        let outcome = h.engine.sync_pending_data("user-1").await.unwrap();
        assert!(outcome.report().unwrap().is_empty());
        assert_eq!(h.remote.call_count(), 0);
    }

    #[tokio::test]
    async fn transient_failure_keeps_operation_pending() {
        let h = harness();
        h.store.enqueue(expense("op-1", "a")).await.unwrap();
        h.remote.fail_next(RemoteError::Timeout);

        let outcome = h.engine.sync_pending_data("user-1").await.unwrap();
        assert!(outcome.report().unwrap().is_interrupted());

        let ops = h.store.list_pending("user-1").await.unwrap();
        assert_eq!(ops[0].status, OperationStatus::Pending);
        assert_eq!(ops[0].attempts, 1);
        assert_eq!(h.badge.count("user-1"), 1);
    }

    #[tokio::test]
    async fn gate_is_released_after_drain() {
        let h = harness();
        h.engine.sync_pending_data("user-1").await.unwrap();
        assert!(!h.engine.is_syncing("user-1"));

        h.store.enqueue(expense("op-1", "a")).await.unwrap();
        let outcome = h.engine.sync_pending_data("user-1").await.unwrap();
        assert!(matches!(outcome, SyncOutcome::Completed(_)));
    }
}
