//! Offline-aware transaction facade.
//!
//! Entry point for every transaction write. Online writes go straight to the
//! remote store; offline writes (and writes that fail transiently) are queued
//! and the caller gets an optimistic success. After any queue mutation the
//! pending badge is republished.
//!
//! Writes are queued even when online if the user already has operations
//! waiting, or a failed operation on the same target: a direct write would
//! overtake them.

use crate::background::{SyncMessage, SyncSender};
use crate::badge::PendingBadge;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{Result, StorageError, SyncError};
use crate::notify::{Notice, Notifier};
use crate::remote::RemoteStore;
use crate::store::PendingStore;
use dompet_engine::{
    EnqueueOutcome, EntityType, OperationId, OperationStatus, PendingOperation, Schema, TargetId,
    Timestamp,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// How online writes are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WritePolicy {
    /// Write to the remote store, queue on transient failure
    #[default]
    Direct,
    /// Always queue, then ask the listener to drain
    Queued,
}

impl FromStr for WritePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(WritePolicy::Direct),
            "queued" => Ok(WritePolicy::Queued),
            other => Err(format!("unknown write policy: {}", other)),
        }
    }
}

/// How a write was delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Delivery {
    /// Acknowledged by the remote store
    Remote,
    /// Waiting in the pending queue
    #[serde(rename_all = "camelCase")]
    Queued { op_id: OperationId },
    /// Cancelled earlier local writes; nothing left to send
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteReceipt {
    pub target_id: TargetId,
    pub delivery: Delivery,
    pub pending_count: usize,
}

fn now_ms() -> Timestamp {
    chrono::Utc::now().timestamp_millis().max(0) as Timestamp
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub struct TransactionFacade {
    store: Arc<dyn PendingStore>,
    remote: Arc<dyn RemoteStore>,
    monitor: Arc<ConnectivityMonitor>,
    badge: Arc<PendingBadge>,
    notifier: Arc<dyn Notifier>,
    schema: Schema,
    policy: WritePolicy,
    listener: Option<SyncSender>,
    /// Cleared once local storage fails; the session is online-only from then
    buffering: AtomicBool,
}

impl TransactionFacade {
    pub fn new(
        store: Arc<dyn PendingStore>,
        remote: Arc<dyn RemoteStore>,
        monitor: Arc<ConnectivityMonitor>,
        badge: Arc<PendingBadge>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            remote,
            monitor,
            badge,
            notifier,
            schema: Schema::finance(),
            policy: WritePolicy::default(),
            listener: None,
            buffering: AtomicBool::new(true),
        }
    }

    pub fn with_policy(mut self, policy: WritePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Send queued-write and manual sync requests to the foreground listener.
    pub fn with_listener(mut self, listener: SyncSender) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Whether offline writes can still be queued this session.
    pub fn buffering_available(&self) -> bool {
        self.buffering.load(Ordering::SeqCst)
    }

    /// Record a new transaction. The document ID is generated locally.
    pub async fn add_transaction(
        &self,
        user_id: &str,
        entity_type: EntityType,
        data: serde_json::Value,
    ) -> Result<WriteReceipt> {
        let op = PendingOperation::create(new_id(), user_id, entity_type, new_id(), data, now_ms());
        self.write(op).await
    }

    pub async fn update_transaction(
        &self,
        user_id: &str,
        entity_type: EntityType,
        target_id: &str,
        patch: serde_json::Value,
    ) -> Result<WriteReceipt> {
        let op = PendingOperation::update(new_id(), user_id, entity_type, target_id, patch, now_ms());
        self.write(op).await
    }

    pub async fn delete_transaction(
        &self,
        user_id: &str,
        entity_type: EntityType,
        target_id: &str,
    ) -> Result<WriteReceipt> {
        let op = PendingOperation::delete(new_id(), user_id, entity_type, target_id, now_ms());
        self.write(op).await
    }

    async fn write(&self, op: PendingOperation) -> Result<WriteReceipt> {
        self.schema.validate_operation(&op).map_err(SyncError::Invalid)?;

        let online = self.monitor.is_online();

        if !self.buffering_available() {
            if !online {
                return Err(SyncError::OfflineBufferingUnavailable(
                    "local storage failed earlier in this session".into(),
                ));
            }
            self.remote.apply(&op).await?;
            return Ok(self.receipt(op.target_id, Delivery::Remote, 0));
        }

        if online && self.policy == WritePolicy::Direct {
            let queued = match self.queued_ahead(&op).await {
                Ok(count) => count,
                Err(e) => {
                    self.disable_buffering(&e);
                    self.remote.apply(&op).await?;
                    return Ok(self.receipt(op.target_id, Delivery::Remote, 0));
                }
            };

            if queued == 0 {
                match self.remote.apply(&op).await {
                    Ok(()) => {
                        tracing::debug!(op_id = %op.id, target = %op.target(), "Written to remote store");
                        return Ok(self.receipt(op.target_id, Delivery::Remote, 0));
                    }
                    Err(e) if e.is_transient() => {
                        tracing::warn!(op_id = %op.id, error = %e, "Direct write failed, queueing");
                    }
                    Err(e) => return Err(SyncError::Rejected(e)),
                }
            } else {
                tracing::debug!(user_id = %op.user_id, queued, "Queueing behind pending operations");
            }
        }

        self.enqueue(op).await
    }

    /// Queued operations a direct write of `op` would overtake: everything
    /// still waiting to sync, plus failed operations on the same target.
    async fn queued_ahead(&self, op: &PendingOperation) -> std::result::Result<usize, StorageError> {
        let pending = self.store.count(&op.user_id).await?;
        let failed = self
            .store
            .failed(&op.user_id)
            .await?
            .iter()
            .filter(|queued| queued.same_target(op))
            .count();
        Ok(pending + failed)
    }

    async fn enqueue(&self, op: PendingOperation) -> Result<WriteReceipt> {
        let user_id = op.user_id.clone();
        let target_id = op.target_id.clone();

        let outcome = match self.store.enqueue(op).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.disable_buffering(&e);
                return Err(SyncError::OfflineBufferingUnavailable(e.to_string()));
            }
        };

        let delivery = match outcome {
            EnqueueOutcome::Queued { op_id, .. } => Delivery::Queued { op_id },
            EnqueueOutcome::Superseded { .. } => Delivery::Superseded,
        };

        let pending = self.refresh_badge(&user_id).await?;
        self.request_drain(SyncMessage::LocalWrite { user_id });

        Ok(self.receipt(target_id, delivery, pending))
    }

    fn receipt(&self, target_id: TargetId, delivery: Delivery, pending_count: usize) -> WriteReceipt {
        WriteReceipt {
            target_id,
            delivery,
            pending_count,
        }
    }

    fn disable_buffering(&self, err: &StorageError) {
        if self.buffering.swap(false, Ordering::SeqCst) {
            tracing::error!(error = %err, "Local storage failed, switching to online-only mode");
            self.notifier
                .notify(Notice::buffering_unavailable(&err.to_string()));
        }
    }

    fn request_drain(&self, message: SyncMessage) {
        if let Some(listener) = &self.listener {
            if listener.send(message).is_err() {
                tracing::debug!("Sync listener is gone");
            }
        }
    }

    async fn refresh_badge(&self, user_id: &str) -> Result<usize> {
        Ok(self
            .badge
            .refresh(user_id, || self.store.count(user_id))
            .await?)
    }

    /// Operations waiting to sync (the badge value).
    pub async fn pending_count(&self, user_id: &str) -> Result<usize> {
        self.refresh_badge(user_id).await
    }

    /// Every queued operation, oldest first, failed ones included.
    pub async fn pending_operations(&self, user_id: &str) -> Result<Vec<PendingOperation>> {
        Ok(self.store.list_pending(user_id).await?)
    }

    pub async fn failed_operations(&self, user_id: &str) -> Result<Vec<PendingOperation>> {
        Ok(self.store.failed(user_id).await?)
    }

    /// Put failed operations back in the queue and ask for a sync.
    pub async fn retry_failed(&self, user_id: &str) -> Result<usize> {
        let retried = self.store.retry_failed(user_id).await?;
        self.refresh_badge(user_id).await?;
        if retried > 0 {
            self.request_drain(SyncMessage::Manual);
        }
        Ok(retried)
    }

    /// Abandon one failed operation.
    pub async fn discard(&self, user_id: &str, op_id: &str) -> Result<PendingOperation> {
        let owned = self
            .store
            .failed(user_id)
            .await?
            .iter()
            .any(|op| op.id == op_id && op.status == OperationStatus::Failed);
        if !owned {
            return Err(SyncError::NotFound(op_id.to_string()));
        }

        let op = self.store.discard(op_id).await?;
        self.refresh_badge(user_id).await?;
        tracing::info!(user_id = %user_id, op_id = %op_id, "Discarded failed operation");
        Ok(op)
    }

    /// Drop every queued operation of the user. Irreversible.
    pub async fn clear_pending(&self, user_id: &str) -> Result<usize> {
        let cleared = self.store.clear(user_id).await?;
        self.refresh_badge(user_id).await?;
        tracing::warn!(user_id = %user_id, cleared, "Pending operations cleared");
        Ok(cleared)
    }

    /// Ask the listener to sync now.
    pub fn request_sync(&self) {
        self.request_drain(SyncMessage::Manual);
    }
}
