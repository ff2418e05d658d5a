//! PendingQueue - the in-memory pending operation queue.
//!
//! Holds every user's pending operations in enqueue order and enforces the
//! queue rules: per-user scoping, delete supersession, and status
//! transitions. Durable stores persist the same records and reuse
//! [`crate::plan_enqueue`] for the supersede decision.

use crate::{
    error::Result, plan_enqueue, Error, OperationId, OperationStatus, PendingOperation, Sequence,
    UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Result of enqueueing an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EnqueueOutcome {
    /// The operation was stored
    #[serde(rename_all = "camelCase")]
    Queued {
        op_id: OperationId,
        sequence: Sequence,
        cancelled: Vec<OperationId>,
    },
    /// The operation cancelled earlier writes and needs no remote call itself
    Superseded { cancelled: Vec<OperationId> },
}

impl EnqueueOutcome {
    /// Operations removed from the queue by this enqueue.
    pub fn cancelled(&self) -> &[OperationId] {
        match self {
            EnqueueOutcome::Queued { cancelled, .. } => cancelled,
            EnqueueOutcome::Superseded { cancelled } => cancelled,
        }
    }
}

/// The in-memory queue.
#[derive(Debug, Clone, Default)]
pub struct PendingQueue {
    /// Last assigned enqueue sequence
    last_seq: Sequence,
    /// Per-user operations, in enqueue order
    users: HashMap<UserId, Vec<PendingOperation>>,
    /// Owner of each queued operation
    owners: HashMap<OperationId, UserId>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a queue from persisted operations (sequence already assigned).
    pub fn restore(ops: impl IntoIterator<Item = PendingOperation>) -> Self {
        let mut queue = Self::new();
        for op in ops {
            queue.last_seq = queue.last_seq.max(op.seq);
            queue.owners.insert(op.id.clone(), op.user_id.clone());
            queue.users.entry(op.user_id.clone()).or_default().push(op);
        }
        for ops in queue.users.values_mut() {
            ops.sort_by(|a, b| a.queue_cmp(b));
        }
        queue
    }

    /// Append an operation, applying delete supersession.
    pub fn enqueue(&mut self, mut op: PendingOperation) -> EnqueueOutcome {
        let existing = self.users.entry(op.user_id.clone()).or_default();
        let plan = plan_enqueue(existing, &op);

        existing.retain(|queued| !plan.cancel.contains(&queued.id));
        for id in &plan.cancel {
            self.owners.remove(id);
        }

        if !plan.insert {
            return EnqueueOutcome::Superseded {
                cancelled: plan.cancel,
            };
        }

        self.last_seq += 1;
        op.seq = self.last_seq;
        op.status = OperationStatus::Pending;
        let op_id = op.id.clone();
        self.owners.insert(op_id.clone(), op.user_id.clone());
        existing.push(op);

        EnqueueOutcome::Queued {
            op_id,
            sequence: self.last_seq,
            cancelled: plan.cancel,
        }
    }

    /// Every queued operation of a user, oldest first.
    pub fn list(&self, user_id: &str) -> &[PendingOperation] {
        self.users.get(user_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Get an operation by ID.
    pub fn get(&self, op_id: &str) -> Option<&PendingOperation> {
        let user_id = self.owners.get(op_id)?;
        self.list(user_id).iter().find(|op| op.id == op_id)
    }

    fn get_mut(&mut self, op_id: &str) -> Option<&mut PendingOperation> {
        let user_id = self.owners.get(op_id)?;
        self.users
            .get_mut(user_id)?
            .iter_mut()
            .find(|op| op.id == op_id)
    }

    /// Remove an acknowledged operation.
    pub fn remove(&mut self, op_id: &str) -> Option<PendingOperation> {
        let user_id = self.owners.remove(op_id)?;
        let ops = self.users.get_mut(&user_id)?;
        let index = ops.iter().position(|op| op.id == op_id)?;
        Some(ops.remove(index))
    }

    /// Non-terminal operations of a user (the pending badge).
    pub fn count(&self, user_id: &str) -> usize {
        self.list(user_id).iter().filter(|op| op.is_active()).count()
    }

    /// Operations of a user that failed permanently.
    pub fn failed(&self, user_id: &str) -> Vec<&PendingOperation> {
        self.list(user_id)
            .iter()
            .filter(|op| op.status == OperationStatus::Failed)
            .collect()
    }

    /// Drop every operation of a user. Returns how many were dropped.
    pub fn clear(&mut self, user_id: &str) -> usize {
        let ops = self.users.remove(user_id).unwrap_or_default();
        for op in &ops {
            self.owners.remove(&op.id);
        }
        ops.len()
    }

    /// `pending -> syncing`. Returns `false` when the operation is gone
    /// (acknowledged, cancelled or cleared since the caller's snapshot).
    pub fn begin(&mut self, op_id: &str) -> Result<bool> {
        match self.get_mut(op_id) {
            Some(op) => op.mark_syncing().map(|_| true),
            None => Ok(false),
        }
    }

    /// `syncing -> pending` after a transient failure.
    pub fn release(&mut self, op_id: &str, reason: &str) -> Result<()> {
        self.get_mut(op_id)
            .ok_or_else(|| Error::OperationNotFound(op_id.to_string()))?
            .mark_retry(reason)
    }

    /// `syncing -> failed` after a permanent failure.
    pub fn fail(&mut self, op_id: &str, reason: &str) -> Result<()> {
        self.get_mut(op_id)
            .ok_or_else(|| Error::OperationNotFound(op_id.to_string()))?
            .mark_failed(reason)
    }

    /// Return interrupted `syncing` operations of a user to `pending`.
    pub fn requeue_interrupted(&mut self, user_id: &str) -> usize {
        self.requeue_where(user_id, OperationStatus::Syncing)
    }

    /// Return failed operations of a user to `pending` (user action).
    pub fn retry_failed(&mut self, user_id: &str) -> usize {
        self.requeue_where(user_id, OperationStatus::Failed)
    }

    fn requeue_where(&mut self, user_id: &str, status: OperationStatus) -> usize {
        let Some(ops) = self.users.get_mut(user_id) else {
            return 0;
        };
        let mut count = 0;
        for op in ops.iter_mut().filter(|op| op.status == status) {
            op.requeue();
            count += 1;
        }
        count
    }

    /// Remove a failed operation the user chose to abandon.
    pub fn discard(&mut self, op_id: &str) -> Result<PendingOperation> {
        let op = self
            .get(op_id)
            .ok_or_else(|| Error::OperationNotFound(op_id.to_string()))?;
        if op.status != OperationStatus::Failed {
            return Err(Error::InvalidTransition {
                op_id: op_id.to_string(),
                from: op.status,
                to: OperationStatus::Failed,
            });
        }
        self.remove(op_id)
            .ok_or_else(|| Error::OperationNotFound(op_id.to_string()))
    }

    /// Users with at least one queued operation.
    pub fn users(&self) -> impl Iterator<Item = &UserId> {
        self.users
            .iter()
            .filter(|(_, ops)| !ops.is_empty())
            .map(|(user, _)| user)
    }

    /// Total queued operations across users.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntityType;
    use serde_json::json;

    fn expense(id: &str, user: &str, target: &str) -> PendingOperation {
        PendingOperation::create(
            id,
            user,
            EntityType::Expense,
            target,
            json!({"description": "Kopi", "amount": 25000}),
            1000,
        )
    }

    #[test]
    fn enqueue_assigns_sequence() {
        let mut queue = PendingQueue::new();
        let first = queue.enqueue(expense("op-1", "user-1", "a"));
        let second = queue.enqueue(expense("op-2", "user-1", "b"));

        assert!(matches!(first, EnqueueOutcome::Queued { sequence: 1, .. }));
        assert!(matches!(second, EnqueueOutcome::Queued { sequence: 2, .. }));

        let ids: Vec<_> = queue.list("user-1").iter().map(|op| op.id.as_str()).collect();
        assert_eq!(ids, vec!["op-1", "op-2"]);
    }

    #[test]
    fn users_are_isolated() {
        let mut queue = PendingQueue::new();
        queue.enqueue(expense("op-1", "user-1", "a"));
        queue.enqueue(expense("op-2", "user-2", "a"));

        assert_eq!(queue.count("user-1"), 1);
        assert_eq!(queue.count("user-2"), 1);

        assert_eq!(queue.clear("user-1"), 1);
        assert_eq!(queue.count("user-1"), 0);
        assert_eq!(queue.count("user-2"), 1);
        assert!(queue.get("op-2").is_some());
    }

    #[test]
    fn delete_supersedes_pending_create() {
        let mut queue = PendingQueue::new();
        queue.enqueue(expense("op-1", "user-1", "a"));
        let outcome = queue.enqueue(PendingOperation::delete(
            "op-2",
            "user-1",
            EntityType::Expense,
            "a",
            2000,
        ));

        assert_eq!(
            outcome,
            EnqueueOutcome::Superseded {
                cancelled: vec!["op-1".to_string()]
            }
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn remove_is_by_id() {
        let mut queue = PendingQueue::new();
        queue.enqueue(expense("op-1", "user-1", "a"));
        queue.enqueue(expense("op-2", "user-1", "b"));

        let removed = queue.remove("op-1").unwrap();
        assert_eq!(removed.id, "op-1");
        assert!(queue.remove("op-1").is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn begin_reports_vanished_operations() {
        let mut queue = PendingQueue::new();
        queue.enqueue(expense("op-1", "user-1", "a"));

        assert_eq!(queue.begin("op-1"), Ok(true));
        assert_eq!(queue.get("op-1").unwrap().status, OperationStatus::Syncing);
        assert_eq!(queue.begin("missing"), Ok(false));
    }

    #[test]
    fn failed_items_leave_the_badge_but_stay_listed() {
        let mut queue = PendingQueue::new();
        queue.enqueue(expense("op-1", "user-1", "a"));
        queue.enqueue(expense("op-2", "user-1", "b"));

        queue.begin("op-1").unwrap();
        queue.fail("op-1", "422 invalid amount").unwrap();

        assert_eq!(queue.count("user-1"), 1);
        assert_eq!(queue.list("user-1").len(), 2);
        assert_eq!(queue.failed("user-1")[0].id, "op-1");
    }

    #[test]
    fn release_records_attempt() {
        let mut queue = PendingQueue::new();
        queue.enqueue(expense("op-1", "user-1", "a"));
        queue.begin("op-1").unwrap();
        queue.release("op-1", "timeout").unwrap();

        let op = queue.get("op-1").unwrap();
        assert_eq!(op.status, OperationStatus::Pending);
        assert_eq!(op.attempts, 1);
    }

    #[test]
    fn requeue_and_retry() {
        let mut queue = PendingQueue::new();
        queue.enqueue(expense("op-1", "user-1", "a"));
        queue.enqueue(expense("op-2", "user-1", "b"));
        queue.begin("op-1").unwrap();
        queue.begin("op-2").unwrap();
        queue.fail("op-2", "rejected").unwrap();

        assert_eq!(queue.requeue_interrupted("user-1"), 1);
        assert_eq!(queue.get("op-1").unwrap().status, OperationStatus::Pending);
        assert_eq!(queue.get("op-1").unwrap().attempts, 1);
        assert_eq!(queue.count("user-1"), 1);

        assert_eq!(queue.retry_failed("user-1"), 1);
        assert_eq!(queue.count("user-1"), 2);
    }

    #[test]
    fn discard_only_failed() {
        let mut queue = PendingQueue::new();
        queue.enqueue(expense("op-1", "user-1", "a"));
        assert!(matches!(
            queue.discard("op-1"),
            Err(Error::InvalidTransition { .. })
        ));

        queue.begin("op-1").unwrap();
        queue.fail("op-1", "rejected").unwrap();
        assert_eq!(queue.discard("op-1").unwrap().id, "op-1");
        assert!(queue.is_empty());
    }

    #[test]
    fn restore_keeps_order_and_sequence() {
        let mut a = expense("op-1", "user-1", "a");
        a.seq = 7;
        let mut b = expense("op-2", "user-1", "b");
        b.seq = 3;

        let mut queue = PendingQueue::restore(vec![a, b]);
        let ids: Vec<_> = queue.list("user-1").iter().map(|op| op.id.as_str()).collect();
        assert_eq!(ids, vec!["op-2", "op-1"]);

        let outcome = queue.enqueue(expense("op-3", "user-1", "c"));
        assert!(matches!(outcome, EnqueueOutcome::Queued { sequence: 8, .. }));
    }

    #[test]
    fn outcome_serialization() {
        let outcome = EnqueueOutcome::Queued {
            op_id: "op-1".into(),
            sequence: 1,
            cancelled: vec![],
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"type\":\"queued\""));
        assert!(json.contains("\"opId\":\"op-1\""));
    }
}
