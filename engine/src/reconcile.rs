//! Queue reconciliation rules.
//!
//! Two decisions live here, both pure:
//!
//! - [`plan_enqueue`]: how a new operation interacts with what is already
//!   queued for the same target (a delete supersedes earlier pending writes).
//! - [`DrainCursor`]: what a drain does with each queued operation and with
//!   each remote outcome.
//!
//! # Drain algorithm
//!
//! 1. Seed blocked targets from operations already marked failed
//! 2. Walk the queue in enqueue order, skipping blocked targets
//! 3. Success removes the operation
//! 4. A transient failure requeues the operation and stops the drain
//! 5. A permanent failure marks the operation failed, blocks its target and
//!    continues with the next operation

use crate::{OperationId, OperationKind, OperationStatus, PendingOperation, TargetKey};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What the queue must do to accept an incoming operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnqueuePlan {
    /// Queued operations made obsolete by the incoming one
    pub cancel: Vec<OperationId>,
    /// Whether the incoming operation itself needs to be stored
    pub insert: bool,
}

/// Decide how `incoming` joins a user's queue.
///
/// `existing` is the user's current queue in any order. A delete cancels every
/// earlier `pending` or `failed` operation on its target; `syncing` ones are
/// already in flight. The delete itself is dropped only when the target's
/// create is among the cancelled operations and no operation on the target
/// was ever sent, so the remote store cannot hold the document.
pub fn plan_enqueue(existing: &[PendingOperation], incoming: &PendingOperation) -> EnqueuePlan {
    if incoming.kind != OperationKind::Delete {
        return EnqueuePlan {
            cancel: Vec::new(),
            insert: true,
        };
    }

    let mut cancel = Vec::new();
    let mut cancelled_create = false;
    let mut reached_remote = false;

    for op in existing.iter().filter(|op| op.same_target(incoming)) {
        reached_remote |= op.was_sent();
        match op.status {
            OperationStatus::Pending | OperationStatus::Failed => {
                cancelled_create |= op.kind == OperationKind::Create;
                cancel.push(op.id.clone());
            }
            OperationStatus::Syncing => {}
        }
    }

    EnqueuePlan {
        cancel,
        insert: !cancelled_create || reached_remote,
    }
}

/// Classification of a failed remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureClass {
    /// Network-class failure; retry on the next trigger
    Transient,
    /// The remote store refused the operation; do not retry automatically
    Permanent,
}

/// Result of applying one operation against the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Failed { class: FailureClass, reason: String },
}

impl Outcome {
    pub fn transient(reason: impl Into<String>) -> Self {
        Outcome::Failed {
            class: FailureClass::Transient,
            reason: reason.into(),
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        Outcome::Failed {
            class: FailureClass::Permanent,
            reason: reason.into(),
        }
    }
}

/// Whether a queued operation should be attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Apply,
    /// An earlier operation on the same target failed permanently
    Blocked,
    /// Not `pending` (already failed)
    Skip,
}

/// What the store must do with an operation after its remote attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Acknowledged: remove it from the queue
    Remove,
    /// Back to `pending`; the drain stops here
    Retry { reason: String },
    /// Terminal `failed`; the drain continues
    Fail { reason: String },
}

/// An operation that failed permanently during a drain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedOperation {
    pub op_id: OperationId,
    pub reason: String,
}

/// Summary of one drain.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    /// Acknowledged and removed
    pub applied: Vec<OperationId>,
    /// Marked failed in this drain
    pub failed: Vec<FailedOperation>,
    /// Left pending behind a failed operation on the same target
    pub blocked: Vec<OperationId>,
    /// Transient failure that stopped the drain early
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interrupted: Option<String>,
}

impl DrainReport {
    /// Whether the drain stopped on a transient failure.
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.is_some()
    }

    /// Whether the drain touched nothing.
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
            && self.failed.is_empty()
            && self.blocked.is_empty()
            && self.interrupted.is_none()
    }
}

/// Walks one user's queue during a drain.
#[derive(Debug, Default)]
pub struct DrainCursor {
    blocked: HashSet<TargetKey>,
    report: DrainReport,
}

impl DrainCursor {
    /// Start a drain over a queue snapshot.
    pub fn new<'a>(snapshot: impl IntoIterator<Item = &'a PendingOperation>) -> Self {
        let blocked = snapshot
            .into_iter()
            .filter(|op| op.status == OperationStatus::Failed)
            .map(PendingOperation::target)
            .collect();

        Self {
            blocked,
            report: DrainReport::default(),
        }
    }

    /// Decide whether `op` should be sent to the remote store now.
    pub fn admit(&mut self, op: &PendingOperation) -> Admission {
        if op.status == OperationStatus::Failed {
            return Admission::Skip;
        }
        if self.blocked.contains(&op.target()) {
            self.report.blocked.push(op.id.clone());
            return Admission::Blocked;
        }
        Admission::Apply
    }

    /// Record the remote outcome for `op`.
    pub fn record(&mut self, op: &PendingOperation, outcome: Outcome) -> Disposition {
        match outcome {
            Outcome::Applied => {
                self.report.applied.push(op.id.clone());
                Disposition::Remove
            }
            Outcome::Failed {
                class: FailureClass::Transient,
                reason,
            } => {
                self.report.interrupted = Some(reason.clone());
                Disposition::Retry { reason }
            }
            Outcome::Failed {
                class: FailureClass::Permanent,
                reason,
            } => {
                self.blocked.insert(op.target());
                self.report.failed.push(FailedOperation {
                    op_id: op.id.clone(),
                    reason: reason.clone(),
                });
                Disposition::Fail { reason }
            }
        }
    }

    /// Whether the drain must stop.
    pub fn is_interrupted(&self) -> bool {
        self.report.is_interrupted()
    }

    pub fn finish(self) -> DrainReport {
        self.report
    }
}
