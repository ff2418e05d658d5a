//! Pending operation types.
//!
//! Writes made while the remote store cannot be reached are expressed as
//! pending operations, not direct mutations. The local queue owns them until
//! the remote store acknowledges each one.

use crate::{error::Result, Error, OperationId, Sequence, TargetId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// The kind of transaction an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Expense,
    Income,
    Installment,
}

impl EntityType {
    /// Every entity type, in display order.
    pub const ALL: [EntityType; 3] = [
        EntityType::Expense,
        EntityType::Income,
        EntityType::Installment,
    ];

    /// Name of the remote collection holding this entity type.
    pub fn collection(&self) -> &'static str {
        match self {
            EntityType::Expense => "expenses",
            EntityType::Income => "incomes",
            EntityType::Installment => "installments",
        }
    }

    /// Resolve an entity type from its remote collection name.
    pub fn from_collection(name: &str) -> Result<Self> {
        EntityType::ALL
            .into_iter()
            .find(|entity| entity.collection() == name)
            .ok_or_else(|| Error::UnknownCollection(name.to_string()))
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityType::Expense => write!(f, "expense"),
            EntityType::Income => write!(f, "income"),
            EntityType::Installment => write!(f, "installment"),
        }
    }
}

/// What the operation does to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Create => write!(f, "create"),
            OperationKind::Update => write!(f, "update"),
            OperationKind::Delete => write!(f, "delete"),
        }
    }
}

/// Sync status of a queued operation.
///
/// Transitions: `pending -> syncing -> {pending, removed}` and
/// `syncing -> failed` once the remote store refuses the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    #[default]
    Pending,
    Syncing,
    Failed,
}

impl OperationStatus {
    /// Stable string form, matching the serialized value.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Syncing => "syncing",
            OperationStatus::Failed => "failed",
        }
    }

    /// Parse the stable string form.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "pending" => Ok(OperationStatus::Pending),
            "syncing" => Ok(OperationStatus::Syncing),
            "failed" => Ok(OperationStatus::Failed),
            other => Err(Error::InvalidRecord(format!("unknown status: {}", other))),
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the document an operation mutates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetKey {
    pub entity_type: EntityType,
    pub target_id: TargetId,
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_type.collection(), self.target_id)
    }
}

/// A deferred mutation waiting for remote acknowledgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    /// Locally generated operation ID
    pub id: OperationId,
    /// Owner of the operation
    pub user_id: UserId,
    /// Create, update or delete
    pub kind: OperationKind,
    /// Which transaction collection is targeted
    pub entity_type: EntityType,
    /// Document ID of the targeted transaction
    pub target_id: TargetId,
    /// Full document (create), partial patch (update) or null (delete)
    pub payload: serde_json::Value,
    /// Local creation time (milliseconds since epoch)
    pub created_at: Timestamp,
    /// Current sync status
    #[serde(default)]
    pub status: OperationStatus,
    /// Remote attempts that did not succeed
    #[serde(default)]
    pub attempts: u32,
    /// Most recent failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Enqueue position, assigned by the queue that owns the operation
    #[serde(skip)]
    pub seq: Sequence,
}

impl PendingOperation {
    fn new(
        id: impl Into<OperationId>,
        user_id: impl Into<UserId>,
        kind: OperationKind,
        entity_type: EntityType,
        target_id: impl Into<TargetId>,
        payload: serde_json::Value,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            kind,
            entity_type,
            target_id: target_id.into(),
            payload,
            created_at,
            status: OperationStatus::Pending,
            attempts: 0,
            last_error: None,
            seq: 0,
        }
    }

    /// Create a new transaction document.
    pub fn create(
        id: impl Into<OperationId>,
        user_id: impl Into<UserId>,
        entity_type: EntityType,
        target_id: impl Into<TargetId>,
        payload: serde_json::Value,
        created_at: Timestamp,
    ) -> Self {
        Self::new(
            id,
            user_id,
            OperationKind::Create,
            entity_type,
            target_id,
            payload,
            created_at,
        )
    }

    /// Patch an existing transaction document.
    pub fn update(
        id: impl Into<OperationId>,
        user_id: impl Into<UserId>,
        entity_type: EntityType,
        target_id: impl Into<TargetId>,
        patch: serde_json::Value,
        created_at: Timestamp,
    ) -> Self {
        Self::new(
            id,
            user_id,
            OperationKind::Update,
            entity_type,
            target_id,
            patch,
            created_at,
        )
    }

    /// Delete a transaction document.
    pub fn delete(
        id: impl Into<OperationId>,
        user_id: impl Into<UserId>,
        entity_type: EntityType,
        target_id: impl Into<TargetId>,
        created_at: Timestamp,
    ) -> Self {
        Self::new(
            id,
            user_id,
            OperationKind::Delete,
            entity_type,
            target_id,
            serde_json::Value::Null,
            created_at,
        )
    }

    /// The document this operation mutates.
    pub fn target(&self) -> TargetKey {
        TargetKey {
            entity_type: self.entity_type,
            target_id: self.target_id.clone(),
        }
    }

    /// Whether this operation mutates the same document as `other`.
    pub fn same_target(&self, other: &PendingOperation) -> bool {
        self.user_id == other.user_id
            && self.entity_type == other.entity_type
            && self.target_id == other.target_id
    }

    /// Whether the operation still counts towards the pending badge.
    pub fn is_active(&self) -> bool {
        self.status != OperationStatus::Failed
    }

    /// Queue order: enqueue sequence, then creation time, then ID.
    pub fn queue_cmp(&self, other: &PendingOperation) -> Ordering {
        self.seq
            .cmp(&other.seq)
            .then_with(|| self.created_at.cmp(&other.created_at))
            .then_with(|| self.id.cmp(&other.id))
    }

    /// `pending -> syncing`.
    ///
    /// An operation already `syncing` stays there; the drain that owns the
    /// user is the only one allowed to call this.
    pub fn mark_syncing(&mut self) -> Result<()> {
        match self.status {
            OperationStatus::Pending | OperationStatus::Syncing => {
                self.status = OperationStatus::Syncing;
                Ok(())
            }
            OperationStatus::Failed => Err(self.transition_error(OperationStatus::Syncing)),
        }
    }

    /// `syncing -> pending` after a retryable failure.
    pub fn mark_retry(&mut self, reason: impl Into<String>) -> Result<()> {
        if self.status != OperationStatus::Syncing {
            return Err(self.transition_error(OperationStatus::Pending));
        }
        self.status = OperationStatus::Pending;
        self.attempts += 1;
        self.last_error = Some(reason.into());
        Ok(())
    }

    /// `syncing -> failed` after the remote store refused the operation.
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<()> {
        if self.status != OperationStatus::Syncing {
            return Err(self.transition_error(OperationStatus::Failed));
        }
        self.status = OperationStatus::Failed;
        self.attempts += 1;
        self.last_error = Some(reason.into());
        Ok(())
    }

    /// Put the operation back in line: recovers an interrupted `syncing`
    /// operation, or a `failed` one the user asked to retry.
    ///
    /// An interrupted attempt counts as an attempt: the remote store may have
    /// applied it before the process stopped.
    pub fn requeue(&mut self) {
        if self.status == OperationStatus::Syncing {
            self.attempts += 1;
            self.last_error = Some("interrupted".to_string());
        }
        self.status = OperationStatus::Pending;
    }

    /// Whether the operation was ever handed to the remote store.
    ///
    /// A sent operation may have been applied even if no acknowledgement
    /// arrived.
    pub fn was_sent(&self) -> bool {
        self.attempts > 0 || self.status == OperationStatus::Syncing
    }

    fn transition_error(&self, to: OperationStatus) -> Error {
        Error::InvalidTransition {
            op_id: self.id.clone(),
            from: self.status,
            to,
        }
    }
}
