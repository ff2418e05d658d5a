//! Remote document store client.
//!
//! The remote store keeps one document per transaction under
//! `users/{userId}/{collection}/{docId}`. Creates set the whole document,
//! updates merge a patch into an existing one, deletes are idempotent.

mod http;
mod memory;

pub use http::HttpRemote;
pub use memory::{InMemoryRemote, RemoteCall};

use async_trait::async_trait;
use dompet_engine::{EntityType, FailureClass, OperationKind, Outcome, PendingOperation};

/// A failed call to the remote store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("remote store unreachable: {0}")]
    Unreachable(String),

    #[error("remote store timed out")]
    Timeout,

    #[error("remote store answered {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid response from remote store: {0}")]
    InvalidResponse(String),

    #[error("invalid remote store url: {0}")]
    InvalidUrl(String),
}

impl RemoteError {
    /// Whether the call may succeed if retried later.
    ///
    /// 401 counts as transient: the session's credentials are refreshed out
    /// of band and the same operation is valid afterwards.
    pub fn class(&self) -> FailureClass {
        match self {
            RemoteError::Unreachable(_) | RemoteError::Timeout => FailureClass::Transient,
            RemoteError::InvalidResponse(_) => FailureClass::Transient,
            RemoteError::Status { status, .. } => match status {
                401 | 408 | 429 => FailureClass::Transient,
                500..=599 => FailureClass::Transient,
                _ => FailureClass::Permanent,
            },
            RemoteError::InvalidUrl(_) => FailureClass::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == FailureClass::Transient
    }

    /// Convert into a drain outcome.
    pub fn into_outcome(self) -> Outcome {
        match self.class() {
            FailureClass::Transient => Outcome::transient(self.to_string()),
            FailureClass::Permanent => Outcome::permanent(self.to_string()),
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteError::Timeout
        } else if err.is_decode() {
            RemoteError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            RemoteError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            RemoteError::Unreachable(err.to_string())
        }
    }
}

/// Per-collection writes against the remote document store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Set the whole document. Repeating a create is harmless.
    async fn create(
        &self,
        user_id: &str,
        entity_type: EntityType,
        doc_id: &str,
        document: &serde_json::Value,
    ) -> Result<(), RemoteError>;

    /// Merge `patch` into an existing document.
    async fn update(
        &self,
        user_id: &str,
        entity_type: EntityType,
        doc_id: &str,
        patch: &serde_json::Value,
    ) -> Result<(), RemoteError>;

    /// Delete the document. Deleting a missing document succeeds.
    async fn delete(
        &self,
        user_id: &str,
        entity_type: EntityType,
        doc_id: &str,
    ) -> Result<(), RemoteError>;

    /// Send one pending operation.
    async fn apply(&self, op: &PendingOperation) -> Result<(), RemoteError> {
        match op.kind {
            OperationKind::Create => {
                self.create(&op.user_id, op.entity_type, &op.target_id, &op.payload)
                    .await
            }
            OperationKind::Update => {
                self.update(&op.user_id, op.entity_type, &op.target_id, &op.payload)
                    .await
            }
            OperationKind::Delete => {
                self.delete(&op.user_id, op.entity_type, &op.target_id)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> RemoteError {
        RemoteError::Status {
            status: code,
            message: String::new(),
        }
    }

    #[test]
    fn network_failures_are_transient() {
        assert!(RemoteError::Unreachable("refused".into()).is_transient());
        assert!(RemoteError::Timeout.is_transient());
    }

    #[test]
    fn status_classification() {
        for code in [401, 408, 429, 500, 502, 503] {
            assert_eq!(status(code).class(), FailureClass::Transient, "{}", code);
        }
        for code in [400, 403, 404, 409, 422] {
            assert_eq!(status(code).class(), FailureClass::Permanent, "{}", code);
        }
    }

    #[test]
    fn outcome_carries_message() {
        let outcome = status(422).into_outcome();
        assert!(matches!(
            outcome,
            Outcome::Failed {
                class: FailureClass::Permanent,
                reason
            } if reason.starts_with("remote store answered 422")
        ));
    }
}
