//! In-memory remote store with failure injection.
//!
//! Behaves like the document server (create sets, update merges and needs an
//! existing document, delete is idempotent) and records every call so tests
//! can assert how often the network was touched.

use super::{RemoteError, RemoteStore};
use async_trait::async_trait;
use dashmap::DashMap;
use dompet_engine::{EntityType, OperationKind};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type DocumentKey = (String, EntityType, String);

/// One call received by [`InMemoryRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    pub kind: OperationKind,
    pub user_id: String,
    pub entity_type: EntityType,
    pub doc_id: String,
}

#[derive(Debug, Default)]
pub struct InMemoryRemote {
    documents: DashMap<DocumentKey, serde_json::Value>,
    calls: Mutex<Vec<RemoteCall>>,
    /// Errors returned (in order) by the next calls
    scripted: Mutex<VecDeque<RemoteError>>,
    /// Errors returned by the next calls after they were applied
    lost_replies: Mutex<VecDeque<RemoteError>>,
    /// Documents the store always refuses to write
    rejected: DashMap<String, RemoteError>,
    unreachable: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next call with `err`. Calls queue up in order.
    pub fn fail_next(&self, err: RemoteError) {
        lock(&self.scripted).push_back(err);
    }

    /// Apply the next call but answer it with `err`, as when the reply is
    /// lost on the way back.
    pub fn lose_next_reply(&self, err: RemoteError) {
        lock(&self.lost_replies).push_back(err);
    }

    /// Refuse every write to `doc_id` with `err`.
    pub fn reject_document(&self, doc_id: impl Into<String>, err: RemoteError) {
        self.rejected.insert(doc_id.into(), err);
    }

    /// Simulate losing (or regaining) the network.
    pub fn set_reachable(&self, reachable: bool) {
        self.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Delay every call, so concurrent callers overlap.
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.latency) = Some(latency);
    }

    /// Stored document, if any.
    pub fn document(
        &self,
        user_id: &str,
        entity_type: EntityType,
        doc_id: &str,
    ) -> Option<serde_json::Value> {
        self.documents
            .get(&(user_id.to_string(), entity_type, doc_id.to_string()))
            .map(|doc| doc.clone())
    }

    /// Number of stored documents across users.
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Every call received so far, successful or not.
    pub fn calls(&self) -> Vec<RemoteCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    async fn begin_call(
        &self,
        kind: OperationKind,
        user_id: &str,
        entity_type: EntityType,
        doc_id: &str,
    ) -> Result<DocumentKey, RemoteError> {
        lock(&self.calls).push(RemoteCall {
            kind,
            user_id: user_id.to_string(),
            entity_type,
            doc_id: doc_id.to_string(),
        });

        let latency = *lock(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RemoteError::Unreachable("connection refused".into()));
        }
        let scripted = lock(&self.scripted).pop_front();
        if let Some(err) = scripted {
            return Err(err);
        }
        if let Some(err) = self.rejected.get(doc_id).map(|err| err.clone()) {
            return Err(err);
        }

        Ok((user_id.to_string(), entity_type, doc_id.to_string()))
    }

    fn reply(&self) -> Result<(), RemoteError> {
        match lock(&self.lost_replies).pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl RemoteStore for InMemoryRemote {
    async fn create(
        &self,
        user_id: &str,
        entity_type: EntityType,
        doc_id: &str,
        document: &serde_json::Value,
    ) -> Result<(), RemoteError> {
        let key = self
            .begin_call(OperationKind::Create, user_id, entity_type, doc_id)
            .await?;
        self.documents.insert(key, document.clone());
        self.reply()
    }

    async fn update(
        &self,
        user_id: &str,
        entity_type: EntityType,
        doc_id: &str,
        patch: &serde_json::Value,
    ) -> Result<(), RemoteError> {
        let key = self
            .begin_call(OperationKind::Update, user_id, entity_type, doc_id)
            .await?;
        let mut doc = self.documents.get_mut(&key).ok_or_else(|| RemoteError::Status {
            status: 404,
            message: format!("{}/{} not found", entity_type.collection(), doc_id),
        })?;

        if let (Some(target), Some(fields)) = (doc.as_object_mut(), patch.as_object()) {
            for (field, value) in fields {
                target.insert(field.clone(), value.clone());
            }
        }
        drop(doc);
        self.reply()
    }

    async fn delete(
        &self,
        user_id: &str,
        entity_type: EntityType,
        doc_id: &str,
    ) -> Result<(), RemoteError> {
        let key = self
            .begin_call(OperationKind::Delete, user_id, entity_type, doc_id)
            .await?;
        self.documents.remove(&key);
        self.reply()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn create_update_delete() {
        let remote = InMemoryRemote::new();
        remote
            .create("user-1", EntityType::Expense, "exp-1", &json!({"description": "Kopi", "amount": 25000}))
            .await
            .unwrap();
        remote
            .update("user-1", EntityType::Expense, "exp-1", &json!({"amount": 30000}))
            .await
            .unwrap();

        assert_eq!(
            remote.document("user-1", EntityType::Expense, "exp-1"),
            Some(json!({"description": "Kopi", "amount": 30000}))
        );

        remote
            .delete("user-1", EntityType::Expense, "exp-1")
            .await
            .unwrap();
        assert_eq!(remote.document_count(), 0);
        assert_eq!(remote.call_count(), 3);
    }

    #[tokio::test]
    async fn update_of_missing_document_is_permanent() {
        let remote = InMemoryRemote::new();
        let err = remote
            .update("user-1", EntityType::Income, "inc-1", &json!({"amount": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Status { status: 404, .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn injected_failures() {
        let remote = InMemoryRemote::new();
        remote.fail_next(RemoteError::Timeout);

        let doc = json!({"description": "Kopi", "amount": 1});
        assert_eq!(
            remote.create("user-1", EntityType::Expense, "a", &doc).await,
            Err(RemoteError::Timeout)
        );
        assert!(remote.create("user-1", EntityType::Expense, "a", &doc).await.is_ok());

        remote.set_reachable(false);
        assert!(remote
            .delete("user-1", EntityType::Expense, "a")
            .await
            .unwrap_err()
            .is_transient());
        assert!(remote.document("user-1", EntityType::Expense, "a").is_some());
    }

    #[tokio::test]
    async fn lost_reply_still_applies_write() {
        let remote = InMemoryRemote::new();
        remote.lose_next_reply(RemoteError::Timeout);

        let doc = json!({"description": "Kopi", "amount": 1});
        assert_eq!(
            remote.create("user-1", EntityType::Expense, "a", &doc).await,
            Err(RemoteError::Timeout)
        );
        assert_eq!(remote.document("user-1", EntityType::Expense, "a"), Some(doc));
    }

    #[tokio::test]
    async fn documents_are_per_user() {
        let remote = InMemoryRemote::new();
        let doc = json!({"description": "Kopi", "amount": 1});
        remote.create("user-1", EntityType::Expense, "a", &doc).await.unwrap();

        assert!(remote.document("user-2", EntityType::Expense, "a").is_none());
        assert!(remote
            .update("user-2", EntityType::Expense, "a", &json!({"amount": 2}))
            .await
            .is_err());
    }
}
