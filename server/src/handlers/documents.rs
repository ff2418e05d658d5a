//! Document writes and reads.
//!
//! Every write is validated against the transaction schema before it
//! touches the database, and published to realtime listeners after it
//! succeeds.

use crate::db::{self, StoredDocument};
use crate::error::{AppError, Result};
use crate::websocket::{ChangeKind, ConnectionManager, ServerMessage};
use dompet_engine::{EntityType, OperationKind, Schema};
use sqlx::PgPool;

/// A document address: `users/{user_id}/{collection}/{doc_id}`.
#[derive(Debug, Clone)]
pub struct DocumentPath {
    pub user_id: String,
    pub entity_type: EntityType,
    pub doc_id: String,
}

impl DocumentPath {
    pub fn parse(user_id: String, collection: &str, doc_id: String) -> Result<Self> {
        let entity_type = EntityType::from_collection(collection)?;
        if doc_id.trim().is_empty() {
            return Err(AppError::BadRequest("document id must not be empty".into()));
        }
        Ok(Self {
            user_id,
            entity_type,
            doc_id,
        })
    }

    pub fn collection(&self) -> &'static str {
        self.entity_type.collection()
    }
}

/// Create or replace a document.
pub async fn handle_put(
    pool: &PgPool,
    schema: &Schema,
    conn_manager: &ConnectionManager,
    path: &DocumentPath,
    payload: serde_json::Value,
) -> Result<StoredDocument> {
    schema.validate(path.entity_type, OperationKind::Create, &payload)?;

    let document =
        db::put_document(pool, &path.user_id, path.collection(), &path.doc_id, &payload).await?;

    tracing::info!(
        user_id = %path.user_id,
        collection = path.collection(),
        doc_id = %path.doc_id,
        "Document stored"
    );

    conn_manager.publish(
        &path.user_id,
        path.collection(),
        ServerMessage::written(ChangeKind::Put, document.clone()),
    );

    Ok(document)
}

/// Merge a patch into an existing document.
pub async fn handle_patch(
    pool: &PgPool,
    schema: &Schema,
    conn_manager: &ConnectionManager,
    path: &DocumentPath,
    patch: serde_json::Value,
) -> Result<StoredDocument> {
    schema.validate(path.entity_type, OperationKind::Update, &patch)?;

    let document = db::merge_document(pool, &path.user_id, path.collection(), &path.doc_id, &patch)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{}/{}", path.collection(), path.doc_id)))?;

    tracing::info!(
        user_id = %path.user_id,
        collection = path.collection(),
        doc_id = %path.doc_id,
        "Document patched"
    );

    conn_manager.publish(
        &path.user_id,
        path.collection(),
        ServerMessage::written(ChangeKind::Patch, document.clone()),
    );

    Ok(document)
}

/// Delete a document. Deleting a missing document succeeds.
pub async fn handle_delete(
    pool: &PgPool,
    conn_manager: &ConnectionManager,
    path: &DocumentPath,
) -> Result<()> {
    let existed = db::delete_document(pool, &path.user_id, path.collection(), &path.doc_id).await?;

    if existed {
        tracing::info!(
            user_id = %path.user_id,
            collection = path.collection(),
            doc_id = %path.doc_id,
            "Document deleted"
        );
        conn_manager.publish(
            &path.user_id,
            path.collection(),
            ServerMessage::deleted(path.collection(), path.doc_id.clone()),
        );
    } else {
        tracing::debug!(doc_id = %path.doc_id, "Delete of missing document");
    }

    Ok(())
}

pub async fn handle_get(pool: &PgPool, path: &DocumentPath) -> Result<StoredDocument> {
    db::get_document(pool, &path.user_id, path.collection(), &path.doc_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{}/{}", path.collection(), path.doc_id)))
}

pub async fn handle_list(
    pool: &PgPool,
    user_id: &str,
    entity_type: EntityType,
) -> Result<Vec<StoredDocument>> {
    Ok(db::list_documents(pool, user_id, entity_type.collection()).await?)
}
