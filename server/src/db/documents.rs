//! Database operations for the documents table.

use serde::Serialize;
use sqlx::{PgPool, Row};

/// A stored document row from the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    #[serde(rename = "id")]
    pub doc_id: String,
    pub collection: String,
    #[serde(rename = "data")]
    pub payload: serde_json::Value,
    pub created_at: i64,
    pub updated_at: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredDocument {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredDocument {
            collection: row.try_get("collection")?,
            doc_id: row.try_get("doc_id")?,
            payload: row.try_get("payload")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

const COLUMNS: &str = "collection, doc_id, payload, created_at, updated_at";

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Set the whole document, creating it if needed.
pub async fn put_document(
    pool: &PgPool,
    user_id: &str,
    collection: &str,
    doc_id: &str,
    payload: &serde_json::Value,
) -> Result<StoredDocument, sqlx::Error> {
    let now = now_ms();
    sqlx::query_as::<_, StoredDocument>(&format!(
        r#"
        INSERT INTO documents (user_id, collection, doc_id, payload, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        ON CONFLICT (user_id, collection, doc_id) DO UPDATE SET
            payload = EXCLUDED.payload,
            updated_at = EXCLUDED.updated_at
        RETURNING {COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(collection)
    .bind(doc_id)
    .bind(payload)
    .bind(now)
    .fetch_one(pool)
    .await
}

/// Merge top-level fields of `patch` into an existing document.
///
/// Returns `None` if the document does not exist.
pub async fn merge_document(
    pool: &PgPool,
    user_id: &str,
    collection: &str,
    doc_id: &str,
    patch: &serde_json::Value,
) -> Result<Option<StoredDocument>, sqlx::Error> {
    sqlx::query_as::<_, StoredDocument>(&format!(
        r#"
        UPDATE documents
        SET payload = payload || $4, updated_at = $5
        WHERE user_id = $1 AND collection = $2 AND doc_id = $3
        RETURNING {COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(collection)
    .bind(doc_id)
    .bind(patch)
    .bind(now_ms())
    .fetch_optional(pool)
    .await
}

/// Delete a document. Returns whether it existed.
pub async fn delete_document(
    pool: &PgPool,
    user_id: &str,
    collection: &str,
    doc_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM documents WHERE user_id = $1 AND collection = $2 AND doc_id = $3",
    )
    .bind(user_id)
    .bind(collection)
    .bind(doc_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_document(
    pool: &PgPool,
    user_id: &str,
    collection: &str,
    doc_id: &str,
) -> Result<Option<StoredDocument>, sqlx::Error> {
    sqlx::query_as::<_, StoredDocument>(&format!(
        "SELECT {COLUMNS} FROM documents WHERE user_id = $1 AND collection = $2 AND doc_id = $3"
    ))
    .bind(user_id)
    .bind(collection)
    .bind(doc_id)
    .fetch_optional(pool)
    .await
}

/// All documents of a user's collection, oldest first.
pub async fn list_documents(
    pool: &PgPool,
    user_id: &str,
    collection: &str,
) -> Result<Vec<StoredDocument>, sqlx::Error> {
    sqlx::query_as::<_, StoredDocument>(&format!(
        r#"
        SELECT {COLUMNS} FROM documents
        WHERE user_id = $1 AND collection = $2
        ORDER BY created_at ASC, doc_id ASC
        "#
    ))
    .bind(user_id)
    .bind(collection)
    .fetch_all(pool)
    .await
}
