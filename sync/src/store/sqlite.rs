//! SQLite pending store.
//!
//! One row per operation. `seq` is the row key and the queue order; the
//! operation itself is stored as a versioned JSON document (see
//! [`dompet_engine::encode_operation`]) next to the indexed columns the
//! queries need. The pool holds a single connection and every mutation runs
//! in a transaction, so enqueue, status changes and removal never interleave.

use super::{PendingStore, StoreResult};
use async_trait::async_trait;
use dompet_engine::{
    decode_operation, encode_operation, plan_enqueue, EnqueueOutcome, Error, OperationStatus,
    PendingOperation, PERSIST_FORMAT_VERSION,
};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteRow, SqliteSynchronous,
};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

/// A stored operation row.
#[derive(Debug)]
struct OperationRow {
    seq: i64,
    body: String,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for OperationRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(OperationRow {
            seq: row.try_get("seq")?,
            body: row.try_get("body")?,
        })
    }
}

impl OperationRow {
    fn decode(&self) -> Result<PendingOperation, Error> {
        decode_operation(&self.body, self.seq as u64)
    }
}

/// Decode rows for listing. Rows this build cannot read stay in the table
/// untouched and are left out of the listing.
fn decode_rows(rows: Vec<OperationRow>) -> Vec<PendingOperation> {
    rows.into_iter()
        .filter_map(|row| match row.decode() {
            Ok(op) => Some(op),
            Err(e) => {
                tracing::warn!(seq = row.seq, error = %e, "Skipping unreadable pending operation");
                None
            }
        })
        .collect()
}

async fn load(conn: &mut SqliteConnection, op_id: &str) -> StoreResult<Option<PendingOperation>> {
    let row = sqlx::query_as::<_, OperationRow>(
        "SELECT seq, body FROM pending_operations WHERE op_id = ?",
    )
    .bind(op_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|row| row.decode()).transpose()?)
}

async fn save(conn: &mut SqliteConnection, op: &PendingOperation) -> StoreResult<()> {
    sqlx::query(
        r#"
        UPDATE pending_operations
        SET status = ?, format_version = ?, body = ?
        WHERE op_id = ?
        "#,
    )
    .bind(op.status.as_str())
    .bind(PERSIST_FORMAT_VERSION as i64)
    .bind(encode_operation(op)?)
    .bind(&op.id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// [`PendingStore`] backed by a SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the store at a `sqlite://` URL.
    pub async fn open(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full);
        Self::connect(options).await
    }

    /// Open (or create) the store at a file path.
    pub async fn open_path(path: impl AsRef<Path>) -> StoreResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full);
        Self::connect(options).await
    }

    /// A throwaway in-memory database.
    pub async fn in_memory() -> StoreResult<Self> {
        Self::connect(SqliteConnectOptions::from_str("sqlite::memory:")?).await
    }

    async fn connect(options: SqliteConnectOptions) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Close the pool, flushing the database file.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Load, change and write back one operation. `false` if it is gone.
    async fn transition<F>(&self, op_id: &str, change: F) -> StoreResult<bool>
    where
        F: FnOnce(&mut PendingOperation) -> dompet_engine::error::Result<()> + Send,
    {
        let mut tx = self.pool.begin().await?;
        let Some(mut op) = load(&mut *tx, op_id).await? else {
            return Ok(false);
        };
        change(&mut op)?;
        save(&mut *tx, &op).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn requeue_where(&self, user_id: &str, status: OperationStatus) -> StoreResult<usize> {
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query_as::<_, OperationRow>(
            "SELECT seq, body FROM pending_operations WHERE user_id = ? AND status = ? ORDER BY seq",
        )
        .bind(user_id)
        .bind(status.as_str())
        .fetch_all(&mut *tx)
        .await?;

        let ops = decode_rows(rows);
        for op in &ops {
            let mut op = op.clone();
            op.requeue();
            save(&mut *tx, &op).await?;
        }
        tx.commit().await?;

        Ok(ops.len())
    }

    async fn list_where(&self, user_id: &str, failed_only: bool) -> StoreResult<Vec<PendingOperation>> {
        let sql = if failed_only {
            "SELECT seq, body FROM pending_operations WHERE user_id = ? AND status = 'failed' ORDER BY seq"
        } else {
            "SELECT seq, body FROM pending_operations WHERE user_id = ? ORDER BY seq"
        };
        let rows = sqlx::query_as::<_, OperationRow>(sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(decode_rows(rows))
    }
}

#[async_trait]
impl PendingStore for SqliteStore {
    async fn enqueue(&self, mut op: PendingOperation) -> StoreResult<EnqueueOutcome> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query_as::<_, OperationRow>(
            r#"
            SELECT seq, body FROM pending_operations
            WHERE user_id = ? AND entity_type = ? AND target_id = ?
            ORDER BY seq
            "#,
        )
        .bind(&op.user_id)
        .bind(op.entity_type.to_string())
        .bind(&op.target_id)
        .fetch_all(&mut *tx)
        .await?;

        let plan = plan_enqueue(&decode_rows(rows), &op);

        for id in &plan.cancel {
            sqlx::query("DELETE FROM pending_operations WHERE op_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        if !plan.insert {
            tx.commit().await?;
            tracing::debug!(op_id = %op.id, cancelled = plan.cancel.len(), "Delete superseded local writes");
            return Ok(EnqueueOutcome::Superseded {
                cancelled: plan.cancel,
            });
        }

        op.status = OperationStatus::Pending;
        let result = sqlx::query(
            r#"
            INSERT INTO pending_operations (
                op_id, user_id, entity_type, target_id, status,
                format_version, body, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&op.id)
        .bind(&op.user_id)
        .bind(op.entity_type.to_string())
        .bind(&op.target_id)
        .bind(op.status.as_str())
        .bind(PERSIST_FORMAT_VERSION as i64)
        .bind(encode_operation(&op)?)
        .bind(op.created_at as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let sequence = result.last_insert_rowid() as u64;
        tracing::debug!(op_id = %op.id, user_id = %op.user_id, sequence, "Operation queued");

        Ok(EnqueueOutcome::Queued {
            op_id: op.id,
            sequence,
            cancelled: plan.cancel,
        })
    }

    async fn list_pending(&self, user_id: &str) -> StoreResult<Vec<PendingOperation>> {
        self.list_where(user_id, false).await
    }

    async fn remove(&self, op_id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM pending_operations WHERE op_id = ?")
            .bind(op_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, user_id: &str) -> StoreResult<usize> {
        // Rows from a newer format are never drained, so they are not pending
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM pending_operations
            WHERE user_id = ? AND status != 'failed' AND format_version <= ?
            "#,
        )
        .bind(user_id)
        .bind(PERSIST_FORMAT_VERSION as i64)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as usize)
    }

    async fn clear(&self, user_id: &str) -> StoreResult<usize> {
        let result = sqlx::query("DELETE FROM pending_operations WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn begin(&self, op_id: &str) -> StoreResult<bool> {
        self.transition(op_id, |op| op.mark_syncing()).await
    }

    async fn release(&self, op_id: &str, reason: &str) -> StoreResult<()> {
        if !self.transition(op_id, |op| op.mark_retry(reason)).await? {
            return Err(Error::OperationNotFound(op_id.to_string()).into());
        }
        Ok(())
    }

    async fn fail(&self, op_id: &str, reason: &str) -> StoreResult<()> {
        if !self.transition(op_id, |op| op.mark_failed(reason)).await? {
            return Err(Error::OperationNotFound(op_id.to_string()).into());
        }
        Ok(())
    }

    async fn requeue_interrupted(&self, user_id: &str) -> StoreResult<usize> {
        self.requeue_where(user_id, OperationStatus::Syncing).await
    }

    async fn retry_failed(&self, user_id: &str) -> StoreResult<usize> {
        self.requeue_where(user_id, OperationStatus::Failed).await
    }

    async fn discard(&self, op_id: &str) -> StoreResult<PendingOperation> {
        let mut tx = self.pool.begin().await?;
        let op = load(&mut *tx, op_id)
            .await?
            .ok_or_else(|| Error::OperationNotFound(op_id.to_string()))?;

        if op.status != OperationStatus::Failed {
            return Err(Error::InvalidTransition {
                op_id: op.id,
                from: op.status,
                to: OperationStatus::Failed,
            }
            .into());
        }

        sqlx::query("DELETE FROM pending_operations WHERE op_id = ?")
            .bind(op_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(op)
    }

    async fn failed(&self, user_id: &str) -> StoreResult<Vec<PendingOperation>> {
        self.list_where(user_id, true).await
    }
}
