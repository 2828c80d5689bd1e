// db/sync_operations.rs
// Offline sync queue: operations recorded while offline, replayed later

use super::pool::StorePool;
use crate::error::{Result, StoreError};
use chrono::Utc;
use fitstore_types::SyncOperation;
use rusqlite::{Connection, OptionalExtension, params};
use std::sync::Arc;
use tracing::{debug, warn};

/// Base delay before the first retry; doubles per attempt up to `MAX_RETRY_DELAY_SECS`
const BASE_RETRY_DELAY_SECS: i64 = 30;
const MAX_RETRY_DELAY_SECS: i64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Completed,
    Failed,
}

const SYNC_COLUMNS: &str = "id, operationType, operationData, timestamp, retryCount, maxRetries, status, \
     priority, errorMessage, lastAttemptAt, nextRetryAt, createdAt, completedAt";

fn parse_sync_row(row: &rusqlite::Row) -> rusqlite::Result<SyncOperation> {
    Ok(SyncOperation {
        id: row.get(0)?,
        operation_type: row.get(1)?,
        operation_data: row.get(2)?,
        timestamp: row.get(3)?,
        retry_count: row.get(4)?,
        max_retries: row.get(5)?,
        status: row.get(6)?,
        priority: row.get(7)?,
        error_message: row.get(8)?,
        last_attempt_at: row.get(9)?,
        next_retry_at: row.get(10)?,
        created_at: row.get(11)?,
        completed_at: row.get(12)?,
    })
}

fn retry_delay(retry_count: i64) -> i64 {
    let exponent = retry_count.clamp(0, 16) as u32;
    (BASE_RETRY_DELAY_SECS * 2_i64.pow(exponent)).min(MAX_RETRY_DELAY_SECS)
}

/// Insert a pending operation; `maxRetries` and `retryCount` take their column defaults
pub fn enqueue_operation_sync(
    conn: &Connection,
    id: &str,
    operation_type: &str,
    operation_data: &str,
    priority: i64,
    now: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO sync_operations (id, operationType, operationData, timestamp, status, priority, createdAt)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            operation_type,
            operation_data,
            now,
            SyncStatus::Pending.to_string(),
            priority,
            now
        ],
    )?;
    Ok(())
}

pub fn get_operation_sync(conn: &Connection, id: &str) -> rusqlite::Result<Option<SyncOperation>> {
    conn.query_row(
        &format!("SELECT {SYNC_COLUMNS} FROM sync_operations WHERE id = ?"),
        [id],
        parse_sync_row,
    )
    .optional()
}

/// Pending operations whose retry time has come, highest priority then oldest first
pub fn list_due_sync(conn: &Connection, now: i64, limit: usize) -> rusqlite::Result<Vec<SyncOperation>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SYNC_COLUMNS} FROM sync_operations
         WHERE status = ? AND (nextRetryAt IS NULL OR nextRetryAt <= ?)
         ORDER BY priority DESC, timestamp ASC
         LIMIT ?"
    ))?;
    let rows = stmt.query_map(
        params![SyncStatus::Pending.to_string(), now, limit as i64],
        parse_sync_row,
    )?;
    rows.collect()
}

pub fn mark_completed_sync(conn: &Connection, id: &str, now: i64) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE sync_operations SET status = ?, completedAt = ?, lastAttemptAt = ?, nextRetryAt = NULL
         WHERE id = ?",
        params![SyncStatus::Completed.to_string(), now, now, id],
    )?;
    Ok(changed > 0)
}

/// Count a failed attempt. Schedules the next retry, or gives up once
/// `maxRetries` attempts have failed. Returns the resulting status.
pub fn mark_failed_sync(conn: &Connection, id: &str, error: &str, now: i64) -> Result<SyncStatus> {
    let op = get_operation_sync(conn, id)?.ok_or_else(|| StoreError::NotFound(format!("sync operation {id}")))?;
    let retry_count = op.retry_count + 1;

    let (status, next_retry_at) = if retry_count >= op.max_retries {
        warn!(id, retry_count, "sync operation gave up");
        (SyncStatus::Failed, None)
    } else {
        (SyncStatus::Pending, Some(now + retry_delay(op.retry_count)))
    };

    conn.execute(
        "UPDATE sync_operations
         SET retryCount = ?, status = ?, errorMessage = ?, lastAttemptAt = ?, nextRetryAt = ?
         WHERE id = ?",
        params![retry_count, status.to_string(), error, now, next_retry_at, id],
    )?;
    debug!(id, retry_count, status = %status, "sync operation attempt failed");
    Ok(status)
}

/// Delete completed operations finished before `before`
pub fn purge_completed_sync(conn: &Connection, before: i64) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM sync_operations WHERE status = ? AND completedAt < ?",
        params![SyncStatus::Completed.to_string(), before],
    )
}

/// Row access to `sync_operations`
#[derive(Clone)]
pub struct SyncQueue {
    pool: Arc<StorePool>,
}

impl SyncQueue {
    pub fn new(pool: Arc<StorePool>) -> Self {
        Self { pool }
    }

    /// Returns the generated operation id
    pub async fn enqueue(&self, operation_type: &str, operation_data: serde_json::Value, priority: i64) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let operation_type = operation_type.to_string();
        let data = serde_json::to_string(&operation_data)?;
        let now = Utc::now().timestamp();
        let op_id = id.clone();
        self.pool
            .run_with_retry(move |conn| enqueue_operation_sync(conn, &op_id, &operation_type, &data, priority, now))
            .await?;
        Ok(id)
    }

    pub async fn get(&self, id: &str) -> Result<Option<SyncOperation>> {
        let id = id.to_string();
        self.pool.run(move |conn| get_operation_sync(conn, &id)).await
    }

    pub async fn due(&self, limit: usize) -> Result<Vec<SyncOperation>> {
        self.due_at(Utc::now().timestamp(), limit).await
    }

    pub async fn due_at(&self, now: i64, limit: usize) -> Result<Vec<SyncOperation>> {
        self.pool.run(move |conn| list_due_sync(conn, now, limit)).await
    }

    pub async fn mark_completed(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        let now = Utc::now().timestamp();
        self.pool.run_with_retry(move |conn| mark_completed_sync(conn, &id, now)).await
    }

    pub async fn mark_failed(&self, id: &str, error: &str) -> Result<SyncStatus> {
        let id = id.to_string();
        let error = error.to_string();
        let now = Utc::now().timestamp();
        self.pool
            .run_with_retry(move |conn| mark_failed_sync(conn, &id, &error, now))
            .await
    }

    pub async fn purge_completed(&self, before: i64) -> Result<usize> {
        self.pool.run_with_retry(move |conn| purge_completed_sync(conn, before)).await
    }
}
