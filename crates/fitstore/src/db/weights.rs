// db/weights.rs
// Body weight entries

use super::pool::StorePool;
use crate::error::{Result, StoreError};
use chrono::NaiveDate;
use fitstore_types::WeightEntry;
use rusqlite::{Connection, OptionalExtension, params};
use std::sync::Arc;

/// (id, weight, dateIso, notes, recordedAt)
fn parse_weight_row(row: &rusqlite::Row) -> rusqlite::Result<WeightEntry> {
    Ok(WeightEntry {
        id: row.get(0)?,
        weight: row.get(1)?,
        date_iso: row.get(2)?,
        notes: row.get(3)?,
        recorded_at: row.get(4)?,
    })
}

pub fn add_weight_sync(
    conn: &Connection,
    weight: f64,
    date_iso: &str,
    notes: Option<&str>,
    recorded_at: i64,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO weight_entries (weight, dateIso, notes, recordedAt) VALUES (?, ?, ?, ?)",
        params![weight, date_iso, notes, recorded_at],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Entries with `from <= dateIso <= to`, oldest first
pub fn list_weights_in_range_sync(conn: &Connection, from: &str, to: &str) -> rusqlite::Result<Vec<WeightEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, weight, dateIso, notes, recordedAt FROM weight_entries
         WHERE dateIso BETWEEN ? AND ?
         ORDER BY dateIso ASC, recordedAt ASC",
    )?;
    let rows = stmt.query_map(params![from, to], parse_weight_row)?;
    rows.collect()
}

pub fn latest_weight_sync(conn: &Connection) -> rusqlite::Result<Option<WeightEntry>> {
    conn.query_row(
        "SELECT id, weight, dateIso, notes, recordedAt FROM weight_entries
         ORDER BY recordedAt DESC, id DESC LIMIT 1",
        [],
        parse_weight_row,
    )
    .optional()
}

pub fn delete_weight_sync(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    Ok(conn.execute("DELETE FROM weight_entries WHERE id = ?", [id])? > 0)
}

/// Row access to `weight_entries`
#[derive(Clone)]
pub struct WeightStore {
    pool: Arc<StorePool>,
}

impl WeightStore {
    pub fn new(pool: Arc<StorePool>) -> Self {
        Self { pool }
    }

    pub async fn add(&self, weight: f64, date: NaiveDate, notes: Option<String>) -> Result<i64> {
        if !weight.is_finite() || weight <= 0.0 {
            return Err(StoreError::InvalidInput(format!("weight must be positive, got {weight}")));
        }
        let date_iso = date.format("%Y-%m-%d").to_string();
        let recorded_at = chrono::Utc::now().timestamp();
        self.pool
            .run_with_retry(move |conn| add_weight_sync(conn, weight, &date_iso, notes.as_deref(), recorded_at))
            .await
    }

    pub async fn in_range(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<WeightEntry>> {
        let from = from.format("%Y-%m-%d").to_string();
        let to = to.format("%Y-%m-%d").to_string();
        self.pool
            .run(move |conn| list_weights_in_range_sync(conn, &from, &to))
            .await
    }

    pub async fn latest(&self) -> Result<Option<WeightEntry>> {
        self.pool.run(latest_weight_sync).await
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        self.pool.run_with_retry(move |conn| delete_weight_sync(conn, id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_test_store;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn test_range_and_latest() {
        let (_dir, store) = setup_test_store().await;
        let weights = store.weights();

        weights.add(80.0, date("2024-01-01"), None).await.unwrap();
        let mid = weights.add(79.2, date("2024-01-15"), Some("after holidays".into())).await.unwrap();
        let last = weights.add(78.4, date("2024-02-01"), None).await.unwrap();

        let january = weights.in_range(date("2024-01-01"), date("2024-01-31")).await.unwrap();
        assert_eq!(january.len(), 2);
        assert_eq!(january[1].id, mid);
        assert_eq!(january[1].notes.as_deref(), Some("after holidays"));

        assert_eq!(weights.latest().await.unwrap().unwrap().id, last);
        assert!(weights.delete(last).await.unwrap());
        assert_eq!(weights.latest().await.unwrap().unwrap().id, mid);
    }

    #[tokio::test]
    async fn test_rejects_non_positive_weight() {
        let (_dir, store) = setup_test_store().await;
        let err = store.weights().add(0.0, date("2024-01-01"), None).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
    }
}
