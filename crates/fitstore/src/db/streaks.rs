// db/streaks.rs
// Personal activity streaks

use super::pool::StorePool;
use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use fitstore_types::PersonalStreak;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use std::sync::Arc;

const SECONDS_PER_DAY: i64 = 86_400;

/// New streak, before it has an id
#[derive(Debug, Clone)]
pub struct NewStreak {
    pub name: String,
    pub description: String,
    pub category: String,
    pub target_days: Option<i64>,
}

/// (id, name, description, category, currentStreak, longestStreak,
///  lastActivityTimestamp, isActive, targetDays, createdAt)
pub fn parse_streak_row(row: &rusqlite::Row) -> rusqlite::Result<PersonalStreak> {
    Ok(PersonalStreak {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        current_streak: row.get(4)?,
        longest_streak: row.get(5)?,
        last_activity_timestamp: row.get(6)?,
        is_active: row.get::<_, i64>(7)? != 0,
        target_days: row.get(8)?,
        created_at: row.get(9)?,
    })
}

pub fn insert_streak_sync(conn: &Connection, streak: &NewStreak, created_at: i64) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO personal_streaks
            (name, description, category, currentStreak, longestStreak, isActive, targetDays, createdAt)
         VALUES (?, ?, ?, 0, 0, 1, ?, ?)",
        params![streak.name, streak.description, streak.category, streak.target_days, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_streak_sync(conn: &Connection, id: i64) -> rusqlite::Result<Option<PersonalStreak>> {
    conn.query_row(
        "SELECT id, name, description, category, currentStreak, longestStreak,
                lastActivityTimestamp, isActive, targetDays, createdAt
         FROM personal_streaks WHERE id = ?",
        [id],
        parse_streak_row,
    )
    .optional()
}

/// UTC day number of an epoch timestamp
fn day_of(timestamp: i64) -> i64 {
    timestamp.div_euclid(SECONDS_PER_DAY)
}

/// Next (current, longest) after an activity at `at`.
///
/// Same day keeps the count, the following day extends it, anything later
/// restarts at one. An activity older than the last one changes nothing.
fn advance(current: i64, longest: i64, last: Option<i64>, at: i64) -> (i64, i64) {
    let next = match last.map(|l| day_of(at) - day_of(l)) {
        None => 1,
        Some(gap) if gap < 0 => return (current, longest),
        Some(0) => current.max(1),
        Some(1) => current + 1,
        Some(_) => 1,
    };
    (next, longest.max(next))
}

/// Record activity at `at` (epoch seconds) and return the updated streak.
///
/// The read, update and re-read share one IMMEDIATE transaction, so concurrent
/// recorders on other connections queue behind the write lock.
pub fn record_activity_sync(conn: &Connection, id: i64, at: i64) -> Result<PersonalStreak> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let streak = get_streak_sync(&tx, id)?.ok_or_else(|| StoreError::NotFound(format!("streak {id}")))?;
    let (current, longest) = advance(
        streak.current_streak,
        streak.longest_streak,
        streak.last_activity_timestamp,
        at,
    );
    let last = streak.last_activity_timestamp.map_or(at, |l| l.max(at));
    tx.execute(
        "UPDATE personal_streaks
         SET currentStreak = ?, longestStreak = ?, lastActivityTimestamp = ?
         WHERE id = ?",
        params![current, longest, last, id],
    )?;
    let updated = get_streak_sync(&tx, id)?.ok_or_else(|| StoreError::NotFound(format!("streak {id}")))?;
    tx.commit()?;
    Ok(updated)
}

pub fn delete_streak_sync(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    Ok(conn.execute("DELETE FROM personal_streaks WHERE id = ?", [id])? > 0)
}

/// Row access to `personal_streaks`
#[derive(Clone)]
pub struct StreakStore {
    pool: Arc<StorePool>,
}

impl StreakStore {
    pub fn new(pool: Arc<StorePool>) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, streak: NewStreak) -> Result<i64> {
        if streak.name.trim().is_empty() {
            return Err(StoreError::InvalidInput("streak name must not be empty".into()));
        }
        let created_at = Utc::now().timestamp();
        self.pool
            .run_with_retry(move |conn| insert_streak_sync(conn, &streak, created_at))
            .await
    }

    pub async fn get(&self, id: i64) -> Result<Option<PersonalStreak>> {
        self.pool.run(move |conn| get_streak_sync(conn, id)).await
    }

    pub async fn record_activity(&self, id: i64, at: DateTime<Utc>) -> Result<PersonalStreak> {
        let at = at.timestamp();
        self.pool
            .run_with_retry(move |conn| record_activity_sync(conn, id, at))
            .await
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        self.pool.run_with_retry(move |conn| delete_streak_sync(conn, id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_test_store;
    use chrono::TimeZone;

    #[test]
    fn test_advance_rules() {
        let day = SECONDS_PER_DAY;
        assert_eq!(advance(0, 0, None, 10 * day), (1, 1));
        assert_eq!(advance(1, 1, Some(10 * day), 10 * day + 3600), (1, 1));
        assert_eq!(advance(1, 1, Some(10 * day), 11 * day), (2, 2));
        assert_eq!(advance(5, 5, Some(10 * day), 13 * day), (1, 5));
        assert_eq!(advance(3, 4, Some(10 * day), 9 * day), (3, 4));
    }

    #[tokio::test]
    async fn test_record_activity_builds_streak() {
        let (_dir, store) = setup_test_store().await;
        let streaks = store.streaks();
        let id = streaks
            .insert(NewStreak {
                name: "Workout".into(),
                description: "Train every day".into(),
                category: "fitness".into(),
                target_days: Some(30),
            })
            .await
            .unwrap();

        let jan10 = Utc.with_ymd_and_hms(2024, 1, 10, 7, 30, 0).unwrap();
        let jan11 = Utc.with_ymd_and_hms(2024, 1, 11, 21, 0, 0).unwrap();
        streaks.record_activity(id, jan10).await.unwrap();
        let streak = streaks.record_activity(id, jan11).await.unwrap();

        assert_eq!(streak.current_streak, 2);
        assert_eq!(streak.longest_streak, 2);
        assert_eq!(streak.last_activity_timestamp, Some(jan11.timestamp()));
        assert!(streak.is_active);

        assert!(streaks.delete(id).await.unwrap());
        assert!(streaks.get(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_activity_keeps_latest_timestamp() {
        let (_dir, store) = setup_test_store().await;
        let streaks = store.streaks();
        let id = streaks
            .insert(NewStreak {
                name: "Stretch".into(),
                description: "Morning stretch".into(),
                category: "mobility".into(),
                target_days: None,
            })
            .await
            .unwrap();

        let morning = Utc.with_ymd_and_hms(2024, 1, 10, 6, 0, 0).unwrap();
        let mut handles = Vec::new();
        for minute in 0..8 {
            let streaks = streaks.clone();
            let at = morning + chrono::Duration::minutes(minute);
            handles.push(tokio::spawn(async move { streaks.record_activity(id, at).await }));
        }
        for handle in handles {
            handle.await.unwrap().expect("Concurrent activity failed");
        }

        let streak = streaks.get(id).await.unwrap().unwrap();
        assert_eq!(streak.current_streak, 1);
        assert_eq!(
            streak.last_activity_timestamp,
            Some((morning + chrono::Duration::minutes(7)).timestamp())
        );
    }

    #[tokio::test]
    async fn test_record_activity_unknown_streak() {
        let (_dir, store) = setup_test_store().await;
        let err = store.streaks().record_activity(42, Utc::now()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
