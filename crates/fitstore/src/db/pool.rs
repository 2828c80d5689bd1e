// crates/fitstore/src/db/pool.rs
// Async connection pool over a store that the opener has already made ready
//
// Schema work never happens here: by the time a `StorePool` exists the store
// is at the required version and verified. The pool only configures each new
// connection (WAL, foreign keys, busy timeout) and hands connections to
// closures on the blocking thread pool.
//
// ## Preferred pattern: pool.run()
// ```ignore
// let recipe = pool.run(move |conn| get_recipe_sync(conn, &id)).await?;
// ```
//
// ## Lower level: pool.interact()
// Use when `anyhow::Result` is more convenient than `StoreError`.

use crate::error::StoreError;
use anyhow::{Context, Result};
use deadpool_sqlite::{Config, Hook, Pool, Runtime};
use rusqlite::Connection;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// SQLITE_BUSY (file contention) or SQLITE_LOCKED (table lock held by another connection)
fn is_rusqlite_contention(err: &rusqlite::Error) -> bool {
    use rusqlite::ffi;
    matches!(
        err,
        rusqlite::Error::SqliteFailure(
            ffi::Error {
                code: ffi::ErrorCode::DatabaseBusy | ffi::ErrorCode::DatabaseLocked,
                ..
            },
            _,
        )
    )
}

fn is_store_contention(err: &StoreError) -> bool {
    match err {
        StoreError::Db(rusqlite_err) => is_rusqlite_contention(rusqlite_err),
        _ => false,
    }
}

/// Backoff between contention retries (100ms, 500ms, 2s)
const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_millis(100),
    Duration::from_millis(500),
    Duration::from_millis(2000),
];

/// Calls `op` up to `RETRY_DELAYS.len() + 1` times, sleeping while `is_retryable` holds
async fn retry_with_backoff<F, Fut, R, E>(mut op: F, is_retryable: impl Fn(&E) -> bool) -> Result<R, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<R, E>>,
    E: std::fmt::Display,
{
    for (attempt, delay) in RETRY_DELAYS.iter().enumerate() {
        match op().await {
            Ok(result) => return Ok(result),
            Err(e) if is_retryable(&e) => {
                tracing::warn!(
                    attempt = attempt + 1,
                    max = RETRY_DELAYS.len(),
                    ?delay,
                    error = %e,
                    "SQLite contention, retrying"
                );
                tokio::time::sleep(*delay).await;
            }
            Err(e) => return Err(e),
        }
    }
    op().await
}

/// Per-connection settings applied by the post-create hook
#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub max_size: usize,
    pub busy_timeout_ms: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: 8,
            busy_timeout_ms: 5000,
        }
    }
}

/// Pooled access to a ready store
pub struct StorePool {
    pool: Pool,
    path: PathBuf,
}

impl StorePool {
    /// Pool over the store file at `path`. The file must already exist.
    pub async fn open(path: &Path, settings: PoolSettings) -> Result<Self> {
        let conn_str = path.to_string_lossy().into_owned();
        let hook = make_file_post_create_hook(path.to_path_buf(), settings.busy_timeout_ms);

        let pool = Config::new(&conn_str)
            .builder(Runtime::Tokio1)
            .context("Failed to create pool builder")?
            .max_size(settings.max_size)
            .post_create(hook)
            .build()
            .context("Failed to build connection pool")?;

        let store = Self {
            pool,
            path: path.to_path_buf(),
        };
        // Surface setup failures now rather than on first use
        store
            .interact(|conn| {
                if let Err(e) = conn.execute_batch("PRAGMA optimize") {
                    tracing::debug!(error = %e, "PRAGMA optimize skipped");
                }
                Ok(())
            })
            .await?;
        Ok(store)
    }

    /// Run a closure with a pooled connection on the blocking thread pool
    pub async fn interact<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get connection from pool")?;

        conn.interact(move |conn| f(conn))
            .await
            .map_err(|e| anyhow::anyhow!("interact failed: {e}"))?
    }

    /// Run a closure whose error converts into `StoreError`
    pub async fn run<F, R, E>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Connection) -> Result<R, E> + Send + 'static,
        R: Send + 'static,
        E: Into<StoreError> + Send + 'static,
    {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Pool(format!("Failed to get connection: {e}")))?
            .interact(move |conn| f(conn).map_err(Into::into))
            .await
            .map_err(|e| StoreError::Pool(format!("Database error: {e}")))?
    }

    /// [`run`](Self::run) with backoff on SQLITE_BUSY / SQLITE_LOCKED
    pub async fn run_with_retry<F, R, E>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Connection) -> Result<R, E> + Send + Clone + 'static,
        R: Send + 'static,
        E: Into<StoreError> + Send + 'static,
    {
        retry_with_backoff(
            || {
                let f_clone = f.clone();
                self.run(f_clone)
            },
            is_store_contention,
        )
        .await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// `<path><suffix>`, e.g. `fit.db.pre-migration`
pub(crate) fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Consistent copy of the store taken with VACUUM INTO, replacing any previous one
pub(crate) fn backup_before_migration(conn: &Connection, path: &Path) -> Result<PathBuf> {
    let backup_path = sibling_path(path, ".pre-migration");
    // VACUUM INTO refuses an existing target
    if backup_path.exists() {
        std::fs::remove_file(&backup_path)
            .with_context(|| format!("Failed to remove old backup {}", backup_path.display()))?;
    }
    conn.execute("VACUUM INTO ?1", [backup_path.to_string_lossy().as_ref()])
        .context("Failed to create pre-migration backup")?;

    tracing::info!(backup = %backup_path.display(), "created pre-migration backup");
    Ok(backup_path)
}

/// Create the parent directory with 0o700 if it does not exist yet
pub(crate) fn ensure_parent_directory(path: &Path) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || parent.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create {}", parent.display()))?;
    #[cfg(unix)]
    {
        let mut perms = std::fs::metadata(parent)?.permissions();
        perms.set_mode(0o700);
        std::fs::set_permissions(parent, perms)?;
    }
    Ok(())
}

/// Post-create hook: connection PRAGMAs plus 0o600 on the store file
fn make_file_post_create_hook(path: PathBuf, busy_timeout_ms: u64) -> Hook {
    Hook::async_fn(move |conn, _metrics| {
        let path_for_perms = path.clone();
        Box::pin(async move {
            conn.interact(move |conn| {
                setup_connection(conn, busy_timeout_ms)?;

                #[cfg(unix)]
                if let Ok(metadata) = std::fs::metadata(&path_for_perms) {
                    let mut perms = metadata.permissions();
                    perms.set_mode(0o600);
                    if let Err(e) = std::fs::set_permissions(&path_for_perms, perms) {
                        tracing::warn!(error = %e, "failed to set store file permissions to 0600");
                    }
                }
                #[cfg(not(unix))]
                tracing::debug!(path = %path_for_perms.display(), "skipping file permission restriction");

                Ok::<_, rusqlite::Error>(())
            })
            .await
            .map_err(|e| deadpool_sqlite::HookError::Message(format!("interact failed: {e}").into()))?
            .map_err(|e| {
                deadpool_sqlite::HookError::Message(format!("connection setup failed: {e}").into())
            })
        })
    })
}

/// WAL, FK enforcement, busy timeout and NORMAL sync (safe with WAL)
fn setup_connection(conn: &Connection, busy_timeout_ms: u64) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "PRAGMA journal_mode=WAL; \
         PRAGMA foreign_keys=ON; \
         PRAGMA busy_timeout={busy_timeout_ms}; \
         PRAGMA synchronous=NORMAL; \
         PRAGMA journal_size_limit=32768;"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_pool() -> (tempfile::TempDir, StorePool) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("pool.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE water_entries (id INTEGER PRIMARY KEY, date TEXT NOT NULL, amountMl INTEGER NOT NULL)")
                .unwrap();
        }
        let pool = StorePool::open(&path, PoolSettings::default())
            .await
            .expect("Failed to open pool");
        (dir, pool)
    }

    #[tokio::test]
    async fn test_connections_are_configured() {
        let (_dir, pool) = temp_pool().await;
        let (mode, fk): (String, i64) = pool
            .interact(|conn| {
                let mode = conn.pragma_query_value(None, "journal_mode", |r| r.get(0))?;
                let fk = conn.pragma_query_value(None, "foreign_keys", |r| r.get(0))?;
                Ok((mode, fk))
            })
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        assert_eq!(fk, 1);
    }

    #[tokio::test]
    async fn test_concurrent_writes_with_retry() {
        let (_dir, pool) = temp_pool().await;
        let pool = std::sync::Arc::new(pool);

        let mut handles = Vec::new();
        for i in 0..10 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                pool.run_with_retry(move |conn| {
                    conn.execute(
                        "INSERT INTO water_entries (date, amountMl) VALUES ('2024-01-15', ?1)",
                        [250 + i],
                    )
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().expect("Concurrent write failed");
        }

        let count: i64 = pool
            .run(|conn| conn.query_row("SELECT COUNT(*) FROM water_entries", [], |r| r.get(0)))
            .await
            .unwrap();
        assert_eq!(count, 10);
    }

    #[tokio::test]
    async fn test_non_contention_error_fails_fast() {
        let (_dir, pool) = temp_pool().await;
        let result = pool
            .run_with_retry(|conn| conn.execute("INSERT INTO nowhere VALUES (1)", []))
            .await;
        assert!(matches!(result, Err(StoreError::Db(_))));
    }

    #[test]
    fn test_contention_detection() {
        let busy = || {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: rusqlite::ffi::ErrorCode::DatabaseBusy,
                    extended_code: 5,
                },
                None,
            )
        };
        assert!(is_rusqlite_contention(&busy()));
        assert!(is_store_contention(&StoreError::Db(busy())));
        assert!(!is_store_contention(&StoreError::Pool("database is locked".to_string())));

        let constraint = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ffi::ErrorCode::ConstraintViolation,
                extended_code: 19,
            },
            None,
        );
        assert!(!is_rusqlite_contention(&constraint));
    }

    #[test]
    fn test_backup_and_sibling_paths() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("fit.db");
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE weight_entries (id INTEGER PRIMARY KEY, weight REAL);
             INSERT INTO weight_entries (weight) VALUES (72.5);",
        )
        .unwrap();

        let backup = backup_before_migration(&conn, &db_path).unwrap();
        assert_eq!(backup, dir.path().join("fit.db.pre-migration"));
        // Second backup replaces the first
        backup_before_migration(&conn, &db_path).unwrap();

        let copy = Connection::open(&backup).unwrap();
        let weight: f64 = copy
            .query_row("SELECT weight FROM weight_entries", [], |r| r.get(0))
            .unwrap();
        assert_eq!(weight, 72.5);
    }

    #[test]
    fn test_ensure_parent_directory_creates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b").join("fit.db");
        ensure_parent_directory(&nested).unwrap();
        assert!(nested.parent().unwrap().is_dir());
        // Existing directories are left alone
        ensure_parent_directory(&nested).unwrap();
    }
}
