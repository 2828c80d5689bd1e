// crates/fitstore/src/db/migration_helpers.rs
// Schema introspection helpers shared by the executor, verifier and opener

use rusqlite::{Connection, OptionalExtension};

/// Bookkeeping table written alongside every applied step
pub const HISTORY_TABLE: &str = "schema_history";

/// Quote an identifier for interpolation into DDL
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Check if a table exists in the database
pub fn table_exists(conn: &Connection, table_name: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1",
        [table_name],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}

/// Check if a column exists in a table
pub fn column_exists(conn: &Connection, table_name: &str, column_name: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM pragma_table_info(?1) WHERE name=?2",
        [table_name, column_name],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}

/// Check if an index exists (any table)
pub fn index_exists(conn: &Connection, index_name: &str) -> rusqlite::Result<bool> {
    Ok(index_table(conn, index_name)?.is_some())
}

/// Column as reported by `PRAGMA table_info`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub decl_type: String,
    pub not_null: bool,
    pub default: Option<String>,
    pub pk: i64,
}

/// List a table's columns in declaration order (empty if the table is missing)
pub fn table_columns(conn: &Connection, table_name: &str) -> rusqlite::Result<Vec<ColumnInfo>> {
    let mut stmt = conn.prepare(
        "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid",
    )?;
    let rows = stmt.query_map([table_name], |row| {
        Ok(ColumnInfo {
            name: row.get(0)?,
            decl_type: row.get(1)?,
            not_null: row.get::<_, i64>(2)? != 0,
            default: row.get(3)?,
            pk: row.get(4)?,
        })
    })?;
    rows.collect()
}

/// Table an index belongs to, if the index exists
pub fn index_table(conn: &Connection, index_name: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT tbl_name FROM sqlite_master WHERE type='index' AND name=?1",
        [index_name],
        |row| row.get(0),
    )
    .optional()
}

/// Indexed column names in key order
pub fn index_columns(conn: &Connection, index_name: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")?;
    let rows = stmt.query_map([index_name], |row| row.get(0))?;
    rows.collect()
}

/// Foreign key edge as reported by `PRAGMA foreign_key_list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyInfo {
    pub from: String,
    pub ref_table: String,
    /// None when the clause references the parent's primary key implicitly
    pub ref_column: Option<String>,
    pub on_delete: String,
}

pub fn foreign_keys(conn: &Connection, table_name: &str) -> rusqlite::Result<Vec<ForeignKeyInfo>> {
    let mut stmt = conn.prepare(
        "SELECT \"from\", \"table\", \"to\", on_delete FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
    )?;
    let rows = stmt.query_map([table_name], |row| {
        Ok(ForeignKeyInfo {
            from: row.get(0)?,
            ref_table: row.get(1)?,
            ref_column: row.get(2)?,
            on_delete: row.get(3)?,
        })
    })?;
    rows.collect()
}

/// All application tables (engine-internal `sqlite_*` tables excluded)
pub fn user_tables(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    rows.collect()
}

/// All explicitly created indices as (name, table); implicit autoindexes excluded
pub fn user_indices(conn: &Connection) -> rusqlite::Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT name, tbl_name FROM sqlite_master
         WHERE type='index' AND sql IS NOT NULL AND name NOT LIKE 'sqlite_autoindex_%'
         ORDER BY name",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

/// Read the persisted schema version (`PRAGMA user_version`)
pub fn read_user_version(conn: &Connection) -> rusqlite::Result<u32> {
    let raw: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    // Negative values can only come from foreign writers; treat them as unversioned
    Ok(u32::try_from(raw).unwrap_or(0))
}

/// Write the schema version; callers do this inside the step transaction
pub fn write_user_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.pragma_update(None, "user_version", version)
}

pub fn foreign_keys_enabled(conn: &Connection) -> rusqlite::Result<bool> {
    let on: i64 = conn.pragma_query_value(None, "foreign_keys", |row| row.get(0))?;
    Ok(on != 0)
}

/// Rows violating foreign keys, as (child table, rowid, parent table)
pub fn foreign_key_violations(
    conn: &Connection,
) -> rusqlite::Result<Vec<(String, Option<i64>, String)>> {
    let mut stmt = conn.prepare("PRAGMA foreign_key_check")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
    rows.collect()
}

/// Create the history table if this store has never recorded a step
pub fn ensure_history_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {HISTORY_TABLE} (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at INTEGER NOT NULL
        )"
    ))
}

/// Record that `version` was reached
pub fn record_history(conn: &Connection, version: u32, description: &str) -> rusqlite::Result<()> {
    ensure_history_table(conn)?;
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO {HISTORY_TABLE} (version, description, applied_at) VALUES (?1, ?2, ?3)"
        ),
        rusqlite::params![version, description, chrono::Utc::now().timestamp()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_exists_in_memory() {
        let conn = Connection::open_in_memory().unwrap();

        assert!(!table_exists(&conn, "test_table").unwrap());
        conn.execute("CREATE TABLE test_table (id INTEGER)", []).unwrap();
        assert!(table_exists(&conn, "test_table").unwrap());
    }

    #[test]
    fn test_column_exists_in_memory() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE test_table (id INTEGER, name TEXT)", [])
            .unwrap();

        assert!(column_exists(&conn, "test_table", "id").unwrap());
        assert!(column_exists(&conn, "test_table", "name").unwrap());
        assert!(!column_exists(&conn, "test_table", "email").unwrap());
        assert!(!column_exists(&conn, "missing_table", "id").unwrap());
    }

    #[test]
    fn test_table_columns_reports_shape() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, title TEXT NOT NULL DEFAULT '', score REAL)",
        )
        .unwrap();

        let cols = table_columns(&conn, "t").unwrap();
        assert_eq!(cols.len(), 3);
        assert_eq!(cols[0].name, "id");
        assert_eq!(cols[0].pk, 1);
        assert_eq!(cols[1].decl_type, "TEXT");
        assert!(cols[1].not_null);
        assert_eq!(cols[1].default.as_deref(), Some("''"));
        assert!(!cols[2].not_null);
        assert!(table_columns(&conn, "nope").unwrap().is_empty());
    }

    #[test]
    fn test_index_introspection() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (a TEXT PRIMARY KEY, b INTEGER, c INTEGER);
             CREATE INDEX idx_t_b_c ON t (b, c);",
        )
        .unwrap();

        assert_eq!(index_table(&conn, "idx_t_b_c").unwrap().as_deref(), Some("t"));
        assert_eq!(index_columns(&conn, "idx_t_b_c").unwrap(), vec!["b", "c"]);
        assert!(!index_exists(&conn, "idx_missing").unwrap());

        // The TEXT primary key autoindex is not reported as a user index
        let indices = user_indices(&conn).unwrap();
        assert_eq!(indices, vec![("idx_t_b_c".to_string(), "t".to_string())]);
    }

    #[test]
    fn test_foreign_keys_listed() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE parent (id TEXT PRIMARY KEY);
             CREATE TABLE child (id INTEGER PRIMARY KEY, parentId TEXT,
                FOREIGN KEY(parentId) REFERENCES parent(id) ON DELETE CASCADE);",
        )
        .unwrap();

        let fks = foreign_keys(&conn, "child").unwrap();
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].from, "parentId");
        assert_eq!(fks[0].ref_table, "parent");
        assert_eq!(fks[0].ref_column.as_deref(), Some("id"));
        assert_eq!(fks[0].on_delete, "CASCADE");
    }

    #[test]
    fn test_user_version_round_trip() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(read_user_version(&conn).unwrap(), 0);
        write_user_version(&conn, 14).unwrap();
        assert_eq!(read_user_version(&conn).unwrap(), 14);
    }

    #[test]
    fn test_history_records_replace() {
        let conn = Connection::open_in_memory().unwrap();
        record_history(&conn, 6, "first").unwrap();
        record_history(&conn, 6, "again").unwrap();

        let (count, description): (i64, String) = conn
            .query_row(
                "SELECT COUNT(*), MAX(description) FROM schema_history",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(description, "again");
    }

    #[test]
    fn test_quote_ident_escapes() {
        assert_eq!(quote_ident("order"), "\"order\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
