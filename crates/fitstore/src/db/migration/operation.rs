// crates/fitstore/src/db/migration/operation.rs
// Structural operations: the vocabulary every migration step is written in

use crate::db::migration_helpers::quote_ident;
use rusqlite::types::Value;
use serde::Serialize;
use std::fmt;
use strum::{Display, EnumString};

/// SQLite storage classes used in declared column types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Integer,
    Text,
    Real,
    Blob,
}

impl ColumnType {
    /// Parse a declared type as reported by `PRAGMA table_info`
    pub fn from_declared(declared: &str) -> Option<Self> {
        declared.trim().parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    pub not_null: bool,
    /// Literal SQL default expression, e.g. `0` or `'pending'`
    pub default: Option<String>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            not_null: false,
            default: None,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Text)
    }

    pub fn real(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Real)
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn default_value(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    /// Column definition clause without any primary key decoration
    pub fn sql(&self) -> String {
        let mut sql = format!("{} {}", quote_ident(&self.name), self.column_type);
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(ref default) = self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryKey {
    /// `INTEGER PRIMARY KEY AUTOINCREMENT` on a single column
    AutoIncrement(String),
    /// Table-level `PRIMARY KEY(...)`
    Columns(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum OnDelete {
    #[strum(serialize = "NO ACTION")]
    NoAction,
    #[strum(serialize = "CASCADE")]
    Cascade,
    #[strum(serialize = "SET NULL")]
    SetNull,
    #[strum(serialize = "RESTRICT")]
    Restrict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
    pub on_delete: OnDelete,
}

/// Declared shape of one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Option<PrimaryKey>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
            foreign_keys: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// `INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL` id column
    pub fn autoincrement_id(mut self, name: &str) -> Self {
        self.columns.push(ColumnDef::integer(name).not_null());
        self.primary_key = Some(PrimaryKey::AutoIncrement(name.to_string()));
        self
    }

    pub fn int(self, name: &str) -> Self {
        self.column(ColumnDef::integer(name))
    }

    pub fn int_nn(self, name: &str) -> Self {
        self.column(ColumnDef::integer(name).not_null())
    }

    pub fn text(self, name: &str) -> Self {
        self.column(ColumnDef::text(name))
    }

    pub fn text_nn(self, name: &str) -> Self {
        self.column(ColumnDef::text(name).not_null())
    }

    pub fn real(self, name: &str) -> Self {
        self.column(ColumnDef::real(name))
    }

    pub fn real_nn(self, name: &str) -> Self {
        self.column(ColumnDef::real(name).not_null())
    }

    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = Some(PrimaryKey::Columns(
            columns.iter().map(|c| c.to_string()).collect(),
        ));
        self
    }

    pub fn foreign_key(mut self, column: &str, ref_table: &str, ref_column: &str, on_delete: OnDelete) -> Self {
        self.foreign_keys.push(ForeignKey {
            column: column.to_string(),
            ref_table: ref_table.to_string(),
            ref_column: ref_column.to_string(),
            on_delete,
        });
        self
    }

    pub fn column_named(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn create_sql(&self) -> String {
        self.create_sql_as(&self.name)
    }

    /// CREATE statement for this shape under another table name (shadow tables)
    pub fn create_sql_as(&self, table_name: &str) -> String {
        let mut parts = Vec::with_capacity(self.columns.len() + 1 + self.foreign_keys.len());
        for column in &self.columns {
            match self.primary_key {
                Some(PrimaryKey::AutoIncrement(ref pk)) if *pk == column.name => {
                    parts.push(format!(
                        "{} INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL",
                        quote_ident(&column.name)
                    ));
                }
                _ => parts.push(column.sql()),
            }
        }
        if let Some(PrimaryKey::Columns(ref cols)) = self.primary_key {
            let cols: Vec<String> = cols.iter().map(|c| quote_ident(c)).collect();
            parts.push(format!("PRIMARY KEY({})", cols.join(", ")));
        }
        for fk in &self.foreign_keys {
            parts.push(format!(
                "FOREIGN KEY({}) REFERENCES {}({}) ON UPDATE NO ACTION ON DELETE {}",
                quote_ident(&fk.column),
                quote_ident(&fk.ref_table),
                quote_ident(&fk.ref_column),
                fk.on_delete
            ));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(table_name),
            parts.join(", ")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexSpec {
    /// Index named `index_<table>_<col>_<col>`
    pub fn on(table: &str, columns: &[&str]) -> Self {
        Self::named(&format!("index_{}_{}", table, columns.join("_")), table, columns)
    }

    pub fn named(name: &str, table: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn create_sql(&self) -> String {
        let cols: Vec<String> = self.columns.iter().map(|c| quote_ident(c)).collect();
        format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
            if self.unique { "UNIQUE " } else { "" },
            quote_ident(&self.name),
            quote_ident(&self.table),
            cols.join(", ")
        )
    }
}

/// Per-value conversion applied while a rebuild copies rows
#[derive(Clone)]
pub enum RowTransform {
    /// `YYYY-MM-DD` (UTC midnight) or RFC 3339 text to epoch seconds
    IsoDateToEpochSeconds,
    Custom {
        name: &'static str,
        apply: fn(&Value) -> Result<Value, String>,
    },
}

impl RowTransform {
    pub fn name(&self) -> &str {
        match self {
            RowTransform::IsoDateToEpochSeconds => "iso_date_to_epoch_seconds",
            RowTransform::Custom { name, .. } => *name,
        }
    }

    pub fn apply(&self, value: &Value) -> Result<Value, String> {
        match self {
            RowTransform::IsoDateToEpochSeconds => super::transform::iso_date_to_epoch_seconds(value),
            RowTransform::Custom { apply, .. } => apply(value),
        }
    }
}

impl fmt::Debug for RowTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RowTransform({})", self.name())
    }
}

impl PartialEq for RowTransform {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSource {
    Copy(String),
    Transform { from: String, transform: RowTransform },
}

impl ColumnSource {
    pub fn source_column(&self) -> &str {
        match self {
            ColumnSource::Copy(col) => col,
            ColumnSource::Transform { from, .. } => from,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMapping {
    pub target: String,
    pub source: ColumnSource,
}

/// Shadow-table rebuild of `schema.name` into `schema`.
///
/// Target columns without a mapping receive their declared default (or NULL).
#[derive(Debug, Clone, PartialEq)]
pub struct RebuildTable {
    pub schema: TableSchema,
    pub mapping: Vec<ColumnMapping>,
}

impl RebuildTable {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            mapping: Vec::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.schema.name
    }

    pub fn shadow_name(&self) -> String {
        format!("{}__rebuild", self.schema.name)
    }

    /// Copy same-named columns unchanged
    pub fn copy(mut self, columns: &[&str]) -> Self {
        for col in columns {
            self.mapping.push(ColumnMapping {
                target: col.to_string(),
                source: ColumnSource::Copy(col.to_string()),
            });
        }
        self
    }

    pub fn copy_from(mut self, target: &str, source: &str) -> Self {
        self.mapping.push(ColumnMapping {
            target: target.to_string(),
            source: ColumnSource::Copy(source.to_string()),
        });
        self
    }

    pub fn transform(mut self, target: &str, from: &str, transform: RowTransform) -> Self {
        self.mapping.push(ColumnMapping {
            target: target.to_string(),
            source: ColumnSource::Transform {
                from: from.to_string(),
                transform,
            },
        });
        self
    }
}

/// `INSERT OR IGNORE INTO target SELECT ... FROM source`, skipped once the source is gone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRows {
    pub source: String,
    pub target: String,
    /// (target column, SQL expression over the source row)
    pub columns: Vec<(String, String)>,
    pub filter: Option<String>,
    /// Skip unless the source still has this column
    pub only_if_column: Option<String>,
    /// JSON array column whose elements each become one target row, exposed as `"element"`
    pub each_element_of: Option<String>,
}

impl CopyRows {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            columns: Vec::new(),
            filter: None,
            only_if_column: None,
            each_element_of: None,
        }
    }

    pub fn column(mut self, target: &str, expr: &str) -> Self {
        self.columns.push((target.to_string(), expr.to_string()));
        self
    }

    pub fn same(mut self, columns: &[&str]) -> Self {
        for col in columns {
            self.columns.push((col.to_string(), quote_ident(col)));
        }
        self
    }

    pub fn filter(mut self, predicate: &str) -> Self {
        self.filter = Some(predicate.to_string());
        self
    }

    pub fn only_if_column(mut self, column: &str) -> Self {
        self.only_if_column = Some(column.to_string());
        self
    }

    /// One target row per element of the JSON array in `column`.
    ///
    /// Values that are not a JSON array yield no rows here; expressions read
    /// `"element"."value"` and `"element"."key"` (the array position) and must
    /// qualify source columns that clash with `json_each` output, such as `id`.
    pub fn each_element_of(mut self, column: &str) -> Self {
        self.each_element_of = Some(column.to_string());
        self
    }

    /// Whether the copy reads `column` of the source, in a value or the filter
    pub fn reads(&self, column: &str) -> bool {
        let quoted = quote_ident(column);
        self.each_element_of.as_deref() == Some(column)
            || self.columns.iter().any(|(_, expr)| expr.contains(&quoted))
            || self.filter.as_ref().is_some_and(|f| f.contains(&quoted))
    }

    pub fn sql(&self) -> String {
        let targets: Vec<String> = self.columns.iter().map(|(t, _)| quote_ident(t)).collect();
        let exprs: Vec<&str> = self.columns.iter().map(|(_, e)| e.as_str()).collect();
        let mut sql = format!(
            "INSERT OR IGNORE INTO {} ({}) SELECT {} FROM {}",
            quote_ident(&self.target),
            targets.join(", "),
            exprs.join(", "),
            quote_ident(&self.source)
        );
        if let Some(ref column) = self.each_element_of {
            // CASE keeps json_type away from malformed text
            let col = quote_ident(column);
            sql.push_str(&format!(
                ", json_each(CASE WHEN json_valid({col}) THEN \
                 CASE WHEN json_type({col}) = 'array' THEN {col} ELSE '[]' END ELSE '[]' END) AS \"element\""
            ));
        }
        if let Some(ref filter) = self.filter {
            sql.push_str(" WHERE ");
            sql.push_str(filter);
        }
        sql
    }
}

/// One idempotent structural change
#[derive(Debug, Clone, PartialEq)]
pub enum StructuralOperation {
    CreateTableIfAbsent(TableSchema),
    CreateIndexIfAbsent(IndexSpec),
    AddColumnIfAbsent { table: String, column: ColumnDef },
    RebuildTable(RebuildTable),
    CopyRows(CopyRows),
    /// Only valid after a `CopyRows` out of the same table in the same step
    DropTable(String),
}

impl StructuralOperation {
    pub fn add_column(table: &str, column: ColumnDef) -> Self {
        StructuralOperation::AddColumnIfAbsent {
            table: table.to_string(),
            column,
        }
    }

    pub fn drop_table(table: &str) -> Self {
        StructuralOperation::DropTable(table.to_string())
    }

    /// Table the operation changes
    pub fn target(&self) -> &str {
        match self {
            StructuralOperation::CreateTableIfAbsent(schema) => &schema.name,
            StructuralOperation::CreateIndexIfAbsent(spec) => &spec.name,
            StructuralOperation::AddColumnIfAbsent { table, .. } => table,
            StructuralOperation::RebuildTable(rebuild) => rebuild.table(),
            StructuralOperation::CopyRows(copy) => &copy.target,
            StructuralOperation::DropTable(table) => table,
        }
    }

    /// Whether the operation drops a table (and so must not run with FK enforcement on)
    pub fn drops_table(&self) -> bool {
        matches!(
            self,
            StructuralOperation::RebuildTable(_) | StructuralOperation::DropTable(_)
        )
    }

    /// DDL that would create this structure from scratch, if it is a creation
    pub fn ddl(&self) -> Option<String> {
        match self {
            StructuralOperation::CreateTableIfAbsent(schema) => Some(schema.create_sql()),
            StructuralOperation::CreateIndexIfAbsent(spec) => Some(spec.create_sql()),
            _ => None,
        }
    }
}

impl From<TableSchema> for StructuralOperation {
    fn from(schema: TableSchema) -> Self {
        StructuralOperation::CreateTableIfAbsent(schema)
    }
}

impl From<IndexSpec> for StructuralOperation {
    fn from(spec: IndexSpec) -> Self {
        StructuralOperation::CreateIndexIfAbsent(spec)
    }
}

impl From<RebuildTable> for StructuralOperation {
    fn from(rebuild: RebuildTable) -> Self {
        StructuralOperation::RebuildTable(rebuild)
    }
}

impl From<CopyRows> for StructuralOperation {
    fn from(copy: CopyRows) -> Self {
        StructuralOperation::CopyRows(copy)
    }
}

impl fmt::Display for StructuralOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructuralOperation::CreateTableIfAbsent(schema) => write!(f, "create table {}", schema.name),
            StructuralOperation::CreateIndexIfAbsent(spec) => {
                write!(f, "create index {} on {}", spec.name, spec.table)
            }
            StructuralOperation::AddColumnIfAbsent { table, column } => {
                write!(f, "add column {}.{}", table, column.name)
            }
            StructuralOperation::RebuildTable(rebuild) => write!(f, "rebuild table {}", rebuild.table()),
            StructuralOperation::CopyRows(copy) => write!(f, "copy rows {} -> {}", copy.source, copy.target),
            StructuralOperation::DropTable(table) => write!(f, "drop table {table}"),
        }
    }
}
