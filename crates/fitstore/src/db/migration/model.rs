// crates/fitstore/src/db/migration/model.rs
// Symbolic schema model: what a store at a given version is declared to contain

use super::operation::{IndexSpec, StructuralOperation, TableSchema};
use super::verifier::{ExpectationSet, ForeignKeyExpectation, IndexExpectation, TableExpectation};
use std::collections::BTreeMap;

/// Tables and named indices obtained by folding operations without touching a store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaModel {
    tables: BTreeMap<String, TableSchema>,
    indices: BTreeMap<String, IndexSpec>,
}

impl SchemaModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one operation into the model, mirroring what the executor does to a real store.
    ///
    /// Returns a reason when the operation cannot apply to the modelled schema.
    pub fn apply(&mut self, op: &StructuralOperation) -> Result<(), String> {
        match op {
            StructuralOperation::CreateTableIfAbsent(schema) => {
                self.tables
                    .entry(schema.name.clone())
                    .or_insert_with(|| schema.clone());
            }
            StructuralOperation::CreateIndexIfAbsent(spec) => {
                let table = self
                    .tables
                    .get(&spec.table)
                    .ok_or_else(|| format!("index {} targets unknown table {}", spec.name, spec.table))?;
                if let Some(missing) = spec.columns.iter().find(|c| table.column_named(c).is_none()) {
                    return Err(format!("index {} covers unknown column {}.{}", spec.name, spec.table, missing));
                }
                if let Some(existing) = self.indices.get(&spec.name)
                    && existing.table != spec.table
                {
                    return Err(format!("index {} already exists on {}", spec.name, existing.table));
                }
                self.indices
                    .entry(spec.name.clone())
                    .or_insert_with(|| spec.clone());
            }
            StructuralOperation::AddColumnIfAbsent { table, column } => {
                let schema = self
                    .tables
                    .get_mut(table)
                    .ok_or_else(|| format!("cannot add {} to unknown table {}", column.name, table))?;
                match schema.column_named(&column.name) {
                    Some(existing) if existing.column_type != column.column_type => {
                        return Err(format!(
                            "column {}.{} already declared as {}",
                            table, column.name, existing.column_type
                        ));
                    }
                    Some(_) => {}
                    None => schema.columns.push(column.clone()),
                }
            }
            StructuralOperation::RebuildTable(rebuild) => {
                let table = rebuild.table().to_string();
                if !self.tables.contains_key(&table) {
                    return Err(format!("cannot rebuild unknown table {table}"));
                }
                // Dropping the original takes its indices with it
                self.indices.retain(|_, spec| spec.table != table);
                self.tables.insert(table, rebuild.schema.clone());
            }
            StructuralOperation::CopyRows(copy) => {
                if !self.tables.contains_key(&copy.target) {
                    return Err(format!("copy targets unknown table {}", copy.target));
                }
            }
            StructuralOperation::DropTable(table) => {
                self.tables.remove(table);
                self.indices.retain(|_, spec| spec.table != *table);
            }
        }
        Ok(())
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.values()
    }

    pub fn indices(&self) -> impl Iterator<Item = &IndexSpec> {
        self.indices.values()
    }

    /// Operations that create this schema directly on an empty store
    pub fn native_operations(&self) -> Vec<StructuralOperation> {
        self.tables
            .values()
            .cloned()
            .map(StructuralOperation::CreateTableIfAbsent)
            .chain(
                self.indices
                    .values()
                    .cloned()
                    .map(StructuralOperation::CreateIndexIfAbsent),
            )
            .collect()
    }

    /// Literal DDL for a fresh store at this version
    pub fn ddl(&self) -> Vec<String> {
        self.native_operations()
            .iter()
            .filter_map(StructuralOperation::ddl)
            .collect()
    }

    /// Post-conditions a store at this version must satisfy
    pub fn expectations(&self) -> ExpectationSet {
        let mut set = ExpectationSet::default();
        for schema in self.tables.values() {
            set.tables.push(TableExpectation {
                name: schema.name.clone(),
                columns: schema
                    .columns
                    .iter()
                    .map(|c| (c.name.clone(), c.column_type))
                    .collect(),
            });
            for fk in &schema.foreign_keys {
                set.foreign_keys.push(ForeignKeyExpectation {
                    table: schema.name.clone(),
                    column: fk.column.clone(),
                    ref_table: fk.ref_table.clone(),
                    ref_column: fk.ref_column.clone(),
                });
            }
        }
        for spec in self.indices.values() {
            set.indices.push(IndexExpectation {
                name: spec.name.clone(),
                table: Some(spec.table.clone()),
            });
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migration::operation::{ColumnDef, ColumnType, RebuildTable};

    fn streaks_v6() -> TableSchema {
        TableSchema::new("personal_streaks")
            .autoincrement_id("id")
            .text_nn("name")
            .text("lastActivityDate")
    }

    #[test]
    fn test_rebuild_drops_indices() {
        let mut model = SchemaModel::new();
        model.apply(&streaks_v6().into()).unwrap();
        model
            .apply(&IndexSpec::on("personal_streaks", &["name"]).into())
            .unwrap();
        assert_eq!(model.indices().count(), 1);

        let rebuilt = TableSchema::new("personal_streaks")
            .autoincrement_id("id")
            .text_nn("name")
            .int("lastActivityTimestamp");
        model
            .apply(&RebuildTable::new(rebuilt.clone()).copy(&["id", "name"]).into())
            .unwrap();

        assert_eq!(model.indices().count(), 0);
        assert_eq!(model.table("personal_streaks"), Some(&rebuilt));
    }

    #[test]
    fn test_add_column_appends() {
        let mut model = SchemaModel::new();
        model
            .apply(&TableSchema::new("daily_goals").text_nn("dateIso").into())
            .unwrap();
        model
            .apply(&StructuralOperation::add_column("daily_goals", ColumnDef::real("targetFat")))
            .unwrap();
        // Re-adding is a no-op
        model
            .apply(&StructuralOperation::add_column("daily_goals", ColumnDef::real("targetFat")))
            .unwrap();

        let cols: Vec<&str> = model
            .table("daily_goals")
            .unwrap()
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(cols, vec!["dateIso", "targetFat"]);
    }

    #[test]
    fn test_conflicting_add_column_rejected() {
        let mut model = SchemaModel::new();
        model
            .apply(&TableSchema::new("t").text("a").into())
            .unwrap();
        let err = model
            .apply(&StructuralOperation::add_column("t", ColumnDef::integer("a")))
            .unwrap_err();
        assert!(err.contains("already declared"));
    }

    #[test]
    fn test_index_on_unknown_table_rejected() {
        let mut model = SchemaModel::new();
        assert!(model.apply(&IndexSpec::on("ghost", &["id"]).into()).is_err());
    }

    #[test]
    fn test_drop_removes_table_and_indices() {
        let mut model = SchemaModel::new();
        model.apply(&streaks_v6().into()).unwrap();
        model
            .apply(&IndexSpec::on("personal_streaks", &["name"]).into())
            .unwrap();
        model
            .apply(&StructuralOperation::drop_table("personal_streaks"))
            .unwrap();
        assert!(!model.has_table("personal_streaks"));
        assert_eq!(model.indices().count(), 0);
    }

    #[test]
    fn test_expectations_cover_columns_and_indices() {
        let mut model = SchemaModel::new();
        model.apply(&streaks_v6().into()).unwrap();
        model
            .apply(&IndexSpec::on("personal_streaks", &["name"]).into())
            .unwrap();

        let exp = model.expectations();
        assert_eq!(exp.tables.len(), 1);
        assert_eq!(
            exp.tables[0].columns[2],
            ("lastActivityDate".to_string(), ColumnType::Text)
        );
        assert_eq!(exp.indices[0].table.as_deref(), Some("personal_streaks"));
        assert_eq!(model.ddl().len(), 2);
    }
}
