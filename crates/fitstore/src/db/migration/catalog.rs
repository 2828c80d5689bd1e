// crates/fitstore/src/db/migration/catalog.rs
// Schema catalog: the immutable, validated chain of migration steps

use super::error::{ChainConfigurationError, MigrationError};
use super::model::SchemaModel;
use super::operation::{CopyRows, IndexSpec, PrimaryKey, StructuralOperation};
use super::verifier::ExpectationSet;
use std::collections::HashSet;

/// Advances the store by exactly one version
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationStep {
    pub from: u32,
    pub to: u32,
    pub description: String,
    pub operations: Vec<StructuralOperation>,
}

impl MigrationStep {
    pub fn new(from: u32, to: u32, description: &str) -> Self {
        Self {
            from,
            to,
            description: description.to_string(),
            operations: Vec::new(),
        }
    }

    pub fn op(mut self, op: impl Into<StructuralOperation>) -> Self {
        self.operations.push(op.into());
        self
    }

    pub fn ops<I, O>(mut self, ops: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<StructuralOperation>,
    {
        self.operations.extend(ops.into_iter().map(Into::into));
        self
    }
}

/// Oldest supported schema, expressed as the operations that create it
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    pub version: u32,
    pub operations: Vec<StructuralOperation>,
}

#[derive(Debug, Clone)]
pub struct SchemaCatalog {
    baseline: Baseline,
    steps: Vec<MigrationStep>,
    performance_indices: Vec<IndexSpec>,
    /// models[i] is the schema at baseline.version + i
    models: Vec<SchemaModel>,
}

impl SchemaCatalog {
    /// Validate the chain and precompute the declared schema at every version
    pub fn new(baseline: Baseline, steps: Vec<MigrationStep>) -> Result<Self, ChainConfigurationError> {
        let mut seen = HashSet::new();
        let mut expected_from = baseline.version;
        for (i, step) in steps.iter().enumerate() {
            if !seen.insert(step.from) {
                return Err(ChainConfigurationError::DuplicateFrom(step.from));
            }
            if i == 0 && step.from != baseline.version {
                return Err(ChainConfigurationError::StartMismatch {
                    baseline: baseline.version,
                    first_from: step.from,
                });
            }
            if step.from != expected_from {
                return Err(ChainConfigurationError::Gap {
                    expected_from,
                    found_from: step.from,
                });
            }
            if step.to != step.from + 1 {
                return Err(ChainConfigurationError::NonAdjacent {
                    from: step.from,
                    to: step.to,
                });
            }
            check_drops(step)?;
            expected_from = step.to;
        }

        let mut model = SchemaModel::new();
        for op in &baseline.operations {
            fold(&mut model, baseline.version, op)?;
        }
        let mut models = vec![model.clone()];
        for step in &steps {
            for (i, op) in step.operations.iter().enumerate() {
                check_rebuild(&model, step.to, op)?;
                check_drop_coverage(&model, step, i)?;
                fold(&mut model, step.to, op)?;
            }
            models.push(model.clone());
        }

        Ok(Self {
            baseline,
            steps,
            performance_indices: Vec::new(),
            models,
        })
    }

    /// Indices the bootstrapper maintains on top of the chain
    pub fn with_performance_indices(mut self, specs: Vec<IndexSpec>) -> Self {
        self.performance_indices = specs;
        self
    }

    pub fn baseline_version(&self) -> u32 {
        self.baseline.version
    }

    pub fn latest_version(&self) -> u32 {
        self.steps.last().map_or(self.baseline.version, |s| s.to)
    }

    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    /// Minimal contiguous run of steps taking `current` to `target`.
    ///
    /// Resolved in full before anything is applied, so a missing step never
    /// leaves a partially migrated store behind.
    pub fn steps_from(&self, current: u32, target: u32) -> Result<&[MigrationStep], MigrationError> {
        if current == target {
            return Ok(&[]);
        }
        if current > target {
            return Err(MigrationError::Downgrade { current, target });
        }
        if current < self.baseline.version {
            return Err(MigrationError::BelowBaseline {
                current,
                baseline: self.baseline.version,
            });
        }
        let start = (current - self.baseline.version) as usize;
        let end = (target - self.baseline.version) as usize;
        if end > self.steps.len() {
            return Err(MigrationError::NonContiguousChain {
                current,
                target,
                missing_from: self.latest_version(),
            });
        }
        Ok(&self.steps[start..end])
    }

    pub fn model_at(&self, version: u32) -> Option<&SchemaModel> {
        let offset = version.checked_sub(self.baseline.version)?;
        self.models.get(offset as usize)
    }

    pub fn expectations_at(&self, version: u32) -> Option<ExpectationSet> {
        self.model_at(version).map(SchemaModel::expectations)
    }

    /// "Create fresh at `version`" as a list of operations
    pub fn native_operations_at(&self, version: u32) -> Option<Vec<StructuralOperation>> {
        self.model_at(version).map(SchemaModel::native_operations)
    }

    /// Declared indices at `version` plus performance indices whose table exists then
    pub fn bootstrap_indices(&self, version: u32) -> Vec<IndexSpec> {
        let Some(model) = self.model_at(version) else {
            return Vec::new();
        };
        let mut specs: Vec<IndexSpec> = model.indices().cloned().collect();
        for spec in &self.performance_indices {
            let covered = model
                .table(&spec.table)
                .is_some_and(|t| spec.columns.iter().all(|c| t.column_named(c).is_some()));
            if covered && !specs.iter().any(|s| s.name == spec.name) {
                specs.push(spec.clone());
            }
        }
        specs
    }
}

fn fold(model: &mut SchemaModel, version: u32, op: &StructuralOperation) -> Result<(), ChainConfigurationError> {
    model
        .apply(op)
        .map_err(|reason| ChainConfigurationError::InvalidOperation {
            version,
            operation: op.to_string(),
            reason,
        })
}

/// A rebuild mapping must read columns the old shape has, write columns the new shape has,
/// and fill every NOT NULL column lacking a default
fn check_rebuild(model: &SchemaModel, version: u32, op: &StructuralOperation) -> Result<(), ChainConfigurationError> {
    let StructuralOperation::RebuildTable(rebuild) = op else {
        return Ok(());
    };
    let invalid = |reason: String| ChainConfigurationError::InvalidOperation {
        version,
        operation: op.to_string(),
        reason,
    };
    let schema = &rebuild.schema;
    let old = model.table(rebuild.table());
    for mapping in &rebuild.mapping {
        if schema.column_named(&mapping.target).is_none() {
            return Err(invalid(format!("mapping targets unknown column {}", mapping.target)));
        }
        let source = mapping.source.source_column();
        if let Some(old) = old
            && old.column_named(source).is_none()
        {
            return Err(invalid(format!("mapping reads unknown column {source}")));
        }
    }
    for column in &schema.columns {
        let mapped = rebuild.mapping.iter().any(|m| m.target == column.name);
        let auto_pk = matches!(
            schema.primary_key,
            Some(PrimaryKey::AutoIncrement(ref pk)) if *pk == column.name
        );
        if column.not_null && column.default.is_none() && !mapped && !auto_pk {
            return Err(invalid(format!(
                "NOT NULL column {} has no default and no source",
                column.name
            )));
        }
    }
    Ok(())
}

fn check_drops(step: &MigrationStep) -> Result<(), ChainConfigurationError> {
    for (i, op) in step.operations.iter().enumerate() {
        match op {
            StructuralOperation::DropTable(table) => {
                let copied = step.operations[..i].iter().any(|prior| {
                    matches!(prior, StructuralOperation::CopyRows(copy) if copy.source == *table)
                });
                if !copied {
                    return Err(ChainConfigurationError::UnsafeDrop {
                        version: step.to,
                        table: table.clone(),
                    });
                }
            }
            StructuralOperation::AddColumnIfAbsent { table, column }
                if column.not_null && column.default.is_none() =>
            {
                return Err(ChainConfigurationError::InvalidOperation {
                    version: step.to,
                    operation: op.to_string(),
                    reason: format!("NOT NULL column {table}.{} needs a default", column.name),
                });
            }
            _ => {}
        }
    }
    Ok(())
}

/// Every column of a dropped table must be read by a copy out of it earlier in the step
fn check_drop_coverage(model: &SchemaModel, step: &MigrationStep, at: usize) -> Result<(), ChainConfigurationError> {
    let StructuralOperation::DropTable(table) = &step.operations[at] else {
        return Ok(());
    };
    let Some(schema) = model.table(table) else {
        return Ok(());
    };
    let copies: Vec<&CopyRows> = step.operations[..at]
        .iter()
        .filter_map(|op| match op {
            StructuralOperation::CopyRows(copy) if copy.source == *table => Some(copy),
            _ => None,
        })
        .collect();
    match schema.columns.iter().find(|c| !copies.iter().any(|copy| copy.reads(&c.name))) {
        Some(column) => Err(ChainConfigurationError::UncopiedColumn {
            version: step.to,
            table: table.clone(),
            column: column.name.clone(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migration::operation::{ColumnDef, CopyRows, RebuildTable, TableSchema};

    fn baseline() -> Baseline {
        Baseline {
            version: 5,
            operations: vec![TableSchema::new("recipes").text_nn("id").text_nn("title").primary_key(&["id"]).into()],
        }
    }

    fn step(from: u32) -> MigrationStep {
        MigrationStep::new(from, from + 1, "test step").op(IndexSpec::on("recipes", &["title"]))
    }

    #[test]
    fn test_contiguous_chain_accepted() {
        let catalog = SchemaCatalog::new(baseline(), vec![step(5), step(6), step(7)]).unwrap();
        assert_eq!(catalog.baseline_version(), 5);
        assert_eq!(catalog.latest_version(), 8);
        assert_eq!(catalog.steps_from(6, 8).unwrap().len(), 2);
        assert!(catalog.steps_from(7, 7).unwrap().is_empty());
    }

    #[test]
    fn test_gap_rejected() {
        let err = SchemaCatalog::new(baseline(), vec![step(5), step(7)]).unwrap_err();
        assert_eq!(
            err,
            ChainConfigurationError::Gap {
                expected_from: 6,
                found_from: 7
            }
        );
    }

    #[test]
    fn test_duplicate_rejected() {
        let err = SchemaCatalog::new(baseline(), vec![step(5), step(5)]).unwrap_err();
        assert_eq!(err, ChainConfigurationError::DuplicateFrom(5));
    }

    #[test]
    fn test_start_mismatch_and_non_adjacent() {
        let err = SchemaCatalog::new(baseline(), vec![step(6)]).unwrap_err();
        assert!(matches!(err, ChainConfigurationError::StartMismatch { .. }));

        let skip = MigrationStep::new(5, 7, "skips");
        let err = SchemaCatalog::new(baseline(), vec![skip]).unwrap_err();
        assert_eq!(err, ChainConfigurationError::NonAdjacent { from: 5, to: 7 });
    }

    #[test]
    fn test_standalone_drop_rejected() {
        let bad = MigrationStep::new(5, 6, "drop").op(StructuralOperation::drop_table("recipes"));
        let err = SchemaCatalog::new(baseline(), vec![bad]).unwrap_err();
        assert!(matches!(err, ChainConfigurationError::UnsafeDrop { .. }));

        let ok = MigrationStep::new(5, 6, "move")
            .op(TableSchema::new("recipes_v2").text_nn("id").text_nn("title").primary_key(&["id"]))
            .op(CopyRows::new("recipes", "recipes_v2").same(&["id", "title"]))
            .op(StructuralOperation::drop_table("recipes"));
        assert!(SchemaCatalog::new(baseline(), vec![ok]).is_ok());
    }

    #[test]
    fn test_drop_requires_every_column_copied() {
        let partial = MigrationStep::new(5, 6, "move")
            .op(TableSchema::new("recipes_v2").text_nn("id").primary_key(&["id"]))
            .op(CopyRows::new("recipes", "recipes_v2").same(&["id"]))
            .op(StructuralOperation::drop_table("recipes"));
        let err = SchemaCatalog::new(baseline(), vec![partial]).unwrap_err();
        assert_eq!(
            err,
            ChainConfigurationError::UncopiedColumn {
                version: 6,
                table: "recipes".to_string(),
                column: "title".to_string(),
            }
        );

        // Columns may be spread over several copies
        let split = MigrationStep::new(5, 6, "split")
            .op(TableSchema::new("recipe_ids").text_nn("id").primary_key(&["id"]))
            .op(TableSchema::new("recipe_titles").text_nn("recipeId").text_nn("title"))
            .op(CopyRows::new("recipes", "recipe_ids").same(&["id"]))
            .op(CopyRows::new("recipes", "recipe_titles").column("recipeId", "\"id\"").same(&["title"]))
            .op(StructuralOperation::drop_table("recipes"));
        assert!(SchemaCatalog::new(baseline(), vec![split]).is_ok());
    }

    #[test]
    fn test_rebuild_must_fill_not_null_columns() {
        let new_shape = TableSchema::new("recipes").text_nn("id").text_nn("title").text_nn("markdown").primary_key(&["id"]);
        let bad = MigrationStep::new(5, 6, "rebuild").op(RebuildTable::new(new_shape.clone()).copy(&["id", "title"]));
        let err = SchemaCatalog::new(baseline(), vec![bad]).unwrap_err();
        assert!(err.to_string().contains("markdown"));

        let shape_with_default = TableSchema::new("recipes")
            .text_nn("id")
            .text_nn("title")
            .column(ColumnDef::text("markdown").not_null().default_value("''"))
            .primary_key(&["id"]);
        let ok = MigrationStep::new(5, 6, "rebuild").op(RebuildTable::new(shape_with_default).copy(&["id", "title"]));
        assert!(SchemaCatalog::new(baseline(), vec![ok]).is_ok());
    }

    #[test]
    fn test_not_null_add_column_needs_default() {
        let bad = MigrationStep::new(5, 6, "add")
            .op(StructuralOperation::add_column("recipes", ColumnDef::integer("rating").not_null()));
        assert!(SchemaCatalog::new(baseline(), vec![bad]).is_err());
    }

    #[test]
    fn test_steps_from_errors() {
        let catalog = SchemaCatalog::new(baseline(), vec![step(5), step(6)]).unwrap();
        assert!(matches!(
            catalog.steps_from(7, 6),
            Err(MigrationError::Downgrade { current: 7, target: 6 })
        ));
        assert!(matches!(
            catalog.steps_from(3, 7),
            Err(MigrationError::BelowBaseline { .. })
        ));
        assert!(matches!(
            catalog.steps_from(5, 9),
            Err(MigrationError::NonContiguousChain { missing_from: 7, .. })
        ));
    }

    #[test]
    fn test_models_per_version() {
        let catalog = SchemaCatalog::new(baseline(), vec![step(5)]).unwrap();
        assert_eq!(catalog.model_at(5).unwrap().indices().count(), 0);
        assert_eq!(catalog.model_at(6).unwrap().indices().count(), 1);
        assert!(catalog.model_at(4).is_none());
        assert!(catalog.model_at(7).is_none());
    }

    #[test]
    fn test_bootstrap_skips_performance_index_on_absent_table() {
        let catalog = SchemaCatalog::new(baseline(), vec![step(5)])
            .unwrap()
            .with_performance_indices(vec![
                IndexSpec::named("idx_recipes_title_id", "recipes", &["title", "id"]),
                IndexSpec::named("idx_meal_entries_date_mealType", "meal_entries", &["date", "mealType"]),
            ]);
        let names: Vec<String> = catalog.bootstrap_indices(6).into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["index_recipes_title", "idx_recipes_title_id"]);
    }
}
