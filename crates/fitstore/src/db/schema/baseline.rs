// crates/fitstore/src/db/schema/baseline.rs
// Version 5: the oldest schema a store may still be on

use crate::db::migration::{Baseline, ColumnDef, IndexSpec, OnDelete, StructuralOperation, TableSchema};

pub fn baseline() -> Baseline {
    let mut operations: Vec<StructuralOperation> = vec![
        ai_logs().into(),
        recipes().into(),
        TableSchema::new("recipe_history")
            .autoincrement_id("id")
            .text_nn("recipeId")
            .int_nn("createdAt")
            .foreign_key("recipeId", "recipes", "id", OnDelete::Cascade)
            .into(),
        IndexSpec::on("recipe_history", &["recipeId"]).into(),
        TableSchema::new("intake_entries")
            .autoincrement_id("id")
            .int_nn("timestamp")
            .text_nn("label")
            .int_nn("kcal")
            .text_nn("source")
            .text("referenceId")
            .into(),
        IndexSpec::on("intake_entries", &["timestamp"]).into(),
        IndexSpec::on("intake_entries", &["kcal"]).into(),
        IndexSpec::on("intake_entries", &["timestamp", "kcal"]).into(),
        TableSchema::new("daily_goals")
            .text_nn("dateIso")
            .int_nn("targetKcal")
            .primary_key(&["dateIso"])
            .into(),
        TableSchema::new("shopping_items")
            .autoincrement_id("id")
            .text_nn("name")
            .text("quantity")
            .text("unit")
            .int_nn("checked")
            .text("category")
            .text("fromRecipeId")
            .int_nn("createdAt")
            .into(),
        TableSchema::new("shopping_list_categories")
            .text_nn("name")
            .int_nn("order")
            .primary_key(&["name"])
            .into(),
        TableSchema::new("training_plans")
            .autoincrement_id("id")
            .text_nn("title")
            .text_nn("content")
            .text_nn("goal")
            .int_nn("weeks")
            .int_nn("sessionsPerWeek")
            .int_nn("minutesPerSession")
            .text_nn("equipment")
            .text("trainingDays")
            .int_nn("createdAt")
            .into(),
        saved_recipes().into(),
        TableSchema::new("today_workouts")
            .text_nn("dateIso")
            .text_nn("content")
            .text_nn("status")
            .int_nn("createdAt")
            .int("completedAt")
            .int("planId")
            .primary_key(&["dateIso"])
            .into(),
    ];
    operations.extend(
        [
            IndexSpec::on("today_workouts", &["dateIso"]),
            IndexSpec::on("today_workouts", &["status"]),
            IndexSpec::on("today_workouts", &["createdAt"]),
        ]
        .map(StructuralOperation::from),
    );

    Baseline {
        version: super::BASELINE_VERSION,
        operations,
    }
}

fn ai_logs() -> TableSchema {
    TableSchema::new("ai_logs")
        .autoincrement_id("id")
        .int_nn("ts")
        .text_nn("type")
        .text_nn("provider")
        .text_nn("prompt")
        .text_nn("result")
        .int_nn("success")
        .int_nn("tookMs")
}

/// Recipes before the favourites split; `isFavorite` still lives on the row
fn recipes() -> TableSchema {
    TableSchema::new("recipes")
        .text_nn("id")
        .text_nn("title")
        .text_nn("markdown")
        .int("calories")
        .text("imageUrl")
        .column(ColumnDef::integer("isFavorite").not_null().default_value("0"))
        .int_nn("createdAt")
        .primary_key(&["id"])
}

/// Second recipe table, merged into `recipes` at version 16
fn saved_recipes() -> TableSchema {
    TableSchema::new("saved_recipes")
        .text_nn("id")
        .text_nn("title")
        .text_nn("markdown")
        .int("calories")
        .text("imageUrl")
        .text_nn("ingredients")
        .text_nn("tags")
        .int("prepTime")
        .text("difficulty")
        .int("servings")
        .int_nn("isFavorite")
        .int_nn("createdAt")
        .int("lastCookedAt")
        .primary_key(&["id"])
}
