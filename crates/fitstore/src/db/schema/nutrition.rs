// crates/fitstore/src/db/schema/nutrition.rs
// Nutrition: food items, meal and water logging, macro goals

use crate::db::migration::{
    ColumnDef, IndexSpec, MigrationStep, OnDelete, RebuildTable, StructuralOperation, TableSchema,
};

/// 8 -> 9
pub fn nutrition_tracking() -> MigrationStep {
    MigrationStep::new(8, 9, "food items, meal and water entries, macro goals")
        .op(TableSchema::new("food_items")
            .text_nn("id")
            .text_nn("name")
            .text("barcode")
            .int_nn("calories")
            .real_nn("carbs")
            .real_nn("protein")
            .real_nn("fat")
            .int_nn("createdAt")
            .primary_key(&["id"]))
        .ops([
            IndexSpec::on("food_items", &["name"]),
            IndexSpec::on("food_items", &["barcode"]),
        ])
        .op(TableSchema::new("meal_entries")
            .autoincrement_id("id")
            .text_nn("foodItemId")
            .text_nn("date")
            .text_nn("mealType")
            .real_nn("quantityGrams")
            .text("notes")
            .int("recordedAt")
            .foreign_key("foodItemId", "food_items", "id", OnDelete::Cascade))
        .ops([
            IndexSpec::on("meal_entries", &["foodItemId"]),
            IndexSpec::on("meal_entries", &["date"]),
            IndexSpec::on("meal_entries", &["mealType"]),
        ])
        .op(TableSchema::new("water_entries")
            .autoincrement_id("id")
            .text_nn("date")
            .int_nn("amountMl")
            .int_nn("timestamp"))
        .op(IndexSpec::on("water_entries", &["date"]))
        .ops([
            StructuralOperation::add_column("daily_goals", ColumnDef::real("targetCarbs")),
            StructuralOperation::add_column("daily_goals", ColumnDef::real("targetProtein")),
            StructuralOperation::add_column("daily_goals", ColumnDef::real("targetFat")),
            StructuralOperation::add_column("daily_goals", ColumnDef::integer("targetWaterMl")),
        ])
}

/// 16 -> 17: a meal entry may now point at a recipe instead of a food item
pub fn recipe_meals() -> MigrationStep {
    let meal_entries = TableSchema::new("meal_entries")
        .autoincrement_id("id")
        .text("foodItemId")
        .text("recipeId")
        .text_nn("date")
        .text_nn("mealType")
        .real("quantityGrams")
        .real("servings")
        .text("notes")
        .int("recordedAt")
        .foreign_key("foodItemId", "food_items", "id", OnDelete::Cascade)
        .foreign_key("recipeId", "recipes", "id", OnDelete::Cascade);

    MigrationStep::new(16, 17, "meal entries reference food items or recipes")
        .op(RebuildTable::new(meal_entries).copy(&[
            "id",
            "foodItemId",
            "date",
            "mealType",
            "quantityGrams",
            "notes",
            "recordedAt",
        ]))
        .ops([
            IndexSpec::on("meal_entries", &["foodItemId"]),
            IndexSpec::on("meal_entries", &["recipeId"]),
            IndexSpec::on("meal_entries", &["date"]),
            IndexSpec::on("meal_entries", &["mealType"]),
        ])
}
