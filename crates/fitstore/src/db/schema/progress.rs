// crates/fitstore/src/db/schema/progress.rs
// Personal progress: achievements, streaks, records, weight and body tracking

use crate::db::migration::{IndexSpec, MigrationStep, RebuildTable, RowTransform, TableSchema};

/// 5 -> 6
pub fn personal_progress() -> MigrationStep {
    MigrationStep::new(5, 6, "personal achievements, streaks, records and milestones")
        .op(TableSchema::new("personal_achievements")
            .autoincrement_id("id")
            .text_nn("title")
            .text_nn("description")
            .text_nn("category")
            .text_nn("iconName")
            .real("targetValue")
            .real_nn("currentValue")
            .text("unit")
            .int_nn("isCompleted")
            .int("completedAt")
            .int_nn("createdAt"))
        .ops([
            IndexSpec::on("personal_achievements", &["category"]),
            IndexSpec::on("personal_achievements", &["isCompleted"]),
            IndexSpec::on("personal_achievements", &["createdAt"]),
        ])
        .op(streaks_v6())
        .op(TableSchema::new("personal_records")
            .autoincrement_id("id")
            .text_nn("exerciseName")
            .text_nn("recordType")
            .real_nn("value")
            .text_nn("unit")
            .text("notes")
            .int_nn("achievedAt")
            .real("previousRecord")
            .real("improvement"))
        .op(TableSchema::new("progress_milestones")
            .autoincrement_id("id")
            .text_nn("title")
            .text_nn("description")
            .text_nn("category")
            .real_nn("targetValue")
            .real_nn("currentValue")
            .text_nn("unit")
            .text("targetDate")
            .int_nn("isCompleted")
            .int("completedAt")
            .real_nn("progress")
            .int_nn("createdAt"))
}

fn streaks_v6() -> TableSchema {
    streak_head()
        .text("lastActivityDate")
        .int_nn("isActive")
        .int("targetDays")
        .int_nn("createdAt")
}

fn streaks_v7() -> TableSchema {
    streak_head()
        .int("lastActivityTimestamp")
        .int_nn("isActive")
        .int("targetDays")
        .int_nn("createdAt")
}

fn streak_head() -> TableSchema {
    TableSchema::new("personal_streaks")
        .autoincrement_id("id")
        .text_nn("name")
        .text_nn("description")
        .text_nn("category")
        .int_nn("currentStreak")
        .int_nn("longestStreak")
}

/// 6 -> 7: streak dates become epoch seconds
pub fn streak_timestamps() -> MigrationStep {
    MigrationStep::new(6, 7, "streak activity dates become epoch timestamps").op(
        RebuildTable::new(streaks_v7())
            .copy(&[
                "id",
                "name",
                "description",
                "category",
                "currentStreak",
                "longestStreak",
            ])
            .transform(
                "lastActivityTimestamp",
                "lastActivityDate",
                RowTransform::IsoDateToEpochSeconds,
            )
            .copy(&["isActive", "targetDays", "createdAt"]),
    )
}

/// 7 -> 8
pub fn weight_tracking() -> MigrationStep {
    MigrationStep::new(7, 8, "weight entries and recipe lookup indices")
        .op(TableSchema::new("weight_entries")
            .autoincrement_id("id")
            .real_nn("weight")
            .text_nn("dateIso")
            .text("notes")
            .int_nn("recordedAt"))
        .op(IndexSpec::on("weight_entries", &["dateIso"]))
        .ops([
            IndexSpec::on("recipes", &["createdAt"]),
            IndexSpec::on("recipes", &["calories"]),
            IndexSpec::on("recipes", &["title"]),
        ])
}

/// 9 -> 10
pub fn body_tracking() -> MigrationStep {
    MigrationStep::new(9, 10, "BMI history, weight-loss programs, check-ins and progress photos")
        .op(TableSchema::new("bmi_history")
            .autoincrement_id("id")
            .text_nn("date")
            .real_nn("height")
            .real_nn("weight")
            .real_nn("bmi")
            .text_nn("category")
            .text("notes")
            .int_nn("recordedAt"))
        .ops([
            IndexSpec::on("bmi_history", &["date"]),
            IndexSpec::on("bmi_history", &["bmi"]),
            IndexSpec::on("bmi_history", &["recordedAt"]),
        ])
        .op(TableSchema::new("weight_loss_programs")
            .autoincrement_id("id")
            .text_nn("startDate")
            .text("endDate")
            .real_nn("startWeight")
            .real_nn("targetWeight")
            .real_nn("currentWeight")
            .int_nn("dailyCalorieTarget")
            .real_nn("weeklyWeightLossGoal")
            .int_nn("isActive")
            .text_nn("programType")
            .int_nn("createdAt"))
        .ops([
            IndexSpec::on("weight_loss_programs", &["startDate"]),
            IndexSpec::on("weight_loss_programs", &["isActive"]),
            IndexSpec::on("weight_loss_programs", &["programType"]),
        ])
        .op(TableSchema::new("behavioral_check_ins")
            .autoincrement_id("id")
            .int_nn("timestamp")
            .int_nn("moodScore")
            .int_nn("hungerLevel")
            .int_nn("stressLevel")
            .int("sleepQuality")
            .text_nn("triggers")
            .text("copingStrategy")
            .text("mealContext"))
        .ops([
            IndexSpec::on("behavioral_check_ins", &["timestamp"]),
            IndexSpec::on("behavioral_check_ins", &["moodScore"]),
            IndexSpec::on("behavioral_check_ins", &["stressLevel"]),
        ])
        .op(TableSchema::new("progress_photos")
            .autoincrement_id("id")
            .text_nn("filePath")
            .int_nn("timestamp")
            .real_nn("weight")
            .real_nn("bmi")
            .text("notes"))
        .ops([
            IndexSpec::on("progress_photos", &["timestamp"]),
            IndexSpec::on("progress_photos", &["weight"]),
            IndexSpec::on("progress_photos", &["bmi"]),
        ])
}
