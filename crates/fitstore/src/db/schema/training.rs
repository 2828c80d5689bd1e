// crates/fitstore/src/db/schema/training.rs
// Training analytics and guided cooking sessions

use crate::db::migration::{IndexSpec, MigrationStep, OnDelete, TableSchema};

/// 10 -> 11
pub fn workout_analytics() -> MigrationStep {
    MigrationStep::new(10, 11, "workout performance, sessions and exercise progressions")
        .op(TableSchema::new("workout_performance")
            .text_nn("id")
            .text_nn("exerciseId")
            .text_nn("sessionId")
            .int_nn("planId")
            .int_nn("exerciseIndex")
            .int("heartRateAvg")
            .int("heartRateMax")
            .text("heartRateZone")
            .int_nn("reps")
            .real_nn("weight")
            .real_nn("volume")
            .int_nn("restTime")
            .int_nn("actualRestTime")
            .real_nn("formQuality")
            .int("perceivedExertion")
            .real("movementSpeed")
            .real("rangeOfMotion")
            .int_nn("timestamp")
            .int_nn("duration")
            .int_nn("isPersonalRecord")
            .text("notes")
            .primary_key(&["id"]))
        .ops([
            IndexSpec::on("workout_performance", &["exerciseId"]),
            IndexSpec::on("workout_performance", &["sessionId"]),
            IndexSpec::on("workout_performance", &["planId"]),
            IndexSpec::on("workout_performance", &["timestamp"]),
            IndexSpec::on("workout_performance", &["exerciseIndex"]),
        ])
        .op(TableSchema::new("workout_sessions")
            .text_nn("id")
            .int_nn("planId")
            .text_nn("userId")
            .int_nn("startTime")
            .int("endTime")
            .real_nn("totalVolume")
            .int("averageHeartRate")
            .int("caloriesBurned")
            .real_nn("workoutEfficiencyScore")
            .text_nn("fatigueLevel")
            .int_nn("personalRecordsAchieved")
            .real_nn("completionPercentage")
            .int("sessionRating")
            .text("sessionNotes")
            .primary_key(&["id"]))
        .ops([
            IndexSpec::on("workout_sessions", &["planId"]),
            IndexSpec::on("workout_sessions", &["userId"]),
            IndexSpec::on("workout_sessions", &["startTime"]),
            IndexSpec::on("workout_sessions", &["workoutEfficiencyScore"]),
        ])
        .op(TableSchema::new("exercise_progressions")
            .text_nn("id")
            .text_nn("exerciseId")
            .text_nn("userId")
            .real_nn("currentWeight")
            .real_nn("recommendedWeight")
            .int_nn("currentReps")
            .int_nn("recommendedReps")
            .text_nn("progressionReason")
            .text_nn("performanceTrend")
            .int_nn("plateauDetected")
            .int_nn("plateauWeeks")
            .int_nn("lastProgressDate")
            .real_nn("aiConfidence")
            .int_nn("nextReviewDate")
            .text("adaptationNotes")
            .primary_key(&["id"]))
        .ops([
            IndexSpec::on("exercise_progressions", &["exerciseId"]),
            IndexSpec::on("exercise_progressions", &["userId"]),
            IndexSpec::on("exercise_progressions", &["performanceTrend"]),
            IndexSpec::on("exercise_progressions", &["plateauDetected"]),
            IndexSpec::on("exercise_progressions", &["lastProgressDate"]),
        ])
}

/// 11 -> 12
pub fn cooking_mode() -> MigrationStep {
    MigrationStep::new(11, 12, "cooking sessions and step timers")
        .op(TableSchema::new("cooking_sessions")
            .text_nn("id")
            .text_nn("recipeId")
            .int_nn("startTime")
            .int("endTime")
            .text_nn("status")
            .int_nn("currentStep")
            .int_nn("totalSteps")
            .int("estimatedDuration")
            .int("actualDuration")
            .text("notes")
            .int_nn("createdAt")
            .primary_key(&["id"]))
        .op(TableSchema::new("cooking_timers")
            .text_nn("id")
            .text_nn("sessionId")
            .int_nn("stepIndex")
            .text_nn("name")
            .int_nn("durationSeconds")
            .int_nn("remainingSeconds")
            .int_nn("isActive")
            .int_nn("isPaused")
            .int("startTime")
            .int("completedAt")
            .int_nn("createdAt")
            .primary_key(&["id"])
            .foreign_key("sessionId", "cooking_sessions", "id", OnDelete::Cascade))
        .ops([
            IndexSpec::on("cooking_sessions", &["recipeId"]),
            IndexSpec::on("cooking_sessions", &["startTime"]),
            IndexSpec::on("cooking_sessions", &["status"]),
            IndexSpec::on("cooking_timers", &["sessionId"]),
            IndexSpec::on("cooking_timers", &["stepIndex"]),
            IndexSpec::on("cooking_timers", &["isActive"]),
        ])
}
