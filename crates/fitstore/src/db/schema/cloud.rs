// crates/fitstore/src/db/schema/cloud.rs
// Remote services: cloud sync, Health Connect imports, AI usage and the offline queue

use crate::db::migration::{ColumnDef, IndexSpec, MigrationStep, StructuralOperation, TableSchema};

/// 12 -> 13
pub fn cloud_and_health() -> MigrationStep {
    MigrationStep::new(12, 13, "cloud sync metadata, user profiles, conflicts and Health Connect")
        .op(TableSchema::new("cloud_sync_metadata")
            .text_nn("id")
            .text_nn("entityType")
            .text_nn("entityId")
            .int_nn("lastSyncTime")
            .int_nn("lastModifiedTime")
            .text_nn("syncStatus")
            .text_nn("deviceId")
            .text("cloudVersion")
            .text("conflictData")
            .int_nn("retryCount")
            .text("errorMessage")
            .int_nn("createdAt")
            .primary_key(&["id"]))
        .ops([
            IndexSpec::on("cloud_sync_metadata", &["entityType", "entityId"]).unique(),
            IndexSpec::on("cloud_sync_metadata", &["lastSyncTime"]),
            IndexSpec::on("cloud_sync_metadata", &["syncStatus"]),
            IndexSpec::on("cloud_sync_metadata", &["deviceId"]),
        ])
        .op(TableSchema::new("user_profiles")
            .text_nn("id")
            .text_nn("userId")
            .text_nn("email")
            .text("displayName")
            .text_nn("deviceName")
            .text_nn("deviceId")
            .int_nn("lastSyncTime")
            .text_nn("syncPreferences")
            .text("encryptionKey")
            .int_nn("isActive")
            .int_nn("createdAt")
            .primary_key(&["id"]))
        .ops([
            IndexSpec::on("user_profiles", &["userId"]).unique(),
            IndexSpec::on("user_profiles", &["email"]).unique(),
            IndexSpec::on("user_profiles", &["lastSyncTime"]),
        ])
        .op(TableSchema::new("sync_conflicts")
            .text_nn("id")
            .text_nn("entityType")
            .text_nn("entityId")
            .text_nn("localData")
            .text_nn("remoteData")
            .int_nn("localTimestamp")
            .int_nn("remoteTimestamp")
            .text_nn("status")
            .text("resolution")
            .text("resolvedData")
            .text("resolvedBy")
            .int_nn("createdAt")
            .int("resolvedAt")
            .primary_key(&["id"]))
        .ops([
            IndexSpec::on("sync_conflicts", &["entityType", "entityId"]),
            IndexSpec::on("sync_conflicts", &["createdAt"]),
            IndexSpec::on("sync_conflicts", &["status"]),
        ])
        .ops(health_connect())
}

fn health_connect() -> Vec<StructuralOperation> {
    vec![
        TableSchema::new("health_connect_steps")
            .autoincrement_id("id")
            .text_nn("date")
            .int_nn("steps")
            .text_nn("source")
            .int_nn("syncedAt")
            .int_nn("lastModified")
            .into(),
        IndexSpec::on("health_connect_steps", &["date"]).into(),
        IndexSpec::on("health_connect_steps", &["source"]).into(),
        IndexSpec::on("health_connect_steps", &["syncedAt"]).into(),
        TableSchema::new("health_connect_heart_rate")
            .autoincrement_id("id")
            .int_nn("timestamp")
            .text_nn("date")
            .int_nn("heartRate")
            .text_nn("source")
            .int_nn("syncedAt")
            .into(),
        IndexSpec::on("health_connect_heart_rate", &["date"]).into(),
        IndexSpec::on("health_connect_heart_rate", &["timestamp"]).into(),
        IndexSpec::on("health_connect_heart_rate", &["source"]).into(),
        TableSchema::new("health_connect_calories")
            .autoincrement_id("id")
            .text_nn("date")
            .real_nn("calories")
            .text_nn("calorieType")
            .text_nn("source")
            .int_nn("syncedAt")
            .int_nn("lastModified")
            .into(),
        IndexSpec::on("health_connect_calories", &["date"]).into(),
        IndexSpec::on("health_connect_calories", &["calorieType"]).into(),
        IndexSpec::on("health_connect_calories", &["source"]).into(),
        TableSchema::new("health_connect_sleep")
            .autoincrement_id("id")
            .text_nn("date")
            .int_nn("startTime")
            .int_nn("endTime")
            .int_nn("durationMinutes")
            .text_nn("sleepStage")
            .text_nn("source")
            .int_nn("syncedAt")
            .into(),
        IndexSpec::on("health_connect_sleep", &["date"]).into(),
        IndexSpec::on("health_connect_sleep", &["source"]).into(),
        IndexSpec::on("health_connect_sleep", &["sleepStage"]).into(),
        TableSchema::new("health_connect_exercise_sessions")
            .autoincrement_id("id")
            .text_nn("sessionId")
            .text_nn("date")
            .int_nn("startTime")
            .int_nn("endTime")
            .int_nn("durationMinutes")
            .text_nn("exerciseType")
            .text_nn("title")
            .real("calories")
            .int("avgHeartRate")
            .int("maxHeartRate")
            .real("distance")
            .text_nn("source")
            .int_nn("syncedAt")
            .int_nn("lastModified")
            .into(),
        IndexSpec::on("health_connect_exercise_sessions", &["date"]).into(),
        IndexSpec::on("health_connect_exercise_sessions", &["exerciseType"]).into(),
        IndexSpec::on("health_connect_exercise_sessions", &["source"]).into(),
    ]
}

/// 17 -> 18
pub fn ai_usage() -> MigrationStep {
    MigrationStep::new(17, 18, "AI log model and token usage")
        .ops([
            StructuralOperation::add_column("ai_logs", ColumnDef::text("model")),
            StructuralOperation::add_column("ai_logs", ColumnDef::integer("tokensUsed")),
        ])
        .ops([
            IndexSpec::on("ai_logs", &["ts"]),
            IndexSpec::on("ai_logs", &["provider"]),
        ])
}

/// 18 -> 19
pub fn offline_queue() -> MigrationStep {
    MigrationStep::new(18, 19, "offline sync operation queue")
        .op(TableSchema::new("sync_operations")
            .text_nn("id")
            .text_nn("operationType")
            .text_nn("operationData")
            .int_nn("timestamp")
            .column(ColumnDef::integer("retryCount").not_null().default_value("0"))
            .column(ColumnDef::integer("maxRetries").not_null().default_value("3"))
            .column(ColumnDef::text("status").not_null().default_value("'pending'"))
            .column(ColumnDef::integer("priority").not_null().default_value("0"))
            .text("errorMessage")
            .int("lastAttemptAt")
            .int("nextRetryAt")
            .int_nn("createdAt")
            .int("completedAt")
            .primary_key(&["id"]))
        .ops([
            IndexSpec::on("sync_operations", &["status", "priority", "timestamp"]),
            IndexSpec::on("sync_operations", &["operationType"]),
            IndexSpec::on("sync_operations", &["retryCount"]),
            IndexSpec::on("sync_operations", &["createdAt"]),
        ])
}
