// crates/fitstore/src/db/schema/social.rs
// Social: challenges, participation, badges and leaderboards

use crate::db::migration::{
    ColumnDef, IndexSpec, MigrationStep, OnDelete, StructuralOperation, TableSchema,
};

/// 13 -> 14
pub fn social_challenges() -> MigrationStep {
    MigrationStep::new(13, 14, "social challenges, badges and leaderboards")
        .op(TableSchema::new("social_challenges")
            .autoincrement_id("id")
            .text_nn("title")
            .text_nn("description")
            .text_nn("category")
            .text_nn("challengeType")
            .text_nn("targetMetric")
            .real_nn("targetValue")
            .text_nn("unit")
            .int_nn("duration")
            .text_nn("startDate")
            .text_nn("endDate")
            .int("maxParticipants")
            .int_nn("currentParticipants")
            .text_nn("status")
            .text("creatorId")
            .text("reward")
            .text_nn("difficulty")
            .text("imageUrl")
            .text("rules")
            .int_nn("isOfficial")
            .int_nn("createdAt"))
        .ops([
            IndexSpec::on("social_challenges", &["status"]),
            IndexSpec::on("social_challenges", &["category"]),
            IndexSpec::on("social_challenges", &["startDate"]),
            IndexSpec::on("social_challenges", &["endDate"]),
            IndexSpec::on("social_challenges", &["createdAt"]),
        ])
        .op(TableSchema::new("challenge_participations")
            .autoincrement_id("id")
            .int_nn("challengeId")
            .text_nn("userId")
            .text("userName")
            .text_nn("status")
            .real_nn("currentProgress")
            .real_nn("progressPercentage")
            .text("lastActivityDate")
            .int("completedAt")
            .int_nn("joinedAt")
            .int("rank")
            .real("personalBest")
            .text("notes")
            .foreign_key("challengeId", "social_challenges", "id", OnDelete::Cascade))
        .ops([
            IndexSpec::on("challenge_participations", &["challengeId"]),
            IndexSpec::on("challenge_participations", &["userId"]),
            IndexSpec::on("challenge_participations", &["status"]),
            IndexSpec::on("challenge_participations", &["joinedAt"]),
        ])
        .op(TableSchema::new("challenge_progress_logs")
            .autoincrement_id("id")
            .int_nn("participationId")
            .text_nn("logDate")
            .real_nn("value")
            .text("description")
            .text_nn("source")
            .int_nn("timestamp")
            .foreign_key("participationId", "challenge_participations", "id", OnDelete::Cascade))
        .ops([
            IndexSpec::on("challenge_progress_logs", &["participationId"]),
            IndexSpec::on("challenge_progress_logs", &["logDate"]),
            IndexSpec::on("challenge_progress_logs", &["timestamp"]),
        ])
        .op(TableSchema::new("social_badges")
            .autoincrement_id("id")
            .text_nn("title")
            .text_nn("description")
            .text_nn("category")
            .text_nn("badgeType")
            .text_nn("iconName")
            .text_nn("rarity")
            .text_nn("requirements")
            .int("challengeId")
            .int_nn("isUnlocked")
            .int("unlockedAt")
            .real_nn("progress")
            .int_nn("createdAt"))
        .ops([
            IndexSpec::on("social_badges", &["category"]),
            IndexSpec::on("social_badges", &["badgeType"]),
            IndexSpec::on("social_badges", &["rarity"]),
            IndexSpec::on("social_badges", &["isUnlocked"]),
            IndexSpec::on("social_badges", &["unlockedAt"]),
        ])
        .op(TableSchema::new("leaderboard_entries")
            .autoincrement_id("id")
            .int_nn("challengeId")
            .text_nn("userId")
            .text("userName")
            .int_nn("rank")
            .real_nn("score")
            .int("completionTime")
            .text("badge")
            .int_nn("lastUpdated")
            .foreign_key("challengeId", "social_challenges", "id", OnDelete::Cascade))
        .ops([
            IndexSpec::on("leaderboard_entries", &["challengeId"]),
            IndexSpec::on("leaderboard_entries", &["userId"]),
            IndexSpec::on("leaderboard_entries", &["rank"]),
            IndexSpec::named("index_leaderboard_score", "leaderboard_entries", &["score"]),
        ])
        .ops(shareable_achievements())
}

/// Achievements become shareable; NOT NULL additions carry defaults for existing rows
fn shareable_achievements() -> Vec<StructuralOperation> {
    vec![
        StructuralOperation::add_column("personal_achievements", ColumnDef::text("badgeType")),
        StructuralOperation::add_column("personal_achievements", ColumnDef::text("rarity")),
        StructuralOperation::add_column(
            "personal_achievements",
            ColumnDef::integer("socialVisible").not_null().default_value("0"),
        ),
        StructuralOperation::add_column("personal_achievements", ColumnDef::integer("challengeId")),
        StructuralOperation::add_column("personal_achievements", ColumnDef::text("shareMessage")),
        StructuralOperation::add_column(
            "personal_achievements",
            ColumnDef::integer("pointsValue").not_null().default_value("0"),
        ),
    ]
}
