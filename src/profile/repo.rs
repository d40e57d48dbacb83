use serde_json::Value;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use crate::analysis::model::HealthTip;

/// Stores a validated profile and marks it complete.
pub async fn save_profile(db: &PgPool, user_id: Uuid, profile: &Value) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET profile = $2, is_profile_complete = TRUE, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(profile)
    .execute(db)
    .await?;
    Ok(())
}

/// Replaces the tip list shown on the user's dashboard.
pub async fn update_tips(db: &PgPool, user_id: Uuid, tips: &[HealthTip]) -> anyhow::Result<()> {
    sqlx::query("UPDATE users SET tips = $2, updated_at = now() WHERE id = $1")
        .bind(user_id)
        .bind(Json(tips))
        .execute(db)
        .await?;
    Ok(())
}
