use serde_json::Value;
use sqlx::{types::Json, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::analysis::model::HealthTip;
use crate::auth::repo_types::{PasswordReset, User};

const USER_COLUMNS: &str = "id, email, password_hash, role, active, profile, is_profile_complete, tips, created_at, updated_at";

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user with hashed password, starting profile and tips.
    pub async fn create(
        db: &PgPool,
        email: &str,
        password_hash: &str,
        profile: &Value,
        tips: &[HealthTip],
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, profile, tips, is_profile_complete)
            VALUES ($1, $2, $3, $4, FALSE)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(password_hash)
        .bind(profile)
        .bind(Json(tips))
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn update_password(db: &PgPool, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(db)
            .await?;
        Ok(())
    }
}

/// Revokes every open reset for the user and stores the new one, so at most
/// one reset token is live per user.
pub async fn replace_password_reset(
    db: &PgPool,
    user_id: Uuid,
    token_hash: &str,
    expires_at: OffsetDateTime,
) -> anyhow::Result<()> {
    let mut tx = db.begin().await?;
    sqlx::query("UPDATE password_resets SET used_at = now() WHERE user_id = $1 AND used_at IS NULL")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        r#"
        INSERT INTO password_resets (user_id, token_hash, expires_at)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(())
}

/// Newest unused reset request for a user, expired or not.
pub async fn latest_password_reset(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<PasswordReset>> {
    let row = sqlx::query_as::<_, PasswordReset>(
        r#"
        SELECT id, user_id, token_hash, expires_at
        FROM password_resets
        WHERE user_id = $1 AND used_at IS NULL
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn revoke_password_resets(db: &PgPool, user_id: Uuid) -> anyhow::Result<u64> {
    let result = sqlx::query("UPDATE password_resets SET used_at = now() WHERE user_id = $1 AND used_at IS NULL")
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}
