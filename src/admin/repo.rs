use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{PlatformCounts, UserOverviewRow};
use crate::auth::dto::UserRole;

/// `window_start` opens the current window; `previous_start` opens the one before it.
pub async fn platform_counts(
    db: &PgPool,
    window_start: OffsetDateTime,
    previous_start: OffsetDateTime,
) -> anyhow::Result<PlatformCounts> {
    let counts = sqlx::query_as::<_, PlatformCounts>(
        r#"
        SELECT
            (SELECT count(*) FROM users)                                  AS total_users,
            (SELECT count(DISTINCT user_id) FROM scan_records
              WHERE created_at >= $1)                                     AS active_users,
            (SELECT count(*) FROM scan_records WHERE created_at >= $1)    AS current_scans,
            (SELECT count(*) FROM scan_records
              WHERE created_at >= $2 AND created_at < $1)                 AS previous_scans
        "#,
    )
    .bind(window_start)
    .bind(previous_start)
    .fetch_one(db)
    .await?;
    Ok(counts)
}

pub async fn list_users(db: &PgPool) -> anyhow::Result<Vec<UserOverviewRow>> {
    let rows = sqlx::query_as::<_, UserOverviewRow>(
        r#"
        SELECT u.id, u.email, u.role, u.active, u.profile, max(s.created_at) AS last_active
        FROM users u
        LEFT JOIN scan_records s ON s.user_id = u.id
        GROUP BY u.id
        ORDER BY u.created_at DESC
        "#,
    )
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Returns false when the user does not exist.
pub async fn set_active(db: &PgPool, user_id: Uuid, active: bool) -> anyhow::Result<bool> {
    let result = sqlx::query("UPDATE users SET active = $2, updated_at = now() WHERE id = $1")
        .bind(user_id)
        .bind(active)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn set_role(db: &PgPool, user_id: Uuid, role: UserRole) -> anyhow::Result<bool> {
    let result = sqlx::query("UPDATE users SET role = $2, updated_at = now() WHERE id = $1")
        .bind(user_id)
        .bind(role.as_str())
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}
