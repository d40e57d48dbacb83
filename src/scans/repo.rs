use serde_json::Value;
use sqlx::{types::Json, FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::record::ScanRow;
use crate::analysis::model::{HealthCondition, HealthPrediction};

const SCAN_COLUMNS: &str = "id, user_id, food_name, nutrition, condition, prediction, created_at";

pub async fn insert(
    db: &PgPool,
    user_id: Uuid,
    food_name: &str,
    nutrition: &Value,
    condition: HealthCondition,
    prediction: &HealthPrediction,
) -> anyhow::Result<ScanRow> {
    let row = sqlx::query_as::<_, ScanRow>(&format!(
        r#"
        INSERT INTO scan_records (user_id, food_name, nutrition, condition, prediction)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {SCAN_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(food_name)
    .bind(nutrition)
    .bind(condition.as_str())
    .bind(Json(prediction))
    .fetch_one(db)
    .await?;
    Ok(row)
}

/// Newest first, optionally restricted to one condition.
pub async fn list_by_user(
    db: &PgPool,
    user_id: Uuid,
    condition: Option<HealthCondition>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<ScanRow>> {
    let rows = sqlx::query_as::<_, ScanRow>(&format!(
        r#"
        SELECT {SCAN_COLUMNS}
        FROM scan_records
        WHERE user_id = $1 AND ($2::text IS NULL OR condition = $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#
    ))
    .bind(user_id)
    .bind(condition.map(|c| c.as_str()))
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn list_since(db: &PgPool, user_id: Uuid, since: OffsetDateTime) -> anyhow::Result<Vec<ScanRow>> {
    let rows = sqlx::query_as::<_, ScanRow>(&format!(
        r#"
        SELECT {SCAN_COLUMNS}
        FROM scan_records
        WHERE user_id = $1 AND created_at >= $2
        ORDER BY created_at DESC
        "#
    ))
    .bind(user_id)
    .bind(since)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn get(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<ScanRow>> {
    let row = sqlx::query_as::<_, ScanRow>(&format!(
        "SELECT {SCAN_COLUMNS} FROM scan_records WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

/// Returns false when no record with that id belongs to the user.
pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM scan_records WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct ScanCounts {
    pub total: i64,
    pub today: i64,
    pub safe: i64,
    pub risky: i64,
}

pub async fn counts(db: &PgPool, user_id: Uuid, start_of_day: OffsetDateTime) -> anyhow::Result<ScanCounts> {
    let counts = sqlx::query_as::<_, ScanCounts>(
        r#"
        SELECT
            count(*)                                                  AS total,
            count(*) FILTER (WHERE created_at >= $2)                  AS today,
            count(*) FILTER (WHERE prediction->>'prediction' = 'Safe')  AS safe,
            count(*) FILTER (WHERE prediction->>'prediction' = 'Risky') AS risky
        FROM scan_records
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .bind(start_of_day)
    .fetch_one(db)
    .await?;
    Ok(counts)
}

/// Raw nutrition documents of every scan the user owns.
pub async fn nutrition_docs(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Value>> {
    let docs = sqlx::query_scalar::<_, Value>("SELECT nutrition FROM scan_records WHERE user_id = $1")
        .bind(user_id)
        .fetch_all(db)
        .await?;
    Ok(docs)
}
