use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::dto::{AuditAction, AuditLogEntry, NewAuditEntry};

pub const DEFAULT_LIST_LIMIT: i64 = 100;
pub const MAX_LIST_LIMIT: i64 = 500;

#[derive(Debug, FromRow)]
struct AuditLogRow {
    id: Uuid,
    user_id: Uuid,
    category: String,
    action: String,
    description: String,
    status: String,
    severity: String,
    metadata: serde_json::Value,
    created_at: OffsetDateTime,
}

impl From<AuditLogRow> for AuditLogEntry {
    fn from(r: AuditLogRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            category: r.category,
            action: r.action,
            description: r.description,
            timestamp: r.created_at,
            status: r.status,
            severity: r.severity,
            metadata: r.metadata,
        }
    }
}

pub async fn insert(db: &PgPool, entry: &NewAuditEntry) -> anyhow::Result<Uuid> {
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO audit_logs (user_id, category, action, description, status, severity, metadata)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(entry.user_id)
    .bind(entry.category.as_str())
    .bind(entry.action.as_str())
    .bind(&entry.description)
    .bind(entry.status.as_str())
    .bind(entry.effective_severity().as_str())
    .bind(&entry.metadata)
    .fetch_one(db)
    .await?;
    Ok(id)
}

pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

/// Newest first. An empty `categories` slice means every category, and no
/// `action` means every action.
pub async fn list(
    db: &PgPool,
    categories: &[String],
    action: Option<AuditAction>,
    limit: i64,
) -> anyhow::Result<Vec<AuditLogEntry>> {
    let rows = sqlx::query_as::<_, AuditLogRow>(
        r#"
        SELECT id, user_id, category, action, description, status, severity, metadata, created_at
        FROM audit_logs
        WHERE (cardinality($1::text[]) = 0 OR category = ANY($1))
          AND ($2::text IS NULL OR action = $2)
        ORDER BY created_at DESC
        LIMIT $3
        "#,
    )
    .bind(categories)
    .bind(action.map(|a| a.as_str()))
    .bind(limit)
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_caps() {
        assert_eq!(clamp_limit(None), 100);
        assert_eq!(clamp_limit(Some(20)), 20);
        assert_eq!(clamp_limit(Some(10_000)), 500);
        assert_eq!(clamp_limit(Some(0)), 1);
    }
}
