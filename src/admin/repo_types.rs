use serde_json::Value;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Counts behind the admin dashboard, over two adjacent windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct PlatformCounts {
    pub total_users: i64,
    pub active_users: i64,
    pub current_scans: i64,
    pub previous_scans: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct UserOverviewRow {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub active: bool,
    pub profile: Value,
    pub last_active: Option<OffsetDateTime>,
}
