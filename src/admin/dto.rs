use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::repo_types::{PlatformCounts, UserOverviewRow};
use crate::analysis::model::HealthCondition;
use crate::audit::dto::{AuditAction, AuditCategory};
use crate::auth::dto::UserRole;

pub const STATS_WINDOW: Duration = Duration::days(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
}

/// A flat window counts as increasing.
pub fn scanning_trend(current: i64, previous: i64) -> Trend {
    if current >= previous {
        Trend::Increasing
    } else {
        Trend::Decreasing
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_users: i64,
    pub active_users: i64,
    pub total_scans: i64,
    pub scanning_trend: Trend,
}

impl From<PlatformCounts> for AdminStats {
    fn from(c: PlatformCounts) -> Self {
        Self {
            total_users: c.total_users,
            active_users: c.active_users,
            total_scans: c.current_scans,
            scanning_trend: scanning_trend(c.current_scans, c.previous_scans),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub active: bool,
    pub role: UserRole,
    pub primary_condition: Option<HealthCondition>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_active: Option<OffsetDateTime>,
}

impl From<UserOverviewRow> for AdminUserView {
    fn from(r: UserOverviewRow) -> Self {
        let name = r
            .profile
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(&r.email)
            .to_string();
        let primary_condition = r
            .profile
            .get("primaryCondition")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok());
        Self {
            id: r.id,
            name,
            email: r.email,
            active: r.active,
            role: r.role.parse().unwrap_or(UserRole::User),
            primary_condition,
            last_active: r.last_active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: UserRole,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditLogQuery {
    /// Comma separated, e.g. `auth,scan`.
    #[serde(default)]
    pub categories: Option<String>,
    /// A single action name, e.g. `scan.saved`.
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl AuditLogQuery {
    /// Empty when no filter was given. Unknown names are rejected.
    pub fn categories(&self) -> Result<Vec<String>, String> {
        let Some(raw) = self.categories.as_deref() else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .filter(|c| !c.trim().is_empty())
            .map(|c| c.parse::<AuditCategory>().map(|c| c.as_str().to_string()))
            .collect()
    }

    pub fn action(&self) -> Result<Option<AuditAction>, String> {
        self.action
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .map(|a| a.parse::<AuditAction>())
            .transpose()
    }
}

/// Start of the current and previous windows ending at `now`.
pub fn stats_windows(now: OffsetDateTime) -> (OffsetDateTime, OffsetDateTime) {
    let current = now - STATS_WINDOW;
    (current, current - STATS_WINDOW)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn trend_ties_count_as_increasing() {
        assert_eq!(scanning_trend(10, 10), Trend::Increasing);
        assert_eq!(scanning_trend(11, 3), Trend::Increasing);
        assert_eq!(scanning_trend(2, 3), Trend::Decreasing);
        assert_eq!(scanning_trend(0, 0), Trend::Increasing);
    }

    #[test]
    fn stats_use_current_window() {
        let stats = AdminStats::from(PlatformCounts {
            total_users: 12,
            active_users: 4,
            current_scans: 30,
            previous_scans: 45,
        });
        assert_eq!(stats.total_scans, 30);
        assert_eq!(stats.scanning_trend, Trend::Decreasing);
        let body = serde_json::to_value(&stats).unwrap();
        assert_eq!(body["scanningTrend"], "decreasing");
        assert_eq!(body["activeUsers"], 4);
    }

    #[test]
    fn windows_are_thirty_days_each() {
        let (current, previous) = stats_windows(datetime!(2024-04-30 12:00 UTC));
        assert_eq!(current, datetime!(2024-03-31 12:00 UTC));
        assert_eq!(previous, datetime!(2024-03-01 12:00 UTC));
    }

    #[test]
    fn user_view_reads_profile() {
        let view = AdminUserView::from(UserOverviewRow {
            id: Uuid::new_v4(),
            email: "ada@example.com".into(),
            role: "admin".into(),
            active: false,
            profile: json!({ "name": "Ada", "primaryCondition": "hypertension" }),
            last_active: None,
        });
        assert_eq!(view.name, "Ada");
        assert_eq!(view.role, UserRole::Admin);
        assert_eq!(view.primary_condition, Some(HealthCondition::Hypertension));
        let body = serde_json::to_value(&view).unwrap();
        assert!(body["lastActive"].is_null());
    }

    #[test]
    fn user_view_falls_back_to_email() {
        let view = AdminUserView::from(UserOverviewRow {
            id: Uuid::new_v4(),
            email: "bo@example.com".into(),
            role: "whatever".into(),
            active: true,
            profile: json!({}),
            last_active: Some(datetime!(2024-01-02 03:04:05 UTC)),
        });
        assert_eq!(view.name, "bo@example.com");
        assert_eq!(view.role, UserRole::User);
        assert!(view.primary_condition.is_none());
    }

    #[test]
    fn category_filter_parsing() {
        let q = AuditLogQuery {
            categories: Some("auth, scan,,".into()),
            ..Default::default()
        };
        assert_eq!(q.categories().unwrap(), vec!["auth", "scan"]);
        assert!(AuditLogQuery::default().categories().unwrap().is_empty());
        let bad = AuditLogQuery {
            categories: Some("auth,bogus".into()),
            ..Default::default()
        };
        assert!(bad.categories().is_err());
    }

    #[test]
    fn audit_query_action_filter() {
        let q = AuditLogQuery {
            action: Some("profile.delete".into()),
            ..Default::default()
        };
        assert_eq!(q.action().unwrap(), Some(AuditAction::ProfileDelete));
        assert_eq!(AuditLogQuery::default().action().unwrap(), None);
        let bad = AuditLogQuery {
            action: Some("scan.exploded".into()),
            ..Default::default()
        };
        assert!(bad.action().is_err());
    }
}
