use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditCategory {
    Auth,
    Profile,
    Health,
    Scan,
    System,
    Admin,
}

impl AuditCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditCategory::Auth => "auth",
            AuditCategory::Profile => "profile",
            AuditCategory::Health => "health",
            AuditCategory::Scan => "scan",
            AuditCategory::System => "system",
            AuditCategory::Admin => "admin",
        }
    }
}

impl std::str::FromStr for AuditCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "auth" => Ok(AuditCategory::Auth),
            "profile" => Ok(AuditCategory::Profile),
            "health" => Ok(AuditCategory::Health),
            "scan" => Ok(AuditCategory::Scan),
            "system" => Ok(AuditCategory::System),
            "admin" => Ok(AuditCategory::Admin),
            other => Err(format!("unknown audit category: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    #[serde(rename = "user.login")]
    UserLogin,
    #[serde(rename = "user.logout")]
    UserLogout,
    #[serde(rename = "user.register")]
    UserRegister,
    #[serde(rename = "user.password_reset")]
    UserPasswordReset,
    #[serde(rename = "profile.create")]
    ProfileCreate,
    #[serde(rename = "profile.update")]
    ProfileUpdate,
    #[serde(rename = "profile.delete")]
    ProfileDelete,
    #[serde(rename = "health.tip_generated")]
    TipGenerated,
    #[serde(rename = "health.condition_updated")]
    ConditionUpdated,
    #[serde(rename = "scan.created")]
    ScanCreated,
    #[serde(rename = "scan.analyzed")]
    ScanAnalyzed,
    #[serde(rename = "scan.saved")]
    ScanSaved,
    #[serde(rename = "scan.deleted")]
    ScanDeleted,
    #[serde(rename = "system.error")]
    SystemError,
    #[serde(rename = "system.warning")]
    SystemWarning,
    #[serde(rename = "admin.user_status_changed")]
    UserStatusChanged,
    #[serde(rename = "admin.role_changed")]
    RoleChanged,
}

impl AuditAction {
    pub const ALL: [AuditAction; 17] = [
        AuditAction::UserLogin,
        AuditAction::UserLogout,
        AuditAction::UserRegister,
        AuditAction::UserPasswordReset,
        AuditAction::ProfileCreate,
        AuditAction::ProfileUpdate,
        AuditAction::ProfileDelete,
        AuditAction::TipGenerated,
        AuditAction::ConditionUpdated,
        AuditAction::ScanCreated,
        AuditAction::ScanAnalyzed,
        AuditAction::ScanSaved,
        AuditAction::ScanDeleted,
        AuditAction::SystemError,
        AuditAction::SystemWarning,
        AuditAction::UserStatusChanged,
        AuditAction::RoleChanged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::UserLogin => "user.login",
            AuditAction::UserLogout => "user.logout",
            AuditAction::UserRegister => "user.register",
            AuditAction::UserPasswordReset => "user.password_reset",
            AuditAction::ProfileCreate => "profile.create",
            AuditAction::ProfileUpdate => "profile.update",
            AuditAction::ProfileDelete => "profile.delete",
            AuditAction::TipGenerated => "health.tip_generated",
            AuditAction::ConditionUpdated => "health.condition_updated",
            AuditAction::ScanCreated => "scan.created",
            AuditAction::ScanAnalyzed => "scan.analyzed",
            AuditAction::ScanSaved => "scan.saved",
            AuditAction::ScanDeleted => "scan.deleted",
            AuditAction::SystemError => "system.error",
            AuditAction::SystemWarning => "system.warning",
            AuditAction::UserStatusChanged => "admin.user_status_changed",
            AuditAction::RoleChanged => "admin.role_changed",
        }
    }

    pub fn category(&self) -> AuditCategory {
        match self {
            AuditAction::UserLogin
            | AuditAction::UserLogout
            | AuditAction::UserRegister
            | AuditAction::UserPasswordReset => AuditCategory::Auth,
            AuditAction::ProfileCreate | AuditAction::ProfileUpdate | AuditAction::ProfileDelete => {
                AuditCategory::Profile
            }
            AuditAction::TipGenerated | AuditAction::ConditionUpdated => AuditCategory::Health,
            AuditAction::ScanCreated
            | AuditAction::ScanAnalyzed
            | AuditAction::ScanSaved
            | AuditAction::ScanDeleted => AuditCategory::Scan,
            AuditAction::SystemError | AuditAction::SystemWarning => AuditCategory::System,
            AuditAction::UserStatusChanged | AuditAction::RoleChanged => AuditCategory::Admin,
        }
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        AuditAction::ALL
            .into_iter()
            .find(|a| a.as_str() == name)
            .ok_or_else(|| format!("unknown audit action: {name}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Error,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Success => "success",
            AuditStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    Info,
    Warning,
    Error,
}

impl AuditSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditSeverity::Info => "info",
            AuditSeverity::Warning => "warning",
            AuditSeverity::Error => "error",
        }
    }
}

/// Severity written when the caller did not pick one.
pub fn effective_severity(status: AuditStatus, severity: Option<AuditSeverity>) -> AuditSeverity {
    severity.unwrap_or(match status {
        AuditStatus::Error => AuditSeverity::Error,
        AuditStatus::Success => AuditSeverity::Info,
    })
}

/// An entry about to be written.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAuditEntry {
    pub user_id: Uuid,
    pub category: AuditCategory,
    pub action: AuditAction,
    pub description: String,
    pub status: AuditStatus,
    pub severity: Option<AuditSeverity>,
    pub metadata: Value,
}

impl NewAuditEntry {
    pub fn new(user_id: Uuid, action: AuditAction, description: impl Into<String>) -> Self {
        Self {
            user_id,
            category: action.category(),
            action,
            description: description.into(),
            status: AuditStatus::Success,
            severity: None,
            metadata: json!({}),
        }
    }

    pub fn failed(mut self, error: impl std::fmt::Display) -> Self {
        self.status = AuditStatus::Error;
        self.metadata["error"] = Value::String(error.to_string());
        self
    }

    pub fn severity(mut self, severity: AuditSeverity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.metadata["details"] = details;
        self
    }

    pub fn effective_severity(&self) -> AuditSeverity {
        effective_severity(self.status, self.severity)
    }

    /// The entry written in place of one that could not be stored.
    pub fn system_error_for(&self) -> Self {
        NewAuditEntry {
            user_id: self.user_id,
            category: AuditCategory::System,
            action: AuditAction::SystemError,
            description: "Failed to create audit log".into(),
            status: AuditStatus::Error,
            severity: Some(AuditSeverity::Error),
            metadata: json!({ "originalEntry": self }),
        }
    }
}

/// Stored entry as returned to admins.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category: String,
    pub action: String,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub status: String,
    pub severity: String,
    pub metadata: Value,
}
