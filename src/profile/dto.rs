use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use crate::analysis::model::HealthTip;
use crate::auth::{dto::UserRole, repo_types::User};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub profile: Value,
    pub tips: Vec<HealthTip>,
    pub is_profile_complete: bool,
    pub active: bool,
    pub role: UserRole,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for ProfileResponse {
    fn from(u: User) -> Self {
        let role = u.role();
        Self {
            profile: u.profile,
            tips: u.tips.0,
            is_profile_complete: u.is_profile_complete,
            active: u.active,
            role,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStatus {
    pub complete: bool,
    pub missing: Vec<String>,
}
