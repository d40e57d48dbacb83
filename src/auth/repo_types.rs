use serde_json::Value;
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::analysis::model::HealthTip;
use crate::auth::dto::UserRole;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String, // argon2, never serialized
    pub role: String,
    pub active: bool,
    pub profile: Value,
    pub is_profile_complete: bool,
    pub tips: Json<Vec<HealthTip>>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    /// Unknown role strings are treated as the unprivileged role.
    pub fn role(&self) -> UserRole {
        self.role.parse().unwrap_or(UserRole::User)
    }

    pub fn display_name(&self) -> &str {
        self.profile
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(&self.email)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct PasswordReset {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: OffsetDateTime,
}
