use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument};

use super::{
    dto::{ProfileResponse, ProfileStatus},
    gate::check_profile,
    repo,
};
use crate::{
    analysis::model::HealthTip,
    audit::{self, AuditAction, NewAuditEntry},
    auth::{repo_types::User, AuthUser},
    error::AppError,
    state::AppState,
};

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/profile/tips", get(get_tips))
        .route("/profile/status", get(get_status))
}

pub(crate) async fn load_user(state: &AppState, user_id: uuid::Uuid) -> Result<User, AppError> {
    User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

/// Overlays the top-level keys of `patch` onto `stored`.
pub fn merge_profile(stored: &Value, patch: Value) -> Result<Value, AppError> {
    let Value::Object(patch) = patch else {
        return Err(AppError::BadRequest("Profile body must be a JSON object".into()));
    };
    let mut merged = match stored {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    merged.extend(patch);
    Ok(Value::Object(merged))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProfileResponse>, AppError> {
    Ok(Json(load_user(&state, user_id).await?.into()))
}

#[instrument(skip(state, patch))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(patch): Json<Value>,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = load_user(&state, user_id).await?;
    let merged = merge_profile(&user.profile, patch)?;
    let profile = check_profile(&merged).map_err(AppError::Validation)?;

    let previous_condition = user.profile.get("primaryCondition").cloned();
    let stored = serde_json::to_value(&profile).map_err(anyhow::Error::from)?;
    if let Err(e) = repo::save_profile(&state.db, user_id, &stored).await {
        audit::record(
            &state.db,
            NewAuditEntry::new(user_id, AuditAction::ProfileUpdate, "Profile update failed").failed(&e),
        )
        .await;
        return Err(e.into());
    }

    audit::record(
        &state.db,
        NewAuditEntry::new(user_id, AuditAction::ProfileUpdate, "Profile updated"),
    )
    .await;
    let current_condition = json!(profile.primary_condition);
    if previous_condition.as_ref() != Some(&current_condition) {
        audit::record(
            &state.db,
            NewAuditEntry::new(user_id, AuditAction::ConditionUpdated, "Primary condition changed")
                .details(json!({ "from": previous_condition, "to": current_condition })),
        )
        .await;
    }

    info!(%user_id, "profile updated");
    Ok(Json(load_user(&state, user_id).await?.into()))
}

#[instrument(skip(state))]
pub async fn get_tips(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<HealthTip>>, AppError> {
    Ok(Json(load_user(&state, user_id).await?.tips.0))
}

#[instrument(skip(state))]
pub async fn get_status(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProfileStatus>, AppError> {
    let user = load_user(&state, user_id).await?;
    let missing = check_profile(&user.profile).err().unwrap_or_default();
    Ok(Json(ProfileStatus {
        complete: missing.is_empty(),
        missing,
    }))
}
