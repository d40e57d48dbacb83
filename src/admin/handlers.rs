use axum::{
    extract::{Path, Query, State},
    routing::{get, patch},
    Json, Router,
};
use serde_json::json;
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{stats_windows, AdminStats, AdminUserView, AuditLogQuery, SetActiveRequest, SetRoleRequest},
    repo,
};
use crate::{
    audit::{self, dto::AuditLogEntry, repo::clamp_limit, AuditAction, NewAuditEntry},
    auth::AdminUser,
    error::AppError,
    state::AppState,
};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/stats", get(stats))
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id/active", patch(set_active))
        .route("/admin/users/:id/role", patch(set_role))
        .route("/admin/audit-logs", get(audit_logs))
}

#[instrument(skip(state))]
pub async fn stats(State(state): State<AppState>, AdminUser(_): AdminUser) -> Result<Json<AdminStats>, AppError> {
    let (current, previous) = stats_windows(OffsetDateTime::now_utc());
    let counts = repo::platform_counts(&state.db, current, previous).await?;
    Ok(Json(counts.into()))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Vec<AdminUserView>>, AppError> {
    let rows = repo::list_users(&state.db).await?;
    Ok(Json(rows.into_iter().map(AdminUserView::from).collect()))
}

#[instrument(skip(state))]
pub async fn set_active(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Path(user_id): Path<Uuid>,
    Json(body): Json<SetActiveRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if user_id == admin_id && !body.active {
        return Err(AppError::BadRequest("Admins cannot deactivate themselves".into()));
    }
    if !repo::set_active(&state.db, user_id, body.active).await? {
        return Err(AppError::NotFound("User not found".into()));
    }

    let verb = if body.active { "activated" } else { "deactivated" };
    audit::record(
        &state.db,
        NewAuditEntry::new(admin_id, AuditAction::UserStatusChanged, format!("User {verb}"))
            .details(json!({ "targetUserId": user_id, "active": body.active })),
    )
    .await;
    info!(%admin_id, %user_id, active = body.active, "user status changed");
    Ok(Json(json!({ "id": user_id, "active": body.active })))
}

#[instrument(skip(state))]
pub async fn set_role(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Path(user_id): Path<Uuid>,
    Json(body): Json<SetRoleRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if user_id == admin_id {
        return Err(AppError::BadRequest("Admins cannot change their own role".into()));
    }
    if !repo::set_role(&state.db, user_id, body.role).await? {
        return Err(AppError::NotFound("User not found".into()));
    }

    audit::record(
        &state.db,
        NewAuditEntry::new(
            admin_id,
            AuditAction::RoleChanged,
            format!("Role set to {}", body.role.as_str()),
        )
        .details(json!({ "targetUserId": user_id, "role": body.role })),
    )
    .await;
    info!(%admin_id, %user_id, role = body.role.as_str(), "user role changed");
    Ok(Json(json!({ "id": user_id, "role": body.role })))
}

#[instrument(skip(state))]
pub async fn audit_logs(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(q): Query<AuditLogQuery>,
) -> Result<Json<Vec<AuditLogEntry>>, AppError> {
    let categories = q.categories().map_err(AppError::BadRequest)?;
    let action = q.action().map_err(AppError::BadRequest)?;
    let entries = audit::repo::list(&state.db, &categories, action, clamp_limit(q.limit)).await?;
    Ok(Json(entries))
}
