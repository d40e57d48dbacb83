use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

use crate::{
    analysis::model::default_daily_tips,
    audit::{self, AuditAction, NewAuditEntry},
    auth::{
        dto::{
            AuthResponse, LoginRequest, PasswordResetConfirm, PasswordResetRequest, PublicUser,
            RefreshRequest, RegisterRequest,
        },
        repo::{latest_password_reset, replace_password_reset, revoke_password_resets},
        repo_types::User,
        services::{
            accept_reset_token, generate_reset_token, hash_password, is_valid_email, normalize_email,
            require_active, verify_password, AuthUser, JwtKeys, RESET_TOKEN_TTL,
        },
    },
    error::AppError,
    profile::model::UserProfile,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/password-reset", post(request_password_reset))
        .route("/auth/password-reset/confirm", post(confirm_password_reset))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

const UNIQUE_VIOLATION: &str = "23505";

fn is_unique_violation(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db)) => db.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}

fn issue_tokens(state: &AppState, user: &User) -> Result<AuthResponse, AppError> {
    let keys = JwtKeys::from_ref(state);
    Ok(AuthResponse {
        access_token: keys.sign_access(user.id)?,
        refresh_token: keys.sign_refresh(user.id)?,
        user: PublicUser::from(user),
    })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    payload.email = normalize_email(&payload.email);

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::BadRequest("Invalid email".into()));
    }
    payload.validate().map_err(|e| AppError::validation(&e))?;

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let hash = hash_password(&payload.password)?;
    let profile = UserProfile::initial(&payload.name, &payload.email, payload.primary_condition);
    let profile_doc = serde_json::to_value(&profile).map_err(anyhow::Error::from)?;
    let user = match User::create(&state.db, &payload.email, &hash, &profile_doc, &default_daily_tips()).await {
        Ok(user) => user,
        // Lost a race with a concurrent registration for the same email.
        Err(e) if is_unique_violation(&e) => {
            warn!(email = %payload.email, "email already registered");
            return Err(AppError::Conflict("Email already registered".into()));
        }
        Err(e) => return Err(e.into()),
    };

    audit::record(
        &state.db,
        NewAuditEntry::new(user.id, AuditAction::UserRegister, "User registered")
            .details(json!({ "email": user.email })),
    )
    .await;
    audit::record(
        &state.db,
        NewAuditEntry::new(user.id, AuditAction::ProfileCreate, "Initial profile created")
            .details(json!({ "primaryCondition": profile.primary_condition })),
    )
    .await;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(issue_tokens(&state, &user)?)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    payload.email = normalize_email(&payload.email);

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::BadRequest("Invalid email".into()));
    }

    let Some(user) = User::find_by_email(&state.db, &payload.email).await? else {
        warn!(email = %payload.email, "login unknown email");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        audit::record(
            &state.db,
            NewAuditEntry::new(user.id, AuditAction::UserLogin, "Login failed").failed("invalid password"),
        )
        .await;
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    if !user.active {
        warn!(user_id = %user.id, "login blocked for inactive account");
        audit::record(
            &state.db,
            NewAuditEntry::new(user.id, AuditAction::UserLogin, "Login blocked").failed("account inactive"),
        )
        .await;
        return Err(AppError::Forbidden("Account is deactivated".into()));
    }

    audit::record(&state.db, NewAuditEntry::new(user.id, AuditAction::UserLogin, "User logged in")).await;
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(issue_tokens(&state, &user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;

    let user = require_active(User::find_by_id(&state.db, claims.sub).await?)?;
    Ok(Json(issue_tokens(&state, &user)?))
}

#[instrument(skip(state))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> StatusCode {
    audit::record(&state.db, NewAuditEntry::new(user_id, AuditAction::UserLogout, "User logged out")).await;
    info!(%user_id, "user logged out");
    StatusCode::NO_CONTENT
}

/// Always answers 202 whether or not the email is registered. A new request
/// replaces any reset still open for the account.
#[instrument(skip(state, payload))]
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetRequest>,
) -> Result<StatusCode, AppError> {
    let email = normalize_email(&payload.email);
    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        debug!("password reset for unknown email");
        return Ok(StatusCode::ACCEPTED);
    };

    let token = generate_reset_token();
    let expires_at = OffsetDateTime::now_utc() + RESET_TOKEN_TTL;
    replace_password_reset(&state.db, user.id, &hash_password(&token)?, expires_at).await?;
    // No mail transport; the token only reaches the debug log.
    debug!(user_id = %user.id, %token, "password reset token issued");

    audit::record(
        &state.db,
        NewAuditEntry::new(user.id, AuditAction::UserPasswordReset, "Password reset requested"),
    )
    .await;
    Ok(StatusCode::ACCEPTED)
}

#[instrument(skip(state, payload))]
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetConfirm>,
) -> Result<StatusCode, AppError> {
    payload.validate().map_err(|e| AppError::validation(&e))?;
    let invalid = || AppError::BadRequest("Invalid or expired reset token".into());

    let email = normalize_email(&payload.email);
    let user = User::find_by_email(&state.db, &email).await?.ok_or_else(invalid)?;

    let latest = latest_password_reset(&state.db, user.id).await?;
    if !accept_reset_token(latest.as_ref(), &payload.token, OffsetDateTime::now_utc())? {
        return Err(invalid());
    }

    let revoked = revoke_password_resets(&state.db, user.id).await?;
    debug!(user_id = %user.id, revoked, "reset token accepted");
    User::update_password(&state.db, user.id, &hash_password(&payload.new_password)?).await?;

    audit::record(
        &state.db,
        NewAuditEntry::new(user.id, AuditAction::UserPasswordReset, "Password changed via reset token"),
    )
    .await;
    info!(user_id = %user.id, "password reset completed");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    Ok(Json(PublicUser::from(&user)))
}

#[cfg(test)]
mod register_tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::{borrow::Cow, error::Error};

    #[derive(Debug)]
    struct PgError(&'static str);

    impl std::fmt::Display for PgError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "pg error {}", self.0)
        }
    }

    impl Error for PgError {}

    impl DatabaseError for PgError {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.0))
        }

        fn as_error(&self) -> &(dyn Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    fn db_error(code: &'static str) -> anyhow::Error {
        sqlx::Error::Database(Box::new(PgError(code))).into()
    }

    #[test]
    fn duplicate_email_insert_is_a_unique_violation() {
        assert!(is_unique_violation(&db_error("23505")));
        assert!(is_unique_violation(&db_error("23505").context("insert user")));
        assert!(!is_unique_violation(&db_error("23503")));
    }

    #[test]
    fn only_database_errors_count_as_unique_violations() {
        assert!(!is_unique_violation(&anyhow::anyhow!("duplicate key value")));
        assert!(!is_unique_violation(&anyhow::Error::from(sqlx::Error::RowNotFound)));
        assert!(!is_unique_violation(&anyhow::Error::from(sqlx::Error::PoolTimedOut).context("insert user")));
    }
}
