pub(crate) use crate::auth::dto::{Claims, JwtKeys, TokenKind};
use crate::auth::{
    dto::UserRole,
    repo_types::{PasswordReset, User},
};
use crate::config::JwtConfig;
use crate::error::AppError;
use crate::state::AppState;
use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use regex::Regex;
use std::time::Duration;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, error, warn};
use uuid::Uuid;

pub const RESET_TOKEN_LEN: usize = 32;
pub const RESET_TOKEN_TTL: TimeDuration = TimeDuration::hours(1);

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Random alphanumeric token handed out for a password reset.
pub fn generate_reset_token() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(RESET_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Only the newest open reset is ever checked, so a confirm costs at most one
/// argon2 verification no matter how many resets were requested.
pub fn accept_reset_token(
    latest: Option<&PasswordReset>,
    token: &str,
    now: OffsetDateTime,
) -> anyhow::Result<bool> {
    match latest {
        Some(reset) if reset.expires_at > now => verify_password(token, &reset.token_hash),
        _ => Ok(false),
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from_config(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::from_secs((cfg.ttl_minutes as u64) * 60),
            refresh_ttl: Duration::from_secs((cfg.refresh_ttl_minutes as u64) * 60),
        }
    }

    fn sign_with_kind(&self, user_id: Uuid, kind: TokenKind) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.sign_with_kind(user_id, TokenKind::Access)
    }
    pub fn sign_refresh(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.sign_with_kind(user_id, TokenKind::Refresh)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Refresh {
            anyhow::bail!("not a refresh token");
        }
        Ok(claims)
    }

    /// Resolves an access token to its user id.
    pub fn authenticate(&self, token: &str) -> Result<Uuid, AppError> {
        let claims = self.verify(token).map_err(|_| {
            warn!("invalid or expired token");
            AppError::Unauthorized("Invalid or expired token".into())
        })?;
        if claims.kind != TokenKind::Access {
            return Err(AppError::Unauthorized("Access token required".into()));
        }
        Ok(claims.sub)
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    header.strip_prefix("Bearer ")
}

/// Refuses unknown and deactivated accounts, so deactivation takes effect
/// before outstanding access tokens expire.
pub fn require_active(user: Option<User>) -> Result<User, AppError> {
    let user = user.ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    if !user.active {
        warn!(user_id = %user.id, "request from deactivated account");
        return Err(AppError::Forbidden("Account is deactivated".into()));
    }
    Ok(user)
}

/// Authenticated, active caller, from `Authorization: Bearer <access token>`.
pub struct AuthUser(pub Uuid);

impl AuthUser {
    /// Verifies an access token and loads its account.
    pub async fn resolve(state: &AppState, token: &str) -> Result<User, AppError> {
        let user_id = JwtKeys::from_ref(state).authenticate(token)?;
        require_active(User::find_by_id(&state.db, user_id).await?)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;
        let user = AuthUser::resolve(state, token).await?;
        Ok(AuthUser(user.id))
    }
}

/// Authenticated caller whose stored role is admin.
pub struct AdminUser(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;
        let user = AuthUser::resolve(state, token).await?;
        if user.role() != UserRole::Admin {
            warn!(user_id = %user.id, "admin route denied");
            return Err(AppError::Forbidden("Admin access required".into()));
        }
        Ok(AdminUser(user.id))
    }
}


#[cfg(test)]
mod jwt_tests {
    use super::*;

    fn keys(issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: "dev-secret".into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        })
    }

    #[tokio::test]
    async fn sign_and_verify_access_token() {
        let keys = keys("test-issuer", "test-aud");
        let user_id = Uuid::new_v4();
        let token = keys.sign_access(user_id).expect("sign access");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(keys.authenticate(&token).unwrap(), user_id);
    }

    #[tokio::test]
    async fn refresh_token_cannot_authenticate() {
        let keys = keys("iss", "aud");
        let user_id = Uuid::new_v4();
        let token = keys.sign_refresh(user_id).expect("sign refresh");
        assert_eq!(keys.verify_refresh(&token).unwrap().sub, user_id);
        assert!(matches!(keys.authenticate(&token), Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn verify_refresh_rejects_access_token() {
        let keys = keys("iss", "aud");
        let token = keys.sign_access(Uuid::new_v4()).expect("sign access");
        let err = keys.verify_refresh(&token).unwrap_err();
        assert!(err.to_string().contains("not a refresh token"));
    }

    #[tokio::test]
    async fn verify_rejects_wrong_issuer_or_audience() {
        let token = keys("good-iss", "good-aud").sign_access(Uuid::new_v4()).unwrap();
        assert!(keys("bad-iss", "bad-aud").verify(&token).is_err());
    }
}
