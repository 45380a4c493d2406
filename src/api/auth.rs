//! Registration, login and session plumbing.
//!
//! Passwords are stored as salted Argon2 hashes and verified through the
//! hash, never by direct comparison (the reference system compared
//! plaintext; this is a deliberate deviation). Session tokens are random,
//! handed to the client once, and stored only as SHA-256 digests.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    Json,
};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::ApiError;
use crate::db::{store, DbPool, Role, User, UserResponse};
use crate::policy::{self, validation, Caller};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub phone: String,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a random token
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Register a new account.
///
/// POST /auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let reg = validation::validate_registration(
        &request.name,
        &request.email,
        &request.password,
        &request.phone,
        request.role.as_deref(),
    )?;

    if store::find_user_by_email(&state.db, &reg.email)
        .await?
        .is_some()
    {
        return Err(policy::PolicyError::DuplicateEmail.into());
    }

    let now = chrono::Utc::now().to_rfc3339();
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        name: reg.name,
        email: reg.email,
        password_hash: hash_password(&reg.password)
            .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?,
        phone: reg.phone,
        avatar: None,
        role: reg.role,
        disabled: 0,
        created_at: now.clone(),
        updated_at: now,
    };
    store::insert_user(&state.db, &user).await?;

    tracing::info!(email = %user.email, role = %user.role, "Registered new user");

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Authenticate and open a session.
///
/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = store::find_user_by_email(&state.db, request.email.trim()).await?;

    let password_ok = user
        .as_ref()
        .map(|u| verify_password(&request.password, &u.password_hash))
        .unwrap_or(false);
    policy::decide_login(user.as_ref(), password_ok)?;
    let user = user.ok_or(policy::PolicyError::InvalidCredentials)?;

    let token = generate_token();
    let expires_at = (chrono::Utc::now() + chrono::Duration::days(state.config.auth.session_days))
        .to_rfc3339();
    store::insert_session(
        &state.db,
        &uuid::Uuid::new_v4().to_string(),
        &user.id,
        &hash_token(&token),
        &expires_at,
    )
    .await?;

    Ok(Json(LoginResponse {
        token,
        user: UserResponse::from(user),
    }))
}

/// Create the configured admin account if no account holds that email yet.
/// Runs at startup so a fresh install always has a moderator.
pub async fn ensure_admin_user(db: &DbPool, email: &str, password: &str) -> anyhow::Result<()> {
    if store::find_user_by_email(db, email).await?.is_some() {
        return Ok(());
    }

    let now = chrono::Utc::now().to_rfc3339();
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        name: "Admin".to_string(),
        email: email.to_string(),
        password_hash: hash_password(password)
            .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {}", e))?,
        phone: String::new(),
        avatar: None,
        role: Role::Admin,
        disabled: 0,
        created_at: now.clone(),
        updated_at: now,
    };
    store::insert_user(db, &user).await?;

    tracing::info!(email = %email, "Seeded admin account");
    Ok(())
}

/// Extract the bearer token from request headers
fn extract_token(parts: &Parts) -> Option<String> {
    let auth_header = parts
        .headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())?;
    auth_header
        .strip_prefix("Bearer ")
        .map(|token| token.to_string())
}

async fn user_for_token(state: &AppState, token: &str) -> Result<Option<User>, sqlx::Error> {
    let user_id = match store::session_user_id(&state.db, &hash_token(token)).await? {
        Some(id) => id,
        None => return Ok(None),
    };
    store::get_user(&state.db, &user_id).await
}

/// Extractor for endpoints that require an authenticated user.
#[async_trait]
impl FromRequestParts<Arc<AppState>> for User {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token =
            extract_token(parts).ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
        user_for_token(state, &token)
            .await
            .map_err(ApiError::from)?
            .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))
    }
}

/// Extractor for endpoints that are public but role-aware: a missing or
/// stale token degrades to an anonymous caller instead of rejecting.
#[async_trait]
impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = extract_token(parts) else {
            return Ok(Caller::Anonymous);
        };
        let user = user_for_token(state, &token).await.map_err(ApiError::from)?;
        Ok(user
            .map(|u| Caller::from_user(&u))
            .unwrap_or(Caller::Anonymous))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("Str0ng!pw").unwrap();
        assert_ne!(hash, "Str0ng!pw");
        assert!(verify_password("Str0ng!pw", &hash));
        assert!(!verify_password("Wr0ng!pw!", &hash));
    }

    #[test]
    fn verify_rejects_malformed_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn tokens_are_unique_and_hash_deterministically() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert_eq!(hash_token(&a), hash_token(&a));
        assert_ne!(hash_token(&a), hash_token(&b));
    }
}
