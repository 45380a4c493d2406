//! Profile self-service and the admin user directory.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use super::error::ApiError;
use crate::db::{store, User, UserResponse};
use crate::policy::{self, Caller, PolicyError};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ToggleUserRequest {
    pub id: String,
    pub disabled: bool,
}

/// Update the caller's own profile. Identity comes from the session, never
/// from the request body.
///
/// PUT /profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let name = match request.name.as_deref().map(str::trim) {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => user.name.clone(),
    };
    let avatar = request.avatar.or(user.avatar.clone());
    let phone = request.phone.unwrap_or_else(|| user.phone.clone());

    store::update_profile(&state.db, &user.id, &name, avatar.as_deref(), &phone).await?;

    let updated = store::get_user(&state.db, &user.id)
        .await?
        .ok_or_else(|| PolicyError::NotFound("User not found".to_string()))?;
    Ok(Json(UserResponse::from(updated)))
}

/// Full user directory (admin only). Public profile fields only.
///
/// GET /admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    policy::authorize_user_listing(&Caller::from_user(&user))?;

    let users = store::list_users(&state.db).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Disable or re-enable an account (admin only). Admin accounts can never
/// be disabled, by anyone.
///
/// POST /admin/users/toggle
pub async fn toggle_user(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(request): Json<ToggleUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let target = store::get_user(&state.db, &request.id)
        .await?
        .ok_or_else(|| PolicyError::NotFound("User not found".to_string()))?;

    policy::authorize_user_mutation(&Caller::from_user(&user), target.role)?;

    store::set_user_disabled(&state.db, &target.id, request.disabled).await?;

    info!(target_id = %target.id, disabled = request.disabled, admin_id = %user.id, "User toggled");

    let updated = store::get_user(&state.db, &target.id)
        .await?
        .ok_or_else(|| PolicyError::NotFound("User not found".to_string()))?;
    Ok(Json(UserResponse::from(updated)))
}

/// Remove an account (admin only). Same invariant as toggling: admin
/// accounts are never deleted.
///
/// DELETE /admin/users/:id
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let target = store::get_user(&state.db, &id)
        .await?
        .ok_or_else(|| PolicyError::NotFound("User not found".to_string()))?;

    policy::authorize_user_mutation(&Caller::from_user(&user), target.role)?;

    if !store::delete_user(&state.db, &id).await? {
        return Err(PolicyError::NotFound("User not found".to_string()).into());
    }

    info!(target_id = %id, admin_id = %user.id, "User deleted");

    Ok(StatusCode::NO_CONTENT)
}
