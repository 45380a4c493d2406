//! Listing endpoints: the feed, direct fetch, and seller/admin mutations.
//!
//! Every operation runs through the policy module first. The feed applies
//! the caller's visible-status restriction at the query level; mutations are
//! authorized against the current row, then issued as a single conditional
//! statement keyed by ownership.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::error::ApiError;
use crate::db::{store, Listing, ListingChanges, ListingFilter, ListingResponse, ListingStatus, Role, User};
use crate::policy::{self, validation, Caller, PolicyError};
use crate::AppState;

/// Feed filters; all optional, AND-composed.
#[derive(Debug, Deserialize)]
pub struct ListingQuery {
    /// Case-insensitive title substring
    pub q: Option<String>,
    pub category: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub seller_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateListingRequest {
    /// Honored for admin callers only; sellers always own what they create
    pub seller_id: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub price: Option<validation::PriceInput>,
    pub condition: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
}

/// Wholesale replacement; absent photos serialize to an empty list.
#[derive(Debug, Deserialize)]
pub struct UpdateListingRequest {
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub price: Option<validation::PriceInput>,
    pub condition: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
}

/// List listings visible to the caller.
///
/// GET /listings
pub async fn list_listings(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<ListingQuery>,
) -> Result<Json<Vec<ListingResponse>>, ApiError> {
    let filter = ListingFilter {
        title: query.q.filter(|s| !s.is_empty()),
        category: query.category.filter(|s| !s.is_empty()),
        min_price: query.min,
        max_price: query.max,
        seller_id: query.seller_id.filter(|s| !s.is_empty()),
        status: policy::visible_status(&caller),
    };

    let listings = store::find_listings(&state.db, &filter).await?;
    Ok(Json(listings.into_iter().map(ListingResponse::from).collect()))
}

/// Fetch one listing. Non-active listings read as nonexistent for
/// non-admin callers.
///
/// GET /listings/:id
pub async fn get_listing(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<ListingResponse>, ApiError> {
    let listing = store::get_listing(&state.db, &id)
        .await?
        .ok_or_else(|| PolicyError::NotFound("Listing not found".to_string()))?;

    if !policy::can_view_listing(&caller, listing.status) {
        return Err(PolicyError::NotFound("Listing not found".to_string()).into());
    }

    Ok(Json(ListingResponse::from(listing)))
}

fn coerce_photos(photos: &[String]) -> String {
    serde_json::to_string(photos).unwrap_or_else(|_| "[]".to_string())
}

/// Create a listing (sellers and admins).
///
/// POST /listings
pub async fn create_listing(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(request): Json<CreateListingRequest>,
) -> Result<(StatusCode, Json<ListingResponse>), ApiError> {
    let caller = Caller::from_user(&user);
    let seller_id = policy::resolve_create_owner(&caller, request.seller_id.as_deref())?;

    // Admin creating on another account's behalf: the target must be able
    // to sell. The caller's own role was already checked above.
    if seller_id != user.id {
        let target = store::get_user(&state.db, &seller_id).await?;
        policy::ensure_owner_can_sell(target.as_ref())?;
    }

    let listing = Listing {
        id: Uuid::new_v4().to_string(),
        seller_id,
        title: validation::coerce_title(request.title.as_deref()),
        description: request.description,
        category: request.category,
        price: validation::coerce_price(request.price.as_ref()),
        condition: validation::coerce_condition(request.condition.as_deref()),
        photos: coerce_photos(&request.photos),
        status: ListingStatus::Active,
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    store::insert_listing(&state.db, &listing).await?;

    info!(listing_id = %listing.id, seller_id = %listing.seller_id, "Listing created");

    Ok((StatusCode::CREATED, Json(ListingResponse::from(listing))))
}

/// For sellers the write stays keyed to their own id; a concurrent change
/// of ownership or removal then lands as not-found, never a hijack.
fn ownership_key(user: &User) -> Option<&str> {
    match user.role {
        Role::Seller => Some(user.id.as_str()),
        _ => None,
    }
}

/// Replace a listing's fields (admin or owning seller).
///
/// PUT /listings/:id
pub async fn update_listing(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(request): Json<UpdateListingRequest>,
) -> Result<Json<ListingResponse>, ApiError> {
    let existing = store::get_listing(&state.db, &id)
        .await?
        .ok_or_else(|| PolicyError::NotFound("Listing not found".to_string()))?;

    let caller = Caller::from_user(&user);
    policy::authorize_listing_mutation(&caller, &existing.seller_id)?;

    let changes = ListingChanges {
        title: validation::coerce_title(request.title.as_deref()),
        description: request.description,
        category: request.category,
        price: validation::coerce_price(request.price.as_ref()),
        condition: validation::coerce_condition(request.condition.as_deref()),
        photos: coerce_photos(&request.photos),
    };

    let updated = store::update_listing(&state.db, &id, ownership_key(&user), &changes).await?;
    if !updated {
        return Err(PolicyError::NotFound("Listing not found".to_string()).into());
    }

    let listing = store::get_listing(&state.db, &id)
        .await?
        .ok_or_else(|| PolicyError::NotFound("Listing not found".to_string()))?;

    info!(listing_id = %id, user_id = %user.id, "Listing updated");

    Ok(Json(ListingResponse::from(listing)))
}

/// Remove a listing (admin or owning seller). Hard delete.
///
/// DELETE /listings/:id
pub async fn delete_listing(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let existing = store::get_listing(&state.db, &id)
        .await?
        .ok_or_else(|| PolicyError::NotFound("Listing not found".to_string()))?;

    let caller = Caller::from_user(&user);
    policy::authorize_listing_mutation(&caller, &existing.seller_id)?;

    let deleted = store::delete_listing(&state.db, &id, ownership_key(&user)).await?;
    if !deleted {
        return Err(PolicyError::NotFound("Listing not found".to_string()).into());
    }

    info!(listing_id = %id, user_id = %user.id, "Listing deleted");

    Ok(StatusCode::NO_CONTENT)
}
