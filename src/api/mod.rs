pub mod auth;
pub mod error;
mod listings;
mod orders;
mod users;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (public)
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let api_routes = Router::new()
        // Listings (reads are public and role-aware; writes require auth)
        .route("/listings", get(listings::list_listings))
        .route("/listings", post(listings::create_listing))
        .route("/listings/:id", get(listings::get_listing))
        .route("/listings/:id", put(listings::update_listing))
        .route("/listings/:id", delete(listings::delete_listing))
        // Orders
        .route("/orders", get(orders::list_orders))
        .route("/orders", post(orders::create_order))
        // Profile
        .route("/profile", put(users::update_profile))
        // Admin
        .route("/admin/users", get(users::list_users))
        .route("/admin/users/toggle", post(users::toggle_user))
        .route("/admin/users/:id", delete(users::delete_user));

    Router::new()
        .route("/health", get(health_check))
        .nest("/auth", auth_routes)
        .merge(api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
