//! Order endpoints. Checkout is simulated: the payment method is an opaque
//! tag and no charge is taken.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::error::ApiError;
use crate::db::{store, Order, OrderItem, Role, User};
use crate::policy::{self, Caller, PolicyError};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
    pub payment_method: Option<String>,
    pub shipping_info: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub listing_id: String,
    pub qty: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub buyer_id: String,
    pub items: Vec<OrderItem>,
    pub total: f64,
    pub payment_method: String,
    pub shipping_info: Option<serde_json::Value>,
    pub status: String,
    pub created_at: String,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        let items = order.item_list();
        let shipping_info = order
            .shipping_info
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok());
        Self {
            id: order.id,
            buyer_id: order.buyer_id,
            items,
            total: order.total,
            payment_method: order.payment_method,
            shipping_info,
            status: order.status,
            created_at: order.created_at,
        }
    }
}

/// Place an order. Line items snapshot the referenced listings; unit prices
/// and the total come from the current listing records, never the client.
///
/// POST /orders
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    if request.items.is_empty() {
        return Err(PolicyError::ValidationFailed(
            "An order needs at least one item".to_string(),
        )
        .into());
    }

    let caller = Caller::from_user(&user);
    let mut items = Vec::with_capacity(request.items.len());
    let mut total = 0.0;
    for item in &request.items {
        let listing = store::get_listing(&state.db, &item.listing_id).await?;
        let listing = match listing {
            Some(l) if policy::can_view_listing(&caller, l.status) => l,
            _ => {
                return Err(PolicyError::NotFound(format!(
                    "Listing {} not found",
                    item.listing_id
                ))
                .into())
            }
        };
        let qty = item.qty.unwrap_or(1).max(1);
        total += listing.price * qty as f64;
        items.push(OrderItem {
            listing_id: listing.id,
            title: listing.title,
            qty,
            unit_price: listing.price,
        });
    }

    let order = Order {
        id: Uuid::new_v4().to_string(),
        buyer_id: user.id.clone(),
        items: serde_json::to_string(&items)
            .map_err(|e| ApiError::internal(format!("Failed to serialize items: {}", e)))?,
        total,
        payment_method: request
            .payment_method
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "mock".to_string()),
        shipping_info: request.shipping_info.map(|v| v.to_string()),
        status: "placed".to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    store::insert_order(&state.db, &order).await?;

    info!(order_id = %order.id, buyer_id = %user.id, total, "Order placed");

    Ok((StatusCode::CREATED, Json(OrderResponse::from(order))))
}

/// List the caller's orders; admins see every order.
///
/// GET /orders
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let buyer_id = match user.role {
        Role::Admin => None,
        _ => Some(user.id.as_str()),
    };
    let orders = store::list_orders(&state.db, buyer_id).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}
