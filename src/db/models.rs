use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Closed set of account roles. Stored as lowercase TEXT; the schema CHECK
/// constraint guarantees nothing else ever comes back from the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Buyer,
    Seller,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buyer => write!(f, "buyer"),
            Self::Seller => write!(f, "seller"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Removed,
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Removed => write!(f, "removed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: String,
    pub avatar: Option<String>,
    pub role: Role,
    pub disabled: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Public profile fields; what login and the admin directory return.
/// Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub avatar: Option<String>,
    pub role: Role,
    pub disabled: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            avatar: user.avatar,
            role: user.role,
            disabled: user.disabled != 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Listing {
    pub id: String,
    pub seller_id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub price: f64,
    pub condition: String,
    /// JSON array of opaque photo URI strings
    pub photos: String,
    pub status: ListingStatus,
    pub created_at: String,
}

impl Listing {
    pub fn photo_list(&self) -> Vec<String> {
        serde_json::from_str(&self.photos).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListingResponse {
    pub id: String,
    pub seller_id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub price: f64,
    pub condition: String,
    pub photos: Vec<String>,
    pub status: ListingStatus,
    pub created_at: String,
}

impl From<Listing> for ListingResponse {
    fn from(listing: Listing) -> Self {
        let photos = listing.photo_list();
        Self {
            id: listing.id,
            seller_id: listing.seller_id,
            title: listing.title,
            description: listing.description,
            category: listing.category,
            price: listing.price,
            condition: listing.condition,
            photos,
            status: listing.status,
            created_at: listing.created_at,
        }
    }
}

/// Filters for the listing feed. Compose with logical AND; absent price
/// bounds default to 0 and +infinity.
#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    pub title: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub seller_id: Option<String>,
    /// `None` lists every status (admin moderation view)
    pub status: Option<ListingStatus>,
}

/// Wholesale replacement fields for a listing update. There are no
/// partial-field semantics; every column listed here is written.
#[derive(Debug, Clone)]
pub struct ListingChanges {
    pub title: String,
    pub description: String,
    pub category: String,
    pub price: f64,
    pub condition: String,
    /// Serialized JSON array; absent photo lists arrive here as "[]"
    pub photos: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: String,
    pub buyer_id: String,
    /// JSON array of [`OrderItem`] snapshots taken at order time
    pub items: String,
    pub total: f64,
    pub payment_method: String,
    pub shipping_info: Option<String>,
    pub status: String,
    pub created_at: String,
}

impl Order {
    pub fn item_list(&self) -> Vec<OrderItem> {
        serde_json::from_str(&self.items).unwrap_or_default()
    }
}

/// A line item snapshotted from a listing when the order was placed; not a
/// live reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub listing_id: String,
    pub title: String,
    pub qty: i64,
    pub unit_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    pub expires_at: String,
    pub created_at: String,
}
