//! Storage collaborator: one function per table operation.
//!
//! Mutations that depend on ownership are issued as single conditional
//! statements keyed by id (and seller id when the caller is a seller), so a
//! row that disappears between the policy read and the write degrades to
//! "not found" instead of resurrecting as an insert.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{DbPool, Listing, ListingChanges, ListingFilter, Order, User};

enum Bind {
    Text(String),
    Real(f64),
}

/// Fetch listings matching the filter, in insertion order.
pub async fn find_listings(db: &DbPool, filter: &ListingFilter) -> Result<Vec<Listing>, sqlx::Error> {
    let mut conditions: Vec<&str> = Vec::new();
    let mut bindings: Vec<Bind> = Vec::new();

    if let Some(status) = filter.status {
        conditions.push("status = ?");
        bindings.push(Bind::Text(status.to_string()));
    }
    if let Some(seller_id) = &filter.seller_id {
        conditions.push("seller_id = ?");
        bindings.push(Bind::Text(seller_id.clone()));
    }
    if let Some(title) = &filter.title {
        // SQLite LIKE is case-insensitive for ASCII
        conditions.push("title LIKE ?");
        bindings.push(Bind::Text(format!("%{}%", title)));
    }
    if let Some(category) = &filter.category {
        conditions.push("category = ?");
        bindings.push(Bind::Text(category.clone()));
    }
    if let Some(min) = filter.min_price {
        conditions.push("price >= ?");
        bindings.push(Bind::Real(min));
    }
    if let Some(max) = filter.max_price {
        conditions.push("price <= ?");
        bindings.push(Bind::Real(max));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let sql = format!("SELECT * FROM listings {} ORDER BY rowid", where_clause);
    let mut query = sqlx::query_as::<_, Listing>(&sql);
    for binding in bindings {
        query = match binding {
            Bind::Text(s) => query.bind(s),
            Bind::Real(f) => query.bind(f),
        };
    }
    query.fetch_all(db).await
}

pub async fn get_listing(db: &DbPool, id: &str) -> Result<Option<Listing>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM listings WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn insert_listing(db: &DbPool, listing: &Listing) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO listings (id, seller_id, title, description, category, price, condition, photos, status, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&listing.id)
    .bind(&listing.seller_id)
    .bind(&listing.title)
    .bind(&listing.description)
    .bind(&listing.category)
    .bind(listing.price)
    .bind(&listing.condition)
    .bind(&listing.photos)
    .bind(listing.status)
    .bind(&listing.created_at)
    .execute(db)
    .await?;
    Ok(())
}

/// Replace a listing's mutable fields wholesale. When `owner` is given the
/// write only lands if the row still belongs to that seller; returns whether
/// a row was updated.
pub async fn update_listing(
    db: &DbPool,
    id: &str,
    owner: Option<&str>,
    changes: &ListingChanges,
) -> Result<bool, sqlx::Error> {
    let sql = match owner {
        Some(_) => {
            "UPDATE listings SET title = ?, description = ?, category = ?, price = ?, condition = ?, photos = ?
             WHERE id = ? AND seller_id = ?"
        }
        None => {
            "UPDATE listings SET title = ?, description = ?, category = ?, price = ?, condition = ?, photos = ?
             WHERE id = ?"
        }
    };

    let mut query = sqlx::query(sql)
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(&changes.category)
        .bind(changes.price)
        .bind(&changes.condition)
        .bind(&changes.photos)
        .bind(id);
    if let Some(owner) = owner {
        query = query.bind(owner);
    }

    let result = query.execute(db).await?;
    Ok(result.rows_affected() > 0)
}

/// Hard delete; the status column is not consulted or written here.
/// Returns whether a row was removed.
pub async fn delete_listing(
    db: &DbPool,
    id: &str,
    owner: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let result = match owner {
        Some(owner) => {
            sqlx::query("DELETE FROM listings WHERE id = ? AND seller_id = ?")
                .bind(id)
                .bind(owner)
                .execute(db)
                .await?
        }
        None => {
            sqlx::query("DELETE FROM listings WHERE id = ?")
                .bind(id)
                .execute(db)
                .await?
        }
    };
    Ok(result.rows_affected() > 0)
}

/// Case-insensitive email lookup, backing both login and the registration
/// uniqueness check.
pub async fn find_user_by_email(db: &DbPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER(?)")
        .bind(email)
        .fetch_optional(db)
        .await
}

pub async fn get_user(db: &DbPool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn insert_user(db: &DbPool, user: &User) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, phone, avatar, role, disabled, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&user.id)
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.phone)
    .bind(&user.avatar)
    .bind(user.role)
    .bind(user.disabled)
    .bind(&user.created_at)
    .bind(&user.updated_at)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn update_profile(
    db: &DbPool,
    id: &str,
    name: &str,
    avatar: Option<&str>,
    phone: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users SET name = ?, avatar = ?, phone = ?, updated_at = datetime('now') WHERE id = ?",
    )
    .bind(name)
    .bind(avatar)
    .bind(phone)
    .bind(id)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn set_user_disabled(db: &DbPool, id: &str, disabled: bool) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users SET disabled = ?, updated_at = datetime('now') WHERE id = ?",
    )
    .bind(disabled as i64)
    .bind(id)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Removes the account; sessions, listings and orders cascade.
pub async fn delete_user(db: &DbPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Newest accounts first, matching the reference admin directory.
pub async fn list_users(db: &DbPool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users ORDER BY rowid DESC")
        .fetch_all(db)
        .await
}

pub async fn insert_order(db: &DbPool, order: &Order) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO orders (id, buyer_id, items, total, payment_method, shipping_info, status, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&order.id)
    .bind(&order.buyer_id)
    .bind(&order.items)
    .bind(order.total)
    .bind(&order.payment_method)
    .bind(&order.shipping_info)
    .bind(&order.status)
    .bind(&order.created_at)
    .execute(db)
    .await?;
    Ok(())
}

/// Orders for one buyer, or all orders when `buyer_id` is None (admin).
pub async fn list_orders(db: &DbPool, buyer_id: Option<&str>) -> Result<Vec<Order>, sqlx::Error> {
    match buyer_id {
        Some(buyer_id) => {
            sqlx::query_as("SELECT * FROM orders WHERE buyer_id = ? ORDER BY rowid DESC")
                .bind(buyer_id)
                .fetch_all(db)
                .await
        }
        None => {
            sqlx::query_as("SELECT * FROM orders ORDER BY rowid DESC")
                .fetch_all(db)
                .await
        }
    }
}

pub async fn insert_session(
    db: &DbPool,
    id: &str,
    user_id: &str,
    token_hash: &str,
    expires_at: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO sessions (id, user_id, token_hash, expires_at, created_at)
         VALUES (?, ?, ?, ?, datetime('now'))",
    )
    .bind(id)
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .execute(db)
    .await?;
    Ok(())
}

/// Resolve a live session's user id from a token hash.
pub async fn session_user_id(db: &DbPool, token_hash: &str) -> Result<Option<String>, sqlx::Error> {
    let row: Option<SqliteRow> = sqlx::query(
        "SELECT user_id FROM sessions WHERE token_hash = ? AND expires_at > datetime('now')",
    )
    .bind(token_hash)
    .fetch_optional(db)
    .await?;
    Ok(row.map(|r| r.get("user_id")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_memory, ListingStatus, Role};

    async fn seed_user(db: &DbPool, id: &str, role: Role) {
        let user = User {
            id: id.to_string(),
            name: id.to_string(),
            email: format!("{id}@example.com"),
            password_hash: "hash".to_string(),
            phone: String::new(),
            avatar: None,
            role,
            disabled: 0,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        };
        insert_user(db, &user).await.unwrap();
    }

    async fn seed_listing(db: &DbPool, id: &str, seller: &str, title: &str, price: f64) {
        let listing = Listing {
            id: id.to_string(),
            seller_id: seller.to_string(),
            title: title.to_string(),
            description: String::new(),
            category: "electronics".to_string(),
            price,
            condition: "new".to_string(),
            photos: "[]".to_string(),
            status: ListingStatus::Active,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        };
        insert_listing(db, &listing).await.unwrap();
    }

    fn active_filter() -> ListingFilter {
        ListingFilter {
            status: Some(ListingStatus::Active),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_list_delete_scenario() {
        let db = init_memory().await.unwrap();
        seed_user(&db, "s1", Role::Seller).await;
        seed_listing(&db, "l1", "s1", "Phone", 100.0).await;

        // Buyer-facing list with no filters sees the active listing
        let rows = find_listings(&db, &active_filter()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Phone");

        // Owning seller deletes it
        assert!(delete_listing(&db, "l1", Some("s1")).await.unwrap());

        // Re-list: gone. Direct fetch: not found.
        assert!(find_listings(&db, &active_filter()).await.unwrap().is_empty());
        assert!(get_listing(&db, "l1").await.unwrap().is_none());

        // Deleting again reports no row
        assert!(!delete_listing(&db, "l1", Some("s1")).await.unwrap());
    }

    #[tokio::test]
    async fn price_bounds_are_inclusive_and_composed() {
        let db = init_memory().await.unwrap();
        seed_user(&db, "s1", Role::Seller).await;
        seed_listing(&db, "l1", "s1", "Cheap", 40.0).await;
        seed_listing(&db, "l2", "s1", "Mid", 100.0).await;
        seed_listing(&db, "l3", "s1", "Pricey", 200.0).await;

        let filter = ListingFilter {
            min_price: Some(50.0),
            max_price: Some(150.0),
            ..active_filter()
        };
        let rows = find_listings(&db, &filter).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].price, 100.0);

        // Inclusive bounds
        let filter = ListingFilter {
            min_price: Some(100.0),
            max_price: Some(100.0),
            ..active_filter()
        };
        assert_eq!(find_listings(&db, &filter).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn title_filter_is_case_insensitive_substring() {
        let db = init_memory().await.unwrap();
        seed_user(&db, "s1", Role::Seller).await;
        seed_listing(&db, "l1", "s1", "Blue Phone", 10.0).await;
        seed_listing(&db, "l2", "s1", "Red Chair", 10.0).await;

        let filter = ListingFilter {
            title: Some("phone".to_string()),
            ..active_filter()
        };
        let rows = find_listings(&db, &filter).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "l1");
    }

    #[tokio::test]
    async fn seller_filter_restricts_to_that_seller() {
        let db = init_memory().await.unwrap();
        seed_user(&db, "s1", Role::Seller).await;
        seed_user(&db, "s2", Role::Seller).await;
        seed_listing(&db, "l1", "s1", "Mine", 10.0).await;
        seed_listing(&db, "l2", "s2", "Theirs", 10.0).await;

        let filter = ListingFilter {
            seller_id: Some("s1".to_string()),
            ..active_filter()
        };
        let rows = find_listings(&db, &filter).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].seller_id, "s1");
    }

    #[tokio::test]
    async fn status_filter_hides_removed_rows_unless_unrestricted() {
        let db = init_memory().await.unwrap();
        seed_user(&db, "s1", Role::Seller).await;
        seed_listing(&db, "l1", "s1", "Visible", 10.0).await;
        sqlx::query("UPDATE listings SET status = 'removed' WHERE id = 'l1'")
            .execute(&db)
            .await
            .unwrap();

        assert!(find_listings(&db, &active_filter()).await.unwrap().is_empty());

        // Admin moderation view: no status restriction
        let rows = find_listings(&db, &ListingFilter::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, ListingStatus::Removed);
    }

    #[tokio::test]
    async fn conditional_update_misses_foreign_rows() {
        let db = init_memory().await.unwrap();
        seed_user(&db, "s1", Role::Seller).await;
        seed_user(&db, "s2", Role::Seller).await;
        seed_listing(&db, "l1", "s1", "Phone", 100.0).await;

        let changes = ListingChanges {
            title: "Hijacked".to_string(),
            description: String::new(),
            category: String::new(),
            price: 1.0,
            condition: "new".to_string(),
            photos: "[]".to_string(),
        };

        // Keyed to the wrong seller: no row written
        assert!(!update_listing(&db, "l1", Some("s2"), &changes).await.unwrap());
        let listing = get_listing(&db, "l1").await.unwrap().unwrap();
        assert_eq!(listing.title, "Phone");

        // Keyed to the owner: replaced wholesale
        assert!(update_listing(&db, "l1", Some("s1"), &changes).await.unwrap());
        let listing = get_listing(&db, "l1").await.unwrap().unwrap();
        assert_eq!(listing.title, "Hijacked");
        assert_eq!(listing.price, 1.0);
    }

    #[tokio::test]
    async fn buyer_accounts_cannot_be_assigned_listings() {
        let db = init_memory().await.unwrap();
        seed_user(&db, "b1", Role::Buyer).await;
        seed_user(&db, "s1", Role::Seller).await;

        // Ownership assignment is gated on the target's role before any
        // insert happens, so a buyer-owned listing never reaches the table.
        let buyer = get_user(&db, "b1").await.unwrap();
        assert!(crate::policy::ensure_owner_can_sell(buyer.as_ref()).is_err());

        let seller = get_user(&db, "s1").await.unwrap();
        assert!(crate::policy::ensure_owner_can_sell(seller.as_ref()).is_ok());

        let missing = get_user(&db, "ghost").await.unwrap();
        assert!(crate::policy::ensure_owner_can_sell(missing.as_ref()).is_err());
    }

    #[tokio::test]
    async fn email_lookup_is_case_insensitive() {
        let db = init_memory().await.unwrap();
        seed_user(&db, "u1", Role::Buyer).await;

        let found = find_user_by_email(&db, "U1@EXAMPLE.COM").await.unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().id, "u1");
    }

    #[tokio::test]
    async fn duplicate_email_differing_only_in_case_is_rejected() {
        let db = init_memory().await.unwrap();
        let mut user = User {
            id: "u1".to_string(),
            name: "A".to_string(),
            email: "A@B.com".to_string(),
            password_hash: "hash".to_string(),
            phone: String::new(),
            avatar: None,
            role: Role::Buyer,
            disabled: 0,
            created_at: String::new(),
            updated_at: String::new(),
        };
        insert_user(&db, &user).await.unwrap();

        user.id = "u2".to_string();
        user.email = "a@b.com".to_string();
        // UNIQUE COLLATE NOCASE backstops the policy-level check
        assert!(insert_user(&db, &user).await.is_err());
    }

    #[tokio::test]
    async fn orders_are_scoped_to_their_buyer() {
        let db = init_memory().await.unwrap();
        seed_user(&db, "b1", Role::Buyer).await;
        seed_user(&db, "b2", Role::Buyer).await;

        for (id, buyer) in [("o1", "b1"), ("o2", "b2")] {
            let order = Order {
                id: id.to_string(),
                buyer_id: buyer.to_string(),
                items: "[]".to_string(),
                total: 5.0,
                payment_method: "mock".to_string(),
                shipping_info: None,
                status: "placed".to_string(),
                created_at: String::new(),
            };
            insert_order(&db, &order).await.unwrap();
        }

        let mine = list_orders(&db, Some("b1")).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, "o1");
        assert_eq!(list_orders(&db, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn expired_sessions_do_not_resolve() {
        let db = init_memory().await.unwrap();
        seed_user(&db, "u1", Role::Buyer).await;

        insert_session(&db, "sess1", "u1", "hash1", "2099-01-01T00:00:00Z")
            .await
            .unwrap();
        insert_session(&db, "sess2", "u1", "hash2", "2000-01-01T00:00:00Z")
            .await
            .unwrap();

        assert_eq!(
            session_user_id(&db, "hash1").await.unwrap().as_deref(),
            Some("u1")
        );
        assert!(session_user_id(&db, "hash2").await.unwrap().is_none());
    }
}
