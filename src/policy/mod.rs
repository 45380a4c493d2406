//! Access and visibility policy for marketplace records.
//!
//! Every read or mutation against listing and user data goes through the
//! decision functions in this module. They are pure: given the caller's
//! identity and the relevant piece of current state, they either permit the
//! operation or return the precise failure from the [`PolicyError`] taxonomy.
//! The HTTP layer maps those failures onto status codes; the storage layer
//! performs the mutation only after a decision has passed.

pub mod validation;

use thiserror::Error;

use crate::db::{ListingStatus, Role, User};

/// The identity issuing an operation.
///
/// Derived by the request layer from the session mechanism; the policy never
/// reads ambient state. Anonymous callers can browse active listings and
/// nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Anonymous,
    Authenticated { user_id: String, role: Role },
}

impl Caller {
    pub fn from_user(user: &User) -> Self {
        Self::Authenticated {
            user_id: user.id.clone(),
            role: user.role,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Caller::Anonymous => None,
            Caller::Authenticated { role, .. } => Some(*role),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(Role::Admin)
    }
}

/// Failure taxonomy for policy decisions.
///
/// Each variant is terminal and reported synchronously; nothing here is
/// retried and no partial state is written on failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("{0}")]
    ValidationFailed(String),

    #[error("Email already exists")]
    DuplicateEmail,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Your account has been temporarily restricted. Please contact support.")]
    AccountRestricted,

    #[error("{0}")]
    InvariantViolation(String),
}

/// Which listing statuses the caller may see in list and fetch results.
///
/// `None` means no restriction. Admins get the moderation view over every
/// status; everyone else only ever sees active listings.
pub fn visible_status(caller: &Caller) -> Option<ListingStatus> {
    match caller.role() {
        Some(Role::Admin) => None,
        _ => Some(ListingStatus::Active),
    }
}

/// Whether a fetched listing is visible to the caller at all.
///
/// A non-active listing reads as nonexistent to non-admin callers, so the
/// request layer reports `NotFound` rather than leaking its presence.
pub fn can_view_listing(caller: &Caller, status: ListingStatus) -> bool {
    match visible_status(caller) {
        None => true,
        Some(allowed) => status == allowed,
    }
}

/// Authorize listing creation and resolve the owning seller id.
///
/// Only sellers and admins create listings. A seller's listing is always
/// owned by the seller themselves, regardless of what the request claimed;
/// an admin may create on another seller's behalf by naming them.
pub fn resolve_create_owner(
    caller: &Caller,
    requested_seller_id: Option<&str>,
) -> Result<String, PolicyError> {
    match caller {
        Caller::Anonymous => Err(PolicyError::Unauthorized(
            "Sign in to create a listing".to_string(),
        )),
        Caller::Authenticated { user_id, role } => match role {
            Role::Buyer => Err(PolicyError::Unauthorized(
                "Only sellers can create listings".to_string(),
            )),
            Role::Seller => Ok(user_id.clone()),
            Role::Admin => Ok(requested_seller_id
                .filter(|s| !s.is_empty())
                .unwrap_or(user_id.as_str())
                .to_string()),
        },
    }
}

/// Check that an account may own listings: it must exist and hold the
/// seller or admin role. Gates admin creation on another user's behalf so a
/// listing can never end up owned by a buyer.
pub fn ensure_owner_can_sell(target: Option<&User>) -> Result<(), PolicyError> {
    let target =
        target.ok_or_else(|| PolicyError::NotFound("Seller not found".to_string()))?;
    match target.role {
        Role::Seller | Role::Admin => Ok(()),
        Role::Buyer => Err(PolicyError::ValidationFailed(
            "Listings can only be owned by seller or admin accounts".to_string(),
        )),
    }
}

/// Authorize update or delete of a listing owned by `listing_seller_id`.
///
/// Admins may mutate any listing; a seller only their own. Everyone else is
/// rejected outright, leaving the listing unmodified.
pub fn authorize_listing_mutation(
    caller: &Caller,
    listing_seller_id: &str,
) -> Result<(), PolicyError> {
    match caller {
        Caller::Anonymous => Err(PolicyError::Unauthorized(
            "Sign in to modify listings".to_string(),
        )),
        Caller::Authenticated { user_id, role } => match role {
            Role::Admin => Ok(()),
            Role::Seller if user_id == listing_seller_id => Ok(()),
            Role::Seller | Role::Buyer => Err(PolicyError::Unauthorized(
                "You do not own this listing".to_string(),
            )),
        },
    }
}

/// Authorize an admin-only mutation of a user account (disable/enable,
/// delete).
///
/// Invariant: no code path may disable or delete an admin account. This
/// holds even for admin callers acting on themselves.
pub fn authorize_user_mutation(caller: &Caller, target_role: Role) -> Result<(), PolicyError> {
    if !caller.is_admin() {
        return Err(PolicyError::Unauthorized(
            "Administrator access required".to_string(),
        ));
    }
    if target_role == Role::Admin {
        return Err(PolicyError::InvariantViolation(
            "Admin accounts cannot be disabled or deleted".to_string(),
        ));
    }
    Ok(())
}

/// Authorize access to the user directory (admin only).
pub fn authorize_user_listing(caller: &Caller) -> Result<(), PolicyError> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(PolicyError::Unauthorized(
            "Administrator access required".to_string(),
        ))
    }
}

/// Decide an authentication attempt, given the looked-up account (if any)
/// and whether the presented password verified against the stored hash.
///
/// The disabled check runs only after the credential matches, so a wrong
/// password against a disabled account still reads as invalid credentials.
/// On success the account's public profile is what gets returned upstream,
/// never the stored hash.
pub fn decide_login(account: Option<&User>, password_ok: bool) -> Result<(), PolicyError> {
    let user = account.ok_or(PolicyError::InvalidCredentials)?;
    if !password_ok {
        return Err(PolicyError::InvalidCredentials);
    }
    if user.disabled != 0 {
        return Err(PolicyError::AccountRestricted);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seller(id: &str) -> Caller {
        Caller::Authenticated {
            user_id: id.to_string(),
            role: Role::Seller,
        }
    }

    fn buyer(id: &str) -> Caller {
        Caller::Authenticated {
            user_id: id.to_string(),
            role: Role::Buyer,
        }
    }

    fn admin(id: &str) -> Caller {
        Caller::Authenticated {
            user_id: id.to_string(),
            role: Role::Admin,
        }
    }

    fn user(id: &str, role: Role, disabled: i64) -> User {
        User {
            id: id.to_string(),
            name: "Test".to_string(),
            email: format!("{id}@example.com"),
            password_hash: "x".to_string(),
            phone: String::new(),
            avatar: None,
            role,
            disabled,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn non_active_listings_hidden_from_buyers_and_sellers() {
        for caller in [Caller::Anonymous, buyer("b1"), seller("s1")] {
            assert_eq!(visible_status(&caller), Some(ListingStatus::Active));
            assert!(!can_view_listing(&caller, ListingStatus::Removed));
            assert!(can_view_listing(&caller, ListingStatus::Active));
        }
    }

    #[test]
    fn admin_moderation_view_covers_all_statuses() {
        let caller = admin("a1");
        assert_eq!(visible_status(&caller), None);
        assert!(can_view_listing(&caller, ListingStatus::Removed));
        assert!(can_view_listing(&caller, ListingStatus::Active));
    }

    #[test]
    fn buyers_never_mutate_listings() {
        for owner in ["b1", "someone-else"] {
            assert!(matches!(
                authorize_listing_mutation(&buyer("b1"), owner),
                Err(PolicyError::Unauthorized(_))
            ));
        }
    }

    #[test]
    fn seller_mutates_only_own_listings() {
        assert!(authorize_listing_mutation(&seller("s1"), "s1").is_ok());
        assert!(matches!(
            authorize_listing_mutation(&seller("s1"), "s2"),
            Err(PolicyError::Unauthorized(_))
        ));
    }

    #[test]
    fn admin_mutates_any_listing() {
        assert!(authorize_listing_mutation(&admin("a1"), "s1").is_ok());
    }

    #[test]
    fn anonymous_cannot_mutate() {
        assert!(matches!(
            authorize_listing_mutation(&Caller::Anonymous, "s1"),
            Err(PolicyError::Unauthorized(_))
        ));
    }

    #[test]
    fn create_forces_seller_ownership() {
        let owner = resolve_create_owner(&seller("s1"), Some("s2")).unwrap();
        assert_eq!(owner, "s1");
    }

    #[test]
    fn admin_may_create_on_behalf_of_seller() {
        let owner = resolve_create_owner(&admin("a1"), Some("s2")).unwrap();
        assert_eq!(owner, "s2");
        // Without an explicit seller the admin owns it.
        let owner = resolve_create_owner(&admin("a1"), None).unwrap();
        assert_eq!(owner, "a1");
    }

    #[test]
    fn listing_ownership_requires_a_selling_role() {
        let target = user("b1", Role::Buyer, 0);
        assert!(matches!(
            ensure_owner_can_sell(Some(&target)),
            Err(PolicyError::ValidationFailed(_))
        ));
        let target = user("s1", Role::Seller, 0);
        assert!(ensure_owner_can_sell(Some(&target)).is_ok());
        let target = user("a2", Role::Admin, 0);
        assert!(ensure_owner_can_sell(Some(&target)).is_ok());
        assert!(matches!(
            ensure_owner_can_sell(None),
            Err(PolicyError::NotFound(_))
        ));
    }

    #[test]
    fn buyers_and_anonymous_cannot_create() {
        assert!(resolve_create_owner(&buyer("b1"), None).is_err());
        assert!(resolve_create_owner(&Caller::Anonymous, None).is_err());
    }

    #[test]
    fn admin_accounts_are_untouchable() {
        assert_eq!(
            authorize_user_mutation(&admin("a1"), Role::Admin).unwrap_err(),
            PolicyError::InvariantViolation(
                "Admin accounts cannot be disabled or deleted".to_string()
            )
        );
        assert!(authorize_user_mutation(&admin("a1"), Role::Buyer).is_ok());
        assert!(authorize_user_mutation(&admin("a1"), Role::Seller).is_ok());
    }

    #[test]
    fn only_admins_mutate_users() {
        assert!(matches!(
            authorize_user_mutation(&seller("s1"), Role::Buyer),
            Err(PolicyError::Unauthorized(_))
        ));
        assert!(matches!(
            authorize_user_mutation(&buyer("b1"), Role::Buyer),
            Err(PolicyError::Unauthorized(_))
        ));
        assert!(matches!(
            authorize_user_listing(&buyer("b1")),
            Err(PolicyError::Unauthorized(_))
        ));
        assert!(authorize_user_listing(&admin("a1")).is_ok());
    }

    #[test]
    fn login_disabled_account_is_restricted_not_invalid() {
        let u = user("u1", Role::Buyer, 1);
        assert_eq!(
            decide_login(Some(&u), true).unwrap_err(),
            PolicyError::AccountRestricted
        );
    }

    #[test]
    fn login_wrong_password_is_invalid_even_when_disabled() {
        let u = user("u1", Role::Buyer, 1);
        assert_eq!(
            decide_login(Some(&u), false).unwrap_err(),
            PolicyError::InvalidCredentials
        );
    }

    #[test]
    fn login_unknown_email_is_invalid() {
        assert_eq!(
            decide_login(None, false).unwrap_err(),
            PolicyError::InvalidCredentials
        );
    }

    #[test]
    fn login_success() {
        let u = user("u1", Role::Seller, 0);
        assert!(decide_login(Some(&u), true).is_ok());
    }
}
