//! Input validation and coercion for registration and listing data.
//!
//! Registration is strict: blank fields, malformed emails, and weak
//! passwords are rejected before anything is written. Listing creation is
//! deliberately the opposite: malformed client input is coerced into a
//! usable record (placeholder title, zero price) instead of being rejected,
//! matching the resilient create path of the reference behavior.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use super::PolicyError;
use crate::db::Role;

lazy_static! {
    /// local@domain.tld shape; no whitespace or extra '@'
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

/// Symbols a password may (and must, at least once) contain.
const PASSWORD_SYMBOLS: &str = "@$!%*?&";

/// Cleaned-up registration input, ready for insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    pub role: Role,
}

/// Validate and normalize a registration request.
///
/// All fields are trimmed first. The role string is coerced: exactly
/// "seller" registers a seller, anything else (including absent) a buyer —
/// a client can never self-register as admin.
pub fn validate_registration(
    name: &str,
    email: &str,
    password: &str,
    phone: &str,
    role: Option<&str>,
) -> Result<Registration, PolicyError> {
    let name = name.trim();
    let email = email.trim();
    let password = password.trim();

    if name.is_empty() || email.is_empty() || password.is_empty() {
        return Err(PolicyError::ValidationFailed(
            "All required fields must be completed (name, email, password).".to_string(),
        ));
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err(PolicyError::ValidationFailed(
            "Invalid email format.".to_string(),
        ));
    }

    validate_password_strength(password)?;

    Ok(Registration {
        name: name.to_string(),
        email: email.to_string(),
        password: password.to_string(),
        phone: phone.trim().to_string(),
        role: coerce_role(role),
    })
}

/// At least 8 characters with lowercase, uppercase, digit and one symbol
/// from the allowed set; no characters outside `[A-Za-z0-9@$!%*?&]`.
fn validate_password_strength(password: &str) -> Result<(), PolicyError> {
    let weak = || {
        PolicyError::ValidationFailed(
            "Password must be at least 8 characters long, include uppercase, \
             lowercase, number, and special character."
                .to_string(),
        )
    };

    if password.len() < 8 {
        return Err(weak());
    }

    let mut has_lower = false;
    let mut has_upper = false;
    let mut has_digit = false;
    let mut has_symbol = false;
    for c in password.chars() {
        match c {
            'a'..='z' => has_lower = true,
            'A'..='Z' => has_upper = true,
            '0'..='9' => has_digit = true,
            _ if PASSWORD_SYMBOLS.contains(c) => has_symbol = true,
            _ => return Err(weak()),
        }
    }

    if has_lower && has_upper && has_digit && has_symbol {
        Ok(())
    } else {
        Err(weak())
    }
}

/// Coerce a client-supplied role string to a closed [`Role`] variant.
pub fn coerce_role(role: Option<&str>) -> Role {
    match role {
        Some("seller") => Role::Seller,
        _ => Role::Buyer,
    }
}

/// Price as it arrives from clients: a number, a numeric string, or junk.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PriceInput {
    Number(f64),
    Text(String),
}

/// Coerce a client-supplied price to a non-negative number, 0 on failure.
pub fn coerce_price(price: Option<&PriceInput>) -> f64 {
    let parsed = match price {
        Some(PriceInput::Number(n)) => *n,
        Some(PriceInput::Text(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        None => 0.0,
    };
    if parsed.is_finite() && parsed >= 0.0 {
        parsed
    } else {
        0.0
    }
}

/// Blank titles get a placeholder rather than a rejection.
pub fn coerce_title(title: Option<&str>) -> String {
    match title.map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => "Untitled".to_string(),
    }
}

/// Missing condition defaults to "new".
pub fn coerce_condition(condition: Option<&str>) -> String {
    match condition.map(str::trim) {
        Some(c) if !c.is_empty() => c.to_string(),
        _ => "new".to_string(),
    }
}
