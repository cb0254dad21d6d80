//! # Validation Module
//!
//! Input validation for the canteen POS, run once at the HTTP boundary
//! before any ticket operation touches the database.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Request DTO (serde)                                          │
//! │  ├── Required vs optional fields                                       │
//! │  └── JSON types                                                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── email, quantity range, cancellation reason                        │
//! │  └── ticket configuration shape                                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE ticket_number                                              │
//! │  ├── partial UNIQUE index on the active config                         │
//! │  └── CHECK winner ⟂ cancelled                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use canteen_core::validation::{validate_email, validate_quantity};
//!
//! let email = validate_email("  Buyer@Example.COM ").unwrap();
//! assert_eq!(email, "buyer@example.com");
//!
//! assert!(validate_quantity(5).is_ok());
//! assert!(validate_quantity(101).is_err());
//! ```

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::money::Money;
use crate::pricing::QuantityOffer;
use crate::MAX_TICKETS_PER_PURCHASE;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_EMAIL_LENGTH: usize = 254;
const MAX_USERNAME_LENGTH: usize = 50;
const MIN_USERNAME_LENGTH: usize = 3;
const MAX_PASSWORD_LENGTH: usize = 100;
const MIN_PASSWORD_LENGTH: usize = 6;
const MAX_REASON_LENGTH: usize = 500;

// =============================================================================
// Ticket Purchase
// =============================================================================

/// Validates and normalizes a purchaser email.
///
/// ## Rules
/// - Trimmed and lowercased
/// - Must not be empty
/// - Must contain `@`
///
/// ## Returns
/// The normalized email.
pub fn validate_email(email: &str) -> ValidationResult<String> {
    let email = email.trim().to_lowercase();

    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "email".to_string(),
        });
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max: MAX_EMAIL_LENGTH,
        });
    }

    if !email.contains('@') {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must contain @".to_string(),
        });
    }

    Ok(email)
}

/// Validates a purchase quantity.
///
/// ## Rules
/// - Between 1 and MAX_TICKETS_PER_PURCHASE (100), inclusive
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Seller screen: quantity = 250                                          │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(250) ← THIS FUNCTION                                │
/// │       │                                                                 │
/// │       └── Error: "quantity must be between 1 and 100"                  │
/// │                                                                         │
/// │  In range? → pricing engine decides if the quantity is on the menu     │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if !(1..=MAX_TICKETS_PER_PURCHASE).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_TICKETS_PER_PURCHASE,
        });
    }

    Ok(())
}

/// Validates a cancellation reason and returns it trimmed.
pub fn validate_cancellation_reason(reason: &str) -> ValidationResult<String> {
    let reason = reason.trim();

    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }

    if reason.chars().count() > MAX_REASON_LENGTH {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: MAX_REASON_LENGTH,
        });
    }

    Ok(reason.to_string())
}

// =============================================================================
// Ticket Configuration
// =============================================================================

/// Converts a submitted price to cents.
///
/// The sign is checked on the raw amount, before rounding, so `-0.004`
/// is rejected instead of becoming zero.
///
/// ```rust
/// use canteen_core::validation::validate_price;
///
/// assert_eq!(validate_price("basePrice", 0.5).unwrap().cents(), 50);
/// assert!(validate_price("basePrice", -0.004).is_err());
/// ```
pub fn validate_price(field: &str, amount: f64) -> ValidationResult<Money> {
    if !amount.is_finite() {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must be a finite number".to_string(),
        });
    }

    if amount < 0.0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    Ok(Money::from_major_units(amount))
}

/// Validates a submitted ticket configuration.
///
/// ## Rules
/// - `base_price >= 0`
/// - every offer: `quantity >= 1`, `price >= 0`
/// - offer quantities pairwise unique
pub fn validate_ticket_config(
    base_price: Money,
    offers: &[QuantityOffer],
) -> ValidationResult<()> {
    if base_price.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "basePrice".to_string(),
        });
    }

    let mut seen = HashSet::with_capacity(offers.len());
    for offer in offers {
        if offer.quantity < 1 {
            return Err(ValidationError::OutOfRange {
                field: "quantityOffers.quantity".to_string(),
                min: 1,
                max: i64::MAX,
            });
        }

        if offer.price_cents < 0 {
            return Err(ValidationError::MustNotBeNegative {
                field: "quantityOffers.price".to_string(),
            });
        }

        if !seen.insert(offer.quantity) {
            return Err(ValidationError::Duplicate {
                field: "quantityOffers.quantity".to_string(),
                value: offer.quantity.to_string(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Users
// =============================================================================

/// Validates a username and returns it trimmed.
pub fn validate_username(username: &str) -> ValidationResult<String> {
    let username = username.trim();

    if username.is_empty() {
        return Err(ValidationError::Required {
            field: "username".to_string(),
        });
    }

    if username.chars().count() < MIN_USERNAME_LENGTH {
        return Err(ValidationError::TooShort {
            field: "username".to_string(),
            min: MIN_USERNAME_LENGTH,
        });
    }

    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: "username".to_string(),
            max: MAX_USERNAME_LENGTH,
        });
    }

    Ok(username.to_string())
}

/// Validates a new password. Passwords are not trimmed.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    let len = password.chars().count();

    if len < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: MIN_PASSWORD_LENGTH,
        });
    }

    if len > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong {
            field: "password".to_string(),
            max: MAX_PASSWORD_LENGTH,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_price_checks_sign_before_rounding() {
        assert_eq!(validate_price("basePrice", 0.0).unwrap().cents(), 0);
        assert_eq!(validate_price("basePrice", 1.2).unwrap().cents(), 120);

        assert!(matches!(
            validate_price("basePrice", -0.004),
            Err(ValidationError::MustNotBeNegative { ref field }) if field == "basePrice"
        ));
        assert!(validate_price("quantityOffers.price", -0.001).is_err());
        assert!(validate_price("basePrice", f64::NAN).is_err());
        assert!(validate_price("basePrice", f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert_eq!(
            validate_email(" Jane.Doe@School.ORG ").unwrap(),
            "jane.doe@school.org"
        );
        assert!(validate_email("").is_err());
        assert!(validate_email("   ").is_err());
        assert!(validate_email("no-at-sign.example.com").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(100).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-3).is_err());
        assert!(validate_quantity(101).is_err());
    }

    #[test]
    fn test_validate_cancellation_reason() {
        assert_eq!(
            validate_cancellation_reason("  duplicate sale ").unwrap(),
            "duplicate sale"
        );
        assert!(matches!(
            validate_cancellation_reason("   "),
            Err(ValidationError::Required { .. })
        ));
        assert!(validate_cancellation_reason(&"x".repeat(501)).is_err());
    }

    #[test]
    fn test_validate_ticket_config() {
        let offers = vec![
            QuantityOffer::new(3, Money::from_cents(100)),
            QuantityOffer::new(5, Money::from_cents(200)),
        ];
        assert!(validate_ticket_config(Money::from_cents(50), &offers).is_ok());
        assert!(validate_ticket_config(Money::zero(), &[]).is_ok());

        assert!(validate_ticket_config(Money::from_cents(-1), &[]).is_err());

        let zero_qty = vec![QuantityOffer::new(0, Money::from_cents(100))];
        assert!(validate_ticket_config(Money::from_cents(50), &zero_qty).is_err());

        let negative_price = vec![QuantityOffer::new(2, Money::from_cents(-5))];
        assert!(validate_ticket_config(Money::from_cents(50), &negative_price).is_err());

        let duplicated = vec![
            QuantityOffer::new(3, Money::from_cents(100)),
            QuantityOffer::new(3, Money::from_cents(90)),
        ];
        assert!(matches!(
            validate_ticket_config(Money::from_cents(50), &duplicated),
            Err(ValidationError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_validate_username_and_password() {
        assert_eq!(validate_username(" cashier1 ").unwrap(), "cashier1");
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"a".repeat(51)).is_err());

        assert!(validate_password("secret1").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password(&"p".repeat(101)).is_err());
    }
}
