//! # Error Types
//!
//! ```text
//!  ValidationError ──(#[from])──► CoreError ──► ApiError (canteen-server)
//!                                                  ▲
//!  DbError (canteen-db) ───────────────────────────┘
//! ```
//!
//! [`ValidationError`] covers malformed input: fields that are empty, too long
//! or out of range. [`CoreError`] covers well-formed requests that the ticket
//! rules refuse: a price that does not match, a cancelled or winning ticket,
//! a draw with nothing left to draw. Both are raised before anything is
//! written.

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// A request the ticket rules refuse.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Ticket not found: {0}")]
    TicketNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    /// The claimed purchase amount is a cent or more away from the price.
    ///
    /// ## User Workflow
    /// ```text
    /// Seller submits: quantity=1, totalAmount=0.49
    ///      │
    ///      ▼
    /// Pricing engine: expected 0.50
    ///      │
    ///      ▼
    /// PriceMismatch { expected: 0.50, claimed: 0.49 }
    ///      │
    ///      ▼
    /// Nothing is persisted, seller screen shows the expected price
    /// ```
    #[error("Amount mismatch: expected {expected}, received {claimed}")]
    PriceMismatch { expected: Money, claimed: f64 },

    /// Quantity is neither 1 nor one of the configured offers.
    #[error("Quantity {quantity} is not available; choose 1 or one of the offers {offered:?}")]
    QuantityNotOffered { quantity: i64, offered: Vec<i64> },

    /// Ticket was already cancelled.
    #[error("Ticket {0} is already cancelled")]
    TicketAlreadyCancelled(String),

    /// Winning tickets cannot be cancelled until the win is reset.
    #[error("Ticket {0} is a winning ticket; reset the win before cancelling")]
    TicketIsWinner(String),

    /// Draw called while every ticket is cancelled or already a winner.
    #[error("No eligible tickets for the draw")]
    NoEligibleTickets,

    /// Bulk delete was called without the confirmation literal.
    #[error("Confirmation text is required to delete every ticket")]
    ConfirmationRequired,

    /// Coupon cannot be applied to this cart.
    #[error("Coupon {code} cannot be applied: {reason}")]
    CouponNotApplicable { code: String, reason: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Malformed input, reported with the offending field name.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Email, date or ticket number that does not parse.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Unknown role, status or payment method.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., two offers for the same quantity).
    #[error("{field} '{value}' is duplicated")]
    Duplicate { field: String, value: String },
}

pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::PriceMismatch {
            expected: Money::from_cents(50),
            claimed: 0.49,
        };
        assert_eq!(
            err.to_string(),
            "Amount mismatch: expected 0.50, received 0.49"
        );

        let err = CoreError::TicketIsWinner("20240116-12345678".to_string());
        assert!(err.to_string().contains("20240116-12345678"));
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "reason".to_string(),
        };
        assert_eq!(err.to_string(), "reason is required");

        let err = ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: 100,
        };
        assert_eq!(err.to_string(), "quantity must be between 1 and 100");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "email".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
