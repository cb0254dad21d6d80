//! # Domain Types
//!
//! Core domain types used throughout the canteen POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Ticket      │   │  TicketConfig   │   │   TicketLog     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  ticket_number  │   │  base_price     │   │  ticket_number  │       │
//! │  │  batch id       │   │  offers[]       │   │  action         │       │
//! │  │  status         │   │  active (≤ 1)   │   │  audit copy     │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      User       │   │  TicketStatus   │   │ PaymentMethod   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  username       │   │  Active         │   │  Cash           │       │
//! │  │  role           │   │  Used/Expired   │   │  Card           │       │
//! │  └─────────────────┘   │  Cancelled      │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every ticket has:
//! - `id`: UUID v4 - immutable, used by the admin API
//! - `ticket_number`: human-readable, printed for the purchaser, used by the
//!   audit log so entries outlive the ticket row

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::pricing::{QuantityOffer, TicketPricing};

// =============================================================================
// Ticket Status
// =============================================================================

/// Lifecycle status of a raffle ticket.
///
/// ```text
///  purchase ──► Active ──cancel──► Cancelled (terminal)
///
///  Used / Expired are reserved; nothing in the service moves a ticket there.
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Active,
    Used,
    Expired,
    Cancelled,
}

impl Default for TicketStatus {
    fn default() -> Self {
        TicketStatus::Active
    }
}

impl TicketStatus {
    /// Database/query-string representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Active => "active",
            TicketStatus::Used => "used",
            TicketStatus::Expired => "expired",
            TicketStatus::Cancelled => "cancelled",
        }
    }

    /// Parses the lowercase representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(TicketStatus::Active),
            "used" => Some(TicketStatus::Used),
            "expired" => Some(TicketStatus::Expired),
            "cancelled" => Some(TicketStatus::Cancelled),
            _ => None,
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Cash handed to the seller.
    Cash,
    /// Card payment on the venue terminal.
    Card,
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Cash
    }
}

// =============================================================================
// Ticket
// =============================================================================

/// One purchased raffle entry.
///
/// Rows are created in batches (one per unit purchased) and afterwards only
/// mutated by the draw (`is_winner`) or a cancellation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Printed ticket number, `YYYYMMDD-NNNNNNNN`.
    pub ticket_number: String,

    /// Purchaser email, lowercase.
    pub email: String,

    /// Shared by every ticket created in one purchase.
    pub purchase_batch_id: String,

    /// Batch timestamp, identical for all tickets of a batch.
    #[ts(as = "String")]
    pub purchase_date: DateTime<Utc>,

    /// This ticket's share of the batch total, in cents.
    pub total_amount_cents: i64,

    pub payment_method: PaymentMethod,

    pub status: TicketStatus,

    pub is_winner: bool,

    #[ts(as = "Option<String>")]
    pub winner_date: Option<DateTime<Utc>>,

    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,

    /// Operator (user id) who cancelled the ticket. Weak reference.
    pub cancelled_by: Option<String>,

    pub cancellation_reason: Option<String>,

    /// Seller (user id) attributed to the purchase. Weak reference.
    pub sold_by: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Returns this ticket's amount as Money.
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.status == TicketStatus::Cancelled
    }

    /// Eligible for the draw: not cancelled and not already a winner.
    #[inline]
    pub fn is_eligible(&self) -> bool {
        !self.is_cancelled() && !self.is_winner
    }
}

// =============================================================================
// Ticket Configuration
// =============================================================================

/// A version of the ticket pricing policy.
///
/// Configurations are append-only: replacing the policy deactivates the
/// current row and inserts a new one. At most one row is active.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TicketConfig {
    pub id: String,
    pub base_price_cents: i64,
    /// Sorted ascending by quantity.
    pub quantity_offers: Vec<QuantityOffer>,
    pub active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl TicketConfig {
    #[inline]
    pub fn base_price(&self) -> Money {
        Money::from_cents(self.base_price_cents)
    }

    /// Builds the pricing engine for this configuration.
    pub fn pricing(&self) -> TicketPricing {
        TicketPricing::new(self.base_price(), self.quantity_offers.clone())
    }
}

// =============================================================================
// Ticket Log
// =============================================================================

/// Lifecycle event recorded in the audit trail.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TicketLogAction {
    Created,
    Cancelled,
    WinnerDrawn,
}

impl TicketLogAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TicketLogAction::Created => "created",
            TicketLogAction::Cancelled => "cancelled",
            TicketLogAction::WinnerDrawn => "winner_drawn",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(TicketLogAction::Created),
            "cancelled" => Some(TicketLogAction::Cancelled),
            "winner_drawn" => Some(TicketLogAction::WinnerDrawn),
            _ => None,
        }
    }
}

/// Immutable audit entry, keyed by ticket number.
///
/// Carries a copy of the ticket's purchase data so the entry stays
/// meaningful after the ticket row is mutated or purged.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TicketLog {
    pub id: String,
    pub ticket_number: String,
    pub action: TicketLogAction,
    pub email: String,
    /// Size of the purchase batch the ticket belonged to.
    pub quantity: i64,
    pub total_amount_cents: i64,
    /// Required for `cancelled` entries.
    pub cancelled_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Required for `cancelled` entries.
    pub reason: Option<String>,
    #[ts(as = "String")]
    pub original_purchase_date: DateTime<Utc>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl TicketLog {
    /// Builds a `created` entry for a freshly purchased ticket.
    pub fn created(ticket: &Ticket, batch_size: i64, now: DateTime<Utc>) -> Self {
        TicketLog::from_ticket(ticket, TicketLogAction::Created, batch_size, now)
    }

    /// Builds a `winner_drawn` entry.
    pub fn winner_drawn(ticket: &Ticket, batch_size: i64, now: DateTime<Utc>) -> Self {
        TicketLog::from_ticket(ticket, TicketLogAction::WinnerDrawn, batch_size, now)
    }

    /// Builds a `cancelled` entry; operator and reason are mandatory.
    pub fn cancelled(
        ticket: &Ticket,
        batch_size: i64,
        operator_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let mut log = TicketLog::from_ticket(ticket, TicketLogAction::Cancelled, batch_size, now);
        log.cancelled_by = Some(operator_id.to_string());
        log.cancelled_at = Some(now);
        log.reason = Some(reason.to_string());
        log
    }

    fn from_ticket(
        ticket: &Ticket,
        action: TicketLogAction,
        batch_size: i64,
        now: DateTime<Utc>,
    ) -> Self {
        TicketLog {
            id: uuid::Uuid::new_v4().to_string(),
            ticket_number: ticket.ticket_number.clone(),
            action,
            email: ticket.email.clone(),
            quantity: batch_size,
            total_amount_cents: ticket.total_amount_cents,
            cancelled_by: None,
            cancelled_at: None,
            reason: None,
            original_purchase_date: ticket.purchase_date,
            created_at: now,
        }
    }
}

// =============================================================================
// Users & Roles
// =============================================================================

/// Operator role.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Ticket administration: cancel, draw, configure, report.
    Admin,
    /// Sells tickets with attribution and sees their own stats.
    Seller,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Seller => "seller",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Role::Admin),
            "seller" => Some(Role::Seller),
            _ => None,
        }
    }

    #[inline]
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// An operator account.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    /// argon2 PHC string. Never serialized.
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
    #[ts(as = "Option<String>")]
    pub last_login_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ticket() -> Ticket {
        let now = Utc::now();
        Ticket {
            id: "t-1".to_string(),
            ticket_number: "20240116-12345678".to_string(),
            email: "buyer@example.com".to_string(),
            purchase_batch_id: "b-1".to_string(),
            purchase_date: now,
            total_amount_cents: 34,
            payment_method: PaymentMethod::Cash,
            status: TicketStatus::Active,
            is_winner: false,
            winner_date: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            sold_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_ticket_eligibility() {
        let mut ticket = sample_ticket();
        assert!(ticket.is_eligible());

        ticket.is_winner = true;
        assert!(!ticket.is_eligible());

        ticket.is_winner = false;
        ticket.status = TicketStatus::Cancelled;
        assert!(!ticket.is_eligible());
    }

    #[test]
    fn test_status_round_trip_strings() {
        for status in [
            TicketStatus::Active,
            TicketStatus::Used,
            TicketStatus::Expired,
            TicketStatus::Cancelled,
        ] {
            assert_eq!(TicketStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TicketStatus::parse("deleted"), None);
        assert_eq!(TicketStatus::default(), TicketStatus::Active);
    }

    #[test]
    fn test_cancelled_log_copies_ticket() {
        let ticket = sample_ticket();
        let now = Utc::now();
        let log = TicketLog::cancelled(&ticket, 3, "admin-1", "Refunded", now);

        assert_eq!(log.action, TicketLogAction::Cancelled);
        assert_eq!(log.ticket_number, ticket.ticket_number);
        assert_eq!(log.email, ticket.email);
        assert_eq!(log.quantity, 3);
        assert_eq!(log.total_amount_cents, 34);
        assert_eq!(log.cancelled_by.as_deref(), Some("admin-1"));
        assert_eq!(log.reason.as_deref(), Some("Refunded"));
        assert_eq!(log.original_purchase_date, ticket.purchase_date);
    }

    #[test]
    fn test_user_password_hash_not_serialized() {
        let now = Utc::now();
        let user = User {
            id: "u-1".to_string(),
            username: "alice".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: Role::Seller,
            active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("\"role\":\"seller\""));
    }

    #[test]
    fn test_log_action_serializes_snake_case() {
        let json = serde_json::to_string(&TicketLogAction::WinnerDrawn).unwrap();
        assert_eq!(json, "\"winner_drawn\"");
    }
}
