//! # canteen-core: Pure Business Logic for the Canteen POS
//!
//! This crate is the **heart** of the canteen backend. It contains the raffle
//! ticket rules, money math and validation as pure functions with zero I/O.
//!
//! ## Where it sits
//! ```text
//!   seller screen / admin pages
//!            │ JSON
//!            ▼
//!   canteen-server ──► canteen-db ──► SQLite
//!            │              │
//!            └──────┬───────┘
//!                   ▼
//!            canteen-core      money, pricing, ticket numbers, draw,
//!                              reports, coupons, validation
//! ```
//!
//! Randomness is passed in as an `R: Rng`, and time as a `DateTime<Utc>`,
//! so every rule here is deterministic under test.
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Ticket, TicketConfig, TicketLog, User)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`pricing`] - Quantity → price resolution from the active offer table
//! - [`ticket_number`] - Human-readable ticket number format
//! - [`draw`] - Uniform winner selection
//! - [`report`] - Reporting periods and seller rollups
//! - [`coupon`] - Checkout coupon discount math
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use canteen_core::money::Money;
//! use canteen_core::pricing::{QuantityOffer, TicketPricing};
//!
//! let pricing = TicketPricing::new(
//!     Money::from_cents(50),
//!     vec![QuantityOffer::new(3, Money::from_cents(100))],
//! );
//!
//! assert_eq!(pricing.price_for(3).cents(), 100);
//! assert_eq!(pricing.price_for(1).cents(), 50);
//! ```

pub mod coupon;
pub mod draw;
pub mod error;
pub mod money;
pub mod pricing;
pub mod report;
pub mod ticket_number;
pub mod types;
pub mod validation;


pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use pricing::{QuantityOffer, TicketPricing};
pub use types::*;

/// Maximum number of tickets in a single purchase.
pub const MAX_TICKETS_PER_PURCHASE: i64 = 100;

/// Base price used when no ticket configuration has ever been saved (0.50).
pub const DEFAULT_BASE_PRICE_CENTS: i64 = 50;

/// Literal the admin must send to wipe every ticket.
pub const DELETE_ALL_CONFIRMATION: &str = "DELETE_ALL_TICKETS";

/// Label of the report bucket holding tickets without a seller.
pub const UNASSIGNED_SELLER_LABEL: &str = "unassigned";
