//! # Ticket Pricing Engine
//!
//! Resolves a requested quantity to the price to charge, from the active
//! ticket configuration.
//!
//! ## Price Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  price_for(quantity)                                                    │
//! │                                                                         │
//! │  offers contains quantity? ──yes──► offer.price (exact match only)      │
//! │          │ no                                                           │
//! │          ▼                                                              │
//! │  quantity == 1? ─────────────yes──► base_price                          │
//! │          │ no                                                           │
//! │          ▼                                                              │
//! │  quantity × base_price                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Purchase Policy
//! The fallback in the last branch is never used by purchases: a purchase
//! quantity must be `1` or exactly one of the offer quantities. Offers are a
//! fixed menu, not a per-unit discount.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::DEFAULT_BASE_PRICE_CENTS;

// =============================================================================
// Quantity Offer
// =============================================================================

/// A `{quantity, price}` tier overriding the base price for an exact quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct QuantityOffer {
    pub quantity: i64,
    pub price_cents: i64,
}

impl QuantityOffer {
    pub fn new(quantity: i64, price: Money) -> Self {
        QuantityOffer {
            quantity,
            price_cents: price.cents(),
        }
    }

    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Ticket Pricing
// =============================================================================

/// Pricing policy: base price plus the offer menu (sorted by quantity).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketPricing {
    base_price: Money,
    offers: Vec<QuantityOffer>,
}

impl TicketPricing {
    /// Creates a pricing policy. Offers are sorted ascending by quantity.
    pub fn new(base_price: Money, mut offers: Vec<QuantityOffer>) -> Self {
        offers.sort_by_key(|offer| offer.quantity);
        TicketPricing { base_price, offers }
    }

    /// Policy used when no configuration is active: 0.50, no offers.
    pub fn fallback() -> Self {
        TicketPricing::new(Money::from_cents(DEFAULT_BASE_PRICE_CENTS), Vec::new())
    }

    #[inline]
    pub fn base_price(&self) -> Money {
        self.base_price
    }

    /// Offers, ascending by quantity.
    #[inline]
    pub fn offers(&self) -> &[QuantityOffer] {
        &self.offers
    }

    /// Quantities on the offer menu, ascending.
    pub fn offered_quantities(&self) -> Vec<i64> {
        self.offers.iter().map(|offer| offer.quantity).collect()
    }

    /// Returns the price for `quantity`.
    ///
    /// ## Example
    /// ```rust
    /// use canteen_core::money::Money;
    /// use canteen_core::pricing::{QuantityOffer, TicketPricing};
    ///
    /// let pricing = TicketPricing::new(
    ///     Money::from_cents(50),
    ///     vec![QuantityOffer::new(3, Money::from_cents(100))],
    /// );
    ///
    /// assert_eq!(pricing.price_for(3).cents(), 100); // offer
    /// assert_eq!(pricing.price_for(1).cents(), 50);  // base
    /// assert_eq!(pricing.price_for(4).cents(), 200); // 4 × base
    /// ```
    pub fn price_for(&self, quantity: i64) -> Money {
        if let Some(offer) = self.offers.iter().find(|o| o.quantity == quantity) {
            return offer.price();
        }

        if quantity == 1 {
            return self.base_price;
        }

        self.base_price.multiply_quantity(quantity)
    }

    /// Whether a purchase of `quantity` tickets is on the menu.
    pub fn is_purchasable(&self, quantity: i64) -> bool {
        quantity == 1 || self.offers.iter().any(|o| o.quantity == quantity)
    }

    /// Checks a purchase request against the policy.
    ///
    /// `claimed` is the amount as the front end sent it. It is accepted when
    /// it lies strictly within 0.01 of the expected price, so 0.505 pays for
    /// a 0.50 ticket but 0.49 does not. Returns the expected price, which is
    /// what gets stored.
    ///
    /// ## Errors
    /// - `QuantityNotOffered` when quantity is neither 1 nor an offer
    /// - `PriceMismatch` when the claimed amount is a cent or more off
    pub fn check_purchase(&self, quantity: i64, claimed: f64) -> CoreResult<Money> {
        if !self.is_purchasable(quantity) {
            return Err(CoreError::QuantityNotOffered {
                quantity,
                offered: self.offered_quantities(),
            });
        }

        let expected = self.price_for(quantity);
        if !within_tolerance(expected, claimed) {
            return Err(CoreError::PriceMismatch { expected, claimed });
        }

        Ok(expected)
    }
}

/// Tolerance in hundredths of a cent (0.01).
const PRICE_TOLERANCE: f64 = 100.0;

// Compared in hundredths of a cent so that a claim exactly one cent off
// never slips under the tolerance through binary rounding.
fn within_tolerance(expected: Money, claimed: f64) -> bool {
    if !claimed.is_finite() {
        return false;
    }
    let claimed = (claimed * 10_000.0).round();
    let expected = expected.cents() as f64 * 100.0;
    (claimed - expected).abs() < PRICE_TOLERANCE
}

impl Default for TicketPricing {
    fn default() -> Self {
        TicketPricing::fallback()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
