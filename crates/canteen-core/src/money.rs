//! # Money
//!
//! Ticket prices and batch totals in integer cents.
//!
//! The front end speaks decimal JSON numbers (`0.5`, `1.0`). Prices are
//! rounded to cents once, in [`Money::from_major_units`], and turned back
//! into numbers only when a response is rendered. A claimed purchase amount
//! is only ever compared against a price (see `TicketPricing::check_purchase`)
//! and never stored. Splits and sums are integer math:
//!
//! ```text
//!   offer 3 for 1.00  ──split──► [34, 33, 33] ¢   sums to 100
//! ```
//!
//! ## Usage
//! ```rust
//! use canteen_core::money::Money;
//!
//! let price = Money::from_cents(150); // 1.50
//!
//! assert_eq!((price * 2).cents(), 300);
//! let total = price + Money::from_cents(50);   // 2.00
//! assert_eq!(total.cents(), 200);
//!
//! // JSON numbers are converted exactly once, at the HTTP boundary
//! assert_eq!(Money::from_major_units(0.5).cents(), 50);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

/// An amount in cents. Signed so coupon adjustments can go below a line total
/// before being clamped.
///
/// ```text
///   TicketConfig.base_price ─┐
///   QuantityOffer.price ─────┴─► price_for(qty) ─► split per ticket
///   Ticket.total_amount ───────► stats and seller report sums
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Converts a decimal amount (as sent by the front end) to cents,
    /// rounding to the nearest cent.
    ///
    /// Non-finite input maps to zero.
    ///
    /// ## Example
    /// ```rust
    /// use canteen_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_units(1.0).cents(), 100);
    /// assert_eq!(Money::from_major_units(0.4999999).cents(), 50);
    /// assert_eq!(Money::from_major_units(0.49).cents(), 49);
    /// ```
    pub fn from_major_units(amount: f64) -> Self {
        if !amount.is_finite() {
            return Money::zero();
        }
        Money((amount * 100.0).round() as i64)
    }

    /// Returns the value as a decimal number for JSON responses.
    #[inline]
    pub fn to_major_units(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Always 0..=99, also for negative amounts.
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use canteen_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(50);
    /// assert_eq!(unit_price.multiply_quantity(4).cents(), 200);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Splits the amount into `parts` shares that sum back exactly.
    ///
    /// The `amount % parts` leftover cents go one each to the first shares.
    /// Returns an empty vector when `parts` is zero.
    ///
    /// ## Example
    /// ```rust
    /// use canteen_core::money::Money;
    ///
    /// let shares = Money::from_cents(100).split_evenly(3);
    /// let cents: Vec<i64> = shares.iter().map(|m| m.cents()).collect();
    /// assert_eq!(cents, vec![34, 33, 33]);
    /// ```
    pub fn split_evenly(&self, parts: usize) -> Vec<Money> {
        if parts == 0 {
            return Vec::new();
        }

        let n = parts as i64;
        let base = self.0.div_euclid(n);
        let remainder = self.0.rem_euclid(n) as usize;

        (0..parts)
            .map(|i| {
                if i < remainder {
                    Money(base + 1)
                } else {
                    Money(base)
                }
            })
            .collect()
    }

    /// Returns `percent`% of this amount, rounded half away from zero.
    ///
    /// `percent` is expressed in basis points (1000 = 10%).
    ///
    /// ## Example
    /// ```rust
    /// use canteen_core::money::Money;
    ///
    /// let line = Money::from_cents(250);
    /// assert_eq!(line.percentage_of(1000).cents(), 25); // 10%
    /// ```
    pub fn percentage_of(&self, bps: u32) -> Money {
        // i128 prevents overflow on large amounts
        let value = (self.0 as i128 * bps as i128 + 5000) / 10000;
        Money::from_cents(value as i64)
    }

    /// Returns the smaller of two values.
    #[inline]
    pub fn min(self, other: Money) -> Money {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

/// Display shows the amount with two decimals, without a currency symbol.
///
/// ## Note
/// This is for logs and error messages. The front end formats amounts
/// for display.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.cents_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by i64 (for quantity calculations).
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
