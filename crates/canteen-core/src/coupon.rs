//! # Coupon Discounts
//!
//! Applies a checkout coupon to cart lines.
//!
//! ## Discount Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Coupon ──► usable at `now`? (active, in window, under usage limit)    │
//! │                 │ no ──► CouponNotApplicable                            │
//! │                 ▼ yes                                                   │
//! │  Lines ──► applicable? (all / listed products / listed categories)     │
//! │                 │                                                       │
//! │                 ▼                                                       │
//! │   Percentage: line_total × value%          per applicable line         │
//! │   Fixed:      value split across applicable units, summed per line     │
//! │                 │                                                       │
//! │                 ▼                                                       │
//! │   discount(line) ≤ line_total                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

// =============================================================================
// Coupon
// =============================================================================

/// What a coupon takes off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CouponValue {
    /// Percentage of each applicable line, in basis points (1000 = 10%).
    Percentage { bps: u32 },
    /// Fixed amount spread across the applicable units.
    Fixed { amount: Money },
}

/// Which cart lines a coupon applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "applicationType", content = "targets", rename_all = "lowercase")]
pub enum CouponScope {
    All,
    Product(Vec<String>),
    Category(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    /// Uppercase code typed at checkout.
    pub code: String,
    pub value: CouponValue,
    pub scope: CouponScope,
    #[ts(as = "String")]
    pub start_date: DateTime<Utc>,
    #[ts(as = "String")]
    pub end_date: DateTime<Utc>,
    pub active: bool,
    /// `None` means unlimited.
    pub usage_limit: Option<i64>,
    pub usage_count: i64,
}

impl Coupon {
    /// Checks activity, validity window and usage limit.
    pub fn ensure_usable(&self, now: DateTime<Utc>) -> CoreResult<()> {
        let reason = if !self.active {
            Some("coupon is inactive")
        } else if now < self.start_date {
            Some("coupon is not valid yet")
        } else if now > self.end_date {
            Some("coupon has expired")
        } else if self.usage_limit.is_some_and(|limit| self.usage_count >= limit) {
            Some("usage limit reached")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(CoreError::CouponNotApplicable {
                code: self.code.clone(),
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn applies_to(&self, line: &CartLine) -> bool {
        match &self.scope {
            CouponScope::All => true,
            CouponScope::Product(ids) => ids.iter().any(|id| id == &line.product_id),
            CouponScope::Category(names) => line
                .category
                .as_ref()
                .is_some_and(|category| names.iter().any(|name| name == category)),
        }
    }
}

// =============================================================================
// Cart Lines
// =============================================================================

/// A priced cart line.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: String,
    pub category: Option<String>,
    pub unit_price_cents: i64,
    pub quantity: i64,
}

impl CartLine {
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

/// Result of applying a coupon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CouponApplication {
    /// Discount per input line, same order.
    pub line_discounts: Vec<Money>,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
}

/// Applies `coupon` to `lines` at `now`.
///
/// ## Errors
/// `CouponNotApplicable` when the coupon is unusable or matches no line.
///
/// ## Example
/// ```rust
/// use chrono::{Duration, Utc};
/// use canteen_core::coupon::{apply_coupon, CartLine, Coupon, CouponScope, CouponValue};
///
/// let now = Utc::now();
/// let coupon = Coupon {
///     code: "LUNCH10".to_string(),
///     value: CouponValue::Percentage { bps: 1000 },
///     scope: CouponScope::All,
///     start_date: now - Duration::days(1),
///     end_date: now + Duration::days(1),
///     active: true,
///     usage_limit: None,
///     usage_count: 0,
/// };
/// let lines = vec![CartLine {
///     product_id: "sandwich".to_string(),
///     category: None,
///     unit_price_cents: 350,
///     quantity: 2,
/// }];
///
/// let applied = apply_coupon(&coupon, &lines, now).unwrap();
/// assert_eq!(applied.discount.cents(), 70);
/// assert_eq!(applied.total.cents(), 630);
/// ```
pub fn apply_coupon(
    coupon: &Coupon,
    lines: &[CartLine],
    now: DateTime<Utc>,
) -> CoreResult<CouponApplication> {
    coupon.ensure_usable(now)?;

    let applicable: Vec<bool> = lines.iter().map(|line| coupon.applies_to(line)).collect();
    let applicable_units: i64 = lines
        .iter()
        .zip(&applicable)
        .filter(|(_, &ok)| ok)
        .map(|(line, _)| line.quantity.max(0))
        .sum();

    if applicable_units == 0 {
        return Err(CoreError::CouponNotApplicable {
            code: coupon.code.clone(),
            reason: "no item in the cart is eligible".to_string(),
        });
    }

    let raw: Vec<Money> = match coupon.value {
        CouponValue::Percentage { bps } => lines
            .iter()
            .zip(&applicable)
            .map(|(line, &ok)| {
                if ok {
                    line.line_total().percentage_of(bps)
                } else {
                    Money::zero()
                }
            })
            .collect(),
        CouponValue::Fixed { amount } => {
            let mut unit_shares = amount.split_evenly(applicable_units as usize).into_iter();
            lines
                .iter()
                .zip(&applicable)
                .map(|(line, &ok)| {
                    if ok {
                        unit_shares.by_ref().take(line.quantity.max(0) as usize).sum()
                    } else {
                        Money::zero()
                    }
                })
                .collect()
        }
    };

    let line_discounts: Vec<Money> = lines
        .iter()
        .zip(raw)
        .map(|(line, discount)| discount.min(line.line_total()))
        .collect();

    let subtotal: Money = lines.iter().map(CartLine::line_total).sum();
    let discount: Money = line_discounts.iter().copied().sum();

    Ok(CouponApplication {
        line_discounts,
        subtotal,
        discount,
        total: subtotal - discount,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn coupon(value: CouponValue, scope: CouponScope) -> Coupon {
        let now = Utc::now();
        Coupon {
            code: "CANTINE".to_string(),
            value,
            scope,
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(1),
            active: true,
            usage_limit: Some(10),
            usage_count: 0,
        }
    }

    fn line(product: &str, category: &str, unit: i64, qty: i64) -> CartLine {
        CartLine {
            product_id: product.to_string(),
            category: Some(category.to_string()),
            unit_price_cents: unit,
            quantity: qty,
        }
    }

    #[test]
    fn test_percentage_on_category() {
        let c = coupon(
            CouponValue::Percentage { bps: 2000 },
            CouponScope::Category(vec!["drinks".to_string()]),
        );
        let lines = vec![line("cola", "drinks", 150, 2), line("crisps", "snacks", 100, 1)];

        let applied = apply_coupon(&c, &lines, Utc::now()).unwrap();
        assert_eq!(applied.line_discounts, vec![Money::from_cents(60), Money::zero()]);
        assert_eq!(applied.subtotal.cents(), 400);
        assert_eq!(applied.total.cents(), 340);
    }

    #[test]
    fn test_fixed_spread_per_unit() {
        let c = coupon(
            CouponValue::Fixed {
                amount: Money::from_cents(100),
            },
            CouponScope::Product(vec!["cola".to_string(), "water".to_string()]),
        );
        let lines = vec![
            line("cola", "drinks", 150, 2),
            line("crisps", "snacks", 100, 1),
            line("water", "drinks", 80, 1),
        ];

        let applied = apply_coupon(&c, &lines, Utc::now()).unwrap();
        // 100 cents over 3 units: [34, 33] to cola, [33] to water
        assert_eq!(
            applied.line_discounts,
            vec![Money::from_cents(67), Money::zero(), Money::from_cents(33)]
        );
        assert_eq!(applied.discount.cents(), 100);
    }

    #[test]
    fn test_discount_capped_at_line_total() {
        let c = coupon(
            CouponValue::Fixed {
                amount: Money::from_cents(1000),
            },
            CouponScope::All,
        );
        let lines = vec![line("gum", "snacks", 50, 1)];

        let applied = apply_coupon(&c, &lines, Utc::now()).unwrap();
        assert_eq!(applied.discount.cents(), 50);
        assert!(applied.total.is_zero());
    }

    #[test]
    fn test_unusable_coupons() {
        let now = Utc::now();

        let mut inactive = coupon(CouponValue::Percentage { bps: 1000 }, CouponScope::All);
        inactive.active = false;
        assert!(inactive.ensure_usable(now).is_err());

        let mut expired = coupon(CouponValue::Percentage { bps: 1000 }, CouponScope::All);
        expired.end_date = now - Duration::hours(1);
        assert!(expired.ensure_usable(now).is_err());

        let mut exhausted = coupon(CouponValue::Percentage { bps: 1000 }, CouponScope::All);
        exhausted.usage_count = 10;
        assert!(exhausted.ensure_usable(now).is_err());

        let mut unlimited = exhausted.clone();
        unlimited.usage_limit = None;
        assert!(unlimited.ensure_usable(now).is_ok());
    }

    #[test]
    fn test_no_eligible_line() {
        let c = coupon(
            CouponValue::Percentage { bps: 1000 },
            CouponScope::Product(vec!["cola".to_string()]),
        );
        let lines = vec![line("crisps", "snacks", 100, 1)];
        assert!(matches!(
            apply_coupon(&c, &lines, Utc::now()),
            Err(CoreError::CouponNotApplicable { .. })
        ));
    }
}
