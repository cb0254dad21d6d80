//! # Reporting
//!
//! Report periods and rollup shapes for ticket statistics. The SQL
//! aggregation lives in canteen-db; this module parses the period and
//! folds per-seller rows into a report with a totals row.
//!
//! ## Period Semantics
//! ```text
//!   startDate=2024-01-15          endDate=2024-01-16
//!   ├── 2024-01-15T00:00:00Z ........ 2024-01-16T23:59:59.999Z ──┤
//!         inclusive                          inclusive
//! ```

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::validation::ValidationResult;
use crate::UNASSIGNED_SELLER_LABEL;

// =============================================================================
// Report Period
// =============================================================================

/// Optional inclusive time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportPeriod {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl ReportPeriod {
    /// Unbounded period.
    pub fn all_time() -> Self {
        ReportPeriod::default()
    }

    /// Parses optional `YYYY-MM-DD` bounds.
    ///
    /// ## Errors
    /// - `InvalidFormat` for a malformed date
    /// - `InvalidFormat` when start is after end
    ///
    /// ## Example
    /// ```rust
    /// use canteen_core::report::ReportPeriod;
    ///
    /// let period = ReportPeriod::from_dates(Some("2024-01-15"), Some("2024-01-16")).unwrap();
    /// assert_eq!(period.start.unwrap().to_rfc3339(), "2024-01-15T00:00:00+00:00");
    /// assert!(ReportPeriod::from_dates(Some("2024-01-17"), Some("2024-01-16")).is_err());
    /// ```
    pub fn from_dates(start: Option<&str>, end: Option<&str>) -> ValidationResult<Self> {
        let start_day = parse_day(start, "startDate")?;
        let end_day = parse_day(end, "endDate")?;

        if let (Some(s), Some(e)) = (start_day, end_day) {
            if s > e {
                return Err(ValidationError::InvalidFormat {
                    field: "startDate".to_string(),
                    reason: "must not be after endDate".to_string(),
                });
            }
        }

        Ok(ReportPeriod {
            start: start_day.map(start_of_day),
            end: end_day.map(end_of_day),
        })
    }

    /// The UTC calendar day containing `now`.
    pub fn day_of(now: DateTime<Utc>) -> Self {
        let day = now.date_naive();
        ReportPeriod {
            start: Some(start_of_day(day)),
            end: Some(end_of_day(day)),
        }
    }

    /// Whether `at` falls inside the period.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| at >= s) && self.end.map_or(true, |e| at <= e)
    }
}

fn parse_day(value: Option<&str>, field: &str) -> ValidationResult<Option<NaiveDate>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ValidationError::InvalidFormat {
                field: field.to_string(),
                reason: "expected YYYY-MM-DD".to_string(),
            }),
    }
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

fn end_of_day(day: NaiveDate) -> DateTime<Utc> {
    start_of_day(day) + Duration::days(1) - Duration::milliseconds(1)
}

// =============================================================================
// Seller Report
// =============================================================================

/// Per-seller rollup over non-cancelled tickets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SellerReportRow {
    /// `None` for the unassigned bucket.
    pub seller_id: Option<String>,
    pub seller_name: String,
    /// Distinct purchase batches.
    pub purchase_count: i64,
    /// Tickets.
    pub total_quantity: i64,
    pub total_revenue_cents: i64,
}

impl SellerReportRow {
    #[inline]
    pub fn total_revenue(&self) -> Money {
        Money::from_cents(self.total_revenue_cents)
    }
}

/// Seller rows plus a grand total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SellerReport {
    pub rows: Vec<SellerReportRow>,
    pub totals: SellerReportRow,
}

impl SellerReport {
    /// Folds aggregated rows into a report.
    ///
    /// Rows without a seller id are labelled `unassigned`; named sellers
    /// come first by revenue, the unassigned bucket last.
    pub fn from_rows(mut rows: Vec<SellerReportRow>) -> Self {
        for row in rows.iter_mut().filter(|r| r.seller_id.is_none()) {
            row.seller_name = UNASSIGNED_SELLER_LABEL.to_string();
        }

        rows.sort_by(|a, b| {
            a.seller_id
                .is_none()
                .cmp(&b.seller_id.is_none())
                .then(b.total_revenue_cents.cmp(&a.total_revenue_cents))
                .then(a.seller_name.cmp(&b.seller_name))
        });

        let totals = SellerReportRow {
            seller_id: None,
            seller_name: "total".to_string(),
            purchase_count: rows.iter().map(|r| r.purchase_count).sum(),
            total_quantity: rows.iter().map(|r| r.total_quantity).sum(),
            total_revenue_cents: rows.iter().map(|r| r.total_revenue_cents).sum(),
        };

        SellerReport { rows, totals }
    }
}

// =============================================================================
// Dashboard Stats
// =============================================================================

/// Ticket count and revenue over a set of non-cancelled tickets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TicketSummary {
    pub tickets: i64,
    pub amount_cents: i64,
}

/// Admin dashboard counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TicketStats {
    pub total: i64,
    pub active: i64,
    pub cancelled: i64,
    pub winners: i64,
    /// Revenue excluding cancelled tickets.
    pub revenue_cents: i64,
    pub unique_emails: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================
