//! # Ticket Numbers
//!
//! Human-readable ticket identifiers: `YYYYMMDD-NNNNNNNN`, the purchase date
//! followed by an 8-digit random suffix.
//!
//! ```text
//!   20240116-04718263
//!   └──┬───┘ └──┬───┘
//!    date     random, zero-padded, 10^8 values per day
//! ```
//!
//! This module only formats candidates. Uniqueness is the database's job
//! (UNIQUE on `tickets.ticket_number`); callers sample candidates, skip the
//! ones already taken, and let the constraint reject whatever slips through.

use chrono::NaiveDate;
use rand::Rng;

/// Number of distinct suffixes per day.
pub const SUFFIX_SPACE: u32 = 100_000_000;

/// Formats a ticket number from a date and a suffix in `[0, SUFFIX_SPACE)`.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use canteen_core::ticket_number::format_ticket_number;
///
/// let date = NaiveDate::from_ymd_opt(2024, 1, 16).unwrap();
/// assert_eq!(format_ticket_number(date, 12345678), "20240116-12345678");
/// assert_eq!(format_ticket_number(date, 42), "20240116-00000042");
/// ```
pub fn format_ticket_number(date: NaiveDate, suffix: u32) -> String {
    format!("{}-{:08}", date.format("%Y%m%d"), suffix % SUFFIX_SPACE)
}

/// Samples one candidate ticket number for `date`.
pub fn random_ticket_number<R: Rng + ?Sized>(rng: &mut R, date: NaiveDate) -> String {
    format_ticket_number(date, rng.gen_range(0..SUFFIX_SPACE))
}

/// Checks the `YYYYMMDD-NNNNNNNN` shape.
pub fn is_valid_ticket_number(value: &str) -> bool {
    let Some((date, suffix)) = value.split_once('-') else {
        return false;
    };

    date.len() == 8
        && suffix.len() == 8
        && suffix.bytes().all(|b| b.is_ascii_digit())
        && NaiveDate::parse_from_str(date, "%Y%m%d").is_ok()
}

// =============================================================================
// Unit Tests
// =============================================================================
