//! # Ticket Repository
//!
//! Persistence for raffle tickets: batch issuance, cancellation, the draw,
//! listings and aggregates.
//!
//! ## Write Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  insert_batch      BEGIN                                                │
//! │                      INSERT tickets × N   (UNIQUE ticket_number)        │
//! │                      INSERT ticket_logs × N ('created')                 │
//! │                    COMMIT  ── any failure: nothing is visible           │
//! │                                                                         │
//! │  cancel            BEGIN                                                │
//! │                      INSERT ticket_logs ('cancelled')   ← log first     │
//! │                      UPDATE tickets ... WHERE status != 'cancelled'     │
//! │                                           AND is_winner = 0             │
//! │                    0 rows? ROLLBACK : COMMIT                            │
//! │                                                                         │
//! │  mark_winner       BEGIN                                                │
//! │                      UPDATE tickets SET is_winner = 1                   │
//! │                        WHERE is_winner = 0 AND status != 'cancelled'    │
//! │                      INSERT ticket_logs ('winner_drawn')                │
//! │                    0 rows? ROLLBACK : COMMIT                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every write transaction starts with a write statement so SQLite takes
//! the writer lock up front and waits on `busy_timeout` instead of failing
//! a read-to-write upgrade.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::ticket_log::insert_log;
use canteen_core::report::{ReportPeriod, SellerReport, SellerReportRow, TicketStats, TicketSummary};
use canteen_core::ticket_number::random_ticket_number;
use canteen_core::{Ticket, TicketLog, TicketStatus};

const TICKET_COLUMNS: &str = "id, ticket_number, email, purchase_batch_id, purchase_date, \
     total_amount_cents, payment_method, status, is_winner, winner_date, cancelled_at, \
     cancelled_by, cancellation_reason, sold_by, created_at, updated_at";

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 500;

// =============================================================================
// Listing
// =============================================================================

/// Filter for the admin ticket listing.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    /// Substring of the ticket number or email.
    pub search: Option<String>,
    pub winners_only: bool,
    /// 1-based.
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// One page of tickets, newest first.
#[derive(Debug, Clone)]
pub struct TicketPage {
    pub tickets: Vec<Ticket>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for ticket database operations.
#[derive(Debug, Clone)]
pub struct TicketRepository {
    pool: SqlitePool,
}

impl TicketRepository {
    /// Creates a new TicketRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TicketRepository { pool }
    }

    /// Gets a ticket by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Ticket>> {
        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?1");

        let ticket = sqlx::query_as::<_, Ticket>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(ticket)
    }

    /// Gets a ticket by its printed number.
    pub async fn get_by_number(&self, ticket_number: &str) -> DbResult<Option<Ticket>> {
        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE ticket_number = ?1");

        let ticket = sqlx::query_as::<_, Ticket>(&sql)
            .bind(ticket_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(ticket)
    }

    /// Whether a ticket number is already taken.
    pub async fn number_exists(&self, ticket_number: &str) -> DbResult<bool> {
        let exists: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tickets WHERE ticket_number = ?1)")
                .bind(ticket_number)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists != 0)
    }

    /// Samples `count` distinct ticket numbers for `date` that are not yet
    /// persisted.
    ///
    /// Rejection sampling: draw a random suffix, skip it if this batch or
    /// the table already has it. The check is an optimization; the UNIQUE
    /// constraint in [`insert_batch`](Self::insert_batch) is the guarantee.
    pub async fn generate_ticket_numbers(
        &self,
        count: usize,
        date: NaiveDate,
    ) -> DbResult<Vec<String>> {
        let mut numbers = Vec::with_capacity(count);
        let mut seen = HashSet::with_capacity(count);

        while numbers.len() < count {
            let candidate = random_ticket_number(&mut rand::thread_rng(), date);

            if seen.contains(&candidate) || self.number_exists(&candidate).await? {
                debug!(ticket_number = %candidate, "Ticket number collision, resampling");
                continue;
            }

            seen.insert(candidate.clone());
            numbers.push(candidate);
        }

        Ok(numbers)
    }

    /// Persists a purchase batch and its `created` log entries atomically.
    ///
    /// ## Errors
    /// `UniqueViolation` if a ticket number was taken concurrently; no row
    /// of the batch is kept in that case.
    pub async fn insert_batch(&self, tickets: &[Ticket], logs: &[TicketLog]) -> DbResult<()> {
        debug!(count = tickets.len(), "Inserting ticket batch");

        let mut tx = self.pool.begin().await?;

        for ticket in tickets {
            sqlx::query(
                r#"
                INSERT INTO tickets (
                    id, ticket_number, email, purchase_batch_id, purchase_date,
                    total_amount_cents, payment_method, status, is_winner, winner_date,
                    cancelled_at, cancelled_by, cancellation_reason, sold_by,
                    created_at, updated_at
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5,
                    ?6, ?7, ?8, ?9, ?10,
                    ?11, ?12, ?13, ?14,
                    ?15, ?16
                )
                "#,
            )
            .bind(&ticket.id)
            .bind(&ticket.ticket_number)
            .bind(&ticket.email)
            .bind(&ticket.purchase_batch_id)
            .bind(ticket.purchase_date)
            .bind(ticket.total_amount_cents)
            .bind(ticket.payment_method)
            .bind(ticket.status)
            .bind(ticket.is_winner)
            .bind(ticket.winner_date)
            .bind(ticket.cancelled_at)
            .bind(&ticket.cancelled_by)
            .bind(&ticket.cancellation_reason)
            .bind(&ticket.sold_by)
            .bind(ticket.created_at)
            .bind(ticket.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        for log in logs {
            insert_log(&mut tx, log).await?;
        }

        tx.commit().await?;

        Ok(())
    }

    /// Tickets sharing a purchase batch, in issue order.
    pub async fn get_batch(&self, purchase_batch_id: &str) -> DbResult<Vec<Ticket>> {
        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE purchase_batch_id = ?1 ORDER BY rowid"
        );

        let tickets = sqlx::query_as::<_, Ticket>(&sql)
            .bind(purchase_batch_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(tickets)
    }

    /// Number of tickets in a purchase batch.
    pub async fn count_batch(&self, purchase_batch_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM tickets WHERE purchase_batch_id = ?1")
                .bind(purchase_batch_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    /// Cancels a ticket, writing the audit entry first.
    ///
    /// ## Returns
    /// `false` when the ticket was cancelled or drawn by someone else in the
    /// meantime (nothing is written in that case).
    pub async fn cancel(&self, ticket_id: &str, log: &TicketLog) -> DbResult<bool> {
        let now = log.cancelled_at.unwrap_or(log.created_at);

        let mut tx = self.pool.begin().await?;

        insert_log(&mut tx, log).await?;

        let result = sqlx::query(
            r#"
            UPDATE tickets SET
                status = 'cancelled',
                cancelled_at = ?2,
                cancelled_by = ?3,
                cancellation_reason = ?4,
                updated_at = ?2
            WHERE id = ?1 AND status != 'cancelled' AND is_winner = 0
            "#,
        )
        .bind(ticket_id)
        .bind(now)
        .bind(&log.cancelled_by)
        .bind(&log.reason)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        debug!(id = %ticket_id, "Ticket cancelled");

        Ok(true)
    }

    // =========================================================================
    // Draw
    // =========================================================================

    /// Number of tickets eligible for the draw.
    pub async fn count_eligible(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tickets WHERE status != 'cancelled' AND is_winner = 0",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// The `offset`-th eligible ticket in insertion order.
    pub async fn eligible_at(&self, offset: i64) -> DbResult<Option<Ticket>> {
        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets \
             WHERE status != 'cancelled' AND is_winner = 0 \
             ORDER BY rowid LIMIT 1 OFFSET ?1"
        );

        let ticket = sqlx::query_as::<_, Ticket>(&sql)
            .bind(offset)
            .fetch_optional(&self.pool)
            .await?;

        Ok(ticket)
    }

    /// Marks a ticket as winner if it is still eligible, with its audit entry.
    ///
    /// ## Returns
    /// `false` when the ticket stopped being eligible since it was selected.
    pub async fn mark_winner(
        &self,
        ticket_id: &str,
        log: &TicketLog,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE tickets SET
                is_winner = 1,
                winner_date = ?2,
                updated_at = ?2
            WHERE id = ?1 AND is_winner = 0 AND status != 'cancelled'
            "#,
        )
        .bind(ticket_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        insert_log(&mut tx, log).await?;
        tx.commit().await?;

        Ok(true)
    }

    /// Clears the winner flag, returning the ticket to the eligible pool.
    pub async fn reset_winner(&self, ticket_id: &str, now: DateTime<Utc>) -> DbResult<Ticket> {
        let result = sqlx::query(
            r#"
            UPDATE tickets SET
                is_winner = 0,
                winner_date = NULL,
                updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(ticket_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Ticket", ticket_id));
        }

        self.get_by_id(ticket_id)
            .await?
            .ok_or_else(|| DbError::not_found("Ticket", ticket_id))
    }

    /// Deletes every ticket. Audit entries are kept.
    pub async fn delete_all(&self) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM tickets")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // Reads & Aggregates
    // =========================================================================

    /// Admin listing, newest first. Cancelled tickets are included.
    pub async fn list(&self, filter: &TicketFilter) -> DbResult<TicketPage> {
        let limit = filter.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let page = filter.page.unwrap_or(1).max(1);

        let mut count_query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM tickets WHERE 1 = 1");
        push_filter(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE 1 = 1"));
        push_filter(&mut query, filter);
        query
            .push(" ORDER BY purchase_date DESC, rowid DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind((page - 1) * limit);

        let tickets = query
            .build_query_as::<Ticket>()
            .fetch_all(&self.pool)
            .await?;

        Ok(TicketPage {
            tickets,
            total,
            page,
            limit,
        })
    }

    /// Dashboard counters.
    pub async fn stats(&self) -> DbResult<TicketStats> {
        let stats = sqlx::query_as::<_, TicketStats>(
            r#"
            SELECT
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN status = 'active' THEN 1 ELSE 0 END), 0) AS active,
                COALESCE(SUM(CASE WHEN status = 'cancelled' THEN 1 ELSE 0 END), 0) AS cancelled,
                COALESCE(SUM(CASE WHEN is_winner = 1 THEN 1 ELSE 0 END), 0) AS winners,
                COALESCE(SUM(CASE WHEN status != 'cancelled' THEN total_amount_cents ELSE 0 END), 0)
                    AS revenue_cents,
                COUNT(DISTINCT email) AS unique_emails
            FROM tickets
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }

    /// Non-cancelled ticket count and revenue attributed to one seller.
    pub async fn seller_summary(
        &self,
        seller_id: &str,
        period: &ReportPeriod,
    ) -> DbResult<TicketSummary> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT COUNT(*) AS tickets, COALESCE(SUM(total_amount_cents), 0) AS amount_cents \
             FROM tickets WHERE status != 'cancelled' AND sold_by = ",
        );
        query.push_bind(seller_id.to_string());
        push_period(&mut query, "purchase_date", period);

        let summary = query
            .build_query_as::<TicketSummary>()
            .fetch_one(&self.pool)
            .await?;

        Ok(summary)
    }

    /// Per-seller rollup over non-cancelled tickets with a totals row.
    ///
    /// Tickets without a seller land in the `unassigned` bucket. A seller
    /// whose account was deleted keeps their id as display name.
    pub async fn seller_report(&self, period: &ReportPeriod) -> DbResult<SellerReport> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT
                t.sold_by AS seller_id,
                COALESCE(MAX(u.username), t.sold_by, '') AS seller_name,
                COUNT(DISTINCT t.purchase_batch_id) AS purchase_count,
                COUNT(*) AS total_quantity,
                COALESCE(SUM(t.total_amount_cents), 0) AS total_revenue_cents
            FROM tickets t
            LEFT JOIN users u ON u.id = t.sold_by
            WHERE t.status != 'cancelled'
            "#,
        );
        push_period(&mut query, "t.purchase_date", period);
        query.push(" GROUP BY t.sold_by");

        let rows = query
            .build_query_as::<SellerReportRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(SellerReport::from_rows(rows))
    }

    /// Total number of ticket rows.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tickets")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

fn push_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &TicketFilter) {
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status);
    }

    if filter.winners_only {
        query.push(" AND is_winner = 1");
    }

    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search.to_lowercase());
        query
            .push(" AND (ticket_number LIKE ")
            .push_bind(pattern.clone())
            .push(" OR email LIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn push_period(query: &mut QueryBuilder<'_, Sqlite>, column: &str, period: &ReportPeriod) {
    if let Some(start) = period.start {
        query.push(format!(" AND {column} >= ")).push_bind(start);
    }
    if let Some(end) = period.end {
        query.push(format!(" AND {column} <= ")).push_bind(end);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
