//! Ticket service: purchase, cancellation, draw and reporting.
//!
//! ## Purchase Flow
//! ```text
//! PurchaseRequest
//!      │
//!      ├── validate_email / validate_quantity       (400, nothing written)
//!      ├── active_pricing().check_purchase(qty, amt)  (400, nothing written)
//!      ├── generate_ticket_numbers(qty, today)
//!      ├── insert_batch(tickets, created logs)      one transaction
//!      └── spawn_purchase_confirmation(...)         never fails the purchase
//! ```
//!
//! ## Draw
//! Count the eligible pool, pick `r` uniformly in `[0, N)`, load the
//! `r`-th eligible ticket in insertion order and mark it with a guarded
//! update. A ticket that changed in between fails the draw with 409.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use canteen_core::draw::pick_index;
use canteen_core::report::{ReportPeriod, SellerReport, TicketStats, TicketSummary};
use canteen_core::validation::{
    validate_cancellation_reason, validate_email, validate_quantity, validate_ticket_config,
};
use canteen_core::{
    CoreError, Money, PaymentMethod, QuantityOffer, Ticket, TicketConfig, TicketLog,
    TicketPricing, TicketStatus, DELETE_ALL_CONFIRMATION,
};
use canteen_db::{Database, DbError, TicketFilter, TicketLogFilter, TicketPage};

use crate::error::{ApiError, ApiResult};
use crate::notifier::{spawn_purchase_confirmation, spawn_winner_notification, TicketNotifier};

/// Validated-at-the-boundary purchase input.
#[derive(Debug, Clone)]
pub struct PurchaseRequest {
    pub email: String,
    pub quantity: i64,
    /// Amount as sent by the client, checked against the price with a
    /// tolerance of 0.01.
    pub claimed_amount: f64,
    pub payment_method: PaymentMethod,
    /// Authenticated seller, if any.
    pub sold_by: Option<String>,
}

/// Outcome of a successful purchase.
#[derive(Debug, Clone)]
pub struct PurchaseReceipt {
    pub batch_id: String,
    pub email: String,
    pub ticket_numbers: Vec<String>,
    pub total: Money,
    pub purchase_date: DateTime<Utc>,
}

/// A seller's own counters.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SellerStats {
    pub total: TicketSummary,
    pub today: TicketSummary,
}

/// Ticket orchestration over core rules and the database.
#[derive(Clone)]
pub struct TicketService {
    db: Database,
    notifier: Arc<dyn TicketNotifier>,
    rng: Arc<Mutex<StdRng>>,
}

impl TicketService {
    pub fn new(db: Database, notifier: Arc<dyn TicketNotifier>) -> Self {
        TicketService {
            db,
            notifier,
            rng: Arc::new(Mutex::new(StdRng::from_entropy())),
        }
    }

    /// Deterministic draws, for tests.
    pub fn with_seed(db: Database, notifier: Arc<dyn TicketNotifier>, seed: u64) -> Self {
        TicketService {
            db,
            notifier,
            rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Pricing in force (fallback when nothing is configured).
    pub async fn pricing(&self) -> ApiResult<TicketPricing> {
        Ok(self.db.ticket_configs().active_pricing().await?)
    }

    /// The active configuration row, if one was ever saved.
    pub async fn active_config(&self) -> ApiResult<Option<TicketConfig>> {
        Ok(self.db.ticket_configs().get_active().await?)
    }

    /// Every configuration version, newest first.
    pub async fn config_history(&self) -> ApiResult<Vec<TicketConfig>> {
        Ok(self.db.ticket_configs().history().await?)
    }

    /// Validates and installs a new pricing version.
    pub async fn replace_config(
        &self,
        base_price: Money,
        offers: Vec<QuantityOffer>,
    ) -> ApiResult<TicketConfig> {
        validate_ticket_config(base_price, &offers)?;

        let config = self
            .db
            .ticket_configs()
            .replace(base_price, &offers, Utc::now())
            .await?;

        Ok(config)
    }

    // =========================================================================
    // Purchase
    // =========================================================================

    /// Sells a batch of tickets.
    pub async fn purchase(&self, request: PurchaseRequest) -> ApiResult<PurchaseReceipt> {
        let email = validate_email(&request.email)?;
        validate_quantity(request.quantity)?;

        let pricing = self.pricing().await?;
        let total = pricing.check_purchase(request.quantity, request.claimed_amount)?;

        let now = Utc::now();
        let batch_id = Uuid::new_v4().to_string();
        let quantity = request.quantity as usize;

        let tickets_repo = self.db.tickets();
        let numbers = tickets_repo
            .generate_ticket_numbers(quantity, now.date_naive())
            .await?;

        let tickets: Vec<Ticket> = numbers
            .iter()
            .zip(total.split_evenly(quantity))
            .map(|(number, share)| Ticket {
                id: Uuid::new_v4().to_string(),
                ticket_number: number.clone(),
                email: email.clone(),
                purchase_batch_id: batch_id.clone(),
                purchase_date: now,
                total_amount_cents: share.cents(),
                payment_method: request.payment_method,
                status: TicketStatus::Active,
                is_winner: false,
                winner_date: None,
                cancelled_at: None,
                cancelled_by: None,
                cancellation_reason: None,
                sold_by: request.sold_by.clone(),
                created_at: now,
                updated_at: now,
            })
            .collect();

        let logs: Vec<TicketLog> = tickets
            .iter()
            .map(|t| TicketLog::created(t, request.quantity, now))
            .collect();

        tickets_repo
            .insert_batch(&tickets, &logs)
            .await
            .map_err(|e| match e {
                DbError::UniqueViolation { .. } => {
                    warn!(batch_id = %batch_id, "Ticket number taken concurrently, purchase rejected");
                    ApiError::conflict("A ticket number was taken concurrently; retry the purchase")
                }
                other => other.into(),
            })?;

        info!(
            batch_id = %batch_id,
            email = %email,
            quantity = request.quantity,
            total = %total,
            sold_by = ?request.sold_by,
            "Tickets sold"
        );

        spawn_purchase_confirmation(self.notifier.clone(), email.clone(), numbers.clone(), total);

        Ok(PurchaseReceipt {
            batch_id,
            email,
            ticket_numbers: numbers,
            total,
            purchase_date: now,
        })
    }

    /// Re-sends the confirmation for the non-cancelled tickets of a batch.
    pub async fn resend_confirmation(&self, ticket_id: &str) -> ApiResult<Vec<String>> {
        let ticket = self.ticket(ticket_id).await?;
        let batch = self.db.tickets().get_batch(&ticket.purchase_batch_id).await?;

        let live: Vec<&Ticket> = batch.iter().filter(|t| !t.is_cancelled()).collect();
        if live.is_empty() {
            return Err(ApiError::bad_request(
                "Every ticket of this purchase is cancelled",
            ));
        }

        let numbers: Vec<String> = live.iter().map(|t| t.ticket_number.clone()).collect();
        let total: Money = live.iter().map(|t| t.total_amount()).sum();

        info!(batch_id = %ticket.purchase_batch_id, count = numbers.len(), "Resending confirmation");
        spawn_purchase_confirmation(self.notifier.clone(), ticket.email, numbers.clone(), total);

        Ok(numbers)
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    /// Cancels a ticket on behalf of an operator.
    pub async fn cancel(&self, ticket_id: &str, reason: &str, operator_id: &str) -> ApiResult<Ticket> {
        let reason = validate_cancellation_reason(reason)?;
        let ticket = self.ticket(ticket_id).await?;

        if ticket.is_cancelled() {
            return Err(CoreError::TicketAlreadyCancelled(ticket.ticket_number).into());
        }
        if ticket.is_winner {
            return Err(CoreError::TicketIsWinner(ticket.ticket_number).into());
        }

        let repo = self.db.tickets();
        let batch_size = repo.count_batch(&ticket.purchase_batch_id).await?;
        let log = TicketLog::cancelled(&ticket, batch_size, operator_id, &reason, Utc::now());

        if !repo.cancel(&ticket.id, &log).await? {
            return Err(ApiError::conflict(format!(
                "Ticket {} changed while it was being cancelled",
                ticket.ticket_number
            )));
        }

        info!(
            ticket_number = %ticket.ticket_number,
            operator = %operator_id,
            reason = %reason,
            "Ticket cancelled"
        );

        self.ticket(ticket_id).await
    }

    // =========================================================================
    // Draw
    // =========================================================================

    /// Draws one winner uniformly among eligible tickets.
    pub async fn draw(&self) -> ApiResult<Ticket> {
        let repo = self.db.tickets();

        let eligible = repo.count_eligible().await?;
        let offset = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            pick_index(&mut *rng, eligible.max(0) as u64)?
        };
        debug!(eligible, offset, "Drawing winner");

        let ticket = repo
            .eligible_at(offset as i64)
            .await?
            .ok_or_else(|| ApiError::conflict("The eligible pool changed during the draw; retry"))?;

        let now = Utc::now();
        let batch_size = repo.count_batch(&ticket.purchase_batch_id).await?;
        let log = TicketLog::winner_drawn(&ticket, batch_size, now);

        if !repo.mark_winner(&ticket.id, &log, now).await? {
            return Err(ApiError::conflict(format!(
                "Ticket {} stopped being eligible during the draw; retry",
                ticket.ticket_number
            )));
        }

        info!(ticket_number = %ticket.ticket_number, eligible, "Winner drawn");
        spawn_winner_notification(
            self.notifier.clone(),
            ticket.email.clone(),
            ticket.ticket_number.clone(),
        );

        Ok(Ticket {
            is_winner: true,
            winner_date: Some(now),
            updated_at: now,
            ..ticket
        })
    }

    /// Returns a winning ticket to the eligible pool.
    pub async fn reset_winner(&self, ticket_id: &str) -> ApiResult<Ticket> {
        let ticket = self.db.tickets().reset_winner(ticket_id, Utc::now()).await?;
        info!(ticket_number = %ticket.ticket_number, "Winner reset");
        Ok(ticket)
    }

    /// Deletes every ticket. Requires the confirmation literal.
    pub async fn delete_all(&self, confirm: &str) -> ApiResult<u64> {
        if confirm != DELETE_ALL_CONFIRMATION {
            return Err(CoreError::ConfirmationRequired.into());
        }

        let deleted = self.db.tickets().delete_all().await?;
        warn!(deleted, "All tickets deleted");
        Ok(deleted)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn ticket(&self, ticket_id: &str) -> ApiResult<Ticket> {
        self.db
            .tickets()
            .get_by_id(ticket_id)
            .await?
            .ok_or_else(|| CoreError::TicketNotFound(ticket_id.to_string()).into())
    }

    /// Every ticket sold in the same purchase as `ticket_id`.
    pub async fn batch_of(&self, ticket_id: &str) -> ApiResult<Vec<Ticket>> {
        let ticket = self.ticket(ticket_id).await?;
        Ok(self.db.tickets().get_batch(&ticket.purchase_batch_id).await?)
    }

    pub async fn list(&self, filter: &TicketFilter) -> ApiResult<TicketPage> {
        Ok(self.db.tickets().list(filter).await?)
    }

    pub async fn stats(&self) -> ApiResult<TicketStats> {
        Ok(self.db.tickets().stats().await?)
    }

    pub async fn logs(&self, filter: &TicketLogFilter) -> ApiResult<Vec<TicketLog>> {
        Ok(self.db.ticket_logs().list(filter).await?)
    }

    pub async fn seller_report(&self, period: &ReportPeriod) -> ApiResult<SellerReport> {
        Ok(self.db.tickets().seller_report(period).await?)
    }

    /// The caller's own totals, all-time and for the current UTC day.
    pub async fn seller_stats(&self, seller_id: &str) -> ApiResult<SellerStats> {
        let repo = self.db.tickets();
        let total = repo.seller_summary(seller_id, &ReportPeriod::all_time()).await?;
        let today = repo
            .seller_summary(seller_id, &ReportPeriod::day_of(Utc::now()))
            .await?;

        Ok(SellerStats { total, today })
    }
}
