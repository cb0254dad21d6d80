//! Purchaser notifications.
//!
//! Delivery is fire-and-forget: [`spawn_purchase_confirmation`] and
//! [`spawn_winner_notification`] detach a task, and a failed send is only
//! logged. A sold ticket stays sold whatever happens to the email.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use canteen_core::Money;

/// Notification delivery failure.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Outbound messages to ticket buyers.
#[async_trait]
pub trait TicketNotifier: Send + Sync {
    /// Confirmation listing every ticket number of a purchase.
    async fn send_purchase_confirmation(
        &self,
        to: &str,
        ticket_numbers: &[String],
        total: Money,
    ) -> Result<(), NotifyError>;

    /// Congratulations for a drawn ticket.
    async fn send_winner_notification(&self, to: &str, ticket_number: &str)
        -> Result<(), NotifyError>;
}

/// Writes notifications to the log instead of sending mail.
///
/// Used when no mail relay is configured and in development.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

#[async_trait]
impl TicketNotifier for ConsoleNotifier {
    async fn send_purchase_confirmation(
        &self,
        to: &str,
        ticket_numbers: &[String],
        total: Money,
    ) -> Result<(), NotifyError> {
        info!(
            to = %to,
            tickets = %ticket_numbers.join(", "),
            total = %total,
            "📧 Purchase confirmation"
        );
        Ok(())
    }

    async fn send_winner_notification(
        &self,
        to: &str,
        ticket_number: &str,
    ) -> Result<(), NotifyError> {
        info!(to = %to, ticket_number = %ticket_number, "📧 Winner notification");
        Ok(())
    }
}

/// Sends a purchase confirmation in the background.
pub fn spawn_purchase_confirmation(
    notifier: Arc<dyn TicketNotifier>,
    to: String,
    ticket_numbers: Vec<String>,
    total: Money,
) {
    tokio::spawn(async move {
        if let Err(e) = notifier
            .send_purchase_confirmation(&to, &ticket_numbers, total)
            .await
        {
            warn!(error = %e, to = %to, count = ticket_numbers.len(), "Purchase confirmation not sent");
        }
    });
}

/// Sends a winner notification in the background.
pub fn spawn_winner_notification(notifier: Arc<dyn TicketNotifier>, to: String, ticket_number: String) {
    tokio::spawn(async move {
        if let Err(e) = notifier.send_winner_notification(&to, &ticket_number).await {
            warn!(error = %e, to = %to, ticket_number = %ticket_number, "Winner notification not sent");
        }
    });
}
