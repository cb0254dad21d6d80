//! # Ticket Configuration Repository
//!
//! Pricing versions. Rows are never edited: a new policy deactivates the
//! current row and inserts a fresh one with its offer menu, all in one
//! transaction. A partial unique index keeps at most one row active.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DbResult;
use canteen_core::money::Money;
use canteen_core::{QuantityOffer, TicketConfig, TicketPricing};

#[derive(Debug, sqlx::FromRow)]
struct ConfigRow {
    id: String,
    base_price_cents: i64,
    active: bool,
    created_at: DateTime<Utc>,
}

/// Repository for pricing configuration.
#[derive(Debug, Clone)]
pub struct TicketConfigRepository {
    pool: SqlitePool,
}

impl TicketConfigRepository {
    /// Creates a new TicketConfigRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TicketConfigRepository { pool }
    }

    /// The active configuration with its offers, if any.
    pub async fn get_active(&self) -> DbResult<Option<TicketConfig>> {
        let row = sqlx::query_as::<_, ConfigRow>(
            "SELECT id, base_price_cents, active, created_at FROM ticket_configs WHERE active = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.with_offers(row).await?)),
            None => Ok(None),
        }
    }

    /// Pricing of the active configuration, or the fallback policy when
    /// nothing is configured yet.
    pub async fn active_pricing(&self) -> DbResult<TicketPricing> {
        let pricing = match self.get_active().await? {
            Some(config) => config.pricing(),
            None => {
                debug!("No active ticket configuration, using fallback pricing");
                TicketPricing::fallback()
            }
        };

        Ok(pricing)
    }

    /// Replaces the active configuration.
    ///
    /// Inputs are expected to be validated already. The previous version is
    /// kept, inactive, for history.
    pub async fn replace(
        &self,
        base_price: Money,
        offers: &[QuantityOffer],
        now: DateTime<Utc>,
    ) -> DbResult<TicketConfig> {
        let id = Uuid::new_v4().to_string();

        let mut tx = self.pool.begin().await?;

        let deactivated = sqlx::query("UPDATE ticket_configs SET active = 0 WHERE active = 1")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        insert_config(&mut tx, &id, base_price, offers, now).await?;

        tx.commit().await?;

        info!(
            id = %id,
            base_price = %base_price,
            offers = offers.len(),
            deactivated,
            "Ticket configuration replaced"
        );

        let mut quantity_offers = offers.to_vec();
        quantity_offers.sort_by_key(|o| o.quantity);

        Ok(TicketConfig {
            id,
            base_price_cents: base_price.cents(),
            quantity_offers,
            active: true,
            created_at: now,
        })
    }

    /// Inserts the default policy if no configuration is active.
    ///
    /// ## Returns
    /// `true` if a row was created.
    pub async fn ensure_default(&self, now: DateTime<Utc>) -> DbResult<bool> {
        if self.count_active().await? > 0 {
            return Ok(false);
        }

        let fallback = TicketPricing::fallback();
        let id = Uuid::new_v4().to_string();

        let mut conn = self.pool.acquire().await?;
        insert_config(&mut conn, &id, fallback.base_price(), fallback.offers(), now).await?;

        info!(id = %id, "Default ticket configuration created");
        Ok(true)
    }

    /// Number of active rows (0 or 1).
    pub async fn count_active(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ticket_configs WHERE active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// All versions, newest first.
    pub async fn history(&self) -> DbResult<Vec<TicketConfig>> {
        let rows = sqlx::query_as::<_, ConfigRow>(
            "SELECT id, base_price_cents, active, created_at FROM ticket_configs \
             ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut configs = Vec::with_capacity(rows.len());
        for row in rows {
            configs.push(self.with_offers(row).await?);
        }

        Ok(configs)
    }

    async fn with_offers(&self, row: ConfigRow) -> DbResult<TicketConfig> {
        let quantity_offers = sqlx::query_as::<_, QuantityOffer>(
            "SELECT quantity, price_cents FROM ticket_config_offers \
             WHERE config_id = ?1 ORDER BY quantity",
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(TicketConfig {
            id: row.id,
            base_price_cents: row.base_price_cents,
            quantity_offers,
            active: row.active,
            created_at: row.created_at,
        })
    }
}

async fn insert_config(
    conn: &mut SqliteConnection,
    id: &str,
    base_price: Money,
    offers: &[QuantityOffer],
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO ticket_configs (id, base_price_cents, active, created_at) VALUES (?1, ?2, 1, ?3)",
    )
    .bind(id)
    .bind(base_price.cents())
    .bind(now)
    .execute(&mut *conn)
    .await?;

    for offer in offers {
        sqlx::query(
            "INSERT INTO ticket_config_offers (config_id, quantity, price_cents) VALUES (?1, ?2, ?3)",
        )
        .bind(id)
        .bind(offer.quantity)
        .bind(offer.price_cents)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
