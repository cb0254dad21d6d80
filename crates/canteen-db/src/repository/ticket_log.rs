//! # Ticket Log Repository
//!
//! Append-only audit trail. Entries are keyed by ticket number and never
//! updated or deleted; bulk ticket resets leave them in place.
//!
//! Lifecycle writes (purchase, cancel, draw) insert their entries inside the
//! ticket transaction through [`insert_log`]; this repository covers reads
//! and standalone appends.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use canteen_core::{TicketLog, TicketLogAction};

const DEFAULT_LOG_LIMIT: i64 = 100;
const MAX_LOG_LIMIT: i64 = 1000;

const LOG_COLUMNS: &str = "id, ticket_number, action, email, quantity, total_amount_cents, \
     cancelled_by, cancelled_at, reason, original_purchase_date, created_at";

/// Query filter for audit entries.
#[derive(Debug, Clone, Default)]
pub struct TicketLogFilter {
    pub ticket_number: Option<String>,
    pub action: Option<TicketLogAction>,
    /// Defaults to 100, capped at 1000.
    pub limit: Option<i64>,
}

/// Repository for audit log operations.
#[derive(Debug, Clone)]
pub struct TicketLogRepository {
    pool: SqlitePool,
}

impl TicketLogRepository {
    /// Creates a new TicketLogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TicketLogRepository { pool }
    }

    /// Appends one entry outside any ticket transaction.
    pub async fn insert(&self, log: &TicketLog) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_log(&mut conn, log).await
    }

    /// Entries for one ticket, oldest first.
    pub async fn for_ticket(&self, ticket_number: &str) -> DbResult<Vec<TicketLog>> {
        let sql = format!(
            "SELECT {LOG_COLUMNS} FROM ticket_logs WHERE ticket_number = ?1 ORDER BY created_at, rowid"
        );

        let logs = sqlx::query_as::<_, TicketLog>(&sql)
            .bind(ticket_number)
            .fetch_all(&self.pool)
            .await?;

        Ok(logs)
    }

    /// Entries matching `filter`, newest first.
    pub async fn list(&self, filter: &TicketLogFilter) -> DbResult<Vec<TicketLog>> {
        let limit = filter
            .limit
            .unwrap_or(DEFAULT_LOG_LIMIT)
            .clamp(1, MAX_LOG_LIMIT);

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {LOG_COLUMNS} FROM ticket_logs WHERE 1 = 1"));

        if let Some(number) = &filter.ticket_number {
            query.push(" AND ticket_number = ").push_bind(number.clone());
        }
        if let Some(action) = filter.action {
            query.push(" AND action = ").push_bind(action);
        }

        query
            .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(limit);

        let logs = query
            .build_query_as::<TicketLog>()
            .fetch_all(&self.pool)
            .await?;

        Ok(logs)
    }

    /// Counts entries with a given action.
    pub async fn count_by_action(&self, action: TicketLogAction) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ticket_logs WHERE action = ?1")
            .bind(action)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Inserts one audit entry on an open connection or transaction.
pub(crate) async fn insert_log(conn: &mut SqliteConnection, log: &TicketLog) -> DbResult<()> {
    debug!(
        ticket_number = %log.ticket_number,
        action = log.action.as_str(),
        "Appending ticket log"
    );

    sqlx::query(
        r#"
        INSERT INTO ticket_logs (
            id, ticket_number, action, email, quantity, total_amount_cents,
            cancelled_by, cancelled_at, reason, original_purchase_date, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&log.id)
    .bind(&log.ticket_number)
    .bind(log.action)
    .bind(&log.email)
    .bind(log.quantity)
    .bind(log.total_amount_cents)
    .bind(&log.cancelled_by)
    .bind(log.cancelled_at)
    .bind(&log.reason)
    .bind(log.original_purchase_date)
    .bind(log.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;
    use uuid::Uuid;

    fn entry(number: &str, action: TicketLogAction) -> TicketLog {
        let now = Utc::now();
        TicketLog {
            id: Uuid::new_v4().to_string(),
            ticket_number: number.to_string(),
            action,
            email: "buyer@example.com".to_string(),
            quantity: 1,
            total_amount_cents: 50,
            cancelled_by: None,
            cancelled_at: None,
            reason: None,
            original_purchase_date: now,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_filter() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.ticket_logs();

        repo.insert(&entry("20240116-00000001", TicketLogAction::Created))
            .await
            .unwrap();
        repo.insert(&entry("20240116-00000002", TicketLogAction::Created))
            .await
            .unwrap();
        repo.insert(&entry("20240116-00000001", TicketLogAction::WinnerDrawn))
            .await
            .unwrap();

        let history = repo.for_ticket("20240116-00000001").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, TicketLogAction::Created);

        let created = repo
            .list(&TicketLogFilter {
                action: Some(TicketLogAction::Created),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(created.len(), 2);

        let limited = repo
            .list(&TicketLogFilter {
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].action, TicketLogAction::WinnerDrawn);
    }

    #[tokio::test]
    async fn test_cancelled_entry_requires_reason() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let incomplete = entry("20240116-00000003", TicketLogAction::Cancelled);
        let err = db.ticket_logs().insert(&incomplete).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }
}
