//! # Database Migrations
//!
//! The schema lives in the workspace `migrations/sqlite/` directory and is
//! compiled into the binary, so `canteen-server` and `init` never need the
//! SQL files at runtime.
//!
//! ```text
//!  20240116000001_initial_schema.sql
//!    tickets              UNIQUE ticket_number, winner/cancel CHECKs
//!    ticket_configs       partial UNIQUE index: one active row
//!    ticket_config_offers UNIQUE (config_id, quantity)
//!    ticket_logs          no FK to tickets (outlives purges)
//!    users                UNIQUE username
//! ```
//!
//! Applied migrations are recorded in `_sqlx_migrations`. New schema
//! changes go in a new timestamped file; applied files are never edited.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies every migration not yet recorded.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    let (embedded, applied) = migration_status(pool).await?;
    debug!(embedded, applied, "Migration state before run");

    MIGRATOR.run(pool).await?;

    if applied < embedded {
        info!(count = embedded - applied, "Applied pending migrations");
    }
    Ok(())
}

/// Returns `(embedded, applied)` migration counts.
///
/// A fresh database has no `_sqlx_migrations` table yet and reports zero.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let has_table: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;

    let applied: i64 = if has_table > 0 {
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?
    } else {
        0
    };

    Ok((MIGRATOR.migrations.len(), applied.max(0) as usize))
}
