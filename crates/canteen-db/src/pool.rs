//! # SQLite Pool
//!
//! One [`Database`] handle per process. It owns the `SqlitePool` and hands
//! out repositories, which are thin wrappers around a pool clone.
//!
//! ```text
//!   readers ─┐                       ┌─ GET /api/tickets, /stats, reports
//!            ├──► SqlitePool (WAL) ──┤
//!   writer ──┘    busy_timeout       └─ purchase, cancel, draw, config
//!                 one writer at a time, others wait
//! ```
//!
//! `:memory:` databases exist per connection, so [`DbConfig::in_memory`]
//! pins the pool to a single connection that never expires. Code running
//! against it must not hold a transaction while asking the pool for another
//! connection.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::ticket::TicketRepository;
use crate::repository::ticket_config::TicketConfigRepository;
use crate::repository::ticket_log::TicketLogRepository;
use crate::repository::user::UserRepository;

const IN_MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust
/// use canteen_db::DbConfig;
///
/// let config = DbConfig::new("./canteen.db")
///     .max_connections(8)
///     .run_migrations(true);
/// assert_eq!(config.max_connections, 8);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, or `:memory:`.
    pub database_path: PathBuf,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Pool acquire timeout.
    pub connect_timeout: Duration,
    /// How long a writer waits for the database lock.
    pub busy_timeout: Duration,
    pub idle_timeout: Duration,
    pub run_migrations: bool,
}

impl DbConfig {
    /// File-backed database, 5 connections, migrations on.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets how long writers wait on a locked database.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Private in-memory database for tests.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(IN_MEMORY_PATH),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
        }
    }

    fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY_PATH
    }
}

// =============================================================================
// Database
// =============================================================================

/// Shared database handle. Clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Creates the pool and, if configured, runs migrations.
    ///
    /// ## Errors
    /// - `ConnectionFailed` if the database can't be opened
    /// - `MigrationFailed` if migrations fail
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening database");

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout)
            .create_if_missing(true);

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout);

        pool_options = if config.is_in_memory() {
            pool_options.idle_timeout(None).max_lifetime(None)
        } else {
            pool_options.idle_timeout(Some(config.idle_timeout))
        };

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        debug!(
            max_connections = config.max_connections,
            in_memory = config.is_in_memory(),
            "Pool ready"
        );

        let db = Database { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // =========================================================================
    // Repositories
    // =========================================================================

    pub fn tickets(&self) -> TicketRepository {
        TicketRepository::new(self.pool.clone())
    }

    pub fn ticket_configs(&self) -> TicketConfigRepository {
        TicketConfigRepository::new(self.pool.clone())
    }

    /// Append-only audit trail.
    pub fn ticket_logs(&self) -> TicketLogRepository {
        TicketLogRepository::new(self.pool.clone())
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }

    /// Waits for checked-out connections and closes the pool.
    pub async fn close(&self) {
        info!("Closing database");
        self.pool.close().await;
    }

    /// `SELECT 1` round trip.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
