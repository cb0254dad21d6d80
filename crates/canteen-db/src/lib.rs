//! # canteen-db
//!
//! SQLite storage for tickets, ticket configurations, the ticket audit log
//! and operator accounts.
//!
//! ```text
//!   TicketService / UserService (canteen-server)
//!            │
//!            ▼
//!   Database ──► tickets()         batch insert, guarded cancel/draw, reports
//!      │     ──► ticket_configs()  versioned pricing, one active row
//!      │     ──► ticket_logs()     append-only audit
//!      │     ──► users()           operators, argon2 hashes
//!      ▼
//!   SqlitePool ──► canteen.db (schema embedded from migrations/sqlite)
//! ```
//!
//! Multi-row writes (a purchase batch with its audit rows, a config
//! replacement) run in one transaction. State changes on a single ticket are
//! guarded `UPDATE ... WHERE` statements, so a lost race shows up as zero
//! affected rows instead of a silent overwrite.
//!
//! ## Usage Example
//! ```rust,no_run
//! use canteen_db::{Database, DbConfig};
//!
//! # async fn example() -> Result<(), canteen_db::DbError> {
//! let db = Database::new(DbConfig::new("./canteen.db")).await?;
//!
//! let pricing = db.ticket_configs().active_pricing().await?;
//! println!("Single ticket costs {}", pricing.price_for(1));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod migrations;
pub mod password;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::ticket::{TicketFilter, TicketPage, TicketRepository};
pub use repository::ticket_config::TicketConfigRepository;
pub use repository::ticket_log::{TicketLogFilter, TicketLogRepository};
pub use repository::user::{UserRepository, UserUpdate};
