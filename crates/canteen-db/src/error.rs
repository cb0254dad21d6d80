//! # Database Error Types
//!
//! ```text
//!  sqlx::Error ──► DbError ──► ApiError (canteen-server)
//!
//!  constraint kind       DbError              HTTP
//!  ───────────────       ───────              ────
//!  UNIQUE                UniqueViolation      409 (username: "already taken")
//!  CHECK                 CheckViolation       409 (lost a race on a ticket)
//!  FOREIGN KEY           ForeignKeyViolation  500
//!  row missing           NotFound             404
//!  pool / io / migrate   infrastructure       500, logged only
//! ```
//!
//! Constraint errors are classified with [`sqlx::error::ErrorKind`], not by
//! matching message text; the message is only mined for the column name.

use sqlx::error::ErrorKind;
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE index rejected the row.
    ///
    /// Ticket numbers, usernames and the single active ticket
    /// configuration are all guarded this way.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// A CHECK constraint rejected the row (for example a cancelled winner).
    #[error("Constraint violation: {message}")]
    CheckViolation { message: String },

    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// The database file could not be opened or created.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    fn from_database(db_err: &dyn sqlx::error::DatabaseError) -> Self {
        let message = db_err.message().to_string();

        match db_err.kind() {
            // "UNIQUE constraint failed: tickets.ticket_number"
            ErrorKind::UniqueViolation => DbError::UniqueViolation {
                field: message
                    .rsplit(": ")
                    .next()
                    .unwrap_or("unknown")
                    .to_string(),
                value: "unknown".to_string(),
            },
            ErrorKind::CheckViolation => DbError::CheckViolation { message },
            ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation { message },
            _ => DbError::QueryFailed(message),
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),
            sqlx::Error::Database(db_err) => DbError::from_database(&*db_err),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
