//! Server configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Canteen server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,

    /// SQLite database file
    pub db_path: String,

    /// Pool size
    pub db_max_connections: u32,

    /// JWT secret key for signing tokens
    pub jwt_secret: String,

    /// JWT lifetime in seconds (also the cookie max-age)
    pub jwt_lifetime_secs: i64,

    /// Redis connection string; selects the shared login-attempt store
    pub redis_url: Option<String>,

    /// Failed logins per client IP before lockout
    pub login_max_attempts: u32,

    /// Lockout duration in seconds
    pub login_lockout_secs: u64,

    /// Bootstrap admin account, created on start when both are set
    pub admin_username: Option<String>,
    #[serde(skip_serializing)]
    pub admin_password: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config = ServerConfig {
            http_port: parse_var("CANTEEN_HTTP_PORT", 3000)?,

            db_path: env::var("CANTEEN_DB_PATH").unwrap_or_else(|_| "./canteen.db".to_string()),

            db_max_connections: parse_var("CANTEEN_DB_MAX_CONNECTIONS", 5)?,

            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| "canteen-dev-secret-change-in-production".to_string()),

            jwt_lifetime_secs: parse_var("JWT_LIFETIME_SECS", 8 * 60 * 60)?, // 8 hours

            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),

            login_max_attempts: parse_var("LOGIN_MAX_ATTEMPTS", 5)?,

            login_lockout_secs: parse_var("LOGIN_LOCKOUT_SECS", 15 * 60)?, // 15 minutes

            admin_username: env::var("ADMIN_USERNAME").ok(),

            admin_password: env::var("ADMIN_PASSWORD").ok(),
        };

        if config.jwt_lifetime_secs <= 0 {
            return Err(ConfigError::InvalidValue("JWT_LIFETIME_SECS".to_string()));
        }
        if config.login_max_attempts == 0 {
            return Err(ConfigError::InvalidValue("LOGIN_MAX_ATTEMPTS".to_string()));
        }

        Ok(config)
    }

    /// Configuration for tests: in-memory friendly values, no Redis.
    pub fn for_tests() -> Self {
        ServerConfig {
            http_port: 0,
            db_path: ":memory:".to_string(),
            db_max_connections: 1,
            jwt_secret: "test-secret".to_string(),
            jwt_lifetime_secs: 3600,
            redis_url: None,
            login_max_attempts: 5,
            login_lockout_secs: 900,
            admin_username: None,
            admin_password: None,
        }
    }

    pub fn login_lockout(&self) -> Duration {
        Duration::from_secs(self.login_lockout_secs)
    }

    /// Admin credentials, if both halves are configured.
    pub fn bootstrap_admin(&self) -> Option<(&str, &str)> {
        match (&self.admin_username, &self.admin_password) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
                Some((user.as_str(), pass.as_str()))
            }
            _ => None,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
