//! Login attempt limiting.
//!
//! Failed logins are counted per client IP. After `max_attempts` failures
//! the key is locked for `lockout`; every failure restarts the lockout
//! window and a successful login clears the key.
//!
//! The store is injected into [`AppState`](crate::AppState):
//! [`InMemoryLoginAttemptStore`] for a single process,
//! [`RedisLoginAttemptStore`] when several server processes share the
//! counters.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Login store failures (only the Redis store can fail).
#[derive(Debug, thiserror::Error)]
pub enum LoginStoreError {
    #[error("Login attempt store unavailable: {0}")]
    Unavailable(String),
}

/// Limits shared by every store implementation.
#[derive(Debug, Clone, Copy)]
pub struct LoginLimits {
    pub max_attempts: u32,
    pub lockout: Duration,
}

impl Default for LoginLimits {
    fn default() -> Self {
        LoginLimits {
            max_attempts: 5,
            lockout: Duration::from_secs(15 * 60),
        }
    }
}

/// Failed-login bookkeeping keyed by client identifier.
#[async_trait]
pub trait LoginAttemptStore: Send + Sync {
    /// Remaining lockout for `key`, or `None` if it may try again.
    async fn lockout_remaining(&self, key: &str) -> Result<Option<Duration>, LoginStoreError>;

    /// Records a failure and returns the failure count.
    async fn record_failure(&self, key: &str) -> Result<u32, LoginStoreError>;

    /// Forgets every failure for `key`.
    async fn clear(&self, key: &str) -> Result<(), LoginStoreError>;
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Debug)]
struct AttemptState {
    failures: u32,
    locked_until: Instant,
}

/// Process-local store.
#[derive(Debug)]
pub struct InMemoryLoginAttemptStore {
    limits: LoginLimits,
    attempts: Mutex<HashMap<String, AttemptState>>,
}

impl InMemoryLoginAttemptStore {
    pub fn new(limits: LoginLimits) -> Self {
        InMemoryLoginAttemptStore {
            limits,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Number of clients currently tracked.
    pub async fn tracked(&self) -> usize {
        self.attempts.lock().await.len()
    }
}

#[async_trait]
impl LoginAttemptStore for InMemoryLoginAttemptStore {
    async fn lockout_remaining(&self, key: &str) -> Result<Option<Duration>, LoginStoreError> {
        let mut attempts = self.attempts.lock().await;
        let now = Instant::now();

        let Some(state) = attempts.get(key) else {
            return Ok(None);
        };

        if now >= state.locked_until {
            // Window elapsed: start over
            attempts.remove(key);
            return Ok(None);
        }

        if state.failures >= self.limits.max_attempts {
            return Ok(Some(state.locked_until - now));
        }

        Ok(None)
    }

    async fn record_failure(&self, key: &str) -> Result<u32, LoginStoreError> {
        let mut attempts = self.attempts.lock().await;
        let now = Instant::now();

        // Drop every elapsed window, including one-off clients that never return
        attempts.retain(|_, state| now < state.locked_until);

        let state = attempts.entry(key.to_string()).or_insert(AttemptState {
            failures: 0,
            locked_until: now,
        });
        state.failures += 1;
        state.locked_until = now + self.limits.lockout;

        debug!(key = %key, failures = state.failures, "Login failure recorded");
        Ok(state.failures)
    }

    async fn clear(&self, key: &str) -> Result<(), LoginStoreError> {
        self.attempts.lock().await.remove(key);
        Ok(())
    }
}

// =============================================================================
// Redis store
// =============================================================================

/// Shared store: one counter per key, expiring after the lockout window.
#[derive(Clone)]
pub struct RedisLoginAttemptStore {
    limits: LoginLimits,
    conn_manager: ConnectionManager,
}

impl RedisLoginAttemptStore {
    /// Connects to Redis.
    pub async fn new(redis_url: &str, limits: LoginLimits) -> Result<Self, LoginStoreError> {
        let client = Client::open(redis_url)
            .map_err(|e| LoginStoreError::Unavailable(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            LoginStoreError::Unavailable(format!("Failed to create Redis connection manager: {e}"))
        })?;

        Ok(RedisLoginAttemptStore {
            limits,
            conn_manager,
        })
    }

    fn attempts_key(key: &str) -> String {
        format!("canteen:login_attempts:{key}")
    }
}

fn redis_error(e: redis::RedisError) -> LoginStoreError {
    warn!(error = %e, "Redis login store error");
    LoginStoreError::Unavailable(e.to_string())
}

#[async_trait]
impl LoginAttemptStore for RedisLoginAttemptStore {
    async fn lockout_remaining(&self, key: &str) -> Result<Option<Duration>, LoginStoreError> {
        let mut conn = self.conn_manager.clone();
        let redis_key = Self::attempts_key(key);

        let failures: Option<u32> = conn.get(&redis_key).await.map_err(redis_error)?;
        if failures.unwrap_or(0) < self.limits.max_attempts {
            return Ok(None);
        }

        let ttl: i64 = conn.ttl(&redis_key).await.map_err(redis_error)?;
        if ttl <= 0 {
            return Ok(None);
        }

        Ok(Some(Duration::from_secs(ttl as u64)))
    }

    async fn record_failure(&self, key: &str) -> Result<u32, LoginStoreError> {
        let mut conn = self.conn_manager.clone();
        let redis_key = Self::attempts_key(key);
        let lockout_secs = self.limits.lockout.as_secs() as i64;

        let (failures,): (u32,) = redis::pipe()
            .atomic()
            .incr(&redis_key, 1)
            .expire(&redis_key, lockout_secs)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;

        debug!(key = %key, failures, "Login failure recorded");
        Ok(failures)
    }

    async fn clear(&self, key: &str) -> Result<(), LoginStoreError> {
        let mut conn = self.conn_manager.clone();
        let _: () = conn
            .del(Self::attempts_key(key))
            .await
            .map_err(redis_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_attempts: u32, lockout: Duration) -> LoginLimits {
        LoginLimits {
            max_attempts,
            lockout,
        }
    }

    #[tokio::test]
    async fn test_locks_after_max_failures() {
        let store = InMemoryLoginAttemptStore::new(limits(3, Duration::from_secs(60)));

        for expected in 1..=2 {
            assert_eq!(store.record_failure("10.0.0.1").await.unwrap(), expected);
            assert!(store.lockout_remaining("10.0.0.1").await.unwrap().is_none());
        }

        store.record_failure("10.0.0.1").await.unwrap();
        let remaining = store.lockout_remaining("10.0.0.1").await.unwrap().unwrap();
        assert!(remaining <= Duration::from_secs(60));

        // Other clients are unaffected
        assert!(store.lockout_remaining("10.0.0.2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_resets_counter() {
        let store = InMemoryLoginAttemptStore::new(limits(2, Duration::from_secs(60)));
        store.record_failure("ip").await.unwrap();
        store.record_failure("ip").await.unwrap();
        assert!(store.lockout_remaining("ip").await.unwrap().is_some());

        store.clear("ip").await.unwrap();
        assert!(store.lockout_remaining("ip").await.unwrap().is_none());
        assert_eq!(store.record_failure("ip").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_lockout_expires() {
        let store = InMemoryLoginAttemptStore::new(limits(1, Duration::from_millis(20)));
        store.record_failure("ip").await.unwrap();
        assert!(store.lockout_remaining("ip").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.lockout_remaining("ip").await.unwrap().is_none());
        assert_eq!(store.record_failure("ip").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_expired_clients_are_pruned() {
        let store = InMemoryLoginAttemptStore::new(limits(5, Duration::from_millis(20)));
        for ip in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
            store.record_failure(ip).await.unwrap();
        }
        assert_eq!(store.tracked().await, 3);

        tokio::time::sleep(Duration::from_millis(40)).await;
        store.record_failure("10.0.0.4").await.unwrap();
        assert_eq!(store.tracked().await, 1);
    }
}
