//! Operator accounts and login.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use canteen_core::validation::{validate_password, validate_username};
use canteen_core::{CoreError, Role, User};
use canteen_db::password::{hash_password, verify_password};
use canteen_db::{Database, UserUpdate};

use crate::error::{ApiError, ApiResult};
use crate::rate_limit::LoginAttemptStore;

const MAX_LOGIN_USERNAME: usize = 50;
const MAX_LOGIN_PASSWORD: usize = 100;

/// Account management and credential checks.
#[derive(Clone)]
pub struct UserService {
    db: Database,
    attempts: Arc<dyn LoginAttemptStore>,
}

impl UserService {
    pub fn new(db: Database, attempts: Arc<dyn LoginAttemptStore>) -> Self {
        UserService { db, attempts }
    }

    /// Verifies credentials for `client` (the rate-limit key).
    ///
    /// Every rejection counts as a failure, including malformed input.
    /// The message never says whether the username exists.
    pub async fn login(&self, client: &str, username: &str, password: &str) -> ApiResult<User> {
        if let Some(remaining) = self
            .attempts
            .lockout_remaining(client)
            .await
            .map_err(ApiError::internal)?
        {
            warn!(client = %client, "Login refused, client locked out");
            return Err(ApiError::too_many_attempts(remaining.as_secs().max(1)));
        }

        let username = username.trim();
        if username.is_empty()
            || password.is_empty()
            || username.len() > MAX_LOGIN_USERNAME
            || password.len() > MAX_LOGIN_PASSWORD
        {
            self.record_failure(client).await?;
            return Err(ApiError::bad_request("Invalid credentials"));
        }

        let user = match self.db.users().get_by_username(username).await? {
            Some(user) if user.active && verify_password(password, &user.password_hash) => user,
            _ => {
                self.record_failure(client).await?;
                warn!(client = %client, username = %username, "Rejected login");
                return Err(ApiError::unauthorized("Invalid credentials"));
            }
        };

        self.attempts
            .clear(client)
            .await
            .map_err(ApiError::internal)?;

        let now = Utc::now();
        self.db.users().touch_last_login(&user.id, now).await?;
        info!(username = %user.username, role = user.role.as_str(), "Operator logged in");

        Ok(User {
            last_login_at: Some(now),
            ..user
        })
    }

    async fn record_failure(&self, client: &str) -> ApiResult<()> {
        self.attempts
            .record_failure(client)
            .await
            .map_err(ApiError::internal)?;
        Ok(())
    }

    pub async fn list(&self) -> ApiResult<Vec<User>> {
        Ok(self.db.users().list().await?)
    }

    pub async fn get(&self, id: &str) -> ApiResult<User> {
        self.db
            .users()
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::UserNotFound(id.to_string()).into())
    }

    pub async fn create(&self, username: &str, password: &str, role: Role) -> ApiResult<User> {
        let username = validate_username(username)?;
        validate_password(password)?;

        let hash = hash_password(password)?;
        Ok(self.db.users().create(&username, &hash, role).await?)
    }

    /// Partial update. The last active admin cannot be demoted or disabled.
    pub async fn update(&self, id: &str, mut update: UserUpdate) -> ApiResult<User> {
        if let Some(username) = &update.username {
            update.username = Some(validate_username(username)?);
        }

        let current = self.get(id).await?;
        let loses_admin = current.role.is_admin()
            && current.active
            && (update.role.is_some_and(|r| !r.is_admin()) || update.active == Some(false));
        if loses_admin {
            self.ensure_other_admin().await?;
        }

        Ok(self.db.users().update(id, &update).await?)
    }

    pub async fn change_password(&self, id: &str, password: &str) -> ApiResult<()> {
        validate_password(password)?;
        let hash = hash_password(password)?;
        self.db.users().set_password(id, &hash).await?;
        info!(id = %id, "Password changed");
        Ok(())
    }

    /// Deletes an account. Tickets it sold keep their attribution id.
    pub async fn delete(&self, id: &str, acting_user_id: &str) -> ApiResult<()> {
        if id == acting_user_id {
            return Err(ApiError::bad_request("You cannot delete your own account"));
        }

        let user = self.get(id).await?;
        if user.role.is_admin() && user.active {
            self.ensure_other_admin().await?;
        }

        Ok(self.db.users().delete(id).await?)
    }

    /// Creates the configured admin if no user has that name yet.
    ///
    /// ## Returns
    /// `true` if an account was created.
    pub async fn bootstrap_admin(&self, username: &str, password: &str) -> ApiResult<bool> {
        let username = validate_username(username)?;
        if self.db.users().get_by_username(&username).await?.is_some() {
            return Ok(false);
        }

        self.create(&username, password, Role::Admin).await?;
        info!(username = %username, "Bootstrap admin created");
        Ok(true)
    }

    async fn ensure_other_admin(&self) -> ApiResult<()> {
        if self.db.users().count_active_admins().await? <= 1 {
            return Err(ApiError::bad_request(
                "At least one active admin account must remain",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::rate_limit::{InMemoryLoginAttemptStore, LoginLimits};
    use axum::http::StatusCode;
    use canteen_db::DbConfig;
    use std::time::Duration;

    async fn service(max_attempts: u32) -> UserService {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store = InMemoryLoginAttemptStore::new(LoginLimits {
            max_attempts,
            lockout: Duration::from_secs(900),
        });
        UserService::new(db, Arc::new(store))
    }

    #[tokio::test]
    async fn test_login_and_lockout() {
        let svc = service(2).await;
        svc.create("alice", "correct-pass", Role::Seller).await.unwrap();

        let user = svc.login("1.2.3.4", "alice", "correct-pass").await.unwrap();
        assert!(user.last_login_at.is_some());

        let err = svc.login("1.2.3.4", "alice", "wrong").await.unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        let err = svc.login("1.2.3.4", "nobody", "wrong").await.unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);

        // Locked even with the right password
        let err = svc.login("1.2.3.4", "alice", "correct-pass").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TooManyAttempts);

        // Another client is unaffected
        assert!(svc.login("5.6.7.8", "alice", "correct-pass").await.is_ok());
    }

    #[tokio::test]
    async fn test_inactive_user_cannot_login() {
        let svc = service(5).await;
        let user = svc.create("bob", "correct-pass", Role::Seller).await.unwrap();
        svc.update(
            &user.id,
            UserUpdate {
                active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let err = svc.login("ip", "bob", "correct-pass").await.unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_last_admin_is_protected() {
        let svc = service(5).await;
        let admin = svc.create("root", "correct-pass", Role::Admin).await.unwrap();
        let seller = svc.create("alice", "correct-pass", Role::Seller).await.unwrap();

        let demote = UserUpdate {
            role: Some(Role::Seller),
            ..Default::default()
        };
        assert!(svc.update(&admin.id, demote).await.is_err());
        assert!(svc.delete(&admin.id, &seller.id).await.is_err());
        assert!(svc.delete(&admin.id, &admin.id).await.is_err());

        svc.delete(&seller.id, &admin.id).await.unwrap();
        assert_eq!(svc.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_admin_is_idempotent() {
        let svc = service(5).await;
        assert!(svc.bootstrap_admin("admin", "s3cret-pass").await.unwrap());
        assert!(!svc.bootstrap_admin("admin", "other-pass").await.unwrap());

        let user = svc.login("ip", "admin", "s3cret-pass").await.unwrap();
        assert_eq!(user.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let svc = service(5).await;
        assert!(svc.create("ab", "correct-pass", Role::Seller).await.is_err());
        assert!(svc.create("alice", "123", Role::Seller).await.is_err());
    }
}
