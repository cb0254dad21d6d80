//! # User Repository
//!
//! Operator accounts. Passwords arrive here already hashed
//! (see [`crate::password`]).
//!
//! Deleting a user leaves the tickets they sold untouched: `sold_by` is a
//! weak reference and reports fall back to the raw id.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use canteen_core::{Role, User};

const USER_COLUMNS: &str =
    "id, username, password_hash, role, active, last_login_at, created_at, updated_at";

/// Partial update of an account. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.role.is_none() && self.active.is_none()
    }
}

/// Repository for operator accounts.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Creates an active account.
    ///
    /// ## Errors
    /// `UniqueViolation` if the username is taken.
    pub async fn create(&self, username: &str, password_hash: &str, role: Role) -> DbResult<User> {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role,
            active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO users (id, username, password_hash, role, active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("username", username),
            other => other,
        })?;

        info!(id = %user.id, username = %user.username, role = role.as_str(), "User created");
        Ok(user)
    }

    /// Gets a user by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");

        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Gets a user by username (exact match).
    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");

        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// All accounts ordered by username.
    pub async fn list(&self) -> DbResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY username");

        let users = sqlx::query_as::<_, User>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    /// Applies a partial update and returns the updated account.
    pub async fn update(&self, id: &str, update: &UserUpdate) -> DbResult<User> {
        if !update.is_empty() {
            let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET updated_at = ");
            query.push_bind(Utc::now());

            if let Some(username) = &update.username {
                query.push(", username = ").push_bind(username.clone());
            }
            if let Some(role) = update.role {
                query.push(", role = ").push_bind(role);
            }
            if let Some(active) = update.active {
                query.push(", active = ").push_bind(active);
            }

            query.push(" WHERE id = ").push_bind(id.to_string());

            let result = query.build().execute(&self.pool).await.map_err(|e| {
                match (DbError::from(e), &update.username) {
                    (DbError::UniqueViolation { .. }, Some(name)) => {
                        DbError::duplicate("username", name.as_str())
                    }
                    (other, _) => other,
                }
            })?;

            if result.rows_affected() == 0 {
                return Err(DbError::not_found("User", id));
            }

            debug!(id = %id, "User updated");
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))
    }

    /// Replaces the stored password hash.
    pub async fn set_password(&self, id: &str, password_hash: &str) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(password_hash)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        Ok(())
    }

    /// Deletes an account.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        info!(id = %id, "User deleted");
        Ok(())
    }

    /// Records a successful login.
    pub async fn touch_last_login(&self, id: &str, at: DateTime<Utc>) -> DbResult<()> {
        sqlx::query("UPDATE users SET last_login_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Number of active admin accounts.
    pub async fn count_active_admins(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin' AND active = 1")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Total number of accounts.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let db = setup().await;
        let repo = db.users();

        let created = repo.create("alice", "hash", Role::Seller).await.unwrap();
        assert!(created.active);

        let by_name = repo.get_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);
        assert_eq!(by_name.role, Role::Seller);
        assert_eq!(by_name.password_hash, "hash");

        assert!(repo.get_by_username("bob").await.unwrap().is_none());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let db = setup().await;
        let repo = db.users();

        repo.create("alice", "hash", Role::Seller).await.unwrap();
        let err = repo.create("alice", "other", Role::Admin).await.unwrap_err();

        match err {
            DbError::UniqueViolation { field, value } => {
                assert_eq!(field, "username");
                assert_eq!(value, "alice");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_password_and_delete() {
        let db = setup().await;
        let repo = db.users();
        let user = repo.create("alice", "hash", Role::Seller).await.unwrap();
        repo.create("admin", "hash", Role::Admin).await.unwrap();

        let updated = repo
            .update(
                &user.id,
                &UserUpdate {
                    role: Some(Role::Admin),
                    active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.role, Role::Admin);
        assert!(!updated.active);
        assert_eq!(updated.username, "alice");
        assert_eq!(repo.count_active_admins().await.unwrap(), 1);

        let clash = repo
            .update(
                &user.id,
                &UserUpdate {
                    username: Some("admin".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(clash, Err(DbError::UniqueViolation { .. })));

        repo.set_password(&user.id, "new-hash").await.unwrap();
        let reloaded = repo.get_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.password_hash, "new-hash");

        repo.touch_last_login(&user.id, Utc::now()).await.unwrap();
        assert!(repo
            .get_by_id(&user.id)
            .await
            .unwrap()
            .unwrap()
            .last_login_at
            .is_some());

        repo.delete(&user.id).await.unwrap();
        assert!(matches!(
            repo.delete(&user.id).await,
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(
            repo.update("missing", &UserUpdate::default()).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
