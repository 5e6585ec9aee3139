//! User repository
//!
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing it on SQLite

use crate::db::DbPool;
use crate::models::{Role, User};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user, returning it with its assigned id
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// First user (lowest id) with this email, compared case-insensitively
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Persist every mutable field of `user`
    async fn update(&self, user: &User) -> Result<User>;

    /// List users ordered by username, optionally limited to one role
    async fn list(&self, role: Option<Role>) -> Result<Vec<User>>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DbPool,
}

impl SqlxUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DbPool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        create_user(&self.pool, user).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        get_user_by_id(&self.pool, id).await
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        get_user_by_username(&self.pool, username).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        get_user_by_email(&self.pool, email).await
    }

    async fn update(&self, user: &User) -> Result<User> {
        update_user(&self.pool, user).await
    }

    async fn list(&self, role: Option<Role>) -> Result<Vec<User>> {
        list_users(&self.pool, role).await
    }
}

const USER_COLUMNS: &str =
    "id, username, email, password_hash, role, is_active, created_at, updated_at";

async fn create_user(pool: &DbPool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, role, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role.as_str())
    .bind(user.is_active)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn get_user_by_id(pool: &DbPool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.as_ref().map(row_to_user).transpose()
}

async fn get_user_by_username(pool: &DbPool, username: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS))
        .bind(username)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by username")?;

    row.as_ref().map(row_to_user).transpose()
}

async fn get_user_by_email(pool: &DbPool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM users WHERE email <> '' AND lower(email) = lower(?) ORDER BY id LIMIT 1",
        USER_COLUMNS
    ))
    .bind(email.trim())
    .fetch_optional(pool)
    .await
    .context("Failed to get user by email")?;

    row.as_ref().map(row_to_user).transpose()
}

async fn update_user(pool: &DbPool, user: &User) -> Result<User> {
    let now = Utc::now();

    sqlx::query(
        r#"
        UPDATE users
        SET username = ?, email = ?, password_hash = ?, role = ?, is_active = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role.as_str())
    .bind(user.is_active)
    .bind(now)
    .bind(user.id)
    .execute(pool)
    .await
    .context("Failed to update user")?;

    Ok(User {
        updated_at: now,
        ..user.clone()
    })
}

async fn list_users(pool: &DbPool, role: Option<Role>) -> Result<Vec<User>> {
    let rows = match role {
        Some(role) => {
            sqlx::query(&format!(
                "SELECT {} FROM users WHERE role = ? ORDER BY username",
                USER_COLUMNS
            ))
            .bind(role.as_str())
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query(&format!("SELECT {} FROM users ORDER BY username", USER_COLUMNS))
                .fetch_all(pool)
                .await
        }
    }
    .context("Failed to list users")?;

    rows.iter().map(row_to_user).collect()
}

pub(crate) fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let role_str: String = row.try_get("role")?;
    let role = Role::resolve(&role_str)
        .with_context(|| format!("Unknown role stored for user: {}", role_str))?;

    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::migrated_pool;

    async fn setup_test_repo() -> SqlxUserRepository {
        SqlxUserRepository::new(migrated_pool().await)
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let repo = setup_test_repo().await;

        let user = User::new("clark".into(), "clark@planet.test".into(), "hash".into(), Role::Journalist);
        let created = repo.create(&user).await.unwrap();
        assert!(created.id > 0);

        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.username, "clark");
        assert_eq!(found.role, Role::Journalist);
        assert!(found.is_active);

        let by_name = repo.get_by_username("clark").await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);
    }

    #[tokio::test]
    async fn test_username_is_unique() {
        let repo = setup_test_repo().await;

        let user = User::new("lois".into(), String::new(), "hash".into(), Role::Reader);
        repo.create(&user).await.unwrap();
        assert!(repo.create(&user).await.is_err());
    }

    #[tokio::test]
    async fn test_get_by_email_ignores_case_and_blank() {
        let repo = setup_test_repo().await;

        repo.create(&User::new("a".into(), String::new(), "h".into(), Role::Reader))
            .await
            .unwrap();
        repo.create(&User::new("b".into(), "Lois@Planet.test".into(), "h".into(), Role::Reader))
            .await
            .unwrap();

        let found = repo.get_by_email(" lois@planet.test ").await.unwrap().unwrap();
        assert_eq!(found.username, "b");
        assert!(repo.get_by_email("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_role_and_activation() {
        let repo = setup_test_repo().await;

        let mut user = User::new("perry".into(), String::new(), "h".into(), Role::Journalist);
        user.is_active = false;
        let mut user = repo.create(&user).await.unwrap();

        user.role = Role::Editor;
        user.is_active = true;
        repo.update(&user).await.unwrap();

        let found = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(found.role, Role::Editor);
        assert!(found.is_active);
        assert_eq!(found.group_memberships().len(), 1);
    }

    #[tokio::test]
    async fn test_list_by_role() {
        let repo = setup_test_repo().await;
        for (name, role) in [("zed", Role::Journalist), ("amy", Role::Journalist), ("rob", Role::Reader)] {
            repo.create(&User::new(name.into(), String::new(), "h".into(), role))
                .await
                .unwrap();
        }

        let journalists = repo.list(Some(Role::Journalist)).await.unwrap();
        let names: Vec<_> = journalists.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["amy", "zed"]);
        assert_eq!(repo.list(None).await.unwrap().len(), 3);
    }
}
