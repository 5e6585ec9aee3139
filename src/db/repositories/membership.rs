//! Publisher membership repository

use crate::db::DbPool;
use crate::models::{MemberRole, MembershipFilter, NewMembership, PublisherMembership};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Row, Sqlite};
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait MembershipRepository: Send + Sync {
    async fn create(&self, input: &NewMembership) -> Result<PublisherMembership>;

    async fn get_by_id(&self, id: i64) -> Result<Option<PublisherMembership>>;

    /// Whether this exact (publisher, user, member_role) triple exists
    async fn exists(&self, input: &NewMembership) -> Result<bool>;

    /// Memberships ordered by publisher name, then username
    async fn list(&self, filter: &MembershipFilter) -> Result<Vec<PublisherMembership>>;
}

pub struct SqlxMembershipRepository {
    pool: DbPool,
}

impl SqlxMembershipRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn MembershipRepository> {
        Arc::new(Self::new(pool))
    }
}

const MEMBERSHIP_SELECT: &str = r#"
    SELECT m.id, m.publisher_id, p.name AS publisher_name, m.user_id, u.username,
           m.member_role, m.created_at
    FROM publisher_memberships m
    JOIN publishers p ON p.id = m.publisher_id
    JOIN users u ON u.id = m.user_id
"#;

#[async_trait]
impl MembershipRepository for SqlxMembershipRepository {
    async fn create(&self, input: &NewMembership) -> Result<PublisherMembership> {
        let result = sqlx::query(
            "INSERT INTO publisher_memberships (publisher_id, user_id, member_role, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(input.publisher_id)
        .bind(input.user_id)
        .bind(input.member_role.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to create publisher membership")?;

        self.get_by_id(result.last_insert_rowid())
            .await?
            .context("Membership vanished after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<PublisherMembership>> {
        let row = sqlx::query(&format!("{} WHERE m.id = ?", MEMBERSHIP_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get publisher membership")?;

        row.as_ref().map(row_to_membership).transpose()
    }

    async fn exists(&self, input: &NewMembership) -> Result<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM publisher_memberships WHERE publisher_id = ? AND user_id = ? AND member_role = ?",
        )
        .bind(input.publisher_id)
        .bind(input.user_id)
        .bind(input.member_role.as_str())
        .fetch_one(&self.pool)
        .await
        .context("Failed to check publisher membership")?;

        Ok(row.try_get::<i64, _>("n")? > 0)
    }

    async fn list(&self, filter: &MembershipFilter) -> Result<Vec<PublisherMembership>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(MEMBERSHIP_SELECT);
        qb.push(" WHERE 1 = 1");
        if let Some(publisher_id) = filter.publisher_id {
            qb.push(" AND m.publisher_id = ").push_bind(publisher_id);
        }
        if let Some(user_id) = filter.user_id {
            qb.push(" AND m.user_id = ").push_bind(user_id);
        }
        if let Some(role) = filter.member_role {
            qb.push(" AND m.member_role = ").push_bind(role.as_str());
        }
        qb.push(" ORDER BY p.name, u.username, m.id");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list publisher memberships")?;

        rows.iter().map(row_to_membership).collect()
    }
}

fn row_to_membership(row: &sqlx::sqlite::SqliteRow) -> Result<PublisherMembership> {
    let role: String = row.try_get("member_role")?;
    Ok(PublisherMembership {
        id: row.try_get("id")?,
        publisher_id: row.try_get("publisher_id")?,
        publisher_name: row.try_get("publisher_name")?,
        user_id: row.try_get("user_id")?,
        username: row.try_get("username")?,
        member_role: MemberRole::from_str(&role)?,
        created_at: row.try_get("created_at")?,
    })
}
