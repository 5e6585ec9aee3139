//! Publisher repository

use crate::db::DbPool;
use crate::models::{NewPublisher, Publisher};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait PublisherRepository: Send + Sync {
    async fn create(&self, input: &NewPublisher) -> Result<Publisher>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Publisher>>;

    /// Exact, case-sensitive name lookup
    async fn get_by_name(&self, name: &str) -> Result<Option<Publisher>>;

    /// All publishers ordered by name
    async fn list(&self) -> Result<Vec<Publisher>>;
}

pub struct SqlxPublisherRepository {
    pool: DbPool,
}

impl SqlxPublisherRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn PublisherRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PublisherRepository for SqlxPublisherRepository {
    async fn create(&self, input: &NewPublisher) -> Result<Publisher> {
        let now = Utc::now();
        let result = sqlx::query("INSERT INTO publishers (name, description, created_at) VALUES (?, ?, ?)")
            .bind(&input.name)
            .bind(&input.description)
            .bind(now)
            .execute(&self.pool)
            .await
            .context("Failed to create publisher")?;

        Ok(Publisher {
            id: result.last_insert_rowid(),
            name: input.name.clone(),
            description: input.description.clone(),
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Publisher>> {
        let row = sqlx::query("SELECT id, name, description, created_at FROM publishers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get publisher by ID")?;

        row.as_ref().map(row_to_publisher).transpose()
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Publisher>> {
        let row = sqlx::query("SELECT id, name, description, created_at FROM publishers WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get publisher by name")?;

        row.as_ref().map(row_to_publisher).transpose()
    }

    async fn list(&self) -> Result<Vec<Publisher>> {
        let rows = sqlx::query("SELECT id, name, description, created_at FROM publishers ORDER BY name, id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list publishers")?;

        rows.iter().map(row_to_publisher).collect()
    }
}

fn row_to_publisher(row: &sqlx::sqlite::SqliteRow) -> Result<Publisher> {
    Ok(Publisher {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::migrated_pool;

    #[tokio::test]
    async fn test_create_get_list() {
        let repo = SqlxPublisherRepository::new(migrated_pool().await);

        let planet = repo.create(&NewPublisher::new("Daily Planet", "Metropolis").unwrap()).await.unwrap();
        repo.create(&NewPublisher::new("Bugle", "").unwrap()).await.unwrap();

        let found = repo.get_by_id(planet.id).await.unwrap().unwrap();
        assert_eq!(found.description, "Metropolis");
        assert!(repo.get_by_name("Daily Planet").await.unwrap().is_some());
        assert!(repo.get_by_id(999).await.unwrap().is_none());

        let names: Vec<_> = repo.list().await.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Bugle", "Daily Planet"]);
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected_by_schema() {
        let repo = SqlxPublisherRepository::new(migrated_pool().await);
        let input = NewPublisher::new("Bugle", "").unwrap();
        repo.create(&input).await.unwrap();
        assert!(repo.create(&input).await.is_err());
    }
}
