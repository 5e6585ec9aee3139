//! Newsletter repository
//!
//! A newsletter row and its article links are always written together in
//! one transaction.

use crate::db::DbPool;
use crate::models::{ListParams, NewNewsletter, Newsletter, NewsletterChanges, PagedResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, Sqlite, Transaction};
use std::sync::Arc;

#[async_trait]
pub trait NewsletterRepository: Send + Sync {
    async fn create(&self, input: &NewNewsletter) -> Result<Newsletter>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Newsletter>>;

    /// List newest first
    async fn list(&self, params: &ListParams) -> Result<PagedResult<Newsletter>>;

    /// Apply validated changes; a supplied article list replaces the links
    async fn update(&self, id: i64, changes: &NewsletterChanges) -> Result<Option<Newsletter>>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxNewsletterRepository {
    pool: DbPool,
}

impl SqlxNewsletterRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn NewsletterRepository> {
        Arc::new(Self::new(pool))
    }

    async fn load(&self, row: &sqlx::sqlite::SqliteRow) -> Result<Newsletter> {
        let id: i64 = row.try_get("id")?;
        let links = sqlx::query(
            "SELECT article_id FROM newsletter_articles WHERE newsletter_id = ? ORDER BY article_id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load newsletter articles")?;

        let article_ids = links
            .iter()
            .map(|link| link.try_get::<i64, _>("article_id"))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Newsletter {
            id,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            author_id: row.try_get("author_id")?,
            author_username: row.try_get("author_username")?,
            article_ids,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

const NEWSLETTER_SELECT: &str = r#"
    SELECT n.id, n.title, n.description, n.author_id, u.username AS author_username,
           n.created_at, n.updated_at
    FROM newsletters n
    JOIN users u ON u.id = n.author_id
"#;

async fn replace_links(
    tx: &mut Transaction<'_, Sqlite>,
    newsletter_id: i64,
    article_ids: &[i64],
) -> Result<()> {
    sqlx::query("DELETE FROM newsletter_articles WHERE newsletter_id = ?")
        .bind(newsletter_id)
        .execute(&mut **tx)
        .await
        .context("Failed to clear newsletter articles")?;

    for article_id in article_ids {
        sqlx::query("INSERT INTO newsletter_articles (newsletter_id, article_id) VALUES (?, ?)")
            .bind(newsletter_id)
            .bind(article_id)
            .execute(&mut **tx)
            .await
            .with_context(|| format!("Failed to link article {}", article_id))?;
    }
    Ok(())
}

#[async_trait]
impl NewsletterRepository for SqlxNewsletterRepository {
    async fn create(&self, input: &NewNewsletter) -> Result<Newsletter> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let result = sqlx::query(
            "INSERT INTO newsletters (title, description, author_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.author_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create newsletter")?;
        let id = result.last_insert_rowid();

        replace_links(&mut tx, id, &input.article_ids).await?;
        tx.commit().await.context("Failed to commit newsletter")?;

        self.get_by_id(id)
            .await?
            .context("Newsletter vanished after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Newsletter>> {
        let row = sqlx::query(&format!("{} WHERE n.id = ?", NEWSLETTER_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get newsletter")?;

        match row {
            Some(row) => Ok(Some(self.load(&row).await?)),
            None => Ok(None),
        }
    }

    async fn list(&self, params: &ListParams) -> Result<PagedResult<Newsletter>> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS n FROM newsletters")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count newsletters")?
            .try_get("n")?;

        let rows = sqlx::query(&format!(
            "{} ORDER BY n.created_at DESC, n.id DESC LIMIT ? OFFSET ?",
            NEWSLETTER_SELECT
        ))
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list newsletters")?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(self.load(row).await?);
        }
        Ok(PagedResult::new(items, total, params))
    }

    async fn update(&self, id: i64, changes: &NewsletterChanges) -> Result<Option<Newsletter>> {
        let Some(current) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query("UPDATE newsletters SET title = ?, description = ?, updated_at = ? WHERE id = ?")
            .bind(changes.title.as_ref().unwrap_or(&current.title))
            .bind(changes.description.as_ref().unwrap_or(&current.description))
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to update newsletter")?;

        if let Some(article_ids) = &changes.article_ids {
            replace_links(&mut tx, id, article_ids).await?;
        }
        tx.commit().await.context("Failed to commit newsletter")?;

        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM newsletters WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete newsletter")?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{migrated_pool, seed_article, seed_user};
    use crate::models::Role;

    #[tokio::test]
    async fn test_create_with_links() {
        let pool = migrated_pool().await;
        let clark = seed_user(&pool, "clark", "", Role::Journalist).await;
        let a = seed_article(&pool, &clark, "A", None).await;
        let b = seed_article(&pool, &clark, "B", None).await;
        let repo = SqlxNewsletterRepository::new(pool);

        let input = NewNewsletter::new(&clark, "Weekly", "Digest", vec![b.id, a.id]).unwrap();
        let newsletter = repo.create(&input).await.unwrap();

        assert_eq!(newsletter.author_username, "clark");
        assert_eq!(newsletter.article_ids, vec![a.id, b.id]);
        assert_eq!(newsletter.article_count(), 2);
    }

    #[tokio::test]
    async fn test_create_with_unknown_article_rolls_back() {
        let pool = migrated_pool().await;
        let clark = seed_user(&pool, "clark", "", Role::Journalist).await;
        let repo = SqlxNewsletterRepository::new(pool);

        let input = NewNewsletter::new(&clark, "Weekly", "", vec![404]).unwrap();
        assert!(repo.create(&input).await.is_err());

        let listed = repo.list(&ListParams::default()).await.unwrap();
        assert_eq!(listed.total, 0);
    }

    #[tokio::test]
    async fn test_update_replaces_links() {
        let pool = migrated_pool().await;
        let clark = seed_user(&pool, "clark", "", Role::Journalist).await;
        let a = seed_article(&pool, &clark, "A", None).await;
        let b = seed_article(&pool, &clark, "B", None).await;
        let repo = SqlxNewsletterRepository::new(pool);

        let newsletter = repo
            .create(&NewNewsletter::new(&clark, "Weekly", "", vec![a.id]).unwrap())
            .await
            .unwrap();

        let renamed = repo
            .update(newsletter.id, &NewsletterChanges { title: Some("Daily".into()), ..Default::default() })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renamed.title, "Daily");
        assert_eq!(renamed.article_ids, vec![a.id]);

        let relinked = repo
            .update(newsletter.id, &NewsletterChanges { article_ids: Some(vec![b.id]), ..Default::default() })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(relinked.article_ids, vec![b.id]);
    }

    #[tokio::test]
    async fn test_deleting_article_drops_link() {
        let pool = migrated_pool().await;
        let clark = seed_user(&pool, "clark", "", Role::Journalist).await;
        let a = seed_article(&pool, &clark, "A", None).await;
        let repo = SqlxNewsletterRepository::new(pool.clone());

        let newsletter = repo
            .create(&NewNewsletter::new(&clark, "Weekly", "", vec![a.id]).unwrap())
            .await
            .unwrap();

        sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(a.id)
            .execute(&pool)
            .await
            .unwrap();

        let reloaded = repo.get_by_id(newsletter.id).await.unwrap().unwrap();
        assert!(reloaded.article_ids.is_empty());

        assert!(repo.delete(newsletter.id).await.unwrap());
        assert!(repo.get_by_id(newsletter.id).await.unwrap().is_none());
    }
}
