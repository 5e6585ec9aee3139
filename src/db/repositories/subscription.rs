//! Subscription repository
//!
//! Publisher and journalist subscriptions share one repository since both
//! feed the same notification recipient query.

use crate::db::DbPool;
use crate::models::{
    JournalistSubscription, NewJournalistSubscription, NewPublisherSubscription,
    PublisherSubscription,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Create the subscription if absent; the flag reports whether it was new
    async fn subscribe_publisher(
        &self,
        input: &NewPublisherSubscription,
    ) -> Result<(PublisherSubscription, bool)>;

    /// Remove the pair if present, reporting whether a row was deleted
    async fn unsubscribe_publisher(&self, publisher_id: i64, reader_id: i64) -> Result<bool>;

    async fn get_publisher_subscription(&self, id: i64) -> Result<Option<PublisherSubscription>>;

    async fn delete_publisher_subscription(&self, id: i64) -> Result<bool>;

    /// Subscriptions newest first, optionally for one reader only
    async fn list_publisher_subscriptions(
        &self,
        reader_id: Option<i64>,
    ) -> Result<Vec<PublisherSubscription>>;

    async fn subscribe_journalist(
        &self,
        input: &NewJournalistSubscription,
    ) -> Result<(JournalistSubscription, bool)>;

    async fn unsubscribe_journalist(&self, journalist_id: i64, reader_id: i64) -> Result<bool>;

    async fn get_journalist_subscription(&self, id: i64) -> Result<Option<JournalistSubscription>>;

    async fn delete_journalist_subscription(&self, id: i64) -> Result<bool>;

    async fn list_journalist_subscriptions(
        &self,
        reader_id: Option<i64>,
    ) -> Result<Vec<JournalistSubscription>>;

    /// Raw email addresses of readers following the publisher (if any) or
    /// the journalist. Duplicates and blanks are left to the caller.
    async fn subscriber_emails(
        &self,
        publisher_id: Option<i64>,
        journalist_id: i64,
    ) -> Result<Vec<String>>;
}

pub struct SqlxSubscriptionRepository {
    pool: DbPool,
}

impl SqlxSubscriptionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DbPool) -> Arc<dyn SubscriptionRepository> {
        Arc::new(Self::new(pool))
    }
}

const PUBLISHER_SUB_SELECT: &str = r#"
    SELECT s.id, s.publisher_id, p.name AS publisher_name, s.reader_id,
           r.username AS reader_username, s.created_at
    FROM publisher_subscriptions s
    JOIN publishers p ON p.id = s.publisher_id
    JOIN users r ON r.id = s.reader_id
"#;

const JOURNALIST_SUB_SELECT: &str = r#"
    SELECT s.id, s.journalist_id, j.username AS journalist_username, s.reader_id,
           r.username AS reader_username, s.created_at
    FROM journalist_subscriptions s
    JOIN users j ON j.id = s.journalist_id
    JOIN users r ON r.id = s.reader_id
"#;

#[async_trait]
impl SubscriptionRepository for SqlxSubscriptionRepository {
    async fn subscribe_publisher(
        &self,
        input: &NewPublisherSubscription,
    ) -> Result<(PublisherSubscription, bool)> {
        let result = sqlx::query(
            r#"
            INSERT INTO publisher_subscriptions (publisher_id, reader_id, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT (publisher_id, reader_id) DO NOTHING
            "#,
        )
        .bind(input.publisher_id)
        .bind(input.reader_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to create publisher subscription")?;
        let created = result.rows_affected() == 1;

        let row = sqlx::query(&format!(
            "{} WHERE s.publisher_id = ? AND s.reader_id = ?",
            PUBLISHER_SUB_SELECT
        ))
        .bind(input.publisher_id)
        .bind(input.reader_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to load publisher subscription")?;

        Ok((row_to_publisher_sub(&row)?, created))
    }

    async fn unsubscribe_publisher(&self, publisher_id: i64, reader_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM publisher_subscriptions WHERE publisher_id = ? AND reader_id = ?")
            .bind(publisher_id)
            .bind(reader_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete publisher subscription")?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_publisher_subscription(&self, id: i64) -> Result<Option<PublisherSubscription>> {
        let row = sqlx::query(&format!("{} WHERE s.id = ?", PUBLISHER_SUB_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get publisher subscription")?;

        row.as_ref().map(row_to_publisher_sub).transpose()
    }

    async fn delete_publisher_subscription(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM publisher_subscriptions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete publisher subscription")?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_publisher_subscriptions(
        &self,
        reader_id: Option<i64>,
    ) -> Result<Vec<PublisherSubscription>> {
        let rows = sqlx::query(&format!(
            "{} WHERE (? IS NULL OR s.reader_id = ?) ORDER BY s.created_at DESC, s.id DESC",
            PUBLISHER_SUB_SELECT
        ))
        .bind(reader_id)
        .bind(reader_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list publisher subscriptions")?;

        rows.iter().map(row_to_publisher_sub).collect()
    }

    async fn subscribe_journalist(
        &self,
        input: &NewJournalistSubscription,
    ) -> Result<(JournalistSubscription, bool)> {
        let result = sqlx::query(
            r#"
            INSERT INTO journalist_subscriptions (journalist_id, reader_id, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT (journalist_id, reader_id) DO NOTHING
            "#,
        )
        .bind(input.journalist_id)
        .bind(input.reader_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to create journalist subscription")?;
        let created = result.rows_affected() == 1;

        let row = sqlx::query(&format!(
            "{} WHERE s.journalist_id = ? AND s.reader_id = ?",
            JOURNALIST_SUB_SELECT
        ))
        .bind(input.journalist_id)
        .bind(input.reader_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to load journalist subscription")?;

        Ok((row_to_journalist_sub(&row)?, created))
    }

    async fn unsubscribe_journalist(&self, journalist_id: i64, reader_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM journalist_subscriptions WHERE journalist_id = ? AND reader_id = ?")
            .bind(journalist_id)
            .bind(reader_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete journalist subscription")?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_journalist_subscription(&self, id: i64) -> Result<Option<JournalistSubscription>> {
        let row = sqlx::query(&format!("{} WHERE s.id = ?", JOURNALIST_SUB_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get journalist subscription")?;

        row.as_ref().map(row_to_journalist_sub).transpose()
    }

    async fn delete_journalist_subscription(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM journalist_subscriptions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete journalist subscription")?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_journalist_subscriptions(
        &self,
        reader_id: Option<i64>,
    ) -> Result<Vec<JournalistSubscription>> {
        let rows = sqlx::query(&format!(
            "{} WHERE (? IS NULL OR s.reader_id = ?) ORDER BY s.created_at DESC, s.id DESC",
            JOURNALIST_SUB_SELECT
        ))
        .bind(reader_id)
        .bind(reader_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list journalist subscriptions")?;

        rows.iter().map(row_to_journalist_sub).collect()
    }

    async fn subscriber_emails(
        &self,
        publisher_id: Option<i64>,
        journalist_id: i64,
    ) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT u.email
            FROM publisher_subscriptions s
            JOIN users u ON u.id = s.reader_id
            WHERE ? IS NOT NULL AND s.publisher_id = ?
            UNION ALL
            SELECT u.email
            FROM journalist_subscriptions s
            JOIN users u ON u.id = s.reader_id
            WHERE s.journalist_id = ?
            "#,
        )
        .bind(publisher_id)
        .bind(publisher_id)
        .bind(journalist_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to collect subscriber emails")?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("email").map_err(Into::into))
            .collect()
    }
}

fn row_to_publisher_sub(row: &sqlx::sqlite::SqliteRow) -> Result<PublisherSubscription> {
    Ok(PublisherSubscription {
        id: row.try_get("id")?,
        publisher_id: row.try_get("publisher_id")?,
        publisher_name: row.try_get("publisher_name")?,
        reader_id: row.try_get("reader_id")?,
        reader_username: row.try_get("reader_username")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_journalist_sub(row: &sqlx::sqlite::SqliteRow) -> Result<JournalistSubscription> {
    Ok(JournalistSubscription {
        id: row.try_get("id")?,
        journalist_id: row.try_get("journalist_id")?,
        journalist_username: row.try_get("journalist_username")?,
        reader_id: row.try_get("reader_id")?,
        reader_username: row.try_get("reader_username")?,
        created_at: row.try_get("created_at")?,
    })
}
