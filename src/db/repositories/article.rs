//! Article repository
//!
//! Every read joins the author, publisher and approver so callers get
//! display names without extra round-trips. Listing applies a role-derived
//! [`ArticleVisibility`] first and the caller's [`ArticleFilter`] second.

use crate::db::DbPool;
use crate::models::{
    Article, ArticleChanges, ArticleFilter, ArticleVisibility, ListParams, NewArticle, PagedResult,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::sync::Arc;

/// Article repository trait
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Insert a pending article
    async fn create(&self, input: &NewArticle) -> Result<Article>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>>;

    /// List newest first
    async fn list(
        &self,
        visibility: ArticleVisibility,
        filter: &ArticleFilter,
        params: &ListParams,
    ) -> Result<PagedResult<Article>>;

    /// Apply validated changes, returning `None` when the article is gone
    async fn update(&self, id: i64, changes: &ArticleChanges) -> Result<Option<Article>>;

    /// Delete, returning whether a row was removed
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Move a pending article to approved.
    ///
    /// The update only matches while the article is still pending, so of
    /// several concurrent callers exactly one sees `true`.
    async fn mark_approved(&self, id: i64, approver_id: i64, at: DateTime<Utc>) -> Result<bool>;

    /// Which of `ids` exist
    async fn existing_ids(&self, ids: &[i64]) -> Result<Vec<i64>>;
}

/// SQLx-based article repository implementation
pub struct SqlxArticleRepository {
    pool: DbPool,
}

impl SqlxArticleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DbPool) -> Arc<dyn ArticleRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ArticleRepository for SqlxArticleRepository {
    async fn create(&self, input: &NewArticle) -> Result<Article> {
        create_article(&self.pool, input).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>> {
        get_article_by_id(&self.pool, id).await
    }

    async fn list(
        &self,
        visibility: ArticleVisibility,
        filter: &ArticleFilter,
        params: &ListParams,
    ) -> Result<PagedResult<Article>> {
        list_articles(&self.pool, visibility, filter, params).await
    }

    async fn update(&self, id: i64, changes: &ArticleChanges) -> Result<Option<Article>> {
        update_article(&self.pool, id, changes).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete article")?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_approved(&self, id: i64, approver_id: i64, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE articles
            SET approved = 1, approved_at = ?, approved_by_id = ?, updated_at = ?
            WHERE id = ? AND approved = 0
            "#,
        )
        .bind(at)
        .bind(approver_id)
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to approve article")?;
        Ok(result.rows_affected() == 1)
    }

    async fn existing_ids(&self, ids: &[i64]) -> Result<Vec<i64>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT id FROM articles WHERE id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY id");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .context("Failed to look up article ids")?;

        rows.iter()
            .map(|row| row.try_get::<i64, _>("id").map_err(Into::into))
            .collect()
    }
}

const ARTICLE_SELECT: &str = r#"
    SELECT a.id, a.title, a.content, a.author_id, au.username AS author_username,
           a.publisher_id, p.name AS publisher_name, a.approved, a.approved_at,
           a.approved_by_id, ab.username AS approved_by_username,
           a.created_at, a.updated_at
    FROM articles a
    JOIN users au ON au.id = a.author_id
    LEFT JOIN publishers p ON p.id = a.publisher_id
    LEFT JOIN users ab ON ab.id = a.approved_by_id
"#;

async fn create_article(pool: &DbPool, input: &NewArticle) -> Result<Article> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO articles (title, content, author_id, publisher_id, approved, approved_at,
                              approved_by_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, 0, NULL, NULL, ?, ?)
        "#,
    )
    .bind(&input.title)
    .bind(&input.content)
    .bind(input.author_id)
    .bind(input.publisher_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create article")?;

    get_article_by_id(pool, result.last_insert_rowid())
        .await?
        .context("Article vanished after insert")
}

async fn get_article_by_id(pool: &DbPool, id: i64) -> Result<Option<Article>> {
    let row = sqlx::query(&format!("{} WHERE a.id = ?", ARTICLE_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get article by ID")?;

    row.as_ref().map(row_to_article).transpose()
}

/// Append the visibility and filter predicates shared by list and count
fn push_conditions(
    qb: &mut QueryBuilder<'_, Sqlite>,
    visibility: ArticleVisibility,
    filter: &ArticleFilter,
) {
    qb.push(" WHERE 1 = 1");
    match visibility {
        ArticleVisibility::All => {}
        ArticleVisibility::ApprovedOnly => {
            qb.push(" AND a.approved = 1");
        }
        ArticleVisibility::PendingOnly => {
            qb.push(" AND a.approved = 0");
        }
        ArticleVisibility::ApprovedOrAuthoredBy(author_id) => {
            qb.push(" AND (a.approved = 1 OR a.author_id = ")
                .push_bind(author_id)
                .push(")");
        }
    }
    if let Some(publisher_id) = filter.publisher_id {
        qb.push(" AND a.publisher_id = ").push_bind(publisher_id);
    }
    if let Some(author_id) = filter.author_id {
        qb.push(" AND a.author_id = ").push_bind(author_id);
    }
    if let Some(reader_id) = filter.subscribed_by {
        qb.push(" AND (a.publisher_id IN (SELECT publisher_id FROM publisher_subscriptions WHERE reader_id = ")
            .push_bind(reader_id)
            .push(") OR a.author_id IN (SELECT journalist_id FROM journalist_subscriptions WHERE reader_id = ")
            .push_bind(reader_id)
            .push("))");
    }
}

async fn list_articles(
    pool: &DbPool,
    visibility: ArticleVisibility,
    filter: &ArticleFilter,
    params: &ListParams,
) -> Result<PagedResult<Article>> {
    let mut count_qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) AS n FROM articles a");
    push_conditions(&mut count_qb, visibility, filter);
    let total: i64 = count_qb
        .build()
        .fetch_one(pool)
        .await
        .context("Failed to count articles")?
        .try_get("n")?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(ARTICLE_SELECT);
    push_conditions(&mut qb, visibility, filter);
    qb.push(" ORDER BY a.created_at DESC, a.id DESC LIMIT ")
        .push_bind(params.limit())
        .push(" OFFSET ")
        .push_bind(params.offset());

    let rows = qb
        .build()
        .fetch_all(pool)
        .await
        .context("Failed to list articles")?;

    let articles = rows.iter().map(row_to_article).collect::<Result<Vec<_>>>()?;
    Ok(PagedResult::new(articles, total, params))
}

async fn update_article(pool: &DbPool, id: i64, changes: &ArticleChanges) -> Result<Option<Article>> {
    let Some(current) = get_article_by_id(pool, id).await? else {
        return Ok(None);
    };

    let title = changes.title.as_ref().unwrap_or(&current.title);
    let content = changes.content.as_ref().unwrap_or(&current.content);
    let publisher_id = changes.publisher_id.unwrap_or(current.publisher_id);

    sqlx::query("UPDATE articles SET title = ?, content = ?, publisher_id = ?, updated_at = ? WHERE id = ?")
        .bind(title)
        .bind(content)
        .bind(publisher_id)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update article")?;

    get_article_by_id(pool, id).await
}

fn row_to_article(row: &sqlx::sqlite::SqliteRow) -> Result<Article> {
    Ok(Article {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        author_id: row.try_get("author_id")?,
        author_username: row.try_get("author_username")?,
        publisher_id: row.try_get("publisher_id")?,
        publisher_name: row.try_get("publisher_name")?,
        approved: row.try_get("approved")?,
        approved_at: row.try_get("approved_at")?,
        approved_by_id: row.try_get("approved_by_id")?,
        approved_by_username: row.try_get("approved_by_username")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{migrated_pool, seed_article, seed_publisher, seed_user};
    use crate::models::{ArticleState, Role};

    #[tokio::test]
    async fn test_create_article_is_pending() {
        let pool = migrated_pool().await;
        let clark = seed_user(&pool, "clark", "", Role::Journalist).await;
        let planet = seed_publisher(&pool, "Daily Planet").await;

        let article = seed_article(&pool, &clark, "Hello", Some(planet.id)).await;

        assert_eq!(article.state(), ArticleState::Pending);
        assert!(article.approved_at.is_none());
        assert!(article.approved_by_id.is_none());
        assert_eq!(article.author_username, "clark");
        assert_eq!(article.publisher_name.as_deref(), Some("Daily Planet"));
    }

    #[tokio::test]
    async fn test_mark_approved_only_once() {
        let pool = migrated_pool().await;
        let clark = seed_user(&pool, "clark", "", Role::Journalist).await;
        let perry = seed_user(&pool, "perry", "", Role::Editor).await;
        let article = seed_article(&pool, &clark, "Hello", None).await;
        let repo = SqlxArticleRepository::new(pool);

        assert!(repo.mark_approved(article.id, perry.id, Utc::now()).await.unwrap());
        assert!(!repo.mark_approved(article.id, perry.id, Utc::now()).await.unwrap());
        assert!(!repo.mark_approved(9999, perry.id, Utc::now()).await.unwrap());

        let approved = repo.get_by_id(article.id).await.unwrap().unwrap();
        assert!(approved.approved);
        assert!(approved.approved_at.is_some());
        assert_eq!(approved.approved_by_username.as_deref(), Some("perry"));
    }

    #[tokio::test]
    async fn test_list_visibility() {
        let pool = migrated_pool().await;
        let clark = seed_user(&pool, "clark", "", Role::Journalist).await;
        let jimmy = seed_user(&pool, "jimmy", "", Role::Journalist).await;
        let perry = seed_user(&pool, "perry", "", Role::Editor).await;

        let published = seed_article(&pool, &jimmy, "Published", None).await;
        let mine = seed_article(&pool, &clark, "Mine pending", None).await;
        let theirs = seed_article(&pool, &jimmy, "Their pending", None).await;
        let repo = SqlxArticleRepository::new(pool);
        repo.mark_approved(published.id, perry.id, Utc::now()).await.unwrap();

        let params = ListParams::default();
        let ids = |r: PagedResult<Article>| r.items.into_iter().map(|a| a.id).collect::<Vec<_>>();

        let all = repo.list(ArticleVisibility::All, &ArticleFilter::default(), &params).await.unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(ids(all), vec![theirs.id, mine.id, published.id]);

        let approved = repo
            .list(ArticleVisibility::ApprovedOnly, &ArticleFilter::default(), &params)
            .await
            .unwrap();
        assert_eq!(ids(approved), vec![published.id]);

        let journalist = repo
            .list(ArticleVisibility::ApprovedOrAuthoredBy(clark.id), &ArticleFilter::default(), &params)
            .await
            .unwrap();
        assert_eq!(ids(journalist), vec![mine.id, published.id]);

        let pending = repo
            .list(ArticleVisibility::PendingOnly, &ArticleFilter::default(), &params)
            .await
            .unwrap();
        assert_eq!(ids(pending), vec![theirs.id, mine.id]);
    }

    #[tokio::test]
    async fn test_list_filters_and_pagination() {
        let pool = migrated_pool().await;
        let clark = seed_user(&pool, "clark", "", Role::Journalist).await;
        let jimmy = seed_user(&pool, "jimmy", "", Role::Journalist).await;
        let planet = seed_publisher(&pool, "Daily Planet").await;

        for i in 0..5 {
            seed_article(&pool, &clark, &format!("Planet {}", i), Some(planet.id)).await;
        }
        seed_article(&pool, &jimmy, "Independent", None).await;
        let repo = SqlxArticleRepository::new(pool);

        let by_publisher = repo
            .list(
                ArticleVisibility::All,
                &ArticleFilter::default().publisher(planet.id),
                &ListParams::new(2, 2),
            )
            .await
            .unwrap();
        assert_eq!(by_publisher.total, 5);
        assert_eq!(by_publisher.items.len(), 2);
        assert_eq!(by_publisher.total_pages(), 3);

        let by_author = repo
            .list(ArticleVisibility::All, &ArticleFilter::default().author(jimmy.id), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(by_author.total, 1);
        assert_eq!(by_author.items[0].title, "Independent");
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let pool = migrated_pool().await;
        let clark = seed_user(&pool, "clark", "", Role::Journalist).await;
        let planet = seed_publisher(&pool, "Daily Planet").await;
        let article = seed_article(&pool, &clark, "Draft", Some(planet.id)).await;
        let repo = SqlxArticleRepository::new(pool);

        let changes = ArticleChanges::default().title("Final").publisher(None);
        let updated = repo.update(article.id, &changes).await.unwrap().unwrap();
        assert_eq!(updated.title, "Final");
        assert_eq!(updated.content, "Body text");
        assert!(updated.publisher_id.is_none());

        assert!(repo.delete(article.id).await.unwrap());
        assert!(!repo.delete(article.id).await.unwrap());
        assert!(repo.update(article.id, &changes).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_existing_ids() {
        let pool = migrated_pool().await;
        let clark = seed_user(&pool, "clark", "", Role::Journalist).await;
        let a = seed_article(&pool, &clark, "A", None).await;
        let b = seed_article(&pool, &clark, "B", None).await;
        let repo = SqlxArticleRepository::new(pool);

        assert_eq!(repo.existing_ids(&[b.id, 404, a.id]).await.unwrap(), vec![a.id, b.id]);
        assert!(repo.existing_ids(&[]).await.unwrap().is_empty());
    }
}
