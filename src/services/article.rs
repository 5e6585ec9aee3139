//! Article service
//!
//! Owns the article lifecycle:
//! - submit: a journalist creates a pending article
//! - approve: an editor moves it from pending to approved, then subscribers
//!   are notified
//! - reject: an editor deletes it
//!
//! Every call takes the calling principal (`None` when anonymous) and checks
//! it against the access policy before touching storage.

use std::sync::Arc;

use chrono::Utc;

use crate::db::repositories::{ArticleRepository, PublisherRepository};
use crate::models::{
    Article, ArticleChanges, ArticleFilter, ArticleVisibility, ListParams, NewArticle,
    PagedResult, User,
};

use super::error::{ServiceError, ServiceResult};
use super::notification::NotificationService;
use super::policy::{authorize, visibility_for, Capability};

/// Result of a successful approval
#[derive(Debug, Clone)]
pub struct Approval {
    pub article: Article,
    /// Messages sent to subscribers
    pub notified: usize,
}

pub struct ArticleService {
    repo: Arc<dyn ArticleRepository>,
    publisher_repo: Arc<dyn PublisherRepository>,
    notifications: Arc<NotificationService>,
}

impl ArticleService {
    pub fn new(
        repo: Arc<dyn ArticleRepository>,
        publisher_repo: Arc<dyn PublisherRepository>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            repo,
            publisher_repo,
            notifications,
        }
    }

    /// Submit a new article. It is always stored pending.
    ///
    /// The role check runs first, so a non-journalist gets `Forbidden`
    /// rather than the `author` validation error from [`NewArticle::new`].
    pub async fn submit(
        &self,
        principal: Option<&User>,
        title: &str,
        content: &str,
        publisher_id: Option<i64>,
    ) -> ServiceResult<Article> {
        let author = authorize(principal, Capability::CreateArticle)?;
        let input = NewArticle::new(author, title, content, publisher_id)?;
        self.ensure_publisher(input.publisher_id).await?;

        let article = self.repo.create(&input).await?;
        tracing::info!(article_id = article.id, author_id = author.id, "Article submitted");
        Ok(article)
    }

    /// Fetch one article the principal is allowed to read
    pub async fn get(&self, principal: Option<&User>, id: i64) -> ServiceResult<Article> {
        authorize(principal, Capability::Browse)?;
        let article = self.find(id).await?;
        authorize(principal, Capability::ReadArticle(&article))?;
        Ok(article)
    }

    /// List the articles visible to the principal, newest first
    pub async fn list(
        &self,
        principal: Option<&User>,
        filter: &ArticleFilter,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<Article>> {
        let user = authorize(principal, Capability::ListArticles)?;
        Ok(self.repo.list(visibility_for(user), filter, params).await?)
    }

    /// Approved articles only, regardless of role
    pub async fn list_published(
        &self,
        principal: Option<&User>,
        filter: &ArticleFilter,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<Article>> {
        authorize(principal, Capability::ListArticles)?;
        Ok(self
            .repo
            .list(ArticleVisibility::ApprovedOnly, filter, params)
            .await?)
    }

    /// Editorial queue of pending articles
    pub async fn list_pending(
        &self,
        principal: Option<&User>,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<Article>> {
        authorize(principal, Capability::ReviewQueue)?;
        Ok(self
            .repo
            .list(ArticleVisibility::PendingOnly, &ArticleFilter::default(), params)
            .await?)
    }

    /// Approved articles from the publishers and journalists a reader follows
    pub async fn list_subscribed(
        &self,
        principal: Option<&User>,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<Article>> {
        let reader = authorize(principal, Capability::Subscribe)?;
        let filter = ArticleFilter::default().subscribed_by(reader.id);
        Ok(self
            .repo
            .list(ArticleVisibility::ApprovedOnly, &filter, params)
            .await?)
    }

    /// Edit title, content or publisher. Author or editor only.
    pub async fn update(
        &self,
        principal: Option<&User>,
        id: i64,
        changes: ArticleChanges,
    ) -> ServiceResult<Article> {
        authorize(principal, Capability::Browse)?;
        let article = self.find(id).await?;
        authorize(principal, Capability::MutateArticle(&article))?;

        let changes = changes.validated()?;
        if let Some(publisher_id) = changes.publisher_id {
            self.ensure_publisher(publisher_id).await?;
        }
        if changes.is_empty() {
            return Ok(article);
        }

        self.repo
            .update(id, &changes)
            .await?
            .ok_or(ServiceError::NotFound("Article"))
    }

    /// Delete an article. Author or editor only.
    pub async fn delete(&self, principal: Option<&User>, id: i64) -> ServiceResult<()> {
        authorize(principal, Capability::Browse)?;
        let article = self.find(id).await?;
        let user = authorize(principal, Capability::MutateArticle(&article))?;

        if !self.repo.delete(id).await? {
            return Err(ServiceError::NotFound("Article"));
        }
        tracing::info!(article_id = id, user_id = user.id, "Article deleted");
        Ok(())
    }

    /// Approve a pending article and notify its subscribers.
    ///
    /// Only the pending to approved transition is allowed: approving an
    /// already approved article fails with `Conflict` and sends nothing.
    /// If mail delivery fails the approval stays committed and the
    /// notification error is returned.
    pub async fn approve(&self, principal: Option<&User>, id: i64) -> ServiceResult<Approval> {
        let editor = authorize(principal, Capability::ApproveArticle)?;
        let article = self.find(id).await?;
        if article.approved {
            return Err(already_approved(id));
        }

        if !self.repo.mark_approved(id, editor.id, Utc::now()).await? {
            // Lost a race with another approval, or the row is gone.
            return match self.repo.get_by_id(id).await? {
                Some(_) => Err(already_approved(id)),
                None => Err(ServiceError::NotFound("Article")),
            };
        }

        let article = self.find(id).await?;
        tracing::info!(article_id = id, editor_id = editor.id, "Article approved");

        let notified = self.notifications.notify_approval(&article).await?;
        Ok(Approval { article, notified })
    }

    /// Mail the approval notice for an already approved article again.
    ///
    /// Operator path for when delivery failed during approval. Every current
    /// subscriber is mailed, including those the first attempt reached.
    pub async fn resend_notifications(&self, id: i64) -> ServiceResult<Approval> {
        let article = self.find(id).await?;
        if !article.approved {
            return Err(ServiceError::Conflict(format!(
                "Article {} has not been approved.",
                id
            )));
        }
        let notified = self.notifications.notify_approval(&article).await?;
        tracing::info!(article_id = id, notified, "Approval notifications resent");
        Ok(Approval { article, notified })
    }

    /// Reject an article by deleting it. Returns the deleted id.
    pub async fn reject(&self, principal: Option<&User>, id: i64) -> ServiceResult<i64> {
        let editor = authorize(principal, Capability::RejectArticle)?;
        if !self.repo.delete(id).await? {
            return Err(ServiceError::NotFound("Article"));
        }
        tracing::info!(article_id = id, editor_id = editor.id, "Article rejected and deleted");
        Ok(id)
    }

    async fn find(&self, id: i64) -> ServiceResult<Article> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("Article"))
    }

    async fn ensure_publisher(&self, publisher_id: Option<i64>) -> ServiceResult<()> {
        if let Some(publisher_id) = publisher_id {
            if self.publisher_repo.get_by_id(publisher_id).await?.is_none() {
                return Err(ServiceError::validation(
                    "publisher",
                    format!("Invalid pk \"{}\" - object does not exist.", publisher_id),
                ));
            }
        }
        Ok(())
    }
}

fn already_approved(id: i64) -> ServiceError {
    ServiceError::Conflict(format!("Article {} is already approved.", id))
}
