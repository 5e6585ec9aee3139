//! Newsletter service
//!
//! Journalists and editors curate newsletters from existing articles. The
//! author owns the newsletter; editors may change any of them.

use std::sync::Arc;

use crate::db::repositories::{ArticleRepository, NewsletterRepository};
use crate::models::{
    Article, ListParams, NewNewsletter, Newsletter, NewsletterChanges, PagedResult, User,
};

use super::error::{ServiceError, ServiceResult};
use super::policy::{authorize, permits, Capability};

pub struct NewsletterService {
    repo: Arc<dyn NewsletterRepository>,
    article_repo: Arc<dyn ArticleRepository>,
}

impl NewsletterService {
    pub fn new(repo: Arc<dyn NewsletterRepository>, article_repo: Arc<dyn ArticleRepository>) -> Self {
        Self { repo, article_repo }
    }

    pub async fn create(
        &self,
        principal: Option<&User>,
        title: &str,
        description: &str,
        article_ids: Vec<i64>,
    ) -> ServiceResult<Newsletter> {
        let author = authorize(principal, Capability::CreateNewsletter)?;
        let input = NewNewsletter::new(author, title, description, article_ids)?;
        self.ensure_articles(&input.article_ids).await?;

        let newsletter = self.repo.create(&input).await?;
        tracing::info!(
            newsletter_id = newsletter.id,
            articles = newsletter.article_count(),
            "Newsletter created"
        );
        Ok(newsletter)
    }

    pub async fn get(&self, principal: Option<&User>, id: i64) -> ServiceResult<Newsletter> {
        authorize(principal, Capability::Browse)?;
        self.find(id).await
    }

    pub async fn list(
        &self,
        principal: Option<&User>,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<Newsletter>> {
        authorize(principal, Capability::Browse)?;
        Ok(self.repo.list(params).await?)
    }

    /// Apply changes; a supplied article list replaces the whole set
    pub async fn update(
        &self,
        principal: Option<&User>,
        id: i64,
        changes: NewsletterChanges,
    ) -> ServiceResult<Newsletter> {
        authorize(principal, Capability::Browse)?;
        let newsletter = self.find(id).await?;
        authorize(principal, Capability::MutateNewsletter(&newsletter))?;

        let changes = changes.validated()?;
        if let Some(ids) = &changes.article_ids {
            self.ensure_articles(ids).await?;
        }

        self.repo
            .update(id, &changes)
            .await?
            .ok_or(ServiceError::NotFound("Newsletter"))
    }

    pub async fn delete(&self, principal: Option<&User>, id: i64) -> ServiceResult<()> {
        authorize(principal, Capability::Browse)?;
        let newsletter = self.find(id).await?;
        let user = authorize(principal, Capability::MutateNewsletter(&newsletter))?;

        if !self.repo.delete(id).await? {
            return Err(ServiceError::NotFound("Newsletter"));
        }
        tracing::info!(newsletter_id = id, user_id = user.id, "Newsletter deleted");
        Ok(())
    }

    /// Linked articles the principal may read, in id order
    pub async fn articles_for(
        &self,
        principal: Option<&User>,
        newsletter: &Newsletter,
    ) -> ServiceResult<Vec<Article>> {
        let mut articles = Vec::with_capacity(newsletter.article_ids.len());
        for id in &newsletter.article_ids {
            if let Some(article) = self.article_repo.get_by_id(*id).await? {
                if permits(principal, Capability::ReadArticle(&article)) {
                    articles.push(article);
                }
            }
        }
        Ok(articles)
    }

    async fn find(&self, id: i64) -> ServiceResult<Newsletter> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("Newsletter"))
    }

    async fn ensure_articles(&self, ids: &[i64]) -> ServiceResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let existing = self.article_repo.existing_ids(ids).await?;
        if let Some(missing) = ids.iter().find(|id| !existing.contains(id)) {
            return Err(ServiceError::validation(
                "articles",
                format!("Invalid pk \"{}\" - object does not exist.", missing),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{migrated_pool, seed_article, seed_user};
    use crate::db::repositories::{SqlxArticleRepository, SqlxNewsletterRepository};
    use crate::db::DbPool;
    use crate::models::Role;

    fn service(pool: &DbPool) -> NewsletterService {
        NewsletterService::new(
            SqlxNewsletterRepository::boxed(pool.clone()),
            SqlxArticleRepository::boxed(pool.clone()),
        )
    }

    #[tokio::test]
    async fn test_create_requires_staff_role() {
        let pool = migrated_pool().await;
        let lois = seed_user(&pool, "lois", "", Role::Reader).await;
        let perry = seed_user(&pool, "perry", "", Role::Editor).await;
        let svc = service(&pool);

        assert!(matches!(
            svc.create(Some(&lois), "Weekly", "", vec![]).await.unwrap_err(),
            ServiceError::Forbidden(_)
        ));
        let newsletter = svc.create(Some(&perry), "Weekly", "Digest", vec![]).await.unwrap();
        assert_eq!(newsletter.author_id, perry.id);
        assert_eq!(newsletter.article_count(), 0);
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_articles() {
        let pool = migrated_pool().await;
        let clark = seed_user(&pool, "clark", "", Role::Journalist).await;
        let article = seed_article(&pool, &clark, "Story", None).await;
        let svc = service(&pool);

        match svc
            .create(Some(&clark), "Weekly", "", vec![article.id, 999])
            .await
            .unwrap_err()
        {
            ServiceError::Validation(err) => assert_eq!(err.field, "articles"),
            other => panic!("unexpected error: {other:?}"),
        }

        let newsletter = svc
            .create(Some(&clark), "Weekly", "", vec![article.id, article.id])
            .await
            .unwrap();
        assert_eq!(newsletter.article_ids, vec![article.id]);
    }

    #[tokio::test]
    async fn test_update_by_author_or_editor_only() {
        let pool = migrated_pool().await;
        let clark = seed_user(&pool, "clark", "", Role::Journalist).await;
        let jimmy = seed_user(&pool, "jimmy", "", Role::Journalist).await;
        let perry = seed_user(&pool, "perry", "", Role::Editor).await;
        let first = seed_article(&pool, &clark, "First", None).await;
        let second = seed_article(&pool, &clark, "Second", None).await;
        let svc = service(&pool);

        let newsletter = svc.create(Some(&clark), "Weekly", "", vec![first.id]).await.unwrap();
        // pending articles are hidden from non-editors
        assert!(svc.articles_for(Some(&jimmy), &newsletter).await.unwrap().is_empty());
        assert_eq!(svc.articles_for(Some(&perry), &newsletter).await.unwrap().len(), 1);

        let changes = NewsletterChanges {
            title: Some("Hijacked".into()),
            ..Default::default()
        };
        assert!(matches!(
            svc.update(Some(&jimmy), newsletter.id, changes).await.unwrap_err(),
            ServiceError::Forbidden(_)
        ));

        let changes = NewsletterChanges {
            article_ids: Some(vec![second.id]),
            ..Default::default()
        };
        let updated = svc.update(Some(&perry), newsletter.id, changes).await.unwrap();
        assert_eq!(updated.article_ids, vec![second.id]);
        assert_eq!(updated.title, "Weekly");
    }

    #[tokio::test]
    async fn test_delete() {
        let pool = migrated_pool().await;
        let clark = seed_user(&pool, "clark", "", Role::Journalist).await;
        let jimmy = seed_user(&pool, "jimmy", "", Role::Journalist).await;
        let svc = service(&pool);
        let newsletter = svc.create(Some(&clark), "Weekly", "", vec![]).await.unwrap();

        assert!(svc.delete(Some(&jimmy), newsletter.id).await.is_err());
        svc.delete(Some(&clark), newsletter.id).await.unwrap();
        assert!(matches!(
            svc.get(Some(&clark), newsletter.id).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }
}
