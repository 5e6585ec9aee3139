//! Approval notifications
//!
//! When an article is approved, every reader following its publisher or
//! its author gets one plain-text message. Each message has exactly one
//! recipient so no reader sees another reader's address.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::db::repositories::SubscriptionRepository;
use crate::models::Article;

use super::error::{ServiceError, ServiceResult};
use super::mailer::{Mailer, OutgoingMail};

pub struct NotificationService {
    subscription_repo: Arc<dyn SubscriptionRepository>,
    mailer: Arc<dyn Mailer>,
    from_address: String,
}

impl NotificationService {
    pub fn new(
        subscription_repo: Arc<dyn SubscriptionRepository>,
        mailer: Arc<dyn Mailer>,
        from_address: impl Into<String>,
    ) -> Self {
        Self {
            subscription_repo,
            mailer,
            from_address: from_address.into(),
        }
    }

    /// Unique, non-blank subscriber addresses in lexicographic order
    pub async fn recipients_for(&self, article: &Article) -> ServiceResult<Vec<String>> {
        let raw = self
            .subscription_repo
            .subscriber_emails(article.publisher_id, article.author_id)
            .await?;

        Ok(normalize_recipients(raw))
    }

    /// Send one message per recipient and return how many went out.
    ///
    /// Stops at the first transport failure.
    pub async fn notify_approval(&self, article: &Article) -> ServiceResult<usize> {
        let recipients = self.recipients_for(article).await?;
        if recipients.is_empty() {
            tracing::info!(article_id = article.id, "No subscribers to notify");
            return Ok(0);
        }

        let subject = approval_subject(article);
        let body = approval_body(article);

        let mut sent = 0;
        for recipient in recipients {
            let mail = OutgoingMail {
                subject: subject.clone(),
                body: body.clone(),
                from: self.from_address.clone(),
                to: vec![recipient.clone()],
            };

            if let Err(source) = self.mailer.send(&mail).await {
                tracing::error!(
                    article_id = article.id,
                    recipient = %recipient,
                    sent,
                    "Approval notification failed: {:#}",
                    source
                );
                return Err(ServiceError::Notification { sent, source });
            }
            tracing::debug!(article_id = article.id, recipient = %recipient, "Approval notification sent");
            sent += 1;
        }

        tracing::info!(article_id = article.id, sent, "Approval notifications dispatched");
        Ok(sent)
    }
}

fn normalize_recipients(raw: impl IntoIterator<Item = String>) -> Vec<String> {
    raw.into_iter()
        .map(|email| email.trim().to_string())
        .filter(|email| !email.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn approval_subject(article: &Article) -> String {
    format!("New approved article: {}", article.title)
}

pub fn approval_body(article: &Article) -> String {
    format!(
        "A new article has been approved and published.\n\n\
         Title: {}\n\
         Publisher: {}\n\
         Author: {}\n",
        article.title,
        article.publisher_display(),
        article.author_username
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{migrated_pool, seed_article, seed_publisher, seed_user};
    use crate::db::repositories::SqlxSubscriptionRepository;
    use crate::models::{NewJournalistSubscription, NewPublisherSubscription, Role};
    use crate::services::mailer::MemoryMailer;

    #[test]
    fn test_normalize_recipients() {
        let raw = vec![
            " b@example.com".to_string(),
            "a@example.com".to_string(),
            "".to_string(),
            "   ".to_string(),
            "b@example.com ".to_string(),
        ];
        assert_eq!(normalize_recipients(raw), vec!["a@example.com", "b@example.com"]);
    }

    #[tokio::test]
    async fn test_dedup_and_blank_skipping_scenario() {
        let pool = migrated_pool().await;
        let planet = seed_publisher(&pool, "Daily Planet").await;
        let clark = seed_user(&pool, "clark", "clark@planet.test", Role::Journalist).await;
        let r1 = seed_user(&pool, "r1", "r1@example.com", Role::Reader).await;
        let r2 = seed_user(&pool, "r2", "r2@example.com", Role::Reader).await;
        let r3 = seed_user(&pool, "r3", "r3@example.com", Role::Reader).await;
        let r4 = seed_user(&pool, "r4", "", Role::Reader).await;
        let article = seed_article(&pool, &clark, "Big Story", Some(planet.id)).await;

        let subs = SqlxSubscriptionRepository::new(pool.clone());
        for reader in [&r1, &r3, &r4] {
            subs.subscribe_publisher(&NewPublisherSubscription::new(planet.id, reader).unwrap())
                .await
                .unwrap();
        }
        for reader in [&r2, &r3] {
            subs.subscribe_journalist(&NewJournalistSubscription::new(&clark, reader).unwrap())
                .await
                .unwrap();
        }

        let mailer = Arc::new(MemoryMailer::new());
        let service = NotificationService::new(
            SqlxSubscriptionRepository::boxed(pool),
            mailer.clone(),
            "noreply@example.com",
        );

        let sent = service.notify_approval(&article).await.unwrap();
        assert_eq!(sent, 3);

        let outbox = mailer.sent();
        let recipients: Vec<_> = outbox.iter().map(|m| m.to.clone()).collect();
        assert_eq!(
            recipients,
            vec![
                vec!["r1@example.com".to_string()],
                vec!["r2@example.com".to_string()],
                vec!["r3@example.com".to_string()],
            ]
        );

        let first = &outbox[0];
        assert_eq!(first.subject, "New approved article: Big Story");
        assert_eq!(first.from, "noreply@example.com");
        assert!(first.body.contains("Title: Big Story"));
        assert!(first.body.contains("Publisher: Daily Planet"));
        assert!(first.body.contains("Author: clark"));
    }

    #[tokio::test]
    async fn test_no_subscribers_sends_nothing() {
        let pool = migrated_pool().await;
        let clark = seed_user(&pool, "clark", "", Role::Journalist).await;
        let article = seed_article(&pool, &clark, "Quiet", None).await;

        let mailer = Arc::new(MemoryMailer::new());
        let service = NotificationService::new(
            SqlxSubscriptionRepository::boxed(pool),
            mailer.clone(),
            "noreply@example.com",
        );

        assert_eq!(service.notify_approval(&article).await.unwrap(), 0);
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_independent_article_body_names_unknown_publisher() {
        let pool = migrated_pool().await;
        let clark = seed_user(&pool, "clark", "", Role::Journalist).await;
        let lois = seed_user(&pool, "lois", "lois@example.com", Role::Reader).await;
        let article = seed_article(&pool, &clark, "Solo", None).await;

        SqlxSubscriptionRepository::new(pool.clone())
            .subscribe_journalist(&NewJournalistSubscription::new(&clark, &lois).unwrap())
            .await
            .unwrap();

        let mailer = Arc::new(MemoryMailer::new());
        let service = NotificationService::new(
            SqlxSubscriptionRepository::boxed(pool),
            mailer.clone(),
            "desk@example.com",
        );

        assert_eq!(service.notify_approval(&article).await.unwrap(), 1);
        assert!(mailer.sent()[0].body.contains("Publisher: Unknown Publisher"));
    }

    #[tokio::test]
    async fn test_transport_failure_stops_fan_out() {
        let pool = migrated_pool().await;
        let planet = seed_publisher(&pool, "Daily Planet").await;
        let clark = seed_user(&pool, "clark", "", Role::Journalist).await;
        let subs = SqlxSubscriptionRepository::new(pool.clone());
        for name in ["a", "b", "c"] {
            let reader = seed_user(&pool, name, &format!("{}@example.com", name), Role::Reader).await;
            subs.subscribe_publisher(&NewPublisherSubscription::new(planet.id, &reader).unwrap())
                .await
                .unwrap();
        }
        let article = seed_article(&pool, &clark, "Story", Some(planet.id)).await;

        let mailer = Arc::new(MemoryMailer::failing_after(1));
        let service = NotificationService::new(
            SqlxSubscriptionRepository::boxed(pool),
            mailer.clone(),
            "noreply@example.com",
        );

        let err = service.notify_approval(&article).await.unwrap_err();
        assert!(matches!(err, ServiceError::Notification { sent: 1, .. }));
        assert_eq!(mailer.sent().len(), 1);
    }
}
