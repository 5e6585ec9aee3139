//! Services layer - Business logic
//!
//! Services enforce the access policy and model invariants, then delegate
//! storage to the repositories.

pub mod article;
pub mod error;
pub mod mailer;
pub mod newsletter;
pub mod notification;
pub mod password;
pub mod policy;
pub mod publisher;
pub mod subscription;
pub mod user;

use std::sync::Arc;

use crate::config::Config;
use crate::db::repositories::{
    SqlxArticleRepository, SqlxMembershipRepository, SqlxNewsletterRepository,
    SqlxPublisherRepository, SqlxSessionRepository, SqlxSubscriptionRepository,
    SqlxUserRepository,
};
use crate::db::DbPool;

pub use article::{Approval, ArticleService};
pub use error::{ServiceError, ServiceResult};
pub use mailer::{Mailer, OutgoingMail};
pub use newsletter::NewsletterService;
pub use notification::NotificationService;
pub use password::{hash_password, verify_password};
pub use policy::{authorize, permits, AccessError, Capability};
pub use publisher::PublisherService;
pub use subscription::{ReaderSubscriptions, Subscribed, SubscriptionService};
pub use user::{Registration, UserService, UserServiceError};

/// Every service wired to one database pool and mail transport
#[derive(Clone)]
pub struct Services {
    pub users: Arc<UserService>,
    pub articles: Arc<ArticleService>,
    pub publishers: Arc<PublisherService>,
    pub subscriptions: Arc<SubscriptionService>,
    pub newsletters: Arc<NewsletterService>,
}

impl Services {
    pub fn new(pool: &DbPool, config: &Config, mailer: Arc<dyn Mailer>) -> Self {
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let article_repo = SqlxArticleRepository::boxed(pool.clone());
        let publisher_repo = SqlxPublisherRepository::boxed(pool.clone());
        let membership_repo = SqlxMembershipRepository::boxed(pool.clone());
        let subscription_repo = SqlxSubscriptionRepository::boxed(pool.clone());
        let newsletter_repo = SqlxNewsletterRepository::boxed(pool.clone());

        let notifications = Arc::new(NotificationService::new(
            subscription_repo.clone(),
            mailer,
            config.mail.from_address.clone(),
        ));

        Self {
            users: Arc::new(UserService::with_session_expiration(
                user_repo.clone(),
                session_repo,
                config.auth.session_days,
            )),
            articles: Arc::new(ArticleService::new(
                article_repo.clone(),
                publisher_repo.clone(),
                notifications,
            )),
            publishers: Arc::new(PublisherService::new(
                publisher_repo.clone(),
                membership_repo,
                user_repo.clone(),
            )),
            subscriptions: Arc::new(SubscriptionService::new(
                subscription_repo,
                publisher_repo,
                user_repo,
            )),
            newsletters: Arc::new(NewsletterService::new(newsletter_repo, article_repo)),
        }
    }
}
