//! Subscription registry
//!
//! Readers follow publishers and individual journalists. Subscribing is
//! idempotent and reports whether a new row was created; unsubscribing
//! reports whether anything was removed.

use std::sync::Arc;

use crate::db::repositories::{PublisherRepository, SubscriptionRepository, UserRepository};
use crate::models::{
    JournalistSubscription, NewJournalistSubscription, NewPublisherSubscription,
    PublisherSubscription, User,
};

use super::error::{ServiceError, ServiceResult};
use super::policy::{authorize, Capability};

/// A subscription together with whether this call created it
#[derive(Debug, Clone)]
pub struct Subscribed<T> {
    pub subscription: T,
    pub created: bool,
}

/// Everything one reader follows
#[derive(Debug, Clone, Default)]
pub struct ReaderSubscriptions {
    pub publishers: Vec<PublisherSubscription>,
    pub journalists: Vec<JournalistSubscription>,
}

pub struct SubscriptionService {
    repo: Arc<dyn SubscriptionRepository>,
    publisher_repo: Arc<dyn PublisherRepository>,
    user_repo: Arc<dyn UserRepository>,
}

impl SubscriptionService {
    pub fn new(
        repo: Arc<dyn SubscriptionRepository>,
        publisher_repo: Arc<dyn PublisherRepository>,
        user_repo: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            repo,
            publisher_repo,
            user_repo,
        }
    }

    pub async fn subscribe_publisher(
        &self,
        principal: Option<&User>,
        publisher_id: i64,
    ) -> ServiceResult<Subscribed<PublisherSubscription>> {
        let reader = authorize(principal, Capability::Subscribe)?;
        if self.publisher_repo.get_by_id(publisher_id).await?.is_none() {
            return Err(ServiceError::NotFound("Publisher"));
        }

        let input = NewPublisherSubscription::new(publisher_id, reader)?;
        let (subscription, created) = self.repo.subscribe_publisher(&input).await?;
        if created {
            tracing::info!(reader_id = reader.id, publisher_id, "Subscribed to publisher");
        }
        Ok(Subscribed {
            subscription,
            created,
        })
    }

    pub async fn unsubscribe_publisher(
        &self,
        principal: Option<&User>,
        publisher_id: i64,
    ) -> ServiceResult<bool> {
        let reader = authorize(principal, Capability::Subscribe)?;
        let removed = self.repo.unsubscribe_publisher(publisher_id, reader.id).await?;
        if removed {
            tracing::info!(reader_id = reader.id, publisher_id, "Unsubscribed from publisher");
        }
        Ok(removed)
    }

    pub async fn subscribe_journalist(
        &self,
        principal: Option<&User>,
        journalist_id: i64,
    ) -> ServiceResult<Subscribed<JournalistSubscription>> {
        let reader = authorize(principal, Capability::Subscribe)?;
        let journalist = self
            .user_repo
            .get_by_id(journalist_id)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        let input = NewJournalistSubscription::new(&journalist, reader)?;
        let (subscription, created) = self.repo.subscribe_journalist(&input).await?;
        if created {
            tracing::info!(reader_id = reader.id, journalist_id, "Subscribed to journalist");
        }
        Ok(Subscribed {
            subscription,
            created,
        })
    }

    pub async fn unsubscribe_journalist(
        &self,
        principal: Option<&User>,
        journalist_id: i64,
    ) -> ServiceResult<bool> {
        let reader = authorize(principal, Capability::Subscribe)?;
        let removed = self.repo.unsubscribe_journalist(journalist_id, reader.id).await?;
        if removed {
            tracing::info!(reader_id = reader.id, journalist_id, "Unsubscribed from journalist");
        }
        Ok(removed)
    }

    /// The calling reader's publisher subscriptions, newest first
    pub async fn list_publisher_subscriptions(
        &self,
        principal: Option<&User>,
    ) -> ServiceResult<Vec<PublisherSubscription>> {
        let reader = authorize(principal, Capability::ListOwnSubscriptions)?;
        Ok(self.repo.list_publisher_subscriptions(Some(reader.id)).await?)
    }

    pub async fn list_journalist_subscriptions(
        &self,
        principal: Option<&User>,
    ) -> ServiceResult<Vec<JournalistSubscription>> {
        let reader = authorize(principal, Capability::ListOwnSubscriptions)?;
        Ok(self.repo.list_journalist_subscriptions(Some(reader.id)).await?)
    }

    /// Both kinds of subscription held by the calling reader
    pub async fn list_own(&self, principal: Option<&User>) -> ServiceResult<ReaderSubscriptions> {
        let reader = authorize(principal, Capability::ListOwnSubscriptions)?;
        Ok(ReaderSubscriptions {
            publishers: self.repo.list_publisher_subscriptions(Some(reader.id)).await?,
            journalists: self.repo.list_journalist_subscriptions(Some(reader.id)).await?,
        })
    }

    /// Delete by id. Owning reader or editor only.
    pub async fn delete_publisher_subscription(
        &self,
        principal: Option<&User>,
        id: i64,
    ) -> ServiceResult<()> {
        authorize(principal, Capability::Browse)?;
        let subscription = self
            .repo
            .get_publisher_subscription(id)
            .await?
            .ok_or(ServiceError::NotFound("Subscription"))?;
        authorize(
            principal,
            Capability::MutateSubscription {
                reader_id: subscription.reader_id,
            },
        )?;

        if !self.repo.delete_publisher_subscription(id).await? {
            return Err(ServiceError::NotFound("Subscription"));
        }
        Ok(())
    }

    pub async fn delete_journalist_subscription(
        &self,
        principal: Option<&User>,
        id: i64,
    ) -> ServiceResult<()> {
        authorize(principal, Capability::Browse)?;
        let subscription = self
            .repo
            .get_journalist_subscription(id)
            .await?
            .ok_or(ServiceError::NotFound("Subscription"))?;
        authorize(
            principal,
            Capability::MutateSubscription {
                reader_id: subscription.reader_id,
            },
        )?;

        if !self.repo.delete_journalist_subscription(id).await? {
            return Err(ServiceError::NotFound("Subscription"));
        }
        Ok(())
    }

    /// Whether `reader` follows the publisher. Always false for non-readers.
    pub async fn follows_publisher(&self, reader: &User, publisher_id: i64) -> ServiceResult<bool> {
        if !reader.is_reader() {
            return Ok(false);
        }
        let subs = self.repo.list_publisher_subscriptions(Some(reader.id)).await?;
        Ok(subs.iter().any(|s| s.publisher_id == publisher_id))
    }

    pub async fn follows_journalist(&self, reader: &User, journalist_id: i64) -> ServiceResult<bool> {
        if !reader.is_reader() {
            return Ok(false);
        }
        let subs = self.repo.list_journalist_subscriptions(Some(reader.id)).await?;
        Ok(subs.iter().any(|s| s.journalist_id == journalist_id))
    }
}
