//! Publishers and their staff memberships

use std::sync::Arc;

use crate::db::repositories::{MembershipRepository, PublisherRepository, UserRepository};
use crate::models::{
    MemberRole, MembershipFilter, NewMembership, NewPublisher, Publisher, PublisherMembership,
    User,
};

use super::error::{ServiceError, ServiceResult};
use super::policy::{authorize, Capability};

pub struct PublisherService {
    repo: Arc<dyn PublisherRepository>,
    membership_repo: Arc<dyn MembershipRepository>,
    user_repo: Arc<dyn UserRepository>,
}

impl PublisherService {
    pub fn new(
        repo: Arc<dyn PublisherRepository>,
        membership_repo: Arc<dyn MembershipRepository>,
        user_repo: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            repo,
            membership_repo,
            user_repo,
        }
    }

    /// Administrative: create a publisher with a unique name
    pub async fn create_publisher(&self, name: &str, description: &str) -> ServiceResult<Publisher> {
        let input = NewPublisher::new(name, description)?;
        if self.repo.get_by_name(&input.name).await?.is_some() {
            return Err(ServiceError::validation(
                "name",
                "publisher with this name already exists.",
            ));
        }

        let publisher = self.repo.create(&input).await?;
        tracing::info!(publisher_id = publisher.id, name = %publisher.name, "Publisher created");
        Ok(publisher)
    }

    /// Administrative: attach a user to a publisher
    pub async fn add_member(
        &self,
        publisher_id: i64,
        user_id: i64,
        member_role: MemberRole,
    ) -> ServiceResult<PublisherMembership> {
        if self.repo.get_by_id(publisher_id).await?.is_none() {
            return Err(ServiceError::NotFound("Publisher"));
        }
        let user = self
            .user_repo
            .get_by_id(user_id)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        let input = NewMembership::new(publisher_id, &user, member_role)?;
        if self.membership_repo.exists(&input).await? {
            return Err(ServiceError::validation(
                "non_field_errors",
                "The fields publisher, user, member_role must make a unique set.",
            ));
        }

        let membership = self.membership_repo.create(&input).await?;
        tracing::info!(
            publisher_id,
            user_id,
            member_role = %member_role,
            "Publisher membership added"
        );
        Ok(membership)
    }

    pub async fn get(&self, principal: Option<&User>, id: i64) -> ServiceResult<Publisher> {
        authorize(principal, Capability::Browse)?;
        self.repo
            .get_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("Publisher"))
    }

    pub async fn list(&self, principal: Option<&User>) -> ServiceResult<Vec<Publisher>> {
        authorize(principal, Capability::Browse)?;
        Ok(self.repo.list().await?)
    }

    /// Unauthenticated lookup by name, for administrative tooling
    pub async fn find_by_name(&self, name: &str) -> ServiceResult<Option<Publisher>> {
        Ok(self.repo.get_by_name(name.trim()).await?)
    }

    pub async fn get_membership(
        &self,
        principal: Option<&User>,
        id: i64,
    ) -> ServiceResult<PublisherMembership> {
        authorize(principal, Capability::Browse)?;
        self.membership_repo
            .get_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("Membership"))
    }

    pub async fn list_memberships(
        &self,
        principal: Option<&User>,
        filter: &MembershipFilter,
    ) -> ServiceResult<Vec<PublisherMembership>> {
        authorize(principal, Capability::Browse)?;
        Ok(self.membership_repo.list(filter).await?)
    }
}
