//! Data models
//!
//! Entities stored by the newsroom (users, sessions, publishers, articles,
//! newsletters, subscriptions) together with their write-side inputs.
//! Inputs validate their own invariants on construction, so every write
//! path goes through the same checks before anything reaches the database.

mod article;
mod newsletter;
mod pagination;
mod publisher;
mod session;
mod subscription;
mod user;

pub use article::{
    Article, ArticleChanges, ArticleFilter, ArticleState, ArticleVisibility, NewArticle,
    MAX_TITLE_LEN,
};
pub use newsletter::{NewNewsletter, Newsletter, NewsletterChanges};
pub use pagination::{ListParams, PagedResult};
pub use publisher::{
    MemberRole, MembershipFilter, NewMembership, NewPublisher, Publisher, PublisherMembership,
};
pub use session::Session;
pub use subscription::{
    JournalistSubscription, NewJournalistSubscription, NewPublisherSubscription,
    PublisherSubscription,
};
pub use user::{CreateUserInput, Role, User};

use serde::Serialize;

/// A model invariant violated on write, reported against one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Trim a required text field, failing when nothing is left
pub(crate) fn required_text(
    field: &str,
    value: &str,
    max_len: Option<usize>,
) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "This field may not be blank."));
    }
    if let Some(max) = max_len {
        if trimmed.chars().count() > max {
            return Err(ValidationError::new(
                field,
                format!("Ensure this field has no more than {} characters.", max),
            ));
        }
    }
    Ok(trimmed.to_string())
}
