//! Shared API response types
//!
//! Wire shapes for the REST API. Timestamps are RFC 3339 strings.

use serde::{Deserialize, Serialize};

use crate::models::{
    Article, JournalistSubscription, Newsletter, Publisher, PublisherMembership,
    PublisherSubscription, User,
};

// ============================================================================
// Articles
// ============================================================================

/// Full article, used by detail endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ArticleResponse {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author: i64,
    pub author_username: String,
    pub publisher: Option<i64>,
    pub publisher_name: Option<String>,
    pub approved: bool,
    pub approved_at: Option<String>,
    pub approved_by: Option<i64>,
    pub approved_by_username: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Article> for ArticleResponse {
    fn from(article: Article) -> Self {
        Self {
            id: article.id,
            title: article.title,
            content: article.content,
            author: article.author_id,
            author_username: article.author_username,
            publisher: article.publisher_id,
            publisher_name: article.publisher_name,
            approved: article.approved,
            approved_at: article.approved_at.map(|dt| dt.to_rfc3339()),
            approved_by: article.approved_by_id,
            approved_by_username: article.approved_by_username,
            created_at: article.created_at.to_rfc3339(),
            updated_at: article.updated_at.to_rfc3339(),
        }
    }
}

/// Article list entry
#[derive(Debug, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author: i64,
    pub author_username: String,
    pub publisher: Option<i64>,
    pub publisher_name: Option<String>,
    pub approved: bool,
    pub approved_at: Option<String>,
    pub created_at: String,
}

impl From<Article> for ArticleSummary {
    fn from(article: Article) -> Self {
        Self {
            id: article.id,
            title: article.title,
            content: article.content,
            author: article.author_id,
            author_username: article.author_username,
            publisher: article.publisher_id,
            publisher_name: article.publisher_name,
            approved: article.approved,
            approved_at: article.approved_at.map(|dt| dt.to_rfc3339()),
            created_at: article.created_at.to_rfc3339(),
        }
    }
}

/// Body of a successful approval
#[derive(Debug, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub message: String,
    pub article_id: i64,
    pub approved: bool,
    pub approved_at: Option<String>,
    pub approved_by: Option<String>,
    pub notified: usize,
}

/// Body of a successful rejection
#[derive(Debug, Serialize, Deserialize)]
pub struct RejectionResponse {
    pub message: String,
    pub article_id: i64,
}

// ============================================================================
// Publishers
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct PublisherResponse {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_at: String,
}

impl From<Publisher> for PublisherResponse {
    fn from(publisher: Publisher) -> Self {
        Self {
            id: publisher.id,
            name: publisher.name,
            description: publisher.description,
            created_at: publisher.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MembershipResponse {
    pub id: i64,
    pub publisher: i64,
    pub publisher_name: String,
    pub user: i64,
    pub username: String,
    pub member_role: String,
    pub created_at: String,
}

impl From<PublisherMembership> for MembershipResponse {
    fn from(membership: PublisherMembership) -> Self {
        Self {
            id: membership.id,
            publisher: membership.publisher_id,
            publisher_name: membership.publisher_name,
            user: membership.user_id,
            username: membership.username,
            member_role: membership.member_role.to_string(),
            created_at: membership.created_at.to_rfc3339(),
        }
    }
}

// ============================================================================
// Subscriptions
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct PublisherSubscriptionResponse {
    pub id: i64,
    pub publisher: i64,
    pub publisher_name: String,
    pub reader: i64,
    pub reader_username: String,
    pub created_at: String,
}

impl From<PublisherSubscription> for PublisherSubscriptionResponse {
    fn from(sub: PublisherSubscription) -> Self {
        Self {
            id: sub.id,
            publisher: sub.publisher_id,
            publisher_name: sub.publisher_name,
            reader: sub.reader_id,
            reader_username: sub.reader_username,
            created_at: sub.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JournalistSubscriptionResponse {
    pub id: i64,
    pub journalist: i64,
    pub journalist_username: String,
    pub reader: i64,
    pub reader_username: String,
    pub created_at: String,
}

impl From<JournalistSubscription> for JournalistSubscriptionResponse {
    fn from(sub: JournalistSubscription) -> Self {
        Self {
            id: sub.id,
            journalist: sub.journalist_id,
            journalist_username: sub.journalist_username,
            reader: sub.reader_id,
            reader_username: sub.reader_username,
            created_at: sub.created_at.to_rfc3339(),
        }
    }
}

// ============================================================================
// Newsletters
// ============================================================================

/// Newsletter list entry
#[derive(Debug, Serialize, Deserialize)]
pub struct NewsletterSummary {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub author: i64,
    pub author_username: String,
    pub article_count: usize,
    pub created_at: String,
}

impl From<Newsletter> for NewsletterSummary {
    fn from(newsletter: Newsletter) -> Self {
        Self {
            id: newsletter.id,
            title: newsletter.title.clone(),
            description: newsletter.description.clone(),
            author: newsletter.author_id,
            author_username: newsletter.author_username.clone(),
            article_count: newsletter.article_count(),
            created_at: newsletter.created_at.to_rfc3339(),
        }
    }
}

/// Newsletter detail with its linked articles
#[derive(Debug, Serialize, Deserialize)]
pub struct NewsletterResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub author: i64,
    pub author_username: String,
    pub articles: Vec<i64>,
    pub article_details: Vec<ArticleSummary>,
    pub created_at: String,
    pub updated_at: String,
}

impl NewsletterResponse {
    pub fn new(newsletter: Newsletter, articles: Vec<Article>) -> Self {
        Self {
            id: newsletter.id,
            title: newsletter.title,
            description: newsletter.description,
            author: newsletter.author_id,
            author_username: newsletter.author_username,
            articles: newsletter.article_ids,
            article_details: articles.into_iter().map(ArticleSummary::from).collect(),
            created_at: newsletter.created_at.to_rfc3339(),
            updated_at: newsletter.updated_at.to_rfc3339(),
        }
    }
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role.label().to_string(),
            is_active: user.is_active,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}
