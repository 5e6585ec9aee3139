//! Article model
//!
//! Articles are written by journalists and start out pending. An editor
//! either approves one (terminal) or rejects it, which deletes the row.
//! There is no stored "rejected" state and no way back from approved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{required_text, User, ValidationError};

pub const MAX_TITLE_LEN: usize = 255;

/// Article entity, joined with the display names of its related rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub author_username: String,
    /// `None` for independent articles
    pub publisher_id: Option<i64>,
    pub publisher_name: Option<String>,
    pub approved: bool,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by_id: Option<i64>,
    pub approved_by_username: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    pub fn state(&self) -> ArticleState {
        if self.approved {
            ArticleState::Approved
        } else {
            ArticleState::Pending
        }
    }

    pub fn is_authored_by(&self, user: &User) -> bool {
        self.author_id == user.id
    }

    /// Publisher name as shown to subscribers
    pub fn publisher_display(&self) -> &str {
        self.publisher_name.as_deref().unwrap_or("Unknown Publisher")
    }
}

/// Stored lifecycle state of an article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleState {
    Pending,
    Approved,
}

/// Validated input for submitting an article.
///
/// Approval fields are not part of the input: a new article is always
/// pending with no approval timestamp or approver.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub publisher_id: Option<i64>,
}

impl NewArticle {
    pub fn new(
        author: &User,
        title: &str,
        content: &str,
        publisher_id: Option<i64>,
    ) -> Result<Self, ValidationError> {
        if !author.is_journalist() {
            return Err(ValidationError::new(
                "author",
                "Only Journalist users can be authors of articles.",
            ));
        }
        Ok(Self {
            title: required_text("title", title, Some(MAX_TITLE_LEN))?,
            content: required_text("content", content, None)?,
            author_id: author.id,
            publisher_id,
        })
    }
}

/// Partial update to an article's editable fields
#[derive(Debug, Clone, Default)]
pub struct ArticleChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    /// `Some(None)` detaches the article from its publisher
    pub publisher_id: Option<Option<i64>>,
}

impl ArticleChanges {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn publisher(mut self, publisher_id: Option<i64>) -> Self {
        self.publisher_id = Some(publisher_id);
        self
    }

    /// Trim and check the supplied fields
    pub fn validated(self) -> Result<Self, ValidationError> {
        Ok(Self {
            title: self
                .title
                .map(|t| required_text("title", &t, Some(MAX_TITLE_LEN)))
                .transpose()?,
            content: self
                .content
                .map(|c| required_text("content", &c, None))
                .transpose()?,
            publisher_id: self.publisher_id,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.publisher_id.is_none()
    }
}

/// Which articles a caller may see, derived from their role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleVisibility {
    /// Every article, pending or approved
    All,
    /// Approved articles plus pending ones by this author
    ApprovedOrAuthoredBy(i64),
    /// Approved articles only
    ApprovedOnly,
    /// Pending articles only (the editorial queue)
    PendingOnly,
}

/// Narrowing filters applied after visibility
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub publisher_id: Option<i64>,
    pub author_id: Option<i64>,
    /// Restrict to articles whose publisher or author the reader follows
    pub subscribed_by: Option<i64>,
}

impl ArticleFilter {
    pub fn publisher(mut self, publisher_id: i64) -> Self {
        self.publisher_id = Some(publisher_id);
        self
    }

    pub fn author(mut self, author_id: i64) -> Self {
        self.author_id = Some(author_id);
        self
    }

    pub fn subscribed_by(mut self, reader_id: i64) -> Self {
        self.subscribed_by = Some(reader_id);
        self
    }
}
