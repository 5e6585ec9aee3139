//! Newsletter model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{required_text, User, ValidationError, MAX_TITLE_LEN};

/// A curated bundle of articles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Newsletter {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub author_id: i64,
    pub author_username: String,
    /// Linked article ids, ascending
    pub article_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Newsletter {
    pub fn article_count(&self) -> usize {
        self.article_ids.len()
    }
}

/// Validated input for creating a newsletter
#[derive(Debug, Clone)]
pub struct NewNewsletter {
    pub title: String,
    pub description: String,
    pub author_id: i64,
    pub article_ids: Vec<i64>,
}

impl NewNewsletter {
    pub fn new(
        author: &User,
        title: &str,
        description: &str,
        article_ids: Vec<i64>,
    ) -> Result<Self, ValidationError> {
        if author.is_reader() {
            return Err(ValidationError::new(
                "author",
                "Only Journalist or Editor users can author newsletters.",
            ));
        }
        Ok(Self {
            title: required_text("title", title, Some(MAX_TITLE_LEN))?,
            description: description.trim().to_string(),
            author_id: author.id,
            article_ids: dedup_ids(article_ids),
        })
    }
}

/// Partial update to a newsletter
#[derive(Debug, Clone, Default)]
pub struct NewsletterChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Replaces the whole link set when present
    pub article_ids: Option<Vec<i64>>,
}

impl NewsletterChanges {
    pub fn validated(self) -> Result<Self, ValidationError> {
        Ok(Self {
            title: self
                .title
                .map(|t| required_text("title", &t, Some(MAX_TITLE_LEN)))
                .transpose()?,
            description: self.description.map(|d| d.trim().to_string()),
            article_ids: self.article_ids.map(dedup_ids),
        })
    }
}

fn dedup_ids(mut ids: Vec<i64>) -> Vec<i64> {
    ids.sort_unstable();
    ids.dedup();
    ids
}
