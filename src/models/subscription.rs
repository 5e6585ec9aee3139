//! Reader subscriptions to publishers and to individual journalists

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{User, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherSubscription {
    pub id: i64,
    pub publisher_id: i64,
    pub publisher_name: String,
    pub reader_id: i64,
    pub reader_username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalistSubscription {
    pub id: i64,
    pub journalist_id: i64,
    pub journalist_username: String,
    pub reader_id: i64,
    pub reader_username: String,
    pub created_at: DateTime<Utc>,
}

fn require_reader(reader: &User, what: &str) -> Result<(), ValidationError> {
    if reader.is_reader() {
        Ok(())
    } else {
        Err(ValidationError::new(
            "reader",
            format!("Only users with the Reader role can subscribe to {}.", what),
        ))
    }
}

/// Validated (publisher, reader) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewPublisherSubscription {
    pub publisher_id: i64,
    pub reader_id: i64,
}

impl NewPublisherSubscription {
    pub fn new(publisher_id: i64, reader: &User) -> Result<Self, ValidationError> {
        require_reader(reader, "publishers")?;
        Ok(Self {
            publisher_id,
            reader_id: reader.id,
        })
    }
}

/// Validated (journalist, reader) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewJournalistSubscription {
    pub journalist_id: i64,
    pub reader_id: i64,
}

impl NewJournalistSubscription {
    pub fn new(journalist: &User, reader: &User) -> Result<Self, ValidationError> {
        require_reader(reader, "journalists")?;
        if !journalist.is_journalist() {
            return Err(ValidationError::new(
                "journalist",
                "You can only subscribe to users with the Journalist role.",
            ));
        }
        Ok(Self {
            journalist_id: journalist.id,
            reader_id: reader.id,
        })
    }
}
