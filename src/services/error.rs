//! Error type shared by the newsroom services

use crate::models::ValidationError;

use super::policy::AccessError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Authentication credentials were not provided.")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    /// Mail transport failed part-way through a notification fan-out
    #[error("Notification delivery failed after {sent} message(s): {source}")]
    Notification {
        sent: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(ValidationError::new(field, message))
    }
}

impl From<AccessError> for ServiceError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Unauthenticated => Self::Unauthenticated,
            AccessError::Forbidden(reason) => Self::Forbidden(reason.to_string()),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
