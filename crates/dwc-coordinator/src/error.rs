//! Coordinator error taxonomy.

use dwc_core::db::DatabaseError;
use dwc_core::friend_code::FriendCodeError;

use crate::access::Denial;

/// Errors returned by every coordinator component.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Access denied: {0}")]
    AccessDenied(Denial),

    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<DatabaseError> for CoordinatorError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(what) => Self::NotFound(what),
            DatabaseError::Conflict(what) => Self::Conflict(what),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<FriendCodeError> for CoordinatorError {
    fn from(err: FriendCodeError) -> Self {
        match err {
            FriendCodeError::InvalidFormat(input) => Self::InvalidFormat(input),
        }
    }
}

impl From<Denial> for CoordinatorError {
    fn from(denial: Denial) -> Self {
        Self::AccessDenied(denial)
    }
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
