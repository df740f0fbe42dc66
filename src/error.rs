//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Caller-visible error type.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A value could not be reduced to a content hash
    #[error("Hashing failed: {0}")]
    Hashing(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Hashing(err.to_string())
    }
}

// == Storage Error Enum ==
/// Faults raised by a backing storage tier.
///
/// The store absorbs all of these: the cache must never be the reason a
/// primary operation fails.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Backend exists but cannot be reached right now
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Backend is not supported in this environment
    #[error("Storage unsupported: {0}")]
    Unsupported(String),

    /// Backend refused the write for lack of space
    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    /// A stored entry could not be read back
    #[error("Stored entry corrupted: {0}")]
    Corruption(String),

    /// Any other backend failure
    #[error("Storage operation failed: {0}")]
    OperationFailed(String),
}

impl StorageError {
    /// Faults that mean "act as if there were no backend".
    pub fn is_bypass(&self) -> bool {
        matches!(self, StorageError::Unavailable(_) | StorageError::Unsupported(_))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            CacheError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            CacheError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            CacheError::Hashing(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            CacheError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(ErrorResponse::new(message));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
