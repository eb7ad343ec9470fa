//! Error types for the cache server
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use deadpool_redis::redis::RedisError;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the cache façade and the HTTP layer.
///
/// A cache miss is not an error: lookups return `Ok(None)` for absent or
/// expired keys.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Value could not be encoded, or stored bytes could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Backing store unreachable, timed out, or rejected the command
    #[error("Backend error: {0}")]
    Backend(String),

    /// Operation requires an existing key
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// Caller deadline elapsed before the operation completed
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// Invalid request data (rejected before reaching the cache)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

impl From<RedisError> for CacheError {
    fn from(err: RedisError) -> Self {
        CacheError::Backend(err.to_string())
    }
}

impl From<deadpool_redis::PoolError> for CacheError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        CacheError::Backend(format!("connection pool: {}", err))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            CacheError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            CacheError::NotFound(msg) => (StatusCode::NOT_FOUND, format!("key not found: {}", msg)),
            CacheError::Cancelled => (
                StatusCode::SERVICE_UNAVAILABLE,
                "request cancelled".to_string(),
            ),
            CacheError::DeadlineExceeded => (
                StatusCode::GATEWAY_TIMEOUT,
                "request deadline exceeded".to_string(),
            ),
            // Backend detail stays in the logs
            CacheError::Serialization(_) | CacheError::Backend(_) => {
                error!(error = %self, "cache operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal cache error".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache server.
pub type Result<T> = std::result::Result<T, CacheError>;
