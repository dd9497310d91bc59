//! Error types for token storage and validation
//!
//! Failure modes that distinguish *why* a token was rejected (expired,
//! unknown, digest mismatch) are collapsed to a single generic result at
//! the crate boundary; the distinction survives only in logs.

use thiserror::Error;

/// Storage backend error types.
///
/// A storage failure after a validation decision has already been made is
/// logged by the caller and does not reverse the decision.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend could not be reached.
    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),

    /// A read or write against the backend failed.
    #[error("Storage operation failed: {0}")]
    Operation(String),

    /// The requested write conflicts with an existing row.
    #[error("Storage conflict: {0}")]
    Conflict(String),
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Token validation error types.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Token is expired, unknown, or already consumed.
    ///
    /// The sub-reason is intentionally not carried here.
    #[error("Invalid token")]
    Invalid,

    /// The store failed before a validation decision could be made.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for token operations.
pub type TokenResult<T> = Result<T, TokenError>;

impl TokenError {
    /// Check if this error should be logged at error level.
    pub fn is_server_error(&self) -> bool {
        matches!(self, TokenError::Store(_))
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            TokenError::Invalid => 401,
            TokenError::Store(_) => 500,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            TokenError::Invalid => "invalid_token",
            TokenError::Store(_) => "internal_error",
        }
    }
}
