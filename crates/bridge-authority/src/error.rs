//! Error types for the authority-side sync handlers.
//!
//! Authentication failures are surfaced as 401/403 without leaking which
//! sub-reason applied; a missing shared secret is a misconfiguration and
//! fails closed as a server error, never as an open gate.

use bridge_tokens::{StoreError, TokenError};
use thiserror::Error;

/// Sync handler error types.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No shared secret is configured. Fail closed.
    #[error("Shared secret is not configured")]
    SecretNotConfigured,

    /// The presented secret header was missing or did not match.
    #[error("Shared secret rejected")]
    SecretRejected,

    /// Token was expired, unknown, or already consumed.
    #[error("Invalid token")]
    InvalidToken,

    /// The caller's own session did not resolve to an account.
    #[error("Session invalid")]
    SessionInvalid,

    /// Accounts exist but none has an unexpired session.
    #[error("No active sessions")]
    NoActiveSessions,

    /// Active sessions exist but none is eligible by role.
    #[error("No eligible sessions")]
    NoEligibleSessions,

    /// Storage backend failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for sync handler operations.
pub type SyncResult<T> = Result<T, SyncError>;

impl From<TokenError> for SyncError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => SyncError::InvalidToken,
            TokenError::Store(e) => SyncError::Store(e),
        }
    }
}

impl SyncError {
    /// Check if this error should be logged at error level.
    pub fn is_server_error(&self) -> bool {
        matches!(self, SyncError::SecretNotConfigured | SyncError::Store(_))
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            SyncError::InvalidToken | SyncError::SessionInvalid => 401,
            SyncError::SecretRejected => 403,
            SyncError::NoActiveSessions | SyncError::NoEligibleSessions => 404,
            SyncError::SecretNotConfigured | SyncError::Store(_) => 500,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            SyncError::SecretNotConfigured => "misconfigured",
            SyncError::SecretRejected => "forbidden",
            SyncError::InvalidToken => "invalid_token",
            SyncError::SessionInvalid => "session_invalid",
            SyncError::NoActiveSessions => "no_active_sessions",
            SyncError::NoEligibleSessions => "no_eligible_sessions",
            SyncError::Store(_) => "internal_error",
        }
    }
}
