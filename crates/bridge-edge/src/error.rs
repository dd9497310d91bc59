//! Edge-side error types.

use thiserror::Error;

/// Errors from the edge sync client and reconciliation loop.
#[derive(Debug, Error)]
pub enum EdgeError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The authority rejected our shared secret.
    #[error("Sync secret rejected by authority")]
    SecretRejected,

    /// Authority reported no live sessions at all.
    #[error("No active sessions on the authority")]
    NoActiveSessions,

    /// Sessions exist but none carry an allowed role.
    #[error("No sessions eligible for sync")]
    NoEligibleSessions,

    /// The presented token did not validate.
    #[error("Token rejected by authority")]
    InvalidToken,

    /// Authority returned an error we have no specific handling for.
    #[error("Authority error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the authority.
        message: String,
    },

    /// Response body did not match the expected shape.
    #[error("Invalid authority response: {0}")]
    InvalidResponse(String),
}

impl EdgeError {
    /// Whether a retry could plausibly succeed without operator action.
    ///
    /// Secret rejection and malformed responses indicate deployment
    /// problems, not transient faults.
    pub fn is_transient(&self) -> bool {
        match self {
            EdgeError::RequestFailed(_) => true,
            EdgeError::Api { status, .. } => *status >= 500,
            EdgeError::SecretRejected
            | EdgeError::NoActiveSessions
            | EdgeError::NoEligibleSessions
            | EdgeError::InvalidToken
            | EdgeError::InvalidResponse(_) => false,
        }
    }

    /// Whether this is the typed "nobody to sync" outcome rather than a
    /// fault. The loop treats these as a clean signed-out state.
    pub fn is_empty_snapshot(&self) -> bool {
        matches!(
            self,
            EdgeError::NoActiveSessions | EdgeError::NoEligibleSessions
        )
    }
}

/// Result type alias for edge operations.
pub type EdgeResult<T> = Result<T, EdgeError>;
