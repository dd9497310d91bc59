//! Shared-secret gate for server-to-server calls.
//!
//! Every server-to-server endpoint is gated by a static pre-shared value
//! carried in a request header, independent of any browser session or
//! cookie. The comparison is constant-time.

use crate::error::{SyncError, SyncResult};
use bridge_tokens::constant_time_str_eq;
use tracing::warn;

/// Header carrying the pre-shared secret.
pub const SYNC_SECRET_HEADER: &str = "X-Sync-Secret";

/// Validates the shared-secret header on inbound server-to-server calls.
pub struct SharedSecretValidator {
    secret: Option<String>,
}

impl std::fmt::Debug for SharedSecretValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSecretValidator")
            .field("configured", &self.secret.is_some())
            .finish()
    }
}

impl SharedSecretValidator {
    /// Create a validator. `None` means no secret is configured, which is
    /// a misconfiguration: every verification then fails closed.
    pub fn new(secret: Option<String>) -> Self {
        if secret.is_none() {
            warn!("no shared secret configured; all server-to-server calls will be rejected");
        }
        Self { secret }
    }

    /// Verify a presented header value.
    pub fn verify(&self, presented: Option<&str>) -> SyncResult<()> {
        let configured = match self.secret.as_deref() {
            Some(s) => s,
            None => return Err(SyncError::SecretNotConfigured),
        };
        match presented {
            Some(value) if constant_time_str_eq(value, configured) => Ok(()),
            Some(_) => {
                warn!("server-to-server call rejected: secret mismatch");
                Err(SyncError::SecretRejected)
            }
            None => {
                warn!("server-to-server call rejected: missing {} header", SYNC_SECRET_HEADER);
                Err(SyncError::SecretRejected)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_secret_accepted() {
        let validator = SharedSecretValidator::new(Some("s3cret".to_string()));
        assert!(validator.verify(Some("s3cret")).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let validator = SharedSecretValidator::new(Some("s3cret".to_string()));
        assert!(matches!(
            validator.verify(Some("wrong")),
            Err(SyncError::SecretRejected)
        ));
    }

    #[test]
    fn test_missing_header_rejected() {
        let validator = SharedSecretValidator::new(Some("s3cret".to_string()));
        assert!(matches!(validator.verify(None), Err(SyncError::SecretRejected)));
    }

    #[test]
    fn test_unconfigured_secret_fails_closed() {
        let validator = SharedSecretValidator::new(None);
        // Even a "correct looking" value is rejected when nothing is configured.
        assert!(matches!(
            validator.verify(Some("anything")),
            Err(SyncError::SecretNotConfigured)
        ));
        assert!(matches!(
            validator.verify(None),
            Err(SyncError::SecretNotConfigured)
        ));
    }
}
