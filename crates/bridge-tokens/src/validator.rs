//! Token validation.
//!
//! Consumes presented tokens, resolves the owning account, and enforces
//! the consumption semantics of each variant. Externally every rejection
//! is the same `TokenError::Invalid`; the reason lands in the logs.

use crate::error::{TokenError, TokenResult};
use crate::store::{ConsumeOutcome, TokenStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

/// Validates presented tokens against a token store.
pub struct TokenValidator {
    store: Arc<dyn TokenStore>,
}

impl TokenValidator {
    /// Create a validator over the given store.
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Validate and consume an exchange token.
    ///
    /// The row is deleted before success is returned. If the store reports
    /// that the delete failed after the match, the success stands and the
    /// failure is logged loudly; the token is never re-validated.
    pub async fn validate_exchange(&self, presented: &str) -> TokenResult<Uuid> {
        match self.store.consume_exchange(presented, Utc::now()).await? {
            ConsumeOutcome::Consumed { owner_id, removed } => {
                if !removed {
                    error!(
                        %owner_id,
                        "exchange token validated but row delete failed; \
                         the token must not be accepted again"
                    );
                }
                debug!(%owner_id, "exchange token consumed");
                Ok(owner_id)
            }
            ConsumeOutcome::Expired => {
                debug!("exchange token rejected: expired");
                Err(TokenError::Invalid)
            }
            ConsumeOutcome::NoMatch => {
                debug!("exchange token rejected: no digest match");
                Err(TokenError::Invalid)
            }
        }
    }

    /// Validate a persistent sync token without consuming it.
    ///
    /// Remains valid until its own expiry or an explicit logout.
    pub async fn validate_persistent(&self, presented: &str) -> TokenResult<Uuid> {
        match self.store.find_persistent(presented, Utc::now()).await? {
            Some(record) => {
                debug!(owner_id = %record.owner_id, "persistent token validated");
                Ok(record.owner_id)
            }
            None => {
                debug!("persistent token rejected: expired or not found");
                Err(TokenError::Invalid)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issuer::TokenIssuer;
    use crate::store::MemoryTokenStore;
    use chrono::Duration;

    fn fixture() -> (TokenIssuer, TokenValidator) {
        let store = Arc::new(MemoryTokenStore::new());
        (
            TokenIssuer::new(store.clone()),
            TokenValidator::new(store),
        )
    }

    #[tokio::test]
    async fn test_exchange_validates_at_most_once() {
        let (issuer, validator) = fixture();
        let owner = Uuid::now_v7();
        let issued = issuer.issue_exchange(owner).await.unwrap();

        let resolved = validator.validate_exchange(&issued.plaintext).await.unwrap();
        assert_eq!(resolved, owner);

        let replay = validator.validate_exchange(&issued.plaintext).await;
        assert!(matches!(replay, Err(TokenError::Invalid)));
    }

    #[tokio::test]
    async fn test_expired_exchange_rejected() {
        let store = Arc::new(MemoryTokenStore::new());
        let issuer =
            TokenIssuer::with_ttls(store.clone(), Duration::seconds(-1), Duration::seconds(300));
        let validator = TokenValidator::new(store);

        let issued = issuer.issue_exchange(Uuid::now_v7()).await.unwrap();
        let result = validator.validate_exchange(&issued.plaintext).await;
        assert!(matches!(result, Err(TokenError::Invalid)));
    }

    #[tokio::test]
    async fn test_unknown_token_rejected() {
        let (_issuer, validator) = fixture();
        let result = validator.validate_exchange("not-a-token").await;
        assert!(matches!(result, Err(TokenError::Invalid)));
    }

    #[tokio::test]
    async fn test_persistent_survives_validation() {
        let (issuer, validator) = fixture();
        let owner = Uuid::now_v7();
        let issued = issuer.issue_persistent(owner).await.unwrap();

        for _ in 0..3 {
            let resolved = validator
                .validate_persistent(&issued.plaintext)
                .await
                .unwrap();
            assert_eq!(resolved, owner);
        }
    }

    #[tokio::test]
    async fn test_persistent_dies_on_logout() {
        let (issuer, validator) = fixture();
        let owner = Uuid::now_v7();
        let issued = issuer.issue_persistent(owner).await.unwrap();

        issuer.revoke_persistent(owner).await.unwrap();
        let result = validator.validate_persistent(&issued.plaintext).await;
        assert!(matches!(result, Err(TokenError::Invalid)));
    }

    #[tokio::test]
    async fn test_expired_persistent_rejected() {
        let store = Arc::new(MemoryTokenStore::new());
        let issuer =
            TokenIssuer::with_ttls(store.clone(), Duration::seconds(120), Duration::seconds(-1));
        let validator = TokenValidator::new(store);

        let issued = issuer.issue_persistent(Uuid::now_v7()).await.unwrap();
        let result = validator.validate_persistent(&issued.plaintext).await;
        assert!(matches!(result, Err(TokenError::Invalid)));
    }
}
