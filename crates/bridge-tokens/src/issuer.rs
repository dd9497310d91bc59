//! Token issuance.
//!
//! The issuer never returns a token it could not durably record: storage
//! failures surface before the plaintext leaves this module.

use crate::error::StoreResult;
use crate::store::TokenStore;
use crate::token::{
    generate_token_value, ExchangeTokenRecord, IssuedToken, PersistentTokenRecord,
    EXCHANGE_TOKEN_TTL_SECS, PERSISTENT_TOKEN_TTL_SECS,
};
use chrono::Duration;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Issues exchange and persistent sync tokens against a token store.
pub struct TokenIssuer {
    store: Arc<dyn TokenStore>,
    exchange_ttl: Duration,
    persistent_ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("exchange_ttl", &self.exchange_ttl)
            .field("persistent_ttl", &self.persistent_ttl)
            .finish()
    }
}

impl TokenIssuer {
    /// Create an issuer with the default lifetimes (2 and 5 minutes).
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self::with_ttls(
            store,
            Duration::seconds(EXCHANGE_TOKEN_TTL_SECS),
            Duration::seconds(PERSISTENT_TOKEN_TTL_SECS),
        )
    }

    /// Create an issuer with explicit lifetimes.
    pub fn with_ttls(
        store: Arc<dyn TokenStore>,
        exchange_ttl: Duration,
        persistent_ttl: Duration,
    ) -> Self {
        Self {
            store,
            exchange_ttl,
            persistent_ttl,
        }
    }

    /// Issue a single-use exchange token for a redirect handoff.
    ///
    /// Only the salted digest is stored; the plaintext in the returned
    /// `IssuedToken` is the one and only copy.
    pub async fn issue_exchange(&self, owner_id: Uuid) -> StoreResult<IssuedToken> {
        let plaintext = generate_token_value();
        let record = ExchangeTokenRecord::new(owner_id, &plaintext, self.exchange_ttl);
        let expires_at = record.expires_at;

        self.store.insert_exchange(record).await?;
        debug!(%owner_id, %expires_at, "issued exchange token");

        Ok(IssuedToken {
            plaintext,
            expires_at,
        })
    }

    /// Issue a persistent sync token, replacing any existing row for the
    /// owner. Called on every login.
    pub async fn issue_persistent(&self, owner_id: Uuid) -> StoreResult<IssuedToken> {
        let plaintext = generate_token_value();
        let record = PersistentTokenRecord::new(owner_id, plaintext.clone(), self.persistent_ttl);
        let expires_at = record.expires_at;

        self.store.upsert_persistent(record).await?;
        debug!(%owner_id, %expires_at, "issued persistent sync token");

        Ok(IssuedToken {
            plaintext,
            expires_at,
        })
    }

    /// Delete the owner's persistent row. Called on logout.
    pub async fn revoke_persistent(&self, owner_id: Uuid) -> StoreResult<bool> {
        let removed = self.store.delete_persistent(owner_id).await?;
        debug!(%owner_id, removed, "revoked persistent sync token");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTokenStore;
    use chrono::Utc;

    fn issuer_with_store() -> (TokenIssuer, Arc<MemoryTokenStore>) {
        let store = Arc::new(MemoryTokenStore::new());
        (TokenIssuer::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_issue_exchange_stores_digest_only() {
        let (issuer, store) = issuer_with_store();
        let owner = Uuid::now_v7();

        let issued = issuer.issue_exchange(owner).await.unwrap();
        assert!(!issued.plaintext.is_empty());
        assert!(issued.expires_at > Utc::now());
        assert_eq!(store.exchange_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_issue_exchange_unbounded_per_owner() {
        let (issuer, store) = issuer_with_store();
        let owner = Uuid::now_v7();

        issuer.issue_exchange(owner).await.unwrap();
        issuer.issue_exchange(owner).await.unwrap();
        issuer.issue_exchange(owner).await.unwrap();
        assert_eq!(store.exchange_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_issue_persistent_replaces_previous() {
        let (issuer, store) = issuer_with_store();
        let owner = Uuid::now_v7();

        let first = issuer.issue_persistent(owner).await.unwrap();
        let second = issuer.issue_persistent(owner).await.unwrap();
        assert_ne!(first.plaintext, second.plaintext);

        use crate::store::TokenStore;
        assert!(store
            .find_persistent(&first.plaintext, Utc::now())
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find_persistent(&second.plaintext, Utc::now())
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_revoke_persistent() {
        let (issuer, _store) = issuer_with_store();
        let owner = Uuid::now_v7();

        issuer.issue_persistent(owner).await.unwrap();
        assert!(issuer.revoke_persistent(owner).await.unwrap());
        assert!(!issuer.revoke_persistent(owner).await.unwrap());
    }
}
