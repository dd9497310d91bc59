//! Token lifecycle listener.
//!
//! Couples the persistent-token lifecycle to authentication events
//! explicitly: logout deletes the owner's persistent row, and a login
//! guarantees one exists. The login entry point issues its own token
//! in-band (the plaintext must ride the post-login redirect), so the
//! listener only fills the gap for logins that bypass that path, such as
//! session restores. Re-issuing here would invalidate the token already
//! handed to the redirect.

use crate::bus::{EventBusError, EventBusResult, EventHandler};
use crate::types::{AuthEvent, Event};
use async_trait::async_trait;
use bridge_tokens::{TokenIssuer, TokenStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

/// Listens for authentication events and keeps the persistent-token table
/// consistent with session state.
pub struct TokenLifecycleListener {
    issuer: Arc<TokenIssuer>,
    store: Arc<dyn TokenStore>,
}

impl TokenLifecycleListener {
    /// Create a listener over the given issuer and store.
    pub fn new(issuer: Arc<TokenIssuer>, store: Arc<dyn TokenStore>) -> Self {
        Self { issuer, store }
    }
}

#[async_trait]
impl EventHandler for TokenLifecycleListener {
    async fn handle(&self, event: Event) -> EventBusResult<()> {
        let auth_event: AuthEvent = event
            .parse_payload()
            .map_err(|e| EventBusError::PublishError(format!("malformed auth event: {}", e)))?;

        match auth_event {
            AuthEvent::UserAuthenticated { owner_id, .. } => {
                let exists = self
                    .store
                    .persistent_exists(owner_id, Utc::now())
                    .await
                    .map_err(|e| EventBusError::PublishError(e.to_string()))?;
                if !exists {
                    self.issuer
                        .issue_persistent(owner_id)
                        .await
                        .map_err(|e| EventBusError::PublishError(e.to_string()))?;
                    debug!(%owner_id, "issued persistent token for login without one");
                }
            }
            AuthEvent::UserLoggedOut { owner_id } => {
                let removed = self
                    .issuer
                    .revoke_persistent(owner_id)
                    .await
                    .map_err(|e| EventBusError::PublishError(e.to_string()))?;
                if !removed {
                    warn!(%owner_id, "logout for owner with no persistent token row");
                }
            }
            AuthEvent::IdentityUpdated { .. } => {}
        }

        Ok(())
    }

    fn topics(&self) -> Vec<String> {
        vec![
            "authority.user.authenticated".to_string(),
            "authority.user.logged_out".to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{EventBus, MemoryEventBus};
    use bridge_tokens::MemoryTokenStore;
    use uuid::Uuid;

    fn fixture() -> (MemoryEventBus, Arc<MemoryTokenStore>, Arc<TokenIssuer>) {
        let store = Arc::new(MemoryTokenStore::new());
        let issuer = Arc::new(TokenIssuer::new(store.clone()));
        (MemoryEventBus::new(), store, issuer)
    }

    #[tokio::test]
    async fn test_login_event_ensures_persistent_token() {
        let (bus, store, issuer) = fixture();
        bus.register_handler(Arc::new(TokenLifecycleListener::new(
            issuer.clone(),
            store.clone(),
        )))
        .await
        .unwrap();

        let owner = Uuid::now_v7();
        bus.publish(
            AuthEvent::UserAuthenticated {
                owner_id: owner,
                roles: vec!["member".to_string()],
            }
            .to_event(),
        )
        .await
        .unwrap();

        assert!(store.persistent_exists(owner, Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_login_event_keeps_existing_token() {
        let (bus, store, issuer) = fixture();
        bus.register_handler(Arc::new(TokenLifecycleListener::new(
            issuer.clone(),
            store.clone(),
        )))
        .await
        .unwrap();

        let owner = Uuid::now_v7();
        let issued = issuer.issue_persistent(owner).await.unwrap();

        bus.publish(
            AuthEvent::UserAuthenticated {
                owner_id: owner,
                roles: vec![],
            }
            .to_event(),
        )
        .await
        .unwrap();

        // The token handed to the redirect still resolves.
        assert!(store
            .find_persistent(&issued.plaintext, Utc::now())
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_logout_event_deletes_persistent_token() {
        let (bus, store, issuer) = fixture();
        bus.register_handler(Arc::new(TokenLifecycleListener::new(
            issuer.clone(),
            store.clone(),
        )))
        .await
        .unwrap();

        let owner = Uuid::now_v7();
        issuer.issue_persistent(owner).await.unwrap();

        bus.publish(AuthEvent::UserLoggedOut { owner_id: owner }.to_event())
            .await
            .unwrap();

        assert!(!store.persistent_exists(owner, Utc::now()).await.unwrap());
    }
}
