//! Authority-side sync endpoint handlers.
//!
//! Handlers are synchronous request/response with no persistent worker
//! process; concurrency arises only from simultaneous requests against
//! shared storage. Transport wiring (routing, cookies, header extraction)
//! lives with the host application; this module owns the semantics.
//!
//! Endpoints map onto handlers as follows:
//!
//! | Endpoint                          | Handler                            | Gate    |
//! |-----------------------------------|------------------------------------|---------|
//! | `POST /sync/active-sessions`      | [`SyncAuthority::handle_active_sessions`] | secret  |
//! | `POST /sync/validate-session`     | [`SyncAuthority::handle_validate_session`] | session |
//! | `GET /sync/issue-token`           | [`SyncAuthority::handle_issue_token`] | session |
//! | `POST /sync/validate-token`       | [`SyncAuthority::handle_validate_token`] | secret  |
//! | `GET /sync/token-exists`          | [`SyncAuthority::handle_token_exists`] | session |
//! | `POST /sync/validate-persistent-token` | [`SyncAuthority::handle_validate_persistent_token`] | secret  |

use crate::config::AuthorityConfig;
use crate::error::{SyncError, SyncResult};
use crate::secret::SharedSecretValidator;
use crate::snapshot::{SessionDirectory, SnapshotProvider};
use bridge_events::{AuthEvent, EventBus, MemoryEventBus, TokenLifecycleListener};
use bridge_tokens::{
    IdentityLinkStore, IdentityRecord, MemoryIdentityLinkStore, MemoryTokenStore, TokenIssuer,
    TokenStore, TokenValidator,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Body of `POST /sync/active-sessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSessionsRequest {
    /// Identifies the calling system, for the audit log.
    pub request_source: String,

    /// Caller's clock at request time.
    pub timestamp: DateTime<Utc>,
}

/// Successful response to `POST /sync/active-sessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSessionsResponse {
    /// Always true on this shape; failures use the error code instead.
    pub success: bool,

    /// Eligible identities with live sessions.
    pub active_sessions: Vec<IdentityRecord>,

    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

/// Successful response to `POST /sync/validate-session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateSessionResponse {
    /// Always true on this shape.
    pub success: bool,

    /// The caller's identity snapshot.
    pub identity: IdentityRecord,
}

/// Body of `POST /sync/validate-token` and
/// `POST /sync/validate-persistent-token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTokenRequest {
    /// Presented token plaintext.
    pub token: String,
}

/// Successful response to `POST /sync/validate-token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTokenResponse {
    /// Always true on this shape.
    pub success: bool,

    /// Account the consumed token belonged to.
    pub owner_id: Uuid,
}

/// Response to `GET /sync/token-exists`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenExistsResponse {
    /// Whether the caller's account holds a live persistent token.
    pub token_exists: bool,
}

/// Response to `POST /sync/validate-persistent-token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePersistentTokenResponse {
    /// Whether the token resolved to a live row.
    pub valid: bool,

    /// Account the token belongs to.
    pub owner_id: Uuid,

    /// Current identity of that account, so the caller can refresh its
    /// view without a second round trip.
    pub identity: IdentityRecord,
}

/// Redirect target produced by `GET /sync/issue-token` and by the login
/// flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectTarget {
    /// Fully-formed URL the caller should be redirected to. Carries the
    /// token plaintext; this is its one appearance.
    pub redirect_url: String,

    /// When the embedded token stops validating.
    pub expires_at: DateTime<Utc>,
}

/// The authority-side sync service.
///
/// Owns the token store, issuer, validator, secret gate, snapshot
/// provider, identity links, and the event bus the token lifecycle
/// listener rides on.
pub struct SyncAuthority {
    config: AuthorityConfig,
    secret: SharedSecretValidator,
    store: Arc<dyn TokenStore>,
    issuer: Arc<TokenIssuer>,
    validator: TokenValidator,
    snapshots: SnapshotProvider,
    links: Arc<dyn IdentityLinkStore>,
    directory: Arc<dyn SessionDirectory>,
    bus: Arc<MemoryEventBus>,
}

impl SyncAuthority {
    /// Create the service with in-memory storage.
    pub async fn new(config: AuthorityConfig, directory: Arc<dyn SessionDirectory>) -> Self {
        Self::with_store(config, directory, Arc::new(MemoryTokenStore::new())).await
    }

    /// Create the service over an explicit token store.
    pub async fn with_store(
        config: AuthorityConfig,
        directory: Arc<dyn SessionDirectory>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        let secret = SharedSecretValidator::new(config.shared_secret.clone());
        let issuer = Arc::new(TokenIssuer::with_ttls(
            store.clone(),
            config.exchange_ttl(),
            config.persistent_ttl(),
        ));
        let validator = TokenValidator::new(store.clone());
        let snapshots = SnapshotProvider::new(directory.clone(), config.allowed_roles.clone());
        let bus = Arc::new(MemoryEventBus::new());

        bus.register_handler(Arc::new(TokenLifecycleListener::new(
            issuer.clone(),
            store.clone(),
        )))
        .await
        .expect("registering a handler on the memory bus cannot fail");

        Self {
            config,
            secret,
            store,
            issuer,
            validator,
            snapshots,
            links: Arc::new(MemoryIdentityLinkStore::new()),
            directory,
            bus,
        }
    }

    /// The event bus edge clients subscribe to for push updates.
    pub fn bus(&self) -> Arc<MemoryEventBus> {
        self.bus.clone()
    }

    /// `POST /sync/active-sessions` — bulk snapshot for reconciliation.
    pub async fn handle_active_sessions(
        &self,
        secret_header: Option<&str>,
        request: ActiveSessionsRequest,
    ) -> SyncResult<ActiveSessionsResponse> {
        self.secret.verify(secret_header)?;
        debug!(source = %request.request_source, "active-sessions snapshot requested");

        let active_sessions = self.snapshots.snapshot(Utc::now()).await?;
        Ok(ActiveSessionsResponse {
            success: true,
            active_sessions,
            timestamp: Utc::now(),
        })
    }

    /// `POST /sync/validate-session` — validates the caller's own live
    /// session via the authority's native mechanism (a cookie, not the
    /// shared secret). The host resolves the cookie to an account before
    /// calling in; `None` means the cookie did not resolve.
    ///
    /// A successful validation is a reconciliation: the identity link for
    /// the account is created or refreshed here.
    pub async fn handle_validate_session(
        &self,
        session_owner: Option<Uuid>,
    ) -> SyncResult<ValidateSessionResponse> {
        let owner_id = session_owner.ok_or(SyncError::SessionInvalid)?;
        let identity = self
            .directory
            .identity(owner_id)
            .await?
            .ok_or(SyncError::SessionInvalid)?;

        self.links.link(owner_id, &identity.external_id).await?;

        Ok(ValidateSessionResponse {
            success: true,
            identity,
        })
    }

    /// `GET /sync/issue-token` — issues an exchange token for an
    /// authenticated caller and returns the redirect into the edge
    /// application's verify endpoint.
    pub async fn handle_issue_token(
        &self,
        session_owner: Option<Uuid>,
    ) -> SyncResult<RedirectTarget> {
        let owner_id = session_owner.ok_or(SyncError::SessionInvalid)?;
        let issued = self.issuer.issue_exchange(owner_id).await?;

        Ok(RedirectTarget {
            redirect_url: format!(
                "{}/verify-token?token={}",
                self.config.edge_base_url.trim_end_matches('/'),
                issued.plaintext
            ),
            expires_at: issued.expires_at,
        })
    }

    /// `POST /sync/validate-token` — consumes an exchange token.
    pub async fn handle_validate_token(
        &self,
        secret_header: Option<&str>,
        request: ValidateTokenRequest,
    ) -> SyncResult<ValidateTokenResponse> {
        self.secret.verify(secret_header)?;

        let owner_id = self.validator.validate_exchange(&request.token).await?;
        Ok(ValidateTokenResponse {
            success: true,
            owner_id,
        })
    }

    /// `GET /sync/token-exists` — reports on the caller's own account
    /// only, authenticated by the native session.
    pub async fn handle_token_exists(
        &self,
        session_owner: Option<Uuid>,
    ) -> SyncResult<TokenExistsResponse> {
        let owner_id = session_owner.ok_or(SyncError::SessionInvalid)?;
        let token_exists = self.store.persistent_exists(owner_id, Utc::now()).await?;
        Ok(TokenExistsResponse { token_exists })
    }

    /// `POST /sync/validate-persistent-token` — repeated revalidation
    /// without consumption. Server-to-server, so secret-gated like the
    /// other machine endpoints.
    pub async fn handle_validate_persistent_token(
        &self,
        secret_header: Option<&str>,
        request: ValidateTokenRequest,
    ) -> SyncResult<ValidatePersistentTokenResponse> {
        self.secret.verify(secret_header)?;

        let owner_id = self.validator.validate_persistent(&request.token).await?;
        let identity = self
            .directory
            .identity(owner_id)
            .await?
            .ok_or(SyncError::SessionInvalid)?;

        Ok(ValidatePersistentTokenResponse {
            valid: true,
            owner_id,
            identity,
        })
    }

    /// Login entry point.
    ///
    /// Replaces the owner's persistent token, appends it to the post-login
    /// redirect, and publishes the lifecycle events. The token is issued
    /// in-band because its plaintext must ride the redirect.
    pub async fn handle_login(
        &self,
        owner_id: Uuid,
        redirect_to: &str,
    ) -> SyncResult<RedirectTarget> {
        let identity = self
            .directory
            .identity(owner_id)
            .await?
            .ok_or(SyncError::SessionInvalid)?;

        let issued = self.issuer.issue_persistent(owner_id).await?;
        info!(%owner_id, "login: persistent sync token replaced");

        self.publish(
            AuthEvent::UserAuthenticated {
                owner_id,
                roles: identity.roles.clone(),
            }
            .to_event(),
        )
        .await;
        self.publish(AuthEvent::IdentityUpdated { owner_id }.to_event())
            .await;

        let separator = if redirect_to.contains('?') { '&' } else { '?' };
        Ok(RedirectTarget {
            redirect_url: format!("{}{}syncToken={}", redirect_to, separator, issued.plaintext),
            expires_at: issued.expires_at,
        })
    }

    /// Logout entry point. The lifecycle listener deletes the persistent
    /// row before the publish returns.
    pub async fn handle_logout(&self, owner_id: Uuid) -> SyncResult<()> {
        self.publish(AuthEvent::UserLoggedOut { owner_id }.to_event())
            .await;
        self.publish(AuthEvent::IdentityUpdated { owner_id }.to_event())
            .await;
        info!(%owner_id, "logout: persistent sync token revoked");
        Ok(())
    }

    /// Storage hygiene: drop expired rows of both token variants.
    /// Correctness never depends on this running.
    pub async fn sweep_expired_tokens(&self) -> SyncResult<usize> {
        Ok(self.store.purge_expired(Utc::now()).await?)
    }

    async fn publish(&self, event: bridge_events::Event) {
        // The memory bus only errors on handler plumbing, which is logged
        // inside the bus; sync handlers never fail a request over it.
        let _ = self.bus.publish(event).await;
    }
}
