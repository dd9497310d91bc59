//! HTTP client for the authority's sync endpoints.
//!
//! Every call here is server-to-server and carries the shared secret in
//! the `X-Sync-Secret` header. The client never sees or forwards the
//! authority's session cookies; tokens and snapshots are the only
//! identity material that crosses this boundary.

use crate::config::EdgeConfig;
use crate::error::{EdgeError, EdgeResult};
use bridge_tokens::IdentityRecord;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Header carrying the shared secret.
pub const SYNC_SECRET_HEADER: &str = "X-Sync-Secret";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ActiveSessionsRequest {
    request_source: String,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActiveSessionsResponse {
    #[allow(dead_code)]
    success: bool,
    active_sessions: Vec<IdentityRecord>,
    #[allow(dead_code)]
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateTokenRequest {
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateTokenResponse {
    #[allow(dead_code)]
    success: bool,
    owner_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidatePersistentTokenResponse {
    valid: bool,
    owner_id: Uuid,
    identity: IdentityRecord,
}

/// Account and identity a persistent token resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedIdentity {
    /// Authority-side account id.
    pub owner_id: Uuid,

    /// Current identity of that account.
    pub identity: IdentityRecord,
}

/// Error envelope the authority returns on non-success statuses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorEnvelope {
    error: String,
    #[serde(default)]
    message: String,
}

/// Client for the authority's sync endpoints.
#[derive(Clone)]
pub struct EdgeSyncClient {
    client: Client,
    base_url: String,
    shared_secret: Option<String>,
}

impl EdgeSyncClient {
    /// Create a client from edge configuration.
    pub fn new(config: &EdgeConfig) -> EdgeResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.authority_base_url.trim_end_matches('/').to_string(),
            shared_secret: config.shared_secret.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_secret(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.shared_secret {
            Some(secret) => request.header(SYNC_SECRET_HEADER, secret),
            None => request,
        }
    }

    /// Fetch the authority's snapshot of eligible identities with live
    /// sessions.
    ///
    /// The two empty outcomes surface as typed errors:
    /// [`EdgeError::NoActiveSessions`] and [`EdgeError::NoEligibleSessions`].
    #[instrument(skip(self))]
    pub async fn fetch_active_sessions(&self) -> EdgeResult<Vec<IdentityRecord>> {
        debug!("Fetching active-sessions snapshot");

        let body = ActiveSessionsRequest {
            request_source: "edge-app".to_string(),
            timestamp: Utc::now(),
        };
        let request = self
            .with_secret(self.client.post(self.url("/sync/active-sessions")))
            .json(&body);

        let response = request.send().await?;
        let parsed: ActiveSessionsResponse = self.handle_response(response).await?;
        Ok(parsed.active_sessions)
    }

    /// Consume an exchange token, resolving it to an account id.
    ///
    /// Single use: the token is dead after this call whether or not the
    /// caller acts on the result.
    #[instrument(skip(self, token))]
    pub async fn validate_exchange_token(&self, token: &str) -> EdgeResult<Uuid> {
        let body = ValidateTokenRequest {
            token: token.to_string(),
        };
        let request = self
            .with_secret(self.client.post(self.url("/sync/validate-token")))
            .json(&body);

        let response = request.send().await?;
        let parsed: ValidateTokenResponse = self.handle_response(response).await?;
        Ok(parsed.owner_id)
    }

    /// Revalidate a persistent sync token without consuming it.
    ///
    /// Scoped to the token's owner: the answer is who *this* token
    /// belongs to, never whoever else happens to be logged in.
    #[instrument(skip(self, token))]
    pub async fn validate_persistent_token(&self, token: &str) -> EdgeResult<ResolvedIdentity> {
        let body = ValidateTokenRequest {
            token: token.to_string(),
        };
        let request = self
            .with_secret(
                self.client
                    .post(self.url("/sync/validate-persistent-token")),
            )
            .json(&body);

        let response = request.send().await?;
        let parsed: ValidatePersistentTokenResponse = self.handle_response(response).await?;
        if !parsed.valid {
            return Err(EdgeError::InvalidToken);
        }
        Ok(ResolvedIdentity {
            owner_id: parsed.owner_id,
            identity: parsed.identity,
        })
    }

    async fn handle_response<T>(&self, response: reqwest::Response) -> EdgeResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let envelope: Option<ErrorEnvelope> = serde_json::from_str(&text).ok();

            let code = envelope.as_ref().map(|e| e.error.as_str()).unwrap_or("");
            warn!(status = status.as_u16(), code, "Authority returned an error");

            return Err(match code {
                "forbidden" | "misconfigured" => EdgeError::SecretRejected,
                "no_active_sessions" => EdgeError::NoActiveSessions,
                "no_eligible_sessions" => EdgeError::NoEligibleSessions,
                "invalid_token" => EdgeError::InvalidToken,
                _ => EdgeError::Api {
                    status: status.as_u16(),
                    message: envelope.map(|e| e.message).unwrap_or(text),
                },
            });
        }

        response
            .json()
            .await
            .map_err(|e| EdgeError::InvalidResponse(e.to_string()))
    }
}

impl std::fmt::Debug for EdgeSyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeSyncClient")
            .field("base_url", &self.base_url)
            .field("secret_configured", &self.shared_secret.is_some())
            .finish()
    }
}
