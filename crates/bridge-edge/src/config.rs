//! Edge application configuration.

use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
}

/// Edge-side sync configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct EdgeConfig {
    /// Base URL of the identity authority.
    pub authority_base_url: String,

    /// Shared secret presented on every server-to-server call. Must match
    /// the authority's value exactly.
    pub shared_secret: Option<String>,

    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,

    /// Fixed delay between subscription reconnect attempts, in seconds.
    pub reconnect_delay_secs: u64,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            authority_base_url: "http://localhost:8080".to_string(),
            shared_secret: None,
            request_timeout_secs: 10,
            reconnect_delay_secs: 5,
        }
    }
}

impl EdgeConfig {
    /// Load configuration from environment variables.
    ///
    /// - `AUTHORITY_URL`: base URL of the identity authority
    /// - `BRIDGE_SHARED_SECRET`: shared secret for sync endpoints
    /// - `SYNC_REQUEST_TIMEOUT_SECS`: per-request timeout (default 10)
    /// - `SYNC_RECONNECT_DELAY_SECS`: reconnect delay (default 5)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            authority_base_url: std::env::var("AUTHORITY_URL")
                .unwrap_or(defaults.authority_base_url),
            shared_secret: std::env::var("BRIDGE_SHARED_SECRET").ok(),
            request_timeout_secs: std::env::var("SYNC_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.request_timeout_secs),
            reconnect_delay_secs: std::env::var("SYNC_RECONNECT_DELAY_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.reconnect_delay_secs),
        }
    }

    /// Per-request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Reconnect delay as a [`Duration`].
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    /// Validate the configuration for production use.
    ///
    /// The secret is optional in development; without it every sync call
    /// the authority gates will be refused.
    pub fn validate_for_production(&self) -> Result<(), ConfigError> {
        if self.shared_secret.is_none() {
            return Err(ConfigError::MissingEnvVar("BRIDGE_SHARED_SECRET".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EdgeConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.reconnect_delay(), Duration::from_secs(5));
        assert!(config.shared_secret.is_none());
    }

    #[test]
    fn test_production_requires_secret() {
        let mut config = EdgeConfig::default();
        assert!(config.validate_for_production().is_err());

        config.shared_secret = Some("secret".to_string());
        assert!(config.validate_for_production().is_ok());
    }
}
