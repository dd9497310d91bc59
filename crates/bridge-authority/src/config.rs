//! Authority-side configuration.
//!
//! Loaded from environment variables with defaults suitable for local
//! development. Production deployments must configure the shared secret;
//! without it every server-to-server call fails closed.

use bridge_tokens::{EXCHANGE_TOKEN_TTL_SECS, PERSISTENT_TOKEN_TTL_SECS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing required environment variable.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
}

/// Configuration for the authority-side sync handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityConfig {
    /// Pre-shared secret gating server-to-server calls.
    pub shared_secret: Option<String>,

    /// Base URL of the edge application, target of the token handoff
    /// redirect.
    pub edge_base_url: String,

    /// Roles eligible for automatic session sync.
    pub allowed_roles: Vec<String>,

    /// Exchange token lifetime in seconds.
    pub exchange_ttl_secs: i64,

    /// Persistent sync token lifetime in seconds.
    pub persistent_ttl_secs: i64,
}

impl Default for AuthorityConfig {
    /// Returns default configuration suitable for local development.
    fn default() -> Self {
        Self {
            shared_secret: None,
            edge_base_url: "http://localhost:3000".to_string(),
            allowed_roles: vec!["member".to_string()],
            exchange_ttl_secs: EXCHANGE_TOKEN_TTL_SECS,
            persistent_ttl_secs: PERSISTENT_TOKEN_TTL_SECS,
        }
    }
}

impl AuthorityConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `BRIDGE_SHARED_SECRET`: pre-shared server-to-server secret
    /// - `EDGE_APP_URL`: edge application base URL (default: http://localhost:3000)
    /// - `BRIDGE_ALLOWED_ROLES`: comma-separated role allow-list (default: member)
    /// - `EXCHANGE_TOKEN_TTL_SECS`: exchange token lifetime (default: 120)
    /// - `PERSISTENT_TOKEN_TTL_SECS`: persistent token lifetime (default: 300)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            shared_secret: std::env::var("BRIDGE_SHARED_SECRET").ok(),
            edge_base_url: std::env::var("EDGE_APP_URL").unwrap_or(default.edge_base_url),
            allowed_roles: std::env::var("BRIDGE_ALLOWED_ROLES")
                .map(|s| {
                    s.split(',')
                        .map(|r| r.trim().to_string())
                        .filter(|r| !r.is_empty())
                        .collect()
                })
                .unwrap_or(default.allowed_roles),
            exchange_ttl_secs: std::env::var("EXCHANGE_TOKEN_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.exchange_ttl_secs),
            persistent_ttl_secs: std::env::var("PERSISTENT_TOKEN_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.persistent_ttl_secs),
        }
    }

    /// Exchange token TTL as a chrono duration.
    pub fn exchange_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.exchange_ttl_secs)
    }

    /// Persistent token TTL as a chrono duration.
    pub fn persistent_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.persistent_ttl_secs)
    }

    /// Validate that all required configuration is present for production.
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
    fn test_default_config() {
        let config = AuthorityConfig::default();
        assert_eq!(config.exchange_ttl_secs, 120);
        assert_eq!(config.persistent_ttl_secs, 300);
        assert!(config.shared_secret.is_none());
    }

    #[test]
    fn test_validate_for_production() {
        let mut config = AuthorityConfig::default();
        assert!(config.validate_for_production().is_err());

        config.shared_secret = Some("s3cret".to_string());
        assert!(config.validate_for_production().is_ok());
    }

    #[test]
    fn test_ttl_helpers() {
        let config = AuthorityConfig::default();
        assert_eq!(config.exchange_ttl(), chrono::Duration::seconds(120));
        assert_eq!(config.persistent_ttl(), chrono::Duration::seconds(300));
    }
}
