//! Last-known-identity cache.
//!
//! When the authority is unreachable, the loop falls back to the most
//! recently confirmed identity for display purposes only. Nothing here
//! grants access; a cached identity is a label, not a session.

use async_trait::async_trait;
use bridge_tokens::IdentityRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A previously confirmed identity with its confirmation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CachedIdentity {
    /// The identity as last confirmed by the authority.
    pub identity: IdentityRecord,

    /// When the authority last confirmed it.
    pub confirmed_at: DateTime<Utc>,
}

impl CachedIdentity {
    /// Wrap an identity confirmed now.
    pub fn confirmed_now(identity: IdentityRecord) -> Self {
        Self {
            identity,
            confirmed_at: Utc::now(),
        }
    }

    /// Age of the cached record.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.confirmed_at
    }
}

/// Storage for the last confirmed identity.
#[async_trait]
pub trait IdentityCache: Send + Sync {
    /// Replace the cached identity.
    async fn store(&self, cached: CachedIdentity);

    /// Current cached identity, if any.
    async fn load(&self) -> Option<CachedIdentity>;

    /// Drop the cached identity.
    async fn clear(&self);
}

/// In-memory cache, suitable for a single-process edge application.
pub struct MemoryIdentityCache {
    slot: Arc<RwLock<Option<CachedIdentity>>>,
}

impl MemoryIdentityCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            slot: Arc::new(RwLock::new(None)),
        }
    }
}

impl Default for MemoryIdentityCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityCache for MemoryIdentityCache {
    async fn store(&self, cached: CachedIdentity) {
        *self.slot.write().await = Some(cached);
    }

    async fn load(&self) -> Option<CachedIdentity> {
        self.slot.read().await.clone()
    }

    async fn clear(&self) {
        *self.slot.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn identity() -> IdentityRecord {
        IdentityRecord::new("ext-1", "alice", "alice@example.com")
    }

    #[tokio::test]
    async fn test_store_load_clear() {
        let cache = MemoryIdentityCache::new();
        assert!(cache.load().await.is_none());

        cache.store(CachedIdentity::confirmed_now(identity())).await;
        let loaded = cache.load().await.unwrap();
        assert_eq!(loaded.identity.username, "alice");

        cache.clear().await;
        assert!(cache.load().await.is_none());
    }

    #[tokio::test]
    async fn test_store_replaces() {
        let cache = MemoryIdentityCache::new();
        cache.store(CachedIdentity::confirmed_now(identity())).await;
        cache
            .store(CachedIdentity::confirmed_now(IdentityRecord::new(
                "ext-2",
                "bob",
                "bob@example.com",
            )))
            .await;

        let loaded = cache.load().await.unwrap();
        assert_eq!(loaded.identity.username, "bob");
    }

    #[test]
    fn test_age() {
        let cached = CachedIdentity {
            identity: identity(),
            confirmed_at: Utc::now() - Duration::minutes(3),
        };
        assert!(cached.age(Utc::now()) >= Duration::minutes(3));
    }
}
