//! Identity records and identity links.
//!
//! `IdentityRecord` is the minimal snapshot of an account that crosses the
//! wire between the authority and the edge application. `IdentityLink`
//! maps the authority's internal account ID to the identity ID the edge
//! application uses, uniquely in both directions.

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Minimal identity snapshot for bulk reconciliation.
///
/// Serialized in camelCase because this is the wire shape consumed by the
/// edge application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    /// Identity ID used by the edge application.
    pub external_id: String,

    /// Login name.
    pub username: String,

    /// Email address.
    pub email: String,

    /// Display name, if set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Role names assigned on the authority.
    pub roles: Vec<String>,

    /// Avatar image URL, if set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,

    /// Additional attributes.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl IdentityRecord {
    /// Create a record with the required fields.
    pub fn new(
        external_id: impl Into<String>,
        username: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            username: username.into(),
            email: email.into(),
            display_name: None,
            roles: Vec::new(),
            avatar_url: None,
            metadata: HashMap::new(),
        }
    }

    /// Set the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the role list.
    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = roles;
        self
    }

    /// Set the avatar URL.
    pub fn with_avatar_url(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }

    /// Add a metadata attribute.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Check whether any of this identity's roles appears in `allowed`.
    pub fn has_any_role(&self, allowed: &[String]) -> bool {
        self.roles.iter().any(|r| allowed.contains(r))
    }
}

/// Stable mapping between an authority account and an edge identity.
///
/// Created on the first successful reconciliation; updated in place on
/// later logins, never replaced wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityLink {
    /// Authority-side account ID.
    pub local_user_id: Uuid,

    /// Edge-side identity ID.
    pub external_identity_id: String,

    /// When the link was first created.
    pub created_at: DateTime<Utc>,

    /// When the link was last touched.
    pub updated_at: DateTime<Utc>,
}

/// Store for identity links, unique in both directions.
#[async_trait]
pub trait IdentityLinkStore: Send + Sync {
    /// Create the link on first sight, or refresh it in place.
    ///
    /// Fails with a conflict if `external` is already linked to a
    /// different local account.
    async fn link(&self, local: Uuid, external: &str) -> StoreResult<IdentityLink>;

    /// Look up by the authority-side account ID.
    async fn by_local(&self, local: Uuid) -> StoreResult<Option<IdentityLink>>;

    /// Look up by the edge-side identity ID.
    async fn by_external(&self, external: &str) -> StoreResult<Option<IdentityLink>>;
}

#[derive(Default)]
struct LinkTables {
    by_local: HashMap<Uuid, IdentityLink>,
    by_external: HashMap<String, Uuid>,
}

/// In-memory identity link store.
///
/// Suitable for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryIdentityLinkStore {
    tables: RwLock<LinkTables>,
}

impl MemoryIdentityLinkStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityLinkStore for MemoryIdentityLinkStore {
    async fn link(&self, local: Uuid, external: &str) -> StoreResult<IdentityLink> {
        let mut tables = self.tables.write().await;

        if let Some(owner) = tables.by_external.get(external) {
            if *owner != local {
                return Err(StoreError::Conflict(format!(
                    "external identity {} already linked to another account",
                    external
                )));
            }
        }

        let now = Utc::now();
        let link = match tables.by_local.get(&local).cloned() {
            Some(existing) => {
                // Update in place; the old external index entry goes away
                // if the external ID changed.
                if existing.external_identity_id != external {
                    tables.by_external.remove(&existing.external_identity_id);
                    tables.by_external.insert(external.to_string(), local);
                }
                let entry = tables
                    .by_local
                    .get_mut(&local)
                    .expect("link row present under write lock");
                entry.external_identity_id = external.to_string();
                entry.updated_at = now;
                entry.clone()
            }
            None => {
                let link = IdentityLink {
                    local_user_id: local,
                    external_identity_id: external.to_string(),
                    created_at: now,
                    updated_at: now,
                };
                tables.by_local.insert(local, link.clone());
                tables.by_external.insert(external.to_string(), local);
                link
            }
        };

        Ok(link)
    }

    async fn by_local(&self, local: Uuid) -> StoreResult<Option<IdentityLink>> {
        Ok(self.tables.read().await.by_local.get(&local).cloned())
    }

    async fn by_external(&self, external: &str) -> StoreResult<Option<IdentityLink>> {
        let tables = self.tables.read().await;
        let local = match tables.by_external.get(external) {
            Some(l) => l,
            None => return Ok(None),
        };
        Ok(tables.by_local.get(local).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_record_roles() {
        let identity = IdentityRecord::new("u-1", "alice", "alice@example.com")
            .with_roles(vec!["member".to_string(), "editor".to_string()]);

        assert!(identity.has_any_role(&["editor".to_string()]));
        assert!(!identity.has_any_role(&["admin".to_string()]));
        assert!(!identity.has_any_role(&[]));
    }

    #[test]
    fn test_identity_record_wire_shape() {
        let identity = IdentityRecord::new("u-1", "alice", "alice@example.com")
            .with_display_name("Alice");

        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["externalId"], "u-1");
        assert_eq!(json["displayName"], "Alice");
        assert!(json.get("avatarUrl").is_none());
    }

    #[tokio::test]
    async fn test_link_created_then_updated_in_place() {
        let store = MemoryIdentityLinkStore::new();
        let local = Uuid::now_v7();

        let first = store.link(local, "ext-1").await.unwrap();
        let second = store.link(local, "ext-1").await.unwrap();

        assert_eq!(first.created_at, second.created_at);
        assert!(second.updated_at >= first.updated_at);

        let found = store.by_external("ext-1").await.unwrap().unwrap();
        assert_eq!(found.local_user_id, local);
    }

    #[tokio::test]
    async fn test_link_external_id_change_reindexes() {
        let store = MemoryIdentityLinkStore::new();
        let local = Uuid::now_v7();

        store.link(local, "ext-old").await.unwrap();
        store.link(local, "ext-new").await.unwrap();

        assert!(store.by_external("ext-old").await.unwrap().is_none());
        assert!(store.by_external("ext-new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_link_conflict_rejected() {
        let store = MemoryIdentityLinkStore::new();
        store.link(Uuid::now_v7(), "ext-1").await.unwrap();

        let result = store.link(Uuid::now_v7(), "ext-1").await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }
}
