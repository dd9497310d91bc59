//! Session snapshot provider.
//!
//! Scans the authority's live sessions and returns minimal identity
//! records for bulk reconciliation. The scan is read-only and may race
//! with concurrent logins/logouts: the output is best-effort and
//! eventually consistent. This is a poll, not a subscription; callers
//! re-poll on their own schedule.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use bridge_tokens::{IdentityRecord, StoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// A single live-session row, read-only from the authority's own session
/// storage. Not owned by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Account holding the session.
    pub owner_id: Uuid,

    /// When the session expires.
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Check if the session is live at the given instant.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// An account together with its session rows, as the directory sees them.
#[derive(Debug, Clone)]
pub struct AccountSessions {
    /// Authority-side account ID.
    pub owner_id: Uuid,

    /// Identity snapshot for the account. Roles live here.
    pub identity: IdentityRecord,

    /// The account's session rows, live or not.
    pub sessions: Vec<SessionRecord>,
}

/// Read-only view over the authority's accounts and session storage.
#[async_trait]
pub trait SessionDirectory: Send + Sync {
    /// Enumerate accounts that have any session metadata at all.
    async fn accounts_with_sessions(&self) -> StoreResult<Vec<AccountSessions>>;

    /// Resolve one account's identity snapshot.
    async fn identity(&self, owner_id: Uuid) -> StoreResult<Option<IdentityRecord>>;
}

/// In-memory session directory for tests and single-process deployments.
#[derive(Default)]
pub struct MemorySessionDirectory {
    accounts: RwLock<HashMap<Uuid, AccountSessions>>,
}

impl MemorySessionDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account with its identity snapshot.
    pub async fn upsert_account(&self, owner_id: Uuid, identity: IdentityRecord) {
        let mut accounts = self.accounts.write().await;
        accounts
            .entry(owner_id)
            .and_modify(|a| a.identity = identity.clone())
            .or_insert_with(|| AccountSessions {
                owner_id,
                identity,
                sessions: Vec::new(),
            });
    }

    /// Record a session for an account.
    pub async fn add_session(&self, owner_id: Uuid, expires_at: DateTime<Utc>) {
        let mut accounts = self.accounts.write().await;
        if let Some(account) = accounts.get_mut(&owner_id) {
            account.sessions.push(SessionRecord {
                owner_id,
                expires_at,
            });
        }
    }

    /// Drop all sessions for an account.
    pub async fn clear_sessions(&self, owner_id: Uuid) {
        let mut accounts = self.accounts.write().await;
        if let Some(account) = accounts.get_mut(&owner_id) {
            account.sessions.clear();
        }
    }
}

#[async_trait]
impl SessionDirectory for MemorySessionDirectory {
    async fn accounts_with_sessions(&self) -> StoreResult<Vec<AccountSessions>> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .values()
            .filter(|a| !a.sessions.is_empty())
            .cloned()
            .collect())
    }

    async fn identity(&self, owner_id: Uuid) -> StoreResult<Option<IdentityRecord>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(&owner_id).map(|a| a.identity.clone()))
    }
}

/// Builds point-in-time snapshots of eligible live sessions.
pub struct SnapshotProvider {
    directory: Arc<dyn SessionDirectory>,
    allowed_roles: Vec<String>,
}

impl SnapshotProvider {
    /// Create a provider over a directory with a role allow-list.
    pub fn new(directory: Arc<dyn SessionDirectory>, allowed_roles: Vec<String>) -> Self {
        Self {
            directory,
            allowed_roles,
        }
    }

    /// Take a snapshot of currently eligible identities.
    ///
    /// An account is included when it has at least one unexpired session
    /// and its role set intersects the allow-list. The two empty cases
    /// are distinguished so callers can choose to retry (nobody is logged
    /// in yet) versus stop (people are logged in but none is eligible).
    pub async fn snapshot(&self, now: DateTime<Utc>) -> SyncResult<Vec<IdentityRecord>> {
        let accounts = self.directory.accounts_with_sessions().await?;

        let active: Vec<&AccountSessions> = accounts
            .iter()
            .filter(|a| a.sessions.iter().any(|s| s.is_live(now)))
            .collect();

        if active.is_empty() {
            debug!(scanned = accounts.len(), "snapshot found no active sessions");
            return Err(SyncError::NoActiveSessions);
        }

        let eligible: Vec<IdentityRecord> = active
            .iter()
            .filter(|a| a.identity.has_any_role(&self.allowed_roles))
            .map(|a| a.identity.clone())
            .collect();

        if eligible.is_empty() {
            debug!(
                active = active.len(),
                "snapshot found active sessions but none eligible by role"
            );
            return Err(SyncError::NoEligibleSessions);
        }

        debug!(
            scanned = accounts.len(),
            active = active.len(),
            eligible = eligible.len(),
            "session snapshot taken"
        );
        Ok(eligible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn identity(external_id: &str, roles: &[&str]) -> IdentityRecord {
        IdentityRecord::new(external_id, external_id, format!("{}@example.com", external_id))
            .with_roles(roles.iter().map(|r| r.to_string()).collect())
    }

    async fn directory_with(
        entries: Vec<(Uuid, IdentityRecord, Vec<DateTime<Utc>>)>,
    ) -> Arc<MemorySessionDirectory> {
        let dir = Arc::new(MemorySessionDirectory::new());
        for (owner, ident, expiries) in entries {
            dir.upsert_account(owner, ident).await;
            for exp in expiries {
                dir.add_session(owner, exp).await;
            }
        }
        dir
    }

    #[tokio::test]
    async fn test_snapshot_includes_eligible_live_sessions() {
        let owner = Uuid::now_v7();
        let dir = directory_with(vec![(
            owner,
            identity("alice", &["member"]),
            vec![Utc::now() + Duration::hours(1)],
        )])
        .await;

        let provider = SnapshotProvider::new(dir, vec!["member".to_string()]);
        let records = provider.snapshot(Utc::now()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].external_id, "alice");
    }

    #[tokio::test]
    async fn test_snapshot_excludes_expired_only_accounts() {
        let dir = directory_with(vec![(
            Uuid::now_v7(),
            identity("alice", &["member"]),
            vec![Utc::now() - Duration::minutes(5)],
        )])
        .await;

        let provider = SnapshotProvider::new(dir, vec!["member".to_string()]);
        let result = provider.snapshot(Utc::now()).await;
        assert!(matches!(result, Err(SyncError::NoActiveSessions)));
    }

    #[tokio::test]
    async fn test_snapshot_distinguishes_role_ineligibility() {
        let dir = directory_with(vec![(
            Uuid::now_v7(),
            identity("bob", &["guest"]),
            vec![Utc::now() + Duration::hours(1)],
        )])
        .await;

        let provider = SnapshotProvider::new(dir, vec!["member".to_string()]);
        let result = provider.snapshot(Utc::now()).await;
        assert!(matches!(result, Err(SyncError::NoEligibleSessions)));
    }

    #[tokio::test]
    async fn test_snapshot_mixed_accounts() {
        let dir = directory_with(vec![
            (
                Uuid::now_v7(),
                identity("alice", &["member"]),
                vec![Utc::now() + Duration::hours(1)],
            ),
            (
                Uuid::now_v7(),
                identity("bob", &["guest"]),
                vec![Utc::now() + Duration::hours(1)],
            ),
            (
                Uuid::now_v7(),
                identity("carol", &["member"]),
                vec![Utc::now() - Duration::minutes(1)],
            ),
        ])
        .await;

        let provider = SnapshotProvider::new(dir, vec!["member".to_string()]);
        let records = provider.snapshot(Utc::now()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].external_id, "alice");
    }

    #[tokio::test]
    async fn test_snapshot_empty_directory() {
        let dir = Arc::new(MemorySessionDirectory::new());
        let provider = SnapshotProvider::new(dir, vec!["member".to_string()]);
        let result = provider.snapshot(Utc::now()).await;
        assert!(matches!(result, Err(SyncError::NoActiveSessions)));
    }
}
