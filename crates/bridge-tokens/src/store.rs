//! Token store abstraction and in-memory implementation.
//!
//! The store is an explicit service with its own tables rather than ad hoc
//! per-account metadata. Two operations carry concurrency invariants:
//!
//! - `upsert_persistent` is atomic per owner: two near-simultaneous logins
//!   for the same owner leave exactly one valid row.
//! - `consume_exchange` is a single atomic compare-and-delete: at most one
//!   of two concurrent validation attempts for the same token succeeds.
//!   A read followed by a separate delete would open a replay window.

use crate::error::StoreResult;
use crate::token::{ExchangeTokenRecord, PersistentTokenRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Outcome of an atomic exchange-token consumption attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// The presented token matched a live row.
    Consumed {
        /// Account the token was issued for.
        owner_id: Uuid,
        /// Whether the row was actually removed. `false` means the match
        /// succeeded but the delete failed; the caller logs loudly and the
        /// success stands. The same token must never validate again.
        removed: bool,
    },
    /// A row matched but its expiry is in the past.
    Expired,
    /// No outstanding row matched the presented token.
    NoMatch,
}

/// Durable record of ephemeral tokens per owner, with expiry.
///
/// Expiry is enforced at validation time via `expires_at` comparison; the
/// `purge_expired` sweep is storage hygiene only and never required for
/// correctness.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Insert a new exchange-token row. No per-owner cardinality limit.
    async fn insert_exchange(&self, record: ExchangeTokenRecord) -> StoreResult<()>;

    /// Atomically find the row matching `presented` and delete it.
    ///
    /// Matching is a linear scan comparing salted digests, since only a
    /// hash is stored. Acceptable while the outstanding-token set stays
    /// small; exchange tokens live for ~2 minutes.
    async fn consume_exchange(
        &self,
        presented: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<ConsumeOutcome>;

    /// Count the outstanding (live or expired) exchange rows.
    async fn exchange_count(&self) -> StoreResult<usize>;

    /// Replace any existing persistent row for the record's owner.
    async fn upsert_persistent(&self, record: PersistentTokenRecord) -> StoreResult<()>;

    /// Indexed lookup by raw value with an `expires_at > now` predicate.
    /// Does not delete the row.
    async fn find_persistent(
        &self,
        value: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<PersistentTokenRecord>>;

    /// Whether the owner currently holds a live persistent row.
    async fn persistent_exists(&self, owner_id: Uuid, now: DateTime<Utc>) -> StoreResult<bool>;

    /// Delete the owner's persistent row, if any. Returns whether a row
    /// was deleted.
    async fn delete_persistent(&self, owner_id: Uuid) -> StoreResult<bool>;

    /// Remove expired rows of both variants. Returns how many were removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize>;
}

#[derive(Default)]
struct TokenTables {
    exchange: HashMap<Uuid, ExchangeTokenRecord>,
    /// Keyed by owner, which enforces the one-live-row-per-owner invariant
    /// structurally.
    persistent: HashMap<Uuid, PersistentTokenRecord>,
    /// Value index for persistent lookups.
    persistent_by_value: HashMap<String, Uuid>,
}

/// In-memory token store.
///
/// All tables sit behind one `RwLock`, so compare-and-delete and per-owner
/// upsert are atomic with respect to concurrent requests. Suitable for
/// single-process deployments and testing.
#[derive(Default)]
pub struct MemoryTokenStore {
    tables: RwLock<TokenTables>,
}

impl MemoryTokenStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn insert_exchange(&self, record: ExchangeTokenRecord) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.exchange.insert(record.id, record);
        Ok(())
    }

    async fn consume_exchange(
        &self,
        presented: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<ConsumeOutcome> {
        // Write lock for the full scan: the match and the delete must be
        // one atomic step.
        let mut tables = self.tables.write().await;

        let matched = tables
            .exchange
            .values()
            .find(|r| r.matches(presented))
            .map(|r| (r.id, r.owner_id, r.is_expired(now)));

        match matched {
            Some((id, _, true)) => {
                tables.exchange.remove(&id);
                Ok(ConsumeOutcome::Expired)
            }
            Some((id, owner_id, false)) => {
                tables.exchange.remove(&id);
                Ok(ConsumeOutcome::Consumed {
                    owner_id,
                    removed: true,
                })
            }
            None => Ok(ConsumeOutcome::NoMatch),
        }
    }

    async fn exchange_count(&self) -> StoreResult<usize> {
        Ok(self.tables.read().await.exchange.len())
    }

    async fn upsert_persistent(&self, record: PersistentTokenRecord) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let owner_id = record.owner_id;
        let value = record.value.clone();

        if let Some(old) = tables.persistent.insert(owner_id, record) {
            tables.persistent_by_value.remove(&old.value);
        }
        tables.persistent_by_value.insert(value, owner_id);
        Ok(())
    }

    async fn find_persistent(
        &self,
        value: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<PersistentTokenRecord>> {
        let tables = self.tables.read().await;
        let record = tables
            .persistent_by_value
            .get(value)
            .and_then(|owner| tables.persistent.get(owner))
            .filter(|r| !r.is_expired(now))
            .cloned();
        Ok(record)
    }

    async fn persistent_exists(&self, owner_id: Uuid, now: DateTime<Utc>) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .persistent
            .get(&owner_id)
            .map(|r| !r.is_expired(now))
            .unwrap_or(false))
    }

    async fn delete_persistent(&self, owner_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.persistent.remove(&owner_id) {
            Some(old) => {
                tables.persistent_by_value.remove(&old.value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let mut tables = self.tables.write().await;
        let before = tables.exchange.len() + tables.persistent.len();

        tables.exchange.retain(|_, r| !r.is_expired(now));

        let dead_owners: Vec<Uuid> = tables
            .persistent
            .values()
            .filter(|r| r.is_expired(now))
            .map(|r| r.owner_id)
            .collect();
        for owner in dead_owners {
            if let Some(old) = tables.persistent.remove(&owner) {
                tables.persistent_by_value.remove(&old.value);
            }
        }

        Ok(before - (tables.exchange.len() + tables.persistent.len()))
    }
}
