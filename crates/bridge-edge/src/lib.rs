//! # Bridge Edge
//!
//! Edge-application half of the Bridge identity-sync protocol: a
//! cookie-isolated consumer that reconciles "who is logged in" against
//! the identity authority instead of sharing its sessions.
//!
//! ## Overview
//!
//! The bridge-edge crate handles:
//! - **Sync Client**: secret-gated HTTP calls to the authority's sync
//!   endpoints, with typed empty-snapshot outcomes
//! - **Reconciliation Loop**: non-overlapping, coalescing reconciliation
//!   driven by push events, with fixed-backoff reconnect
//! - **Identity Cache**: last-known identity for display-only fallback
//!   while the authority is unreachable
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bridge_edge::{
//!     EdgeConfig, EdgeSyncClient, MemoryIdentityCache, SyncLoop, SyncTokenSlot, TokenReconciler,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), bridge_edge::EdgeError> {
//! let config = EdgeConfig::from_env();
//! let client = EdgeSyncClient::new(&config)?;
//!
//! // Filled by the login-redirect handler when a sync token arrives.
//! let token = Arc::new(SyncTokenSlot::new());
//!
//! let sync = Arc::new(SyncLoop::new(
//!     Arc::new(TokenReconciler::new(client, token)),
//!     Arc::new(MemoryIdentityCache::new()),
//!     config.reconnect_delay(),
//! ));
//!
//! sync.request_reconcile().await?;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod sync_loop;

pub use backoff::{with_fixed_retry, with_fixed_retry_if, FixedBackoff};
pub use cache::{CachedIdentity, IdentityCache, MemoryIdentityCache};
pub use client::{EdgeSyncClient, ResolvedIdentity, SYNC_SECRET_HEADER};
pub use config::{ConfigError, EdgeConfig};
pub use error::{EdgeError, EdgeResult};
pub use sync_loop::{
    DisplayIdentity, ReconcileOutcome, Reconciler, SyncLoop, SyncNotice, SyncPhase, SyncTokenSlot,
    TokenReconciler,
};
