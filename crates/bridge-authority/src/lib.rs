//! # Bridge Authority
//!
//! Authority-side half of the Bridge identity-sync protocol: the system
//! of record for accounts and sessions, exposing the sync endpoints a
//! cookie-isolated edge application reconciles against.
//!
//! ## Overview
//!
//! The bridge-authority crate handles:
//! - **Shared-Secret Gate**: constant-time `X-Sync-Secret` verification,
//!   fail-closed when unconfigured
//! - **Session Snapshots**: role-filtered views of live sessions, with a
//!   typed distinction between "nobody logged in" and "nobody eligible"
//! - **Sync Endpoints**: session validation, exchange-token handoff,
//!   persistent-token checks, and login/logout entry points
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bridge_authority::{AuthorityConfig, MemorySessionDirectory, SyncAuthority};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let config = AuthorityConfig::from_env();
//! let directory = Arc::new(MemorySessionDirectory::new());
//! let authority = SyncAuthority::new(config, directory).await;
//!
//! let redirect = authority
//!     .handle_issue_token(Some(uuid::Uuid::now_v7()))
//!     .await;
//! # let _ = redirect;
//! # }
//! ```

pub mod config;
pub mod error;
pub mod secret;
pub mod server;
pub mod snapshot;

pub use config::{AuthorityConfig, ConfigError};
pub use error::{SyncError, SyncResult};
pub use secret::{SharedSecretValidator, SYNC_SECRET_HEADER};
pub use server::{
    ActiveSessionsRequest, ActiveSessionsResponse, RedirectTarget, SyncAuthority,
    TokenExistsResponse, ValidatePersistentTokenResponse, ValidateSessionResponse,
    ValidateTokenRequest, ValidateTokenResponse,
};
pub use snapshot::{
    AccountSessions, MemorySessionDirectory, SessionDirectory, SessionRecord, SnapshotProvider,
};
