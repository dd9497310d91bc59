//! # Bridge Tokens
//!
//! Ephemeral token issuance, validation, and identity links for the Bridge
//! identity-sync protocol. This crate is the leaf of the workspace: it owns
//! the data model shared by the authority and edge sides.
//!
//! ## Overview
//!
//! The bridge-tokens crate handles:
//! - **Token Store**: durable record of ephemeral tokens per owner, with
//!   expiry enforced at validation time
//! - **Token Issuer**: single-use exchange tokens (short TTL, salted-digest
//!   storage) and persistent sync tokens (replace-on-login, longer TTL)
//! - **Token Validator**: at-most-once consumption for exchange tokens,
//!   repeated non-consuming validation for persistent tokens
//! - **Identity**: the minimal identity record crossing the wire, and the
//!   two-way-unique link between authority accounts and edge identities
//!
//! ## Consumption semantics
//!
//! | Variant    | Storage       | Lookup        | On success      |
//! |------------|---------------|---------------|-----------------|
//! | Exchange   | salted digest | digest scan   | row deleted     |
//! | Persistent | raw value     | value index   | row kept        |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bridge_tokens::{MemoryTokenStore, TokenIssuer, TokenValidator};
//! use std::sync::Arc;
//! use uuid::Uuid;
//!
//! # async fn example() {
//! let store = Arc::new(MemoryTokenStore::new());
//! let issuer = TokenIssuer::new(store.clone());
//! let validator = TokenValidator::new(store);
//!
//! let owner = Uuid::now_v7();
//! let issued = issuer.issue_exchange(owner).await.unwrap();
//!
//! // First validation wins and consumes the row.
//! let resolved = validator.validate_exchange(&issued.plaintext).await.unwrap();
//! assert_eq!(resolved, owner);
//! assert!(validator.validate_exchange(&issued.plaintext).await.is_err());
//! # }
//! ```

pub mod error;
pub mod identity;
pub mod issuer;
pub mod store;
pub mod token;
pub mod validator;

// Re-export main types
pub use error::{StoreError, StoreResult, TokenError, TokenResult};
pub use identity::{IdentityLink, IdentityLinkStore, IdentityRecord, MemoryIdentityLinkStore};
pub use issuer::TokenIssuer;
pub use store::{ConsumeOutcome, MemoryTokenStore, TokenStore};
pub use token::{
    constant_time_eq, constant_time_str_eq, generate_token_value, ExchangeTokenRecord,
    IssuedToken, PersistentTokenRecord, EXCHANGE_TOKEN_TTL_SECS, PERSISTENT_TOKEN_TTL_SECS,
};
pub use validator::TokenValidator;
