//! Sync token records and token cryptography.
//!
//! Two token variants bridge identity from the authority to the edge
//! application:
//!
//! 1. **Exchange tokens**: Single-use secrets handed off during a redirect.
//!    Only a salted SHA-256 digest is stored; the plaintext leaves the
//!    issuer exactly once. Short-lived (2 minutes) to minimize exposure.
//!
//! 2. **Persistent sync tokens**: Replace-on-login secrets used for
//!    repeated out-of-band revalidation without a fresh redirect. Stored
//!    and looked up by raw value, at most one live row per owner.
//!    Slightly longer-lived (5 minutes), refreshed on every login.
//!
//! # Example
//!
//! ```rust,no_run
//! use bridge_tokens::token::{generate_token_value, ExchangeTokenRecord};
//! use uuid::Uuid;
//!
//! let plaintext = generate_token_value();
//! let record = ExchangeTokenRecord::new(
//!     Uuid::now_v7(),
//!     &plaintext,
//!     chrono::Duration::seconds(120),
//! );
//! assert!(record.matches(&plaintext));
//! ```

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Default lifetime of an exchange token, in seconds.
pub const EXCHANGE_TOKEN_TTL_SECS: i64 = 120;

/// Default lifetime of a persistent sync token, in seconds.
pub const PERSISTENT_TOKEN_TTL_SECS: i64 = 300;

/// Number of random bytes in a token plaintext.
const TOKEN_BYTES: usize = 32;

/// Number of random bytes in an exchange token salt.
const SALT_BYTES: usize = 16;

/// Generate a fresh token plaintext: 32 random bytes, URL-safe base64.
pub fn generate_token_value() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a fresh digest salt.
pub fn generate_salt() -> Vec<u8> {
    let mut bytes = [0u8; SALT_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes.to_vec()
}

/// Compute the salted digest stored in place of an exchange token.
pub fn salted_digest(salt: &[u8], plaintext: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(plaintext.as_bytes());
    hasher.finalize().to_vec()
}

/// Constant-time equality over equal-length byte slices.
///
/// Returns false immediately on length mismatch; lengths are not secret.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Constant-time equality over strings of arbitrary length.
///
/// Both sides are hashed first so the comparison never branches on
/// a length difference between the presented and configured values.
pub fn constant_time_str_eq(a: &str, b: &str) -> bool {
    let da = Sha256::digest(a.as_bytes());
    let db = Sha256::digest(b.as_bytes());
    constant_time_eq(&da, &db)
}

/// Stored record for a single-use exchange token.
///
/// The plaintext is never persisted; validation recomputes the salted
/// digest of the presented value and compares in constant time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeTokenRecord {
    /// Row ID.
    pub id: Uuid,

    /// Account the token was issued for.
    pub owner_id: Uuid,

    /// Digest salt.
    pub salt: Vec<u8>,

    /// SHA-256(salt || plaintext).
    pub digest: Vec<u8>,

    /// When the token was issued.
    pub created_at: DateTime<Utc>,

    /// When the token stops validating.
    pub expires_at: DateTime<Utc>,
}

impl ExchangeTokenRecord {
    /// Create a record from a freshly generated plaintext.
    pub fn new(owner_id: Uuid, plaintext: &str, ttl: Duration) -> Self {
        let now = Utc::now();
        let salt = generate_salt();
        let digest = salted_digest(&salt, plaintext);
        Self {
            id: Uuid::now_v7(),
            owner_id,
            salt,
            digest,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Check whether a presented plaintext matches this record's digest.
    pub fn matches(&self, presented: &str) -> bool {
        let candidate = salted_digest(&self.salt, presented);
        constant_time_eq(&candidate, &self.digest)
    }

    /// Check if the record is expired at the given instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Stored record for a persistent sync token.
///
/// Unlike exchange tokens these are looked up by raw value with a direct
/// indexed lookup, and they survive successful validation. They die on
/// their own expiry or an explicit logout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistentTokenRecord {
    /// Row ID.
    pub id: Uuid,

    /// Account the token belongs to. At most one live row per owner.
    pub owner_id: Uuid,

    /// Raw token value.
    pub value: String,

    /// When the token was issued.
    pub created_at: DateTime<Utc>,

    /// When the token stops validating.
    pub expires_at: DateTime<Utc>,
}

impl PersistentTokenRecord {
    /// Create a record around a freshly generated value.
    pub fn new(owner_id: Uuid, value: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            owner_id,
            value: value.into(),
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Check if the record is expired at the given instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A freshly issued token, carrying the plaintext exactly once.
#[derive(Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    /// The plaintext to hand to the caller. Not retrievable again.
    pub plaintext: String,

    /// When the token stops validating.
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("plaintext", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_values_are_unique() {
        let a = generate_token_value();
        let b = generate_token_value();
        assert_ne!(a, b);
        // 32 bytes of URL-safe base64 without padding
        assert_eq!(a.len(), 43);
    }

    #[test]
    fn test_exchange_record_matches_only_its_plaintext() {
        let plaintext = generate_token_value();
        let record =
            ExchangeTokenRecord::new(Uuid::now_v7(), &plaintext, Duration::seconds(120));

        assert!(record.matches(&plaintext));
        assert!(!record.matches(&generate_token_value()));
        assert!(!record.matches(""));
    }

    #[test]
    fn test_same_plaintext_different_salts() {
        let plaintext = generate_token_value();
        let a = ExchangeTokenRecord::new(Uuid::now_v7(), &plaintext, Duration::seconds(120));
        let b = ExchangeTokenRecord::new(Uuid::now_v7(), &plaintext, Duration::seconds(120));

        assert_ne!(a.digest, b.digest);
        assert!(a.matches(&plaintext));
        assert!(b.matches(&plaintext));
    }

    #[test]
    fn test_expiry() {
        let plaintext = generate_token_value();
        let record =
            ExchangeTokenRecord::new(Uuid::now_v7(), &plaintext, Duration::seconds(120));

        assert!(!record.is_expired(Utc::now()));
        assert!(record.is_expired(Utc::now() + Duration::seconds(121)));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_str_eq("secret", "secret"));
        assert!(!constant_time_str_eq("secret", "secre"));
    }

    #[test]
    fn test_issued_token_debug_redacts_plaintext() {
        let issued = IssuedToken {
            plaintext: "super-secret".to_string(),
            expires_at: Utc::now(),
        };
        let rendered = format!("{:?}", issued);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("REDACTED"));
    }
}
