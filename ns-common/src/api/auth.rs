//! Credential hashing and bearer tokens
//!
//! # Architecture
//!
//! - Passwords are stored as bcrypt hashes (salt and cost embedded)
//! - Bearer tokens are `<user-id>.<expiry-ms>.<signature>` where the signature
//!   is SHA-256 over `<user-id>.<expiry-ms>.<server secret>`
//! - The server secret lives in the `settings` table (see `db::init`)
//!
//! # Pure Functions
//!
//! This module contains ONLY pure functions. No HTTP framework dependencies;
//! the server wraps them in an axum middleware.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// bcrypt work factor for stored passwords
pub const PASSWORD_HASH_COST: u32 = 10;

/// Server token secret length in bytes
const SECRET_BYTES: usize = 32;

// ========================================
// Error Types
// ========================================

/// Authentication error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiAuthError {
    /// No Authorization header, or not a Bearer credential
    MissingToken,

    /// Token does not have the `<id>.<expiry>.<signature>` shape
    MalformedToken(String),

    /// Signature does not match the server secret
    InvalidSignature,

    /// Token expired
    Expired { expired_at: i64, now: i64 },
}

impl std::fmt::Display for ApiAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiAuthError::MissingToken => write!(f, "Missing bearer token"),
            ApiAuthError::MalformedToken(reason) => write!(f, "Malformed token: {}", reason),
            ApiAuthError::InvalidSignature => write!(f, "Invalid token signature"),
            ApiAuthError::Expired { expired_at, now } => {
                write!(f, "Token expired {}ms ago", now - expired_at)
            }
        }
    }
}

impl std::error::Error for ApiAuthError {}

// ========================================
// Password Hashing
// ========================================

/// Hash a password for storage
///
/// CPU-bound; async callers should run it on a blocking thread.
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash_password_with_cost(password, PASSWORD_HASH_COST)
}

/// Hash with an explicit bcrypt cost (4..=31)
///
/// # Examples
///
/// ```
/// use ns_common::api::auth::{hash_password_with_cost, verify_password};
///
/// let stored = hash_password_with_cost("hunter22", 4).unwrap();
/// assert!(stored.starts_with("$2b$04$"));
/// assert!(verify_password("hunter22", &stored));
/// ```
pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}

/// Check a password against a stored bcrypt hash
///
/// A malformed stored hash never verifies.
pub fn verify_password(password: &str, stored: &str) -> bool {
    bcrypt::verify(password, stored).unwrap_or(false)
}

// ========================================
// Bearer Tokens
// ========================================

/// Decoded token contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub user_id: String,
    /// Unix epoch ms after which the token is rejected
    pub expires_at: i64,
}

/// Generate a new random server secret (64 hex chars)
pub fn generate_secret() -> String {
    random_hex(SECRET_BYTES)
}

/// Issue a token for `user_id` valid until `expires_at` (Unix epoch ms)
pub fn issue_token(user_id: &str, expires_at: i64, secret: &str) -> String {
    let signature = sign(user_id, expires_at, secret);
    format!("{}.{}.{}", user_id, expires_at, signature)
}

/// Validate a token and return its claims
///
/// # Examples
///
/// ```
/// use ns_common::api::auth::{issue_token, verify_token};
///
/// let token = issue_token("user-1", 2_000, "secret");
/// assert_eq!(verify_token(&token, "secret", 1_000).unwrap().user_id, "user-1");
/// assert!(verify_token(&token, "secret", 3_000).is_err());
/// assert!(verify_token(&token, "other", 1_000).is_err());
/// ```
pub fn verify_token(token: &str, secret: &str, now_ms: i64) -> Result<TokenClaims, ApiAuthError> {
    let mut parts = token.rsplitn(3, '.');
    let signature = parts.next().unwrap_or_default();
    let expiry = parts
        .next()
        .ok_or_else(|| ApiAuthError::MalformedToken("missing expiry".to_string()))?;
    let user_id = parts
        .next()
        .ok_or_else(|| ApiAuthError::MalformedToken("missing user id".to_string()))?;

    if user_id.is_empty() {
        return Err(ApiAuthError::MalformedToken("empty user id".to_string()));
    }

    let expires_at: i64 = expiry
        .parse()
        .map_err(|_| ApiAuthError::MalformedToken(format!("invalid expiry '{}'", expiry)))?;

    let expected = sign(user_id, expires_at, secret);
    if !constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
        return Err(ApiAuthError::InvalidSignature);
    }

    if now_ms > expires_at {
        return Err(ApiAuthError::Expired {
            expired_at: expires_at,
            now: now_ms,
        });
    }

    Ok(TokenClaims {
        user_id: user_id.to_string(),
        expires_at,
    })
}

/// Extract the token from an `Authorization` header value
pub fn parse_bearer(header_value: &str) -> Result<&str, ApiAuthError> {
    let value = header_value.trim();
    let (scheme, token) = value.split_once(' ').ok_or(ApiAuthError::MissingToken)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(ApiAuthError::MissingToken);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(ApiAuthError::MissingToken);
    }
    Ok(token)
}

/// Build an `Authorization` header value
///
/// Tokens that already carry the `Bearer ` prefix are passed through.
pub fn bearer_header(token: &str) -> String {
    let token = token.trim();
    match parse_bearer(token) {
        Ok(bare) => format!("Bearer {}", bare),
        Err(_) => format!("Bearer {}", token),
    }
}

fn sign(user_id: &str, expires_at: i64, secret: &str) -> String {
    let digest = Sha256::new()
        .chain_update(format!("{}.{}.{}", user_id, expires_at, secret).as_bytes())
        .finalize();
    format!("{:x}", digest)
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ========================================
// Tests
// ========================================
