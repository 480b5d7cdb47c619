//! API module for shared HTTP API functionality
//!
//! Used by both sides of the wire:
//! - ns-server (backend) issues and validates bearer tokens and serializes these types
//! - ns-capture (assessment client) sends credentials and parses these types
//!
//! # Design Principle
//!
//! This module contains ONLY pure functions and shared types. No HTTP
//! framework dependencies; each binary wraps these with its own middleware.

pub mod auth;
pub mod types;

/// Longest the backend spends running inference for one upload
///
/// Covers the three sequential inference calls. Clients must wait longer than
/// this before giving up on `POST /api/upload`.
pub const UPLOAD_PROCESSING_DEADLINE_SECS: u64 = 360;

pub use auth::{
    bearer_header, hash_password, issue_token, parse_bearer, verify_password, verify_token,
    ApiAuthError, TokenClaims,
};
pub use types::{
    AuthResponse, Credentials, FieldError, HealthResponse, MessageResponse, NewSessionRequest,
    SessionRecord, UploadResponse, UserInfo,
};
