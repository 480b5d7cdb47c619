//! # NeuroShield Common Library
//!
//! Shared code for the NeuroShield backend and assessment client:
//! - API request/response types and bearer credentials
//! - Configuration loading and root folder resolution
//! - Logging initialization
//! - Database initialization
//! - Risk score interpretation

pub mod api;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod logging;
pub mod risk;
pub mod time;

pub use error::{Error, Result};
pub use risk::{AssessmentResult, RiskLevel};
