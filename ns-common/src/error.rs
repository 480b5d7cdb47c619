//! Shared error type for the NeuroShield crates

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures in shared setup code: database, config files, logging
#[derive(Error, Debug)]
pub enum Error {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unreadable or unparsable config file
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
