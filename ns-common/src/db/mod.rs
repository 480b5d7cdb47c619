//! Database initialization and settings access

pub mod init;

pub use init::*;
