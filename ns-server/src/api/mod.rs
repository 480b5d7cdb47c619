//! HTTP API handlers for ns-server

pub mod accounts;
pub mod auth;
pub mod health;
pub mod sessions;
pub mod upload;

pub use accounts::{login, register};
pub use auth::{auth_middleware, AuthUser};
pub use health::health_routes;
pub use sessions::{create_session, list_sessions};
pub use upload::upload_assessment;
