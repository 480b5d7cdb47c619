//! Database access layer for ns-server
//!
//! Schema creation lives in `ns_common::db::init`; this module holds the
//! queries the API handlers run.

pub mod sessions;
pub mod users;

pub use sessions::{insert_session, list_sessions_for_user, NewSession};
pub use users::{find_user_by_email, find_user_by_id, insert_user, UserRow};
