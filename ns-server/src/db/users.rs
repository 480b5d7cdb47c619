//! User accounts

use ns_common::api::UserInfo;
use sqlx::{Row, SqlitePool};

/// Stored user
#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    /// bcrypt hash
    pub password_hash: String,
    pub created_at: String,
}

impl UserRow {
    pub fn info(&self) -> UserInfo {
        UserInfo {
            id: self.id.clone(),
            email: self.email.clone(),
        }
    }
}

fn row_to_user(row: sqlx::sqlite::SqliteRow) -> Result<UserRow, sqlx::Error> {
    Ok(UserRow {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Look up a user by (already normalized) email
pub async fn find_user_by_email(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<UserRow>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT id, email, password_hash, created_at FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    row.map(row_to_user).transpose()
}

pub async fn find_user_by_id(pool: &SqlitePool, id: &str) -> Result<Option<UserRow>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT id, email, password_hash, created_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(row_to_user).transpose()
}

/// Insert a new user with a fresh UUID
///
/// A duplicate email surfaces as a unique-constraint database error.
pub async fn insert_user(
    pool: &SqlitePool,
    email: &str,
    password_hash: String,
) -> Result<UserRow, sqlx::Error> {
    let user = UserRow {
        id: uuid::Uuid::new_v4().to_string(),
        email: email.to_string(),
        password_hash,
        created_at: ns_common::time::to_storage(&ns_common::time::now()),
    };

    sqlx::query(
        "INSERT INTO users (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.created_at)
    .execute(pool)
    .await?;

    Ok(user)
}
