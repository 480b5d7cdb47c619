//! Database initialization
//!
//! Creates the SQLite database on first run and brings the schema up with
//! idempotent `CREATE TABLE IF NOT EXISTS` statements. Safe to call on every
//! startup.

use crate::api::auth::generate_secret;
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Settings key holding the bearer token signing secret
pub const TOKEN_SECRET_KEY: &str = "token_secret";

/// Open (or create) the database file and initialize the schema
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    // Pragmas set here apply to every pooled connection, not just the first
    let options = SqliteConnectOptions::from_str(&db_url)?
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    Ok(pool)
}

/// In-memory database with the full schema
///
/// Limited to a single connection that is never recycled: every SQLite memory
/// connection is its own database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Create all tables (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    create_settings_table(pool).await?;
    create_users_table(pool).await?;
    create_sessions_table(pool).await?;
    Ok(())
}

/// Key-value application settings
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            risk_score REAL NOT NULL,
            model_version TEXT NOT NULL,
            video_features TEXT NOT NULL,
            audio_features TEXT NOT NULL,
            fusion_output TEXT NOT NULL,
            recorded_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_sessions_user_recorded ON sessions (user_id, recorded_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Read a setting value
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;
    Ok(value.flatten())
}

/// Insert or replace a setting value
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

/// Load the token signing secret, generating and storing one if missing
///
/// A NULL or blank stored value is replaced, like any missing setting.
pub async fn load_or_init_token_secret(pool: &SqlitePool) -> Result<String> {
    match get_setting(pool, TOKEN_SECRET_KEY).await? {
        Some(secret) if !secret.trim().is_empty() => Ok(secret),
        existing => {
            if existing.is_some() {
                warn!("Setting '{}' was blank, generating a new secret", TOKEN_SECRET_KEY);
            }
            let secret = generate_secret();
            set_setting(pool, TOKEN_SECRET_KEY, &secret).await?;
            info!("Generated new token secret");
            Ok(secret)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_database_has_schema() {
        let pool = init_memory_database().await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        assert!(tables.contains(&"settings".to_string()));
        assert!(tables.contains(&"users".to_string()));
        assert!(tables.contains(&"sessions".to_string()));
    }

    #[tokio::test]
    async fn test_token_secret_is_stable() {
        let pool = init_memory_database().await.unwrap();

        let first = load_or_init_token_secret(&pool).await.unwrap();
        let second = load_or_init_token_secret(&pool).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[tokio::test]
    async fn test_blank_token_secret_is_replaced() {
        let pool = init_memory_database().await.unwrap();
        set_setting(&pool, TOKEN_SECRET_KEY, "  ").await.unwrap();

        let secret = load_or_init_token_secret(&pool).await.unwrap();
        assert_eq!(secret.len(), 64);
        assert_eq!(get_setting(&pool, TOKEN_SECRET_KEY).await.unwrap(), Some(secret));
    }

    #[tokio::test]
    async fn test_schema_creation_is_idempotent() {
        let pool = init_memory_database().await.unwrap();
        create_schema(&pool).await.unwrap();
        create_schema(&pool).await.unwrap();
    }
}
