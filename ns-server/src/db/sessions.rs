//! Assessment sessions
//!
//! Sessions are written once and never updated. Feature payloads are stored
//! as JSON text.

use chrono::{DateTime, Utc};
use ns_common::api::SessionRecord;
use ns_common::time;
use serde_json::Value;
use sqlx::{Row, SqlitePool};

/// Model version recorded with every session
pub const MODEL_VERSION: &str = "1.0.0";

/// Fields supplied by the caller when persisting a session
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: String,
    pub risk_score: f64,
    pub video_features: Value,
    pub audio_features: Value,
    pub fusion_output: Value,
}

pub async fn insert_session(
    pool: &SqlitePool,
    session: NewSession,
) -> Result<SessionRecord, sqlx::Error> {
    insert_session_at(pool, session, time::now()).await
}

/// Insert with an explicit timestamp
///
/// The returned record carries the stored (microsecond) precision.
pub async fn insert_session_at(
    pool: &SqlitePool,
    session: NewSession,
    recorded_at: DateTime<Utc>,
) -> Result<SessionRecord, sqlx::Error> {
    let record = SessionRecord {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: session.user_id,
        risk_score: session.risk_score,
        model_version: MODEL_VERSION.to_string(),
        video_features: session.video_features,
        audio_features: session.audio_features,
        fusion_output: session.fusion_output,
        recorded_at: time::storage_precision(&recorded_at),
    };

    sqlx::query(
        r#"
        INSERT INTO sessions (id, user_id, risk_score, model_version, video_features,
                              audio_features, fusion_output, recorded_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.id)
    .bind(&record.user_id)
    .bind(record.risk_score)
    .bind(&record.model_version)
    .bind(record.video_features.to_string())
    .bind(record.audio_features.to_string())
    .bind(record.fusion_output.to_string())
    .bind(time::to_storage(&record.recorded_at))
    .execute(pool)
    .await?;

    Ok(record)
}

/// All sessions for a user, newest first
///
/// Insertion order breaks ties between identical timestamps.
pub async fn list_sessions_for_user(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<SessionRecord>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, risk_score, model_version, video_features,
               audio_features, fusion_output, recorded_at
        FROM sessions
        WHERE user_id = ?
        ORDER BY recorded_at DESC, rowid DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_session).collect()
}

fn row_to_session(row: sqlx::sqlite::SqliteRow) -> Result<SessionRecord, sqlx::Error> {
    let recorded_at: String = row.try_get("recorded_at")?;
    let recorded_at = time::from_storage(&recorded_at).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: "recorded_at".to_string(),
        source: format!("invalid timestamp '{}'", recorded_at).into(),
    })?;

    Ok(SessionRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        risk_score: row.try_get("risk_score")?,
        model_version: row.try_get("model_version")?,
        video_features: json_column(&row, "video_features")?,
        audio_features: json_column(&row, "audio_features")?,
        fusion_output: json_column(&row, "fusion_output")?,
        recorded_at,
    })
}

fn json_column(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<Value, sqlx::Error> {
    let text: String = row.try_get(column)?;
    serde_json::from_str(&text).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}
