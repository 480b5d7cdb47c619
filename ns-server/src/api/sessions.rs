//! Session history endpoints

use axum::{extract::State, http::StatusCode, Extension, Json};
use ns_common::api::{NewSessionRequest, SessionRecord};
use serde_json::Value;
use tracing::info;

use crate::api::auth::AuthUser;
use crate::db::{self, NewSession};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/sessions
///
/// The caller's sessions, newest first.
pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<SessionRecord>>> {
    let sessions = db::list_sessions_for_user(&state.db, &user.id).await?;
    Ok(Json(sessions))
}

/// POST /api/sessions
///
/// Stores a session from precomputed features. JSON `null` counts as missing.
pub async fn create_session(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<NewSessionRequest>,
) -> ApiResult<(StatusCode, Json<SessionRecord>)> {
    let (Some(video_features), Some(audio_features), Some(fusion_output), Some(risk_score)) = (
        present(request.video_features),
        present(request.audio_features),
        present(request.fusion_output),
        request.risk_score,
    ) else {
        return Err(ApiError::BadRequest("Missing required fields".to_string()));
    };

    let session = db::insert_session(
        &state.db,
        NewSession {
            user_id: user.id,
            risk_score,
            video_features,
            audio_features,
            fusion_output,
        },
    )
    .await?;

    info!(session_id = %session.id, risk_score, "Stored session");
    Ok((StatusCode::CREATED, Json(session)))
}

fn present(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}
