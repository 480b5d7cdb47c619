//! Media upload and inference
//!
//! `POST /api/upload` takes multipart fields `video` and `audio`, runs the
//! three inference calls in sequence and persists the resulting session.
//! The calls share one deadline; a request that misses it persists nothing.
//! Uploads are held in memory for the duration of the request.

use axum::{
    extract::{multipart::Field, Multipart, State},
    http::StatusCode,
    Extension, Json,
};
use ns_common::api::UploadResponse;
use std::time::Duration;
use tracing::{debug, info};

use crate::api::auth::AuthUser;
use crate::db::{self, NewSession};
use crate::error::{ApiError, ApiResult};
use crate::services::{InferenceError, MediaFile};
use crate::AppState;

pub const MISSING_FILES_MESSAGE: &str = "Both video and audio files are required";

/// POST /api/upload
pub async fn upload_assessment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let mut video: Option<MediaFile> = None;
    let mut audio: Option<MediaFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("video") if video.is_none() => video = read_file(field, "video.webm").await?,
            Some("audio") if audio.is_none() => audio = read_file(field, "audio.webm").await?,
            other => debug!(field = ?other, "Ignoring multipart field"),
        }
    }

    let (Some(video), Some(audio)) = (video, audio) else {
        return Err(ApiError::BadRequest(MISSING_FILES_MESSAGE.to_string()));
    };

    info!(
        user_id = %user.id,
        video_bytes = video.data.len(),
        audio_bytes = audio.data.len(),
        "Received assessment upload"
    );

    let deadline = state.settings.upload_deadline_secs;
    let inference = async {
        let video_features = state.inference.infer_video(&video).await?;
        let audio_features = state.inference.infer_audio(&audio).await?;
        let fusion = state
            .inference
            .infer_fusion(&video_features, &audio_features)
            .await?;
        Ok::<_, InferenceError>((video_features, audio_features, fusion))
    };
    let (video_features, audio_features, fusion) =
        tokio::time::timeout(Duration::from_secs(deadline), inference)
            .await
            .map_err(|_| InferenceError::DeadlineExceeded(deadline))??;

    let session = db::insert_session(
        &state.db,
        NewSession {
            user_id: user.id,
            risk_score: fusion.risk_score,
            video_features,
            audio_features,
            fusion_output: fusion.fusion_output,
        },
    )
    .await?;

    info!(session_id = %session.id, risk_score = session.risk_score, "Assessment completed");

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: "Assessment completed successfully".to_string(),
            session,
        }),
    ))
}

/// Read one file part; an empty part counts as missing
async fn read_file(field: Field<'_>, default_name: &str) -> ApiResult<Option<MediaFile>> {
    let file_name = field.file_name().unwrap_or(default_name).to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    let data = field
        .bytes()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?;

    if data.is_empty() {
        return Ok(None);
    }

    Ok(Some(MediaFile {
        file_name,
        content_type,
        data: data.to_vec(),
    }))
}
