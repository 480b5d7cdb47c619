//! Backend HTTP client
//!
//! Talks to the NeuroShield backend: account calls, session history, and the
//! single multipart upload that turns a recording into a risk assessment.
//! Non-2xx responses are never retried.

use async_trait::async_trait;
use ns_common::api::auth::bearer_header;
use ns_common::api::{AuthResponse, Credentials, MessageResponse, SessionRecord, UploadResponse};
use ns_common::risk::{interpret_with_class, AssessmentResult};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::assembler::Blob;
use crate::error::{CaptureError, CaptureResult};

const USER_AGENT: &str = concat!("NeuroShield-Capture/", env!("CARGO_PKG_VERSION"));

pub const VIDEO_FILE_NAME: &str = "recording.webm";
pub const AUDIO_FILE_NAME: &str = "audio.webm";

/// Submits an assessment on behalf of the signed-in user
#[async_trait]
pub trait AssessmentApi: Send + Sync {
    async fn upload_assessment(&self, video: &Blob, audio: &Blob) -> CaptureResult<UploadResponse>;
}

/// Map a successful upload onto the interpreted result
pub fn interpret_upload(response: &UploadResponse) -> AssessmentResult {
    interpret_with_class(response.session.risk_score, response.session.risk_class())
}

/// Fail fast when either blob is empty
pub fn ensure_non_empty(video: &Blob, audio: &Blob) -> CaptureResult<()> {
    if video.is_empty() || audio.is_empty() {
        return Err(CaptureError::EmptyRecording);
    }
    Ok(())
}

/// HTTP client for the backend REST API
#[derive(Clone)]
pub struct ApiClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> CaptureResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| CaptureError::NetworkFailure(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn register(&self, email: &str, password: &str) -> CaptureResult<AuthResponse> {
        self.post_credentials("/api/auth/register", email, password).await
    }

    pub async fn login(&self, email: &str, password: &str) -> CaptureResult<AuthResponse> {
        self.post_credentials("/api/auth/login", email, password).await
    }

    /// Past sessions, newest first
    pub async fn sessions(&self, token: &str) -> CaptureResult<Vec<SessionRecord>> {
        let url = self.url("/api/sessions");
        debug!(url = %url, "Fetching session history");

        let response = self
            .http_client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, bearer_header(token))
            .send()
            .await
            .map_err(network_failure)?;

        parse_response(response).await
    }

    /// Upload both recordings as one multipart request
    pub async fn upload(
        &self,
        token: &str,
        video: &Blob,
        audio: &Blob,
    ) -> CaptureResult<UploadResponse> {
        ensure_non_empty(video, audio)?;

        let url = self.url("/api/upload");
        info!(
            url = %url,
            video_bytes = video.len(),
            audio_bytes = audio.len(),
            "Uploading assessment"
        );

        let form = Form::new()
            .part("video", blob_part(video, VIDEO_FILE_NAME)?)
            .part("audio", blob_part(audio, AUDIO_FILE_NAME)?);

        let response = self
            .http_client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, bearer_header(token))
            .multipart(form)
            .send()
            .await
            .map_err(network_failure)?;

        let upload: UploadResponse = parse_response(response).await?;
        info!(
            session_id = %upload.session.id,
            risk_score = upload.session.risk_score,
            "Assessment stored"
        );
        Ok(upload)
    }

    async fn post_credentials(
        &self,
        path: &str,
        email: &str,
        password: &str,
    ) -> CaptureResult<AuthResponse> {
        let url = self.url(path);
        debug!(url = %url, email = %email, "Sending credentials");

        let body = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(network_failure)?;

        parse_response(response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn blob_part(blob: &Blob, file_name: &'static str) -> CaptureResult<Part> {
    Part::bytes(blob.data.clone())
        .file_name(file_name)
        .mime_str(&blob.mime_type)
        .map_err(|e| CaptureError::InvalidResponse(format!("content type: {}", e)))
}

fn network_failure(err: reqwest::Error) -> CaptureError {
    CaptureError::NetworkFailure(err.to_string())
}

async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> CaptureResult<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| CaptureError::InvalidResponse(e.to_string()));
    }

    let text = response.text().await.unwrap_or_default();
    let message = error_message(&text);
    warn!(status = status.as_u16(), message = %message, "Backend request failed");

    if status == StatusCode::UNAUTHORIZED {
        return Err(CaptureError::Unauthorized(message));
    }
    Err(CaptureError::ServerError {
        status: status.as_u16(),
        message,
    })
}

/// The body's `message` field, or the raw body when it is not JSON
fn error_message(body: &str) -> String {
    match serde_json::from_str::<MessageResponse>(body) {
        Ok(parsed) if !parsed.message.is_empty() => match parsed.error {
            Some(detail) => format!("{}: {}", parsed.message, detail),
            None => parsed.message,
        },
        _ => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_message_prefers_json_message() {
        assert_eq!(error_message(r#"{"message":"Invalid credentials"}"#), "Invalid credentials");
        assert_eq!(
            error_message(r#"{"message":"Server error","error":"Audio inference failed"}"#),
            "Server error: Audio inference failed"
        );
        assert_eq!(error_message("  Bad Gateway \n"), "Bad Gateway");
    }

    #[test]
    fn test_empty_blob_rejected() {
        let video = Blob::new(b"frames".to_vec(), "video/webm");
        let audio = Blob::new(Vec::new(), "audio/webm");
        assert!(matches!(
            ensure_non_empty(&video, &audio),
            Err(CaptureError::EmptyRecording)
        ));
    }

    #[test]
    fn test_interpret_upload_uses_server_class() {
        let response: UploadResponse = serde_json::from_value(json!({
            "message": "Assessment completed successfully",
            "session": {
                "id": "s1",
                "userId": "u1",
                "riskScore": 0.15,
                "modelVersion": "1.0.0",
                "videoFeatures": [],
                "audioFeatures": [],
                "fusionOutput": {"riskClass": "Low Risk"},
                "recordedAt": "2025-03-18T09:30:00Z"
            }
        }))
        .unwrap();

        let result = interpret_upload(&response);
        assert_eq!(result.display_percent(), "15%");
        assert_eq!(result.risk_class, "Low Risk");
        assert_eq!(result.speech_pattern, "Normal");
    }
}
