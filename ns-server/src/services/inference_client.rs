//! Inference service client
//!
//! The backend forwards each upload to three endpoints, in order:
//! `/infer/video` and `/infer/audio` (multipart field `file`) return feature
//! vectors, `/infer/fusion` (JSON `{v, a}`) returns the fused risk score.
//! Feature payloads are opaque JSON and are persisted as returned.

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("NeuroShield/", env!("CARGO_PKG_VERSION"));

/// Inference client errors
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("{stage} inference failed: {status} {message}")]
    ApiError {
        stage: &'static str,
        status: u16,
        message: String,
    },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Inference did not finish within {0}s")]
    DeadlineExceeded(u64),
}

/// One uploaded media file
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Output of `/infer/fusion`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FusionResult {
    pub risk_score: f64,
    #[serde(default)]
    pub fusion_output: Value,
}

/// HTTP client for the inference service
pub struct InferenceClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl InferenceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, InferenceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| InferenceError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Extract video features; returns the `videoFeatures` value
    pub async fn infer_video(&self, file: &MediaFile) -> Result<Value, InferenceError> {
        let body = self.post_file("Video", "/infer/video", file).await?;
        take_field(body, "videoFeatures")
    }

    /// Extract audio features; returns the `audioFeatures` value
    pub async fn infer_audio(&self, file: &MediaFile) -> Result<Value, InferenceError> {
        let body = self.post_file("Audio", "/infer/audio", file).await?;
        take_field(body, "audioFeatures")
    }

    /// Fuse both feature sets into a risk score
    pub async fn infer_fusion(
        &self,
        video_features: &Value,
        audio_features: &Value,
    ) -> Result<FusionResult, InferenceError> {
        let url = format!("{}/infer/fusion", self.base_url);
        tracing::debug!(url = %url, "Requesting fusion");

        let response = self
            .http_client
            .post(&url)
            .json(&json!({ "v": video_features, "a": audio_features }))
            .send()
            .await
            .map_err(|e| InferenceError::NetworkError(e.to_string()))?;

        let body = check_status("Fusion", response).await?;
        let result: FusionResult = serde_json::from_value(body)
            .map_err(|e| InferenceError::ParseError(format!("fusion response: {}", e)))?;

        tracing::info!(risk_score = result.risk_score, "Fusion complete");
        Ok(result)
    }

    async fn post_file(
        &self,
        stage: &'static str,
        path: &str,
        file: &MediaFile,
    ) -> Result<Value, InferenceError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, bytes = file.data.len(), "Sending {} for inference", stage.to_lowercase());

        let part = Part::bytes(file.data.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)
            .map_err(|e| InferenceError::ParseError(format!("content type: {}", e)))?;
        let form = Form::new().part("file", part);

        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| InferenceError::NetworkError(e.to_string()))?;

        check_status(stage, response).await
    }
}

async fn check_status(
    stage: &'static str,
    response: reqwest::Response,
) -> Result<Value, InferenceError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(InferenceError::ApiError {
            stage,
            status: status.as_u16(),
            message,
        });
    }

    response
        .json()
        .await
        .map_err(|e| InferenceError::ParseError(e.to_string()))
}

fn take_field(mut body: Value, field: &str) -> Result<Value, InferenceError> {
    match body.get_mut(field).map(Value::take) {
        Some(value) if !value.is_null() => Ok(value),
        _ => Err(InferenceError::ParseError(format!("response missing '{}'", field))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation_trims_slash() {
        let client = InferenceClient::new("http://localhost:8000/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
    }

    #[test]
    fn test_take_field() {
        let body = json!({"videoFeatures": [0.1, 0.2]});
        assert_eq!(take_field(body, "videoFeatures").unwrap(), json!([0.1, 0.2]));

        let missing = json!({"other": 1});
        assert!(matches!(
            take_field(missing, "videoFeatures"),
            Err(InferenceError::ParseError(_))
        ));
    }

    #[test]
    fn test_fusion_result_without_output() {
        let result: FusionResult = serde_json::from_value(json!({"riskScore": 0.42})).unwrap();
        assert_eq!(result.risk_score, 0.42);
        assert!(result.fusion_output.is_null());
    }
}
