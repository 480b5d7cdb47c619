//! Shared API request/response types
//!
//! JSON field names are camelCase to match the public REST contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ========================================
// Authentication Types
// ========================================

/// Body of `POST /api/auth/register` and `POST /api/auth/login`
///
/// Missing fields deserialize as empty strings so the server can report them
/// as validation errors instead of rejecting the body outright.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Public user identity
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
}

/// Successful register/login response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub message: String,
    pub token: String,
    pub user: UserInfo,
}

// ========================================
// Session Types
// ========================================

/// A persisted assessment session
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    pub risk_score: f64,
    pub model_version: String,
    pub video_features: Value,
    pub audio_features: Value,
    pub fusion_output: Value,
    pub recorded_at: DateTime<Utc>,
}

impl SessionRecord {
    /// `fusionOutput.riskClass`, when the inference service reported one
    pub fn risk_class(&self) -> Option<&str> {
        self.fusion_output.get("riskClass").and_then(Value::as_str)
    }
}

/// Body of `POST /api/sessions`
///
/// All fields are optional on the wire so missing ones can be reported with a
/// 400 rather than a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionRequest {
    pub video_features: Option<Value>,
    pub audio_features: Option<Value>,
    pub fusion_output: Option<Value>,
    pub risk_score: Option<f64>,
}

/// Response of `POST /api/upload`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub message: String,
    pub session: SessionRecord,
}

// ========================================
// Error / Misc Types
// ========================================

/// One failed validation rule
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Generic `{ "message": ... }` body used by error responses
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

/// Health check response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_record_uses_camel_case() {
        let json = json!({
            "id": "s1",
            "userId": "u1",
            "riskScore": 0.15,
            "modelVersion": "1.0.0",
            "videoFeatures": [0.1, 0.2],
            "audioFeatures": [0.3],
            "fusionOutput": {"riskClass": "Low Risk"},
            "recordedAt": "2025-03-18T09:30:00Z"
        });

        let session: SessionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(session.user_id, "u1");
        assert_eq!(session.risk_class(), Some("Low Risk"));

        let back = serde_json::to_value(&session).unwrap();
        assert!(back.get("riskScore").is_some());
        assert!(back.get("risk_score").is_none());
    }

    #[test]
    fn test_credentials_missing_fields_default_to_empty() {
        let creds: Credentials = serde_json::from_str(r#"{"email": "a@b.co"}"#).unwrap();
        assert_eq!(creds.email, "a@b.co");
        assert!(creds.password.is_empty());
    }

    #[test]
    fn test_message_response_omits_empty_parts() {
        let body = MessageResponse {
            message: "Invalid credentials".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"message":"Invalid credentials"}"#);
    }

    #[test]
    fn test_new_session_request_detects_missing_score() {
        let req: NewSessionRequest = serde_json::from_value(json!({
            "videoFeatures": {}, "audioFeatures": {}, "fusionOutput": {}
        }))
        .unwrap();
        assert!(req.risk_score.is_none());
    }
}
