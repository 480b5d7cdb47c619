//! Shared helpers for ns-server integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request},
    Router,
};
use ns_common::db::init_memory_database;
use ns_server::config::ServerSettings;
use ns_server::services::InferenceClient;
use ns_server::{build_router, AppState};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

pub const TEST_SECRET: &str = "test-secret";
pub const BOUNDARY: &str = "ns-test-boundary";

/// App state backed by an in-memory database
pub async fn test_state(ml_service_url: &str) -> AppState {
    let db = init_memory_database().await.expect("in-memory database");
    let mut settings = ServerSettings::with_root(PathBuf::from("/tmp/ns-server-tests"));
    settings.ml_service_url = ml_service_url.to_string();
    let inference =
        InferenceClient::new(ml_service_url, Duration::from_secs(5)).expect("inference client");
    AppState::new(db, settings, TEST_SECRET, inference)
}

/// Router whose inference URL points nowhere
pub async fn test_app() -> (Router, AppState) {
    let state = test_state("http://127.0.0.1:9").await;
    (build_router(state.clone()), state)
}

pub fn json_request(method: &str, uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

/// One multipart part: (field, file name, content type, data)
pub type Part<'a> = (&'a str, &'a str, &'a str, &'a [u8]);

pub fn multipart_request(uri: &str, parts: &[Part<'_>], token: Option<&str>) -> Request<Body> {
    let mut body = Vec::new();
    for (field, file_name, content_type, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                field, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    let mut builder = Request::builder().method("POST").uri(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={}", BOUNDARY),
    );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}
