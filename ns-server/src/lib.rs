//! ns-server library: NeuroShield assessment backend
//!
//! Authenticates users, forwards uploaded recordings to the inference
//! service and keeps each user's session history.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod services;

use config::ServerSettings;
use services::InferenceClient;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub settings: Arc<ServerSettings>,
    /// Secret used to sign and verify bearer tokens
    pub token_secret: Arc<str>,
    pub inference: Arc<InferenceClient>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        settings: ServerSettings,
        token_secret: impl Into<Arc<str>>,
        inference: InferenceClient,
    ) -> Self {
        Self {
            db,
            settings: Arc::new(settings),
            token_secret: token_secret.into(),
            inference: Arc::new(inference),
        }
    }
}

/// Build application router
///
/// `/health` and `/api/auth/*` are public; everything else requires a bearer
/// token.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    let protected = Router::new()
        .route(
            "/api/sessions",
            get(api::list_sessions).post(api::create_session),
        )
        .route(
            "/api/upload",
            post(api::upload_assessment)
                .layer(DefaultBodyLimit::max(state.settings.max_upload_bytes)),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    let public = Router::new()
        .route("/api/auth/register", post(api::register))
        .route("/api/auth/login", post(api::login))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
