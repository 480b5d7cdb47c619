//! Registration and login
//!
//! `POST /api/auth/register` and `POST /api/auth/login` both answer with
//! `{message, token, user}`. Emails are trimmed and lower-cased before they
//! are stored or looked up.

use axum::{extract::State, http::StatusCode, Json};
use ns_common::api::{
    hash_password, issue_token, verify_password, AuthResponse, Credentials, FieldError,
};
use tracing::info;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub const MIN_PASSWORD_LEN: usize = 6;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let mut errors = Vec::new();
    if !is_valid_email(&credentials.email) {
        errors.push(FieldError::new("email", "Please enter a valid email"));
    }
    if credentials.password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let email = normalize_email(&credentials.email);
    if db::find_user_by_email(&state.db, &email).await?.is_some() {
        return Err(ApiError::BadRequest("User already exists".to_string()));
    }

    let plain = credentials.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|e| ApiError::Internal(format!("password hashing task failed: {}", e)))?
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))?;

    let user = match db::insert_user(&state.db, &email, password_hash).await {
        Ok(user) => user,
        // lost a race with a concurrent registration
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(ApiError::BadRequest("User already exists".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, "Registered user");

    let token = state.issue_token_for(&user.id);
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User registered successfully".to_string(),
            token,
            user: user.info(),
        }),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> ApiResult<Json<AuthResponse>> {
    let mut errors = Vec::new();
    if !is_valid_email(&credentials.email) {
        errors.push(FieldError::new("email", "Please enter a valid email"));
    }
    if credentials.password.is_empty() {
        errors.push(FieldError::new("password", "Password is required"));
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let email = normalize_email(&credentials.email);
    let user = db::find_user_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::BadRequest(INVALID_CREDENTIALS.to_string()))?;

    let plain = credentials.password;
    let stored = user.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || verify_password(&plain, &stored))
        .await
        .map_err(|e| ApiError::Internal(format!("password check task failed: {}", e)))?;

    if !matches {
        info!(user_id = %user.id, "Login rejected: wrong password");
        return Err(ApiError::BadRequest(INVALID_CREDENTIALS.to_string()));
    }

    info!(user_id = %user.id, "User logged in");

    Ok(Json(AuthResponse {
        message: "Login successful".to_string(),
        token: state.issue_token_for(&user.id),
        user: user.info(),
    }))
}

impl AppState {
    /// Sign a token valid for the configured lifetime
    pub fn issue_token_for(&self, user_id: &str) -> String {
        let expires_at = ns_common::time::now_millis() + self.settings.token_ttl_ms();
        issue_token(user_id, expires_at, &self.token_secret)
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic structural email check: `local@domain.tld`, no whitespace
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}
