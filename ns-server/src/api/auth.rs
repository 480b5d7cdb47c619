//! Bearer token authentication middleware
//!
//! Protected routes require `Authorization: Bearer <token>`. The token must
//! carry a valid signature, must not be expired, and must name a user that
//! still exists. The authenticated user is handed to handlers as an
//! [`AuthUser`] request extension.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use ns_common::api::{parse_bearer, verify_token, ApiAuthError, MessageResponse};
use tracing::{debug, error};

use crate::db;
use crate::AppState;

/// Authenticated caller, inserted by [`auth_middleware`]
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
}

/// Authentication middleware
///
/// Applied to protected routes only; `/health` and the auth endpoints are
/// public.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::Token(ApiAuthError::MissingToken))?;

    let token = parse_bearer(header).map_err(AuthError::Token)?;
    let claims = verify_token(token, &state.token_secret, ns_common::time::now_millis())
        .map_err(|e| {
            debug!(reason = %e, "Rejected bearer token");
            AuthError::Token(e)
        })?;

    let user = db::find_user_by_id(&state.db, &claims.user_id)
        .await
        .map_err(|e| {
            error!(error = %e, "User lookup failed during authentication");
            AuthError::Lookup
        })?
        .ok_or(AuthError::UnknownUser)?;

    request.extensions_mut().insert(AuthUser {
        id: user.id,
        email: user.email,
    });

    Ok(next.run(request).await)
}

/// Authentication error types for HTTP responses
#[derive(Debug)]
pub enum AuthError {
    Token(ApiAuthError),
    UnknownUser,
    Lookup,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::Token(ApiAuthError::MissingToken) => {
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            AuthError::Token(e) => (StatusCode::UNAUTHORIZED, format!("Unauthorized: {}", e)),
            AuthError::UnknownUser => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized: unknown user".to_string(),
            ),
            AuthError::Lookup => (
                StatusCode::INTERNAL_SERVER_ERROR,
                crate::error::SERVER_ERROR_MESSAGE.to_string(),
            ),
        };

        let body = Json(MessageResponse {
            message,
            ..Default::default()
        });

        (status, body).into_response()
    }
}
