//! Credential sign-up, sign-in and session endpoints.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::{created, success, ApiResult};
use crate::auth::{
    hash_password_blocking, safe_callback, verify_password_blocking, SessionUser,
    DUMMY_PASSWORD_HASH,
};
use crate::errors::AppError;
use crate::models::{normalize_email, LoginRequest, SignupRequest};
use crate::AppState;

/// Minimum accepted password length.
const MIN_PASSWORD_LEN: usize = 8;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Body returned after signing up or in.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: SessionUser,
    /// Where the client should navigate next
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

/// Body of the session probe.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: Option<SessionUser>,
}

/// POST /api/auth/signup - Create an account and sign it in.
pub async fn signup(
    State(state): State<AppState>,
    request: Result<Json<SignupRequest>, JsonRejection>,
) -> ApiResult<AuthResponse> {
    let Json(request) = request.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let name = request.name.trim().to_string();
    let email = normalize_email(&request.email);

    // Validate required fields
    if name.is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    if !email.contains('@') {
        return Err(AppError::Validation("A valid email is required".to_string()));
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let password_hash = hash_password_blocking(request.password).await?;
    let user = state.repo.create_user(&name, &email, &password_hash).await?;
    tracing::info!(user_id = %user.id, "User signed up");

    let session_user = SessionUser::from(&user);
    let token = state.sessions.issue(&session_user)?;
    let cookie = state.sessions.session_cookie(&token);

    created(AuthResponse {
        user: session_user,
        redirect: None,
    })
    .map(|r| r.with_cookie(cookie))
}

/// POST /api/auth/login - Exchange email and password for a session.
pub async fn login(
    State(state): State<AppState>,
    request: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<AuthResponse> {
    let Json(request) = request.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let email = normalize_email(&request.email);

    let Some(user) = state.repo.find_user_by_email(&email).await? else {
        // Unknown accounts pay the same argon2 cost as known ones.
        verify_password_blocking(request.password, DUMMY_PASSWORD_HASH.to_string()).await;
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    };
    if !verify_password_blocking(request.password, user.password_hash.clone()).await {
        tracing::info!(user_id = %user.id, "Rejected sign-in");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let session_user = SessionUser::from(&user);
    let token = state.sessions.issue(&session_user)?;
    let cookie = state.sessions.session_cookie(&token);
    let redirect = safe_callback(
        request.callback_url.as_deref(),
        &state.config.protected_prefix,
    );

    success(AuthResponse {
        user: session_user,
        redirect: Some(redirect),
    })
    .map(|r| r.with_cookie(cookie))
}

/// POST /api/auth/logout - Drop the session cookie.
pub async fn logout(State(state): State<AppState>) -> Response {
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, state.sessions.clear_cookie())],
    )
        .into_response()
}

/// GET /api/auth/session - The current user, or `null`.
pub async fn session(State(state): State<AppState>, headers: HeaderMap) -> Json<SessionResponse> {
    Json(SessionResponse {
        user: state.sessions.user_from_headers(&headers),
    })
}
