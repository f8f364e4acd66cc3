//! Authentication API endpoints
//!
//! - POST /api/v1/auth/register - Register (the first account becomes admin)
//! - POST /api/v1/auth/login - Login, sets the session cookie
//! - POST /api/v1/auth/logout - Logout
//! - GET /api/v1/auth/me - Current user

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{clear_session_cookie, session_cookie, ApiJson};
use crate::api::middleware::{client_ip, session_token, ApiError, AppState, AuthenticatedUser};
use crate::models::User;
use crate::services::user::{LoginInput, RegisterInput, UserServiceError};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub full_name: Option<String>,
    pub role: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            role: user.role.to_string(),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// POST /api/v1/auth/register
async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut input = RegisterInput::new(&body.email, &body.password);
    if let Some(full_name) = body.full_name.filter(|n| !n.trim().is_empty()) {
        input = input.with_full_name(full_name.trim());
    }

    let user = state.user_service.register(input).await?;
    let (_, session) = state
        .user_service
        .login(LoginInput::new(&user.email, &body.password))
        .await?;

    tracing::info!(user_id = user.id, role = %user.role, "User registered");

    Ok((
        StatusCode::CREATED,
        session_cookie(&state, &session),
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
        }),
    ))
}

/// POST /api/v1/auth/login
///
/// Limited to 10 requests per IP per minute and 5 failures per email per
/// 15 minutes.
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = body.email.trim().to_lowercase();

    if let Some(ip) = client_ip(&headers) {
        if state.rate_limiter.is_ip_limited(ip).await {
            tracing::warn!(%ip, "Login IP rate limit exceeded");
            return Err(ApiError::rate_limited(
                "Too many requests, try again later",
                60,
            ));
        }
        state.rate_limiter.record_ip_request(ip).await;
    }

    if state.rate_limiter.is_email_limited(&email).await {
        tracing::warn!(email = %email, "Login attempts exceeded");
        return Err(ApiError::rate_limited(
            "Too many failed attempts, try again in 15 minutes",
            900,
        ));
    }

    let (user, session) = match state
        .user_service
        .login(LoginInput::new(&email, body.password))
        .await
    {
        Ok(pair) => pair,
        Err(UserServiceError::AuthenticationError(_)) => {
            state.rate_limiter.record_failed_attempt(&email).await;
            return Err(ApiError::unauthorized("Invalid email or password"));
        }
        Err(e) => return Err(e.into()),
    };

    state.rate_limiter.clear_email_attempts(&email).await;
    tracing::info!(user_id = user.id, "User logged in");

    Ok((
        session_cookie(&state, &session),
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
        }),
    ))
}

/// POST /api/v1/auth/logout
async fn logout(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = session_token(&state, &headers)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    state.user_service.logout(&token).await?;

    Ok((StatusCode::NO_CONTENT, clear_session_cookie(&state)))
}

/// GET /api/v1/auth/me
async fn get_current_user(user: AuthenticatedUser) -> Json<UserResponse> {
    Json(user.0.into())
}
