//! API middleware
//!
//! Contains:
//! - the shared application state
//! - the JSON error envelope
//! - authentication (session cookie or bearer token)
//! - authorization (admin / editor gates)

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;

use crate::cache::Cache;
use crate::config::{AuthConfig, Config};
use crate::db::repositories::{
    SqlxBookingRepository, SqlxCategoryRepository, SqlxChatRepository, SqlxInquiryRepository,
    SqlxPackageRepository, SqlxPaymentRepository, SqlxQuoteRepository, SqlxSessionRepository,
    SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{User, UserRole};
use crate::services::{
    BookingService, CategoryService, ChatRelay, CheckoutService, DashboardService, InquiryService,
    LoginRateLimiter, PackageService, PaymentGateway, QuoteService, SignatureVerifier,
    SlidingWindow, Storage, UserService, WebhookService,
};

/// Public inquiry submissions accepted per IP per hour
const INQUIRIES_PER_IP_PER_HOUR: usize = 10;

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub auth_config: Arc<AuthConfig>,
    pub user_service: Arc<UserService>,
    pub category_service: Arc<CategoryService>,
    pub package_service: Arc<PackageService>,
    pub inquiry_service: Arc<InquiryService>,
    pub quote_service: Arc<QuoteService>,
    pub booking_service: Arc<BookingService>,
    pub checkout_service: Arc<CheckoutService>,
    pub webhook_service: Arc<WebhookService>,
    /// `None` when no webhook secret is configured; every event is rejected
    pub webhook_verifier: Option<Arc<SignatureVerifier>>,
    pub chat_relay: Arc<ChatRelay>,
    pub dashboard_service: Arc<DashboardService>,
    pub storage: Arc<Storage>,
    pub rate_limiter: Arc<LoginRateLimiter>,
    pub inquiry_limiter: Arc<SlidingWindow<IpAddr>>,
}

impl AppState {
    /// Wire repositories and services over one pool and cache
    pub fn build(
        pool: DynDatabasePool,
        cache: Arc<Cache>,
        config: &Config,
        gateway: Option<Arc<dyn PaymentGateway>>,
    ) -> anyhow::Result<Self> {
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let category_repo = SqlxCategoryRepository::boxed(pool.clone());
        let package_repo = SqlxPackageRepository::boxed(pool.clone());
        let inquiry_repo = SqlxInquiryRepository::boxed(pool.clone());
        let quote_repo = SqlxQuoteRepository::boxed(pool.clone());
        let booking_repo = SqlxBookingRepository::boxed(pool.clone());
        let payment_repo = SqlxPaymentRepository::boxed(pool.clone());
        let chat_repo = SqlxChatRepository::boxed(pool.clone());

        let storage = Arc::new(Storage::new(config.upload.clone()));
        let user_service = Arc::new(UserService::with_session_expiration(
            user_repo,
            session_repo,
            config.auth.session_days,
        ));
        let category_service = Arc::new(CategoryService::new(category_repo.clone(), cache.clone()));
        let package_service = Arc::new(
            PackageService::new(package_repo.clone(), category_repo, cache)
                .with_storage(storage.clone()),
        );
        let inquiry_service = Arc::new(InquiryService::new(inquiry_repo.clone(), package_repo.clone()));
        let quote_service = Arc::new(QuoteService::new(
            quote_repo.clone(),
            inquiry_repo.clone(),
            package_repo.clone(),
        ));
        let booking_service = Arc::new(BookingService::new(booking_repo.clone(), payment_repo.clone()));

        let mut checkout_service = CheckoutService::new(
            package_repo.clone(),
            booking_service.clone(),
            config.payments.clone(),
        );
        if let Some(gateway) = gateway {
            checkout_service = checkout_service.with_gateway(gateway);
        }

        let webhook_service = Arc::new(WebhookService::new(booking_repo.clone(), payment_repo.clone()));
        let webhook_verifier = config
            .payments
            .webhook_secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
            .map(|secret| {
                Arc::new(SignatureVerifier::new(
                    secret,
                    config.payments.signature_tolerance_secs,
                ))
            });

        let chat_relay = Arc::new(ChatRelay::new(chat_repo.clone(), config.chat.clone())?);
        let dashboard_service = Arc::new(DashboardService::new(
            package_repo,
            booking_repo,
            inquiry_repo,
            quote_repo,
            chat_repo,
            payment_repo,
        ));

        Ok(Self {
            pool,
            auth_config: Arc::new(config.auth.clone()),
            user_service,
            category_service,
            package_service,
            inquiry_service,
            quote_service,
            booking_service,
            checkout_service: Arc::new(checkout_service),
            webhook_service,
            webhook_verifier,
            chat_relay,
            dashboard_service,
            storage,
            rate_limiter: Arc::new(LoginRateLimiter::new()),
            inquiry_limiter: Arc::new(SlidingWindow::new(
                INQUIRIES_PER_IP_PER_HOUR,
                chrono::Duration::hours(1),
            )),
        })
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn rate_limited(message: impl Into<String>, retry_after_secs: u64) -> Self {
        Self::with_details(
            "RATE_LIMITED",
            message,
            serde_json::json!({ "retry_after": retry_after_secs }),
        )
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new("SERVICE_UNAVAILABLE", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMITED" => StatusCode::TOO_MANY_REQUESTS,
            "SERVICE_UNAVAILABLE" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Extract session token from the `Authorization: Bearer` header or the
/// session cookie
fn extract_session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    let cookie_str = headers.get(header::COOKIE)?.to_str().ok()?;
    cookie_str.split(';').find_map(|cookie| {
        let (name, value) = cookie.trim().split_once('=')?;
        (name == cookie_name && !value.is_empty()).then(|| value.to_string())
    })
}

/// Session token of the current request, if any
pub fn session_token(state: &AppState, headers: &HeaderMap) -> Option<String> {
    extract_session_token(headers, &state.auth_config.cookie_name)
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = session_token(&state, request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state
        .user_service
        .validate_session(&token)
        .await
        .map_err(|e| ApiError::internal_error(format!("Session validation failed: {}", e)))?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Optional authentication middleware
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = session_token(&state, request.headers()) {
        if let Ok(Some(user)) = state.user_service.validate_session(&token).await {
            request.extensions_mut().insert(AuthenticatedUser(user));
        }
    }
    next.run(request).await
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if user.0.role != UserRole::Admin {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}

/// Editor authorization middleware (admins pass too)
pub async fn require_editor(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_editor() {
        return Err(ApiError::forbidden("Editor privileges required"));
    }

    Ok(next.run(request).await)
}

/// Client address from `X-Forwarded-For` (first hop) or `X-Real-IP`
pub fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        if let Some(ip) = forwarded.split(',').next().and_then(|ip| ip.trim().parse().ok()) {
            return Some(ip);
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|ip| ip.trim().parse().ok())
}
