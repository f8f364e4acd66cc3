//! Common API utilities and shared types
//!
//! - `ApiJson`, a JSON body extractor that rejects with the API error envelope
//! - conversions from service errors to `ApiError`
//! - the session cookie helpers shared by auth handlers

use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::{header, HeaderMap, HeaderValue},
};

use crate::api::middleware::{ApiError, AppState};
use crate::models::Session;
use crate::services::{
    BookingServiceError, CategoryServiceError, ChatError, CheckoutServiceError,
    InquiryServiceError, PackageServiceError, QuoteServiceError, StorageError, UserServiceError,
};

/// `axum::Json` with malformed bodies reported as `VALIDATION_ERROR`
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation_error(rejection.body_text())
    }
}

fn internal(err: impl std::fmt::Display) -> ApiError {
    tracing::error!(error = %err, "Request failed");
    ApiError::internal_error("Internal server error")
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::UserExists(msg) => ApiError::conflict(msg),
            UserServiceError::NotFound(id) => ApiError::not_found(format!("User {} not found", id)),
            other => internal(other),
        }
    }
}

impl From<CategoryServiceError> for ApiError {
    fn from(err: CategoryServiceError) -> Self {
        match err {
            CategoryServiceError::NotFound(what) => {
                ApiError::not_found(format!("Category not found: {}", what))
            }
            CategoryServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            e @ (CategoryServiceError::DuplicateName(_) | CategoryServiceError::DuplicateSlug(_)) => {
                ApiError::conflict(e.to_string())
            }
            other => internal(other),
        }
    }
}

impl From<PackageServiceError> for ApiError {
    fn from(err: PackageServiceError) -> Self {
        match err {
            PackageServiceError::NotFound(what) => {
                ApiError::not_found(format!("Package not found: {}", what))
            }
            PackageServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            e @ PackageServiceError::DuplicateSlug(_) => ApiError::conflict(e.to_string()),
            other => internal(other),
        }
    }
}

impl From<InquiryServiceError> for ApiError {
    fn from(err: InquiryServiceError) -> Self {
        match err {
            e @ InquiryServiceError::NotFound(_) => ApiError::not_found(e.to_string()),
            InquiryServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            other => internal(other),
        }
    }
}

impl From<QuoteServiceError> for ApiError {
    fn from(err: QuoteServiceError) -> Self {
        match err {
            e @ QuoteServiceError::NotFound(_) => ApiError::not_found(e.to_string()),
            QuoteServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            e @ QuoteServiceError::InvalidTransition { .. } => ApiError::validation_error(e.to_string()),
            other => internal(other),
        }
    }
}

impl From<BookingServiceError> for ApiError {
    fn from(err: BookingServiceError) -> Self {
        match err {
            e @ BookingServiceError::NotFound(_) => ApiError::not_found(e.to_string()),
            BookingServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            e @ BookingServiceError::InvalidTransition { .. } => {
                ApiError::validation_error(e.to_string())
            }
            other => internal(other),
        }
    }
}

impl From<CheckoutServiceError> for ApiError {
    fn from(err: CheckoutServiceError) -> Self {
        match err {
            e @ CheckoutServiceError::Unavailable => ApiError::service_unavailable(e.to_string()),
            e @ CheckoutServiceError::MissingFields => ApiError::validation_error(e.to_string()),
            e @ CheckoutServiceError::PackageNotFound => ApiError::not_found(e.to_string()),
            e @ CheckoutServiceError::SessionNotFound(_) => ApiError::not_found(e.to_string()),
            CheckoutServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            e @ CheckoutServiceError::Forbidden => ApiError::forbidden(e.to_string()),
            CheckoutServiceError::Gateway(e) => {
                tracing::error!(error = %e, "Payment processor call failed");
                ApiError::internal_error("Failed to create checkout session")
            }
            other => internal(other),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            e @ ChatError::MissingFields => ApiError::validation_error(e.to_string()),
            ChatError::ValidationError(msg) => ApiError::validation_error(msg),
            e @ ChatError::RateLimited => ApiError::rate_limited(e.to_string(), 60),
            e @ (ChatError::Upstream(_) | ChatError::RequestFailed(_)) => {
                ApiError::internal_error(e.to_string())
            }
            other => internal(other),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InternalError(e) => internal(e),
            other => ApiError::validation_error(other.to_string()),
        }
    }
}

/// `Set-Cookie` header carrying a fresh session
pub fn session_cookie(state: &AppState, session: &Session) -> HeaderMap {
    let config = &state.auth_config;
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        config.cookie_name,
        session.id,
        session.max_age_secs()
    );
    if config.secure_cookie {
        cookie.push_str("; Secure");
    }
    set_cookie(cookie)
}

/// `Set-Cookie` header expiring the session cookie
pub fn clear_session_cookie(state: &AppState) -> HeaderMap {
    set_cookie(format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        state.auth_config.cookie_name
    ))
}

fn set_cookie(cookie: String) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        headers.insert(header::SET_COOKIE, value);
    }
    headers
}
