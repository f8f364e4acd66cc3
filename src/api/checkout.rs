//! Checkout API endpoints
//!
//! - POST /api/v1/checkout - Start a hosted checkout for a `payment` package
//! - GET /api/v1/checkout/success?session_id= - Result page data

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::ApiJson;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::services::{CheckoutInput, CheckoutStarted, CheckoutSummary};

#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    #[serde(default)]
    pub session_id: String,
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", post(start_checkout))
        .route("/success", get(checkout_success))
}

/// POST /api/v1/checkout
///
/// Body `{packageId, checkin, checkout, guests, amount}`; answers
/// `{sessionId, url, bookingId}`.
async fn start_checkout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(body): ApiJson<CheckoutInput>,
) -> Result<Json<CheckoutStarted>, ApiError> {
    Ok(Json(state.checkout_service.start(body, &user.0).await?))
}

/// GET /api/v1/checkout/success
async fn checkout_success(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<SuccessQuery>,
) -> Result<Json<CheckoutSummary>, ApiError> {
    Ok(Json(
        state
            .checkout_service
            .success(&query.session_id, &user.0)
            .await?,
    ))
}
