//! Booking and payment API endpoints
//!
//! - GET /api/v1/bookings - The current user's bookings
//! - GET /api/v1/bookings/{id} - One booking (owner or staff)
//! - GET /api/v1/admin/bookings - All bookings (editor)
//! - GET /api/v1/admin/bookings/{id} - Booking detail (editor)
//! - PUT /api/v1/admin/bookings/{id}/status - Status change (editor)
//! - GET /api/v1/admin/payments - Payments with booking and customer (editor)

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde::Serialize;

use crate::api::common::ApiJson;
use crate::api::leads::StatusRequest;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Booking, BookingStatus, BookingWithPackage, PaymentWithDetails};

#[derive(Debug, Serialize)]
pub struct BookingListResponse {
    pub bookings: Vec<BookingWithPackage>,
}

#[derive(Debug, Serialize)]
pub struct PaymentListResponse {
    pub payments: Vec<PaymentWithDetails>,
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", get(my_bookings))
        .route("/{id}", get(get_own_booking))
}

pub fn admin_bookings_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_bookings))
        .route("/{id}", get(get_booking))
        .route("/{id}/status", put(update_booking_status))
}

pub fn admin_payments_router() -> Router<AppState> {
    Router::new().route("/", get(list_payments))
}

async fn my_bookings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<BookingListResponse>, ApiError> {
    let bookings = state.booking_service.list_for_user(user.0.id).await?;
    Ok(Json(BookingListResponse { bookings }))
}

async fn get_own_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<BookingWithPackage>, ApiError> {
    let booking = state.booking_service.get(id).await?;
    if !user.0.can_view_booking(booking.booking.user_id) {
        // same answer as a missing booking
        return Err(ApiError::not_found(format!("Booking not found: {}", id)));
    }
    Ok(Json(booking))
}

async fn list_bookings(
    State(state): State<AppState>,
) -> Result<Json<BookingListResponse>, ApiError> {
    let bookings = state.booking_service.list().await?;
    Ok(Json(BookingListResponse { bookings }))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<BookingWithPackage>, ApiError> {
    Ok(Json(state.booking_service.get(id).await?))
}

/// PUT /api/v1/admin/bookings/{id}/status - `{"status": "confirmed"}`
async fn update_booking_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<StatusRequest<BookingStatus>>,
) -> Result<Json<Booking>, ApiError> {
    let booking = state.booking_service.update_status(id, body.status).await?;
    tracing::info!(booking_id = id, status = %booking.status, by = user.0.id, "Booking status updated by staff");
    Ok(Json(booking))
}

async fn list_payments(
    State(state): State<AppState>,
) -> Result<Json<PaymentListResponse>, ApiError> {
    let payments = state.booking_service.list_payments().await?;
    Ok(Json(PaymentListResponse { payments }))
}
