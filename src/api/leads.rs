//! Inquiry and quote API endpoints
//!
//! Public:
//! - POST /api/v1/inquiries - Contact form (rate limited per client IP)
//!
//! Admin (editor):
//! - GET /api/v1/admin/inquiries, GET /api/v1/admin/inquiries/{id}
//! - GET /api/v1/admin/quotes, POST /api/v1/admin/quotes
//! - GET /api/v1/admin/quotes/{id}, PUT /api/v1/admin/quotes/{id}/status

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::ApiJson;
use crate::api::middleware::{client_ip, ApiError, AppState};
use crate::models::{CreateInquiryInput, CreateQuoteInput, Inquiry, InquiryWithPackage, Quote, QuoteStatus};

#[derive(Debug, Serialize)]
pub struct InquiryListResponse {
    pub inquiries: Vec<InquiryWithPackage>,
}

#[derive(Debug, Serialize)]
pub struct QuoteListResponse {
    pub quotes: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest<S> {
    pub status: S,
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/", post(submit_inquiry))
}

pub fn admin_inquiries_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_inquiries))
        .route("/{id}", get(get_inquiry))
}

pub fn admin_quotes_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_quotes).post(create_quote))
        .route("/{id}", get(get_quote))
        .route("/{id}/status", put(update_quote_status))
}

/// POST /api/v1/inquiries
async fn submit_inquiry(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<CreateInquiryInput>,
) -> Result<(StatusCode, Json<Inquiry>), ApiError> {
    if let Some(ip) = client_ip(&headers) {
        if !state.inquiry_limiter.try_acquire(ip).await {
            tracing::warn!(%ip, "Inquiry rate limit exceeded");
            return Err(ApiError::rate_limited(
                "Too many inquiries, try again later",
                3600,
            ));
        }
    }

    let inquiry = state.inquiry_service.submit(body).await?;
    Ok((StatusCode::CREATED, Json(inquiry)))
}

async fn list_inquiries(
    State(state): State<AppState>,
) -> Result<Json<InquiryListResponse>, ApiError> {
    let inquiries = state.inquiry_service.list().await?;
    Ok(Json(InquiryListResponse { inquiries }))
}

async fn get_inquiry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Inquiry>, ApiError> {
    Ok(Json(state.inquiry_service.get(id).await?))
}

async fn list_quotes(State(state): State<AppState>) -> Result<Json<QuoteListResponse>, ApiError> {
    let quotes = state.quote_service.list().await?;
    Ok(Json(QuoteListResponse { quotes }))
}

async fn create_quote(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateQuoteInput>,
) -> Result<(StatusCode, Json<Quote>), ApiError> {
    let quote = state.quote_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(quote)))
}

async fn get_quote(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Quote>, ApiError> {
    Ok(Json(state.quote_service.get(id).await?))
}

/// PUT /api/v1/admin/quotes/{id}/status - `{"status": "sent"}`
async fn update_quote_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<StatusRequest<QuoteStatus>>,
) -> Result<Json<Quote>, ApiError> {
    Ok(Json(state.quote_service.update_status(id, body.status).await?))
}
