//! Payment processor webhook
//!
//! POST /api/v1/webhooks/stripe. The raw body is verified against the
//! `Stripe-Signature` header before it is parsed. Answers are shaped for the
//! processor, not for the API error envelope.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;

use crate::api::middleware::AppState;
use crate::services::WebhookEvent;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

pub fn router() -> Router<AppState> {
    Router::new().route("/stripe", post(stripe_webhook))
}

fn invalid_signature() -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": "Invalid signature" }))).into_response()
}

async fn stripe_webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let Some(verifier) = state.webhook_verifier.as_ref() else {
        tracing::error!("Webhook received but no webhook secret is configured");
        return invalid_signature();
    };
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|h| h.to_str().ok()) else {
        tracing::warn!("Webhook without signature header");
        return invalid_signature();
    };
    if let Err(e) = verifier.verify(&body, signature) {
        tracing::warn!(error = %e, "Webhook signature rejected");
        return invalid_signature();
    }

    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Malformed webhook payload");
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": "Invalid payload" })))
                .into_response();
        }
    };

    match state.webhook_service.handle(&event).await {
        Ok(_) => Json(json!({ "received": true })).into_response(),
        Err(e) => {
            tracing::error!(event_id = %event.id, error = %e, "Webhook handling failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Webhook handler failed" })),
            )
                .into_response()
        }
    }
}
