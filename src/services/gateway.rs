//! Payment gateway client
//!
//! `PaymentGateway` is the seam between checkout and the hosted payment
//! processor. `StripeClient` speaks the Stripe Checkout Sessions REST API
//! (form-encoded requests, JSON responses, bearer secret key).

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Payment processor error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Unexpected processor response: {0}")]
    InvalidResponse(String),
}

/// The single product line of a checkout
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LineItem {
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    /// Amount in the currency's minor unit (cents)
    pub unit_amount: i64,
    pub quantity: i64,
}

/// Everything needed to open a hosted checkout page
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CheckoutRequest {
    /// Lowercase ISO currency code
    pub currency: String,
    pub line_item: LineItem,
    pub customer_email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: BTreeMap<String, String>,
}

/// A checkout session as returned by the processor
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CheckoutSession {
    pub id: String,
    /// Hosted page to redirect the customer to
    pub url: Option<String>,
    /// `open`, `complete` or `expired`
    pub status: Option<String>,
    /// `paid`, `unpaid` or `no_payment_required`
    pub payment_status: Option<String>,
    pub payment_intent: Option<String>,
    /// Full processor payload
    pub raw: Value,
}

impl CheckoutSession {
    pub fn from_json(raw: Value) -> Result<Self, GatewayError> {
        let text = |key: &str| raw.get(key).and_then(Value::as_str).map(str::to_string);
        let id = text("id")
            .ok_or_else(|| GatewayError::InvalidResponse("checkout session without id".to_string()))?;
        Ok(Self {
            id,
            url: text("url"),
            status: text("status"),
            payment_status: text("payment_status"),
            payment_intent: text("payment_intent"),
            raw,
        })
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError>;

    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession, GatewayError>;
}

/// Stripe REST client
pub struct StripeClient {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(api_base: impl Into<String>, secret_key: impl Into<String>) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }

    async fn read_session(response: reqwest::Response) -> Result<CheckoutSession, GatewayError> {
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        if !status.is_success() {
            let message = body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(GatewayError::ApiError {
                status: status.as_u16(),
                message,
            });
        }
        CheckoutSession::from_json(body)
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let url = format!("{}/v1/checkout/sessions", self.api_base);
        let body = encode_form(&checkout_form_fields(request));

        tracing::debug!(url = %url, "Creating checkout session");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;

        Self::read_session(response).await
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession, GatewayError> {
        let url = format!(
            "{}/v1/checkout/sessions/{}",
            self.api_base,
            urlencoding::encode(session_id)
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        Self::read_session(response).await
    }
}

/// Flatten a checkout request into Stripe's bracketed form keys
pub fn checkout_form_fields(request: &CheckoutRequest) -> Vec<(String, String)> {
    let item = &request.line_item;
    let mut fields = vec![
        ("mode".to_string(), "payment".to_string()),
        ("payment_method_types[0]".to_string(), "card".to_string()),
        (
            "line_items[0][price_data][currency]".to_string(),
            request.currency.to_lowercase(),
        ),
        (
            "line_items[0][price_data][product_data][name]".to_string(),
            item.name.clone(),
        ),
    ];
    if let Some(description) = &item.description {
        fields.push((
            "line_items[0][price_data][product_data][description]".to_string(),
            description.clone(),
        ));
    }
    if let Some(image) = &item.image {
        fields.push((
            "line_items[0][price_data][product_data][images][0]".to_string(),
            image.clone(),
        ));
    }
    fields.push((
        "line_items[0][price_data][unit_amount]".to_string(),
        item.unit_amount.to_string(),
    ));
    fields.push(("line_items[0][quantity]".to_string(), item.quantity.to_string()));

    if let Some(email) = &request.customer_email {
        fields.push(("customer_email".to_string(), email.clone()));
    }
    fields.push(("success_url".to_string(), request.success_url.clone()));
    fields.push(("cancel_url".to_string(), request.cancel_url.clone()));
    for (key, value) in &request.metadata {
        fields.push((format!("metadata[{}]", key), value.clone()));
    }
    fields
}

/// `application/x-www-form-urlencoded` body
pub fn encode_form(fields: &[(String, String)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
