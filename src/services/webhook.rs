//! Payment webhook
//!
//! Verifies `Stripe-Signature` headers and reconciles bookings and payments
//! from processor events:
//!
//! | event                        | payment     | booking                     |
//! |------------------------------|-------------|-----------------------------|
//! | `checkout.session.completed` | `succeeded` | `confirmed` (+ paid_at)     |
//! | `checkout.session.expired`   | `failed`    | `cancelled` if still pending|
//! | `charge.refunded`            | `refunded`  | `cancelled`                 |
//!
//! Anything else is acknowledged and logged.

use crate::db::repositories::{BookingRepository, PaymentRepository};
use crate::models::{BookingStatus, PaymentStatus};
use anyhow::Context;
use chrono::Utc;
use data_encoding::HEXLOWER_PERMISSIVE;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

pub const EVENT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const EVENT_SESSION_EXPIRED: &str = "checkout.session.expired";
pub const EVENT_CHARGE_REFUNDED: &str = "charge.refunded";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Missing timestamp in signature header")]
    MissingTimestamp,

    #[error("No v1 signature in header")]
    MissingSignature,

    #[error("Signature timestamp outside tolerance")]
    Expired,

    #[error("Signature mismatch")]
    Mismatch,
}

/// Checks `t=<unix>,v1=<hex>[,v1=<hex>...]` against HMAC-SHA256 of
/// `"{t}.{payload}"`
pub struct SignatureVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<String>, tolerance_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    pub fn verify(&self, payload: &[u8], header: &str) -> Result<(), SignatureError> {
        self.verify_at(payload, header, Utc::now().timestamp())
    }

    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<(), SignatureError> {
        let mut timestamp: Option<i64> = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.trim().parse().ok(),
                Some(("v1", value)) => signatures.push(value.trim()),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
        if signatures.is_empty() {
            return Err(SignatureError::MissingSignature);
        }
        if now.abs_diff(timestamp) > self.tolerance_secs.max(0) as u64 {
            return Err(SignatureError::Expired);
        }

        let mac = self.mac_for(timestamp, payload);
        let matched = signatures.iter().any(|candidate| {
            HEXLOWER_PERMISSIVE
                .decode(candidate.as_bytes())
                .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });
        if matched {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }

    /// Header value the processor would send for `payload` at `timestamp`
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> String {
        let digest = self.mac_for(timestamp, payload).finalize().into_bytes();
        format!("t={},v1={}", timestamp, HEXLOWER_PERMISSIVE.encode(&digest))
    }

    fn mac_for(&self, timestamp: i64, payload: &[u8]) -> HmacSha256 {
        // HMAC accepts keys of any length
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac
    }
}

/// Processor event envelope
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: Value,
}

/// What handling an event did
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Processed,
    /// Recognized event that could not be applied
    Skipped(String),
    Unhandled(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct WebhookService {
    booking_repo: Arc<dyn BookingRepository>,
    payment_repo: Arc<dyn PaymentRepository>,
}

impl WebhookService {
    pub fn new(
        booking_repo: Arc<dyn BookingRepository>,
        payment_repo: Arc<dyn PaymentRepository>,
    ) -> Self {
        Self {
            booking_repo,
            payment_repo,
        }
    }

    pub async fn handle(&self, event: &WebhookEvent) -> Result<WebhookOutcome, WebhookError> {
        tracing::info!(event_id = %event.id, event_type = %event.event_type, "Webhook event received");

        let object = &event.data.object;
        let outcome = match event.event_type.as_str() {
            EVENT_SESSION_COMPLETED => self.session_completed(object).await?,
            EVENT_SESSION_EXPIRED => self.session_expired(object).await?,
            EVENT_CHARGE_REFUNDED => self.charge_refunded(object).await?,
            other => {
                tracing::info!(event_type = %other, "Unhandled webhook event");
                WebhookOutcome::Unhandled(other.to_string())
            }
        };

        if let WebhookOutcome::Skipped(reason) = &outcome {
            tracing::warn!(event_id = %event.id, reason = %reason, "Webhook event skipped");
        }
        Ok(outcome)
    }

    async fn session_completed(&self, session: &Value) -> Result<WebhookOutcome, WebhookError> {
        let Some(booking_id) = metadata_booking_id(session) else {
            return Ok(WebhookOutcome::Skipped("no booking_id in session metadata".to_string()));
        };
        let session_id = str_field(session, "id");
        let payment_intent = str_field(session, "payment_intent");

        if let Some(session_id) = session_id {
            match self
                .payment_repo
                .get_by_session_id(session_id)
                .await
                .context("Failed to find payment")?
            {
                Some(payment) => {
                    self.payment_repo
                        .update_status(payment.id, PaymentStatus::Succeeded, payment_intent, Some(session))
                        .await
                        .context("Failed to mark payment succeeded")?;
                }
                None => tracing::warn!(session_id = %session_id, "No payment recorded for session"),
            }
        }

        let Some(booking) = self
            .booking_repo
            .get_by_id(booking_id)
            .await
            .context("Failed to load booking")?
        else {
            return Ok(WebhookOutcome::Skipped(format!("booking {} not found", booking_id)));
        };

        let mut metadata = match booking.metadata {
            Some(Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        metadata.insert("paid_at".to_string(), json!(Utc::now().to_rfc3339()));
        metadata.insert("stripe_payment_intent_id".to_string(), json!(payment_intent));

        self.booking_repo
            .update_status(booking_id, BookingStatus::Confirmed, Some(&Value::Object(metadata)))
            .await
            .context("Failed to confirm booking")?;

        tracing::info!(booking_id, "Booking confirmed by payment");
        Ok(WebhookOutcome::Processed)
    }

    async fn session_expired(&self, session: &Value) -> Result<WebhookOutcome, WebhookError> {
        let Some(session_id) = str_field(session, "id") else {
            return Ok(WebhookOutcome::Skipped("session without id".to_string()));
        };

        let payment = self
            .payment_repo
            .get_by_session_id(session_id)
            .await
            .context("Failed to find payment")?;
        if let Some(payment) = &payment {
            self.payment_repo
                .update_status(payment.id, PaymentStatus::Failed, None, Some(session))
                .await
                .context("Failed to mark payment failed")?;
        }

        let booking_id = payment
            .and_then(|p| p.booking_id)
            .or_else(|| metadata_booking_id(session));
        let Some(booking_id) = booking_id else {
            return Ok(WebhookOutcome::Skipped(format!("no booking for session {}", session_id)));
        };

        let cancelled = self
            .booking_repo
            .transition_if(booking_id, BookingStatus::Pending, BookingStatus::Cancelled)
            .await
            .context("Failed to cancel booking")?;
        tracing::info!(booking_id, cancelled, "Checkout session expired");
        Ok(WebhookOutcome::Processed)
    }

    async fn charge_refunded(&self, charge: &Value) -> Result<WebhookOutcome, WebhookError> {
        let Some(payment_intent) = str_field(charge, "payment_intent") else {
            return Ok(WebhookOutcome::Skipped("charge without payment_intent".to_string()));
        };

        let Some(payment) = self
            .payment_repo
            .get_by_payment_intent(payment_intent)
            .await
            .context("Failed to find payment")?
        else {
            return Ok(WebhookOutcome::Skipped(format!(
                "no payment for intent {}",
                payment_intent
            )));
        };

        self.payment_repo
            .update_status(payment.id, PaymentStatus::Refunded, None, Some(charge))
            .await
            .context("Failed to mark payment refunded")?;

        if let Some(booking_id) = payment.booking_id {
            self.booking_repo
                .update_status(booking_id, BookingStatus::Cancelled, None)
                .await
                .context("Failed to cancel refunded booking")?;
            tracing::info!(booking_id, payment_id = payment.id, "Payment refunded");
        }
        Ok(WebhookOutcome::Processed)
    }
}

fn str_field<'a>(object: &'a Value, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// `metadata.booking_id`, sent as a string but tolerated as a number
fn metadata_booking_id(session: &Value) -> Option<i64> {
    match session.pointer("/metadata/booking_id")? {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxBookingRepository, SqlxPaymentRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Booking, Payment};
    use proptest::prelude::*;

    const SECRET: &str = "whsec_test_secret";

    #[test]
    fn test_signature_roundtrip() {
        let verifier = SignatureVerifier::new(SECRET, 300);
        let payload = br#"{"id":"evt_1"}"#;
        let header = verifier.sign(payload, 1_700_000_000);

        assert_eq!(verifier.verify_at(payload, &header, 1_700_000_100), Ok(()));
        assert_eq!(
            verifier.verify_at(b"{\"id\":\"evt_2\"}", &header, 1_700_000_100),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verifier.verify_at(payload, &header, 1_700_000_301),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_any_v1_signature_matches() {
        let verifier = SignatureVerifier::new(SECRET, 300);
        let payload = b"body";
        let signed = verifier.sign(payload, 100);
        let v1 = signed.split_once(",v1=").unwrap().1;
        let header = format!("t=100, v1=deadbeef, v0=ignored, v1={}", v1.to_uppercase());
        assert_eq!(verifier.verify_at(payload, &header, 100), Ok(()));
    }

    #[test]
    fn test_malformed_headers() {
        let verifier = SignatureVerifier::new(SECRET, 300);
        assert_eq!(verifier.verify_at(b"x", "v1=abc", 0), Err(SignatureError::MissingTimestamp));
        assert_eq!(verifier.verify_at(b"x", "t=0", 0), Err(SignatureError::MissingSignature));
        assert_eq!(verifier.verify_at(b"x", "t=0,v1=zz", 0), Err(SignatureError::Mismatch));
        assert_eq!(verifier.verify_at(b"x", "", 0), Err(SignatureError::MissingTimestamp));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let signer = SignatureVerifier::new("whsec_other", 300);
        let verifier = SignatureVerifier::new(SECRET, 300);
        let header = signer.sign(b"payload", 50);
        assert_eq!(verifier.verify_at(b"payload", &header, 50), Err(SignatureError::Mismatch));
    }

    #[test]
    fn test_extreme_timestamps_are_expired() {
        let verifier = SignatureVerifier::new(SECRET, 300);
        assert_eq!(
            verifier.verify(b"{}", "t=-9223372036854775808,v1=00"),
            Err(SignatureError::Expired)
        );
        assert_eq!(
            verifier.verify_at(b"{}", "t=9223372036854775807,v1=00", i64::MIN),
            Err(SignatureError::Expired)
        );
    }

    proptest! {
        #[test]
        fn prop_signed_payload_verifies(payload in proptest::collection::vec(any::<u8>(), 0..256), t in 0i64..2_000_000_000) {
            let verifier = SignatureVerifier::new(SECRET, 300);
            let header = verifier.sign(&payload, t);
            prop_assert_eq!(verifier.verify_at(&payload, &header, t), Ok(()));
        }

        #[test]
        fn prop_tampered_payload_fails(payload in proptest::collection::vec(any::<u8>(), 1..128), flip in any::<usize>()) {
            let verifier = SignatureVerifier::new(SECRET, 300);
            let header = verifier.sign(&payload, 10);
            let mut tampered = payload.clone();
            let i = flip % tampered.len();
            tampered[i] ^= 0x01;
            prop_assert_eq!(verifier.verify_at(&tampered, &header, 10), Err(SignatureError::Mismatch));
        }
    }

    struct Fixture {
        service: WebhookService,
        bookings: Arc<dyn BookingRepository>,
        payments: Arc<dyn PaymentRepository>,
    }

    async fn setup_test_service() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool.execute("INSERT INTO packages (id, title, slug, destination) VALUES (1, 'Valle de Guadalupe', 'valle', 'Baja California')")
            .await
            .unwrap();

        let bookings = SqlxBookingRepository::boxed(pool.clone());
        let payments = SqlxPaymentRepository::boxed(pool);
        Fixture {
            service: WebhookService::new(bookings.clone(), payments.clone()),
            bookings,
            payments,
        }
    }

    async fn pending_checkout(f: &Fixture, session_id: &str) -> (Booking, Payment) {
        let now = Utc::now();
        let booking = f
            .bookings
            .create(&Booking {
                id: 0,
                package_id: Some(1),
                user_id: None,
                checkin: chrono::NaiveDate::from_ymd_opt(2027, 3, 1).unwrap(),
                checkout: chrono::NaiveDate::from_ymd_opt(2027, 3, 4).unwrap(),
                guests: 2,
                amount: 9000.0,
                currency: "MXN".into(),
                status: BookingStatus::Pending,
                metadata: Some(json!({"created_from": "checkout_flow"})),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        let payment = f
            .payments
            .create(&Payment {
                id: 0,
                booking_id: Some(booking.id),
                stripe_payment_intent_id: None,
                stripe_session_id: Some(session_id.to_string()),
                amount: 9000.0,
                currency: "MXN".into(),
                status: PaymentStatus::Pending,
                raw: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        (booking, payment)
    }

    fn event(event_type: &str, object: Value) -> WebhookEvent {
        serde_json::from_value(json!({
            "id": "evt_test",
            "type": event_type,
            "data": {"object": object}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_session_completed_confirms_booking() {
        let f = setup_test_service().await;
        let (booking, payment) = pending_checkout(&f, "cs_1").await;

        let outcome = f
            .service
            .handle(&event(
                EVENT_SESSION_COMPLETED,
                json!({
                    "id": "cs_1",
                    "payment_intent": "pi_1",
                    "metadata": {"booking_id": booking.id.to_string()}
                }),
            ))
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Processed);

        let payment = f.payments.get_by_id(payment.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Succeeded);
        assert_eq!(payment.stripe_payment_intent_id.as_deref(), Some("pi_1"));
        assert_eq!(payment.raw.unwrap()["id"], "cs_1");

        let booking = f.bookings.get_by_id(booking.id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        let metadata = booking.metadata.unwrap();
        assert_eq!(metadata["created_from"], "checkout_flow");
        assert_eq!(metadata["stripe_payment_intent_id"], "pi_1");
        assert!(metadata["paid_at"].is_string());
    }

    #[tokio::test]
    async fn test_session_completed_without_booking_id_is_skipped() {
        let f = setup_test_service().await;
        let (booking, _) = pending_checkout(&f, "cs_2").await;

        let outcome = f
            .service
            .handle(&event(EVENT_SESSION_COMPLETED, json!({"id": "cs_2", "metadata": {}})))
            .await
            .unwrap();
        assert!(matches!(outcome, WebhookOutcome::Skipped(_)));

        let booking = f.bookings.get_by_id(booking.id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        let payment = f.payments.get_by_session_id("cs_2").await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_session_expired_cancels_only_pending() {
        let f = setup_test_service().await;
        let (pending, _) = pending_checkout(&f, "cs_exp").await;
        let (confirmed, _) = pending_checkout(&f, "cs_paid").await;
        f.bookings
            .update_status(confirmed.id, BookingStatus::Confirmed, None)
            .await
            .unwrap();

        f.service
            .handle(&event(EVENT_SESSION_EXPIRED, json!({"id": "cs_exp"})))
            .await
            .unwrap();
        f.service
            .handle(&event(EVENT_SESSION_EXPIRED, json!({"id": "cs_paid"})))
            .await
            .unwrap();

        let pending = f.bookings.get_by_id(pending.id).await.unwrap().unwrap();
        assert_eq!(pending.status, BookingStatus::Cancelled);
        let confirmed = f.bookings.get_by_id(confirmed.id).await.unwrap().unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);

        let payment = f.payments.get_by_session_id("cs_exp").await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_charge_refunded() {
        let f = setup_test_service().await;
        let (booking, payment) = pending_checkout(&f, "cs_ref").await;
        f.payments
            .update_status(payment.id, PaymentStatus::Succeeded, Some("pi_ref"), None)
            .await
            .unwrap();

        let outcome = f
            .service
            .handle(&event(
                EVENT_CHARGE_REFUNDED,
                json!({"id": "ch_1", "payment_intent": "pi_ref", "amount_refunded": 900000}),
            ))
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Processed);

        let payment = f.payments.get_by_id(payment.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Refunded);
        let booking = f.bookings.get_by_id(booking.id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_unhandled_event_touches_nothing() {
        let f = setup_test_service().await;
        let (booking, _) = pending_checkout(&f, "cs_x").await;

        let outcome = f
            .service
            .handle(&event("customer.created", json!({"id": "cus_1"})))
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Unhandled("customer.created".to_string()));
        let booking = f.bookings.get_by_id(booking.id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
    }

    #[test]
    fn test_metadata_booking_id_forms() {
        assert_eq!(metadata_booking_id(&json!({"metadata": {"booking_id": "42"}})), Some(42));
        assert_eq!(metadata_booking_id(&json!({"metadata": {"booking_id": 7}})), Some(7));
        assert_eq!(metadata_booking_id(&json!({"metadata": {"booking_id": "abc"}})), None);
        assert_eq!(metadata_booking_id(&json!({})), None);
    }
}
