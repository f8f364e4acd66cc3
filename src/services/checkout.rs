//! Checkout service
//!
//! Turns a priced selection on a `payment`-mode package into a pending
//! booking, a hosted checkout session and a pending payment. The webhook
//! settles both afterwards.

use crate::config::PaymentsConfig;
use crate::db::repositories::PackageRepository;
use crate::models::{
    BookingMode, BookingWithPackage, CreateBookingInput, CreatePaymentInput, Package, Payment, User,
};
use crate::services::booking::{BookingService, BookingServiceError};
use crate::services::gateway::{CheckoutRequest, GatewayError, LineItem, PaymentGateway};
use anyhow::Context;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Accepted difference between the submitted amount and the package price
const AMOUNT_TOLERANCE: f64 = 0.01;

#[derive(Debug, thiserror::Error)]
pub enum CheckoutServiceError {
    #[error("Payments are not configured")]
    Unavailable,

    #[error("Missing required fields")]
    MissingFields,

    #[error("Package not found")]
    PackageNotFound,

    #[error("Checkout session not found: {0}")]
    SessionNotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not allowed to view this checkout")]
    Forbidden,

    #[error("Payment processor error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<BookingServiceError> for CheckoutServiceError {
    fn from(err: BookingServiceError) -> Self {
        match err {
            BookingServiceError::ValidationError(msg) => CheckoutServiceError::ValidationError(msg),
            other => CheckoutServiceError::InternalError(anyhow::Error::new(other)),
        }
    }
}

/// Checkout request body. Every field is required; dates are `YYYY-MM-DD`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutInput {
    pub package_id: Option<i64>,
    pub checkin: Option<String>,
    pub checkout: Option<String>,
    pub guests: Option<i32>,
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutStarted {
    pub session_id: String,
    pub url: Option<String>,
    pub booking_id: i64,
}

/// What the success page shows after returning from the processor
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSummary {
    pub payment: Payment,
    pub booking: BookingWithPackage,
    pub package: Option<Package>,
    /// Session status reported by the processor, when it could be reached
    pub session_status: Option<String>,
    pub payment_status: Option<String>,
}

pub struct CheckoutService {
    package_repo: Arc<dyn PackageRepository>,
    bookings: Arc<BookingService>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    config: PaymentsConfig,
}

impl CheckoutService {
    pub fn new(
        package_repo: Arc<dyn PackageRepository>,
        bookings: Arc<BookingService>,
        config: PaymentsConfig,
    ) -> Self {
        Self {
            package_repo,
            bookings,
            gateway: None,
            config,
        }
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    fn gateway(&self) -> Result<&Arc<dyn PaymentGateway>, CheckoutServiceError> {
        match &self.gateway {
            Some(gateway) if self.config.enabled => Ok(gateway),
            _ => Err(CheckoutServiceError::Unavailable),
        }
    }

    pub async fn start(
        &self,
        input: CheckoutInput,
        customer: &User,
    ) -> Result<CheckoutStarted, CheckoutServiceError> {
        let gateway = self.gateway()?.clone();

        let (Some(package_id), Some(checkin), Some(checkout), Some(guests), Some(amount)) = (
            input.package_id,
            input.checkin.as_deref(),
            input.checkout.as_deref(),
            input.guests,
            input.amount,
        ) else {
            return Err(CheckoutServiceError::MissingFields);
        };
        let checkin = parse_date(checkin, "checkin")?;
        let checkout = parse_date(checkout, "checkout")?;

        let package = self
            .package_repo
            .get_by_id(package_id)
            .await
            .context("Failed to load package")?
            .ok_or(CheckoutServiceError::PackageNotFound)?;
        validate_selection(&package, checkin, checkout, guests, amount)?;

        let booking = self
            .bookings
            .create_pending(CreateBookingInput {
                package_id: package.id,
                user_id: Some(customer.id),
                checkin,
                checkout,
                guests,
                amount,
                currency: self.config.currency.to_ascii_uppercase(),
                metadata: Some(json!({
                    "created_from": "checkout_flow",
                    "created_at": Utc::now().to_rfc3339(),
                })),
            })
            .await?;

        let request = self.checkout_request(
            &package,
            &booking.currency,
            checkin,
            checkout,
            guests,
            amount,
            booking.id,
            customer,
        );
        let session = match gateway.create_checkout_session(&request).await {
            Ok(session) => session,
            Err(err) => {
                tracing::error!(booking_id = booking.id, error = %err, "Checkout session creation failed");
                self.cancel_pending(booking.id).await;
                return Err(err.into());
            }
        };

        let recorded = self
            .bookings
            .record_payment(CreatePaymentInput {
                booking_id: booking.id,
                stripe_session_id: Some(session.id.clone()),
                amount,
                currency: booking.currency.clone(),
                raw: Some(session.raw.clone()),
            })
            .await;
        if let Err(err) = recorded {
            tracing::error!(
                booking_id = booking.id,
                session_id = %session.id,
                error = %err,
                "Failed to record payment, checkout session left orphaned"
            );
            self.cancel_pending(booking.id).await;
            return Err(err.into());
        }

        tracing::info!(
            booking_id = booking.id,
            package_id = package.id,
            session_id = %session.id,
            amount,
            "Checkout session created"
        );

        Ok(CheckoutStarted {
            session_id: session.id,
            url: session.url,
            booking_id: booking.id,
        })
    }

    /// Payment, booking and package behind a checkout session. Visible to
    /// the customer who booked and to staff.
    pub async fn success(
        &self,
        session_id: &str,
        viewer: &User,
    ) -> Result<CheckoutSummary, CheckoutServiceError> {
        if session_id.trim().is_empty() {
            return Err(CheckoutServiceError::MissingFields);
        }

        let payment = self
            .bookings
            .payment_for_session(session_id)
            .await?
            .ok_or_else(|| CheckoutServiceError::SessionNotFound(session_id.to_string()))?;
        let booking_id = payment
            .booking_id
            .ok_or_else(|| CheckoutServiceError::SessionNotFound(session_id.to_string()))?;
        let booking = match self.bookings.get(booking_id).await {
            Ok(booking) => booking,
            Err(BookingServiceError::NotFound(_)) => {
                return Err(CheckoutServiceError::SessionNotFound(session_id.to_string()))
            }
            Err(err) => return Err(err.into()),
        };

        if !viewer.can_view_booking(booking.booking.user_id) {
            return Err(CheckoutServiceError::Forbidden);
        }

        let package = match booking.booking.package_id {
            Some(id) => self
                .package_repo
                .get_by_id(id)
                .await
                .context("Failed to load package")?,
            None => None,
        };

        let (session_status, payment_status) = match &self.gateway {
            Some(gateway) => match gateway.retrieve_checkout_session(session_id).await {
                Ok(session) => (session.status, session.payment_status),
                Err(err) => {
                    tracing::warn!(session_id = %session_id, error = %err, "Could not retrieve checkout session");
                    (None, None)
                }
            },
            None => (None, None),
        };

        Ok(CheckoutSummary {
            payment,
            booking,
            package,
            session_status,
            payment_status,
        })
    }

    async fn cancel_pending(&self, booking_id: i64) {
        if let Err(err) = self.bookings.cancel_if_pending(booking_id).await {
            tracing::error!(booking_id, error = %err, "Failed to cancel booking");
        }
    }

    fn asset_base(&self) -> &str {
        self.config
            .asset_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(&self.config.app_url)
    }

    #[allow(clippy::too_many_arguments)]
    fn checkout_request(
        &self,
        package: &Package,
        currency: &str,
        checkin: NaiveDate,
        checkout: NaiveDate,
        guests: i32,
        amount: f64,
        booking_id: i64,
        customer: &User,
    ) -> CheckoutRequest {
        let description = package
            .short_description
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("{} guests, {} - {}", guests, checkin, checkout));

        let mut metadata = BTreeMap::new();
        metadata.insert("booking_id".to_string(), booking_id.to_string());
        metadata.insert("package_id".to_string(), package.id.to_string());
        metadata.insert("user_id".to_string(), customer.id.to_string());

        let app_url = self.config.app_url.trim_end_matches('/');
        CheckoutRequest {
            currency: currency.to_ascii_lowercase(),
            line_item: LineItem {
                name: package.title.clone(),
                description: Some(description),
                image: package
                    .cover_url
                    .as_deref()
                    .and_then(|cover| absolute_image_url(self.asset_base(), cover)),
                unit_amount: to_minor_units(amount),
                quantity: 1,
            },
            customer_email: Some(customer.email.clone()),
            success_url: format!("{}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}", app_url),
            cancel_url: format!("{}/packages/{}?canceled=true", app_url, package.slug),
            metadata,
        }
    }
}

/// Hosted checkout only accepts absolute image URLs. Site-relative paths
/// are joined to `base`; anything else is left out of the line item.
fn absolute_image_url(base: &str, cover: &str) -> Option<String> {
    let cover = cover.trim();
    if cover.starts_with("https://") || cover.starts_with("http://") {
        return Some(cover.to_string());
    }
    let base = base.trim().trim_end_matches('/');
    if cover.starts_with('/') && (base.starts_with("https://") || base.starts_with("http://")) {
        return Some(format!("{}{}", base, cover));
    }
    None
}

/// Amount in cents, rounded
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

fn parse_date(value: &str, field: &str) -> Result<NaiveDate, CheckoutServiceError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        CheckoutServiceError::ValidationError(format!("Invalid {} date, expected YYYY-MM-DD", field))
    })
}

fn validate_selection(
    package: &Package,
    checkin: NaiveDate,
    checkout: NaiveDate,
    guests: i32,
    amount: f64,
) -> Result<(), CheckoutServiceError> {
    if package.booking_mode != BookingMode::Payment {
        return Err(CheckoutServiceError::ValidationError(
            "This package does not support direct payment".to_string(),
        ));
    }
    if !package.is_published() {
        return Err(CheckoutServiceError::ValidationError(
            "This package is not available".to_string(),
        ));
    }
    if checkout <= checkin {
        return Err(CheckoutServiceError::ValidationError(
            "Checkout must be after checkin".to_string(),
        ));
    }
    if !package.accepts_guests(guests) {
        return Err(CheckoutServiceError::ValidationError(format!(
            "Guests must be between {} and {}",
            package.min_guests, package.max_guests
        )));
    }
    let expected = package.quote_total(guests);
    if !amount.is_finite() || (amount - expected).abs() > AMOUNT_TOLERANCE {
        return Err(CheckoutServiceError::ValidationError(format!(
            "Amount does not match package price ({:.2})",
            expected
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        PaymentRepository, SqlxBookingRepository, SqlxPackageRepository, SqlxPaymentRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{BookingStatus, PaymentStatus, PaymentWithDetails, UserRole};
    use crate::services::gateway::checkout_form_fields;
    use crate::services::gateway::testing::MockGateway;
    use async_trait::async_trait;

    /// Payment store whose inserts always fail
    struct BrokenPayments(Arc<dyn PaymentRepository>);

    impl BrokenPayments {
        fn boxed(pool: DynDatabasePool) -> Arc<dyn PaymentRepository> {
            Arc::new(Self(SqlxPaymentRepository::boxed(pool)))
        }
    }

    #[async_trait]
    impl PaymentRepository for BrokenPayments {
        async fn create(&self, _payment: &Payment) -> anyhow::Result<Payment> {
            anyhow::bail!("database is locked")
        }

        async fn get_by_id(&self, id: i64) -> anyhow::Result<Option<Payment>> {
            self.0.get_by_id(id).await
        }

        async fn get_by_session_id(&self, session_id: &str) -> anyhow::Result<Option<Payment>> {
            self.0.get_by_session_id(session_id).await
        }

        async fn get_by_payment_intent(&self, payment_intent_id: &str) -> anyhow::Result<Option<Payment>> {
            self.0.get_by_payment_intent(payment_intent_id).await
        }

        async fn update_status(
            &self,
            id: i64,
            status: PaymentStatus,
            payment_intent_id: Option<&str>,
            raw: Option<&serde_json::Value>,
        ) -> anyhow::Result<Option<Payment>> {
            self.0.update_status(id, status, payment_intent_id, raw).await
        }

        async fn list(&self) -> anyhow::Result<Vec<PaymentWithDetails>> {
            self.0.list().await
        }

        async fn total_succeeded(&self) -> anyhow::Result<f64> {
            self.0.total_succeeded().await
        }
    }

    struct Fixture {
        service: CheckoutService,
        bookings: Arc<BookingService>,
        gateway: Arc<MockGateway>,
    }

    async fn setup_with(gateway: MockGateway, enabled: bool) -> Fixture {
        setup_with_payments(gateway, enabled, SqlxPaymentRepository::boxed).await
    }

    async fn setup_with_payments(
        gateway: MockGateway,
        enabled: bool,
        payments: fn(DynDatabasePool) -> Arc<dyn PaymentRepository>,
    ) -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool.execute(
            "INSERT INTO packages (id, title, slug, destination, price_base, min_guests, max_guests, status, booking_mode, cover_url) \
             VALUES (1, 'Cancún Todo Incluido', 'cancun', 'Quintana Roo', 4500, 2, 6, 'published', 'payment', '/uploads/packages/c.jpg')",
        )
        .await
        .unwrap();
        pool.execute(
            "INSERT INTO packages (id, title, slug, destination, price_base, min_guests, max_guests, status, booking_mode, short_description) \
             VALUES (2, 'Tulum', 'tulum', 'Quintana Roo', 3000, 1, 4, 'published', 'inquiry', 'Ruinas y playa')",
        )
        .await
        .unwrap();
        pool.execute(
            "INSERT INTO packages (id, title, slug, destination, price_base, min_guests, max_guests, status, booking_mode) \
             VALUES (3, 'Bacalar', 'bacalar', 'Quintana Roo', 2000, 1, 4, 'draft', 'payment')",
        )
        .await
        .unwrap();
        pool.execute("INSERT INTO users (id, email, password_hash, role) VALUES (7, 'ana@correo.mx', 'x', 'user')")
            .await
            .unwrap();
        pool.execute("INSERT INTO users (id, email, password_hash, role) VALUES (8, 'luis@correo.mx', 'x', 'user')")
            .await
            .unwrap();

        let bookings = Arc::new(BookingService::new(
            SqlxBookingRepository::boxed(pool.clone()),
            payments(pool.clone()),
        ));
        let gateway = Arc::new(gateway);
        let config = PaymentsConfig {
            enabled,
            secret_key: Some("sk_test".into()),
            app_url: "https://viajes.example.mx/".into(),
            ..Default::default()
        };
        let service = CheckoutService::new(SqlxPackageRepository::boxed(pool), bookings.clone(), config)
            .with_gateway(gateway.clone());
        Fixture {
            service,
            bookings,
            gateway,
        }
    }

    fn customer(id: i64, role: UserRole) -> User {
        let email = if id == 7 { "ana@correo.mx" } else { "luis@correo.mx" };
        let mut user = User::new(email.to_string(), String::new(), None, role);
        user.id = id;
        user
    }

    fn input(package_id: i64, guests: i32, amount: f64) -> CheckoutInput {
        CheckoutInput {
            package_id: Some(package_id),
            checkin: Some("2027-02-10".into()),
            checkout: Some("2027-02-14".into()),
            guests: Some(guests),
            amount: Some(amount),
        }
    }

    #[tokio::test]
    async fn test_start_creates_booking_session_and_payment() {
        let f = setup_with(MockGateway::default(), true).await;
        let started = f
            .service
            .start(input(1, 2, 9000.0), &customer(7, UserRole::User))
            .await
            .unwrap();
        assert_eq!(started.session_id, "cs_test_1");
        assert!(started.url.is_some());

        let booking = f.bookings.get(started.booking_id).await.unwrap().booking;
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.currency, "MXN");
        assert_eq!(booking.user_id, Some(7));
        assert_eq!(booking.metadata.unwrap()["created_from"], "checkout_flow");

        let payment = f.bookings.payment_for_session("cs_test_1").await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.booking_id, Some(started.booking_id));
        assert_eq!(payment.raw.unwrap()["id"], "cs_test_1");

        let request = f.gateway.last_request().unwrap();
        assert_eq!(request.currency, "mxn");
        assert_eq!(request.line_item.name, "Cancún Todo Incluido");
        assert_eq!(request.line_item.unit_amount, 900000);
        assert_eq!(
            request.line_item.description.as_deref(),
            Some("2 guests, 2027-02-10 - 2027-02-14")
        );
        assert_eq!(request.customer_email.as_deref(), Some("ana@correo.mx"));
        assert_eq!(
            request.success_url,
            "https://viajes.example.mx/checkout/success?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(request.cancel_url, "https://viajes.example.mx/packages/cancun?canceled=true");
        assert_eq!(request.metadata["booking_id"], started.booking_id.to_string());
        assert_eq!(request.metadata["user_id"], "7");
    }

    #[tokio::test]
    async fn test_start_validation() {
        let f = setup_with(MockGateway::default(), true).await;
        let user = customer(7, UserRole::User);

        let mut missing = input(1, 2, 9000.0);
        missing.amount = None;
        assert!(matches!(
            f.service.start(missing, &user).await,
            Err(CheckoutServiceError::MissingFields)
        ));
        assert!(matches!(
            f.service.start(input(99, 2, 9000.0), &user).await,
            Err(CheckoutServiceError::PackageNotFound)
        ));

        let inquiry_only = f.service.start(input(2, 2, 6000.0), &user).await;
        match inquiry_only {
            Err(CheckoutServiceError::ValidationError(msg)) => {
                assert_eq!(msg, "This package does not support direct payment")
            }
            other => panic!("unexpected: {:?}", other.map(|s| s.session_id)),
        }

        for bad in [
            input(3, 2, 4000.0),  // draft
            input(1, 1, 4500.0),  // below min guests
            input(1, 7, 31500.0), // above max guests
            input(1, 2, 8999.0),  // wrong amount
        ] {
            assert!(matches!(
                f.service.start(bad, &user).await,
                Err(CheckoutServiceError::ValidationError(_))
            ));
        }

        let mut backwards = input(1, 2, 9000.0);
        backwards.checkout = Some("2027-02-09".into());
        assert!(matches!(
            f.service.start(backwards, &user).await,
            Err(CheckoutServiceError::ValidationError(_))
        ));

        let mut garbled = input(1, 2, 9000.0);
        garbled.checkin = Some("10/02/2027".into());
        assert!(matches!(
            f.service.start(garbled, &user).await,
            Err(CheckoutServiceError::ValidationError(_))
        ));

        assert!(f.bookings.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_amount_within_one_cent_accepted() {
        let f = setup_with(MockGateway::default(), true).await;
        let started = f
            .service
            .start(input(1, 3, 13500.004), &customer(7, UserRole::User))
            .await;
        assert!(started.is_ok());
    }

    #[tokio::test]
    async fn test_gateway_failure_cancels_booking() {
        let f = setup_with(MockGateway::failing(), true).await;
        let result = f
            .service
            .start(input(1, 2, 9000.0), &customer(7, UserRole::User))
            .await;
        assert!(matches!(result, Err(CheckoutServiceError::Gateway(_))));

        let bookings = f.bookings.list().await.unwrap();
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].booking.status, BookingStatus::Cancelled);
        assert!(f.bookings.list_payments().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_payment_record_failure_cancels_booking() {
        let f = setup_with_payments(MockGateway::default(), true, BrokenPayments::boxed).await;
        let result = f
            .service
            .start(input(1, 2, 9000.0), &customer(7, UserRole::User))
            .await;
        assert!(matches!(result, Err(CheckoutServiceError::InternalError(_))));
        assert!(f.gateway.last_request().is_some());

        let bookings = f.bookings.list().await.unwrap();
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].booking.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_relative_cover_is_sent_as_absolute_url() {
        let f = setup_with(MockGateway::default(), true).await;
        f.service
            .start(input(1, 2, 9000.0), &customer(7, UserRole::User))
            .await
            .unwrap();

        let request = f.gateway.last_request().unwrap();
        let images: Vec<_> = checkout_form_fields(&request)
            .into_iter()
            .filter(|(key, _)| key.contains("[images]"))
            .collect();
        assert_eq!(
            images,
            vec![(
                "line_items[0][price_data][product_data][images][0]".to_string(),
                "https://viajes.example.mx/uploads/packages/c.jpg".to_string()
            )]
        );
    }

    #[test]
    fn test_absolute_image_url() {
        let base = "https://cdn.viajes.mx/";
        assert_eq!(
            absolute_image_url(base, "https://img.example.com/a.jpg").as_deref(),
            Some("https://img.example.com/a.jpg")
        );
        assert_eq!(
            absolute_image_url(base, "/uploads/packages/a.jpg").as_deref(),
            Some("https://cdn.viajes.mx/uploads/packages/a.jpg")
        );
        assert_eq!(absolute_image_url(base, "packages/a.jpg"), None);
        assert_eq!(absolute_image_url("", "/uploads/packages/a.jpg"), None);
        assert_eq!(absolute_image_url(base, "data:image/png;base64,AAAA"), None);
    }

    #[tokio::test]
    async fn test_disabled_payments() {
        let f = setup_with(MockGateway::default(), false).await;
        assert!(matches!(
            f.service.start(input(1, 2, 9000.0), &customer(7, UserRole::User)).await,
            Err(CheckoutServiceError::Unavailable)
        ));
    }

    #[tokio::test]
    async fn test_success_visible_to_owner_and_staff() {
        let f = setup_with(MockGateway::default(), true).await;
        let started = f
            .service
            .start(input(1, 2, 9000.0), &customer(7, UserRole::User))
            .await
            .unwrap();

        let summary = f
            .service
            .success(&started.session_id, &customer(7, UserRole::User))
            .await
            .unwrap();
        assert_eq!(summary.booking.booking.id, started.booking_id);
        assert_eq!(summary.package.unwrap().slug, "cancun");
        assert_eq!(summary.session_status.as_deref(), Some("complete"));
        assert_eq!(summary.payment_status.as_deref(), Some("paid"));

        assert!(matches!(
            f.service.success(&started.session_id, &customer(8, UserRole::User)).await,
            Err(CheckoutServiceError::Forbidden)
        ));
        assert!(f
            .service
            .success(&started.session_id, &customer(8, UserRole::Editor))
            .await
            .is_ok());
        assert!(matches!(
            f.service.success("cs_missing", &customer(7, UserRole::User)).await,
            Err(CheckoutServiceError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units(9000.0), 900000);
        assert_eq!(to_minor_units(45.5), 4550);
        assert_eq!(to_minor_units(0.1 + 0.2), 30);
    }
}
