//! Booking service
//!
//! Bookings and their payments as seen from the back office and by the
//! customer who made them. Checkout and the payment webhook drive most
//! status changes; staff can move bookings along
//! `pending → confirmed|cancelled` and `confirmed → completed|cancelled`.

use crate::db::repositories::{BookingRepository, PaymentRepository};
use crate::models::{
    Booking, BookingStatus, BookingWithPackage, CreateBookingInput, CreatePaymentInput, Payment,
    PaymentStatus, PaymentWithDetails,
};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum BookingServiceError {
    #[error("Booking not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct BookingService {
    repo: Arc<dyn BookingRepository>,
    payment_repo: Arc<dyn PaymentRepository>,
}

impl BookingService {
    pub fn new(repo: Arc<dyn BookingRepository>, payment_repo: Arc<dyn PaymentRepository>) -> Self {
        Self { repo, payment_repo }
    }

    /// Insert a `pending` booking
    pub async fn create_pending(&self, input: CreateBookingInput) -> Result<Booking, BookingServiceError> {
        if input.checkout <= input.checkin {
            return Err(BookingServiceError::ValidationError(
                "Checkout must be after checkin".to_string(),
            ));
        }
        if input.guests < 1 {
            return Err(BookingServiceError::ValidationError(
                "Guests must be at least 1".to_string(),
            ));
        }

        let now = Utc::now();
        let booking = Booking {
            id: 0,
            package_id: Some(input.package_id),
            user_id: input.user_id,
            checkin: input.checkin,
            checkout: input.checkout,
            guests: input.guests,
            amount: input.amount,
            currency: input.currency.to_ascii_uppercase(),
            status: BookingStatus::Pending,
            metadata: input.metadata,
            created_at: now,
            updated_at: now,
        };

        Ok(self.repo.create(&booking).await.context("Failed to create booking")?)
    }

    pub async fn get(&self, id: i64) -> Result<BookingWithPackage, BookingServiceError> {
        self.repo
            .get_with_package(id)
            .await
            .context("Failed to get booking")?
            .ok_or(BookingServiceError::NotFound(id))
    }

    pub async fn list(&self) -> Result<Vec<BookingWithPackage>, BookingServiceError> {
        Ok(self.repo.list().await.context("Failed to list bookings")?)
    }

    /// Bookings made by one customer
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<BookingWithPackage>, BookingServiceError> {
        Ok(self
            .repo
            .list_by_user(user_id)
            .await
            .context("Failed to list user bookings")?)
    }

    /// Staff status change, checked against the allowed transitions
    pub async fn update_status(
        &self,
        id: i64,
        status: BookingStatus,
    ) -> Result<Booking, BookingServiceError> {
        let current = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get booking")?
            .ok_or(BookingServiceError::NotFound(id))?;

        if !current.status.can_transition_to(status) {
            return Err(BookingServiceError::InvalidTransition {
                from: current.status,
                to: status,
            });
        }

        let updated = self
            .repo
            .update_status(id, status, None)
            .await
            .context("Failed to update booking status")?
            .ok_or(BookingServiceError::NotFound(id))?;

        tracing::info!(booking_id = id, from = %current.status, to = %status, "Booking status changed");
        Ok(updated)
    }

    /// Cancel a booking that is still `pending`; returns whether it changed
    pub async fn cancel_if_pending(&self, id: i64) -> Result<bool, BookingServiceError> {
        Ok(self
            .repo
            .transition_if(id, BookingStatus::Pending, BookingStatus::Cancelled)
            .await
            .context("Failed to cancel booking")?)
    }

    pub async fn count(&self) -> Result<i64, BookingServiceError> {
        Ok(self.repo.count().await.context("Failed to count bookings")?)
    }

    // ------------------------------------------------------------------
    // Payments
    // ------------------------------------------------------------------

    /// Record a `pending` payment for a checkout session
    pub async fn record_payment(&self, input: CreatePaymentInput) -> Result<Payment, BookingServiceError> {
        let now = Utc::now();
        let payment = Payment {
            id: 0,
            booking_id: Some(input.booking_id),
            stripe_payment_intent_id: None,
            stripe_session_id: input.stripe_session_id,
            amount: input.amount,
            currency: input.currency.to_ascii_uppercase(),
            status: PaymentStatus::Pending,
            raw: input.raw,
            created_at: now,
            updated_at: now,
        };
        Ok(self
            .payment_repo
            .create(&payment)
            .await
            .context("Failed to record payment")?)
    }

    pub async fn payment_for_session(&self, session_id: &str) -> Result<Option<Payment>, BookingServiceError> {
        Ok(self
            .payment_repo
            .get_by_session_id(session_id)
            .await
            .context("Failed to get payment")?)
    }

    pub async fn list_payments(&self) -> Result<Vec<PaymentWithDetails>, BookingServiceError> {
        Ok(self.payment_repo.list().await.context("Failed to list payments")?)
    }

    /// Sum of succeeded payments
    pub async fn revenue(&self) -> Result<f64, BookingServiceError> {
        Ok(self
            .payment_repo
            .total_succeeded()
            .await
            .context("Failed to sum revenue")?)
    }
}
