//! Bookings and the payments that settle them

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: i64,
    pub package_id: Option<i64>,
    pub user_id: Option<i64>,
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
    pub guests: i32,
    pub amount: f64,
    pub currency: String,
    pub status: BookingStatus,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn nights(&self) -> i64 {
        (self.checkout - self.checkin).num_days()
    }
}

/// Booking joined with package title and customer, for listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingWithPackage {
    #[serde(flatten)]
    pub booking: Booking,
    pub package_title: Option<String>,
    pub package_slug: Option<String>,
    pub customer_email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    /// `pending → confirmed|cancelled`, `confirmed → completed|cancelled`
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Completed) | (Confirmed, Cancelled)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

impl FromStr for BookingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "completed" => Ok(BookingStatus::Completed),
            _ => Err(anyhow::anyhow!("Invalid booking status: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateBookingInput {
    pub package_id: i64,
    pub user_id: Option<i64>,
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
    pub guests: i32,
    pub amount: f64,
    pub currency: String,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: i64,
    pub booking_id: Option<i64>,
    pub stripe_payment_intent_id: Option<String>,
    pub stripe_session_id: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub status: PaymentStatus,
    /// Last processor object seen for this payment
    pub raw: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payment joined with booking, package and customer for the admin list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentWithDetails {
    #[serde(flatten)]
    pub payment: Payment,
    pub booking_status: Option<BookingStatus>,
    pub package_title: Option<String>,
    pub customer_email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Succeeded,
    Failed,
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

impl FromStr for PaymentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "succeeded" => Ok(PaymentStatus::Succeeded),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            _ => Err(anyhow::anyhow!("Invalid payment status: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreatePaymentInput {
    pub booking_id: i64,
    pub stripe_session_id: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub raw: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_transitions() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(Confirmed.can_transition_to(Cancelled));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Cancelled.can_transition_to(Confirmed));
        assert!(!Completed.can_transition_to(Cancelled));
    }

    #[test]
    fn test_booking_nights() {
        let now = Utc::now();
        let booking = Booking {
            id: 1,
            package_id: Some(1),
            user_id: Some(1),
            checkin: NaiveDate::from_ymd_opt(2026, 12, 20).unwrap(),
            checkout: NaiveDate::from_ymd_opt(2026, 12, 24).unwrap(),
            guests: 2,
            amount: 100.0,
            currency: "MXN".to_string(),
            status: BookingStatus::Pending,
            metadata: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(booking.nights(), 4);
        let json = serde_json::to_value(&booking).unwrap();
        assert_eq!(json["checkin"], "2026-12-20");
    }

    #[test]
    fn test_payment_status_parse() {
        assert_eq!("SUCCEEDED".parse::<PaymentStatus>().unwrap(), PaymentStatus::Succeeded);
        assert_eq!(PaymentStatus::Refunded.to_string(), "refunded");
        assert!("paid".parse::<PaymentStatus>().is_err());
    }
}
