//! Payment repository
//!
//! Payments are looked up by processor ids: the checkout session id when the
//! session completes or expires, the payment intent id on refunds.

use super::{decode_enum, decode_json, encode_json, InsertId};
use crate::db::DynDatabasePool;
use crate::models::{BookingStatus, Payment, PaymentStatus, PaymentWithDetails};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(&self, payment: &Payment) -> Result<Payment>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Payment>>;

    async fn get_by_session_id(&self, session_id: &str) -> Result<Option<Payment>>;

    async fn get_by_payment_intent(&self, payment_intent_id: &str) -> Result<Option<Payment>>;

    /// Set status; payment intent and raw payload are only overwritten when given
    async fn update_status(
        &self,
        id: i64,
        status: PaymentStatus,
        payment_intent_id: Option<&str>,
        raw: Option<&serde_json::Value>,
    ) -> Result<Option<Payment>>;

    /// All payments newest first, with booking, package and customer
    async fn list(&self) -> Result<Vec<PaymentWithDetails>>;

    /// Sum of `succeeded` payments
    async fn total_succeeded(&self) -> Result<f64>;
}

pub struct SqlxPaymentRepository {
    pool: DynDatabasePool,
}

impl SqlxPaymentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PaymentRepository> {
        Arc::new(Self::new(pool))
    }
}

impl_from_row!(Payment, |row| {
    Ok(Payment {
        id: row.try_get("id")?,
        booking_id: row.try_get("booking_id")?,
        stripe_payment_intent_id: row.try_get("stripe_payment_intent_id")?,
        stripe_session_id: row.try_get("stripe_session_id")?,
        amount: row.try_get("amount")?,
        currency: row.try_get("currency")?,
        status: decode_enum(row.try_get("status")?)?,
        raw: decode_json(row.try_get("raw")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
});

impl_from_row!(PaymentWithDetails, |row| {
    let booking_status: Option<String> = row.try_get("booking_status")?;
    Ok(PaymentWithDetails {
        payment: sqlx::FromRow::from_row(row)?,
        booking_status: booking_status
            .map(decode_enum::<BookingStatus>)
            .transpose()?,
        package_title: row.try_get("package_title")?,
        customer_email: row.try_get("customer_email")?,
    })
});

const PAYMENT_COLUMNS: &str = r#"
    pay.id, pay.booking_id, pay.stripe_payment_intent_id, pay.stripe_session_id, pay.amount,
    pay.currency, pay.status, pay.raw, pay.created_at, pay.updated_at
"#;

impl SqlxPaymentRepository {
    async fn find_one(&self, column: &str, value: &str) -> Result<Option<Payment>> {
        let sql = format!(
            "SELECT {} FROM payments pay WHERE pay.{} = ? ORDER BY pay.id DESC LIMIT 1",
            PAYMENT_COLUMNS, column
        );
        let payment = on_backend!(self.pool, p => sqlx::query_as::<_, Payment>(&sql)
            .bind(value)
            .fetch_optional(p)
            .await)
        .with_context(|| format!("Failed to get payment by {}", column))?;
        Ok(payment)
    }
}

#[async_trait]
impl PaymentRepository for SqlxPaymentRepository {
    async fn create(&self, payment: &Payment) -> Result<Payment> {
        let now = Utc::now();
        let status = payment.status.to_string();
        let raw = encode_json(payment.raw.as_ref());

        let id = on_backend!(self.pool, p => sqlx::query(
            r#"
            INSERT INTO payments (booking_id, stripe_payment_intent_id, stripe_session_id, amount,
                                  currency, status, raw, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(payment.booking_id)
        .bind(&payment.stripe_payment_intent_id)
        .bind(&payment.stripe_session_id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(&status)
        .bind(&raw)
        .bind(now)
        .bind(now)
        .execute(p)
        .await
        .map(|r| r.insert_id()))
        .context("Failed to create payment")?;

        Ok(Payment {
            id,
            created_at: now,
            updated_at: now,
            ..payment.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Payment>> {
        let sql = format!("SELECT {} FROM payments pay WHERE pay.id = ?", PAYMENT_COLUMNS);
        let payment = on_backend!(self.pool, p => sqlx::query_as::<_, Payment>(&sql)
            .bind(id)
            .fetch_optional(p)
            .await)
        .context("Failed to get payment")?;
        Ok(payment)
    }

    async fn get_by_session_id(&self, session_id: &str) -> Result<Option<Payment>> {
        self.find_one("stripe_session_id", session_id).await
    }

    async fn get_by_payment_intent(&self, payment_intent_id: &str) -> Result<Option<Payment>> {
        self.find_one("stripe_payment_intent_id", payment_intent_id).await
    }

    async fn update_status(
        &self,
        id: i64,
        status: PaymentStatus,
        payment_intent_id: Option<&str>,
        raw: Option<&serde_json::Value>,
    ) -> Result<Option<Payment>> {
        let status = status.to_string();
        let raw = encode_json(raw);

        let affected = on_backend!(self.pool, p => sqlx::query(
            r#"
            UPDATE payments
            SET status = ?,
                stripe_payment_intent_id = COALESCE(?, stripe_payment_intent_id),
                raw = COALESCE(?, raw),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&status)
        .bind(payment_intent_id)
        .bind(&raw)
        .bind(Utc::now())
        .bind(id)
        .execute(p)
        .await
        .map(|r| r.rows_affected()))
        .context("Failed to update payment status")?;

        if affected == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn list(&self) -> Result<Vec<PaymentWithDetails>> {
        let sql = format!(
            r#"
            SELECT {}, b.status AS booking_status, p.title AS package_title,
                   u.email AS customer_email
            FROM payments pay
            LEFT JOIN bookings b ON b.id = pay.booking_id
            LEFT JOIN packages p ON p.id = b.package_id
            LEFT JOIN users u ON u.id = b.user_id
            ORDER BY pay.created_at DESC, pay.id DESC
            "#,
            PAYMENT_COLUMNS
        );
        let payments = on_backend!(self.pool, p => sqlx::query_as::<_, PaymentWithDetails>(&sql)
            .fetch_all(p)
            .await)
        .context("Failed to list payments")?;
        Ok(payments)
    }

    async fn total_succeeded(&self) -> Result<f64> {
        let total = on_backend!(self.pool, p => sqlx::query_scalar::<_, Option<f64>>(
            "SELECT SUM(amount) FROM payments WHERE status = 'succeeded'",
        )
        .fetch_one(p)
        .await)
        .context("Failed to sum payments")?;
        Ok(total.unwrap_or(0.0))
    }
}
