//! Booking repository

use super::{decode_enum, decode_json, encode_json, InsertId};
use crate::db::DynDatabasePool;
use crate::models::{Booking, BookingStatus, BookingWithPackage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn create(&self, booking: &Booking) -> Result<Booking>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Booking>>;

    async fn get_with_package(&self, id: i64) -> Result<Option<BookingWithPackage>>;

    /// All bookings, newest first
    async fn list(&self) -> Result<Vec<BookingWithPackage>>;

    /// Bookings of one customer, newest first
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<BookingWithPackage>>;

    /// Set the status, and the metadata when given
    async fn update_status(
        &self,
        id: i64,
        status: BookingStatus,
        metadata: Option<&serde_json::Value>,
    ) -> Result<Option<Booking>>;

    /// Move to `to` only while the booking is still `from`. Returns whether a
    /// row changed.
    async fn transition_if(&self, id: i64, from: BookingStatus, to: BookingStatus) -> Result<bool>;

    async fn count(&self) -> Result<i64>;
}

pub struct SqlxBookingRepository {
    pool: DynDatabasePool,
}

impl SqlxBookingRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BookingRepository> {
        Arc::new(Self::new(pool))
    }
}

impl_from_row!(Booking, |row| {
    Ok(Booking {
        id: row.try_get("id")?,
        package_id: row.try_get("package_id")?,
        user_id: row.try_get("user_id")?,
        checkin: row.try_get("checkin")?,
        checkout: row.try_get("checkout")?,
        guests: row.try_get("guests")?,
        amount: row.try_get("amount")?,
        currency: row.try_get("currency")?,
        status: decode_enum(row.try_get("status")?)?,
        metadata: decode_json(row.try_get("metadata")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
});

impl_from_row!(BookingWithPackage, |row| {
    Ok(BookingWithPackage {
        booking: sqlx::FromRow::from_row(row)?,
        package_title: row.try_get("package_title")?,
        package_slug: row.try_get("package_slug")?,
        customer_email: row.try_get("customer_email")?,
    })
});

const SELECT_BOOKING: &str = r#"
    SELECT b.id, b.package_id, b.user_id, b.checkin, b.checkout, b.guests, b.amount,
           b.currency, b.status, b.metadata, b.created_at, b.updated_at
    FROM bookings b
"#;

const SELECT_BOOKING_WITH_PACKAGE: &str = r#"
    SELECT b.id, b.package_id, b.user_id, b.checkin, b.checkout, b.guests, b.amount,
           b.currency, b.status, b.metadata, b.created_at, b.updated_at,
           p.title AS package_title, p.slug AS package_slug, u.email AS customer_email
    FROM bookings b
    LEFT JOIN packages p ON p.id = b.package_id
    LEFT JOIN users u ON u.id = b.user_id
"#;

#[async_trait]
impl BookingRepository for SqlxBookingRepository {
    async fn create(&self, booking: &Booking) -> Result<Booking> {
        let now = Utc::now();
        let status = booking.status.to_string();
        let metadata = encode_json(booking.metadata.as_ref());

        let id = on_backend!(self.pool, p => sqlx::query(
            r#"
            INSERT INTO bookings (package_id, user_id, checkin, checkout, guests, amount, currency,
                                  status, metadata, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(booking.package_id)
        .bind(booking.user_id)
        .bind(booking.checkin)
        .bind(booking.checkout)
        .bind(booking.guests)
        .bind(booking.amount)
        .bind(&booking.currency)
        .bind(&status)
        .bind(&metadata)
        .bind(now)
        .bind(now)
        .execute(p)
        .await
        .map(|r| r.insert_id()))
        .context("Failed to create booking")?;

        Ok(Booking {
            id,
            created_at: now,
            updated_at: now,
            ..booking.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Booking>> {
        let sql = format!("{} WHERE b.id = ?", SELECT_BOOKING);
        let booking = on_backend!(self.pool, p => sqlx::query_as::<_, Booking>(&sql)
            .bind(id)
            .fetch_optional(p)
            .await)
        .context("Failed to get booking")?;
        Ok(booking)
    }

    async fn get_with_package(&self, id: i64) -> Result<Option<BookingWithPackage>> {
        let sql = format!("{} WHERE b.id = ?", SELECT_BOOKING_WITH_PACKAGE);
        let booking = on_backend!(self.pool, p => sqlx::query_as::<_, BookingWithPackage>(&sql)
            .bind(id)
            .fetch_optional(p)
            .await)
        .context("Failed to get booking")?;
        Ok(booking)
    }

    async fn list(&self) -> Result<Vec<BookingWithPackage>> {
        let sql = format!(
            "{} ORDER BY b.created_at DESC, b.id DESC",
            SELECT_BOOKING_WITH_PACKAGE
        );
        let bookings = on_backend!(self.pool, p => sqlx::query_as::<_, BookingWithPackage>(&sql)
            .fetch_all(p)
            .await)
        .context("Failed to list bookings")?;
        Ok(bookings)
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<BookingWithPackage>> {
        let sql = format!(
            "{} WHERE b.user_id = ? ORDER BY b.created_at DESC, b.id DESC",
            SELECT_BOOKING_WITH_PACKAGE
        );
        let bookings = on_backend!(self.pool, p => sqlx::query_as::<_, BookingWithPackage>(&sql)
            .bind(user_id)
            .fetch_all(p)
            .await)
        .context("Failed to list user bookings")?;
        Ok(bookings)
    }

    async fn update_status(
        &self,
        id: i64,
        status: BookingStatus,
        metadata: Option<&serde_json::Value>,
    ) -> Result<Option<Booking>> {
        let status = status.to_string();
        let metadata = encode_json(metadata);

        let affected = on_backend!(self.pool, p => sqlx::query(
            "UPDATE bookings SET status = ?, metadata = COALESCE(?, metadata), updated_at = ? WHERE id = ?",
        )
        .bind(&status)
        .bind(&metadata)
        .bind(Utc::now())
        .bind(id)
        .execute(p)
        .await
        .map(|r| r.rows_affected()))
        .context("Failed to update booking status")?;

        if affected == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn transition_if(&self, id: i64, from: BookingStatus, to: BookingStatus) -> Result<bool> {
        let from = from.to_string();
        let to = to.to_string();

        let affected = on_backend!(self.pool, p => sqlx::query(
            "UPDATE bookings SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(&to)
        .bind(Utc::now())
        .bind(id)
        .bind(&from)
        .execute(p)
        .await
        .map(|r| r.rows_affected()))
        .context("Failed to transition booking")?;
        Ok(affected > 0)
    }

    async fn count(&self) -> Result<i64> {
        let count = on_backend!(self.pool, p => sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bookings")
            .fetch_one(p)
            .await)
        .context("Failed to count bookings")?;
        Ok(count)
    }
}
