//! Back-office dashboard figures

use crate::db::repositories::{
    BookingRepository, ChatRepository, InquiryRepository, PackageRepository, PaymentRepository,
    QuoteRepository,
};
use crate::models::QuoteStatus;
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DashboardStats {
    pub packages: i64,
    pub bookings: i64,
    pub inquiries: i64,
    pub pending_quotes: i64,
    pub chat_sessions: i64,
    /// Sum of succeeded payments
    pub revenue: f64,
}

pub struct DashboardService {
    packages: Arc<dyn PackageRepository>,
    bookings: Arc<dyn BookingRepository>,
    inquiries: Arc<dyn InquiryRepository>,
    quotes: Arc<dyn QuoteRepository>,
    chat: Arc<dyn ChatRepository>,
    payments: Arc<dyn PaymentRepository>,
}

impl DashboardService {
    pub fn new(
        packages: Arc<dyn PackageRepository>,
        bookings: Arc<dyn BookingRepository>,
        inquiries: Arc<dyn InquiryRepository>,
        quotes: Arc<dyn QuoteRepository>,
        chat: Arc<dyn ChatRepository>,
        payments: Arc<dyn PaymentRepository>,
    ) -> Self {
        Self {
            packages,
            bookings,
            inquiries,
            quotes,
            chat,
            payments,
        }
    }

    pub async fn stats(&self) -> Result<DashboardStats> {
        let (packages, bookings, inquiries, pending_quotes, chat_sessions, revenue) = tokio::try_join!(
            self.packages.count(),
            self.bookings.count(),
            self.inquiries.count(),
            self.quotes.count_by_status(QuoteStatus::Pending),
            self.chat.count_sessions(),
            self.payments.total_succeeded(),
        )
        .context("Failed to compute dashboard stats")?;

        Ok(DashboardStats {
            packages,
            bookings,
            inquiries,
            pending_quotes,
            chat_sessions,
            revenue,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxBookingRepository, SqlxChatRepository, SqlxInquiryRepository, SqlxPackageRepository,
        SqlxPaymentRepository, SqlxQuoteRepository,
    };
    use crate::db::{create_test_pool, migrations};

    #[tokio::test]
    async fn test_stats_counts_and_revenue() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        for sql in [
            "INSERT INTO packages (id, title, slug, destination) VALUES (1, 'Mérida', 'merida', 'Yucatán')",
            "INSERT INTO packages (id, title, slug, destination) VALUES (2, 'Holbox', 'holbox', 'Quintana Roo')",
            "INSERT INTO inquiries (package_id, full_name, email) VALUES (1, 'Eva', 'eva@correo.mx')",
            "INSERT INTO quotes (package_id, price_total, currency, status) VALUES (1, 100, 'MXN', 'pending')",
            "INSERT INTO quotes (package_id, price_total, currency, status) VALUES (1, 100, 'MXN', 'sent')",
            "INSERT INTO bookings (id, package_id, checkin, checkout, guests, amount, currency, status) VALUES (1, 1, '2027-01-01', '2027-01-03', 2, 500, 'MXN', 'confirmed')",
            "INSERT INTO bookings (id, package_id, checkin, checkout, guests, amount, currency, status) VALUES (2, 2, '2027-01-01', '2027-01-03', 2, 800, 'MXN', 'pending')",
            "INSERT INTO payments (booking_id, stripe_session_id, amount, currency, status) VALUES (1, 'cs_a', 500, 'MXN', 'succeeded')",
            "INSERT INTO payments (booking_id, stripe_session_id, amount, currency, status) VALUES (2, 'cs_b', 800, 'MXN', 'pending')",
            "INSERT INTO chat_sessions (id) VALUES ('chat_1_a')",
        ] {
            pool.execute(sql).await.unwrap();
        }

        let service = DashboardService::new(
            SqlxPackageRepository::boxed(pool.clone()),
            SqlxBookingRepository::boxed(pool.clone()),
            SqlxInquiryRepository::boxed(pool.clone()),
            SqlxQuoteRepository::boxed(pool.clone()),
            SqlxChatRepository::boxed(pool.clone()),
            SqlxPaymentRepository::boxed(pool),
        );

        let stats = service.stats().await.unwrap();
        assert_eq!(
            stats,
            DashboardStats {
                packages: 2,
                bookings: 2,
                inquiries: 1,
                pending_quotes: 1,
                chat_sessions: 1,
                revenue: 500.0,
            }
        );
    }
}
