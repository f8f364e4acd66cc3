//! Database repositories
//!
//! One repository per table group. Each exposes an `async_trait` interface and
//! a `Sqlx*Repository` implementation that runs the same SQL against whichever
//! driver the pool wraps.

use anyhow::Result;
use sqlx::mysql::MySqlQueryResult;
use sqlx::sqlite::SqliteQueryResult;
use std::str::FromStr;

/// Run `$body` with `$p` bound to the concrete driver pool.
///
/// The body is expanded once per driver, so it must evaluate to the same type
/// in both arms.
macro_rules! on_backend {
    ($pool:expr, $p:ident => $body:expr) => {
        match $pool.backend() {
            $crate::db::Backend::Sqlite($p) => $body,
            $crate::db::Backend::Mysql($p) => $body,
        }
    };
}

/// Implement `sqlx::FromRow` for both SQLite and MySQL rows from one body.
macro_rules! impl_from_row {
    ($ty:ty, |$row:ident| $body:block) => {
        impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for $ty {
            fn from_row($row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
                use sqlx::Row;
                $body
            }
        }

        impl<'r> sqlx::FromRow<'r, sqlx::mysql::MySqlRow> for $ty {
            fn from_row($row: &'r sqlx::mysql::MySqlRow) -> Result<Self, sqlx::Error> {
                use sqlx::Row;
                $body
            }
        }
    };
}

pub mod booking;
pub mod category;
pub mod chat;
pub mod inquiry;
pub mod package;
pub mod payment;
pub mod quote;
pub mod session;
pub mod user;

pub use booking::{BookingRepository, SqlxBookingRepository};
pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use chat::{ChatRepository, SqlxChatRepository};
pub use inquiry::{InquiryRepository, SqlxInquiryRepository};
pub use package::{PackageRepository, SqlxPackageRepository};
pub use payment::{PaymentRepository, SqlxPaymentRepository};
pub use quote::{QuoteRepository, SqlxQuoteRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// Id of the row created by an `INSERT`
pub(crate) trait InsertId {
    fn insert_id(&self) -> i64;
}

impl InsertId for SqliteQueryResult {
    fn insert_id(&self) -> i64 {
        self.last_insert_rowid()
    }
}

impl InsertId for MySqlQueryResult {
    fn insert_id(&self) -> i64 {
        self.last_insert_id() as i64
    }
}

/// Decode a lowercase status column into its enum
pub(crate) fn decode_enum<T>(value: String) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = anyhow::Error>,
{
    value.parse::<T>().map_err(|e| sqlx::Error::Decode(e.into()))
}

/// JSON columns are stored as TEXT; unparsable content reads as `None`
pub(crate) fn decode_json(value: Option<String>) -> Option<serde_json::Value> {
    value.and_then(|s| serde_json::from_str(&s).ok())
}

pub(crate) fn encode_json(value: Option<&serde_json::Value>) -> Option<String> {
    value.map(|v| v.to_string())
}
