//! Quote repository

use super::{decode_enum, decode_json, encode_json, InsertId};
use crate::db::DynDatabasePool;
use crate::models::{Quote, QuoteStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    async fn create(&self, quote: &Quote) -> Result<Quote>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Quote>>;

    /// Newest first
    async fn list(&self) -> Result<Vec<Quote>>;

    async fn update_status(&self, id: i64, status: QuoteStatus) -> Result<Option<Quote>>;

    async fn count_by_status(&self, status: QuoteStatus) -> Result<i64>;
}

pub struct SqlxQuoteRepository {
    pool: DynDatabasePool,
}

impl SqlxQuoteRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn QuoteRepository> {
        Arc::new(Self::new(pool))
    }
}

impl_from_row!(Quote, |row| {
    Ok(Quote {
        id: row.try_get("id")?,
        package_id: row.try_get("package_id")?,
        inquiry_id: row.try_get("inquiry_id")?,
        price_total: row.try_get("price_total")?,
        currency: row.try_get("currency")?,
        status: decode_enum(row.try_get("status")?)?,
        details: decode_json(row.try_get("details")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
});

const SELECT_QUOTE: &str = r#"
    SELECT id, package_id, inquiry_id, price_total, currency, status, details, created_at, updated_at
    FROM quotes
"#;

#[async_trait]
impl QuoteRepository for SqlxQuoteRepository {
    async fn create(&self, quote: &Quote) -> Result<Quote> {
        let now = Utc::now();
        let status = quote.status.to_string();
        let details = encode_json(quote.details.as_ref());

        let id = on_backend!(self.pool, p => sqlx::query(
            r#"
            INSERT INTO quotes (package_id, inquiry_id, price_total, currency, status, details,
                                created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(quote.package_id)
        .bind(quote.inquiry_id)
        .bind(quote.price_total)
        .bind(&quote.currency)
        .bind(&status)
        .bind(&details)
        .bind(now)
        .bind(now)
        .execute(p)
        .await
        .map(|r| r.insert_id()))
        .context("Failed to create quote")?;

        Ok(Quote {
            id,
            created_at: now,
            updated_at: now,
            ..quote.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Quote>> {
        let sql = format!("{} WHERE id = ?", SELECT_QUOTE);
        let quote = on_backend!(self.pool, p => sqlx::query_as::<_, Quote>(&sql)
            .bind(id)
            .fetch_optional(p)
            .await)
        .context("Failed to get quote")?;
        Ok(quote)
    }

    async fn list(&self) -> Result<Vec<Quote>> {
        let sql = format!("{} ORDER BY created_at DESC, id DESC", SELECT_QUOTE);
        let quotes = on_backend!(self.pool, p => sqlx::query_as::<_, Quote>(&sql)
            .fetch_all(p)
            .await)
        .context("Failed to list quotes")?;
        Ok(quotes)
    }

    async fn update_status(&self, id: i64, status: QuoteStatus) -> Result<Option<Quote>> {
        let status = status.to_string();
        let affected = on_backend!(self.pool, p => sqlx::query(
            "UPDATE quotes SET status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&status)
        .bind(Utc::now())
        .bind(id)
        .execute(p)
        .await
        .map(|r| r.rows_affected()))
        .context("Failed to update quote status")?;

        if affected == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn count_by_status(&self, status: QuoteStatus) -> Result<i64> {
        let status = status.to_string();
        let count = on_backend!(self.pool, p => sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM quotes WHERE status = ?",
        )
        .bind(&status)
        .fetch_one(p)
        .await)
        .context("Failed to count quotes")?;
        Ok(count)
    }
}
