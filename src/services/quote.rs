//! Quote service
//!
//! Staff-issued price proposals. A quote created from an inquiry inherits
//! its package and, when no price is given, is priced at
//! `price_base × guests`.

use crate::db::repositories::{InquiryRepository, PackageRepository, QuoteRepository};
use crate::models::{CreateQuoteInput, Quote, QuoteStatus};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

const DEFAULT_CURRENCY: &str = "MXN";

#[derive(Debug, thiserror::Error)]
pub enum QuoteServiceError {
    #[error("Quote not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: QuoteStatus, to: QuoteStatus },

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct QuoteService {
    repo: Arc<dyn QuoteRepository>,
    inquiry_repo: Arc<dyn InquiryRepository>,
    package_repo: Arc<dyn PackageRepository>,
}

impl QuoteService {
    pub fn new(
        repo: Arc<dyn QuoteRepository>,
        inquiry_repo: Arc<dyn InquiryRepository>,
        package_repo: Arc<dyn PackageRepository>,
    ) -> Self {
        Self {
            repo,
            inquiry_repo,
            package_repo,
        }
    }

    pub async fn create(&self, input: CreateQuoteInput) -> Result<Quote, QuoteServiceError> {
        let inquiry = match input.inquiry_id {
            Some(id) => Some(
                self.inquiry_repo
                    .get_by_id(id)
                    .await
                    .context("Failed to load inquiry")?
                    .ok_or_else(|| {
                        QuoteServiceError::ValidationError(format!("Inquiry {} does not exist", id))
                    })?,
            ),
            None => None,
        };

        let package_id = input
            .package_id
            .or_else(|| inquiry.as_ref().and_then(|i| i.package_id));
        let package = match package_id {
            Some(id) => Some(
                self.package_repo
                    .get_by_id(id)
                    .await
                    .context("Failed to load package")?
                    .ok_or_else(|| {
                        QuoteServiceError::ValidationError(format!("Package {} does not exist", id))
                    })?,
            ),
            None => None,
        };

        let price_total = match (input.price_total, &package) {
            (Some(price), _) => price,
            (None, Some(package)) => {
                let guests = inquiry
                    .as_ref()
                    .and_then(|i| i.guests)
                    .unwrap_or(package.min_guests);
                package.quote_total(guests)
            }
            (None, None) => {
                return Err(QuoteServiceError::ValidationError(
                    "A price is required when the quote has no package".to_string(),
                ))
            }
        };
        if !price_total.is_finite() || price_total < 0.0 {
            return Err(QuoteServiceError::ValidationError(
                "Price cannot be negative".to_string(),
            ));
        }

        let currency = input
            .currency
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .or_else(|| package.as_ref().map(|p| p.currency.clone()))
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
            .to_ascii_uppercase();

        let now = Utc::now();
        let quote = Quote {
            id: 0,
            package_id,
            inquiry_id: input.inquiry_id,
            price_total,
            currency,
            status: QuoteStatus::Pending,
            details: input.details,
            created_at: now,
            updated_at: now,
        };

        let created = self.repo.create(&quote).await.context("Failed to create quote")?;
        tracing::info!(quote_id = created.id, total = created.price_total, "Quote created");
        Ok(created)
    }

    pub async fn get(&self, id: i64) -> Result<Quote, QuoteServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get quote")?
            .ok_or(QuoteServiceError::NotFound(id))
    }

    pub async fn list(&self) -> Result<Vec<Quote>, QuoteServiceError> {
        Ok(self.repo.list().await.context("Failed to list quotes")?)
    }

    /// Move along `pending → sent → accepted|rejected` (or `pending → rejected`)
    pub async fn update_status(&self, id: i64, status: QuoteStatus) -> Result<Quote, QuoteServiceError> {
        let current = self.get(id).await?;
        if !current.status.can_transition_to(status) {
            return Err(QuoteServiceError::InvalidTransition {
                from: current.status,
                to: status,
            });
        }

        self.repo
            .update_status(id, status)
            .await
            .context("Failed to update quote status")?
            .ok_or(QuoteServiceError::NotFound(id))
    }

    pub async fn count_pending(&self) -> Result<i64, QuoteServiceError> {
        Ok(self
            .repo
            .count_by_status(QuoteStatus::Pending)
            .await
            .context("Failed to count quotes")?)
    }
}
