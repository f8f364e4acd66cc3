//! Inquiry service
//!
//! Lead capture from the public contact form and the chat widget.

use crate::db::repositories::{InquiryRepository, PackageRepository};
use crate::models::{CreateInquiryInput, Inquiry, InquiryWithPackage};
use crate::services::user::is_valid_email;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

const MAX_NOTES_LENGTH: usize = 5000;

#[derive(Debug, thiserror::Error)]
pub enum InquiryServiceError {
    #[error("Inquiry not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct InquiryService {
    repo: Arc<dyn InquiryRepository>,
    package_repo: Arc<dyn PackageRepository>,
}

impl InquiryService {
    pub fn new(repo: Arc<dyn InquiryRepository>, package_repo: Arc<dyn PackageRepository>) -> Self {
        Self { repo, package_repo }
    }

    /// Record a new inquiry. The source defaults to `website`.
    pub async fn submit(&self, input: CreateInquiryInput) -> Result<Inquiry, InquiryServiceError> {
        let full_name = input.full_name.trim().to_string();
        let email = input.email.trim().to_lowercase();

        if full_name.is_empty() || email.is_empty() {
            return Err(InquiryServiceError::ValidationError(
                "Full name and email are required".to_string(),
            ));
        }
        if !is_valid_email(&email) {
            return Err(InquiryServiceError::ValidationError(
                "Invalid email format".to_string(),
            ));
        }
        if matches!(input.guests, Some(g) if g < 1) {
            return Err(InquiryServiceError::ValidationError(
                "Guests must be at least 1".to_string(),
            ));
        }
        if matches!(input.budget, Some(b) if !b.is_finite() || b < 0.0) {
            return Err(InquiryServiceError::ValidationError(
                "Budget cannot be negative".to_string(),
            ));
        }
        let notes = clean(input.notes);
        if notes.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTES_LENGTH) {
            return Err(InquiryServiceError::ValidationError(format!(
                "Notes cannot exceed {} characters",
                MAX_NOTES_LENGTH
            )));
        }

        if let Some(package_id) = input.package_id {
            let exists = self
                .package_repo
                .get_by_id(package_id)
                .await
                .context("Failed to check package")?
                .is_some();
            if !exists {
                return Err(InquiryServiceError::ValidationError(format!(
                    "Package {} does not exist",
                    package_id
                )));
            }
        }

        let inquiry = Inquiry {
            id: 0,
            package_id: input.package_id,
            full_name,
            email,
            phone: clean(input.phone),
            dates: clean(input.dates),
            guests: input.guests,
            budget: input.budget,
            notes,
            source: input.source.unwrap_or_default(),
            created_at: Utc::now(),
        };

        let created = self
            .repo
            .create(&inquiry)
            .await
            .context("Failed to create inquiry")?;

        tracing::info!(inquiry_id = created.id, source = %created.source, "Inquiry received");
        Ok(created)
    }

    pub async fn get(&self, id: i64) -> Result<Inquiry, InquiryServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get inquiry")?
            .ok_or(InquiryServiceError::NotFound(id))
    }

    /// Newest first with the package title
    pub async fn list(&self) -> Result<Vec<InquiryWithPackage>, InquiryServiceError> {
        Ok(self.repo.list().await.context("Failed to list inquiries")?)
    }

    pub async fn count(&self) -> Result<i64, InquiryServiceError> {
        Ok(self.repo.count().await.context("Failed to count inquiries")?)
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
