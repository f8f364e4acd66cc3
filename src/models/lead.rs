//! Pre-sale leads: inquiries from customers and quotes issued by staff

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Inquiry {
    pub id: i64,
    pub package_id: Option<i64>,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    /// Free-form travel dates as typed by the customer
    pub dates: Option<String>,
    pub guests: Option<i32>,
    pub budget: Option<f64>,
    pub notes: Option<String>,
    pub source: InquirySource,
    pub created_at: DateTime<Utc>,
}

/// Inquiry joined with its package title, for the admin list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InquiryWithPackage {
    #[serde(flatten)]
    pub inquiry: Inquiry,
    pub package_title: Option<String>,
}

/// Channel an inquiry arrived through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InquirySource {
    #[default]
    Website,
    Chat,
    Email,
    Phone,
    Other,
}

impl fmt::Display for InquirySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InquirySource::Website => "website",
            InquirySource::Chat => "chat",
            InquirySource::Email => "email",
            InquirySource::Phone => "phone",
            InquirySource::Other => "other",
        };
        f.write_str(s)
    }
}

impl FromStr for InquirySource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "website" => Ok(InquirySource::Website),
            "chat" => Ok(InquirySource::Chat),
            "email" => Ok(InquirySource::Email),
            "phone" => Ok(InquirySource::Phone),
            "other" => Ok(InquirySource::Other),
            _ => Err(anyhow::anyhow!("Invalid inquiry source: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateInquiryInput {
    pub package_id: Option<i64>,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub dates: Option<String>,
    pub guests: Option<i32>,
    pub budget: Option<f64>,
    pub notes: Option<String>,
    pub source: Option<InquirySource>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    pub id: i64,
    pub package_id: Option<i64>,
    pub inquiry_id: Option<i64>,
    pub price_total: f64,
    pub currency: String,
    pub status: QuoteStatus,
    /// Itinerary notes, inclusions and such
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    #[default]
    Pending,
    Sent,
    Accepted,
    Rejected,
}

impl QuoteStatus {
    /// `pending → sent → accepted|rejected`, and `pending → rejected`
    pub fn can_transition_to(self, next: QuoteStatus) -> bool {
        use QuoteStatus::*;
        matches!(
            (self, next),
            (Pending, Sent) | (Pending, Rejected) | (Sent, Accepted) | (Sent, Rejected)
        )
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuoteStatus::Pending => "pending",
            QuoteStatus::Sent => "sent",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

impl FromStr for QuoteStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(QuoteStatus::Pending),
            "sent" => Ok(QuoteStatus::Sent),
            "accepted" => Ok(QuoteStatus::Accepted),
            "rejected" => Ok(QuoteStatus::Rejected),
            _ => Err(anyhow::anyhow!("Invalid quote status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateQuoteInput {
    pub package_id: Option<i64>,
    pub inquiry_id: Option<i64>,
    /// Defaults to the package price times the inquiry's guests
    pub price_total: Option<f64>,
    pub currency: Option<String>,
    pub details: Option<serde_json::Value>,
}
