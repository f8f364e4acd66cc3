//! Trip package model
//!
//! A package is a sellable trip: destination, nightly duration, base price per
//! guest, a guest range and a booking mode deciding how customers buy it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::Category;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Package {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub destination: String,
    pub short_description: Option<String>,
    pub long_description: Option<String>,
    /// Price per guest
    pub price_base: f64,
    /// ISO 4217, upper case
    pub currency: String,
    pub duration_nights: i32,
    pub min_guests: i32,
    pub max_guests: i32,
    pub cover_url: Option<String>,
    pub status: PackageStatus,
    pub booking_mode: BookingMode,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Package {
    /// Total price for a party of `guests`
    pub fn quote_total(&self, guests: i32) -> f64 {
        self.price_base * f64::from(guests)
    }

    pub fn accepts_guests(&self, guests: i32) -> bool {
        guests >= self.min_guests && guests <= self.max_guests
    }

    pub fn is_published(&self) -> bool {
        self.status == PackageStatus::Published
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PackageStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageStatus::Draft => write!(f, "draft"),
            PackageStatus::Published => write!(f, "published"),
            PackageStatus::Archived => write!(f, "archived"),
        }
    }
}

impl FromStr for PackageStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(PackageStatus::Draft),
            "published" => Ok(PackageStatus::Published),
            "archived" => Ok(PackageStatus::Archived),
            _ => Err(anyhow::anyhow!("Invalid package status: {}", s)),
        }
    }
}

/// How a customer can buy a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookingMode {
    /// Contact form only
    #[default]
    Inquiry,
    /// Staff prepares a quote
    Quote,
    /// Direct checkout
    Payment,
}

impl fmt::Display for BookingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingMode::Inquiry => write!(f, "inquiry"),
            BookingMode::Quote => write!(f, "quote"),
            BookingMode::Payment => write!(f, "payment"),
        }
    }
}

impl FromStr for BookingMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inquiry" => Ok(BookingMode::Inquiry),
            "quote" => Ok(BookingMode::Quote),
            "payment" => Ok(BookingMode::Payment),
            _ => Err(anyhow::anyhow!("Invalid booking mode: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageImage {
    pub id: i64,
    pub package_id: i64,
    pub image_url: String,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

/// Package with its gallery and categories, as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageWithDetails {
    #[serde(flatten)]
    pub package: Package,
    pub images: Vec<PackageImage>,
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreatePackageInput {
    pub title: String,
    /// Derived from the title when omitted
    pub slug: Option<String>,
    pub destination: String,
    pub short_description: Option<String>,
    pub long_description: Option<String>,
    pub price_base: f64,
    pub currency: Option<String>,
    pub duration_nights: i32,
    #[serde(default = "default_guests")]
    pub min_guests: i32,
    #[serde(default = "default_guests")]
    pub max_guests: i32,
    pub cover_url: Option<String>,
    pub status: PackageStatus,
    pub booking_mode: BookingMode,
    pub created_by: Option<i64>,
    pub category_ids: Vec<i64>,
    pub image_urls: Vec<String>,
}

fn default_guests() -> i32 {
    1
}

impl CreatePackageInput {
    pub fn new(title: impl Into<String>, destination: impl Into<String>, price_base: f64) -> Self {
        Self {
            title: title.into(),
            destination: destination.into(),
            price_base,
            min_guests: 1,
            max_guests: 1,
            ..Default::default()
        }
    }
}

/// Partial package update. `category_ids` and `image_urls`, when present,
/// replace the existing sets.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePackageInput {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub destination: Option<String>,
    pub short_description: Option<String>,
    pub long_description: Option<String>,
    pub price_base: Option<f64>,
    pub currency: Option<String>,
    pub duration_nights: Option<i32>,
    pub min_guests: Option<i32>,
    pub max_guests: Option<i32>,
    pub cover_url: Option<String>,
    pub status: Option<PackageStatus>,
    pub booking_mode: Option<BookingMode>,
    pub category_ids: Option<Vec<i64>>,
    pub image_urls: Option<Vec<String>>,
}

/// Inclusive price band parsed from `"min-max"` or `"min-+"`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetRange {
    pub min: f64,
    pub max: Option<f64>,
}

impl BudgetRange {
    /// Parse a budget filter. Malformed input yields `None`.
    pub fn parse(input: &str) -> Option<Self> {
        let (min, max) = input.trim().split_once('-')?;
        let min: f64 = min.trim().parse().ok()?;
        if !min.is_finite() || min < 0.0 {
            return None;
        }
        let max = match max.trim() {
            "+" | "" => None,
            value => {
                let max: f64 = value.parse().ok()?;
                if !max.is_finite() || max < min {
                    return None;
                }
                Some(max)
            }
        };
        Some(Self { min, max })
    }
}

/// Filters for the public package listing
#[derive(Debug, Clone, Default)]
pub struct PackageFilter {
    pub budget: Option<BudgetRange>,
    /// Party size the package must accept (`min_guests <= guests`)
    pub guests: Option<i32>,
    /// Category slug
    pub category: Option<String>,
    /// Case-insensitive substring of the destination
    pub destination: Option<String>,
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn package(price_base: f64, min: i32, max: i32) -> Package {
        let now = Utc::now();
        Package {
            id: 1,
            title: "Cancún todo incluido".to_string(),
            slug: "cancun-todo-incluido".to_string(),
            destination: "Cancún".to_string(),
            short_description: None,
            long_description: None,
            price_base,
            currency: "MXN".to_string(),
            duration_nights: 4,
            min_guests: min,
            max_guests: max,
            cover_url: None,
            status: PackageStatus::Published,
            booking_mode: BookingMode::Payment,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_quote_total() {
        assert_eq!(package(1500.0, 1, 6).quote_total(3), 4500.0);
        assert_eq!(package(0.0, 1, 6).quote_total(3), 0.0);
    }

    #[test]
    fn test_accepts_guests() {
        let p = package(100.0, 2, 4);
        assert!(!p.accepts_guests(1));
        assert!(p.accepts_guests(2));
        assert!(p.accepts_guests(4));
        assert!(!p.accepts_guests(5));
    }

    #[test]
    fn test_status_and_mode_parse() {
        assert_eq!("Published".parse::<PackageStatus>().unwrap(), PackageStatus::Published);
        assert_eq!("PAYMENT".parse::<BookingMode>().unwrap(), BookingMode::Payment);
        assert!("live".parse::<PackageStatus>().is_err());
        assert_eq!(BookingMode::Quote.to_string(), "quote");
        assert_eq!(PackageStatus::default(), PackageStatus::Draft);
    }

    #[test]
    fn test_details_flatten() {
        let details = PackageWithDetails {
            package: package(10.0, 1, 2),
            images: vec![],
            categories: vec![],
        };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["slug"], "cancun-todo-incluido");
        assert_eq!(json["booking_mode"], "payment");
        assert!(json["images"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_budget_parse() {
        assert_eq!(
            BudgetRange::parse("1000-5000"),
            Some(BudgetRange { min: 1000.0, max: Some(5000.0) })
        );
        assert_eq!(
            BudgetRange::parse("20000-+"),
            Some(BudgetRange { min: 20000.0, max: None })
        );
        assert_eq!(BudgetRange::parse("abc"), None);
        assert_eq!(BudgetRange::parse("5000-1000"), None);
        assert_eq!(BudgetRange::parse("-"), None);
        assert_eq!(BudgetRange::parse(""), None);
    }

    #[test]
    fn test_budget_open_ended() {
        assert_eq!(
            BudgetRange::parse("100-+"),
            Some(BudgetRange { min: 100.0, max: None })
        );
    }

    proptest! {
        #[test]
        fn prop_budget_range_keeps_its_bounds(min in 0u32..100_000, span in 0u32..100_000) {
            let max = min + span;
            let band = BudgetRange::parse(&format!("{}-{}", min, max)).unwrap();
            prop_assert_eq!(band.min, min as f64);
            prop_assert_eq!(band.max, Some(max as f64));
        }

        #[test]
        fn prop_budget_parse_never_panics(input in ".{0,20}") {
            let _ = BudgetRange::parse(&input);
        }
    }
}
