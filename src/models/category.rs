//! Category model
//!
//! Categories are flat labels (beach, adventure, ...) attached to packages
//! through `package_tags`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: i64,
    /// URL-friendly slug
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    /// Icon name or emoji shown next to the label
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn new(
        slug: String,
        name: String,
        description: Option<String>,
        icon: Option<String>,
    ) -> Self {
        Self {
            id: 0,
            slug,
            name,
            description,
            icon,
            created_at: Utc::now(),
        }
    }
}

/// Input for creating a category
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateCategoryInput {
    pub name: String,
    /// Derived from the name when omitted
    pub slug: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
}

/// Partial category update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategoryInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<Option<String>>,
    pub icon: Option<Option<String>>,
}
