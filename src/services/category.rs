//! Category service
//!
//! Flat package categories:
//! - public list ordered by name (cached)
//! - create/update/delete from the back office
//! - name and slug uniqueness
//! - slug generation from the name

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::CategoryRepository;
use crate::models::{Category, CreateCategoryInput, UpdateCategoryInput};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

/// Default cache TTL for categories (1 hour)
const CATEGORY_CACHE_TTL_SECS: u64 = 3600;

const CACHE_KEY_CATEGORY_LIST: &str = "categories:all";
/// Package payloads embed their categories
const CACHE_PATTERN_PACKAGES: &str = "packages:*";

/// Error types for category service operations
#[derive(Debug, thiserror::Error)]
pub enum CategoryServiceError {
    #[error("Category name already exists: {0}")]
    DuplicateName(String),

    #[error("Category slug already exists: {0}")]
    DuplicateSlug(String),

    #[error("Category not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
    cache: Arc<Cache>,
    cache_ttl: Duration,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>, cache: Arc<Cache>) -> Self {
        Self::with_cache_ttl(repo, cache, Duration::from_secs(CATEGORY_CACHE_TTL_SECS))
    }

    pub fn with_cache_ttl(
        repo: Arc<dyn CategoryRepository>,
        cache: Arc<Cache>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            repo,
            cache,
            cache_ttl,
        }
    }

    /// All categories ordered by name
    pub async fn list(&self) -> Result<Vec<Category>, CategoryServiceError> {
        if let Ok(Some(cached)) = self.cache.get::<Vec<Category>>(CACHE_KEY_CATEGORY_LIST).await {
            return Ok(cached);
        }

        let categories = self.repo.list().await.context("Failed to list categories")?;
        let _ = self
            .cache
            .set(CACHE_KEY_CATEGORY_LIST, &categories, self.cache_ttl)
            .await;
        Ok(categories)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Category, CategoryServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get category")?
            .ok_or_else(|| CategoryServiceError::NotFound(id.to_string()))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Category, CategoryServiceError> {
        self.repo
            .get_by_slug(slug)
            .await
            .context("Failed to get category by slug")?
            .ok_or_else(|| CategoryServiceError::NotFound(slug.to_string()))
    }

    /// Create a category. The slug is derived from the name when omitted.
    pub async fn create(&self, input: CreateCategoryInput) -> Result<Category, CategoryServiceError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(CategoryServiceError::ValidationError(
                "Category name cannot be empty".to_string(),
            ));
        }

        let slug = resolve_slug(input.slug.as_deref(), &name)?;
        self.ensure_unique(&name, &slug, None).await?;

        let category = Category::new(slug, name, clean(input.description), clean(input.icon));
        let created = self
            .repo
            .create(&category)
            .await
            .context("Failed to create category")?;

        self.invalidate_cache().await;
        Ok(created)
    }

    pub async fn update(
        &self,
        id: i64,
        input: UpdateCategoryInput,
    ) -> Result<Category, CategoryServiceError> {
        let mut category = self.get_by_id(id).await?;

        if let Some(name) = input.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(CategoryServiceError::ValidationError(
                    "Category name cannot be empty".to_string(),
                ));
            }
            category.name = name;
        }
        if let Some(slug) = input.slug {
            category.slug = resolve_slug(Some(&slug), &category.name)?;
        }
        if let Some(description) = input.description {
            category.description = clean(description);
        }
        if let Some(icon) = input.icon {
            category.icon = clean(icon);
        }

        self.ensure_unique(&category.name, &category.slug, Some(id)).await?;

        let updated = self
            .repo
            .update(&category)
            .await
            .context("Failed to update category")?;

        self.invalidate_cache().await;
        Ok(updated)
    }

    /// Delete a category; its package tags go with it
    pub async fn delete(&self, id: i64) -> Result<(), CategoryServiceError> {
        let deleted = self.repo.delete(id).await.context("Failed to delete category")?;
        if !deleted {
            return Err(CategoryServiceError::NotFound(id.to_string()));
        }
        self.invalidate_cache().await;
        Ok(())
    }

    async fn ensure_unique(
        &self,
        name: &str,
        slug: &str,
        exclude_id: Option<i64>,
    ) -> Result<(), CategoryServiceError> {
        let other = |c: &Category| Some(c.id) != exclude_id;

        if let Some(existing) = self
            .repo
            .get_by_name(name)
            .await
            .context("Failed to check name uniqueness")?
        {
            if other(&existing) {
                return Err(CategoryServiceError::DuplicateName(name.to_string()));
            }
        }
        if let Some(existing) = self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to check slug uniqueness")?
        {
            if other(&existing) {
                return Err(CategoryServiceError::DuplicateSlug(slug.to_string()));
            }
        }
        Ok(())
    }

    async fn invalidate_cache(&self) {
        let _ = self.cache.delete(CACHE_KEY_CATEGORY_LIST).await;
        let _ = self.cache.delete_pattern(CACHE_PATTERN_PACKAGES).await;
    }
}

fn resolve_slug(given: Option<&str>, name: &str) -> Result<String, CategoryServiceError> {
    let slug = match given.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => generate_slug(s),
        None => generate_slug(name),
    };
    if slug.is_empty() {
        return Err(CategoryServiceError::ValidationError(
            "Could not derive a slug; provide one explicitly".to_string(),
        ));
    }
    Ok(slug)
}

fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Generate a URL-friendly slug.
///
/// Lowercases, folds Spanish/Latin accents to ASCII (`Cancún` → `cancun`,
/// `Peñasco` → `penasco`), turns every other non-alphanumeric run into a
/// single hyphen and trims hyphens at both ends.
pub fn generate_slug(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_hyphen = true;

    for c in text.chars().flat_map(char::to_lowercase) {
        let folded = fold_accent(c);
        if folded.is_ascii_alphanumeric() {
            result.push(folded);
            prev_hyphen = false;
        } else if !prev_hyphen {
            result.push('-');
            prev_hyphen = true;
        }
    }

    result.trim_end_matches('-').to_string()
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' | 'å' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}
