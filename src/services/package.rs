//! Package service
//!
//! The trip catalog:
//! - public listing (published only, filterable, cached) and detail by slug
//! - back-office CRUD with gallery and category replacement
//! - slug derivation and uniqueness
//! - cleanup of stored image files when a gallery shrinks or a package goes

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{CategoryRepository, PackageRepository};
use crate::models::{
    CreatePackageInput, Package, PackageFilter, PackageStatus, PackageWithDetails,
    UpdatePackageInput,
};
use crate::services::category::generate_slug;
use crate::services::storage::Storage;
use anyhow::Context;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Default cache TTL for public package reads (5 minutes)
const PACKAGE_CACHE_TTL_SECS: u64 = 300;

const CACHE_KEY_PACKAGE_LIST: &str = "packages:list:";
const CACHE_KEY_PACKAGE_BY_SLUG: &str = "packages:slug:";
const CACHE_PATTERN_PACKAGES: &str = "packages:*";

const DEFAULT_CURRENCY: &str = "MXN";

#[derive(Debug, thiserror::Error)]
pub enum PackageServiceError {
    #[error("Package not found: {0}")]
    NotFound(String),

    #[error("Package slug already exists: {0}")]
    DuplicateSlug(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct PackageService {
    repo: Arc<dyn PackageRepository>,
    category_repo: Arc<dyn CategoryRepository>,
    cache: Arc<Cache>,
    storage: Option<Arc<Storage>>,
    cache_ttl: Duration,
}

impl PackageService {
    pub fn new(
        repo: Arc<dyn PackageRepository>,
        category_repo: Arc<dyn CategoryRepository>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            repo,
            category_repo,
            cache,
            storage: None,
            cache_ttl: Duration::from_secs(PACKAGE_CACHE_TTL_SECS),
        }
    }

    /// Delete stored files of removed images through `storage`
    pub fn with_storage(mut self, storage: Arc<Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    // ------------------------------------------------------------------
    // Public reads
    // ------------------------------------------------------------------

    /// Published packages matching `filter`, newest first
    pub async fn list_published(
        &self,
        filter: &PackageFilter,
    ) -> Result<Vec<PackageWithDetails>, PackageServiceError> {
        let cache_key = format!("{}{:?}", CACHE_KEY_PACKAGE_LIST, filter);
        if let Ok(Some(cached)) = self.cache.get::<Vec<PackageWithDetails>>(&cache_key).await {
            return Ok(cached);
        }

        let packages = self
            .repo
            .list(filter, Some(PackageStatus::Published))
            .await
            .context("Failed to list packages")?;
        let details = self.attach_details(packages).await?;

        let _ = self.cache.set(&cache_key, &details, self.cache_ttl).await;
        Ok(details)
    }

    /// Published package by slug. Drafts and archived packages are hidden.
    pub async fn get_published_by_slug(
        &self,
        slug: &str,
    ) -> Result<PackageWithDetails, PackageServiceError> {
        let cache_key = format!("{}{}", CACHE_KEY_PACKAGE_BY_SLUG, slug);
        if let Ok(Some(cached)) = self.cache.get::<PackageWithDetails>(&cache_key).await {
            return Ok(cached);
        }

        let package = self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to get package by slug")?
            .filter(Package::is_published)
            .ok_or_else(|| PackageServiceError::NotFound(slug.to_string()))?;
        let details = self.details_for(package).await?;

        let _ = self.cache.set(&cache_key, &details, self.cache_ttl).await;
        Ok(details)
    }

    // ------------------------------------------------------------------
    // Back office
    // ------------------------------------------------------------------

    /// Every package regardless of status, newest first
    pub async fn list_all(&self) -> Result<Vec<PackageWithDetails>, PackageServiceError> {
        let packages = self
            .repo
            .list(&PackageFilter::default(), None)
            .await
            .context("Failed to list packages")?;
        self.attach_details(packages).await
    }

    /// Bare package row, any status
    pub async fn get_package(&self, id: i64) -> Result<Package, PackageServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get package")?
            .ok_or_else(|| PackageServiceError::NotFound(id.to_string()))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<PackageWithDetails, PackageServiceError> {
        let package = self.get_package(id).await?;
        self.details_for(package).await
    }

    pub async fn count(&self) -> Result<i64, PackageServiceError> {
        Ok(self.repo.count().await.context("Failed to count packages")?)
    }

    pub async fn create(
        &self,
        input: CreatePackageInput,
    ) -> Result<PackageWithDetails, PackageServiceError> {
        let slug = resolve_slug(input.slug.as_deref(), &input.title)?;
        let now = Utc::now();
        let package = Package {
            id: 0,
            title: input.title.trim().to_string(),
            slug,
            destination: input.destination.trim().to_string(),
            short_description: clean(input.short_description),
            long_description: clean(input.long_description),
            price_base: input.price_base,
            currency: normalize_currency(input.currency.as_deref()),
            duration_nights: input.duration_nights,
            min_guests: input.min_guests,
            max_guests: input.max_guests,
            cover_url: clean(input.cover_url),
            status: input.status,
            booking_mode: input.booking_mode,
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
        };
        validate_package(&package)?;
        self.ensure_slug_free(&package.slug, None).await?;
        self.ensure_categories_exist(&input.category_ids).await?;

        let created = self
            .repo
            .create(&package)
            .await
            .context("Failed to create package")?;

        if !input.category_ids.is_empty() {
            self.repo
                .replace_tags(created.id, &input.category_ids)
                .await
                .context("Failed to tag package")?;
        }
        let image_urls = clean_urls(input.image_urls);
        if !image_urls.is_empty() {
            self.repo
                .replace_images(created.id, &image_urls)
                .await
                .context("Failed to attach package images")?;
        }

        self.invalidate_cache().await;
        tracing::info!(package_id = created.id, slug = %created.slug, "Package created");
        self.details_for(created).await
    }

    /// Partial update. `category_ids` and `image_urls`, when present,
    /// replace the whole tag set or gallery.
    pub async fn update(
        &self,
        id: i64,
        input: UpdatePackageInput,
    ) -> Result<PackageWithDetails, PackageServiceError> {
        let mut package = self.get_package(id).await?;

        if let Some(title) = input.title {
            package.title = title.trim().to_string();
        }
        if let Some(slug) = input.slug {
            package.slug = resolve_slug(Some(&slug), &package.title)?;
        }
        if let Some(destination) = input.destination {
            package.destination = destination.trim().to_string();
        }
        if let Some(short) = input.short_description {
            package.short_description = clean(Some(short));
        }
        if let Some(long) = input.long_description {
            package.long_description = clean(Some(long));
        }
        if let Some(price) = input.price_base {
            package.price_base = price;
        }
        if let Some(currency) = input.currency {
            package.currency = normalize_currency(Some(&currency));
        }
        if let Some(nights) = input.duration_nights {
            package.duration_nights = nights;
        }
        if let Some(min) = input.min_guests {
            package.min_guests = min;
        }
        if let Some(max) = input.max_guests {
            package.max_guests = max;
        }
        if let Some(cover) = input.cover_url {
            package.cover_url = clean(Some(cover));
        }
        if let Some(status) = input.status {
            package.status = status;
        }
        if let Some(mode) = input.booking_mode {
            package.booking_mode = mode;
        }

        validate_package(&package)?;
        self.ensure_slug_free(&package.slug, Some(id)).await?;
        if let Some(ids) = &input.category_ids {
            self.ensure_categories_exist(ids).await?;
        }

        let updated = self
            .repo
            .update(&package)
            .await
            .context("Failed to update package")?;

        if let Some(ids) = &input.category_ids {
            self.repo
                .replace_tags(id, ids)
                .await
                .context("Failed to replace package tags")?;
        }

        if let Some(urls) = input.image_urls {
            let urls = clean_urls(urls);
            let previous = self
                .repo
                .images(id)
                .await
                .context("Failed to load package images")?;
            self.repo
                .replace_images(id, &urls)
                .await
                .context("Failed to replace package images")?;

            let kept: HashSet<&str> = urls.iter().map(String::as_str).collect();
            let removed: Vec<String> = previous
                .into_iter()
                .map(|img| img.image_url)
                .filter(|url| !kept.contains(url.as_str()))
                .collect();
            self.delete_files(&removed).await;
        }

        self.invalidate_cache().await;
        self.details_for(updated).await
    }

    /// Delete a package with its gallery, tags and stored files
    pub async fn delete(&self, id: i64) -> Result<(), PackageServiceError> {
        let package = self.get_package(id).await?;
        let images = self
            .repo
            .images(id)
            .await
            .context("Failed to load package images")?;

        let deleted = self.repo.delete(id).await.context("Failed to delete package")?;
        if !deleted {
            return Err(PackageServiceError::NotFound(id.to_string()));
        }

        let mut files: Vec<String> = images.into_iter().map(|img| img.image_url).collect();
        if let Some(cover) = package.cover_url {
            if !files.contains(&cover) {
                files.push(cover);
            }
        }
        self.delete_files(&files).await;

        self.invalidate_cache().await;
        tracing::info!(package_id = id, "Package deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn details_for(&self, package: Package) -> Result<PackageWithDetails, PackageServiceError> {
        let mut details = self.attach_details(vec![package]).await?;
        details
            .pop()
            .ok_or_else(|| PackageServiceError::InternalError(anyhow::anyhow!("Package vanished")))
    }

    /// Load galleries and categories for a page of packages in two queries
    async fn attach_details(
        &self,
        packages: Vec<Package>,
    ) -> Result<Vec<PackageWithDetails>, PackageServiceError> {
        let ids: Vec<i64> = packages.iter().map(|p| p.id).collect();

        let mut images: HashMap<i64, Vec<_>> = HashMap::new();
        for image in self
            .repo
            .images_for(&ids)
            .await
            .context("Failed to load package images")?
        {
            images.entry(image.package_id).or_default().push(image);
        }

        let mut categories: HashMap<i64, Vec<_>> = HashMap::new();
        for (package_id, category) in self
            .repo
            .categories_for(&ids)
            .await
            .context("Failed to load package categories")?
        {
            categories.entry(package_id).or_default().push(category);
        }

        Ok(packages
            .into_iter()
            .map(|package| PackageWithDetails {
                images: images.remove(&package.id).unwrap_or_default(),
                categories: categories.remove(&package.id).unwrap_or_default(),
                package,
            })
            .collect())
    }

    async fn ensure_slug_free(
        &self,
        slug: &str,
        exclude_id: Option<i64>,
    ) -> Result<(), PackageServiceError> {
        if self
            .repo
            .exists_by_slug(slug, exclude_id)
            .await
            .context("Failed to check slug uniqueness")?
        {
            return Err(PackageServiceError::DuplicateSlug(slug.to_string()));
        }
        Ok(())
    }

    async fn ensure_categories_exist(&self, ids: &[i64]) -> Result<(), PackageServiceError> {
        if ids.is_empty() {
            return Ok(());
        }
        let unique: HashSet<i64> = ids.iter().copied().collect();
        let unique: Vec<i64> = unique.into_iter().collect();
        let found = self
            .category_repo
            .count_existing(&unique)
            .await
            .context("Failed to check categories")?;
        if found != unique.len() as i64 {
            return Err(PackageServiceError::ValidationError(
                "One or more categories do not exist".to_string(),
            ));
        }
        Ok(())
    }

    async fn delete_files(&self, urls: &[String]) {
        if let Some(storage) = &self.storage {
            storage.delete_all(urls).await;
        }
    }

    async fn invalidate_cache(&self) {
        let _ = self.cache.delete_pattern(CACHE_PATTERN_PACKAGES).await;
    }
}

fn validate_package(package: &Package) -> Result<(), PackageServiceError> {
    let invalid = |msg: &str| Err(PackageServiceError::ValidationError(msg.to_string()));

    if package.title.is_empty() {
        return invalid("Title cannot be empty");
    }
    if package.destination.is_empty() {
        return invalid("Destination cannot be empty");
    }
    if !package.price_base.is_finite() || package.price_base < 0.0 {
        return invalid("Base price must be zero or positive");
    }
    if package.duration_nights < 0 {
        return invalid("Duration cannot be negative");
    }
    if package.min_guests < 1 {
        return invalid("Minimum guests must be at least 1");
    }
    if package.max_guests < package.min_guests {
        return invalid("Maximum guests cannot be lower than minimum guests");
    }
    if package.currency.len() != 3 || !package.currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return invalid("Currency must be a three-letter code");
    }
    Ok(())
}

fn resolve_slug(given: Option<&str>, title: &str) -> Result<String, PackageServiceError> {
    let source = given.map(str::trim).filter(|s| !s.is_empty()).unwrap_or(title);
    let slug = generate_slug(source);
    if slug.is_empty() {
        return Err(PackageServiceError::ValidationError(
            "Could not derive a slug; provide one explicitly".to_string(),
        ));
    }
    Ok(slug)
}

fn normalize_currency(currency: Option<&str>) -> String {
    currency
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CURRENCY)
        .to_ascii_uppercase()
}

fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn clean_urls(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty() && seen.insert(u.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::config::UploadConfig;
    use crate::db::repositories::{SqlxCategoryRepository, SqlxPackageRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{BookingMode, BudgetRange, Category};
    use tempfile::TempDir;

    struct Fixture {
        service: PackageService,
        categories: Arc<dyn CategoryRepository>,
        _dir: TempDir,
        storage: Arc<Storage>,
    }

    async fn setup_test_service() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(UploadConfig {
            path: dir.path().to_path_buf(),
            ..Default::default()
        }));
        let categories = SqlxCategoryRepository::boxed(pool.clone());
        let service = PackageService::new(
            SqlxPackageRepository::boxed(pool),
            categories.clone(),
            Arc::new(MemoryCache::new()),
        )
        .with_storage(storage.clone());

        Fixture {
            service,
            categories,
            _dir: dir,
            storage,
        }
    }

    fn published(title: &str, price: f64) -> CreatePackageInput {
        CreatePackageInput {
            status: PackageStatus::Published,
            booking_mode: BookingMode::Payment,
            min_guests: 1,
            max_guests: 6,
            duration_nights: 4,
            ..CreatePackageInput::new(title, "Quintana Roo", price)
        }
    }

    #[tokio::test]
    async fn test_create_derives_slug_and_defaults() {
        let f = setup_test_service().await;
        let created = f.service.create(published("Tulum Mágico", 8500.0)).await.unwrap();

        assert_eq!(created.package.slug, "tulum-magico");
        assert_eq!(created.package.currency, "MXN");
        assert!(created.images.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_slug_conflicts() {
        let f = setup_test_service().await;
        f.service.create(published("Holbox", 4000.0)).await.unwrap();

        let result = f.service.create(published("HOLBOX", 4200.0)).await;
        assert!(matches!(result, Err(PackageServiceError::DuplicateSlug(s)) if s == "holbox"));
    }

    #[tokio::test]
    async fn test_validation() {
        let f = setup_test_service().await;

        let mut bad_guests = published("Bacalar", 100.0);
        bad_guests.min_guests = 4;
        bad_guests.max_guests = 2;
        assert!(matches!(
            f.service.create(bad_guests).await,
            Err(PackageServiceError::ValidationError(_))
        ));

        let mut zero_guests = published("Bacalar", 100.0);
        zero_guests.min_guests = 0;
        assert!(matches!(
            f.service.create(zero_guests).await,
            Err(PackageServiceError::ValidationError(_))
        ));

        assert!(matches!(
            f.service.create(published("Bacalar", -1.0)).await,
            Err(PackageServiceError::ValidationError(_))
        ));
        assert!(matches!(
            f.service.create(published("   ", 10.0)).await,
            Err(PackageServiceError::ValidationError(_))
        ));

        let mut unknown_category = published("Bacalar", 100.0);
        unknown_category.category_ids = vec![42];
        assert!(matches!(
            f.service.create(unknown_category).await,
            Err(PackageServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_public_reads_hide_drafts() {
        let f = setup_test_service().await;
        let mut draft = published("Borrador", 100.0);
        draft.status = PackageStatus::Draft;
        f.service.create(draft).await.unwrap();
        f.service.create(published("Visible", 100.0)).await.unwrap();

        let listed = f.service.list_published(&PackageFilter::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].package.slug, "visible");

        assert!(matches!(
            f.service.get_published_by_slug("borrador").await,
            Err(PackageServiceError::NotFound(_))
        ));
        assert_eq!(f.service.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_filters_and_cache_invalidation() {
        let f = setup_test_service().await;
        f.service.create(published("Económico", 1500.0)).await.unwrap();
        f.service.create(published("Premium", 25000.0)).await.unwrap();

        let filter = PackageFilter {
            budget: BudgetRange::parse("1000-5000"),
            ..Default::default()
        };
        assert_eq!(f.service.list_published(&filter).await.unwrap().len(), 1);

        // cached result must not survive a write
        f.service.create(published("Medio", 3000.0)).await.unwrap();
        assert_eq!(f.service.list_published(&filter).await.unwrap().len(), 2);

        let home = PackageFilter {
            limit: Some(2),
            ..Default::default()
        };
        assert_eq!(f.service.list_published(&home).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_replaces_tags_and_images() {
        let f = setup_test_service().await;
        let playa = f
            .categories
            .create(&Category::new("playa".into(), "Playa".into(), None, None))
            .await
            .unwrap();

        let old = f.storage.save("image/jpeg", b"old").await.unwrap();
        let keep = f.storage.save("image/jpeg", b"keep").await.unwrap();
        let mut input = published("Cozumel", 6000.0);
        input.image_urls = vec![old.url.clone(), keep.url.clone()];
        let created = f.service.create(input).await.unwrap();
        assert_eq!(created.images.len(), 2);

        let updated = f
            .service
            .update(
                created.package.id,
                UpdatePackageInput {
                    price_base: Some(6500.0),
                    category_ids: Some(vec![playa.id]),
                    image_urls: Some(vec![keep.url.clone()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.package.price_base, 6500.0);
        assert_eq!(updated.categories.len(), 1);
        assert_eq!(updated.images.len(), 1);
        assert_eq!(updated.images[0].image_url, keep.url);
        assert!(f.storage.path_for_url(&keep.url).unwrap().exists());
        assert!(!f.storage.path_for_url(&old.url).unwrap().exists());
    }

    #[tokio::test]
    async fn test_update_slug_conflict_and_own_slug() {
        let f = setup_test_service().await;
        let a = f.service.create(published("Huatulco", 100.0)).await.unwrap();
        f.service.create(published("Zihuatanejo", 100.0)).await.unwrap();

        let same = f
            .service
            .update(
                a.package.id,
                UpdatePackageInput {
                    slug: Some("huatulco".into()),
                    ..Default::default()
                },
            )
            .await;
        assert!(same.is_ok());

        let clash = f
            .service
            .update(
                a.package.id,
                UpdatePackageInput {
                    slug: Some("zihuatanejo".into()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(clash, Err(PackageServiceError::DuplicateSlug(_))));
    }

    #[tokio::test]
    async fn test_delete_removes_files() {
        let f = setup_test_service().await;
        let image = f.storage.save("image/png", b"png").await.unwrap();
        let mut input = published("Isla Mujeres", 3000.0);
        input.image_urls = vec![image.url.clone()];
        input.cover_url = Some(image.url.clone());
        let created = f.service.create(input).await.unwrap();

        f.service.delete(created.package.id).await.unwrap();
        assert!(!f.storage.path_for_url(&image.url).unwrap().exists());
        assert!(matches!(
            f.service.get_by_id(created.package.id).await,
            Err(PackageServiceError::NotFound(_))
        ));
    }
}
