//! Package repository
//!
//! Packages plus their gallery (`package_images`) and category tags
//! (`package_tags`). Gallery and tag sets are always replaced as a whole
//! inside a transaction.

use super::{decode_enum, InsertId};
use crate::db::DynDatabasePool;
use crate::models::{Category, Package, PackageFilter, PackageImage, PackageStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait PackageRepository: Send + Sync {
    async fn create(&self, package: &Package) -> Result<Package>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Package>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Package>>;

    async fn update(&self, package: &Package) -> Result<Package>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Whether `slug` is taken by a package other than `exclude_id`
    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Newest first. `status = None` lists every status.
    async fn list(
        &self,
        filter: &PackageFilter,
        status: Option<PackageStatus>,
    ) -> Result<Vec<Package>>;

    async fn count(&self) -> Result<i64>;

    /// Gallery of one package ordered by `sort_order`
    async fn images(&self, package_id: i64) -> Result<Vec<PackageImage>>;

    /// Galleries of several packages, grouped by package then `sort_order`
    async fn images_for(&self, package_ids: &[i64]) -> Result<Vec<PackageImage>>;

    /// Replace the gallery; position in `urls` becomes `sort_order`
    async fn replace_images(&self, package_id: i64, urls: &[String]) -> Result<Vec<PackageImage>>;

    /// Categories tagged on one package, by name
    async fn categories(&self, package_id: i64) -> Result<Vec<Category>>;

    /// `(package_id, category)` pairs for several packages
    async fn categories_for(&self, package_ids: &[i64]) -> Result<Vec<(i64, Category)>>;

    /// Replace the tag set of a package
    async fn replace_tags(&self, package_id: i64, category_ids: &[i64]) -> Result<()>;
}

pub struct SqlxPackageRepository {
    pool: DynDatabasePool,
}

impl SqlxPackageRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PackageRepository> {
        Arc::new(Self::new(pool))
    }
}

impl_from_row!(Package, |row| {
    Ok(Package {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        destination: row.try_get("destination")?,
        short_description: row.try_get("short_description")?,
        long_description: row.try_get("long_description")?,
        price_base: row.try_get("price_base")?,
        currency: row.try_get("currency")?,
        duration_nights: row.try_get("duration_nights")?,
        min_guests: row.try_get("min_guests")?,
        max_guests: row.try_get("max_guests")?,
        cover_url: row.try_get("cover_url")?,
        status: decode_enum(row.try_get("status")?)?,
        booking_mode: decode_enum(row.try_get("booking_mode")?)?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
});

impl_from_row!(PackageImage, |row| {
    Ok(PackageImage {
        id: row.try_get("id")?,
        package_id: row.try_get("package_id")?,
        image_url: row.try_get("image_url")?,
        sort_order: row.try_get("sort_order")?,
        created_at: row.try_get("created_at")?,
    })
});

/// A category row carrying the package it is tagged on
struct TaggedCategory {
    package_id: i64,
    category: Category,
}

impl_from_row!(TaggedCategory, |row| {
    Ok(TaggedCategory {
        package_id: row.try_get("package_id")?,
        category: Category {
            id: row.try_get("id")?,
            slug: row.try_get("slug")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            icon: row.try_get("icon")?,
            created_at: row.try_get("created_at")?,
        },
    })
});

const SELECT_PACKAGE: &str = r#"
    SELECT p.id, p.title, p.slug, p.destination, p.short_description, p.long_description,
           p.price_base, p.currency, p.duration_nights, p.min_guests, p.max_guests,
           p.cover_url, p.status, p.booking_mode, p.created_by, p.created_at, p.updated_at
    FROM packages p
"#;

const LIST_FILTERS: &str = r#"
    WHERE (? IS NULL OR p.status = ?)
      AND (? IS NULL OR p.price_base >= ?)
      AND (? IS NULL OR p.price_base <= ?)
      AND (? IS NULL OR p.min_guests <= ?)
      AND (? IS NULL OR LOWER(p.destination) LIKE ? ESCAPE '!')
      AND (? IS NULL OR EXISTS (
            SELECT 1 FROM package_tags pt
            JOIN categories c ON c.id = pt.category_id
            WHERE pt.package_id = p.id AND c.slug = ?))
    ORDER BY p.created_at DESC, p.id DESC
    LIMIT ?
"#;

/// Escape a user term for `LIKE ... ESCAPE '!'` so it matches literally
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '!' | '%' | '_') {
            escaped.push('!');
        }
        escaped.push(c);
    }
    escaped
}

const SELECT_TAGGED_CATEGORY: &str = r#"
    SELECT pt.package_id, c.id, c.slug, c.name, c.description, c.icon, c.created_at
    FROM package_tags pt
    JOIN categories c ON c.id = pt.category_id
"#;

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[async_trait]
impl PackageRepository for SqlxPackageRepository {
    async fn create(&self, package: &Package) -> Result<Package> {
        let now = Utc::now();
        let status = package.status.to_string();
        let booking_mode = package.booking_mode.to_string();

        let id = on_backend!(self.pool, p => sqlx::query(
            r#"
            INSERT INTO packages (title, slug, destination, short_description, long_description,
                                  price_base, currency, duration_nights, min_guests, max_guests,
                                  cover_url, status, booking_mode, created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&package.title)
        .bind(&package.slug)
        .bind(&package.destination)
        .bind(&package.short_description)
        .bind(&package.long_description)
        .bind(package.price_base)
        .bind(&package.currency)
        .bind(package.duration_nights)
        .bind(package.min_guests)
        .bind(package.max_guests)
        .bind(&package.cover_url)
        .bind(&status)
        .bind(&booking_mode)
        .bind(package.created_by)
        .bind(now)
        .bind(now)
        .execute(p)
        .await
        .map(|r| r.insert_id()))
        .context("Failed to create package")?;

        Ok(Package {
            id,
            created_at: now,
            updated_at: now,
            ..package.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Package>> {
        let sql = format!("{} WHERE p.id = ?", SELECT_PACKAGE);
        let package = on_backend!(self.pool, p => sqlx::query_as::<_, Package>(&sql)
            .bind(id)
            .fetch_optional(p)
            .await)
        .context("Failed to get package by ID")?;
        Ok(package)
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Package>> {
        let sql = format!("{} WHERE p.slug = ?", SELECT_PACKAGE);
        let package = on_backend!(self.pool, p => sqlx::query_as::<_, Package>(&sql)
            .bind(slug)
            .fetch_optional(p)
            .await)
        .context("Failed to get package by slug")?;
        Ok(package)
    }

    async fn update(&self, package: &Package) -> Result<Package> {
        let now = Utc::now();
        let status = package.status.to_string();
        let booking_mode = package.booking_mode.to_string();

        on_backend!(self.pool, p => sqlx::query(
            r#"
            UPDATE packages
            SET title = ?, slug = ?, destination = ?, short_description = ?, long_description = ?,
                price_base = ?, currency = ?, duration_nights = ?, min_guests = ?, max_guests = ?,
                cover_url = ?, status = ?, booking_mode = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&package.title)
        .bind(&package.slug)
        .bind(&package.destination)
        .bind(&package.short_description)
        .bind(&package.long_description)
        .bind(package.price_base)
        .bind(&package.currency)
        .bind(package.duration_nights)
        .bind(package.min_guests)
        .bind(package.max_guests)
        .bind(&package.cover_url)
        .bind(&status)
        .bind(&booking_mode)
        .bind(now)
        .bind(package.id)
        .execute(p)
        .await
        .map(|_| ()))
        .context("Failed to update package")?;

        Ok(Package {
            updated_at: now,
            ..package.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = on_backend!(self.pool, p => sqlx::query("DELETE FROM packages WHERE id = ?")
            .bind(id)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))
        .context("Failed to delete package")?;
        Ok(affected > 0)
    }

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let count = on_backend!(self.pool, p => sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM packages WHERE slug = ? AND (? IS NULL OR id <> ?)",
        )
        .bind(slug)
        .bind(exclude_id)
        .bind(exclude_id)
        .fetch_one(p)
        .await)
        .context("Failed to check package slug")?;
        Ok(count > 0)
    }

    async fn list(
        &self,
        filter: &PackageFilter,
        status: Option<PackageStatus>,
    ) -> Result<Vec<Package>> {
        let sql = format!("{} {}", SELECT_PACKAGE, LIST_FILTERS);
        let status = status.map(|s| s.to_string());
        let min_price = filter.budget.map(|b| b.min);
        let max_price = filter.budget.and_then(|b| b.max);
        let destination = filter
            .destination
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| format!("%{}%", escape_like(&d.to_lowercase())));
        let category = filter.category.as_deref().filter(|c| !c.is_empty());
        let limit = filter.limit.filter(|l| *l > 0).unwrap_or(i64::MAX);

        let packages = on_backend!(self.pool, p => sqlx::query_as::<_, Package>(&sql)
            .bind(&status)
            .bind(&status)
            .bind(min_price)
            .bind(min_price)
            .bind(max_price)
            .bind(max_price)
            .bind(filter.guests)
            .bind(filter.guests)
            .bind(&destination)
            .bind(&destination)
            .bind(category)
            .bind(category)
            .bind(limit)
            .fetch_all(p)
            .await)
        .context("Failed to list packages")?;
        Ok(packages)
    }

    async fn count(&self) -> Result<i64> {
        let count = on_backend!(self.pool, p => sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM packages")
            .fetch_one(p)
            .await)
        .context("Failed to count packages")?;
        Ok(count)
    }

    async fn images(&self, package_id: i64) -> Result<Vec<PackageImage>> {
        self.images_for(&[package_id]).await
    }

    async fn images_for(&self, package_ids: &[i64]) -> Result<Vec<PackageImage>> {
        if package_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            r#"
            SELECT id, package_id, image_url, sort_order, created_at
            FROM package_images
            WHERE package_id IN ({})
            ORDER BY package_id, sort_order, id
            "#,
            placeholders(package_ids.len())
        );

        let images = on_backend!(self.pool, p => {
            let mut query = sqlx::query_as::<_, PackageImage>(&sql);
            for id in package_ids {
                query = query.bind(*id);
            }
            query.fetch_all(p).await
        })
        .context("Failed to load package images")?;
        Ok(images)
    }

    async fn replace_images(&self, package_id: i64, urls: &[String]) -> Result<Vec<PackageImage>> {
        let now = Utc::now();
        on_backend!(self.pool, p => {
            let mut tx = p.begin().await?;
            sqlx::query("DELETE FROM package_images WHERE package_id = ?")
                .bind(package_id)
                .execute(&mut *tx)
                .await?;
            for (position, url) in urls.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO package_images (package_id, image_url, sort_order, created_at) VALUES (?, ?, ?, ?)",
                )
                .bind(package_id)
                .bind(url)
                .bind(position as i32)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await
        })
        .context("Failed to replace package images")?;

        self.images(package_id).await
    }

    async fn categories(&self, package_id: i64) -> Result<Vec<Category>> {
        Ok(self
            .categories_for(&[package_id])
            .await?
            .into_iter()
            .map(|(_, category)| category)
            .collect())
    }

    async fn categories_for(&self, package_ids: &[i64]) -> Result<Vec<(i64, Category)>> {
        if package_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "{} WHERE pt.package_id IN ({}) ORDER BY pt.package_id, c.name",
            SELECT_TAGGED_CATEGORY,
            placeholders(package_ids.len())
        );

        let rows = on_backend!(self.pool, p => {
            let mut query = sqlx::query_as::<_, TaggedCategory>(&sql);
            for id in package_ids {
                query = query.bind(*id);
            }
            query.fetch_all(p).await
        })
        .context("Failed to load package categories")?;

        Ok(rows.into_iter().map(|r| (r.package_id, r.category)).collect())
    }

    async fn replace_tags(&self, package_id: i64, category_ids: &[i64]) -> Result<()> {
        let mut ids = category_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        on_backend!(self.pool, p => {
            let mut tx = p.begin().await?;
            sqlx::query("DELETE FROM package_tags WHERE package_id = ?")
                .bind(package_id)
                .execute(&mut *tx)
                .await?;
            for category_id in &ids {
                sqlx::query("INSERT INTO package_tags (package_id, category_id) VALUES (?, ?)")
                    .bind(package_id)
                    .bind(*category_id)
                    .execute(&mut *tx)
                    .await?;
            }
            tx.commit().await
        })
        .context("Failed to replace package tags")?;
        Ok(())
    }
}
