//! Category repository

use super::InsertId;
use crate::db::DynDatabasePool;
use crate::models::Category;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn create(&self, category: &Category) -> Result<Category>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Category>>;

    /// All categories ordered by name
    async fn list(&self) -> Result<Vec<Category>>;

    async fn update(&self, category: &Category) -> Result<Category>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Count how many of `ids` exist
    async fn count_existing(&self, ids: &[i64]) -> Result<i64>;
}

pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

impl_from_row!(Category, |row| {
    Ok(Category {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        icon: row.try_get("icon")?,
        created_at: row.try_get("created_at")?,
    })
});

const SELECT_CATEGORY: &str =
    "SELECT id, slug, name, description, icon, created_at FROM categories";

impl SqlxCategoryRepository {
    async fn find_one(&self, filter: &str, value: &str) -> Result<Option<Category>> {
        let sql = format!("{} WHERE {} = ?", SELECT_CATEGORY, filter);
        let category = on_backend!(self.pool, p => sqlx::query_as::<_, Category>(&sql)
            .bind(value)
            .fetch_optional(p)
            .await)
        .with_context(|| format!("Failed to get category by {}", filter))?;
        Ok(category)
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, category: &Category) -> Result<Category> {
        let now = Utc::now();
        let id = on_backend!(self.pool, p => sqlx::query(
            "INSERT INTO categories (slug, name, description, icon, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&category.slug)
        .bind(&category.name)
        .bind(&category.description)
        .bind(&category.icon)
        .bind(now)
        .execute(p)
        .await
        .map(|r| r.insert_id()))
        .context("Failed to create category")?;

        Ok(Category {
            id,
            created_at: now,
            ..category.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        let sql = format!("{} WHERE id = ?", SELECT_CATEGORY);
        let category = on_backend!(self.pool, p => sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(p)
            .await)
        .context("Failed to get category by ID")?;
        Ok(category)
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        self.find_one("slug", slug).await
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Category>> {
        self.find_one("name", name).await
    }

    async fn list(&self) -> Result<Vec<Category>> {
        let sql = format!("{} ORDER BY name ASC", SELECT_CATEGORY);
        let categories = on_backend!(self.pool, p => sqlx::query_as::<_, Category>(&sql)
            .fetch_all(p)
            .await)
        .context("Failed to list categories")?;
        Ok(categories)
    }

    async fn update(&self, category: &Category) -> Result<Category> {
        on_backend!(self.pool, p => sqlx::query(
            "UPDATE categories SET slug = ?, name = ?, description = ?, icon = ? WHERE id = ?",
        )
        .bind(&category.slug)
        .bind(&category.name)
        .bind(&category.description)
        .bind(&category.icon)
        .bind(category.id)
        .execute(p)
        .await
        .map(|_| ()))
        .context("Failed to update category")?;

        Ok(category.clone())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = on_backend!(self.pool, p => sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))
        .context("Failed to delete category")?;
        Ok(affected > 0)
    }

    async fn count_existing(&self, ids: &[i64]) -> Result<i64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT COUNT(*) FROM categories WHERE id IN ({})", placeholders);

        let count = on_backend!(self.pool, p => {
            let mut query = sqlx::query_scalar::<_, i64>(&sql);
            for id in ids {
                query = query.bind(*id);
            }
            query.fetch_one(p).await
        })
        .context("Failed to count categories")?;
        Ok(count)
    }
}
