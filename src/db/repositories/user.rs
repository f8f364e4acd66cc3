//! User repository

use super::{decode_enum, InsertId};
use crate::db::DynDatabasePool;
use crate::models::{User, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Lookup by login email (case-insensitive)
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Change a user's role, returning the updated row
    async fn update_role(&self, id: i64, role: UserRole) -> Result<Option<User>>;

    async fn count(&self) -> Result<i64>;

    /// All users, newest first
    async fn list(&self) -> Result<Vec<User>>;
}

pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

impl_from_row!(User, |row| {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        full_name: row.try_get("full_name")?,
        role: decode_enum(row.try_get("role")?)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
});

const SELECT_USER: &str = r#"
    SELECT id, email, password_hash, full_name, role, created_at, updated_at
    FROM users
"#;

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        let email = user.email.trim().to_lowercase();
        let role = user.role.to_string();

        let id = on_backend!(self.pool, p => sqlx::query(
            r#"
            INSERT INTO users (email, password_hash, full_name, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(&role)
        .bind(now)
        .bind(now)
        .execute(p)
        .await
        .map(|r| r.insert_id()))
        .context("Failed to create user")?;

        Ok(User {
            id,
            email,
            created_at: now,
            updated_at: now,
            ..user.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("{} WHERE id = ?", SELECT_USER);
        let user = on_backend!(self.pool, p => sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(p)
            .await)
        .context("Failed to get user by ID")?;
        Ok(user)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("{} WHERE email = ?", SELECT_USER);
        let email = email.trim().to_lowercase();
        let user = on_backend!(self.pool, p => sqlx::query_as::<_, User>(&sql)
            .bind(&email)
            .fetch_optional(p)
            .await)
        .context("Failed to get user by email")?;
        Ok(user)
    }

    async fn update_role(&self, id: i64, role: UserRole) -> Result<Option<User>> {
        let role = role.to_string();
        let affected = on_backend!(self.pool, p => sqlx::query(
            "UPDATE users SET role = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&role)
        .bind(Utc::now())
        .bind(id)
        .execute(p)
        .await
        .map(|r| r.rows_affected()))
        .context("Failed to update user role")?;

        if affected == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn count(&self) -> Result<i64> {
        let count = on_backend!(self.pool, p => sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(p)
            .await)
        .context("Failed to count users")?;
        Ok(count)
    }

    async fn list(&self) -> Result<Vec<User>> {
        let sql = format!("{} ORDER BY created_at DESC, id DESC", SELECT_USER);
        let users = on_backend!(self.pool, p => sqlx::query_as::<_, User>(&sql)
            .fetch_all(p)
            .await)
        .context("Failed to list users")?;
        Ok(users)
    }
}
