//! Session repository

use crate::db::DynDatabasePool;
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Get session by token
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Drop every session of a user (role change, account removal)
    async fn delete_by_user(&self, user_id: i64) -> Result<u64>;

    /// Delete expired sessions, returning how many were removed
    async fn delete_expired(&self) -> Result<u64>;
}

pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

impl_from_row!(Session, |row| {
    Ok(Session {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
    })
});

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        on_backend!(self.pool, p => sqlx::query(
            "INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&session.id)
        .bind(session.user_id)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(p)
        .await
        .map(|_| ()))
        .context("Failed to create session")?;

        Ok(session.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        let session = on_backend!(self.pool, p => sqlx::query_as::<_, Session>(
            "SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(p)
        .await)
        .context("Failed to get session")?;
        Ok(session)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        on_backend!(self.pool, p => sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(p)
            .await
            .map(|_| ()))
        .context("Failed to delete session")?;
        Ok(())
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<u64> {
        let removed = on_backend!(self.pool, p => sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))
        .context("Failed to delete user sessions")?;
        Ok(removed)
    }

    async fn delete_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let removed = on_backend!(self.pool, p => sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
            .bind(now)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))
        .context("Failed to delete expired sessions")?;
        Ok(removed)
    }
}
