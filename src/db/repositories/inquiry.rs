//! Inquiry repository

use super::{decode_enum, InsertId};
use crate::db::DynDatabasePool;
use crate::models::{Inquiry, InquiryWithPackage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait InquiryRepository: Send + Sync {
    async fn create(&self, inquiry: &Inquiry) -> Result<Inquiry>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Inquiry>>;

    /// Newest first, with the package title when linked
    async fn list(&self) -> Result<Vec<InquiryWithPackage>>;

    async fn count(&self) -> Result<i64>;
}

pub struct SqlxInquiryRepository {
    pool: DynDatabasePool,
}

impl SqlxInquiryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn InquiryRepository> {
        Arc::new(Self::new(pool))
    }
}

impl_from_row!(Inquiry, |row| {
    Ok(Inquiry {
        id: row.try_get("id")?,
        package_id: row.try_get("package_id")?,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        dates: row.try_get("dates")?,
        guests: row.try_get("guests")?,
        budget: row.try_get("budget")?,
        notes: row.try_get("notes")?,
        source: decode_enum(row.try_get("source")?)?,
        created_at: row.try_get("created_at")?,
    })
});

impl_from_row!(InquiryWithPackage, |row| {
    Ok(InquiryWithPackage {
        inquiry: sqlx::FromRow::from_row(row)?,
        package_title: row.try_get("package_title")?,
    })
});

const INQUIRY_COLUMNS: &str = r#"
    i.id, i.package_id, i.full_name, i.email, i.phone, i.dates, i.guests, i.budget,
    i.notes, i.source, i.created_at
"#;

#[async_trait]
impl InquiryRepository for SqlxInquiryRepository {
    async fn create(&self, inquiry: &Inquiry) -> Result<Inquiry> {
        let now = Utc::now();
        let source = inquiry.source.to_string();

        let id = on_backend!(self.pool, p => sqlx::query(
            r#"
            INSERT INTO inquiries (package_id, full_name, email, phone, dates, guests, budget,
                                   notes, source, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(inquiry.package_id)
        .bind(&inquiry.full_name)
        .bind(&inquiry.email)
        .bind(&inquiry.phone)
        .bind(&inquiry.dates)
        .bind(inquiry.guests)
        .bind(inquiry.budget)
        .bind(&inquiry.notes)
        .bind(&source)
        .bind(now)
        .execute(p)
        .await
        .map(|r| r.insert_id()))
        .context("Failed to create inquiry")?;

        Ok(Inquiry {
            id,
            created_at: now,
            ..inquiry.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Inquiry>> {
        let sql = format!("SELECT {} FROM inquiries i WHERE i.id = ?", INQUIRY_COLUMNS);
        let inquiry = on_backend!(self.pool, p => sqlx::query_as::<_, Inquiry>(&sql)
            .bind(id)
            .fetch_optional(p)
            .await)
        .context("Failed to get inquiry")?;
        Ok(inquiry)
    }

    async fn list(&self) -> Result<Vec<InquiryWithPackage>> {
        let sql = format!(
            r#"
            SELECT {}, p.title AS package_title
            FROM inquiries i
            LEFT JOIN packages p ON p.id = i.package_id
            ORDER BY i.created_at DESC, i.id DESC
            "#,
            INQUIRY_COLUMNS
        );
        let inquiries = on_backend!(self.pool, p => sqlx::query_as::<_, InquiryWithPackage>(&sql)
            .fetch_all(p)
            .await)
        .context("Failed to list inquiries")?;
        Ok(inquiries)
    }

    async fn count(&self) -> Result<i64> {
        let count = on_backend!(self.pool, p => sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM inquiries")
            .fetch_one(p)
            .await)
        .context("Failed to count inquiries")?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::migrated_pool;
    use crate::models::InquirySource;

    fn inquiry(name: &str, package_id: Option<i64>) -> Inquiry {
        Inquiry {
            id: 0,
            package_id,
            full_name: name.to_string(),
            email: "cliente@correo.mx".to_string(),
            phone: Some("+52 55 1234 5678".to_string()),
            dates: Some("Semana Santa".to_string()),
            guests: Some(4),
            budget: Some(20000.0),
            notes: None,
            source: InquirySource::Website,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = SqlxInquiryRepository::new(migrated_pool().await);
        let created = repo.create(&inquiry("Marta", None)).await.unwrap();
        assert!(created.id > 0);

        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.full_name, "Marta");
        assert_eq!(found.guests, Some(4));
        assert_eq!(found.source, InquirySource::Website);
    }

    #[tokio::test]
    async fn test_list_joins_package_title() {
        let pool = migrated_pool().await;
        pool.execute("INSERT INTO packages (id, title, slug, destination) VALUES (7, 'Oaxaca Mágico', 'oaxaca', 'Oaxaca')")
            .await
            .unwrap();
        let package_id = 7;
        let repo = SqlxInquiryRepository::new(pool);

        repo.create(&inquiry("Sin paquete", None)).await.unwrap();
        repo.create(&inquiry("Con paquete", Some(package_id))).await.unwrap();

        let list = repo.list().await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].inquiry.full_name, "Con paquete");
        assert_eq!(list[0].package_title.as_deref(), Some("Oaxaca Mágico"));
        assert!(list[1].package_title.is_none());
        assert_eq!(repo.count().await.unwrap(), 2);
    }
}
