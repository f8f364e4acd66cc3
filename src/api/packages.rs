//! Package API endpoints
//!
//! Public:
//! - GET /api/v1/packages - Published packages (budget, guests, category, destination, limit)
//! - GET /api/v1/packages/{slug} - Published package detail
//!
//! Admin (editor):
//! - GET /api/v1/admin/packages - All packages
//! - POST /api/v1/admin/packages - Create
//! - GET /api/v1/admin/packages/{id} - Detail by id
//! - PUT /api/v1/admin/packages/{id} - Partial update
//! - DELETE /api/v1/admin/packages/{id} - Delete with images

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::ApiJson;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{
    BudgetRange, CreatePackageInput, PackageFilter, PackageWithDetails, UpdatePackageInput,
};

/// Hard cap on the public page size
const MAX_LIST_LIMIT: i64 = 100;

/// Query parameters for the public listing
#[derive(Debug, Default, Deserialize)]
pub struct PackageListQuery {
    /// `"min-max"` or `"min-+"`; malformed values are ignored
    pub budget: Option<String>,
    pub guests: Option<i32>,
    /// Category slug
    pub category: Option<String>,
    pub destination: Option<String>,
    pub limit: Option<i64>,
}

impl PackageListQuery {
    pub fn into_filter(self) -> PackageFilter {
        PackageFilter {
            budget: self.budget.as_deref().and_then(BudgetRange::parse),
            guests: self.guests.filter(|g| *g > 0),
            category: non_empty(self.category),
            destination: non_empty(self.destination),
            limit: self.limit.filter(|l| *l > 0).map(|l| l.min(MAX_LIST_LIMIT)),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[derive(Debug, Serialize)]
pub struct PackageListResponse {
    pub packages: Vec<PackageWithDetails>,
    pub total: usize,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_packages))
        .route("/{slug}", get(get_package))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(admin_list_packages).post(create_package))
        .route(
            "/{id}",
            get(admin_get_package).put(update_package).delete(delete_package),
        )
}

/// GET /api/v1/packages
async fn list_packages(
    State(state): State<AppState>,
    Query(query): Query<PackageListQuery>,
) -> Result<Json<PackageListResponse>, ApiError> {
    let packages = state
        .package_service
        .list_published(&query.into_filter())
        .await?;
    Ok(Json(PackageListResponse {
        total: packages.len(),
        packages,
    }))
}

/// GET /api/v1/packages/{slug}
async fn get_package(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PackageWithDetails>, ApiError> {
    Ok(Json(state.package_service.get_published_by_slug(&slug).await?))
}

/// GET /api/v1/admin/packages
async fn admin_list_packages(
    State(state): State<AppState>,
) -> Result<Json<PackageListResponse>, ApiError> {
    let packages = state.package_service.list_all().await?;
    Ok(Json(PackageListResponse {
        total: packages.len(),
        packages,
    }))
}

/// GET /api/v1/admin/packages/{id}
async fn admin_get_package(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PackageWithDetails>, ApiError> {
    Ok(Json(state.package_service.get_by_id(id).await?))
}

/// POST /api/v1/admin/packages
async fn create_package(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(mut body): ApiJson<CreatePackageInput>,
) -> Result<(StatusCode, Json<PackageWithDetails>), ApiError> {
    body.created_by = Some(user.0.id);
    let package = state.package_service.create(body).await?;
    tracing::info!(package_id = package.package.id, slug = %package.package.slug, "Package created");
    Ok((StatusCode::CREATED, Json(package)))
}

/// PUT /api/v1/admin/packages/{id}
async fn update_package(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<UpdatePackageInput>,
) -> Result<Json<PackageWithDetails>, ApiError> {
    Ok(Json(state.package_service.update(id, body).await?))
}

/// DELETE /api/v1/admin/packages/{id}
async fn delete_package(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.package_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
