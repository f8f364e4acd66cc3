//! Admin API endpoints
//!
//! - GET /api/v1/admin/dashboard - Back-office counters (editor)
//! - GET /api/v1/admin/users - All accounts (admin)
//! - PUT /api/v1/admin/users/{id}/role - Change a role (admin)

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::auth::UserResponse;
use crate::api::common::ApiJson;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::UserRole;
use crate::services::DashboardStats;

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: UserRole,
}

/// Routes open to editors and admins
pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}

/// Routes restricted to admins
pub fn users_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/{id}/role", put(change_role))
}

async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardStats>, ApiError> {
    let stats = state.dashboard_service.stats().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to load dashboard stats");
        ApiError::internal_error("Failed to load dashboard stats")
    })?;
    Ok(Json(stats))
}

async fn list_users(State(state): State<AppState>) -> Result<Json<UserListResponse>, ApiError> {
    let users = state.user_service.list().await?;
    Ok(Json(UserListResponse {
        users: users.into_iter().map(UserResponse::from).collect(),
    }))
}

async fn change_role(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<RoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    if admin.0.id == id && body.role != UserRole::Admin {
        return Err(ApiError::validation_error("Admins cannot demote themselves"));
    }
    let user = state.user_service.change_role(id, body.role).await?;
    Ok(Json(user.into()))
}
