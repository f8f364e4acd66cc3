//! Upload API endpoint
//!
//! POST /api/v1/admin/upload (editor). Accepts multipart/form-data with a
//! single file field named "file" and stores it as a package image.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState};
use crate::services::StoredFile;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(upload_image))
}

async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<StoredFile>), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;

        let stored = state.storage.save(&content_type, &data).await?;
        tracing::info!(url = %stored.url, size = stored.size, "Package image uploaded");
        return Ok((StatusCode::CREATED, Json(stored)));
    }

    Err(ApiError::validation_error("No file provided"))
}
