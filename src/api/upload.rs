//! Upload API endpoint
//!
//! POST /api/manage/upload/ stores one multipart field named `file` under the
//! configured upload directory and returns the URL path it is served under.
//! That path is what image and file items store as their `file` payload.
//!
//! Only the MIME types of `upload.allowed_types` are accepted, and the stored
//! extension comes from the MIME type, never from the client's file name.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::path::Path;
use tokio::fs;
use uuid::Uuid;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};

/// Multipart framing allowance on top of the configured file size
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Response for successful upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
    pub filename: String,
    pub size: u64,
    pub content_type: String,
}

pub fn router(max_file_size: u64) -> Router<AppState> {
    let limit = usize::try_from(max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);
    Router::new()
        .route("/manage/upload/", post(upload_file))
        .layer(DefaultBodyLimit::max(limit))
}

async fn upload_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let config = &state.upload_config;
    ensure_upload_dir(&config.path).await?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let original = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let extension = match config.extension_for(&content_type) {
            Some(ext) if config.is_type_allowed(&content_type) => ext,
            _ => {
                return Err(ApiError::validation_error(format!(
                    "Invalid file type: {}. Allowed types: {:?}",
                    content_type, config.allowed_types
                )))
            }
        };

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;

        if data.is_empty() {
            return Err(ApiError::validation_error("The submitted file is empty."));
        }
        if data.len() as u64 > config.max_file_size {
            return Err(ApiError::validation_error(format!(
                "File too large. Maximum size: {} bytes",
                config.max_file_size
            )));
        }

        let filename = format!("{}.{}", Uuid::new_v4(), extension);
        fs::write(config.path.join(&filename), &data)
            .await
            .map_err(|e| ApiError::internal(anyhow::Error::new(e).context("Failed to save upload")))?;

        tracing::info!(user_id = user.0.id, file = %filename, original = %original, size = data.len(), "File uploaded");
        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                url: format!("{}/{}", config.url_prefix.trim_end_matches('/'), filename),
                filename,
                size: data.len() as u64,
                content_type,
            }),
        ));
    }

    Err(ApiError::validation_error("No file was submitted."))
}

async fn ensure_upload_dir(path: &Path) -> Result<(), ApiError> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| ApiError::internal(anyhow::Error::new(e).context("Failed to create upload dir")))
}
