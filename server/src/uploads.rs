//! Profile image upload and static serving of stored files.

use std::path::Path as FsPath;

use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use crate::auth::middleware::Claims;
use crate::error::ApiError;
use crate::state::AppState;

/// Profile images are capped at 5 MiB.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

fn uploads_dir(data_dir: &str) -> std::path::PathBuf {
    FsPath::new(data_dir).join("uploads")
}

/// POST /api/auth/upload-image
/// Multipart upload of a single image field. Stored under a random name;
/// the returned URL is what clients put in profileImageUrl.
pub async fn upload_image(
    State(state): State<AppState>,
    _claims: Claims,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        let extension = FsPath::new(&file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ApiError::BadRequest(
                "Only image files are allowed for profile pictures".to_string(),
            ));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Upload read failed: {}", e)))?;

        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ApiError::PayloadTooLarge(
                "File too large. Maximum size is 5MB".to_string(),
            ));
        }

        let stored_name = format!("{}.{}", Uuid::new_v4(), extension);
        let dir = uploads_dir(&state.data_dir);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ApiError::internal("Uploads directory unavailable", e))?;
        let dest = dir.join(&stored_name);
        tokio::fs::write(&dest, &bytes)
            .await
            .map_err(|e| ApiError::internal("Upload write failed", e))?;

        tracing::info!(file = %stored_name, size = bytes.len(), "Image uploaded");

        return Ok(Json(serde_json::json!({
            "message": "Image uploaded successfully",
            "data": {
                "imageUrl": format!("/uploads/{}", stored_name),
                "filename": stored_name,
                "size": bytes.len(),
            }
        })));
    }

    Err(ApiError::BadRequest("No file uploaded".to_string()))
}

/// GET /uploads/{file} — Serve a stored upload.
/// Filenames are server-generated; anything that could traverse out of
/// the uploads directory is rejected.
pub async fn serve_upload(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response, ApiError> {
    let safe = !file.is_empty()
        && file
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        && !file.contains("..");
    if !safe {
        return Err(ApiError::NotFound("File not found".to_string()));
    }

    let path = uploads_dir(&state.data_dir).join(&file);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| ApiError::NotFound("File not found".to_string()))?;

    let extension = FsPath::new(&file)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    Ok((
        [(header::CONTENT_TYPE, content_type_for(&extension))],
        bytes,
    )
        .into_response())
}
