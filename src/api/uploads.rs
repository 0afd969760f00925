//! Attachment upload and download.
//!
//! Uploaded files are stored under the configured upload directory with a
//! random name; the returned reference string is what clients put in a
//! request's `attachments` list. References are opaque and never reveal the
//! original filename.

use std::path::Path as FsPath;

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::domain::user::Role;
use crate::error::{RelabError, Result};

use super::AppState;
use super::auth::AuthUser;

/// `POST /api/requests/upload`: multipart upload, returns the stored file
/// reference.
pub async fn upload(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<Json<Value>> {
    user.require(Role::Student)?;

    let field = multipart
        .next_field()
        .await
        .map_err(|e| RelabError::Validation(format!("Invalid multipart body: {e}")))?
        .ok_or_else(|| RelabError::Validation("Expected a file field".to_string()))?;

    let extension = field
        .file_name()
        .and_then(|name| FsPath::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();

    let bytes = field
        .bytes()
        .await
        .map_err(|e| RelabError::Validation(format!("Failed to read upload: {e}")))?;
    if bytes.is_empty() {
        return Err(RelabError::Validation("Uploaded file is empty".to_string()));
    }

    let reference = format!("{}{extension}", Uuid::new_v4());
    tokio::fs::create_dir_all(&state.config.upload_dir)
        .await
        .map_err(|e| RelabError::Other(e.into()))?;
    let path = FsPath::new(&state.config.upload_dir).join(&reference);
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| RelabError::Other(e.into()))?;

    tracing::info!(file = %reference, user = %user.username, size = bytes.len(), "file uploaded");
    Ok(Json(json!({ "fileName": reference })))
}

/// `GET /api/requests/files/{filename}`: download a stored attachment.
pub async fn download(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse> {
    // References are flat names; anything path-like is rejected.
    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return Err(RelabError::NotFound("File", filename));
    }

    let path = FsPath::new(&state.config.upload_dir).join(&filename);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| RelabError::NotFound("File", filename.clone()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    ))
}
