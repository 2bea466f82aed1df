//! Photo upload handler.
//!
//! Stores the uploaded bytes in blob storage and returns the opaque
//! reference that `POST /jobs` expects as `input_ref`.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Response body for an upload.
#[derive(Debug, Serialize)]
pub struct UploadedPhoto {
    pub input_ref: String,
}

/// POST /api/v1/photos
///
/// Multipart upload with a single `file` field.
pub async fn upload_photo(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let mut file_data: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                file_data = Some(data.to_vec());
            }
            _ => {} // ignore unknown fields
        }
    }

    let Some(bytes) = file_data else {
        return Err(AppError::BadRequest("missing 'file' field".into()));
    };
    if bytes.is_empty() {
        return Err(AppError::BadRequest("uploaded file is empty".into()));
    }

    let input_ref = state.blobs.store(&bytes).await?;
    tracing::info!(input_ref = %input_ref, size = bytes.len(), "Photo uploaded");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: UploadedPhoto { input_ref },
        }),
    ))
}
