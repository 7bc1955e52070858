//! `POST /upload-image`

use crate::error::ColoringError;
use crate::gateway::{error::ApiError, AppState};
use crate::output::ColoringOutput;
use crate::upload::{ImageKind, UploadedImage};
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

/// Name of the multipart field carrying the photo.
pub const IMAGE_FIELD: &str = "image";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub original_image: String,
    pub processed_image: String,
    pub pdf_download: String,
    pub message: &'static str,
}

impl From<&ColoringOutput> for UploadResponse {
    fn from(out: &ColoringOutput) -> Self {
        Self {
            success: true,
            original_image: out.original_url.clone(),
            processed_image: out.processed_url.clone(),
            pdf_download: out.pdf_download_url.clone(),
            message: "Image processed successfully!",
        }
    }
}

pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let max_bytes = state.pipeline.config().max_upload_bytes;
    let upload = read_image_field(multipart, max_bytes).await?;
    let output = state.pipeline.run(upload).await?;
    Ok(Json(UploadResponse::from(&output)))
}

/// Pull the `image` field out of the form.
///
/// The declared type and filename are checked from the part headers before
/// any of the body is read, and reading stops as soon as `max_bytes` is
/// exceeded. Other fields are skipped.
pub async fn read_image_field(
    mut multipart: Multipart,
    max_bytes: u64,
) -> Result<UploadedImage, ColoringError> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, 0, max_bytes))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        if file_name.is_empty() {
            // Browsers send an empty part when no file was picked.
            return Err(ColoringError::MissingImage);
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        ImageKind::accept(&content_type, &file_name)?;

        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| multipart_error(e, bytes.len(), max_bytes))?
        {
            let size = (bytes.len() + chunk.len()) as u64;
            if size > max_bytes {
                return Err(ColoringError::TooLarge {
                    size,
                    limit: max_bytes,
                });
            }
            bytes.extend_from_slice(&chunk);
        }
        return Ok(UploadedImage::new(file_name, content_type, bytes));
    }

    Err(ColoringError::MissingImage)
}

/// The request body limit surfaces as a multipart read error; report it as
/// an oversize upload rather than a malformed one.
fn multipart_error(e: MultipartError, read: usize, max_bytes: u64) -> ColoringError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ColoringError::TooLarge {
            size: read as u64,
            limit: max_bytes,
        }
    } else {
        ColoringError::MalformedUpload(e.body_text())
    }
}
