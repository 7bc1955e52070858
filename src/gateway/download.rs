//! `GET /download/:id`

use crate::gateway::{error::ApiError, AppState};
use crate::job::JobId;
use axum::body::Body;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::debug;

/// Stream the finished PDF as an attachment.
///
/// Ids that are not canonical UUIDs are treated like unknown ones, so the
/// path segment never reaches the filesystem. That includes segments that
/// do not even decode to UTF-8.
pub async fn download_pdf(
    State(state): State<Arc<AppState>>,
    raw_id: Result<Path<String>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(raw_id) = raw_id.map_err(|_| ApiError::NotFound)?;
    let id = JobId::parse(&raw_id).ok_or(ApiError::NotFound)?;
    let path = state
        .pipeline
        .store()
        .find_pdf(&id)
        .await
        .ok_or(ApiError::NotFound)?;

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to open {}: {e}", path.display())))?;
    let len = file.metadata().await.ok().map(|m| m.len());
    debug!("[{}] Streaming {}", id, path.display());

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"coloring-page-{id}.pdf\""),
        );
    if let Some(len) = len {
        builder = builder.header(header::CONTENT_LENGTH, len);
    }
    builder
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::Internal(e.to_string()))
}
