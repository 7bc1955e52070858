//! HTTP error responses.
//!
//! Every handler returns `Result<_, ApiError>`; this is the only place a
//! [`ColoringError`] becomes a status code and JSON body.

use crate::error::ColoringError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    /// The request itself was unacceptable.
    BadRequest {
        error: &'static str,
        details: Option<String>,
    },
    /// No PDF for the requested id.
    NotFound,
    /// The pipeline failed after the upload was accepted.
    Processing(String),
    /// Anything else, including handler panics.
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Processing(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ColoringError> for ApiError {
    fn from(e: ColoringError) -> Self {
        match e {
            ColoringError::MissingImage => ApiError::BadRequest {
                error: "No image file provided",
                details: None,
            },
            ColoringError::UnsupportedType { .. } => ApiError::BadRequest {
                error: "Only PNG and JPEG files are allowed!",
                details: None,
            },
            ColoringError::TooLarge { .. } => ApiError::BadRequest {
                error: "File too large",
                details: Some(e.to_string()),
            },
            ColoringError::MalformedUpload(_) => ApiError::BadRequest {
                error: "Malformed upload",
                details: Some(e.to_string()),
            },
            ColoringError::NotFound { .. } => ApiError::NotFound,
            other => ApiError::Processing(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            ApiError::BadRequest { error, details } => {
                tracing::debug!("Client error: {}", error);
                match details {
                    Some(details) => json!({ "error": error, "details": details }),
                    None => json!({ "error": error }),
                }
            }
            ApiError::NotFound => json!({ "error": "PDF not found" }),
            ApiError::Processing(details) => {
                tracing::error!("Processing error: {}", details);
                json!({ "error": "Failed to process image", "details": details })
            }
            ApiError::Internal(message) => {
                tracing::error!("Internal server error: {}", message);
                json!({ "error": "Internal server error", "message": message })
            }
        };
        (status, Json(body)).into_response()
    }
}
