//! Error types for the coloring-page library.
//!
//! Two error types reflect the two layers that can fail:
//!
//! * [`ColoringError`]: everything the pipeline and the file store can
//!   report. Every failure in a request's chain ends up as exactly one of
//!   these, and the HTTP gateway maps it to a status code in one place.
//!
//! * [`AiError`]: what a [`crate::pipeline::ai::ColoringAi`] backend reports
//!   for a single call. The pipeline wraps it in [`ColoringError::Ai`]
//!   together with the stage that produced it.
//!
//! Nothing in this crate retries; an error always ends the request.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which of the two external AI calls an error or timeout belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AiStage {
    /// Vision call: image → description.
    Describe,
    /// Generation call: prompt → image URL.
    Generate,
}

impl fmt::Display for AiStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AiStage::Describe => f.write_str("Vision analysis"),
            AiStage::Generate => f.write_str("Image generation"),
        }
    }
}

/// All errors returned by the coloring-page library.
#[derive(Debug, Error)]
pub enum ColoringError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// The request carried no `image` file.
    #[error("No image file provided")]
    MissingImage,

    /// The upload is not a PNG or JPEG (content type or extension).
    #[error("Only PNG and JPEG files are allowed (content type '{content_type}', file '{file_name}')")]
    UnsupportedType {
        content_type: String,
        file_name: String,
    },

    /// The upload exceeds the configured size ceiling.
    #[error("File too large: more than {limit} bytes (read {size} bytes before rejecting)")]
    TooLarge { size: u64, limit: u64 },

    /// The multipart body could not be parsed.
    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    // ── External service errors ───────────────────────────────────────────
    /// An AI call did not finish within its hard ceiling.
    #[error("{stage} timed out after {secs} seconds")]
    Timeout { stage: AiStage, secs: u64 },

    /// The AI backend reported a failure.
    #[error("{stage} failed: {source}")]
    Ai {
        stage: AiStage,
        #[source]
        source: AiError,
    },

    /// The vision call returned nothing usable.
    #[error("Vision analysis returned an empty description")]
    EmptyDescription,

    /// The generation call returned no result with a usable URL.
    #[error("No response from image generation API")]
    EmptyGeneration,

    /// A result URL that is neither http nor https.
    #[error("Invalid image URL '{url}': only http and https are supported")]
    InvalidUrl { url: String },

    /// Downloading the generated image failed.
    #[error("Failed to download image from '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    // ── Rendering and I/O errors ──────────────────────────────────────────
    /// The fetched bytes are not a decodable image.
    #[error("Failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The PDF document could not be assembled.
    #[error("Failed to build PDF: {0}")]
    PdfBuild(String),

    /// A file-store read or write failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Lookup errors ─────────────────────────────────────────────────────
    /// No finished PDF exists for the requested identifier.
    #[error("PDF not found for '{id}'")]
    NotFound { id: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ColoringError {
    /// Build an [`ColoringError::Io`] for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ColoringError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors caused by the request itself (bad type, size, body).
    ///
    /// These are always raised before any external call is made.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ColoringError::MissingImage
                | ColoringError::UnsupportedType { .. }
                | ColoringError::TooLarge { .. }
                | ColoringError::MalformedUpload(_)
        )
    }

    /// True for a lookup of an identifier with no finished artifact.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ColoringError::NotFound { .. })
    }
}

/// A failure reported by an AI backend for one call.
#[derive(Debug, Error)]
pub enum AiError {
    /// The backend has no credentials or provider configured.
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// The request never produced an HTTP response.
    #[error("request failed: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Error surfaced by the LLM provider abstraction.
    #[error("{0}")]
    Provider(String),
}
