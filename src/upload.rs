//! Uploaded images and the type/size rules applied to them.
//!
//! Both checks run before anything leaves the process: the gateway calls
//! [`ImageKind::accept`] as soon as it sees the multipart headers, and the
//! pipeline re-runs [`UploadedImage::validate`] as its first step.

use crate::error::ColoringError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Default upload ceiling: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// The two accepted upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
}

impl ImageKind {
    /// Match a declared MIME type (parameters and case ignored).
    pub fn from_mime(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/png" => Some(ImageKind::Png),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(ImageKind::Jpeg),
            _ => None,
        }
    }

    /// Match a filename by extension (case ignored).
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let ext = Path::new(file_name)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(ImageKind::Png),
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            _ => None,
        }
    }

    /// Both the declared type and the extension must name PNG or JPEG.
    ///
    /// They are not required to agree with each other; the bytes are sent
    /// to the vision model under the MIME type's kind.
    pub fn accept(content_type: &str, file_name: &str) -> Result<Self, ColoringError> {
        match (Self::from_mime(content_type), Self::from_file_name(file_name)) {
            (Some(kind), Some(_)) => Ok(kind),
            _ => Err(ColoringError::UnsupportedType {
                content_type: content_type.to_string(),
                file_name: file_name.to_string(),
            }),
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ImageKind::Png => "image/png",
            ImageKind::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Png => "png",
            ImageKind::Jpeg => "jpg",
        }
    }
}

/// A photo as received from the client.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Client-supplied filename, untrusted.
    pub file_name: String,
    /// Client-supplied content type, untrusted.
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedImage {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Apply the type and size rules.
    pub fn validate(&self, max_bytes: u64) -> Result<ImageKind, ColoringError> {
        let kind = ImageKind::accept(&self.content_type, &self.file_name)?;
        let size = self.bytes.len() as u64;
        if size > max_bytes {
            return Err(ColoringError::TooLarge {
                size,
                limit: max_bytes,
            });
        }
        if size == 0 {
            return Err(ColoringError::MissingImage);
        }
        Ok(kind)
    }

    /// Filename safe to append to `<id>-` inside the uploads directory.
    pub fn stored_name(&self, kind: ImageKind) -> String {
        sanitize_file_name(&self.file_name, kind)
    }
}

static UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]").unwrap());

/// Reduce a client filename to its last component with a safe charset.
///
/// Separators of either platform are treated as path boundaries. Leading
/// dots are stripped so the result is never hidden or `..`. An empty
/// result falls back to `image.<ext>`.
pub fn sanitize_file_name(file_name: &str, kind: ImageKind) -> String {
    let last = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("");
    let cleaned = UNSAFE_CHARS.replace_all(last, "_");
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        format!("image.{}", kind.extension())
    } else {
        cleaned.to_string()
    }
}
