//! Flat-file artifact store.
//!
//! Two directories, shared by every request:
//!
//! ```text
//! uploads/<id>-<filename>            original upload
//! processed/<id>-processed.png       AI-generated outline
//! processed/<id>-coloring-page.pdf   printable page
//! ```
//!
//! Paths are pure functions of the [`JobId`], so two requests can never
//! address the same file. Writes use `create_new`, which turns an
//! accidental second write for the same id into an error instead of a
//! silent overwrite.

use crate::error::ColoringError;
use crate::job::JobId;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// URL prefix the uploads directory is served under.
pub const UPLOADS_PREFIX: &str = "/uploads";
/// URL prefix the processed directory is served under.
pub const PROCESSED_PREFIX: &str = "/processed";
/// URL prefix of the PDF download route.
pub const DOWNLOAD_PREFIX: &str = "/download";

#[derive(Debug, Clone)]
pub struct FileStore {
    uploads: PathBuf,
    processed: PathBuf,
}

impl FileStore {
    /// Open the store, creating both directories if needed.
    pub async fn open(
        uploads: impl Into<PathBuf>,
        processed: impl Into<PathBuf>,
    ) -> Result<Self, ColoringError> {
        let store = Self {
            uploads: uploads.into(),
            processed: processed.into(),
        };
        for dir in [&store.uploads, &store.processed] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| ColoringError::io(dir, e))?;
        }
        debug!(
            "File store ready: uploads={} processed={}",
            store.uploads.display(),
            store.processed.display()
        );
        Ok(store)
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads
    }

    pub fn processed_dir(&self) -> &Path {
        &self.processed
    }

    /// `<id>-<stored_name>`, the file name of an original upload.
    pub fn upload_file_name(id: &JobId, stored_name: &str) -> String {
        format!("{id}-{stored_name}")
    }

    pub fn upload_path(&self, id: &JobId, stored_name: &str) -> PathBuf {
        self.uploads.join(Self::upload_file_name(id, stored_name))
    }

    pub fn processed_image_path(&self, id: &JobId) -> PathBuf {
        self.processed.join(format!("{id}-processed.png"))
    }

    pub fn pdf_path(&self, id: &JobId) -> PathBuf {
        self.processed.join(format!("{id}-coloring-page.pdf"))
    }

    /// Persist the original upload. Returns the written path.
    pub async fn save_upload(
        &self,
        id: &JobId,
        stored_name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, ColoringError> {
        let path = self.upload_path(id, stored_name);
        write_new(&path, bytes).await?;
        Ok(path)
    }

    /// Persist the fetched outline image. Returns the written path.
    pub async fn save_processed(&self, id: &JobId, bytes: &[u8]) -> Result<PathBuf, ColoringError> {
        let path = self.processed_image_path(id);
        write_new(&path, bytes).await?;
        Ok(path)
    }

    /// Path of the finished PDF for `id`, if one exists.
    pub async fn find_pdf(&self, id: &JobId) -> Option<PathBuf> {
        let path = self.pdf_path(id);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }

    /// Delete every file in both directories last modified more than
    /// `max_age` ago. Returns how many files were removed.
    ///
    /// Per-file failures are logged and skipped; only an unreadable
    /// directory is an error.
    pub async fn sweep(&self, max_age: Duration) -> Result<usize, ColoringError> {
        let now = SystemTime::now();
        let mut removed = 0;

        for dir in [&self.uploads, &self.processed] {
            let mut entries = tokio::fs::read_dir(dir)
                .await
                .map_err(|e| ColoringError::io(dir, e))?;

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| ColoringError::io(dir, e))?
            {
                let path = entry.path();
                let modified = match entry.metadata().await {
                    Ok(meta) if meta.is_file() => meta.modified(),
                    _ => continue,
                };
                let age = match modified {
                    Ok(t) => now.duration_since(t).unwrap_or_default(),
                    Err(_) => continue,
                };
                if age <= max_age {
                    continue;
                }
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => {
                        debug!("Swept {}", path.display());
                        removed += 1;
                    }
                    Err(e) => warn!("Failed to sweep {}: {}", path.display(), e),
                }
            }
        }

        if removed > 0 {
            info!("Retention sweep removed {} files", removed);
        }
        Ok(removed)
    }
}

/// Relative URL of an original upload.
pub fn upload_url(id: &JobId, stored_name: &str) -> String {
    format!("{UPLOADS_PREFIX}/{}", FileStore::upload_file_name(id, stored_name))
}

/// Relative URL of the processed image.
pub fn processed_url(id: &JobId) -> String {
    format!("{PROCESSED_PREFIX}/{id}-processed.png")
}

/// Relative URL of the PDF download.
pub fn download_url(id: &JobId) -> String {
    format!("{DOWNLOAD_PREFIX}/{id}")
}

async fn write_new(path: &Path, bytes: &[u8]) -> Result<(), ColoringError> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| ColoringError::io(path, e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| ColoringError::io(path, e))?;
    file.flush().await.map_err(|e| ColoringError::io(path, e))?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}
