//! Result types returned by a successful pipeline run.

use crate::job::JobId;
use serde::Serialize;
use std::path::PathBuf;

/// Everything produced for one upload.
#[derive(Debug, Clone, Serialize)]
pub struct ColoringOutput {
    pub id: JobId,

    /// Server-relative URL of the stored original, e.g. `/uploads/<id>-cat.png`.
    pub original_url: String,
    /// Server-relative URL of the generated outline image.
    pub processed_url: String,
    /// Server-relative URL of the PDF download route.
    pub pdf_download_url: String,

    pub original_path: PathBuf,
    pub processed_path: PathBuf,
    pub pdf_path: PathBuf,

    /// What the vision model saw, as sent to the generator.
    pub description: String,

    pub stats: StageTimings,
}

/// Wall-clock time spent in each stage, in milliseconds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageTimings {
    pub describe_ms: u64,
    pub generate_ms: u64,
    pub fetch_ms: u64,
    pub render_ms: u64,
    pub total_ms: u64,
}
