//! # coloring-page
//!
//! Turn a photo into a printable coloring page.
//!
//! A photo is described by a vision model, the description is redrawn as a
//! black-and-white outline by an image model, and the outline is laid out on
//! a single A4 PDF page ready to print.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (PNG/JPEG ≤ 10 MiB)
//!  │
//!  ├─ 1. Validate   type + size, persist original          uploads/<id>-<name>
//!  ├─ 2. Describe   vision model, 30 s ceiling
//!  ├─ 3. Generate   image model, 60 s ceiling → URL
//!  ├─ 4. Fetch      download outline                        processed/<id>-processed.png
//!  └─ 5. Render     A4 PDF (spawn_blocking)                 processed/<id>-coloring-page.pdf
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use coloring_page::{ColoringPipeline, FileStore, OpenAiColoring, ServiceConfig, UploadedImage};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder()
//!         .api_key(std::env::var("OPENAI_API_KEY")?)
//!         .build()?;
//!     let store = FileStore::open(&config.upload_dir, &config.processed_dir).await?;
//!     let ai = Arc::new(OpenAiColoring::from_config(&config)?);
//!     let pipeline = ColoringPipeline::new(ai, store, config)?;
//!
//!     let photo = std::fs::read("cat.jpg")?;
//!     let output = pipeline.run(UploadedImage::new("cat.jpg", "image/jpeg", photo)).await?;
//!     println!("PDF at {}", output.pdf_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `coloring-server` binary (clap + anyhow + tracing-subscriber + dotenvy) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod gateway;
pub mod job;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompts;
pub mod store;
pub mod upload;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use error::{AiError, AiStage, ColoringError};
pub use gateway::router;
pub use job::JobId;
pub use output::{ColoringOutput, StageTimings};
pub use pipeline::ai::{ColoringAi, ImageGenerator, OpenAiColoring};
pub use process::ColoringPipeline;
pub use progress::{NoopObserver, Stage, StageObserver};
pub use store::FileStore;
pub use upload::{ImageKind, UploadedImage};
