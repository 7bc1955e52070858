//! The request pipeline: one upload in, one coloring page out.
//!
//! [`ColoringPipeline::run`] drives a job through every [`Stage`] in order.
//! Each step either advances the job or ends it; nothing is retried and
//! nothing runs in parallel within a job. Independent jobs share the
//! pipeline freely since it holds no per-request state.
//!
//! The two AI calls are wrapped in `tokio::time::timeout`. When the
//! deadline passes the in-flight call is dropped, which cancels it, and the
//! job fails with [`ColoringError::Timeout`].

use crate::config::ServiceConfig;
use crate::error::{AiError, AiStage, ColoringError};
use crate::job::JobId;
use crate::output::{ColoringOutput, StageTimings};
use crate::pipeline::ai::ColoringAi;
use crate::pipeline::{fetch, render};
use crate::progress::{SharedObserver, Stage};
use crate::prompts::generation_prompt;
use crate::store::{self, FileStore};
use crate::upload::UploadedImage;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Everything a job needs. Shared across requests behind an `Arc`.
pub struct ColoringPipeline {
    ai: Arc<dyn ColoringAi>,
    store: FileStore,
    http: reqwest::Client,
    config: ServiceConfig,
    observer: Option<SharedObserver>,
}

impl ColoringPipeline {
    pub fn new(
        ai: Arc<dyn ColoringAi>,
        store: FileStore,
        config: ServiceConfig,
    ) -> Result<Self, ColoringError> {
        Ok(Self {
            ai,
            store,
            http: fetch::download_client()?,
            config,
            observer: None,
        })
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Process one upload end to end.
    ///
    /// On failure, files written by earlier stages stay where they are.
    pub async fn run(&self, upload: UploadedImage) -> Result<ColoringOutput, ColoringError> {
        let id = JobId::new();
        let mut reached = Stage::Received;
        info!("[{}] Received '{}' ({} bytes)", id, upload.file_name, upload.bytes.len());
        self.notify(&id, Stage::Received);

        match self.run_stages(&id, upload, &mut reached).await {
            Ok(output) => {
                self.advance(&id, Stage::Responded, &mut reached);
                info!("[{}] Done in {}ms", id, output.stats.total_ms);
                Ok(output)
            }
            Err(e) => {
                warn!("[{}] Failed after '{}': {}", id, reached, e);
                if let Some(obs) = &self.observer {
                    obs.on_failure(&id, reached, &e);
                }
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        id: &JobId,
        upload: UploadedImage,
        reached: &mut Stage,
    ) -> Result<ColoringOutput, ColoringError> {
        let total_start = Instant::now();
        let mut stats = StageTimings::default();

        // ── Step 1: Validate and persist the original ────────────────────
        let kind = upload.validate(self.config.max_upload_bytes)?;
        let stored_name = upload.stored_name(kind);
        let original_path = self.store.save_upload(id, &stored_name, &upload.bytes).await?;
        self.advance(id, Stage::Validated, reached);

        // ── Step 2: Describe ─────────────────────────────────────────────
        let start = Instant::now();
        let description = bounded(
            AiStage::Describe,
            self.config.describe_timeout_secs,
            self.ai.describe(&upload.bytes, kind.mime()),
        )
        .await?;
        let description = description.trim().to_string();
        if description.is_empty() {
            return Err(ColoringError::EmptyDescription);
        }
        stats.describe_ms = elapsed_ms(start);
        debug!("[{}] Description ({} chars): {}", id, description.len(), description);
        self.advance(id, Stage::Described, reached);

        // ── Step 3: Generate ─────────────────────────────────────────────
        let start = Instant::now();
        let prompt = generation_prompt(&description);
        let urls = bounded(
            AiStage::Generate,
            self.config.generate_timeout_secs,
            self.ai.generate(&prompt),
        )
        .await?;
        let image_url = select_image_url(&urls).ok_or(ColoringError::EmptyGeneration)?;
        stats.generate_ms = elapsed_ms(start);
        self.advance(id, Stage::Generated, reached);

        // ── Step 4: Fetch ────────────────────────────────────────────────
        let start = Instant::now();
        let image_bytes = fetch::fetch_image(&self.http, image_url).await?;
        let processed_path = self.store.save_processed(id, &image_bytes).await?;
        stats.fetch_ms = elapsed_ms(start);
        self.advance(id, Stage::Fetched, reached);

        // ── Step 5: Render ───────────────────────────────────────────────
        let start = Instant::now();
        let pdf_path = render::render_pdf(image_bytes, self.store.pdf_path(id)).await?;
        stats.render_ms = elapsed_ms(start);
        self.advance(id, Stage::Rendered, reached);

        stats.total_ms = elapsed_ms(total_start);
        Ok(ColoringOutput {
            id: *id,
            original_url: store::upload_url(id, &stored_name),
            processed_url: store::processed_url(id),
            pdf_download_url: store::download_url(id),
            original_path,
            processed_path,
            pdf_path,
            description,
            stats,
        })
    }

    fn advance(&self, id: &JobId, stage: Stage, reached: &mut Stage) {
        *reached = stage;
        info!("[{}] → {}", id, stage);
        self.notify(id, stage);
    }

    fn notify(&self, id: &JobId, stage: Stage) {
        if let Some(obs) = &self.observer {
            obs.on_stage(id, stage);
        }
    }
}

/// Run an AI call under a hard deadline of `secs` seconds.
async fn bounded<T>(
    stage: AiStage,
    secs: u64,
    call: impl Future<Output = Result<T, AiError>>,
) -> Result<T, ColoringError> {
    match tokio::time::timeout(Duration::from_secs(secs), call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(ColoringError::Ai { stage, source }),
        Err(_) => Err(ColoringError::Timeout { stage, secs }),
    }
}

/// The first http(s) URL in the generation result, if any.
fn select_image_url(urls: &[String]) -> Option<&str> {
    urls.iter().map(|u| u.trim()).find(|u| fetch::is_url(u))
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
