//! HTTP server binary for the coloring-page service.
//!
//! Maps CLI flags (each with an environment fallback) onto `ServiceConfig`,
//! wires the OpenAI-backed pipeline into the axum router and serves until
//! Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use coloring_page::{router, ColoringPipeline, FileStore, OpenAiColoring, ServiceConfig};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"ENVIRONMENT:
  OPENAI_API_KEY       Required. Used by the vision provider and the images API.
  RUST_LOG             Overrides the log filter (e.g. RUST_LOG=coloring_page=debug).

  A .env file in the working directory is loaded before flags are parsed.

EXAMPLES:
  coloring-server
  PORT=8080 coloring-server --upload-dir /data/uploads --processed-dir /data/processed
  coloring-server --retention-hours 24 --verbose
"#;

/// Turn photos into printable coloring pages.
#[derive(Parser, Debug)]
#[command(
    name = "coloring-server",
    version,
    about = "Serve the AI coloring page generator over HTTP",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Address to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(short, long, env = "PORT", default_value_t = 5001)]
    port: u16,

    /// Directory for original uploads.
    #[arg(long, env = "COLORING_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Directory for generated images and PDFs.
    #[arg(long, env = "COLORING_PROCESSED_DIR", default_value = "processed")]
    processed_dir: PathBuf,

    /// Largest accepted upload, in MiB.
    #[arg(long, env = "COLORING_MAX_UPLOAD_MB", default_value_t = 10,
          value_parser = clap::value_parser!(u64).range(1..=100))]
    max_upload_mb: u64,

    /// Vision call timeout in seconds.
    #[arg(long, env = "COLORING_DESCRIBE_TIMEOUT", default_value_t = 30)]
    describe_timeout: u64,

    /// Image generation timeout in seconds.
    #[arg(long, env = "COLORING_GENERATE_TIMEOUT", default_value_t = 60)]
    generate_timeout: u64,

    /// edgequake-llm provider for the vision call.
    #[arg(long, env = "COLORING_VISION_PROVIDER", default_value = "openai")]
    vision_provider: String,

    /// Vision model id.
    #[arg(long, env = "COLORING_VISION_MODEL", default_value = "gpt-4o")]
    vision_model: String,

    /// Image generation model id.
    #[arg(long, env = "COLORING_IMAGE_MODEL", default_value = "dall-e-3")]
    image_model: String,

    /// Square output size, WxH.
    #[arg(long, env = "COLORING_IMAGE_SIZE", default_value = "1024x1024")]
    image_size: String,

    /// Base URL of the OpenAI-compatible images API.
    #[arg(long, env = "COLORING_IMAGES_BASE_URL", default_value = "https://api.openai.com/v1")]
    images_base_url: String,

    /// API key for the images API.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Delete stored files older than this many hours. Off by default.
    #[arg(long, env = "COLORING_RETENTION_HOURS",
          value_parser = clap::value_parser!(u64).range(1..))]
    retention_hours: Option<u64>,

    /// Debug-level logging.
    #[arg(short, long, env = "COLORING_VERBOSE")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Configuration ────────────────────────────────────────────────────
    let config = build_config(&cli).context("Invalid configuration")?;
    info!("Configuration: {:?}", config);

    let store = FileStore::open(&config.upload_dir, &config.processed_dir)
        .await
        .context("Failed to prepare storage directories")?;
    let ai = OpenAiColoring::from_config(&config).context("Failed to set up AI backend")?;
    let pipeline = Arc::new(
        ColoringPipeline::new(Arc::new(ai), store.clone(), config.clone())
            .context("Failed to build pipeline")?,
    );

    // ── Retention sweeper ────────────────────────────────────────────────
    if let Some(max_age) = config.retention {
        spawn_sweeper(store, max_age);
    }

    // ── Serve ────────────────────────────────────────────────────────────
    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", cli.host, cli.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("🎨 AI Coloring Page Generator listening on http://{}", addr);
    axum::serve(listener, router(pipeline))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

fn build_config(cli: &Cli) -> Result<ServiceConfig> {
    let mut builder = ServiceConfig::builder()
        .upload_dir(&cli.upload_dir)
        .processed_dir(&cli.processed_dir)
        .max_upload_bytes(cli.max_upload_mb * 1024 * 1024)
        .describe_timeout_secs(cli.describe_timeout)
        .generate_timeout_secs(cli.generate_timeout)
        .vision_provider(&cli.vision_provider)
        .vision_model(&cli.vision_model)
        .image_model(&cli.image_model)
        .image_size(&cli.image_size)
        .images_base_url(&cli.images_base_url)
        .retention(cli.retention_hours.map(|h| Duration::from_secs(h * 3600)));
    if let Some(key) = &cli.api_key {
        builder = builder.api_key(key);
    }
    Ok(builder.build()?)
}

/// Sweep both directories once per hour, or once per `max_age` if shorter.
fn spawn_sweeper(store: FileStore, max_age: Duration) {
    let period = max_age.min(Duration::from_secs(3600));
    info!("Retention: deleting files older than {:?} (checked every {:?})", max_age, period);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if let Err(e) = store.sweep(max_age).await {
                error!("Retention sweep failed: {}", e);
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
