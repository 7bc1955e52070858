//! Service configuration.
//!
//! Everything the pipeline and gateway need is held in one
//! [`ServiceConfig`], built through [`ServiceConfigBuilder`]. The binary maps
//! its CLI flags (each with an environment-variable fallback) onto the
//! builder; tests build configs directly.

use crate::error::ColoringError;
use crate::upload::DEFAULT_MAX_UPLOAD_BYTES;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the coloring-page service.
///
/// # Example
/// ```rust
/// use coloring_page::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .upload_dir("/var/lib/coloring/uploads")
///     .processed_dir("/var/lib/coloring/processed")
///     .describe_timeout_secs(20)
///     .build()
///     .unwrap();
/// assert_eq!(config.generate_timeout_secs, 60);
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    /// Directory for original uploads. Default: `uploads`.
    pub upload_dir: PathBuf,

    /// Directory for generated images and PDFs. Default: `processed`.
    pub processed_dir: PathBuf,

    /// Largest accepted upload in bytes. Default: 10 MiB.
    pub max_upload_bytes: u64,

    /// Hard ceiling on the vision call in seconds. Default: 30.
    pub describe_timeout_secs: u64,

    /// Hard ceiling on the generation call in seconds. Default: 60.
    pub generate_timeout_secs: u64,

    /// `edgequake-llm` provider name for the vision call. Default: "openai".
    pub vision_provider: String,

    /// Vision model id. Default: "gpt-4o".
    pub vision_model: String,

    /// Token budget for the description. Default: 300.
    pub describe_max_tokens: usize,

    /// Image generation model id. Default: "dall-e-3".
    pub image_model: String,

    /// Requested output size. Default: "1024x1024" (square).
    pub image_size: String,

    /// Base URL of the images API. Default: "https://api.openai.com/v1".
    pub images_base_url: String,

    /// Bearer token for the images API.
    pub api_key: Option<String>,

    /// Delete artifacts older than this. Default: None (keep forever).
    pub retention: Option<Duration>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            processed_dir: PathBuf::from("processed"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            describe_timeout_secs: 30,
            generate_timeout_secs: 60,
            vision_provider: "openai".to_string(),
            vision_model: "gpt-4o".to_string(),
            describe_max_tokens: 300,
            image_model: "dall-e-3".to_string(),
            image_size: "1024x1024".to_string(),
            images_base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            retention: None,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("upload_dir", &self.upload_dir)
            .field("processed_dir", &self.processed_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("describe_timeout_secs", &self.describe_timeout_secs)
            .field("generate_timeout_secs", &self.generate_timeout_secs)
            .field("vision_provider", &self.vision_provider)
            .field("vision_model", &self.vision_model)
            .field("describe_max_tokens", &self.describe_max_tokens)
            .field("image_model", &self.image_model)
            .field("image_size", &self.image_size)
            .field("images_base_url", &self.images_base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("retention", &self.retention)
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn describe_timeout(&self) -> Duration {
        Duration::from_secs(self.describe_timeout_secs)
    }

    pub fn generate_timeout(&self) -> Duration {
        Duration::from_secs(self.generate_timeout_secs)
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn processed_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.processed_dir = dir.into();
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn describe_timeout_secs(mut self, secs: u64) -> Self {
        self.config.describe_timeout_secs = secs;
        self
    }

    pub fn generate_timeout_secs(mut self, secs: u64) -> Self {
        self.config.generate_timeout_secs = secs;
        self
    }

    pub fn vision_provider(mut self, name: impl Into<String>) -> Self {
        self.config.vision_provider = name.into();
        self
    }

    pub fn vision_model(mut self, model: impl Into<String>) -> Self {
        self.config.vision_model = model.into();
        self
    }

    pub fn describe_max_tokens(mut self, n: usize) -> Self {
        self.config.describe_max_tokens = n.max(16);
        self
    }

    pub fn image_model(mut self, model: impl Into<String>) -> Self {
        self.config.image_model = model.into();
        self
    }

    pub fn image_size(mut self, size: impl Into<String>) -> Self {
        self.config.image_size = size.into();
        self
    }

    pub fn images_base_url(mut self, url: impl Into<String>) -> Self {
        let url: String = url.into();
        self.config.images_base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        let key: String = key.into();
        self.config.api_key = if key.is_empty() { None } else { Some(key) };
        self
    }

    pub fn retention(mut self, max_age: Option<Duration>) -> Self {
        self.config.retention = max_age;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, ColoringError> {
        let c = &self.config;
        if c.max_upload_bytes == 0 {
            return Err(ColoringError::InvalidConfig(
                "max upload size must be > 0".into(),
            ));
        }
        if c.describe_timeout_secs == 0 || c.generate_timeout_secs == 0 {
            return Err(ColoringError::InvalidConfig(
                "AI call timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.upload_dir == c.processed_dir {
            return Err(ColoringError::InvalidConfig(format!(
                "upload and processed directories must differ (both '{}')",
                c.upload_dir.display()
            )));
        }
        if !is_square_size(&c.image_size) {
            return Err(ColoringError::InvalidConfig(format!(
                "image size must be square WxH, got '{}'",
                c.image_size
            )));
        }
        if c.retention == Some(Duration::ZERO) {
            return Err(ColoringError::InvalidConfig(
                "retention must be > 0 when set".into(),
            ));
        }
        Ok(self.config)
    }
}

fn is_square_size(size: &str) -> bool {
    match size.split_once('x') {
        Some((w, h)) => match (w.parse::<u32>(), h.parse::<u32>()) {
            (Ok(w), Ok(h)) => w > 0 && w == h,
            _ => false,
        },
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_contract() {
        let c = ServiceConfig::default();
        assert_eq!(c.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(c.describe_timeout(), Duration::from_secs(30));
        assert_eq!(c.generate_timeout(), Duration::from_secs(60));
        assert_eq!(c.image_size, "1024x1024");
        assert!(c.retention.is_none());
    }

    #[test]
    fn builder_rejects_zero_timeouts() {
        let err = ServiceConfig::builder()
            .describe_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ColoringError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_shared_directories() {
        let err = ServiceConfig::builder()
            .upload_dir("data")
            .processed_dir("data")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn builder_rejects_non_square_size() {
        assert!(ServiceConfig::builder().image_size("1792x1024").build().is_err());
        assert!(ServiceConfig::builder().image_size("big").build().is_err());
        assert!(ServiceConfig::builder().image_size("512x512").build().is_ok());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let c = ServiceConfig::builder()
            .images_base_url("http://localhost:9000/v1/")
            .build()
            .unwrap();
        assert_eq!(c.images_base_url, "http://localhost:9000/v1");
    }

    #[test]
    fn empty_api_key_is_none() {
        let c = ServiceConfig::builder().api_key("").build().unwrap();
        assert!(c.api_key.is_none());
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = ServiceConfig::builder().api_key("sk-secret").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
