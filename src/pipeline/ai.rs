//! AI backends: the vision call and the image generation call.
//!
//! The pipeline only sees the [`ColoringAi`] trait. The production
//! implementation, [`OpenAiColoring`], splits the two calls across two
//! clients:
//!
//! * **describe** goes through `edgequake-llm`, so any vision-capable
//!   provider it knows (OpenAI, Azure, Gemini, ...) can be selected by name.
//! * **generate** is a plain JSON POST to an OpenAI-compatible
//!   `/images/generations` endpoint via [`ImageGenerator`]; `edgequake-llm`
//!   only models chat and embeddings.
//!
//! Neither call sets its own deadline. The pipeline wraps each one in
//! `tokio::time::timeout`, and dropping the future aborts the request.

use crate::config::ServiceConfig;
use crate::error::{AiError, ColoringError};
use crate::pipeline::encode::encode_upload;
use crate::prompts::DESCRIBE_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Longest error body kept from a failed API response.
const MAX_ERROR_BODY: usize = 500;

/// The two model calls a coloring page needs.
#[async_trait]
pub trait ColoringAi: Send + Sync {
    /// Describe the photo in words suitable for an outline drawing.
    async fn describe(&self, image: &[u8], mime: &str) -> Result<String, AiError>;

    /// Generate outline images for `prompt`; returns every URL the service
    /// handed back, in order.
    async fn generate(&self, prompt: &str) -> Result<Vec<String>, AiError>;
}

// ── Image generation client ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    data: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    #[serde(default)]
    url: Option<String>,
}

/// Client for an OpenAI-compatible image generation endpoint.
#[derive(Clone)]
pub struct ImageGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    size: String,
}

impl ImageGenerator {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: impl Into<String>,
        size: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/images/generations", base_url.trim_end_matches('/')),
            api_key,
            model: model.into(),
            size: size.into(),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            &config.images_base_url,
            config.api_key.clone(),
            config.image_model.clone(),
            config.image_size.clone(),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Request a single image and return the URLs in the response.
    pub async fn generate(&self, prompt: &str) -> Result<Vec<String>, AiError> {
        let body = GenerationRequest {
            model: &self.model,
            prompt,
            n: 1,
            size: &self.size,
            response_format: "url",
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!("POST {} (model={}, size={})", self.endpoint, self.model, self.size);
        let response = request
            .send()
            .await
            .map_err(|e| AiError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AiError::Api {
                status: status.as_u16(),
                body: truncate(&text, MAX_ERROR_BODY),
            });
        }

        let parsed: GenerationResponse = response
            .json()
            .await
            .map_err(|e| AiError::Malformed(e.to_string()))?;

        Ok(parsed.data.into_iter().filter_map(|img| img.url).collect())
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max).collect();
        out.push('…');
        out
    }
}

// ── OpenAI-backed implementation ─────────────────────────────────────────

/// Production [`ColoringAi`]: vision via `edgequake-llm`, generation via
/// [`ImageGenerator`].
pub struct OpenAiColoring {
    vision: Arc<dyn LLMProvider>,
    images: ImageGenerator,
    describe_max_tokens: usize,
}

impl OpenAiColoring {
    pub fn new(
        vision: Arc<dyn LLMProvider>,
        images: ImageGenerator,
        describe_max_tokens: usize,
    ) -> Self {
        Self {
            vision,
            images,
            describe_max_tokens,
        }
    }

    /// Build both clients from the service configuration.
    ///
    /// The vision provider reads its own credentials from the environment
    /// (`OPENAI_API_KEY` for "openai"); the images API key must be set on
    /// the config.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ColoringError> {
        if config.api_key.is_none() {
            return Err(ColoringError::InvalidConfig(
                "an API key is required for image generation (set OPENAI_API_KEY)".into(),
            ));
        }

        let vision =
            ProviderFactory::create_llm_provider(&config.vision_provider, &config.vision_model)
                .map_err(|e| {
                    ColoringError::InvalidConfig(format!(
                        "vision provider '{}' not available: {e}",
                        config.vision_provider
                    ))
                })?;

        info!(
            "AI backend: vision={}/{} images={} ({})",
            config.vision_provider, config.vision_model, config.image_model, config.images_base_url
        );

        Ok(Self::new(
            vision,
            ImageGenerator::from_config(config),
            config.describe_max_tokens,
        ))
    }
}

#[async_trait]
impl ColoringAi for OpenAiColoring {
    async fn describe(&self, image: &[u8], mime: &str) -> Result<String, AiError> {
        let messages = vec![ChatMessage::user_with_images(
            DESCRIBE_PROMPT,
            vec![encode_upload(image, mime)],
        )];
        let options = CompletionOptions {
            temperature: Some(0.2),
            max_tokens: Some(self.describe_max_tokens),
            ..Default::default()
        };

        let response = self
            .vision
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| AiError::Provider(e.to_string()))?;

        debug!(
            "Vision call: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }

    async fn generate(&self, prompt: &str) -> Result<Vec<String>, AiError> {
        self.images.generate(prompt).await
    }
}
