//! Fetch the generated outline from the URL the images API returned.
//!
//! Result URLs point at a short-lived CDN object. Redirects are not
//! followed: the URL we were given is the URL we download, and anything
//! else is reported as a failed download. The body is read as a stream so
//! a large image never sits in an intermediate buffer twice.

use crate::error::ColoringError;
use futures::StreamExt;
use tracing::{debug, info};

/// Upper bound on the buffer reserved up front from `Content-Length`.
const MAX_PREALLOC_BYTES: u64 = 16 * 1024 * 1024;

/// Check if the string looks like an http(s) URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// HTTP client used for image downloads.
pub fn download_client() -> Result<reqwest::Client, ColoringError> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| ColoringError::Internal(format!("failed to build HTTP client: {e}")))
}

/// Download `url` fully into memory.
///
/// Non-2xx responses (redirects included) and empty bodies are
/// [`ColoringError::DownloadFailed`].
pub async fn fetch_image(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, ColoringError> {
    if !is_url(url) {
        return Err(ColoringError::InvalidUrl {
            url: url.to_string(),
        });
    }

    let failed = |reason: String| ColoringError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    info!("Fetching generated image from: {}", url);
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| failed(e.to_string()))?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    // Content-Length is only a hint; the body may be shorter or a lie.
    let hint = response.content_length().unwrap_or(0).min(MAX_PREALLOC_BYTES);
    let mut bytes = Vec::with_capacity(hint as usize);
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| failed(e.to_string()))?;
        bytes.extend_from_slice(&chunk);
    }

    if bytes.is_empty() {
        return Err(failed("empty response body".into()));
    }

    debug!("Fetched {} bytes", bytes.len());
    Ok(bytes)
}
