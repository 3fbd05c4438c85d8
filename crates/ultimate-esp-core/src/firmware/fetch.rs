//! Firmware and catalog downloads

use std::io;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while fetching a firmware image or the catalog
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("{0}")]
    Request(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Source of firmware payloads and catalogs.
///
/// A fetch either yields the complete body or fails; partial bodies are never
/// returned.
#[allow(async_fn_in_trait)]
pub trait FirmwareFetcher {
    /// Fetch the complete resource at `url`
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Fetcher for `http(s)://` URLs, `file://` URLs and plain filesystem paths
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with its own HTTP client
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("UltimateESP/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client }
    }

    /// Create a fetcher sharing an existing HTTP client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Local path designated by `url`, if it is not a network URL
fn local_path(url: &str) -> Option<&Path> {
    if let Some(path) = url.strip_prefix("file://") {
        return Some(Path::new(path));
    }
    if url.contains("://") {
        return None;
    }
    Some(Path::new(url))
}

impl FirmwareFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if let Some(path) = local_path(url) {
            tracing::debug!("fetch: reading {}", path.display());
            return Ok(tokio::fs::read(path).await?);
        }

        tracing::debug!("fetch: GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        Ok(body.to_vec())
    }
}
