//! Remote fetch collaborator
//!
//! Every network read of the mirror goes through [`RemoteFetcher`]: given a
//! URL and an action, return the raw response text. Two transports are
//! provided:
//! - `ProxyFetcher`: POSTs `{url, action}` to a fetch proxy (the browser
//!   deployment cannot read cross-origin pages directly)
//! - `DirectFetcher`: plain HTTP GET against the source site
//!
//! A non-2xx status is a hard failure for that single fetch only.

mod direct;
mod memory;
mod proxy;

pub use direct::DirectFetcher;
pub use memory::MemoryFetcher;
pub use proxy::ProxyFetcher;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{FetchConfig, FetchMode};

/// Errors that can occur during fetching
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("Failed to parse URL: {0}")]
    InvalidUrl(String),
}

/// What the fetched text will be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchAction {
    FetchSitemap,
    FetchDocument,
}

/// A single fetch request, also the proxy wire format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    pub action: FetchAction,
}

impl FetchRequest {
    pub fn sitemap(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            action: FetchAction::FetchSitemap,
        }
    }

    pub fn document(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            action: FetchAction::FetchDocument,
        }
    }
}

/// Fetch-by-URL capability consumed by the sitemap resolver and the cache
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    /// Fetch the raw response text for a request
    async fn fetch(&self, request: &FetchRequest) -> Result<String, FetchError>;

    /// Transport name for logging (e.g. "proxy", "direct")
    fn name(&self) -> &str;
}

/// Build the fetcher selected by configuration
pub fn build_fetcher(config: &FetchConfig) -> Result<Arc<dyn RemoteFetcher>, FetchError> {
    let fetcher: Arc<dyn RemoteFetcher> = match config.mode {
        FetchMode::Proxy => Arc::new(ProxyFetcher::new(config)?),
        FetchMode::Direct => Arc::new(DirectFetcher::new(config)?),
    };
    tracing::debug!("Using {} fetcher", fetcher.name());
    Ok(fetcher)
}

/// Shared reqwest client construction
pub(crate) fn build_http_client(config: &FetchConfig) -> Result<reqwest::Client, FetchError> {
    let client = reqwest::Client::builder()
        .pool_idle_timeout(Duration::from_secs(90))
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .user_agent(&config.user_agent)
        .gzip(true)
        .brotli(true)
        .build()?;
    Ok(client)
}

/// Turn a response into its text, treating non-2xx as a failure
pub(crate) async fn response_text(
    url: &str,
    response: reqwest::Response,
) -> Result<String, FetchError> {
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response.text().await?)
}
