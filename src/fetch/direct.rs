//! Direct HTTP fetching

use async_trait::async_trait;
use url::Url;

use super::{build_http_client, response_text, FetchError, FetchRequest, RemoteFetcher};
use crate::config::FetchConfig;

/// Fetcher that GETs source URLs directly
pub struct DirectFetcher {
    http_client: reqwest::Client,
}

impl DirectFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        Ok(Self {
            http_client: build_http_client(config)?,
        })
    }
}

#[async_trait]
impl RemoteFetcher for DirectFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<String, FetchError> {
        let url = Url::parse(&request.url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", request.url, e)))?;

        tracing::debug!("GET {}", url);
        let response = self.http_client.get(url).send().await?;

        response_text(&request.url, response).await
    }

    fn name(&self) -> &str {
        "direct"
    }
}
