//! Fetch through the remote proxy endpoint

use async_trait::async_trait;
use url::Url;

use super::{build_http_client, response_text, FetchError, FetchRequest, RemoteFetcher};
use crate::config::FetchConfig;

/// Fetcher that asks a proxy service to retrieve URLs on our behalf.
///
/// The proxy receives `{"url": ..., "action": ...}` as JSON and answers with
/// the raw text of the remote resource.
pub struct ProxyFetcher {
    http_client: reqwest::Client,
    endpoint: Url,
}

impl ProxyFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let endpoint = Url::parse(&config.proxy_url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", config.proxy_url, e)))?;

        Ok(Self {
            http_client: build_http_client(config)?,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl RemoteFetcher for ProxyFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<String, FetchError> {
        tracing::debug!("Proxy fetch {:?} {}", request.action, request.url);

        let response = self
            .http_client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;

        response_text(&request.url, response).await
    }

    fn name(&self) -> &str {
        "proxy"
    }
}
