//! In-process fetcher serving canned responses
//!
//! Used to replay a site from fixtures and to drive the pipeline in tests
//! without network access.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use super::{FetchError, FetchRequest, RemoteFetcher};

/// Fetcher backed by an in-memory URL → response table.
///
/// URLs without a registered response answer with HTTP 404.
#[derive(Default)]
pub struct MemoryFetcher {
    responses: Mutex<HashMap<String, Result<String, u16>>>,
    requests: Mutex<Vec<FetchRequest>>,
    delay: Option<Duration>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response, so concurrent fetches interleave
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Serve `body` for `url`
    pub fn insert(&self, url: impl Into<String>, body: impl Into<String>) {
        self.responses.lock().insert(url.into(), Ok(body.into()));
    }

    /// Answer `url` with an HTTP error status
    pub fn fail(&self, url: impl Into<String>, status: u16) {
        self.responses.lock().insert(url.into(), Err(status));
    }

    /// Every request received so far, in arrival order
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests received for `url`
    pub fn request_count(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.url == url).count()
    }
}

#[async_trait]
impl RemoteFetcher for MemoryFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<String, FetchError> {
        self.requests.lock().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = self.responses.lock().get(&request.url).cloned();
        match response {
            Some(Ok(body)) => Ok(body),
            Some(Err(status)) => Err(FetchError::Status {
                url: request.url.clone(),
                status,
            }),
            None => Err(FetchError::Status {
                url: request.url.clone(),
                status: 404,
            }),
        }
    }

    fn name(&self) -> &str {
        "memory"
    }
}
