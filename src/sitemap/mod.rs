//! Sitemap resolution
//!
//! Turns a site descriptor into a sitemap tree: the platform's endpoint set
//! is fetched concurrently, each document parsed (XML first, HTML table as
//! fallback) and filtered to URLs under the site's base URL.
//!
//! A failing endpoint degrades to an empty category instead of failing the
//! whole resolution. The only error surfaced to callers is an unsupported
//! platform type, for which no endpoint set exists.

mod endpoints;
mod parse;

pub use endpoints::{EndpointCatalog, SitemapEndpoint};
pub use parse::{parse_html_table, parse_lastmod, parse_sitemap, parse_xml};

use futures::future::join_all;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::fetch::{FetchError, FetchRequest, RemoteFetcher};
use crate::types::{Site, SitemapEntry, SitemapTree};

/// Errors that can occur while resolving sitemaps
#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("Unsupported site type: {0}")]
    UnsupportedSiteType(String),
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("Sitemap parse error: {0}")]
    Parse(String),
}

/// Resolves sitemap trees through the remote fetcher
pub struct SitemapResolver {
    fetcher: Arc<dyn RemoteFetcher>,
    catalog: EndpointCatalog,
}

impl SitemapResolver {
    pub fn new(fetcher: Arc<dyn RemoteFetcher>, catalog: EndpointCatalog) -> Self {
        Self { fetcher, catalog }
    }

    pub fn catalog(&self) -> &EndpointCatalog {
        &self.catalog
    }

    /// The exact endpoint set queried for a site
    pub fn endpoints_for(&self, site: &Site) -> Result<Vec<SitemapEndpoint>, SitemapError> {
        self.catalog
            .endpoints_for(site)
            .ok_or_else(|| SitemapError::UnsupportedSiteType(site.site_type.to_string()))
    }

    /// Resolve the sitemap tree of a site.
    ///
    /// Every endpoint is attempted; failed endpoints yield an empty category.
    pub async fn resolve_sitemap(&self, site: &Site) -> Result<SitemapTree, SitemapError> {
        let endpoints = self.endpoints_for(site)?;

        info!(
            "Resolving sitemap for {} ({} endpoints)",
            site.display_name(),
            endpoints.len()
        );

        let results = join_all(
            endpoints
                .iter()
                .map(|endpoint| self.resolve_endpoint(site, endpoint)),
        )
        .await;

        let mut tree = SitemapTree::new();
        for (endpoint, entries) in endpoints.into_iter().zip(results) {
            tree.append(endpoint.category, entries);
        }

        info!(
            "Resolved {} sitemap entries for {}",
            tree.len(),
            site.display_name()
        );

        Ok(tree)
    }

    async fn resolve_endpoint(&self, site: &Site, endpoint: &SitemapEndpoint) -> Vec<SitemapEntry> {
        match self.fetch_endpoint(site, endpoint).await {
            Ok(entries) => {
                debug!("{}: {} entries", endpoint.url, entries.len());
                entries
            }
            Err(e) => {
                warn!("Error processing sitemap {}: {}", endpoint.url, e);
                Vec::new()
            }
        }
    }

    async fn fetch_endpoint(
        &self,
        site: &Site,
        endpoint: &SitemapEndpoint,
    ) -> Result<Vec<SitemapEntry>, SitemapError> {
        let page_url = Url::parse(&endpoint.url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", endpoint.url, e)))?;

        let text = self
            .fetcher
            .fetch(&FetchRequest::sitemap(endpoint.url.as_str()))
            .await?;

        let entries = parse_sitemap(&text, &page_url)?;
        let total = entries.len();
        let kept: Vec<SitemapEntry> = entries
            .into_iter()
            .filter(|entry| site.owns_url(&entry.url))
            .collect();

        if kept.len() < total {
            debug!(
                "{}: discarded {} entries outside {}",
                endpoint.url,
                total - kept.len(),
                site.clean_base_url()
            );
        }

        Ok(kept)
    }
}
