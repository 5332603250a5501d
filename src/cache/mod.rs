//! Cache orchestration
//!
//! Drives the fetch → sanitize → store pipeline for sitemap URLs and keeps
//! the transient per-URL status map:
//!
//! ```text
//! unknown → loading → success | failed
//! success | failed → loading        (refetch)
//! any → success | not_found         (recheck against the store)
//! ```
//!
//! Concurrent requests for one URL share a single fetch. Batch runs are
//! tracked per site, so two sites can sync at once but one site cannot be
//! synced twice concurrently.

mod status;

pub use status::{CacheReport, CacheStatus, StatusChange};

use anyhow::Result;
use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::content::{extract_title, sanitize};
use crate::fetch::{FetchRequest, RemoteFetcher};
use crate::store::DocumentStore;
use crate::types::{Document, Site, SiteId};

/// Status event channel capacity; slow subscribers skip ahead
const STATUS_CHANNEL_CAPACITY: usize = 256;

/// Errors from batch caching runs
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Site {0} is already syncing")]
    AlreadySyncing(SiteId),
    #[error("Site {0} has no sitemap")]
    NoSitemap(SiteId),
}

/// Marks a site as syncing until dropped
pub struct SyncToken<'a> {
    syncing: &'a Mutex<HashSet<SiteId>>,
    site_id: SiteId,
}

impl SyncToken<'_> {
    pub fn site_id(&self) -> &str {
        &self.site_id
    }
}

impl Drop for SyncToken<'_> {
    fn drop(&mut self) {
        self.syncing.lock().remove(&self.site_id);
    }
}

/// Fetches, sanitizes and stores documents while tracking their status
pub struct CacheOrchestrator {
    fetcher: Arc<dyn RemoteFetcher>,
    documents: Arc<dyn DocumentStore>,
    statuses: DashMap<String, CacheStatus>,
    /// One lock per URL currently being fetched
    in_flight: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    syncing: Mutex<HashSet<SiteId>>,
    events: broadcast::Sender<StatusChange>,
}

impl CacheOrchestrator {
    pub fn new(fetcher: Arc<dyn RemoteFetcher>, documents: Arc<dyn DocumentStore>) -> Self {
        let (events, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            fetcher,
            documents,
            statuses: DashMap::new(),
            in_flight: DashMap::new(),
            syncing: Mutex::new(HashSet::new()),
            events,
        }
    }

    pub fn documents(&self) -> &Arc<dyn DocumentStore> {
        &self.documents
    }

    /// Current status of a URL
    pub fn status(&self, url: &str) -> CacheStatus {
        self.statuses
            .get(url)
            .map(|entry| *entry.value())
            .unwrap_or(CacheStatus::Unknown)
    }

    /// Snapshot of every known status
    pub fn statuses(&self) -> BTreeMap<String, CacheStatus> {
        self.statuses
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Stream of status transitions
    pub fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.events.subscribe()
    }

    fn set_status(&self, url: &str, status: CacheStatus) {
        self.statuses.insert(url.to_string(), status);
        // No subscribers is fine
        let _ = self.events.send(StatusChange {
            url: url.to_string(),
            status,
        });
    }

    /// Whether a batch run for the site is in progress
    pub fn is_caching(&self, site_id: &str) -> bool {
        self.syncing.lock().contains(site_id)
    }

    /// Whether any batch run is in progress
    pub fn caching_in_progress(&self) -> bool {
        !self.syncing.lock().is_empty()
    }

    /// Claim the site for a batch run
    pub fn begin_sync(&self, site_id: &str) -> Result<SyncToken<'_>, SyncError> {
        let mut syncing = self.syncing.lock();
        if !syncing.insert(site_id.to_string()) {
            return Err(SyncError::AlreadySyncing(site_id.to_string()));
        }
        Ok(SyncToken {
            syncing: &self.syncing,
            site_id: site_id.to_string(),
        })
    }

    /// Fetch, sanitize and store one URL.
    ///
    /// Never fails: errors are logged and leave the URL `Failed`. If the URL
    /// is already being fetched, waits for that fetch and reports its result.
    pub async fn cache_one(&self, site: &Site, url: &str, category: Option<&str>) -> CacheStatus {
        let slot = Arc::clone(self.in_flight.entry(url.to_string()).or_default().value());

        let guard = match slot.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("{} is already loading, waiting", url);
                let _finished = slot.lock().await;
                return self.status(url);
            }
        };

        self.set_status(url, CacheStatus::Loading);
        let status = match self.fetch_document(site, url, category).await {
            Ok(document) => {
                debug!("Cached {} ({} bytes)", url, document.content.len());
                CacheStatus::Success
            }
            Err(e) => {
                warn!("Failed to cache {}: {:#}", url, e);
                CacheStatus::Failed
            }
        };
        self.set_status(url, status);

        self.in_flight.remove(url);
        drop(guard);
        status
    }

    async fn fetch_document(
        &self,
        site: &Site,
        url: &str,
        category: Option<&str>,
    ) -> Result<Document> {
        let html = self.fetcher.fetch(&FetchRequest::document(url)).await?;

        let content = sanitize(&html, &site.base_url);
        let title = extract_title(&html).unwrap_or_else(|| url.to_string());

        let document = match self.documents.get_by_url(url)? {
            Some(mut existing) => {
                existing.content = content;
                existing.title = title;
                existing.site_id = Some(site.id.clone());
                if let Some(category) = category {
                    existing.category = Some(category.to_string());
                }
                existing.update_date = Utc::now();
                existing
            }
            None => {
                let document = Document::new(url, content, title).with_site(&site.id);
                match category {
                    Some(category) => document.with_category(category),
                    None => document,
                }
            }
        };

        self.documents.put_document(&document)?;
        Ok(document)
    }

    /// Cache every sitemap URL of a site not already cached.
    ///
    /// URLs are fetched concurrently, one attempt each.
    pub async fn cache_all(&self, site: &Site) -> Result<CacheReport, SyncError> {
        let token = self.begin_sync(&site.id)?;
        self.cache_site(site, &token).await
    }

    /// Batch run for a site already claimed by `token`
    pub async fn cache_site(
        &self,
        site: &Site,
        token: &SyncToken<'_>,
    ) -> Result<CacheReport, SyncError> {
        if site.sitemap_tree.is_none() {
            return Err(SyncError::NoSitemap(site.id.clone()));
        }
        debug_assert_eq!(token.site_id(), site.id);

        let mut report = CacheReport::default();
        let mut seen = HashSet::new();
        let mut pending = Vec::new();
        for (category, url) in site.sitemap_urls() {
            if !seen.insert(url.clone()) {
                continue;
            }
            if self.status(&url) == CacheStatus::Success {
                report.skipped += 1;
            } else {
                pending.push((category, url));
            }
        }

        info!(
            "Caching {} documents for {} ({} already cached)",
            pending.len(),
            site.display_name(),
            report.skipped
        );

        let results = join_all(
            pending
                .iter()
                .map(|(category, url)| self.cache_one(site, url, Some(category.as_str()))),
        )
        .await;

        for status in results {
            report.record(status);
        }

        info!("Finished caching {}: {}", site.display_name(), report);
        Ok(report)
    }

    /// Rebuild statuses from the document store.
    ///
    /// URLs with stored content become `Success`, all others `NotFound`.
    /// URLs currently loading are left alone.
    pub fn recheck_statuses<'a>(&self, urls: impl IntoIterator<Item = &'a str>) {
        for url in urls {
            if self.status(url) == CacheStatus::Loading {
                continue;
            }
            let status = match self.documents.get_by_url(url) {
                Ok(Some(document)) if document.has_content() => CacheStatus::Success,
                Ok(_) => CacheStatus::NotFound,
                Err(e) => {
                    warn!("Failed to check cached copy of {}: {:#}", url, e);
                    CacheStatus::NotFound
                }
            };
            self.set_status(url, status);
        }
    }

    /// Stored document for a URL, caching it on demand.
    ///
    /// Fetches when nothing with content is stored, or when `force` is set.
    /// A failed refetch still returns the previously stored copy.
    pub async fn open_document(&self, site: &Site, url: &str, force: bool) -> Result<Option<Document>> {
        if !force {
            if let Some(document) = self.documents.get_by_url(url)? {
                if document.has_content() {
                    if self.status(url) != CacheStatus::Success {
                        self.set_status(url, CacheStatus::Success);
                    }
                    return Ok(Some(document));
                }
            }
        }

        let category = site.category_of(url).map(str::to_string);
        self.cache_one(site, url, category.as_deref()).await;
        self.documents.get_by_url(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemoryFetcher;
    use crate::store::SledStore;
    use crate::types::{SiteDescriptor, SitemapEntry, SitemapTree};
    use std::time::Duration;
    use tempfile::TempDir;

    fn page(title: &str) -> String {
        format!(
            r#"<html><head><title>{}</title></head><body>
            <p><a href="https://ex.com/next">next</a><img src="https://ex.com/x.png" alt="X"></p>
            </body></html>"#,
            title
        )
    }

    fn site_with(urls: &[&str]) -> Site {
        let mut site = Site::from_descriptor(&SiteDescriptor::new("https://ex.com", "ghost"), true);
        let mut tree = SitemapTree::new();
        tree.insert("posts", urls.iter().map(|u| SitemapEntry::new(*u)).collect());
        site.sitemap_tree = Some(tree);
        site
    }

    fn setup(fetcher: MemoryFetcher) -> (TempDir, Arc<MemoryFetcher>, CacheOrchestrator) {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(SledStore::open(temp_dir.path()).unwrap());
        let fetcher = Arc::new(fetcher);
        let orchestrator = CacheOrchestrator::new(fetcher.clone(), store);
        (temp_dir, fetcher, orchestrator)
    }

    #[tokio::test]
    async fn test_cache_one_stores_sanitized_document() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert("https://ex.com/a", page("Post A"));
        let (_dir, _fetcher, orchestrator) = setup(fetcher);
        let site = site_with(&["https://ex.com/a"]);

        let mut events = orchestrator.subscribe();
        let status = orchestrator.cache_one(&site, "https://ex.com/a", Some("posts")).await;
        assert_eq!(status, CacheStatus::Success);
        assert_eq!(orchestrator.status("https://ex.com/a"), CacheStatus::Success);

        let document = orchestrator.documents().get_by_url("https://ex.com/a").unwrap().unwrap();
        assert_eq!(document.title, "Post A");
        assert_eq!(document.category.as_deref(), Some("posts"));
        assert_eq!(document.site_id.as_deref(), Some(site.id.as_str()));
        assert!(!document.content.contains("https://ex.com"));
        assert!(document.content.contains("[X]"));

        assert_eq!(events.recv().await.unwrap().status, CacheStatus::Loading);
        assert_eq!(events.recv().await.unwrap().status, CacheStatus::Success);
    }

    #[tokio::test]
    async fn test_cached_content_has_no_site_references() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert(
            "https://ex.com/a",
            r#"<html><body>
            <form action="https://ex.com/subscribe"><input type="image" src="https://ex.com/btn.png">
            <button formaction="https://ex.com/signin">go</button></form>
            <blockquote cite="https://ex.com/q">quote</blockquote>
            <div style="background: url(https://ex.com/hero.jpg) no-repeat">hero</div>
            <video poster="https://ex.com/p.jpg"><source src="https://ex.com/v.mp4"></video>
            <a href="https://ex.com/next#top">next</a>
            </body></html>"#,
        );
        let (_dir, _fetcher, orchestrator) = setup(fetcher);
        let site = site_with(&["https://ex.com/a"]);

        let status = orchestrator.cache_one(&site, "https://ex.com/a", None).await;
        assert_eq!(status, CacheStatus::Success);

        let document = orchestrator.documents().get_by_url("https://ex.com/a").unwrap().unwrap();
        assert!(!document.content.contains("https://ex.com"), "{}", document.content);
        assert!(document.content.contains("quote"));
        assert!(document.content.contains("hero"));
    }

    #[tokio::test]
    async fn test_refetch_keeps_identity() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert("https://ex.com/a", page("First"));
        let (_dir, fetcher, orchestrator) = setup(fetcher);
        let site = site_with(&["https://ex.com/a"]);

        orchestrator.cache_one(&site, "https://ex.com/a", None).await;
        let first = orchestrator.documents().get_by_url("https://ex.com/a").unwrap().unwrap();

        fetcher.insert("https://ex.com/a", page("Second"));
        orchestrator.cache_one(&site, "https://ex.com/a", None).await;
        let second = orchestrator.documents().get_by_url("https://ex.com/a").unwrap().unwrap();

        assert_eq!(orchestrator.documents().document_count(), 1);
        assert_eq!(first.uuid, second.uuid);
        assert_eq!(first.create_date, second.create_date);
        assert_eq!(second.title, "Second");
        assert!(second.update_date >= first.update_date);
    }

    #[tokio::test]
    async fn test_failure_is_recorded_not_raised() {
        let fetcher = MemoryFetcher::new();
        fetcher.fail("https://ex.com/a", 502);
        let (_dir, _fetcher, orchestrator) = setup(fetcher);
        let site = site_with(&["https://ex.com/a"]);

        let status = orchestrator.cache_one(&site, "https://ex.com/a", None).await;
        assert_eq!(status, CacheStatus::Failed);
        assert_eq!(orchestrator.documents().document_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_fetch() {
        let fetcher = MemoryFetcher::new().with_delay(Duration::from_millis(50));
        fetcher.insert("https://ex.com/a", page("A"));
        let (_dir, fetcher, orchestrator) = setup(fetcher);
        let site = site_with(&["https://ex.com/a"]);

        let (first, second) = tokio::join!(
            orchestrator.cache_one(&site, "https://ex.com/a", None),
            orchestrator.cache_one(&site, "https://ex.com/a", None),
        );

        assert_eq!(first, CacheStatus::Success);
        assert_eq!(second, CacheStatus::Success);
        assert_eq!(fetcher.request_count("https://ex.com/a"), 1);
    }

    #[tokio::test]
    async fn test_cache_all_with_partial_failure() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert("https://ex.com/a", page("A"));
        fetcher.insert("https://ex.com/b", page("B"));
        fetcher.fail("https://ex.com/c", 500);
        let (_dir, _fetcher, orchestrator) = setup(fetcher);
        let site = site_with(&["https://ex.com/a", "https://ex.com/b", "https://ex.com/c"]);

        let report = orchestrator.cache_all(&site).await.unwrap();
        assert_eq!(report.attempted, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(orchestrator.status("https://ex.com/c"), CacheStatus::Failed);
        assert!(!orchestrator.is_caching(&site.id));
        assert!(!orchestrator.caching_in_progress());

        // Only the failed URL is retried
        let report = orchestrator.cache_all(&site).await.unwrap();
        assert_eq!((report.attempted, report.skipped), (1, 2));
    }

    #[tokio::test]
    async fn test_cache_all_rejects_concurrent_run() {
        let (_dir, _fetcher, orchestrator) = setup(MemoryFetcher::new());
        let site = site_with(&["https://ex.com/a"]);

        let token = orchestrator.begin_sync(&site.id).unwrap();
        assert!(orchestrator.is_caching(&site.id));
        let result = orchestrator.cache_all(&site).await;
        assert!(matches!(result, Err(SyncError::AlreadySyncing(_))));

        drop(token);
        assert!(!orchestrator.is_caching(&site.id));
        assert!(orchestrator.cache_all(&site).await.is_ok());
    }

    #[tokio::test]
    async fn test_cache_all_without_sitemap() {
        let (_dir, _fetcher, orchestrator) = setup(MemoryFetcher::new());
        let site = Site::from_descriptor(&SiteDescriptor::new("https://ex.com", "ghost"), true);

        let result = orchestrator.cache_all(&site).await;
        assert!(matches!(result, Err(SyncError::NoSitemap(_))));
        assert!(!orchestrator.is_caching(&site.id));
    }

    #[tokio::test]
    async fn test_recheck_statuses() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert("https://ex.com/a", page("A"));
        let (_dir, _fetcher, orchestrator) = setup(fetcher);
        let site = site_with(&["https://ex.com/a", "https://ex.com/b"]);
        orchestrator.cache_one(&site, "https://ex.com/a", None).await;

        let fresh = CacheOrchestrator::new(Arc::new(MemoryFetcher::new()), orchestrator.documents().clone());
        assert_eq!(fresh.status("https://ex.com/a"), CacheStatus::Unknown);

        fresh.recheck_statuses(["https://ex.com/a", "https://ex.com/b"]);
        assert_eq!(fresh.status("https://ex.com/a"), CacheStatus::Success);
        assert_eq!(fresh.status("https://ex.com/b"), CacheStatus::NotFound);
        assert_eq!(fresh.statuses().len(), 2);
    }

    #[tokio::test]
    async fn test_open_document_uses_store_first() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert("https://ex.com/a", page("A"));
        let (_dir, fetcher, orchestrator) = setup(fetcher);
        let site = site_with(&["https://ex.com/a"]);

        let document = orchestrator.open_document(&site, "https://ex.com/a", false).await.unwrap().unwrap();
        assert_eq!(document.category.as_deref(), Some("posts"));
        orchestrator.open_document(&site, "https://ex.com/a", false).await.unwrap();
        assert_eq!(fetcher.request_count("https://ex.com/a"), 1);

        // A failed forced refresh keeps the stored copy
        fetcher.fail("https://ex.com/a", 503);
        let kept = orchestrator.open_document(&site, "https://ex.com/a", true).await.unwrap().unwrap();
        assert_eq!(kept.uuid, document.uuid);
        assert_eq!(fetcher.request_count("https://ex.com/a"), 2);

        let missing = orchestrator.open_document(&site, "https://ex.com/zzz", false).await.unwrap();
        assert!(missing.is_none());
    }
}
