//! Site session
//!
//! Holds the in-memory list of sites and the current selection, loads the
//! configured sites at startup and resynchronizes them on demand. Reads go
//! through the lock briefly; it is never held across an await.

use chrono::Utc;
use futures::future::join_all;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{CacheOrchestrator, CacheReport, SyncError};
use crate::sitemap::{SitemapError, SitemapResolver};
use crate::store::SiteStore;
use crate::types::{Site, SiteDescriptor};

/// Errors from session operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Site index {index} out of range ({len} sites)")]
    SiteIndexOutOfRange { index: usize, len: usize },
    #[error("Site not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Sitemap(#[from] SitemapError),
    #[error("Storage error: {0:#}")]
    Store(#[from] anyhow::Error),
}

/// Result of a resync request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncOutcome {
    /// No network: nothing was touched
    SkippedOffline,
    Completed(CacheReport),
}

/// Sites of one running mirror and the selected one
pub struct SiteSession {
    resolver: SitemapResolver,
    orchestrator: Arc<CacheOrchestrator>,
    site_store: Arc<dyn SiteStore>,
    sites: RwLock<Vec<Site>>,
    selected: AtomicUsize,
    online: AtomicBool,
}

impl SiteSession {
    pub fn new(
        resolver: SitemapResolver,
        orchestrator: Arc<CacheOrchestrator>,
        site_store: Arc<dyn SiteStore>,
    ) -> Self {
        Self {
            resolver,
            orchestrator,
            site_store,
            sites: RwLock::new(Vec::new()),
            selected: AtomicUsize::new(0),
            online: AtomicBool::new(true),
        }
    }

    pub fn orchestrator(&self) -> &Arc<CacheOrchestrator> {
        &self.orchestrator
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    pub fn set_online(&self, online: bool) {
        if self.online.swap(online, Ordering::Relaxed) != online {
            info!("Connectivity changed: {}", if online { "online" } else { "offline" });
        }
    }

    /// Load the configured sites.
    ///
    /// A persisted sitemap is reused without network access; otherwise the
    /// sitemap is resolved and persisted when online, or left absent.
    /// Statuses of every known URL are then rebuilt from the store.
    pub async fn load_defaults(&self, descriptors: &[SiteDescriptor]) {
        info!("Loading {} sites", descriptors.len());

        let sites = join_all(descriptors.iter().map(|d| self.load_site(d))).await;

        let urls: Vec<String> = sites
            .iter()
            .flat_map(|site| site.sitemap_urls().into_iter().map(|(_, url)| url))
            .collect();

        {
            let mut current = self.sites.write();
            *current = sites;
            if self.selected.load(Ordering::Relaxed) >= current.len() {
                self.selected.store(0, Ordering::Relaxed);
            }
        }

        self.orchestrator
            .recheck_statuses(urls.iter().map(String::as_str));
    }

    async fn load_site(&self, descriptor: &SiteDescriptor) -> Site {
        let mut site = Site::from_descriptor(descriptor, true);

        match self.site_store.get_site(&site.id) {
            Ok(Some(stored)) => {
                site.create_date = stored.create_date;
                if stored.sitemap_tree.is_some() {
                    debug!("Reusing stored sitemap for {}", site.display_name());
                    site.sitemap_tree = stored.sitemap_tree;
                    site.update_date = stored.update_date;
                    return site;
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to read stored site {}: {:#}", site.id, e),
        }

        if !self.is_online() {
            info!("Offline: no sitemap available for {}", site.display_name());
            return site;
        }

        match self.resolver.resolve_sitemap(&site).await {
            Ok(tree) => {
                site.sitemap_tree = Some(tree);
                site.update_date = Utc::now();
                if let Err(e) = self.site_store.put_site(&site) {
                    warn!("Failed to persist site {}: {:#}", site.id, e);
                }
            }
            Err(e) => warn!("Cannot resolve sitemap for {}: {}", site.display_name(), e),
        }

        site
    }

    /// Snapshot of all sites
    pub fn sites(&self) -> Vec<Site> {
        self.sites.read().clone()
    }

    pub fn site(&self, id: &str) -> Option<Site> {
        self.sites.read().iter().find(|s| s.id == id).cloned()
    }

    pub fn selected_index(&self) -> usize {
        self.selected.load(Ordering::Relaxed)
    }

    pub fn selected_site(&self) -> Option<Site> {
        self.sites.read().get(self.selected_index()).cloned()
    }

    /// Change the selected site. Statuses are kept.
    pub fn select_site(&self, index: usize) -> Result<Site, SessionError> {
        let sites = self.sites.read();
        let site = sites.get(index).cloned().ok_or(SessionError::SiteIndexOutOfRange {
            index,
            len: sites.len(),
        })?;
        self.selected.store(index, Ordering::Relaxed);
        Ok(site)
    }

    fn replace_site(&self, site: Site) {
        let mut sites = self.sites.write();
        match sites.iter_mut().find(|s| s.id == site.id) {
            Some(slot) => *slot = site,
            None => sites.push(site),
        }
    }

    /// Re-resolve a site's sitemap and cache whatever is missing.
    ///
    /// Offline this returns `SkippedOffline` without touching anything.
    pub async fn resync(&self, site_id: &str) -> Result<ResyncOutcome, SessionError> {
        if !self.is_online() {
            info!("Offline: skipping resync of {}", site_id);
            return Ok(ResyncOutcome::SkippedOffline);
        }

        let mut site = self
            .site(site_id)
            .ok_or_else(|| SessionError::NotFound(site_id.to_string()))?;

        let token = self.orchestrator.begin_sync(&site.id)?;

        let tree = self.resolver.resolve_sitemap(&site).await?;
        site.sitemap_tree = Some(tree);
        site.update_date = Utc::now();
        self.site_store.put_site(&site)?;
        self.replace_site(site.clone());

        let report = self.orchestrator.cache_site(&site, &token).await?;
        Ok(ResyncOutcome::Completed(report))
    }

    /// Remove a site with all of its cached documents.
    ///
    /// Returns the number of documents removed.
    pub fn delete_site(&self, site_id: &str) -> Result<usize, SessionError> {
        if self.orchestrator.is_caching(site_id) {
            return Err(SyncError::AlreadySyncing(site_id.to_string()).into());
        }

        let in_memory = {
            let mut sites = self.sites.write();
            let position = sites.iter().position(|s| s.id == site_id);
            let removed = position.map(|index| sites.remove(index));
            let selected = self.selected.load(Ordering::Relaxed);
            if let Some(index) = position {
                if selected > index || selected >= sites.len() {
                    self.selected.store(selected.saturating_sub(1), Ordering::Relaxed);
                }
            }
            removed
        };

        let stored = self.site_store.delete_site(site_id)?;
        if in_memory.is_none() && !stored {
            return Err(SessionError::NotFound(site_id.to_string()));
        }

        let removed = self.orchestrator.documents().delete_by_site(site_id)?;
        if let Some(site) = in_memory {
            let urls = site.sitemap_urls();
            self.orchestrator
                .recheck_statuses(urls.iter().map(|(_, url)| url.as_str()));
        }

        info!("Deleted site {} ({} documents)", site_id, removed);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStatus;
    use crate::fetch::MemoryFetcher;
    use crate::sitemap::EndpointCatalog;
    use crate::store::{DocumentStore, SledStore};
    use crate::types::{SitemapEntry, SitemapTree};
    use tempfile::TempDir;

    const POSTS: &str = r#"<urlset><url><loc>https://ex.com/a</loc></url><url><loc>https://ex.com/b</loc></url></urlset>"#;

    struct Fixture {
        _dir: TempDir,
        fetcher: Arc<MemoryFetcher>,
        store: Arc<SledStore>,
        session: SiteSession,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SledStore::open(dir.path()).unwrap());
        let fetcher = Arc::new(MemoryFetcher::new());
        let orchestrator = Arc::new(CacheOrchestrator::new(fetcher.clone(), store.clone()));
        let resolver = SitemapResolver::new(fetcher.clone(), EndpointCatalog::default());
        let session = SiteSession::new(resolver, orchestrator, store.clone());
        Fixture {
            _dir: dir,
            fetcher,
            store,
            session,
        }
    }

    fn descriptors() -> Vec<SiteDescriptor> {
        vec![
            SiteDescriptor::new("https://ex.com", "ghost").with_name("Example"),
            SiteDescriptor::new("https://wp.org", "wordpress"),
        ]
    }

    #[tokio::test]
    async fn test_load_defaults_online_resolves_and_persists() {
        let fx = fixture();
        fx.fetcher.insert("https://ex.com/sitemap-posts.xml", POSTS);

        fx.session.load_defaults(&descriptors()).await;

        let sites = fx.session.sites();
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].display_name(), "Example");
        assert_eq!(sites[0].sitemap_urls().len(), 2);
        assert!(sites[1].sitemap_tree.as_ref().unwrap().is_empty());
        assert_eq!(fx.store.all_sites().unwrap().len(), 2);

        let orchestrator = fx.session.orchestrator();
        assert_eq!(orchestrator.status("https://ex.com/a"), CacheStatus::NotFound);
    }

    #[tokio::test]
    async fn test_load_defaults_offline_reuses_stored_tree() {
        let fx = fixture();
        let mut stored = Site::from_descriptor(&descriptors()[0], true);
        let mut tree = SitemapTree::new();
        tree.insert("posts", vec![SitemapEntry::new("https://ex.com/a")]);
        stored.sitemap_tree = Some(tree);
        fx.store.put_site(&stored).unwrap();

        fx.session.set_online(false);
        fx.session.load_defaults(&descriptors()).await;

        let sites = fx.session.sites();
        assert_eq!(sites[0].sitemap_tree, stored.sitemap_tree);
        assert!(sites[1].sitemap_tree.is_none());
        assert!(fx.fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn test_offline_resync_has_no_effect() {
        let fx = fixture();
        fx.session.set_online(false);
        fx.session.load_defaults(&descriptors()).await;
        let site_id = fx.session.sites()[0].id.clone();

        let outcome = fx.session.resync(&site_id).await.unwrap();
        assert_eq!(outcome, ResyncOutcome::SkippedOffline);
        assert!(fx.store.all_sites().unwrap().is_empty());
        assert!(fx.fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn test_resync_resolves_and_caches() {
        let fx = fixture();
        fx.session.set_online(false);
        fx.session.load_defaults(&descriptors()).await;
        let site_id = fx.session.sites()[0].id.clone();

        fx.session.set_online(true);
        fx.fetcher.insert("https://ex.com/sitemap-posts.xml", POSTS);
        fx.fetcher.insert("https://ex.com/a", "<title>A</title><p>a</p>");
        fx.fetcher.fail("https://ex.com/b", 500);

        let outcome = fx.session.resync(&site_id).await.unwrap();
        let ResyncOutcome::Completed(report) = outcome else {
            panic!("expected completed resync");
        };
        assert_eq!((report.succeeded, report.failed), (1, 1));

        let stored = fx.store.get_site(&site_id).unwrap().unwrap();
        assert_eq!(stored.sitemap_urls().len(), 2);
        assert_eq!(fx.session.site(&site_id).unwrap().sitemap_tree, stored.sitemap_tree);
        assert!(!fx.session.orchestrator().is_caching(&site_id));
    }

    #[tokio::test]
    async fn test_resync_unknown_site() {
        let fx = fixture();
        let result = fx.session.resync("nope").await;
        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_select_site_bounds() {
        let fx = fixture();
        fx.session.set_online(false);
        fx.session.load_defaults(&descriptors()).await;

        assert_eq!(fx.session.select_site(1).unwrap().base_url, "https://wp.org");
        assert_eq!(fx.session.selected_index(), 1);

        let err = fx.session.select_site(2).unwrap_err();
        assert!(matches!(err, SessionError::SiteIndexOutOfRange { index: 2, len: 2 }));
        assert_eq!(fx.session.selected_index(), 1);
    }

    #[tokio::test]
    async fn test_delete_site_removes_documents() {
        let fx = fixture();
        fx.fetcher.insert("https://ex.com/sitemap-posts.xml", POSTS);
        fx.fetcher.insert("https://ex.com/a", "<p>a</p>");
        fx.fetcher.insert("https://ex.com/b", "<p>b</p>");
        fx.session.load_defaults(&descriptors()).await;

        let site = fx.session.sites()[0].clone();
        fx.session.orchestrator().cache_all(&site).await.unwrap();
        assert_eq!(fx.store.document_count(), 2);

        fx.session.select_site(1).unwrap();
        assert_eq!(fx.session.delete_site(&site.id).unwrap(), 2);
        assert_eq!(fx.store.document_count(), 0);
        assert!(fx.store.get_site(&site.id).unwrap().is_none());
        assert_eq!(fx.session.sites().len(), 1);
        assert_eq!(fx.session.selected_site().unwrap().base_url, "https://wp.org");
        assert_eq!(
            fx.session.orchestrator().status("https://ex.com/a"),
            CacheStatus::NotFound
        );

        assert!(matches!(fx.session.delete_site(&site.id), Err(SessionError::NotFound(_))));
    }
}
