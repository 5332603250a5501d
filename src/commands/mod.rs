//! CLI command implementations

pub mod documents;
pub mod init;
pub mod sites;
pub mod status;
pub mod sync;

use anyhow::{Context, Result};
use sitemirror::{
    cache::{CacheOrchestrator, CacheStatus, StatusChange},
    config::Config,
    fetch::build_fetcher,
    session::SiteSession,
    sitemap::{EndpointCatalog, SitemapResolver},
    store::SledStore,
    types::Site,
};
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::warn;

/// A loaded mirror: store, session and its configured sites
pub struct Mirror {
    pub store: Arc<SledStore>,
    pub session: SiteSession,
}

impl Mirror {
    pub fn open_store(config: &Config) -> Result<Arc<SledStore>> {
        let store = SledStore::open(&config.storage.data_dir)?;
        Ok(Arc::new(store))
    }

    /// Open the store and load the configured sites
    pub async fn open(config: &Config) -> Result<Self> {
        let store = Self::open_store(config)?;
        let fetcher = build_fetcher(&config.fetch).context("Failed to build fetcher")?;

        let resolver = SitemapResolver::new(
            fetcher.clone(),
            EndpointCatalog::from_config(&config.sitemap),
        );
        let orchestrator = Arc::new(CacheOrchestrator::new(fetcher, store.clone()));
        let session = SiteSession::new(resolver, orchestrator, store.clone());
        session.set_online(!config.offline);

        let descriptors = config.site_descriptors()?;
        if descriptors.is_empty() {
            warn!("No sites configured; add [[sites]] or sites_file to the configuration");
        }
        session.load_defaults(&descriptors).await;

        Ok(Self { store, session })
    }

    /// Resolve a site selector (index, id or base URL); `None` keeps the
    /// current selection.
    pub fn site(&self, selector: Option<&str>) -> Result<Site> {
        let Some(selector) = selector else {
            return self
                .session
                .selected_site()
                .context("No sites configured");
        };

        if let Ok(index) = selector.parse::<usize>() {
            return Ok(self.session.select_site(index)?);
        }

        let sites = self.session.sites();
        let position = find_site(&sites, selector)
            .with_context(|| format!("Unknown site '{}'", selector))?;
        Ok(self.session.select_site(position)?)
    }

    /// Flush pending writes
    pub fn close(&self) -> Result<()> {
        self.store.flush()
    }
}

/// Position of the site matching an id or base URL
pub fn find_site(sites: &[Site], selector: &str) -> Option<usize> {
    let wanted = sitemirror::util::trim_base_url(selector);
    sites
        .iter()
        .position(|site| site.id == selector || site.clean_base_url() == wanted)
}

/// Print terminal status transitions until `done` fires or the channel
/// closes, then drain what is already queued. Returns the number of lines
/// printed.
pub async fn print_progress(
    mut events: broadcast::Receiver<StatusChange>,
    mut done: oneshot::Receiver<()>,
) -> usize {
    let mut printed = 0;
    loop {
        tokio::select! {
            biased;
            event = events.recv() => match event {
                Ok(change) => printed += print_change(&change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Progress output skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return printed,
            },
            _ = &mut done => break,
        }
    }

    loop {
        match events.try_recv() {
            Ok(change) => printed += print_change(&change),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                warn!("Progress output skipped {} events", skipped);
            }
            Err(_) => return printed,
        }
    }
}

fn print_change(change: &StatusChange) -> usize {
    match change.status {
        CacheStatus::Success => println!("  cached  {}", change.url),
        CacheStatus::Failed => println!("  failed  {}", change.url),
        _ => return 0,
    }
    1
}

/// Progress printer running alongside a batch
pub struct Progress {
    done: oneshot::Sender<()>,
    handle: JoinHandle<usize>,
}

impl Progress {
    pub fn spawn(events: broadcast::Receiver<StatusChange>) -> Self {
        let (done, done_rx) = oneshot::channel();
        let handle = tokio::spawn(print_progress(events, done_rx));
        Self { done, handle }
    }

    /// Signal the batch is over and wait for queued lines to be printed
    pub async fn finish(self) {
        let _ = self.done.send(());
        if let Err(e) = self.handle.await {
            warn!("Progress output failed: {}", e);
        }
    }
}
