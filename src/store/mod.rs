//! Persistent document and site storage
//!
//! The cache orchestrator and the site session only talk to the traits in
//! this module; `SledStore` is the on-disk implementation.

mod sled_store;

pub use sled_store::SledStore;

use anyhow::Result;

use crate::types::{Document, Site};

/// Keyed storage for cached documents.
///
/// A URL maps to at most one document: writing a document whose URL is
/// already stored under another id replaces that record.
pub trait DocumentStore: Send + Sync {
    /// Insert or replace a document
    fn put_document(&self, document: &Document) -> Result<()>;

    fn get_document(&self, id: &str) -> Result<Option<Document>>;

    /// Look up the document cached for a source URL
    fn get_by_url(&self, url: &str) -> Result<Option<Document>>;

    /// Documents whose path starts with `prefix`, ordered by path
    fn scan_by_path_prefix(&self, prefix: &str) -> Result<Vec<Document>>;

    /// Documents of one site and sitemap category, ordered by path
    fn documents_for_category(&self, site_id: &str, category: &str) -> Result<Vec<Document>>;

    /// Remove every document of a site, returning how many were removed
    fn delete_by_site(&self, site_id: &str) -> Result<usize>;

    fn document_count(&self) -> usize;
}

/// Keyed storage for site records
pub trait SiteStore: Send + Sync {
    fn put_site(&self, site: &Site) -> Result<()>;

    fn get_site(&self, id: &str) -> Result<Option<Site>>;

    /// All stored sites, ordered by id
    fn all_sites(&self) -> Result<Vec<Site>>;

    /// Remove a site record; returns whether it existed
    fn delete_site(&self, id: &str) -> Result<bool>;
}
