//! sled-backed storage
//!
//! One database with three trees:
//! - `documents`: uuid -> bincode `Document`
//! - `url_index`: original URL -> uuid
//! - `sites`: site id -> bincode `Site`

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{debug, warn};

use super::{DocumentStore, SiteStore};
use crate::types::{Document, Site};

/// Document and site storage in a sled database
pub struct SledStore {
    db: sled::Db,
    documents: sled::Tree,
    url_index: sled::Tree,
    sites: sled::Tree,
}

impl SledStore {
    /// Open or create the database under `data_dir`
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join("mirror.sled");
        let db = sled::open(&db_path)
            .with_context(|| format!("Failed to open mirror database at {:?}", db_path))?;

        let documents = db
            .open_tree("documents")
            .context("Failed to open documents tree")?;
        let url_index = db
            .open_tree("url_index")
            .context("Failed to open URL index tree")?;
        let sites = db.open_tree("sites").context("Failed to open sites tree")?;

        Ok(Self {
            db,
            documents,
            url_index,
            sites,
        })
    }

    /// Flush sled buffers to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush().context("Failed to flush mirror database")?;
        Ok(())
    }

    /// Every stored document, skipping unreadable records
    fn documents_matching(&self, mut keep: impl FnMut(&Document) -> bool) -> Vec<Document> {
        let mut matches: Vec<Document> = self
            .documents
            .iter()
            .filter_map(|item| match item {
                Ok((key, data)) => decode::<Document>(&data, &String::from_utf8_lossy(&key)),
                Err(e) => {
                    warn!("Failed to iterate documents: {}", e);
                    None
                }
            })
            .filter(|doc| keep(doc))
            .collect();
        matches.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.original_url.cmp(&b.original_url)));
        matches
    }

    fn remove_document(&self, document: &Document) -> Result<()> {
        self.documents
            .remove(document.uuid.as_bytes())
            .with_context(|| format!("Failed to remove document {}", document.uuid))?;

        // Only drop the index entry if it still points at this record
        if let Some(indexed) = self.url_index.get(document.original_url.as_bytes())? {
            if indexed.as_ref() == document.uuid.as_bytes() {
                self.url_index
                    .remove(document.original_url.as_bytes())
                    .with_context(|| format!("Failed to unindex {}", document.original_url))?;
            }
        }
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(data: &[u8], key: &str) -> Option<T> {
    match bincode::deserialize(data) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Failed to deserialize record {}: {}", key, e);
            None
        }
    }
}

impl DocumentStore for SledStore {
    fn put_document(&self, document: &Document) -> Result<()> {
        let url = document.original_url.as_bytes();

        if let Some(existing) = self.url_index.get(url)? {
            if existing.as_ref() != document.uuid.as_bytes() {
                let existing_id = String::from_utf8_lossy(&existing).into_owned();
                debug!(
                    "Replacing document {} for {} with {}",
                    existing_id, document.original_url, document.uuid
                );
                self.documents
                    .remove(existing.as_ref())
                    .with_context(|| format!("Failed to remove document {}", existing_id))?;
            }
        }

        let data = bincode::serialize(document)
            .with_context(|| format!("Failed to serialize document {}", document.uuid))?;
        self.documents
            .insert(document.uuid.as_bytes(), data)
            .with_context(|| format!("Failed to store document {}", document.uuid))?;
        self.url_index
            .insert(url, document.uuid.as_bytes())
            .with_context(|| format!("Failed to index {}", document.original_url))?;

        Ok(())
    }

    fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let data = self
            .documents
            .get(id.as_bytes())
            .with_context(|| format!("Failed to read document {}", id))?;
        Ok(data.and_then(|data| decode(&data, id)))
    }

    fn get_by_url(&self, url: &str) -> Result<Option<Document>> {
        let id = self
            .url_index
            .get(url.as_bytes())
            .with_context(|| format!("Failed to read URL index for {}", url))?;
        match id {
            Some(id) => self.get_document(&String::from_utf8_lossy(&id)),
            None => Ok(None),
        }
    }

    fn scan_by_path_prefix(&self, prefix: &str) -> Result<Vec<Document>> {
        Ok(self.documents_matching(|doc| doc.path.starts_with(prefix)))
    }

    fn documents_for_category(&self, site_id: &str, category: &str) -> Result<Vec<Document>> {
        Ok(self.documents_matching(|doc| {
            doc.site_id.as_deref() == Some(site_id) && doc.category.as_deref() == Some(category)
        }))
    }

    fn delete_by_site(&self, site_id: &str) -> Result<usize> {
        let documents = self.documents_matching(|doc| doc.site_id.as_deref() == Some(site_id));
        for document in &documents {
            self.remove_document(document)?;
        }
        Ok(documents.len())
    }

    fn document_count(&self) -> usize {
        self.documents.len()
    }
}

impl SiteStore for SledStore {
    fn put_site(&self, site: &Site) -> Result<()> {
        let data = bincode::serialize(site)
            .with_context(|| format!("Failed to serialize site {}", site.id))?;
        self.sites
            .insert(site.id.as_bytes(), data)
            .with_context(|| format!("Failed to store site {}", site.id))?;
        Ok(())
    }

    fn get_site(&self, id: &str) -> Result<Option<Site>> {
        let data = self
            .sites
            .get(id.as_bytes())
            .with_context(|| format!("Failed to read site {}", id))?;
        Ok(data.and_then(|data| decode(&data, id)))
    }

    fn all_sites(&self) -> Result<Vec<Site>> {
        let mut sites = Vec::new();
        for item in self.sites.iter() {
            let (key, data) = item.context("Failed to iterate sites")?;
            if let Some(site) = decode(&data, &String::from_utf8_lossy(&key)) {
                sites.push(site);
            }
        }
        Ok(sites)
    }

    fn delete_site(&self, id: &str) -> Result<bool> {
        let removed = self
            .sites
            .remove(id.as_bytes())
            .with_context(|| format!("Failed to remove site {}", id))?;
        Ok(removed.is_some())
    }
}
