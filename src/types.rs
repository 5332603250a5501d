//! Core types for the offline mirror

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::util;

/// Unique identifier for a cached document
pub type DocumentId = String;

/// Unique identifier for a site
pub type SiteId = String;

/// Timestamp type used for all persisted records
pub type Timestamp = DateTime<Utc>;

// ============================================================================
// Sites
// ============================================================================

/// Publishing platform of a site, governing its sitemap endpoint conventions.
///
/// Unknown platform names are preserved as `Other` so that endpoint sets can
/// be supplied through configuration; resolving a site whose type has no
/// endpoint set fails with `UnsupportedSiteType`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SiteType {
    Ghost,
    Wordpress,
    Other(String),
}

impl SiteType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ghost => "ghost",
            Self::Wordpress => "wordpress",
            Self::Other(name) => name.as_str(),
        }
    }
}

impl From<String> for SiteType {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "ghost" => Self::Ghost,
            "wordpress" => Self::Wordpress,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<&str> for SiteType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<SiteType> for String {
    fn from(value: SiteType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for SiteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Site descriptor as loaded from the static site list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteDescriptor {
    /// Explicit identifier; derived from the base URL when absent
    #[serde(default)]
    pub id: Option<SiteId>,
    #[serde(alias = "base_url")]
    pub base_url: String,
    #[serde(rename = "type", alias = "site_type")]
    pub site_type: SiteType,
    #[serde(default)]
    pub name: Option<String>,
}

impl SiteDescriptor {
    pub fn new(base_url: impl Into<String>, site_type: impl Into<SiteType>) -> Self {
        Self {
            id: None,
            base_url: base_url.into(),
            site_type: site_type.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// A mirrored site and its last resolved sitemap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    pub base_url: String,
    pub site_type: SiteType,
    pub name: Option<String>,
    pub is_default: bool,
    /// Absent until the first successful resolution
    pub sitemap_tree: Option<SitemapTree>,
    pub create_date: Timestamp,
    pub update_date: Timestamp,
}

impl Site {
    /// Create a site from its descriptor
    pub fn from_descriptor(descriptor: &SiteDescriptor, is_default: bool) -> Self {
        let now = Utc::now();
        Self {
            id: descriptor
                .id
                .clone()
                .unwrap_or_else(|| Self::derive_id(&descriptor.base_url)),
            base_url: descriptor.base_url.clone(),
            site_type: descriptor.site_type.clone(),
            name: descriptor.name.clone(),
            is_default,
            sitemap_tree: None,
            create_date: now,
            update_date: now,
        }
    }

    /// Stable identifier for a base URL, so a site's persisted record is
    /// found again across restarts.
    pub fn derive_id(base_url: &str) -> SiteId {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, util::trim_base_url(base_url).as_bytes()).to_string()
    }

    /// Base URL without trailing slashes
    pub fn clean_base_url(&self) -> &str {
        util::trim_base_url(&self.base_url)
    }

    /// Display label: the configured name, or the base URL
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.base_url)
    }

    /// Whether `url` belongs to this site (prefix match on a path boundary)
    pub fn owns_url(&self, url: &str) -> bool {
        util::is_within_base(url, self.clean_base_url())
    }

    /// Sitemap category listing `url`, if any
    pub fn category_of(&self, url: &str) -> Option<&str> {
        self.sitemap_tree.as_ref().and_then(|tree| {
            tree.iter()
                .find(|(_, entries)| entries.iter().any(|entry| entry.url == url))
                .map(|(category, _)| category.as_str())
        })
    }

    /// Every (category, url) pair of the current sitemap tree
    pub fn sitemap_urls(&self) -> Vec<(String, String)> {
        self.sitemap_tree
            .as_ref()
            .map(|tree| {
                tree.iter()
                    .flat_map(|(category, entries)| {
                        entries
                            .iter()
                            .map(move |entry| (category.clone(), entry.url.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ============================================================================
// Sitemaps
// ============================================================================

/// One URL listed in a sitemap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapEntry {
    pub url: String,
    /// Source-reported last modification time
    pub creation_date: Option<Timestamp>,
}

impl SitemapEntry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            creation_date: None,
        }
    }

    pub fn with_creation_date(mut self, date: Timestamp) -> Self {
        self.creation_date = Some(date);
        self
    }
}

/// Sitemap entries of one site grouped by category, in source order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SitemapTree(BTreeMap<String, Vec<SitemapEntry>>);

impl SitemapTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entries of a category
    pub fn insert(&mut self, category: impl Into<String>, entries: Vec<SitemapEntry>) {
        self.0.insert(category.into(), entries);
    }

    /// Append entries to a category, creating it if needed
    pub fn append(&mut self, category: impl Into<String>, entries: Vec<SitemapEntry>) {
        self.0.entry(category.into()).or_default().extend(entries);
    }

    pub fn get(&self, category: &str) -> Option<&[SitemapEntry]> {
        self.0.get(category).map(Vec::as_slice)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<SitemapEntry>)> {
        self.0.iter()
    }

    /// Total number of entries across all categories
    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Documents
// ============================================================================

/// A cached, sanitized offline copy of one fetched page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Primary key
    pub uuid: DocumentId,
    /// Source URL; at most one document per URL
    pub original_url: String,
    /// Sanitized HTML fragment
    pub content: String,
    pub title: String,
    /// URL pathname
    pub path: String,
    /// Number of non-empty path segments
    pub depth: usize,
    pub category: Option<String>,
    pub site_id: Option<SiteId>,
    pub create_date: Timestamp,
    pub update_date: Timestamp,
}

impl Document {
    /// Create a document with a fresh identifier
    pub fn new(
        original_url: impl Into<String>,
        content: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        let original_url = original_url.into();
        let (path, depth) = util::path_and_depth(&original_url);
        let now = Utc::now();
        Self {
            uuid: Uuid::new_v4().to_string(),
            original_url,
            content: content.into(),
            title: title.into(),
            path,
            depth,
            category: None,
            site_id: None,
            create_date: now,
            update_date: now,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_site(mut self, site_id: impl Into<String>) -> Self {
        self.site_id = Some(site_id.into());
        self
    }

    /// Whether the record carries cached content
    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }
}
