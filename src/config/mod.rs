//! Configuration for sitemirror

mod fetch;
mod logging;
mod sitemap;
mod storage;

pub use fetch::{FetchConfig, FetchMode};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use sitemap::{EndpointTemplate, SitemapConfig};
pub use storage::StorageConfig;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use url::Url;

use crate::types::{Site, SiteDescriptor};

/// Default user agent for all HTTP requests
pub const DEFAULT_USER_AGENT: &str = "sitemirror/0.1 (offline reader)";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// JSON file listing site descriptors (`{"defaultSites": [...]}`)
    #[serde(default)]
    pub sites_file: Option<PathBuf>,
    /// Start without network access
    #[serde(default)]
    pub offline: bool,
    /// Inline site descriptors
    #[serde(default)]
    pub sites: Vec<SiteDescriptor>,
    /// Local storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Remote fetch configuration
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Sitemap endpoint configuration
    #[serde(default)]
    pub sitemap: SitemapConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// On-disk shape of the site descriptor file
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SiteList {
    Wrapped {
        #[serde(rename = "defaultSites")]
        default_sites: Vec<SiteDescriptor>,
    },
    Bare(Vec<SiteDescriptor>),
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration fields.
    ///
    /// Collects all validation errors and reports them together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.fetch.timeout_secs == 0 {
            errors.push("fetch timeout_secs must be positive".to_string());
        }
        if self.fetch.connect_timeout_secs == 0 {
            errors.push("fetch connect_timeout_secs must be positive".to_string());
        }
        if self.fetch.mode == FetchMode::Proxy && Url::parse(&self.fetch.proxy_url).is_err() {
            errors.push(format!("proxy_url '{}' is not a valid URL", self.fetch.proxy_url));
        }

        for (site_type, endpoints) in &self.sitemap.endpoints {
            if endpoints.is_empty() {
                errors.push(format!("sitemap endpoints for '{}' must not be empty", site_type));
            }
            for endpoint in endpoints {
                if endpoint.category.trim().is_empty() {
                    errors.push(format!("sitemap endpoint category for '{}' must not be empty", site_type));
                }
                if !endpoint.suffix.starts_with('/') {
                    errors.push(format!(
                        "sitemap endpoint suffix '{}' for '{}' must start with '/'",
                        endpoint.suffix, site_type
                    ));
                }
            }
        }

        match self.site_descriptors() {
            Ok(descriptors) => {
                let mut seen_ids = HashSet::new();
                for descriptor in &descriptors {
                    match Url::parse(&descriptor.base_url) {
                        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
                        _ => errors.push(format!(
                            "site base URL '{}' must be an absolute http(s) URL",
                            descriptor.base_url
                        )),
                    }
                    let id = Site::from_descriptor(descriptor, true).id;
                    if !seen_ids.insert(id.clone()) {
                        errors.push(format!("duplicate site id '{}'", id));
                    }
                }
            }
            Err(e) => errors.push(format!("{:#}", e)),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("Invalid configuration:\n  - {}", errors.join("\n  - "))
        }
    }

    /// All site descriptors: those from `sites_file` followed by inline ones.
    pub fn site_descriptors(&self) -> Result<Vec<SiteDescriptor>> {
        let mut descriptors = Vec::new();

        if let Some(path) = &self.sites_file {
            descriptors.extend(load_site_file(path)?);
        }
        descriptors.extend(self.sites.iter().cloned());

        Ok(descriptors)
    }
}

/// Read a JSON site descriptor file
pub fn load_site_file(path: &Path) -> Result<Vec<SiteDescriptor>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read site list {}", path.display()))?;
    let list: SiteList = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse site list {}", path.display()))?;

    Ok(match list {
        SiteList::Wrapped { default_sites } => default_sites,
        SiteList::Bare(sites) => sites,
    })
}
