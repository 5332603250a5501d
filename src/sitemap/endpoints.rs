//! Per-platform sitemap endpoint sets

use std::collections::HashMap;

use crate::config::{EndpointTemplate, SitemapConfig};
use crate::types::{Site, SiteType};

const GHOST_ENDPOINTS: &[(&str, &str)] = &[
    ("pages", "/sitemap-pages.xml"),
    ("posts", "/sitemap-posts.xml"),
    ("authors", "/sitemap-authors.xml"),
    ("tags", "/sitemap-tags.xml"),
];

const WORDPRESS_ENDPOINTS: &[(&str, &str)] = &[
    ("posts", "/wp-sitemap-posts-post-1.xml"),
    ("pages", "/wp-sitemap-posts-page-1.xml"),
    ("categories", "/wp-sitemap-taxonomies-category-1.xml"),
    ("post_tags", "/wp-sitemap-taxonomies-post_tag-1.xml"),
];

/// A concrete sitemap document to fetch for one site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEndpoint {
    pub category: String,
    pub url: String,
}

/// Endpoint sets keyed by platform type name
#[derive(Debug, Clone)]
pub struct EndpointCatalog {
    sets: HashMap<String, Vec<EndpointTemplate>>,
}

impl Default for EndpointCatalog {
    fn default() -> Self {
        let mut sets = HashMap::new();
        sets.insert(SiteType::Ghost.as_str().to_string(), to_templates(GHOST_ENDPOINTS));
        sets.insert(SiteType::Wordpress.as_str().to_string(), to_templates(WORDPRESS_ENDPOINTS));
        Self { sets }
    }
}

fn to_templates(table: &[(&str, &str)]) -> Vec<EndpointTemplate> {
    table
        .iter()
        .map(|(category, suffix)| EndpointTemplate::new(*category, *suffix))
        .collect()
}

impl EndpointCatalog {
    /// Built-in sets with configured overrides applied
    pub fn from_config(config: &SitemapConfig) -> Self {
        let mut catalog = Self::default();
        for (site_type, templates) in &config.endpoints {
            catalog.set(SiteType::from(site_type.as_str()), templates.clone());
        }
        catalog
    }

    /// Replace (or add) the endpoint set of a platform
    pub fn set(&mut self, site_type: SiteType, templates: Vec<EndpointTemplate>) {
        self.sets.insert(site_type.as_str().to_string(), templates);
    }

    pub fn templates(&self, site_type: &SiteType) -> Option<&[EndpointTemplate]> {
        self.sets.get(site_type.as_str()).map(Vec::as_slice)
    }

    /// Endpoint URLs for a site, or `None` if its platform is unknown
    pub fn endpoints_for(&self, site: &Site) -> Option<Vec<SitemapEndpoint>> {
        let base = site.clean_base_url();
        self.templates(&site.site_type).map(|templates| {
            templates
                .iter()
                .map(|template| SitemapEndpoint {
                    category: template.category.clone(),
                    url: format!("{}{}", base, template.suffix),
                })
                .collect()
        })
    }
}
