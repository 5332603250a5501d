//! Sitemap endpoint configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One sitemap document of a platform: the category its URLs belong to and
/// the path appended to the site's base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointTemplate {
    pub category: String,
    pub suffix: String,
}

impl EndpointTemplate {
    pub fn new(category: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            suffix: suffix.into(),
        }
    }
}

/// Sitemap configuration
///
/// `endpoints` maps a platform type name to the endpoint set used for it,
/// replacing the built-in set for `ghost`/`wordpress` or adding a platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SitemapConfig {
    pub endpoints: BTreeMap<String, Vec<EndpointTemplate>>,
}
