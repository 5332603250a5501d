//! Page content processing
//!
//! Everything here is pure: HTML in, HTML (or a title) out. Network and
//! storage concerns live in the cache orchestrator.

mod dom;
mod sanitize;

pub use sanitize::{normalize, redact, sanitize, PLACEHOLDER_CLASS};

use scraper::{Html, Selector};

/// Text of the first non-empty `<title>` element
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;

    document
        .select(&selector)
        .map(|el| el.text().collect::<String>())
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|text| !text.is_empty())
}
