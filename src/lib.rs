//! sitemirror: offline mirror for sitemap-driven blogs
//!
//! Discovers the content of Ghost and WordPress sites through their sitemaps,
//! fetches and sanitizes every page, and keeps the result in a local store so
//! it can be read without network access:
//! - Sitemap resolution per platform endpoint set (`sitemap`)
//! - Offline-safe HTML rewriting (`content`)
//! - Fetch → sanitize → store pipeline with per-URL status (`cache`)
//! - Site list, selection and resync (`session`)
//! - sled-backed document and site storage (`store`)

pub mod cache;
pub mod config;
pub mod content;
pub mod fetch;
pub mod session;
pub mod sitemap;
pub mod store;
pub mod types;
pub mod util;

pub use config::Config;
pub use types::*;
