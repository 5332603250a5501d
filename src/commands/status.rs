use anyhow::Result;
use serde::Serialize;
use sitemirror::{cache::CacheStatus, config::Config};
use std::collections::BTreeMap;

use super::Mirror;

#[derive(Serialize)]
struct UrlStatus<'a> {
    category: &'a str,
    url: &'a str,
    status: CacheStatus,
}

pub async fn show_status(config: Config, selector: Option<String>, format: String) -> Result<()> {
    let mirror = Mirror::open(&config).await?;
    let site = mirror.site(selector.as_deref())?;
    let orchestrator = mirror.session.orchestrator();

    let urls = site.sitemap_urls();
    let statuses: Vec<UrlStatus> = urls
        .iter()
        .map(|(category, url)| UrlStatus {
            category,
            url,
            status: orchestrator.status(url),
        })
        .collect();

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    if site.sitemap_tree.is_none() {
        println!("{}: sitemap not resolved yet", site.display_name());
        return Ok(());
    }

    let mut totals: BTreeMap<CacheStatus, usize> = BTreeMap::new();
    println!("\n{} ({})", site.display_name(), site.base_url);
    println!("==================");
    for entry in &statuses {
        *totals.entry(entry.status).or_default() += 1;
        println!("{:<10} {:<12} {}", entry.status, entry.category, entry.url);
    }

    println!();
    for (status, count) in totals {
        println!("{:<10} {}", status, count);
    }
    Ok(())
}
