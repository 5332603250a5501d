use anyhow::Result;
use sitemirror::{cache::CacheStatus, config::Config, store::DocumentStore};

use super::Mirror;

pub async fn list_sites(config: Config) -> Result<()> {
    let mirror = Mirror::open(&config).await?;
    let sites = mirror.session.sites();
    let orchestrator = mirror.session.orchestrator();

    if sites.is_empty() {
        println!("No sites configured.");
        return Ok(());
    }

    println!("\nSites ({}):", if mirror.session.is_online() { "online" } else { "offline" });
    println!("==================");
    for (index, site) in sites.iter().enumerate() {
        println!("[{}] {} ({})", index, site.display_name(), site.site_type);
        println!("    id:      {}", site.id);
        println!("    url:     {}", site.base_url);

        match &site.sitemap_tree {
            Some(tree) => {
                let urls = site.sitemap_urls();
                let cached = urls
                    .iter()
                    .filter(|(_, url)| orchestrator.status(url) == CacheStatus::Success)
                    .count();
                println!("    synced:  {}", site.update_date.format("%Y-%m-%d %H:%M UTC"));
                println!("    cached:  {}/{}", cached, urls.len());
                for category in tree.categories() {
                    let count = tree.get(category).map(|e| e.len()).unwrap_or_default();
                    println!("      {:<12} {}", category, count);
                }
            }
            None => println!("    sitemap: not resolved yet"),
        }
    }

    println!("\nStored documents: {}", mirror.store.document_count());
    Ok(())
}

pub async fn delete_site(config: Config, selector: String) -> Result<()> {
    let mirror = Mirror::open(&config).await?;
    let site = mirror.site(Some(&selector))?;

    let removed = mirror.session.delete_site(&site.id)?;
    mirror.close()?;

    println!("Deleted {} and {} cached documents", site.display_name(), removed);
    println!("It will be loaded again on next start while it is still configured.");
    Ok(())
}
