use anyhow::{Context, Result};
use sitemirror::{
    config::Config,
    store::{DocumentStore, SiteStore},
    types::Document,
    util::truncate_str,
};

use super::{find_site, Mirror};

pub async fn fetch_document(
    config: Config,
    url: String,
    selector: Option<String>,
    force: bool,
) -> Result<()> {
    let mirror = Mirror::open(&config).await?;

    let site = match selector {
        Some(selector) => mirror.site(Some(&selector))?,
        None => mirror
            .session
            .sites()
            .into_iter()
            .find(|site| site.owns_url(&url))
            .with_context(|| format!("No configured site owns {}", url))?,
    };

    let document = mirror
        .session
        .orchestrator()
        .open_document(&site, &url, force)
        .await?;
    mirror.close()?;

    match document {
        Some(document) => print_summary(&document),
        None => println!(
            "{} is not cached ({})",
            url,
            mirror.session.orchestrator().status(&url)
        ),
    }
    Ok(())
}

pub async fn show_document(config: Config, url: String) -> Result<()> {
    let store = Mirror::open_store(&config)?;

    let Some(document) = store.get_by_url(&url)? else {
        println!("{} is not cached", url);
        return Ok(());
    };

    print_summary(&document);
    println!();
    println!("{}", document.content);
    Ok(())
}

pub async fn list_documents(
    config: Config,
    prefix: String,
    site: Option<String>,
    category: Option<String>,
) -> Result<()> {
    let store = Mirror::open_store(&config)?;

    let site_id = match site {
        Some(selector) => {
            let sites = store.all_sites()?;
            let position = find_site(&sites, &selector)
                .with_context(|| format!("Unknown site '{}'", selector))?;
            Some(sites[position].id.clone())
        }
        None => None,
    };

    let documents: Vec<Document> = match (&site_id, &category) {
        (Some(site_id), Some(category)) => store
            .documents_for_category(site_id, category)?
            .into_iter()
            .filter(|doc| doc.path.starts_with(&prefix))
            .collect(),
        _ => store
            .scan_by_path_prefix(&prefix)?
            .into_iter()
            .filter(|doc| site_id.is_none() || doc.site_id == site_id)
            .filter(|doc| category.is_none() || doc.category == category)
            .collect(),
    };

    if documents.is_empty() {
        println!("No cached documents under {}", prefix);
        return Ok(());
    }

    for document in &documents {
        println!(
            "{:<50} {:<12} {}",
            truncate_str(&document.path, 50),
            document.category.as_deref().unwrap_or("-"),
            truncate_str(&document.title, 60)
        );
    }
    println!("\n{} documents", documents.len());
    Ok(())
}

fn print_summary(document: &Document) {
    println!("Title:    {}", document.title);
    println!("URL:      {}", document.original_url);
    println!("Path:     {} (depth {})", document.path, document.depth);
    println!("Category: {}", document.category.as_deref().unwrap_or("-"));
    println!("Id:       {}", document.uuid);
    println!("Cached:   {}", document.update_date.format("%Y-%m-%d %H:%M UTC"));
    println!("Size:     {} bytes", document.content.len());
}
