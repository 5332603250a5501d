use anyhow::Result;
use sitemirror::{config::Config, session::ResyncOutcome};
use tracing::info;

use super::{Mirror, Progress};

pub async fn sync_site(config: Config, selector: Option<String>) -> Result<()> {
    let mirror = Mirror::open(&config).await?;
    let site = mirror.site(selector.as_deref())?;

    info!("Syncing {}", site.display_name());
    let progress = Progress::spawn(mirror.session.orchestrator().subscribe());
    let outcome = mirror.session.resync(&site.id).await;
    progress.finish().await;
    mirror.close()?;

    match outcome? {
        ResyncOutcome::SkippedOffline => {
            println!("Offline: {} was not synced", site.display_name());
        }
        ResyncOutcome::Completed(report) => {
            println!("Synced {}: {}", site.display_name(), report);
        }
    }
    Ok(())
}

pub async fn cache_site(config: Config, selector: Option<String>) -> Result<()> {
    let mirror = Mirror::open(&config).await?;
    let site = mirror.site(selector.as_deref())?;

    if !mirror.session.is_online() {
        println!("Offline: nothing can be fetched for {}", site.display_name());
        return Ok(());
    }

    let orchestrator = mirror.session.orchestrator();
    let progress = Progress::spawn(orchestrator.subscribe());
    let result = orchestrator.cache_all(&site).await;
    progress.finish().await;
    mirror.close()?;

    let report = result?;
    println!("Cached {}: {}", site.display_name(), report);
    Ok(())
}
