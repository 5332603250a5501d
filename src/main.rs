//! sitemirror: offline mirror for sitemap-driven blogs

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sitemirror::config::{Config, LogFormat, LoggingConfig};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sitemirror")]
#[command(about = "Offline mirror for sitemap-driven blogs")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "sitemirror.toml")]
    config: PathBuf,

    /// Data directory
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Work from the local store only
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Output directory
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// List configured sites
    Sites,

    /// Re-resolve a site's sitemap and cache missing documents
    Sync {
        /// Site index, id or base URL (defaults to the first site)
        site: Option<String>,
    },

    /// Cache missing documents from the stored sitemap
    Cache {
        /// Site index, id or base URL (defaults to the first site)
        site: Option<String>,
    },

    /// Open a document, fetching it if it is not cached
    Fetch {
        /// Document URL
        url: String,

        /// Site index, id or base URL (defaults to the site owning the URL)
        #[arg(short, long)]
        site: Option<String>,

        /// Refetch even if a cached copy exists
        #[arg(short, long)]
        force: bool,
    },

    /// Print a cached document
    Show {
        /// Document URL
        url: String,
    },

    /// List cached documents
    Ls {
        /// Path prefix
        #[arg(default_value = "/")]
        prefix: String,

        /// Only documents of this site (id or base URL)
        #[arg(short, long)]
        site: Option<String>,

        /// Only documents of this sitemap category
        #[arg(short = 'C', long)]
        category: Option<String>,
    },

    /// Show the cache status of every sitemap URL
    Status {
        /// Site index, id or base URL (defaults to the first site)
        site: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Delete a site and all of its cached documents
    DeleteSite {
        /// Site index, id or base URL
        site: String,
    },
}

fn init_logging(logging: &LoggingConfig, verbose: u8) -> Result<()> {
    let level = logging.level.more_verbose(verbose);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,sitemirror={}", level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let result = match logging.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };

    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }
    if cli.offline {
        config.offline = true;
    }

    init_logging(&config.logging, cli.verbose)?;
    debug!("Data directory: {}", config.storage.data_dir.display());

    match cli.command {
        Commands::Init { path } => commands::init::init_config(path).await,
        Commands::Sites => commands::sites::list_sites(config).await,
        Commands::Sync { site } => commands::sync::sync_site(config, site).await,
        Commands::Cache { site } => commands::sync::cache_site(config, site).await,
        Commands::Fetch { url, site, force } => {
            commands::documents::fetch_document(config, url, site, force).await
        }
        Commands::Show { url } => commands::documents::show_document(config, url).await,
        Commands::Ls {
            prefix,
            site,
            category,
        } => commands::documents::list_documents(config, prefix, site, category).await,
        Commands::Status { site, format } => {
            commands::status::show_status(config, site, format).await
        }
        Commands::DeleteSite { site } => commands::sites::delete_site(config, site).await,
    }
}
