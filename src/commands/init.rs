use anyhow::Result;
use sitemirror::config::{Config, DEFAULT_USER_AGENT};
use std::path::PathBuf;

pub async fn init_config(path: PathBuf) -> Result<()> {
    let config = Config::default();
    let config_path = path.join("sitemirror.toml");

    if config_path.exists() {
        anyhow::bail!("{} already exists", config_path.display());
    }

    let toml_content = format!(
        r#"# sitemirror configuration

# Start without network access (serve from the local store only)
offline = false

# JSON file with site descriptors: {{"defaultSites": [{{"baseUrl": "...", "type": "ghost"}}]}}
# sites_file = "default-sites.json"

# Inline site descriptors
# [[sites]]
# baseUrl = "https://blog.example.com"
# type = "ghost"            # ghost | wordpress
# name = "Example blog"

[storage]
data_dir = ".sitemirror"

[fetch]
mode = "direct"             # direct | proxy
proxy_url = "{}"
timeout_secs = {}
connect_timeout_secs = {}
user_agent = "{}"

# Sitemap endpoint sets per platform type. Built-in sets exist for ghost and
# wordpress; entries here replace them or add new platform types.
# [sitemap.endpoints]
# wordpress = [
#     {{ category = "posts", suffix = "/wp-sitemap-posts-post-1.xml" }},
#     {{ category = "pages", suffix = "/wp-sitemap-posts-page-1.xml" }},
#     {{ category = "authors", suffix = "/wp-sitemap-users-1.xml" }},
# ]

[logging]
format = "text"             # text | json
level = "info"
"#,
        config.fetch.proxy_url,
        config.fetch.timeout_secs,
        config.fetch.connect_timeout_secs,
        DEFAULT_USER_AGENT,
    );

    std::fs::create_dir_all(&path)?;
    std::fs::write(&config_path, toml_content)?;
    println!("Created configuration file: {}", config_path.display());

    let data_dir = path.join(".sitemirror");
    std::fs::create_dir_all(&data_dir)?;
    println!("Created data directory: {}", data_dir.display());

    Ok(())
}
