//! Remote fetch configuration

use serde::{Deserialize, Serialize};

use super::DEFAULT_USER_AGENT;

/// Transport used to reach source sites
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// POST `{url, action}` to the fetch proxy
    Proxy,
    /// GET source URLs directly
    Direct,
}

/// Remote fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Fetch transport
    pub mode: FetchMode,
    /// Proxy endpoint (used when `mode = "proxy"`)
    pub proxy_url: String,
    /// Request timeout (seconds)
    pub timeout_secs: u64,
    /// Connection timeout (seconds)
    pub connect_timeout_secs: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            mode: FetchMode::Direct,
            proxy_url: "http://127.0.0.1:8080/proxy".to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}
