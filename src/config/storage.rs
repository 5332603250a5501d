//! Local storage configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Local storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory holding the document and site stores
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: directories::ProjectDirs::from("", "", "sitemirror")
                .map(|d| d.data_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".sitemirror")),
        }
    }
}
