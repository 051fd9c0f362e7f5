//! Run storage from TOML (`[storage]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Where runs are kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON file per run
    #[default]
    File,
    /// Process memory; nothing survives a restart
    Memory,
}

/// Raw storage configuration from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStorageConfig {
    pub backend: StorageBackend,
    /// Directory for run files (defaults to the user data dir)
    pub dir: Option<PathBuf>,
    /// Finished runs older than this are removed on startup
    pub ttl_days: Option<u64>,
}

impl Default for FileStorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            dir: None,
            ttl_days: Some(7),
        }
    }
}

impl FileStorageConfig {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_days
            .filter(|days| *days > 0)
            .map(|days| Duration::from_secs(days * 24 * 3600))
    }
}
