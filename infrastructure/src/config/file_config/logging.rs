//! Log locations from TOML (`[logging]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw logging configuration from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// Write every run event to `<journal_dir>/<run_id>.events.jsonl`
    pub journal: bool,
    /// Journal directory (defaults to the user data dir)
    pub journal_dir: Option<PathBuf>,
    /// Daily-rolling diagnostic log directory; unset disables file logging
    pub file_log_dir: Option<PathBuf>,
}

impl Default for FileLoggingConfig {
    fn default() -> Self {
        Self {
            journal: true,
            journal_dir: None,
            file_log_dir: None,
        }
    }
}

impl FileLoggingConfig {
    /// Journal directory, falling back to `$XDG_DATA_HOME/adr-council/journal`.
    pub fn resolved_journal_dir(&self) -> Option<PathBuf> {
        if !self.journal {
            return None;
        }
        self.journal_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("adr-council").join("journal")))
    }
}
