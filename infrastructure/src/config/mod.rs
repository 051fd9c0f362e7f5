//! Configuration file loading for adr-council
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. Environment variables prefixed `COUNCIL_` (`__` separates sections)
//! 2. `--config <path>` specified file
//! 3. Project root: `./council.toml` or `./.council.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/adr-council/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigIssue, ConfigValidationError, FileAgentConfig, FileConfig, FileCouncilConfig,
    FileDeliberationConfig, FileLoggingConfig, FileProviderConfig, FileStorageConfig, Severity,
    StorageBackend,
};
pub use loader::ConfigLoader;
