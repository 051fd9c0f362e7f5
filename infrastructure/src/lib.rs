//! Infrastructure layer for adr-council
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: the HTTP agent gateway, the file-backed
//! run store, the JSONL event journal and configuration file loading.

pub mod agents;
pub mod config;
pub mod logging;
pub mod storage;

// Re-export commonly used types
pub use agents::{
    AgentModel, CircuitBreakerGateway, CircuitState, OpenAiCompatibleGateway, extract_json,
};
pub use config::{
    ConfigIssue, ConfigLoader, ConfigValidationError, FileAgentConfig, FileConfig,
    FileCouncilConfig, FileDeliberationConfig, FileLoggingConfig, FileProviderConfig,
    FileStorageConfig, Severity, StorageBackend,
};
pub use logging::JsonlEventJournal;
pub use storage::FileRunStore;
