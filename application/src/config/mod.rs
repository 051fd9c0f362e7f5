//! Application-level configuration.
//!
//! - [`EngineConfig`]: council membership, quorum and round limits, timeouts
//! - [`RetryPolicy`]: backoff for agent calls and persistence

pub mod engine_config;
pub mod retry;

pub use engine_config::{AgentProfile, ConfigError, EngineConfig};
pub use retry::RetryPolicy;
