//! Model provider from TOML (`[provider]` section)
//!
//! ```toml
//! [provider]
//! base_url = "https://api.openai.com/v1"
//! api_key_env = "OPENAI_API_KEY"
//! temperature = 0.3
//! request_timeout_seconds = 180
//! failure_threshold = 5
//! reset_timeout_seconds = 30
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw provider configuration from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProviderConfig {
    /// OpenAI-compatible API root
    pub base_url: String,
    /// Environment variable holding the API key; unset means no auth header
    pub api_key_env: Option<String>,
    pub temperature: f64,
    pub request_timeout_seconds: u64,
    /// Consecutive transport failures that open the circuit breaker; 0 disables it
    pub failure_threshold: u32,
    /// Seconds an open breaker waits before letting a trial call through
    pub reset_timeout_seconds: u64,
}

impl Default for FileProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            temperature: 0.3,
            request_timeout_seconds: 180,
            failure_threshold: 5,
            reset_timeout_seconds: 30,
        }
    }
}

impl FileProviderConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.reset_timeout_seconds)
    }

    pub fn circuit_breaker_enabled(&self) -> bool {
        self.failure_threshold > 0
    }
}
