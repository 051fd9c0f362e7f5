//! Deliberation limits from TOML (`[deliberation]` section)
//!
//! ```toml
//! [deliberation]
//! max_rounds = 3
//! min_quorum = 2
//! agent_timeout_seconds = 120
//! max_retries = 2
//! retry_base_delay_ms = 1000
//! retry_max_delay_ms = 30000
//! persistence_retries = 2
//! ```

use council_application::{EngineConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ConfigValidationError;

/// Raw deliberation configuration from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDeliberationConfig {
    /// Rounds a run may execute before failing
    pub max_rounds: u32,
    /// Successful agents required in ideation and critique
    pub min_quorum: usize,
    /// Bound on each agent call
    pub agent_timeout_seconds: u64,
    /// Retries after a timeout or error, per agent and phase
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// Retries of a failed save before the step is abandoned
    pub persistence_retries: u32,
}

impl Default for FileDeliberationConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            min_quorum: 2,
            agent_timeout_seconds: 120,
            max_retries: 2,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 30_000,
            persistence_retries: 2,
        }
    }
}

impl FileDeliberationConfig {
    pub(super) fn issues(&self, agents: usize) -> Vec<ConfigValidationError> {
        let mut issues = Vec::new();
        if self.max_rounds == 0 {
            issues.push(ConfigValidationError::ZeroRounds);
        }
        if self.min_quorum == 0 {
            issues.push(ConfigValidationError::ZeroQuorum);
        } else if agents > 0 && self.min_quorum > agents {
            issues.push(ConfigValidationError::QuorumTooLarge {
                quorum: self.min_quorum,
                agents,
            });
        }
        if self.agent_timeout_seconds == 0 {
            issues.push(ConfigValidationError::ZeroTimeout {
                field: "deliberation.agent_timeout_seconds".to_string(),
            });
        }
        issues
    }

    pub(super) fn apply(&self, config: EngineConfig) -> EngineConfig {
        let agent_retry = RetryPolicy::default()
            .with_max_retries(self.max_retries)
            .with_delays(
                Duration::from_millis(self.retry_base_delay_ms),
                Duration::from_millis(self.retry_max_delay_ms),
            );
        let persistence_retry = config
            .persistence_retry
            .clone()
            .with_max_retries(self.persistence_retries);
        config
            .with_max_rounds(self.max_rounds)
            .with_min_quorum(self.min_quorum)
            .with_agent_timeout(Duration::from_secs(self.agent_timeout_seconds))
            .with_agent_retry(agent_retry)
            .with_persistence_retry(persistence_retry)
    }
}
