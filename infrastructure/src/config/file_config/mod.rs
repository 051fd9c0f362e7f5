//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into application types
//! once validated.

mod council;
mod deliberation;
mod logging;
mod provider;
mod storage;

pub use council::{FileAgentConfig, FileCouncilConfig};
pub use deliberation::FileDeliberationConfig;
pub use logging::FileLoggingConfig;
pub use provider::FileProviderConfig;
pub use storage::{FileStorageConfig, StorageBackend};

use crate::agents::AgentModel;
use council_application::{AgentProfile, EngineConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fatal: the configuration cannot work at all.
    Error,
    /// Non-fatal: the configuration works but may not behave as expected.
    Warning,
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigValidationError {
    #[error("council.agents is empty")]
    NoAgents,

    #[error("{field}: agent id cannot be empty")]
    EmptyAgentId { field: String },

    #[error("{field}: model name cannot be empty")]
    EmptyModelName { field: String },

    #[error("council.agents: '{0}' is configured more than once")]
    DuplicateAgent(String),

    #[error("council.auditor: '{0}' also sits on the council")]
    AuditorIsMember(String),

    #[error("deliberation.min_quorum ({quorum}) exceeds the number of agents ({agents})")]
    QuorumTooLarge { quorum: usize, agents: usize },

    #[error("deliberation.min_quorum cannot be 0")]
    ZeroQuorum,

    #[error("deliberation.max_rounds cannot be 0")]
    ZeroRounds,

    #[error("{field} cannot be 0")]
    ZeroTimeout { field: String },
}

/// A detected issue in the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub error: ConfigValidationError,
}

impl ConfigIssue {
    fn error(error: ConfigValidationError) -> Self {
        Self {
            severity: Severity::Error,
            error,
        }
    }

    fn warning(error: ConfigValidationError) -> Self {
        Self {
            severity: Severity::Warning,
            error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.error.fmt(f)
    }
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Council membership
    pub council: FileCouncilConfig,
    /// Quorum, round limits, timeouts and retries
    pub deliberation: FileDeliberationConfig,
    /// Where runs are persisted
    pub storage: FileStorageConfig,
    /// OpenAI-compatible endpoint used by every agent
    pub provider: FileProviderConfig,
    /// Event journal and file log locations
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let agents = &self.council.agents;

        if agents.is_empty() {
            issues.push(ConfigIssue::error(ConfigValidationError::NoAgents));
        }

        let mut seen = HashSet::new();
        for (index, agent) in agents.iter().enumerate() {
            issues.extend(
                agent
                    .issues(&format!("council.agents[{}]", index))
                    .into_iter()
                    .map(ConfigIssue::error),
            );
            if !agent.id.trim().is_empty() && !seen.insert(agent.id.trim()) {
                issues.push(ConfigIssue::error(ConfigValidationError::DuplicateAgent(
                    agent.id.clone(),
                )));
            }
        }

        let auditor = &self.council.auditor;
        issues.extend(
            auditor
                .issues("council.auditor")
                .into_iter()
                .map(ConfigIssue::error),
        );
        if seen.contains(auditor.id.trim()) {
            issues.push(ConfigIssue::warning(ConfigValidationError::AuditorIsMember(
                auditor.id.clone(),
            )));
        }

        issues.extend(
            self.deliberation
                .issues(agents.len())
                .into_iter()
                .map(ConfigIssue::error),
        );
        if self.provider.request_timeout_seconds == 0 {
            issues.push(ConfigIssue::error(ConfigValidationError::ZeroTimeout {
                field: "provider.request_timeout_seconds".to_string(),
            }));
        }

        issues
    }

    /// Engine parameters described by this file.
    ///
    /// Call [`FileConfig::validate`] first; this conversion does not check.
    pub fn to_engine_config(&self) -> EngineConfig {
        let agents = self
            .council
            .agents
            .iter()
            .map(FileAgentConfig::to_profile)
            .collect();
        let auditor: AgentProfile = self.council.auditor.to_profile();
        self.deliberation
            .apply(EngineConfig::new(agents, auditor))
    }

    /// Model assignment for every council member and the auditor.
    pub fn agent_models(&self) -> Vec<AgentModel> {
        self.council
            .agents
            .iter()
            .chain(std::iter::once(&self.council.auditor))
            .map(|agent| AgentModel {
                agent: agent.to_profile().id,
                model: agent.model.trim().to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_deserialize_full_config() {
        let toml_str = r#"
[[council.agents]]
id = "architect"
model = "gpt-4o"
brief = "Thinks in trade-offs"

[[council.agents]]
id = "engineer"
model = "claude-sonnet"

[[council.agents]]
id = "operator"
model = "llama3"

[council.auditor]
id = "auditor"
model = "gemini-flash"

[deliberation]
max_rounds = 5
min_quorum = 3
agent_timeout_seconds = 60

[storage]
backend = "memory"

[provider]
base_url = "http://localhost:11434/v1"
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_empty());
        assert_eq!(config.council.agents.len(), 3);
        assert_eq!(config.storage.backend, StorageBackend::Memory);

        let engine = config.to_engine_config();
        assert_eq!(engine.max_rounds, 5);
        assert_eq!(engine.min_quorum, 3);
        assert_eq!(engine.agent_timeout, Duration::from_secs(60));
        assert_eq!(engine.agents[0].brief.as_deref(), Some("Thinks in trade-offs"));
        assert_eq!(engine.auditor.id.as_str(), "auditor");
        assert!(engine.validate().is_ok());

        let models = config.agent_models();
        assert_eq!(models.len(), 4);
        assert_eq!(models[3].agent.as_str(), "auditor");
        assert_eq!(models[3].model, "gemini-flash");
    }

    #[test]
    fn test_deserialize_partial_config() {
        let toml_str = r#"
[deliberation]
max_rounds = 4
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.deliberation.max_rounds, 4);
        // Defaults should apply
        assert_eq!(config.deliberation.min_quorum, 2);
        assert_eq!(config.council, FileCouncilConfig::default());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = FileConfig::default();
        assert!(config.validate().is_empty());
        assert!(config.to_engine_config().validate().is_ok());
    }

    #[test]
    fn test_validate_collects_every_issue() {
        let toml_str = r#"
[[council.agents]]
id = "a"
model = ""

[[council.agents]]
id = "a"
model = "gpt-4o"

[council.auditor]
id = "a"
model = "gpt-4o"

[deliberation]
min_quorum = 3
max_rounds = 0
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        let issues: Vec<ConfigValidationError> =
            config.validate().into_iter().map(|i| i.error).collect();

        assert!(issues.contains(&ConfigValidationError::EmptyModelName {
            field: "council.agents[0].model".to_string()
        }));
        assert!(issues.contains(&ConfigValidationError::DuplicateAgent("a".to_string())));
        assert!(issues.contains(&ConfigValidationError::AuditorIsMember("a".to_string())));
        assert!(issues.contains(&ConfigValidationError::QuorumTooLarge {
            quorum: 3,
            agents: 2
        }));
        assert!(issues.contains(&ConfigValidationError::ZeroRounds));
    }

    #[test]
    fn test_auditor_on_council_is_only_a_warning() {
        let mut config = FileConfig::default();
        config.council.auditor.id = config.council.agents[0].id.clone();
        let issues = config.validate();
        assert_eq!(issues.len(), 1);
        assert!(!issues[0].is_error());
    }
}
