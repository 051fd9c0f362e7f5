//! Deliberation engine configuration.

use council_domain::AgentId;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

use super::retry::RetryPolicy;

/// A council member and its private persona.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentProfile {
    pub id: AgentId,
    /// Persona text included only in this agent's own requests.
    pub brief: Option<String>,
}

impl AgentProfile {
    pub fn new(id: impl Into<AgentId>) -> Self {
        Self {
            id: id.into(),
            brief: None,
        }
    }

    pub fn with_brief(mut self, brief: impl Into<String>) -> Self {
        self.brief = Some(brief.into());
        self
    }
}

/// Configuration problems detected before a run starts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("No agents configured")]
    NoAgents,

    #[error("Agent '{0}' is configured more than once")]
    DuplicateAgent(String),

    #[error("Quorum of {quorum} cannot be met by {agents} agents")]
    QuorumTooLarge { quorum: usize, agents: usize },

    #[error("Quorum must be at least 1")]
    ZeroQuorum,

    #[error("At least one round is required")]
    ZeroRounds,
}

/// Parameters for [`DeliberationEngine`](crate::use_cases::deliberation::DeliberationEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Proposers and critics, in the order used for tie-breaking.
    pub agents: Vec<AgentProfile>,
    pub auditor: AgentProfile,
    /// Successful agents required for ideation and critique.
    pub min_quorum: usize,
    /// Total rounds a run may execute.
    pub max_rounds: u32,
    /// Bound on each individual agent call.
    pub agent_timeout: Duration,
    pub agent_retry: RetryPolicy,
    pub persistence_retry: RetryPolicy,
}

impl EngineConfig {
    pub fn new(agents: Vec<AgentProfile>, auditor: AgentProfile) -> Self {
        Self {
            agents,
            auditor,
            min_quorum: 2,
            max_rounds: 3,
            agent_timeout: Duration::from_secs(120),
            agent_retry: RetryPolicy::default(),
            persistence_retry: RetryPolicy::default()
                .with_delays(Duration::from_millis(100), Duration::from_secs(2)),
        }
    }

    // ==================== Builder Methods ====================

    pub fn with_min_quorum(mut self, quorum: usize) -> Self {
        self.min_quorum = quorum;
        self
    }

    pub fn with_max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = rounds;
        self
    }

    pub fn with_agent_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout = timeout;
        self
    }

    pub fn with_agent_retry(mut self, retry: RetryPolicy) -> Self {
        self.agent_retry = retry;
        self
    }

    pub fn with_persistence_retry(mut self, retry: RetryPolicy) -> Self {
        self.persistence_retry = retry;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agents.is_empty() {
            return Err(ConfigError::NoAgents);
        }
        let mut seen = HashSet::new();
        for agent in &self.agents {
            if !seen.insert(agent.id.as_str()) {
                return Err(ConfigError::DuplicateAgent(agent.id.to_string()));
            }
        }
        if self.min_quorum == 0 {
            return Err(ConfigError::ZeroQuorum);
        }
        if self.min_quorum > self.agents.len() {
            return Err(ConfigError::QuorumTooLarge {
                quorum: self.min_quorum,
                agents: self.agents.len(),
            });
        }
        if self.max_rounds == 0 {
            return Err(ConfigError::ZeroRounds);
        }
        Ok(())
    }

    pub fn agent(&self, id: &AgentId) -> Option<&AgentProfile> {
        self.agents.iter().find(|a| &a.id == id)
    }
}
