//! Council membership from TOML (`[council]` section)
//!
//! Example configuration:
//!
//! ```toml
//! [[council.agents]]
//! id = "architect"
//! model = "gpt-4o"
//! brief = "Senior systems architect focused on consistency trade-offs"
//!
//! [council.auditor]
//! id = "auditor"
//! model = "gpt-4o"
//! ```

use council_application::AgentProfile;
use serde::{Deserialize, Serialize};

use super::ConfigValidationError;

/// One council member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAgentConfig {
    pub id: String,
    pub model: String,
    /// Private persona sent only to this agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brief: Option<String>,
}

impl FileAgentConfig {
    fn new(id: &str, model: &str, brief: &str) -> Self {
        Self {
            id: id.to_string(),
            model: model.to_string(),
            brief: Some(brief.to_string()),
        }
    }

    pub(super) fn issues(&self, field: &str) -> Vec<ConfigValidationError> {
        let mut issues = Vec::new();
        if self.id.trim().is_empty() {
            issues.push(ConfigValidationError::EmptyAgentId {
                field: format!("{}.id", field),
            });
        }
        if self.model.trim().is_empty() {
            issues.push(ConfigValidationError::EmptyModelName {
                field: format!("{}.model", field),
            });
        }
        issues
    }

    pub fn to_profile(&self) -> AgentProfile {
        let profile = AgentProfile::new(self.id.trim());
        match self.brief.as_deref().map(str::trim) {
            Some(brief) if !brief.is_empty() => profile.with_brief(brief),
            _ => profile,
        }
    }
}

/// Raw council configuration from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCouncilConfig {
    /// Proposers and critics, in tie-breaking order
    pub agents: Vec<FileAgentConfig>,
    /// Designated auditor
    pub auditor: FileAgentConfig,
}

impl Default for FileCouncilConfig {
    fn default() -> Self {
        Self {
            agents: vec![
                FileAgentConfig::new(
                    "architect",
                    "gpt-4o",
                    "You are a senior systems architect. Reason from first principles about \
                     consistency models, CAP trade-offs and scalability, and state your \
                     assumptions explicitly.",
                ),
                FileAgentConfig::new(
                    "engineer",
                    "gpt-4o",
                    "You are a senior software engineer. Turn concepts into buildable \
                     designs: concrete components, technologies, deployment and operations.",
                ),
            ],
            auditor: FileAgentConfig::new(
                "auditor",
                "gpt-4o",
                "You are a security and integration auditor. Weigh proposals against \
                 security, scalability and integration risks before accepting anything.",
            ),
        }
    }
}
