//! Structured description of the system a decision is made for.

use serde::{Deserialize, Serialize};

/// Whether a constraint must be met or is merely preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintSeverity {
    #[default]
    Hard,
    Soft,
}

impl ConstraintSeverity {
    pub fn as_str(&self) -> &str {
        match self {
            ConstraintSeverity::Hard => "HARD",
            ConstraintSeverity::Soft => "SOFT",
        }
    }
}

/// A constraint on the design (budget, timeline, technology...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    pub kind: String,
    pub description: String,
    #[serde(default)]
    pub severity: ConstraintSeverity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Performance target the design must meet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceSla {
    pub metric: String,
    pub target: String,
    #[serde(default = "default_priority")]
    pub priority: String,
}

fn default_priority() -> String {
    "high".to_string()
}

/// A system the new design has to integrate with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingSystem {
    pub name: String,
    pub kind: String,
    pub technology: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// The team that will build and run the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamInfo {
    pub size: u32,
    #[serde(default)]
    pub expertise: Vec<String>,
    #[serde(default = "default_experience")]
    pub experience_level: String,
}

fn default_experience() -> String {
    "senior".to_string()
}

/// Complete context about the system being designed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemContext {
    pub company_name: Option<String>,
    pub domain: Option<String>,
    pub current_tech_stack: Vec<String>,
    pub existing_systems: Vec<ExistingSystem>,
    pub constraints: Vec<Constraint>,
    pub performance_slas: Vec<PerformanceSla>,
    pub team: Option<TeamInfo>,
    pub additional_context: Option<String>,
}

impl SystemContext {
    pub fn is_empty(&self) -> bool {
        self == &SystemContext::default()
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Render the context as a prompt block.
    pub fn to_prompt_string(&self) -> String {
        let mut parts = Vec::new();

        if let Some(name) = &self.company_name {
            parts.push(format!("Company/Project: {}", name));
        }
        if let Some(domain) = &self.domain {
            parts.push(format!("Domain: {}", domain));
        }
        if !self.current_tech_stack.is_empty() {
            parts.push(format!(
                "Current Tech Stack: {}",
                self.current_tech_stack.join(", ")
            ));
        }
        if !self.existing_systems.is_empty() {
            let systems = self
                .existing_systems
                .iter()
                .map(|s| format!("  - {} ({}): {}", s.name, s.kind, s.technology))
                .collect::<Vec<_>>()
                .join("\n");
            parts.push(format!("Existing Systems:\n{}", systems));
        }
        if !self.constraints.is_empty() {
            let constraints = self
                .constraints
                .iter()
                .map(|c| format!("  - [{}] {}: {}", c.severity.as_str(), c.kind, c.description))
                .collect::<Vec<_>>()
                .join("\n");
            parts.push(format!("Constraints:\n{}", constraints));
        }
        if !self.performance_slas.is_empty() {
            let slas = self
                .performance_slas
                .iter()
                .map(|s| format!("  - {}: {} (Priority: {})", s.metric, s.target, s.priority))
                .collect::<Vec<_>>()
                .join("\n");
            parts.push(format!("Performance SLAs:\n{}", slas));
        }
        if let Some(team) = &self.team {
            parts.push(format!(
                "Team: {} members, {} level, expertise in {}",
                team.size,
                team.experience_level,
                team.expertise.join(", ")
            ));
        }
        if let Some(extra) = &self.additional_context {
            parts.push(format!("Additional Context: {}", extra));
        }

        if parts.is_empty() {
            "No additional context provided.".to_string()
        } else {
            parts.join("\n\n")
        }
    }

    /// Constraint descriptions, in declaration order.
    pub fn constraint_descriptions(&self) -> Vec<String> {
        self.constraints
            .iter()
            .map(|c| c.description.clone())
            .collect()
    }
}
