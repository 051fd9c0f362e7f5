//! Phase and status enums.

use serde::{Deserialize, Serialize};

/// Phase of a deliberation round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Independent proposal generation
    Ideation,
    /// Every agent critiques every other proposal
    Critique,
    /// The auditor weighs proposals and critiques
    Audit,
    /// Decide between convergence, another round, or a question for the human
    ConvergenceCheck,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::Ideation,
        Phase::Critique,
        Phase::Audit,
        Phase::ConvergenceCheck,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Phase::Ideation => "ideation",
            Phase::Critique => "critique",
            Phase::Audit => "audit",
            Phase::ConvergenceCheck => "convergence_check",
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Phase::Ideation => "Ideation",
            Phase::Critique => "Critique",
            Phase::Audit => "Audit",
            Phase::ConvergenceCheck => "Convergence Check",
        }
    }

    pub fn emoji(&self) -> &str {
        match self {
            Phase::Ideation => "💡",
            Phase::Critique => "🔍",
            Phase::Audit => "⚖️",
            Phase::ConvergenceCheck => "🎯",
        }
    }

    /// Whether agents are called during this phase.
    pub fn is_agent_phase(&self) -> bool {
        !matches!(self, Phase::ConvergenceCheck)
    }

    /// Phase that follows within the same round.
    pub fn next(&self) -> Option<Phase> {
        match self {
            Phase::Ideation => Some(Phase::Critique),
            Phase::Critique => Some(Phase::Audit),
            Phase::Audit => Some(Phase::ConvergenceCheck),
            Phase::ConvergenceCheck => None,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Externally visible status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    AwaitingClarification,
    Converged,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Running => "running",
            RunStatus::AwaitingClarification => "awaiting_clarification",
            RunStatus::Converged => "converged",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal statuses never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Converged | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
