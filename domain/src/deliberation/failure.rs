//! Why an agent call or a whole run failed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::phase::Phase;
use crate::schema::ValidationError;

/// Permanent failure of one agent for one phase, after retries.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentFailure {
    #[error("agent timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("agent error: {message}")]
    Error { message: String },

    #[error("invalid output: {error}")]
    Validation { error: ValidationError },
}

impl AgentFailure {
    pub fn is_timeout(&self) -> bool {
        matches!(self, AgentFailure::Timeout { .. })
    }
}

/// Terminal failure of a run.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("quorum not met in {phase} of round {round}: {responded} of {required} required agents responded")]
    QuorumNotMet {
        phase: Phase,
        round: u32,
        responded: usize,
        required: usize,
    },

    #[error("auditor unavailable in round {round}: {detail}")]
    AuditorUnavailable { round: u32, detail: String },

    #[error("no convergence after {rounds} rounds")]
    ConvergenceExhausted { rounds: u32 },
}

impl FailureReason {
    pub fn as_str(&self) -> &str {
        match self {
            FailureReason::QuorumNotMet { .. } => "quorum_not_met",
            FailureReason::AuditorUnavailable { .. } => "auditor_unavailable",
            FailureReason::ConvergenceExhausted { .. } => "convergence_exhausted",
        }
    }
}
