//! Run events: the single source of truth for a run's history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::SystemContext;
use crate::convergence::ConvergenceVerdict;
use crate::core::ids::{AgentId, RunId};
use crate::core::question::Question;
use crate::deliberation::adr::ArchitectureDecisionRecord;
use crate::deliberation::failure::{AgentFailure, FailureReason};
use crate::deliberation::phase::Phase;
use crate::deliberation::records::{
    AuditDecision, ClarificationAnswer, ClarificationRequest, Critique, Proposal,
};

/// How a single agent call ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResponseOutcome {
    Accepted,
    NeedsInformation { question: String },
    Failed { failure: AgentFailure },
}

impl ResponseOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, ResponseOutcome::Failed { .. })
    }
}

/// Typed payload of a [`RunEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    RunCreated {
        question: Question,
        context: Option<SystemContext>,
        max_rounds: u32,
    },
    PhaseStarted {
        phase: Phase,
        round: u32,
    },
    AgentResponded {
        agent: AgentId,
        phase: Phase,
        round: u32,
        outcome: ResponseOutcome,
        attempts: u32,
    },
    ProposalRecorded {
        proposal: Proposal,
    },
    CritiqueRecorded {
        critique: Critique,
    },
    AuditRecorded {
        audit: AuditDecision,
    },
    ClarificationNeeded {
        request: ClarificationRequest,
    },
    ClarificationAnswered {
        answer: ClarificationAnswer,
    },
    PhaseCompleted {
        phase: Phase,
        round: u32,
        /// Wall time since the phase last started
        #[serde(default)]
        duration_ms: u64,
    },
    RoundCompleted {
        round: u32,
        verdict: ConvergenceVerdict,
    },
    RunConverged {
        artifact: Box<ArchitectureDecisionRecord>,
    },
    RunFailed {
        reason: FailureReason,
    },
    RunCancelled,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::RunCreated { .. } => "run_created",
            EventKind::PhaseStarted { .. } => "phase_started",
            EventKind::AgentResponded { .. } => "agent_responded",
            EventKind::ProposalRecorded { .. } => "proposal_recorded",
            EventKind::CritiqueRecorded { .. } => "critique_recorded",
            EventKind::AuditRecorded { .. } => "audit_recorded",
            EventKind::ClarificationNeeded { .. } => "clarification_needed",
            EventKind::ClarificationAnswered { .. } => "clarification_answered",
            EventKind::PhaseCompleted { .. } => "phase_completed",
            EventKind::RoundCompleted { .. } => "round_completed",
            EventKind::RunConverged { .. } => "run_converged",
            EventKind::RunFailed { .. } => "run_failed",
            EventKind::RunCancelled => "run_cancelled",
        }
    }

    /// Events after which nothing else can happen to the run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EventKind::RunConverged { .. } | EventKind::RunFailed { .. } | EventKind::RunCancelled
        )
    }
}

/// One entry in a run's totally ordered history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub run_id: RunId,
    /// Position in the run's log, starting at 0 with no gaps.
    pub sequence: u64,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}
