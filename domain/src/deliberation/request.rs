//! What an agent is shown when it is asked to act.

use serde::{Deserialize, Serialize};

use super::phase::Phase;
use super::records::{AnsweredClarification, AuditDecision, Critique, Proposal};
use crate::core::ids::{AgentId, RunId};
use crate::schema::AuditVerdict;

/// Condensed view of the previous round's audit, for the next ideation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditDigest {
    pub round: u32,
    pub verdict: AuditVerdict,
    pub rationale: String,
    pub synthesis_recommendation: Option<String>,
}

impl From<&AuditDecision> for AuditDigest {
    fn from(audit: &AuditDecision) -> Self {
        Self {
            round: audit.round,
            verdict: audit.content.verdict,
            rationale: audit.content.rationale.clone(),
            synthesis_recommendation: audit.content.synthesis_recommendation.clone(),
        }
    }
}

/// Phase-specific material handed to the agent.
///
/// Ideation carries nothing from other agents, and critique carries only
/// proposals, so no request can expose same-phase sibling output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum RequestPayload {
    Ideation,
    Critique {
        targets: Vec<Proposal>,
    },
    Audit {
        proposals: Vec<Proposal>,
        critiques: Vec<Critique>,
    },
}

impl RequestPayload {
    pub fn phase(&self) -> Phase {
        match self {
            RequestPayload::Ideation => Phase::Ideation,
            RequestPayload::Critique { .. } => Phase::Critique,
            RequestPayload::Audit { .. } => Phase::Audit,
        }
    }
}

/// A single call to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub run_id: RunId,
    pub agent: AgentId,
    pub round: u32,
    pub question: String,
    /// Rendered system context.
    pub context: String,
    /// Private persona of the addressed agent; never shared with others.
    pub brief: Option<String>,
    pub clarifications: Vec<AnsweredClarification>,
    pub previous_audit: Option<AuditDigest>,
    pub payload: RequestPayload,
    /// Set on a corrective re-request after invalid output.
    pub correction: Option<String>,
}

impl AgentRequest {
    pub fn phase(&self) -> Phase {
        self.payload.phase()
    }

    /// Ids the reply must refer to (critique targets).
    pub fn expected_targets(&self) -> Vec<String> {
        match &self.payload {
            RequestPayload::Critique { targets } => targets.iter().map(|p| p.id.clone()).collect(),
            _ => Vec::new(),
        }
    }

    pub fn with_correction(mut self, hint: impl Into<String>) -> Self {
        self.correction = Some(hint.into());
        self
    }
}
