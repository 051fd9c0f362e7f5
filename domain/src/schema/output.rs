//! Typed phase outputs.

use serde::{Deserialize, Serialize};

use crate::deliberation::phase::Phase;

/// Severity of a risk raised in a proposal or audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskSeverity {
    pub const ALL: [RiskSeverity; 4] = [
        RiskSeverity::Low,
        RiskSeverity::Medium,
        RiskSeverity::High,
        RiskSeverity::Critical,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            RiskSeverity::Low => "low",
            RiskSeverity::Medium => "medium",
            RiskSeverity::High => "high",
            RiskSeverity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub technology: String,
    pub description: String,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOff {
    pub aspect: String,
    pub choice: String,
    pub rationale: String,
    pub alternatives: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub category: String,
    pub severity: RiskSeverity,
    pub description: String,
    pub mitigation: String,
}

/// A proposed architecture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdeationOutput {
    pub title: String,
    pub summary: String,
    pub approach: String,
    pub components: Vec<Component>,
    pub trade_offs: Vec<TradeOff>,
    pub risks: Vec<Risk>,
    pub confidence: f64,
    pub uncertainties: Vec<String>,
    pub mermaid_diagram: Option<String>,
    pub clarification_needed: Option<String>,
}

/// One agent's critique of one other proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetCritique {
    /// Proposal id being critiqued.
    pub target: String,
    pub agreement: f64,
    pub blocking: bool,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub concerns: Vec<String>,
    pub suggestions: Vec<String>,
}

/// Everything one agent said during the critique phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CritiqueOutput {
    pub critiques: Vec<TargetCritique>,
    pub clarification_needed: Option<String>,
}

/// The auditor's overall verdict on a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditVerdict {
    Accept,
    Revise,
    Reject,
}

impl AuditVerdict {
    pub const ALL: [AuditVerdict; 3] = [AuditVerdict::Accept, AuditVerdict::Revise, AuditVerdict::Reject];

    pub fn as_str(&self) -> &str {
        match self {
            AuditVerdict::Accept => "accept",
            AuditVerdict::Revise => "revise",
            AuditVerdict::Reject => "reject",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl std::fmt::Display for AuditVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The auditor's assessment of a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditOutput {
    pub verdict: AuditVerdict,
    /// Proposal id the auditor prefers, if any.
    pub preferred_proposal: Option<String>,
    pub rationale: String,
    pub synthesis_recommendation: Option<String>,
    pub risks: Vec<Risk>,
    pub integration_concerns: Vec<String>,
    pub security_issues: Vec<String>,
    /// Critique ids the auditor considers addressed.
    pub resolved_critiques: Vec<String>,
    pub consensus_level: f64,
    pub clarification_needed: Option<String>,
}

/// Validated output of an agent phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PhaseOutput {
    Ideation(IdeationOutput),
    Critique(CritiqueOutput),
    Audit(AuditOutput),
}

impl PhaseOutput {
    pub fn phase(&self) -> Phase {
        match self {
            PhaseOutput::Ideation(_) => Phase::Ideation,
            PhaseOutput::Critique(_) => Phase::Critique,
            PhaseOutput::Audit(_) => Phase::Audit,
        }
    }

    pub fn clarification_needed(&self) -> Option<&str> {
        match self {
            PhaseOutput::Ideation(o) => o.clarification_needed.as_deref(),
            PhaseOutput::Critique(o) => o.clarification_needed.as_deref(),
            PhaseOutput::Audit(o) => o.clarification_needed.as_deref(),
        }
    }
}
