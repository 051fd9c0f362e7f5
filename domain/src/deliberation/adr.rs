//! The Architecture Decision Record produced by a converged run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::records::{AnsweredClarification, Proposal, Round};
use crate::context::SystemContext;
use crate::core::error::DomainError;
use crate::core::ids::AgentId;
use crate::core::question::Question;
use crate::schema::{AuditVerdict, Risk};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdrStatus {
    Accepted,
}

/// Points back at the audit the decision was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReference {
    pub round: u32,
    pub auditor: AgentId,
    pub verdict: AuditVerdict,
}

/// Final artifact of a converged run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureDecisionRecord {
    pub title: String,
    pub status: AdrStatus,
    pub decided_at: DateTime<Utc>,
    pub decision: String,
    pub rationale: String,
    pub context: String,
    pub constraints: Vec<String>,
    /// Questions the council asked the human during the run, with answers.
    #[serde(default)]
    pub clarifications: Vec<AnsweredClarification>,
    pub majority_opinion: Proposal,
    pub minority_report: Option<String>,
    pub alternatives_considered: Vec<String>,
    pub positive_consequences: Vec<String>,
    pub negative_consequences: Vec<String>,
    pub risks: Vec<Risk>,
    pub mermaid_diagram: Option<String>,
    pub consensus_level: f64,
    pub rounds_taken: u32,
    pub source: AuditReference,
}

impl ArchitectureDecisionRecord {
    /// Build the record from an audited round.
    ///
    /// The majority opinion is the auditor's preferred proposal, or the most
    /// confident one when the auditor did not pick.
    pub fn compose(
        question: &Question,
        context: Option<&SystemContext>,
        clarifications: &[AnsweredClarification],
        round: &Round,
        decided_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let audit = round
            .audit
            .as_ref()
            .ok_or(DomainError::MissingAudit(round.sequence))?;

        let preferred = audit
            .content
            .preferred_proposal
            .as_deref()
            .and_then(|id| round.proposal(id));
        let majority = match preferred {
            Some(p) => p,
            None => most_confident(&round.proposals).ok_or_else(|| {
                DomainError::InvalidTransition(format!(
                    "round {} has no proposals to decide between",
                    round.sequence
                ))
            })?,
        };
        let others: Vec<&Proposal> = round
            .proposals
            .iter()
            .filter(|p| p.id != majority.id)
            .collect();

        let minority_report = if others.is_empty() {
            None
        } else if preferred.is_some() {
            let sections: Vec<String> = others
                .iter()
                .map(|p| {
                    let concerns: Vec<String> = round
                        .critiques_of(&p.id)
                        .flat_map(|c| c.content.concerns.iter().cloned())
                        .take(3)
                        .collect();
                    let mut section = format!(
                        "{} proposed: {}\n{}",
                        p.author, p.content.title, p.content.summary
                    );
                    if !concerns.is_empty() {
                        section.push_str(&format!("\n\nKey differences: {}", concerns.join(", ")));
                    }
                    section
                })
                .collect();
            Some(sections.join("\n\n"))
        } else {
            let authors: Vec<&str> = others.iter().map(|p| p.author.as_str()).collect();
            let mut report = format!(
                "Partially incorporated proposals from: {}.",
                authors.join(", ")
            );
            if let Some(synthesis) = &audit.content.synthesis_recommendation {
                report.push(' ');
                report.push_str(synthesis);
            }
            Some(report)
        };

        let consensus_level = round
            .average_agreement()
            .unwrap_or(audit.content.consensus_level);

        let risks: Vec<Risk> = if audit.content.risks.is_empty() {
            majority.content.risks.iter().take(5).cloned().collect()
        } else {
            audit.content.risks.iter().take(5).cloned().collect()
        };

        Ok(Self {
            title: format!("ADR: {}", majority.content.title),
            status: AdrStatus::Accepted,
            decided_at,
            decision: majority.content.summary.clone(),
            rationale: audit.content.rationale.clone(),
            context: question.content().to_string(),
            constraints: context
                .map(|c| c.constraint_descriptions())
                .unwrap_or_default(),
            clarifications: clarifications.to_vec(),
            majority_opinion: majority.clone(),
            minority_report,
            alternatives_considered: others
                .iter()
                .map(|p| format!("{}: {}", p.content.title, p.content.approach))
                .collect(),
            positive_consequences: majority
                .content
                .trade_offs
                .iter()
                .filter(|t| !t.rationale.is_empty())
                .map(|t| t.rationale.clone())
                .take(3)
                .collect(),
            negative_consequences: audit
                .content
                .integration_concerns
                .iter()
                .take(3)
                .cloned()
                .collect(),
            risks,
            mermaid_diagram: majority.content.mermaid_diagram.clone(),
            consensus_level,
            rounds_taken: round.sequence + 1,
            source: AuditReference {
                round: audit.round,
                auditor: audit.auditor.clone(),
                verdict: audit.content.verdict,
            },
        })
    }
}

/// Highest confidence wins; ties go to the earlier proposal.
fn most_confident(proposals: &[Proposal]) -> Option<&Proposal> {
    proposals.iter().fold(None, |best: Option<&Proposal>, p| match best {
        Some(b) if b.content.confidence >= p.content.confidence => Some(b),
        _ => Some(p),
    })
}
