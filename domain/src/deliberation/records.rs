//! Append-only records produced during a round.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::phase::Phase;
use crate::convergence::ConvergenceVerdict;
use crate::core::ids::AgentId;
use crate::schema::{AuditOutput, IdeationOutput, TargetCritique};

/// Id of a proposal: `r{round}:{author}`.
pub fn proposal_id(round: u32, author: &AgentId) -> String {
    format!("r{}:{}", round, author)
}

/// Id of a critique: `r{round}:{author}->{target author}`.
pub fn critique_id(round: u32, author: &AgentId, target_author: &AgentId) -> String {
    format!("r{}:{}->{}", round, author, target_author)
}

/// One agent's proposed architecture for a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    pub author: AgentId,
    pub round: u32,
    pub content: IdeationOutput,
    pub recorded_at: DateTime<Utc>,
}

impl Proposal {
    pub fn new(author: AgentId, round: u32, content: IdeationOutput, at: DateTime<Utc>) -> Self {
        Self {
            id: proposal_id(round, &author),
            author,
            round,
            content,
            recorded_at: at,
        }
    }
}

/// One agent's critique of another agent's proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Critique {
    pub id: String,
    pub author: AgentId,
    pub round: u32,
    pub target: String,
    pub target_author: AgentId,
    pub content: TargetCritique,
    /// Open question the author attached to its critique output, if any.
    pub clarification_needed: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl Critique {
    pub fn new(
        author: AgentId,
        target: &Proposal,
        content: TargetCritique,
        clarification_needed: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: critique_id(target.round, &author, &target.author),
            author,
            round: target.round,
            target: target.id.clone(),
            target_author: target.author.clone(),
            content,
            clarification_needed,
            recorded_at: at,
        }
    }
}

/// The auditor's decision for a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditDecision {
    pub round: u32,
    pub auditor: AgentId,
    pub content: AuditOutput,
    pub recorded_at: DateTime<Utc>,
}

/// A blocking question for the human.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationRequest {
    /// `clr-{n}`, numbered across the whole run.
    pub id: String,
    pub agent: AgentId,
    pub question: String,
    pub round: u32,
    pub phase: Phase,
    pub raised_at: DateTime<Utc>,
}

/// The human's answer to a [`ClarificationRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationAnswer {
    pub request_id: String,
    pub text: String,
    pub answered_at: DateTime<Utc>,
}

/// A clarification as it lives inside a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationRecord {
    pub request: ClarificationRequest,
    pub answer: Option<ClarificationAnswer>,
}

impl ClarificationRecord {
    pub fn is_answered(&self) -> bool {
        self.answer.is_some()
    }
}

/// Question and answer pair carried forward into later requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnsweredClarification {
    pub question: String,
    pub answer: String,
}

/// Everything produced during one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub sequence: u32,
    pub proposals: Vec<Proposal>,
    pub critiques: Vec<Critique>,
    pub audit: Option<AuditDecision>,
    pub verdict: Option<ConvergenceVerdict>,
    pub clarifications: Vec<ClarificationRecord>,
}

impl Round {
    pub fn new(sequence: u32) -> Self {
        Self {
            sequence,
            proposals: Vec::new(),
            critiques: Vec::new(),
            audit: None,
            verdict: None,
            clarifications: Vec::new(),
        }
    }

    pub fn proposal(&self, id: &str) -> Option<&Proposal> {
        self.proposals.iter().find(|p| p.id == id)
    }

    pub fn proposal_by(&self, author: &AgentId) -> Option<&Proposal> {
        self.proposals.iter().find(|p| &p.author == author)
    }

    pub fn proposal_ids(&self) -> Vec<String> {
        self.proposals.iter().map(|p| p.id.clone()).collect()
    }

    pub fn critique_ids(&self) -> Vec<String> {
        self.critiques.iter().map(|c| c.id.clone()).collect()
    }

    /// Critiques aimed at the given proposal.
    pub fn critiques_of<'a>(&'a self, proposal_id: &'a str) -> impl Iterator<Item = &'a Critique> {
        self.critiques.iter().filter(move |c| c.target == proposal_id)
    }

    /// Whether the question was already answered during this round.
    pub fn has_answered(&self, question: &str) -> bool {
        self.clarifications
            .iter()
            .any(|c| c.is_answered() && c.request.question == question)
    }

    /// Mean critique agreement, if any critiques were recorded.
    pub fn average_agreement(&self) -> Option<f64> {
        if self.critiques.is_empty() {
            return None;
        }
        let total: f64 = self.critiques.iter().map(|c| c.content.agreement).sum();
        Some(total / self.critiques.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids() {
        let a = AgentId::new("architect");
        let b = AgentId::new("engineer");
        assert_eq!(proposal_id(2, &a), "r2:architect");
        assert_eq!(critique_id(0, &b, &a), "r0:engineer->architect");
    }

    #[test]
    fn test_empty_round_has_no_agreement() {
        assert_eq!(Round::new(0).average_agreement(), None);
    }
}
