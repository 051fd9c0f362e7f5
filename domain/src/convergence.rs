//! Convergence policy: is a round good enough to become a decision?

use serde::{Deserialize, Serialize};

use crate::core::ids::AgentId;
use crate::deliberation::records::Round;
use crate::schema::AuditVerdict;

/// Outcome of a convergence check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConvergenceVerdict {
    Converged,
    NeedsNextRound,
    NeedsClarification { agent: AgentId, question: String },
}

impl ConvergenceVerdict {
    pub fn as_str(&self) -> &str {
        match self {
            ConvergenceVerdict::Converged => "converged",
            ConvergenceVerdict::NeedsNextRound => "needs_next_round",
            ConvergenceVerdict::NeedsClarification { .. } => "needs_clarification",
        }
    }
}

impl std::fmt::Display for ConvergenceVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Decides what happens after a round's audit.
///
/// Implementations see only the completed round. The round limit is not
/// their concern; it is enforced by the state machine.
pub trait ConvergenceChecker: Send + Sync {
    fn check(&self, round: &Round) -> ConvergenceVerdict;
}

/// Default policy.
///
/// - Any unanswered `clarification_needed` marker in the round wins.
/// - Otherwise the round converges when the auditor accepts and every
///   blocking critique is listed in the audit's `resolved_critiques`.
/// - Otherwise another round is needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConvergenceChecker;

impl DefaultConvergenceChecker {
    /// First open question in the round, in proposal, critique, audit order.
    fn open_question(round: &Round) -> Option<(AgentId, String)> {
        let proposals = round.proposals.iter().filter_map(|p| {
            p.content
                .clarification_needed
                .as_ref()
                .map(|q| (p.author.clone(), q.clone()))
        });
        let critiques = round.critiques.iter().filter_map(|c| {
            c.clarification_needed
                .as_ref()
                .map(|q| (c.author.clone(), q.clone()))
        });
        let audit = round.audit.iter().filter_map(|a| {
            a.content
                .clarification_needed
                .as_ref()
                .map(|q| (a.auditor.clone(), q.clone()))
        });

        proposals
            .chain(critiques)
            .chain(audit)
            .find(|(_, question)| !round.has_answered(question))
    }
}

impl ConvergenceChecker for DefaultConvergenceChecker {
    fn check(&self, round: &Round) -> ConvergenceVerdict {
        if let Some((agent, question)) = Self::open_question(round) {
            return ConvergenceVerdict::NeedsClarification { agent, question };
        }

        let Some(audit) = &round.audit else {
            return ConvergenceVerdict::NeedsNextRound;
        };
        if audit.content.verdict != AuditVerdict::Accept {
            return ConvergenceVerdict::NeedsNextRound;
        }

        let unresolved_blocker = round
            .critiques
            .iter()
            .filter(|c| c.content.blocking)
            .any(|c| !audit.content.resolved_critiques.contains(&c.id));
        if unresolved_blocker {
            ConvergenceVerdict::NeedsNextRound
        } else {
            ConvergenceVerdict::Converged
        }
    }
}
