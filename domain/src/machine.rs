//! The deliberation state machine as a pure function.
//!
//! ```text
//! Ideation(r) -> Critique(r) -> Audit(r) -> ConvergenceCheck(r)
//!     ConvergenceCheck(r) -> Converged | Ideation(r + 1) | Failed (round cap)
//! any active state -> AwaitingClarification -> the same state again
//! any non-terminal state -> Failed | Cancelled
//! ```
//!
//! No I/O happens here. The engine performs agent calls and persistence
//! around these transitions, and [`Run::apply`](crate::deliberation::run::Run::apply)
//! replays them from the event log.

use serde::{Deserialize, Serialize};

use crate::convergence::ConvergenceVerdict;
use crate::core::error::DomainError;
use crate::deliberation::phase::Phase;

/// Where a run currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EngineState {
    Ideation { round: u32 },
    Critique { round: u32 },
    Audit { round: u32 },
    ConvergenceCheck { round: u32 },
    /// Suspended until the human answers `request_id`; resumes at `phase`.
    AwaitingClarification {
        request_id: String,
        phase: Phase,
        round: u32,
    },
    Converged,
    Failed,
    Cancelled,
}

impl EngineState {
    pub fn initial() -> Self {
        EngineState::Ideation { round: 0 }
    }

    /// Active state for a phase and round.
    pub fn at(phase: Phase, round: u32) -> Self {
        match phase {
            Phase::Ideation => EngineState::Ideation { round },
            Phase::Critique => EngineState::Critique { round },
            Phase::Audit => EngineState::Audit { round },
            Phase::ConvergenceCheck => EngineState::ConvergenceCheck { round },
        }
    }

    /// Phase and round while the machine is actively working.
    pub fn position(&self) -> Option<(Phase, u32)> {
        match self {
            EngineState::Ideation { round } => Some((Phase::Ideation, *round)),
            EngineState::Critique { round } => Some((Phase::Critique, *round)),
            EngineState::Audit { round } => Some((Phase::Audit, *round)),
            EngineState::ConvergenceCheck { round } => Some((Phase::ConvergenceCheck, *round)),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EngineState::Converged | EngineState::Failed | EngineState::Cancelled
        )
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, EngineState::AwaitingClarification { .. })
    }

    pub fn label(&self) -> String {
        match self {
            EngineState::AwaitingClarification {
                request_id, phase, ..
            } => format!("awaiting clarification {} ({})", request_id, phase),
            EngineState::Converged => "converged".to_string(),
            EngineState::Failed => "failed".to_string(),
            EngineState::Cancelled => "cancelled".to_string(),
            active => match active.position() {
                Some((phase, round)) => format!("{} (round {})", phase, round),
                None => "unknown".to_string(),
            },
        }
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Something that moves the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum MachineInput {
    /// An agent phase finished with its quorum met.
    PhaseCompleted,
    /// The convergence check of the current round decided.
    Verdict(ConvergenceVerdict),
    ClarificationRaised { request_id: String },
    ClarificationAnswered { request_id: String },
    Fail,
    Cancel,
}

/// Compute the next state.
///
/// `max_rounds` is the total number of rounds a run may execute; a
/// `NeedsNextRound` verdict on the last permitted round fails the run.
pub fn transition(
    state: &EngineState,
    input: &MachineInput,
    max_rounds: u32,
) -> Result<EngineState, DomainError> {
    use EngineState as S;
    use MachineInput as I;

    let invalid = || {
        Err(DomainError::InvalidTransition(format!(
            "{:?} is not allowed in state {}",
            input, state
        )))
    };

    if state.is_terminal() {
        return invalid();
    }

    match (state, input) {
        (_, I::Cancel) => Ok(S::Cancelled),
        (_, I::Fail) => Ok(S::Failed),

        (S::Ideation { round }, I::PhaseCompleted) => Ok(S::Critique { round: *round }),
        (S::Critique { round }, I::PhaseCompleted) => Ok(S::Audit { round: *round }),
        (S::Audit { round }, I::PhaseCompleted) => Ok(S::ConvergenceCheck { round: *round }),

        (S::ConvergenceCheck { round }, I::Verdict(verdict)) => match verdict {
            ConvergenceVerdict::Converged => Ok(S::Converged),
            ConvergenceVerdict::NeedsNextRound if round + 1 >= max_rounds => Ok(S::Failed),
            ConvergenceVerdict::NeedsNextRound => Ok(S::Ideation { round: round + 1 }),
            ConvergenceVerdict::NeedsClarification { .. } => invalid(),
        },

        (active, I::ClarificationRaised { request_id }) => match active.position() {
            Some((phase, round)) => Ok(S::AwaitingClarification {
                request_id: request_id.clone(),
                phase,
                round,
            }),
            None => invalid(),
        },

        (
            S::AwaitingClarification {
                request_id: pending,
                phase,
                round,
            },
            I::ClarificationAnswered { request_id },
        ) if pending == request_id => Ok(S::at(*phase, *round)),

        _ => invalid(),
    }
}
