//! The run aggregate and its event fold.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::adr::ArchitectureDecisionRecord;
use super::failure::FailureReason;
use super::phase::{Phase, RunStatus};
use super::records::{AnsweredClarification, ClarificationRecord, ClarificationRequest, Round};
use crate::context::SystemContext;
use crate::core::error::DomainError;
use crate::core::ids::RunId;
use crate::core::question::Question;
use crate::events::{EventKind, RunEvent};
use crate::machine::{EngineState, MachineInput, transition};

/// A deliberation run (Entity).
///
/// Snapshots are plain serializations of this struct. It only changes
/// through [`Run::apply`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub question: Question,
    pub context: Option<SystemContext>,
    pub state: EngineState,
    pub status: RunStatus,
    pub rounds: Vec<Round>,
    pub pending_clarification: Option<ClarificationRequest>,
    pub final_artifact: Option<ArchitectureDecisionRecord>,
    pub failure: Option<FailureReason>,
    pub max_rounds: u32,
    /// Sequence number the next event must carry.
    pub next_sequence: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Run {
    /// The `run_created` event that starts a new run.
    pub fn creation_event(
        id: RunId,
        question: Question,
        context: Option<SystemContext>,
        max_rounds: u32,
        at: DateTime<Utc>,
    ) -> RunEvent {
        RunEvent {
            run_id: id,
            sequence: 0,
            at,
            kind: EventKind::RunCreated {
                question,
                context,
                max_rounds,
            },
        }
    }

    /// Build a run from its `run_created` event.
    pub fn genesis(event: &RunEvent) -> Result<Self, DomainError> {
        let EventKind::RunCreated {
            question,
            context,
            max_rounds,
        } = &event.kind
        else {
            return Err(DomainError::NotCreated);
        };
        if event.sequence != 0 {
            return Err(DomainError::OutOfOrderEvent {
                expected: 0,
                actual: event.sequence,
            });
        }
        Ok(Self {
            id: event.run_id,
            question: question.clone(),
            context: context.clone(),
            state: EngineState::initial(),
            status: RunStatus::Running,
            rounds: Vec::new(),
            pending_clarification: None,
            final_artifact: None,
            failure: None,
            max_rounds: *max_rounds,
            next_sequence: 1,
            created_at: event.at,
            updated_at: event.at,
        })
    }

    /// Rebuild a run by folding its full event log.
    pub fn replay<'a>(events: impl IntoIterator<Item = &'a RunEvent>) -> Result<Self, DomainError> {
        let mut events = events.into_iter();
        let first = events.next().ok_or(DomainError::NotCreated)?;
        let mut run = Self::genesis(first)?;
        for event in events {
            run.apply(event)?;
        }
        Ok(run)
    }

    /// Stamp the next event for this run. Does not apply it.
    pub fn next_event(&self, kind: EventKind, at: DateTime<Utc>) -> RunEvent {
        RunEvent {
            run_id: self.id,
            sequence: self.next_sequence,
            at,
            kind,
        }
    }

    /// Fold one event into the run.
    ///
    /// Rejects events for other runs, out-of-sequence events, anything after
    /// a terminal status, and anything the state machine does not allow. On
    /// error the run is left untouched.
    pub fn apply(&mut self, event: &RunEvent) -> Result<(), DomainError> {
        if event.run_id != self.id {
            return Err(DomainError::ForeignEvent {
                expected: self.id.to_string(),
                actual: event.run_id.to_string(),
            });
        }
        if event.sequence != self.next_sequence {
            return Err(DomainError::OutOfOrderEvent {
                expected: self.next_sequence,
                actual: event.sequence,
            });
        }
        if self.status.is_terminal() {
            return Err(DomainError::Terminal(self.status));
        }

        match &event.kind {
            EventKind::RunCreated { .. } => {
                return Err(DomainError::InvalidTransition(
                    "run_created after the run already exists".to_string(),
                ));
            }
            EventKind::PhaseStarted { phase, round } => {
                self.expect_position(*phase, *round)?;
                if *phase == Phase::Ideation && self.rounds.len() as u32 == *round {
                    self.rounds.push(Round::new(*round));
                }
            }
            EventKind::AgentResponded { phase, round, .. } => {
                self.expect_position(*phase, *round)?;
            }
            EventKind::ProposalRecorded { proposal } => {
                self.expect_position(Phase::Ideation, proposal.round)?;
                let round = self.round_mut(proposal.round)?;
                if round.proposal_by(&proposal.author).is_some() {
                    return Err(DomainError::InvalidTransition(format!(
                        "{} already proposed in round {}",
                        proposal.author, proposal.round
                    )));
                }
                round.proposals.push(proposal.clone());
            }
            EventKind::CritiqueRecorded { critique } => {
                self.expect_position(Phase::Critique, critique.round)?;
                if critique.author == critique.target_author {
                    return Err(DomainError::InvalidTransition(format!(
                        "{} cannot critique its own proposal",
                        critique.author
                    )));
                }
                let round = self.round_mut(critique.round)?;
                if round.critiques.iter().any(|c| c.id == critique.id) {
                    return Err(DomainError::InvalidTransition(format!(
                        "critique {} already recorded",
                        critique.id
                    )));
                }
                round.critiques.push(critique.clone());
            }
            EventKind::AuditRecorded { audit } => {
                self.expect_position(Phase::Audit, audit.round)?;
                let round = self.round_mut(audit.round)?;
                if round.audit.is_some() {
                    return Err(DomainError::InvalidTransition(format!(
                        "round {} already has an audit",
                        audit.round
                    )));
                }
                round.audit = Some(audit.clone());
            }
            EventKind::ClarificationNeeded { request } => {
                self.expect_position(request.phase, request.round)?;
                let next = transition(
                    &self.state,
                    &MachineInput::ClarificationRaised {
                        request_id: request.id.clone(),
                    },
                    self.max_rounds,
                )?;
                self.round_mut(request.round)?
                    .clarifications
                    .push(ClarificationRecord {
                        request: request.clone(),
                        answer: None,
                    });
                self.state = next;
                self.status = RunStatus::AwaitingClarification;
                self.pending_clarification = Some(request.clone());
            }
            EventKind::ClarificationAnswered { answer } => {
                let next = transition(
                    &self.state,
                    &MachineInput::ClarificationAnswered {
                        request_id: answer.request_id.clone(),
                    },
                    self.max_rounds,
                )?;
                let (_, round_number) = next.position().ok_or_else(|| {
                    DomainError::InvalidTransition("clarification resumed nowhere".to_string())
                })?;
                let record = self
                    .round_mut(round_number)?
                    .clarifications
                    .iter_mut()
                    .find(|c| c.request.id == answer.request_id)
                    .ok_or_else(|| {
                        DomainError::InvalidTransition(format!(
                            "unknown clarification {}",
                            answer.request_id
                        ))
                    })?;
                record.answer = Some(answer.clone());
                self.state = next;
                self.status = RunStatus::Running;
                self.pending_clarification = None;
            }
            EventKind::PhaseCompleted { phase, round, .. } => {
                self.expect_position(*phase, *round)?;
                self.state = transition(
                    &self.state,
                    &MachineInput::PhaseCompleted,
                    self.max_rounds,
                )?;
            }
            EventKind::RoundCompleted { round, verdict } => {
                self.expect_position(Phase::ConvergenceCheck, *round)?;
                let next = transition(
                    &self.state,
                    &MachineInput::Verdict(verdict.clone()),
                    self.max_rounds,
                )?;
                self.round_mut(*round)?.verdict = Some(verdict.clone());
                self.state = next;
            }
            EventKind::RunConverged { artifact } => {
                if self.state != EngineState::Converged {
                    return Err(DomainError::InvalidTransition(format!(
                        "run_converged in state {}",
                        self.state
                    )));
                }
                self.status = RunStatus::Converged;
                self.final_artifact = Some(artifact.as_ref().clone());
            }
            EventKind::RunFailed { reason } => {
                if self.state != EngineState::Failed {
                    self.state = transition(&self.state, &MachineInput::Fail, self.max_rounds)?;
                }
                self.status = RunStatus::Failed;
                self.failure = Some(reason.clone());
            }
            EventKind::RunCancelled => {
                if self.state != EngineState::Cancelled {
                    self.state = transition(&self.state, &MachineInput::Cancel, self.max_rounds)?;
                }
                self.status = RunStatus::Cancelled;
                self.pending_clarification = None;
            }
        }

        self.next_sequence += 1;
        self.updated_at = event.at;
        Ok(())
    }

    fn expect_position(&self, phase: Phase, round: u32) -> Result<(), DomainError> {
        if self.state.position() == Some((phase, round)) {
            Ok(())
        } else {
            Err(DomainError::InvalidTransition(format!(
                "{} of round {} while {}",
                phase, round, self.state
            )))
        }
    }

    fn round_mut(&mut self, round: u32) -> Result<&mut Round, DomainError> {
        self.rounds
            .get_mut(round as usize)
            .ok_or_else(|| DomainError::InvalidTransition(format!("round {} not started", round)))
    }

    pub fn round(&self, round: u32) -> Option<&Round> {
        self.rounds.get(round as usize)
    }

    pub fn current_round(&self) -> Option<&Round> {
        self.rounds.last()
    }

    /// Every answered clarification, oldest first.
    pub fn answered_clarifications(&self) -> Vec<AnsweredClarification> {
        self.rounds
            .iter()
            .flat_map(|r| r.clarifications.iter())
            .filter_map(|c| {
                c.answer.as_ref().map(|a| AnsweredClarification {
                    question: c.request.question.clone(),
                    answer: a.text.clone(),
                })
            })
            .collect()
    }

    /// Number of clarifications raised so far, answered or not.
    pub fn clarification_count(&self) -> usize {
        self.rounds.iter().map(|r| r.clarifications.len()).sum()
    }

    /// Rendered system context for prompts.
    pub fn context_block(&self) -> String {
        match &self.context {
            Some(ctx) => ctx.to_prompt_string(),
            None => SystemContext::default().to_prompt_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convergence::ConvergenceVerdict;
    use crate::core::ids::AgentId;
    use crate::deliberation::records::{ClarificationAnswer, Proposal};
    use crate::schema::IdeationOutput;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, minute, 0).unwrap()
    }

    fn created(max_rounds: u32) -> (Run, Vec<RunEvent>) {
        let event = Run::creation_event(
            RunId::new(),
            Question::parse("Which cache should front the catalog API?").unwrap(),
            None,
            max_rounds,
            at(0),
        );
        let run = Run::genesis(&event).unwrap();
        (run, vec![event])
    }

    fn push(run: &mut Run, log: &mut Vec<RunEvent>, kind: EventKind) {
        let event = run.next_event(kind, at(log.len() as u32));
        run.apply(&event).unwrap();
        log.push(event);
    }

    fn ideation(title: &str) -> IdeationOutput {
        IdeationOutput {
            title: title.to_string(),
            summary: "s".to_string(),
            approach: "a".to_string(),
            components: vec![],
            trade_offs: vec![],
            risks: vec![],
            confidence: 0.5,
            uncertainties: vec![],
            mermaid_diagram: None,
            clarification_needed: None,
        }
    }

    #[test]
    fn test_genesis_requires_run_created() {
        let (run, _) = created(3);
        let stray = run.next_event(EventKind::RunCancelled, at(1));
        assert_eq!(Run::genesis(&stray).unwrap_err(), DomainError::NotCreated);
    }

    #[test]
    fn test_out_of_order_event_is_rejected() {
        let (mut run, _) = created(3);
        let mut event = run.next_event(
            EventKind::PhaseStarted {
                phase: Phase::Ideation,
                round: 0,
            },
            at(1),
        );
        event.sequence = 5;
        let before = run.clone();
        assert!(matches!(
            run.apply(&event),
            Err(DomainError::OutOfOrderEvent { expected: 1, actual: 5 })
        ));
        assert_eq!(run, before);
    }

    #[test]
    fn test_replay_matches_live_fold() {
        let (mut run, mut log) = created(3);
        push(
            &mut run,
            &mut log,
            EventKind::PhaseStarted {
                phase: Phase::Ideation,
                round: 0,
            },
        );
        push(
            &mut run,
            &mut log,
            EventKind::ProposalRecorded {
                proposal: Proposal::new(AgentId::new("a"), 0, ideation("A"), at(2)),
            },
        );
        push(
            &mut run,
            &mut log,
            EventKind::PhaseCompleted {
                phase: Phase::Ideation,
                round: 0,
                duration_ms: 0,
            },
        );
        assert_eq!(run.state, EngineState::Critique { round: 0 });
        assert_eq!(Run::replay(&log).unwrap(), run);
    }

    #[test]
    fn test_duplicate_proposer_is_rejected() {
        let (mut run, mut log) = created(3);
        push(
            &mut run,
            &mut log,
            EventKind::PhaseStarted {
                phase: Phase::Ideation,
                round: 0,
            },
        );
        push(
            &mut run,
            &mut log,
            EventKind::ProposalRecorded {
                proposal: Proposal::new(AgentId::new("a"), 0, ideation("A"), at(2)),
            },
        );
        let again = run.next_event(
            EventKind::ProposalRecorded {
                proposal: Proposal::new(AgentId::new("a"), 0, ideation("A2"), at(3)),
            },
            at(3),
        );
        assert!(run.apply(&again).is_err());
    }

    #[test]
    fn test_clarification_round_trip() {
        let (mut run, mut log) = created(3);
        push(
            &mut run,
            &mut log,
            EventKind::PhaseStarted {
                phase: Phase::Ideation,
                round: 0,
            },
        );
        let request = ClarificationRequest {
            id: "clr-1".to_string(),
            agent: AgentId::new("a"),
            question: "What is the budget?".to_string(),
            round: 0,
            phase: Phase::Ideation,
            raised_at: at(2),
        };
        push(
            &mut run,
            &mut log,
            EventKind::ClarificationNeeded {
                request: request.clone(),
            },
        );
        assert_eq!(run.status, RunStatus::AwaitingClarification);
        assert_eq!(run.pending_clarification, Some(request));

        // nothing moves while suspended
        let blocked = run.next_event(
            EventKind::PhaseCompleted {
                phase: Phase::Ideation,
                round: 0,
                duration_ms: 0,
            },
            at(3),
        );
        assert!(run.apply(&blocked).is_err());

        push(
            &mut run,
            &mut log,
            EventKind::ClarificationAnswered {
                answer: ClarificationAnswer {
                    request_id: "clr-1".to_string(),
                    text: "$2k/month".to_string(),
                    answered_at: at(4),
                },
            },
        );
        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.state, EngineState::Ideation { round: 0 });
        assert_eq!(
            run.answered_clarifications(),
            vec![AnsweredClarification {
                question: "What is the budget?".to_string(),
                answer: "$2k/month".to_string(),
            }]
        );
        assert_eq!(Run::replay(&log).unwrap(), run);
    }

    #[test]
    fn test_terminal_run_rejects_events() {
        let (mut run, mut log) = created(1);
        push(&mut run, &mut log, EventKind::RunCancelled);
        assert_eq!(run.status, RunStatus::Cancelled);
        let late = run.next_event(
            EventKind::PhaseStarted {
                phase: Phase::Ideation,
                round: 0,
            },
            at(9),
        );
        assert_eq!(
            run.apply(&late).unwrap_err(),
            DomainError::Terminal(RunStatus::Cancelled)
        );
    }

    #[test]
    fn test_exhausted_round_fails_the_machine() {
        let (mut run, mut log) = created(1);
        for phase in [Phase::Ideation, Phase::Critique, Phase::Audit] {
            push(&mut run, &mut log, EventKind::PhaseStarted { phase, round: 0 });
            push(
                &mut run,
                &mut log,
                EventKind::PhaseCompleted {
                    phase,
                    round: 0,
                    duration_ms: 0,
                },
            );
        }
        push(
            &mut run,
            &mut log,
            EventKind::RoundCompleted {
                round: 0,
                verdict: ConvergenceVerdict::NeedsNextRound,
            },
        );
        assert_eq!(run.state, EngineState::Failed);
        assert_eq!(run.status, RunStatus::Running);
        push(
            &mut run,
            &mut log,
            EventKind::RunFailed {
                reason: FailureReason::ConvergenceExhausted { rounds: 1 },
            },
        );
        assert_eq!(run.status, RunStatus::Failed);
    }
}
