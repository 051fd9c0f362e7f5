//! Deliberation Engine use case
//!
//! Drives one run through the state machine:
//!
//! ```text
//! Ideation(r) -> Critique(r) -> Audit(r) -> ConvergenceCheck(r)
//!     -> Converged | Ideation(r + 1) | AwaitingClarification | Failed
//! ```
//!
//! Every transition is committed as a batch of events: applied to a copy of
//! the run, saved with a compare-and-swap on the record revision, and only
//! then journaled and published. A crash between two commits leaves the run
//! at the last durable boundary, from where [`DeliberationEngine::execute`]
//! picks it up again.

mod agent_call;

use council_domain::{
    AgentFailure, AgentId, AgentReply, AgentRequest, ArchitectureDecisionRecord, AuditDecision,
    AuditDigest, ClarificationAnswer, ClarificationRequest, ConvergenceChecker, ConvergenceVerdict,
    Critique, DefaultConvergenceChecker, DomainError, EngineState, EventKind, FailureReason,
    MachineInput, Phase, PhaseOutput, Proposal, Question, RequestPayload, ResponseOutcome, Run,
    RunEvent, RunId, RunStatus, SystemContext, ValidationError, transition,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use self::agent_call::{CallOutcome, call_agent};
use crate::config::{AgentProfile, ConfigError, EngineConfig};
use crate::events::{EventBus, SharedEventBus};
use crate::ports::agent_gateway::AgentGateway;
use crate::ports::clock::{Clock, SystemClock};
use crate::ports::event_journal::{EventJournal, NoEventJournal};
use crate::ports::run_store::{RunRecord, RunStore, StoreError};
use crate::use_cases::lease::RunLeases;

/// Times a step is re-attempted from the durable record after its commit failed.
const MAX_STEP_RETRIES: u32 = 1;

/// Errors that can occur while driving a run
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Agent {agent} timed out after {after_ms}ms")]
    AgentTimeout { agent: AgentId, after_ms: u64 },

    #[error("Agent {agent} failed: {message}")]
    AgentError { agent: AgentId, message: String },

    #[error("Agent {agent} returned invalid output: {error}")]
    ValidationFailure {
        agent: AgentId,
        error: ValidationError,
    },

    #[error("No convergence after {rounds} rounds")]
    ConvergenceExhausted { rounds: u32 },

    #[error("Run failed: {0}")]
    RunFailed(FailureReason),

    #[error("Run {0} is being written by another execution")]
    ConcurrentWriteConflict(RunId),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Run not found: {0}")]
    RunNotFound(RunId),

    #[error("Run {run_id} is {status}, not awaiting clarification")]
    NotAwaitingClarification { run_id: RunId, status: RunStatus },

    #[error("Clarification {actual} is not pending (pending: {expected})")]
    StaleClarification { expected: String, actual: String },

    #[error("Invalid council configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl EngineError {
    /// Run-level view of a permanent per-agent failure.
    pub fn from_agent_failure(agent: &AgentId, failure: &AgentFailure) -> Self {
        match failure {
            AgentFailure::Timeout { after_ms } => EngineError::AgentTimeout {
                agent: agent.clone(),
                after_ms: *after_ms,
            },
            AgentFailure::Error { message } => EngineError::AgentError {
                agent: agent.clone(),
                message: message.clone(),
            },
            AgentFailure::Validation { error } => EngineError::ValidationFailure {
                agent: agent.clone(),
                error: error.clone(),
            },
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::ConcurrentWriteConflict(_))
    }
}

impl From<FailureReason> for EngineError {
    fn from(reason: FailureReason) -> Self {
        match reason {
            FailureReason::ConvergenceExhausted { rounds } => {
                EngineError::ConvergenceExhausted { rounds }
            }
            other => EngineError::RunFailed(other),
        }
    }
}

/// Drives runs through the deliberation state machine
pub struct DeliberationEngine {
    gateway: Arc<dyn AgentGateway>,
    store: Arc<dyn RunStore>,
    bus: SharedEventBus,
    journal: Arc<dyn EventJournal>,
    checker: Arc<dyn ConvergenceChecker>,
    clock: Arc<dyn Clock>,
    leases: RunLeases,
    config: EngineConfig,
}

impl DeliberationEngine {
    pub fn new(
        gateway: Arc<dyn AgentGateway>,
        store: Arc<dyn RunStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            gateway,
            store,
            bus: EventBus::new().shared(),
            journal: Arc::new(NoEventJournal),
            checker: Arc::new(DefaultConvergenceChecker),
            clock: Arc::new(SystemClock),
            leases: RunLeases::new(),
            config,
        }
    }

    // ==================== Builder Methods ====================

    pub fn with_bus(mut self, bus: SharedEventBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_journal(mut self, journal: Arc<dyn EventJournal>) -> Self {
        self.journal = journal;
        self
    }

    pub fn with_checker(mut self, checker: Arc<dyn ConvergenceChecker>) -> Self {
        self.checker = checker;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_leases(mut self, leases: RunLeases) -> Self {
        self.leases = leases;
        self
    }

    // ==================== Accessors ====================

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn bus(&self) -> &SharedEventBus {
        &self.bus
    }

    pub fn store(&self) -> &Arc<dyn RunStore> {
        &self.store
    }

    pub fn leases(&self) -> &RunLeases {
        &self.leases
    }

    // ==================== Run lifecycle ====================

    /// Persist a new run without executing it.
    pub async fn create(
        &self,
        question: Question,
        context: Option<SystemContext>,
    ) -> Result<Run, EngineError> {
        self.config.validate()?;
        let id = RunId::new();
        let event = Run::creation_event(
            id,
            question,
            context.filter(|c| !c.is_empty()),
            self.config.max_rounds,
            self.clock.now(),
        );
        let record = RunRecord {
            run: Run::genesis(&event)?,
            events: vec![event],
        };
        self.save(&record, 0).await?;
        self.announce(&record.events);
        info!(run_id = %id, "Run created");
        Ok(record.run)
    }

    /// Load the durable record of a run.
    pub async fn load(&self, run_id: RunId) -> Result<RunRecord, EngineError> {
        self.store
            .load(&run_id)
            .await
            .map_err(|e| EngineError::PersistenceFailure(e.to_string()))?
            .ok_or(EngineError::RunNotFound(run_id))
    }

    /// Execute a run until it is suspended or terminal.
    ///
    /// Safe to call on any persisted run: execution resumes at the last
    /// durable boundary. Cancellation is observed at phase boundaries.
    pub async fn execute(
        &self,
        run_id: RunId,
        cancel: &CancellationToken,
    ) -> Result<RunStatus, EngineError> {
        let _lease = self
            .leases
            .try_acquire(run_id)
            .ok_or(EngineError::ConcurrentWriteConflict(run_id))?;
        self.config.validate()?;
        let mut record = self.load(run_id).await?;
        if let Err(e) = self.bus.catch_up(&record.events) {
            warn!(%run_id, "Could not re-publish persisted events: {}", e);
        }
        info!(%run_id, state = %record.run.state, "Executing run");

        let mut failed_steps = 0;
        loop {
            let status = record.run.status;
            if status != RunStatus::Running {
                info!(%run_id, %status, "Run stopped");
                return Ok(status);
            }
            match self.step(&mut record, cancel).await {
                Ok(()) => failed_steps = 0,
                Err(EngineError::PersistenceFailure(detail)) if failed_steps < MAX_STEP_RETRIES => {
                    failed_steps += 1;
                    warn!(%run_id, failed_steps, "Step not persisted, reloading: {}", detail);
                    record = self.load(run_id).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Advance a running run by one phase.
    async fn step(&self, record: &mut RunRecord, cancel: &CancellationToken) -> Result<(), EngineError> {
        if cancel.is_cancelled() {
            info!(run_id = %record.run.id, "Cancelling run");
            return self.commit(record, vec![EventKind::RunCancelled]).await;
        }

        match record.run.state.clone() {
            EngineState::Ideation { round } => self.ideation(record, round, cancel).await,
            EngineState::Critique { round } => self.critique(record, round, cancel).await,
            EngineState::Audit { round } => self.audit(record, round, cancel).await,
            EngineState::ConvergenceCheck { round } => self.convergence_check(record, round).await,
            EngineState::Converged => self.finalize_converged(record).await,
            // Every other failure commits `run_failed` together with the
            // state change, so a running run can only sit here after the
            // round cap was hit.
            EngineState::Failed => {
                let rounds = record.run.rounds.len() as u32;
                self.commit(
                    record,
                    vec![EventKind::RunFailed {
                        reason: FailureReason::ConvergenceExhausted { rounds },
                    }],
                )
                .await
            }
            other => Err(DomainError::InvalidTransition(format!(
                "status running in state {}",
                other
            ))
            .into()),
        }
    }

    /// Record the human's answer; the run becomes runnable again.
    pub async fn answer(
        &self,
        run_id: RunId,
        request_id: &str,
        text: String,
    ) -> Result<Run, EngineError> {
        let _lease = self
            .leases
            .try_acquire(run_id)
            .ok_or(EngineError::ConcurrentWriteConflict(run_id))?;
        let mut record = self.load(run_id).await?;

        let Some(pending) = record.run.pending_clarification.clone() else {
            return Err(EngineError::NotAwaitingClarification {
                run_id,
                status: record.run.status,
            });
        };
        if pending.id != request_id {
            return Err(EngineError::StaleClarification {
                expected: pending.id,
                actual: request_id.to_string(),
            });
        }

        info!(%run_id, request_id, "Clarification answered");
        let answer = ClarificationAnswer {
            request_id: pending.id,
            text,
            answered_at: self.clock.now(),
        };
        self.commit(&mut record, vec![EventKind::ClarificationAnswered { answer }])
            .await?;
        Ok(record.run)
    }

    /// Cancel a run nobody is executing. Terminal runs are left alone.
    pub async fn cancel_idle(&self, run_id: RunId) -> Result<Run, EngineError> {
        let _lease = self
            .leases
            .try_acquire(run_id)
            .ok_or(EngineError::ConcurrentWriteConflict(run_id))?;
        let mut record = self.load(run_id).await?;
        if !record.run.status.is_terminal() {
            info!(%run_id, "Cancelling idle run");
            self.commit(&mut record, vec![EventKind::RunCancelled])
                .await?;
        }
        Ok(record.run)
    }

    // ==================== Phases ====================

    async fn ideation(
        &self,
        record: &mut RunRecord,
        round: u32,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        self.start_phase(record, Phase::Ideation, round).await?;

        let requests: Vec<AgentRequest> = self
            .config
            .agents
            .iter()
            .map(|agent| self.request(&record.run, agent, round, RequestPayload::Ideation))
            .collect();
        let dispatched = requests.len();
        let outcomes = self
            .fan_out(record, Phase::Ideation, round, requests)
            .await?;
        if cancel.is_cancelled() || self.raise_if_blocked(record, Phase::Ideation, round, &outcomes).await? {
            return Ok(());
        }

        let at = self.clock.now();
        let proposals: Vec<EventKind> = outcomes
            .iter()
            .filter_map(|(agent, outcome)| match &outcome.result {
                Ok(AgentReply::Output(PhaseOutput::Ideation(output))) => {
                    Some(EventKind::ProposalRecorded {
                        proposal: Proposal::new(agent.clone(), round, output.clone(), at),
                    })
                }
                _ => None,
            })
            .collect();
        let responded = proposals.len();
        self.settle(record, Phase::Ideation, round, responded, dispatched, proposals)
            .await
    }

    async fn critique(
        &self,
        record: &mut RunRecord,
        round: u32,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        self.start_phase(record, Phase::Critique, round).await?;

        let proposals: Vec<Proposal> = record
            .run
            .round(round)
            .map(|r| r.proposals.clone())
            .unwrap_or_default();
        // Built before any dispatch: a critique request only ever holds proposals.
        let requests: Vec<AgentRequest> = self
            .config
            .agents
            .iter()
            .filter_map(|agent| {
                let targets: Vec<Proposal> = proposals
                    .iter()
                    .filter(|p| p.author != agent.id)
                    .cloned()
                    .collect();
                (!targets.is_empty()).then(|| {
                    self.request(
                        &record.run,
                        agent,
                        round,
                        RequestPayload::Critique { targets },
                    )
                })
            })
            .collect();
        let dispatched = requests.len();
        let outcomes = self
            .fan_out(record, Phase::Critique, round, requests)
            .await?;
        if cancel.is_cancelled() || self.raise_if_blocked(record, Phase::Critique, round, &outcomes).await? {
            return Ok(());
        }

        let at = self.clock.now();
        let mut responded = 0;
        let mut critiques = Vec::new();
        for (agent, outcome) in &outcomes {
            let Ok(AgentReply::Output(PhaseOutput::Critique(output))) = &outcome.result else {
                continue;
            };
            responded += 1;
            for entry in &output.critiques {
                if let Some(target) = proposals.iter().find(|p| p.id == entry.target) {
                    critiques.push(EventKind::CritiqueRecorded {
                        critique: Critique::new(
                            agent.clone(),
                            target,
                            entry.clone(),
                            output.clarification_needed.clone(),
                            at,
                        ),
                    });
                }
            }
        }
        self.settle(record, Phase::Critique, round, responded, dispatched, critiques)
            .await
    }

    async fn audit(
        &self,
        record: &mut RunRecord,
        round: u32,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        self.start_phase(record, Phase::Audit, round).await?;

        let (proposals, critiques) = record
            .run
            .round(round)
            .map(|r| (r.proposals.clone(), r.critiques.clone()))
            .unwrap_or_default();
        let auditor = self.config.auditor.clone();
        let request = self.request(
            &record.run,
            &auditor,
            round,
            RequestPayload::Audit {
                proposals,
                critiques,
            },
        );
        let outcomes = self
            .fan_out(record, Phase::Audit, round, vec![request])
            .await?;
        if cancel.is_cancelled() || self.raise_if_blocked(record, Phase::Audit, round, &outcomes).await? {
            return Ok(());
        }

        let result = outcomes.into_iter().next().map(|(_, outcome)| outcome.result);
        let kinds = match result {
            Some(Ok(AgentReply::Output(PhaseOutput::Audit(output)))) => {
                info!(run_id = %record.run.id, round, verdict = %output.verdict, "Audit recorded");
                vec![
                    EventKind::AuditRecorded {
                        audit: AuditDecision {
                            round,
                            auditor: auditor.id.clone(),
                            content: output,
                            recorded_at: self.clock.now(),
                        },
                    },
                    EventKind::PhaseCompleted {
                        phase: Phase::Audit,
                        round,
                        duration_ms: self.phase_elapsed_ms(record, Phase::Audit, round),
                    },
                ]
            }
            other => {
                let detail = match other {
                    Some(Err(failure)) => failure.to_string(),
                    _ => "no usable audit".to_string(),
                };
                warn!(run_id = %record.run.id, round, %detail, "Auditor unavailable");
                vec![EventKind::RunFailed {
                    reason: FailureReason::AuditorUnavailable { round, detail },
                }]
            }
        };
        self.commit(record, kinds).await
    }

    async fn convergence_check(&self, record: &mut RunRecord, round: u32) -> Result<(), EngineError> {
        self.start_phase(record, Phase::ConvergenceCheck, round).await?;

        let current = record.run.round(round).ok_or_else(|| {
            DomainError::InvalidTransition(format!("round {} has no records", round))
        })?;
        let verdict = self.checker.check(current);
        info!(run_id = %record.run.id, round, %verdict, "Convergence checked");

        if let ConvergenceVerdict::NeedsClarification { agent, question } = verdict {
            return self
                .raise_clarification(record, agent, question, Phase::ConvergenceCheck, round)
                .await;
        }

        let next = transition(
            &record.run.state,
            &MachineInput::Verdict(verdict.clone()),
            record.run.max_rounds,
        )?;
        let mut kinds = Vec::new();
        match next {
            EngineState::Converged => {
                let adr = ArchitectureDecisionRecord::compose(
                    &record.run.question,
                    record.run.context.as_ref(),
                    &record.run.answered_clarifications(),
                    current,
                    self.clock.now(),
                )?;
                kinds.push(EventKind::RoundCompleted { round, verdict });
                kinds.push(EventKind::RunConverged {
                    artifact: Box::new(adr),
                });
            }
            EngineState::Failed => {
                warn!(run_id = %record.run.id, rounds = round + 1, "Round limit reached");
                kinds.push(EventKind::RoundCompleted { round, verdict });
                kinds.push(EventKind::RunFailed {
                    reason: FailureReason::ConvergenceExhausted { rounds: round + 1 },
                });
            }
            _ => kinds.push(EventKind::RoundCompleted { round, verdict }),
        }
        self.commit(record, kinds).await
    }

    /// The machine converged but the artifact was never committed.
    async fn finalize_converged(&self, record: &mut RunRecord) -> Result<(), EngineError> {
        let round = record
            .run
            .current_round()
            .ok_or_else(|| DomainError::InvalidTransition("converged without rounds".to_string()))?;
        let adr = ArchitectureDecisionRecord::compose(
            &record.run.question,
            record.run.context.as_ref(),
            &record.run.answered_clarifications(),
            round,
            self.clock.now(),
        )?;
        self.commit(
            record,
            vec![EventKind::RunConverged {
                artifact: Box::new(adr),
            }],
        )
        .await
    }

    // ==================== Phase helpers ====================

    async fn start_phase(
        &self,
        record: &mut RunRecord,
        phase: Phase,
        round: u32,
    ) -> Result<(), EngineError> {
        info!(run_id = %record.run.id, round, "{} {}", phase.emoji(), phase.display_name());
        self.commit(record, vec![EventKind::PhaseStarted { phase, round }])
            .await
    }

    /// Milliseconds since the latest start of `phase` in `round`.
    fn phase_elapsed_ms(&self, record: &RunRecord, phase: Phase, round: u32) -> u64 {
        record
            .events
            .iter()
            .rev()
            .find(|e| match &e.kind {
                EventKind::PhaseStarted { phase: p, round: r } => *p == phase && *r == round,
                _ => false,
            })
            .map(|started| {
                (self.clock.now() - started.at)
                    .num_milliseconds()
                    .max(0) as u64
            })
            .unwrap_or(0)
    }

    fn request(
        &self,
        run: &Run,
        profile: &AgentProfile,
        round: u32,
        payload: RequestPayload,
    ) -> AgentRequest {
        let previous_audit = if matches!(payload, RequestPayload::Ideation) && round > 0 {
            run.round(round - 1)
                .and_then(|r| r.audit.as_ref())
                .map(AuditDigest::from)
        } else {
            None
        };
        AgentRequest {
            run_id: run.id,
            agent: profile.id.clone(),
            round,
            question: run.question.content().to_string(),
            context: run.context_block(),
            brief: profile.brief.clone(),
            clarifications: run.answered_clarifications(),
            previous_audit,
            payload,
            correction: None,
        }
    }

    /// Call every request concurrently and wait for all of them.
    ///
    /// An `agent_responded` event is committed as each call finishes. The
    /// returned outcomes are in request order, independent of timing.
    async fn fan_out(
        &self,
        record: &mut RunRecord,
        phase: Phase,
        round: u32,
        requests: Vec<AgentRequest>,
    ) -> Result<Vec<(AgentId, CallOutcome)>, EngineError> {
        let mut join_set = JoinSet::new();
        for (index, request) in requests.into_iter().enumerate() {
            let gateway = Arc::clone(&self.gateway);
            let timeout = self.config.agent_timeout;
            let retry = self.config.agent_retry.clone();
            join_set.spawn(async move {
                let agent = request.agent.clone();
                let outcome = call_agent(gateway, request, timeout, retry).await;
                (index, agent, outcome)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, agent, outcome)) => {
                    let response = match &outcome.result {
                        Ok(AgentReply::Output(_)) => ResponseOutcome::Accepted,
                        Ok(AgentReply::InsufficientInformation { question }) => {
                            ResponseOutcome::NeedsInformation {
                                question: question.clone(),
                            }
                        }
                        Err(failure) => {
                            warn!(run_id = %record.run.id, "{}", EngineError::from_agent_failure(&agent, failure));
                            ResponseOutcome::Failed {
                                failure: failure.clone(),
                            }
                        }
                    };
                    self.commit(
                        record,
                        vec![EventKind::AgentResponded {
                            agent: agent.clone(),
                            phase,
                            round,
                            outcome: response,
                            attempts: outcome.attempts,
                        }],
                    )
                    .await?;
                    results.push((index, agent, outcome));
                }
                Err(e) => warn!("Task join error: {}", e),
            }
        }

        results.sort_by_key(|(index, _, _)| *index);
        Ok(results
            .into_iter()
            .map(|(_, agent, outcome)| (agent, outcome))
            .collect())
    }

    /// Suspend the run if any agent said it cannot proceed.
    ///
    /// The first blocked agent in request order asks; every result of the
    /// phase is discarded and the phase is re-run after the answer.
    async fn raise_if_blocked(
        &self,
        record: &mut RunRecord,
        phase: Phase,
        round: u32,
        outcomes: &[(AgentId, CallOutcome)],
    ) -> Result<bool, EngineError> {
        let blocked = outcomes.iter().find_map(|(agent, outcome)| match &outcome.result {
            Ok(AgentReply::InsufficientInformation { question }) => {
                Some((agent.clone(), question.clone()))
            }
            _ => None,
        });
        let Some((agent, question)) = blocked else {
            return Ok(false);
        };
        self.raise_clarification(record, agent, question, phase, round)
            .await?;
        Ok(true)
    }

    async fn raise_clarification(
        &self,
        record: &mut RunRecord,
        agent: AgentId,
        question: String,
        phase: Phase,
        round: u32,
    ) -> Result<(), EngineError> {
        let request = ClarificationRequest {
            id: format!("clr-{}", record.run.clarification_count() + 1),
            agent,
            question,
            round,
            phase,
            raised_at: self.clock.now(),
        };
        info!(
            run_id = %record.run.id,
            request_id = %request.id,
            agent = %request.agent,
            %phase,
            "Clarification needed: {}",
            request.question
        );
        self.commit(record, vec![EventKind::ClarificationNeeded { request }])
            .await
    }

    /// Complete an agent phase if enough agents responded, else fail the run.
    async fn settle(
        &self,
        record: &mut RunRecord,
        phase: Phase,
        round: u32,
        responded: usize,
        dispatched: usize,
        mut records: Vec<EventKind>,
    ) -> Result<(), EngineError> {
        // A critic has nothing to review when its own proposal is the only
        // one, so fewer critics than the quorum may be dispatched.
        let required = match phase {
            Phase::Critique => self.config.min_quorum.min(dispatched),
            _ => self.config.min_quorum,
        };
        if responded < required {
            warn!(run_id = %record.run.id, %phase, round, responded, required, "Quorum not met");
            let reason = FailureReason::QuorumNotMet {
                phase,
                round,
                responded,
                required,
            };
            return self
                .commit(record, vec![EventKind::RunFailed { reason }])
                .await;
        }
        debug!(run_id = %record.run.id, %phase, round, responded, "Phase complete");
        records.push(EventKind::PhaseCompleted {
            phase,
            round,
            duration_ms: self.phase_elapsed_ms(record, phase, round),
        });
        self.commit(record, records).await
    }

    // ==================== Persistence ====================

    /// Apply, persist, then journal and publish a batch of events.
    ///
    /// `record` is only replaced once the new revision is durable.
    async fn commit(&self, record: &mut RunRecord, kinds: Vec<EventKind>) -> Result<(), EngineError> {
        let at = self.clock.now();
        let expected = record.revision();
        let mut next = record.clone();
        for kind in kinds {
            let event = next.run.next_event(kind, at);
            next.run.apply(&event)?;
            next.events.push(event);
        }

        self.save(&next, expected).await?;
        self.announce(&next.events[expected as usize..]);
        *record = next;
        Ok(())
    }

    async fn save(&self, record: &RunRecord, expected: u64) -> Result<(), EngineError> {
        let run_id = record.run.id;
        let policy = &self.config.persistence_retry;
        let mut retries = 0;
        loop {
            match self.store.save(record, expected).await {
                Ok(()) => return Ok(()),
                Err(StoreError::Conflict { .. }) if retries > 0 => {
                    // An earlier attempt may have landed after reporting failure.
                    if let Ok(Some(durable)) = self.store.load(&run_id).await
                        && durable == *record
                    {
                        return Ok(());
                    }
                    return Err(EngineError::ConcurrentWriteConflict(run_id));
                }
                Err(StoreError::Conflict { .. }) => {
                    warn!(%run_id, expected, "Concurrent write detected");
                    return Err(EngineError::ConcurrentWriteConflict(run_id));
                }
                Err(e) if retries < policy.max_retries => {
                    retries += 1;
                    warn!(%run_id, retries, "Save failed, retrying: {}", e);
                    tokio::time::sleep(policy.delay_for(retries)).await;
                }
                Err(e) => return Err(EngineError::PersistenceFailure(e.to_string())),
            }
        }
    }

    /// Hand durable events to the journal and the bus.
    fn announce(&self, events: &[RunEvent]) {
        for event in events {
            self.journal.record(event);
            if let Err(e) = self.bus.publish(event.clone()) {
                warn!(run_id = %event.run_id, "Event not published: {}", e);
            }
        }
    }
}
