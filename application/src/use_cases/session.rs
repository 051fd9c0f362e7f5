//! Session Manager use case
//!
//! Lifecycle API around the [`DeliberationEngine`]: starts runs in the
//! background, answers clarifications, cancels, and resumes runs after a
//! restart. All run state lives in the run store; the manager only tracks
//! which runs it is currently executing.

use council_domain::{
    ArchitectureDecisionRecord, DomainError, FailureReason, Question, Round, Run, RunEvent, RunId,
    RunStatus, SystemContext, sanitize,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::events::{EventBusError, EventSubscription};
use crate::ports::run_store::{RunSummary, StoreError};
use crate::use_cases::deliberation::{DeliberationEngine, EngineError};

/// Errors returned by the session API
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    EventBus(#[from] EventBusError),

    #[error("Run {0} is already executing")]
    AlreadyRunning(RunId),

    #[error("Clarification answer is empty")]
    EmptyAnswer,

    #[error("Run {run_id} has not finished (status: {status})")]
    NotFinished { run_id: RunId, status: RunStatus },

    #[error("Run {run_id} did not fail (status: {status})")]
    NotFailed { run_id: RunId, status: RunStatus },

    #[error("Execution registry lock poisoned")]
    Poisoned,
}

/// Everything needed to understand why a run failed.
#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub run_id: RunId,
    pub reason: FailureReason,
    pub rounds: Vec<Round>,
    pub events: Vec<RunEvent>,
}

/// How a background execution ended.
type ExecutionResult = Option<Result<RunStatus, String>>;

struct Execution {
    cancel: CancellationToken,
    done: watch::Receiver<ExecutionResult>,
}

type Executions = Arc<Mutex<HashMap<RunId, Execution>>>;

/// Entry point for starting and steering deliberations
pub struct SessionManager {
    engine: Arc<DeliberationEngine>,
    executions: Executions,
}

impl SessionManager {
    pub fn new(engine: Arc<DeliberationEngine>) -> Self {
        Self {
            engine,
            executions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn engine(&self) -> &Arc<DeliberationEngine> {
        &self.engine
    }

    /// Validate the question, persist a new run and start executing it.
    pub async fn start(
        &self,
        question: &str,
        context: Option<SystemContext>,
    ) -> Result<RunId, SessionError> {
        let (question, findings) = Question::parse_with_findings(question)?;
        for kind in &findings {
            warn!("Suspicious pattern redacted from question: {}", kind.as_str());
        }
        let run = self.engine.create(question, context).await?;
        self.spawn(run.id)?;
        Ok(run.id)
    }

    /// Current snapshot of a run. Never blocks on execution.
    pub async fn snapshot(&self, run_id: RunId) -> Result<Run, SessionError> {
        Ok(self.engine.load(run_id).await?.run)
    }

    /// Full event log of a run.
    pub async fn history(&self, run_id: RunId) -> Result<Vec<RunEvent>, SessionError> {
        Ok(self.engine.load(run_id).await?.events)
    }

    /// Follow a run's events starting at `from`.
    pub async fn subscribe(
        &self,
        run_id: RunId,
        from: u64,
    ) -> Result<EventSubscription, SessionError> {
        // The bus may not know runs persisted by an earlier process.
        let record = self.engine.load(run_id).await?;
        let bus = self.engine.bus();
        bus.catch_up(&record.events)?;
        Ok(bus.subscribe(run_id, from)?)
    }

    /// Answer the pending clarification and continue the run.
    pub async fn answer_clarification(
        &self,
        run_id: RunId,
        request_id: &str,
        answer: &str,
    ) -> Result<(), SessionError> {
        let sanitized = sanitize(answer);
        for kind in &sanitized.findings {
            warn!(%run_id, "Suspicious pattern redacted from answer: {}", kind.as_str());
        }
        if sanitized.text.is_empty() {
            return Err(SessionError::EmptyAnswer);
        }

        // The execution that raised the request may still be winding down
        // and holding the run lease.
        self.join_execution(run_id).await?;
        self.engine
            .answer(run_id, request_id, sanitized.text)
            .await?;
        loop {
            match self.spawn(run_id) {
                Err(SessionError::AlreadyRunning(_)) => {
                    self.join_execution(run_id).await?;
                    if self.snapshot(run_id).await?.status != RunStatus::Running {
                        return Ok(());
                    }
                }
                other => return other,
            }
        }
    }

    /// Request cancellation.
    ///
    /// An executing run stops at its next phase boundary; an idle run is
    /// cancelled right away. Terminal runs are left alone.
    pub async fn cancel(&self, run_id: RunId) -> Result<(), SessionError> {
        if let Some(cancel) = self.execution_token(&run_id)? {
            info!(%run_id, "Cancellation requested");
            cancel.cancel();
            return Ok(());
        }
        self.engine.cancel_idle(run_id).await?;
        Ok(())
    }

    /// Continue a run that is `running` but not executing.
    pub async fn resume(&self, run_id: RunId) -> Result<RunStatus, SessionError> {
        let run = self.snapshot(run_id).await?;
        if run.status == RunStatus::Running {
            self.spawn(run_id)?;
        }
        Ok(run.status)
    }

    /// Restart every stored run left `running` by a previous process.
    pub async fn recover(&self) -> Result<Vec<RunId>, SessionError> {
        let mut resumed = Vec::new();
        for summary in self.engine.store().list().await? {
            if summary.status != RunStatus::Running || self.is_executing(&summary.id)? {
                continue;
            }
            info!(run_id = %summary.id, "Recovering run");
            self.spawn(summary.id)?;
            resumed.push(summary.id);
        }
        Ok(resumed)
    }

    /// Wait until the run is suspended or terminal, then return it.
    pub async fn wait(&self, run_id: RunId) -> Result<Run, SessionError> {
        self.join_execution(run_id).await?;
        self.snapshot(run_id).await
    }

    /// Failure reason plus the full round and event history.
    pub async fn failure_report(&self, run_id: RunId) -> Result<FailureReport, SessionError> {
        let record = self.engine.load(run_id).await?;
        let Some(reason) = record.run.failure.clone() else {
            return Err(SessionError::NotFailed {
                run_id,
                status: record.run.status,
            });
        };
        Ok(FailureReport {
            run_id,
            reason,
            rounds: record.run.rounds,
            events: record.events,
        })
    }

    /// The final ADR, or the run-level error that prevented one.
    pub async fn outcome(&self, run_id: RunId) -> Result<ArchitectureDecisionRecord, SessionError> {
        let run = self.snapshot(run_id).await?;
        match (run.status, run.final_artifact, run.failure) {
            (RunStatus::Converged, Some(adr), _) => Ok(adr),
            (RunStatus::Failed, _, Some(reason)) => Err(EngineError::from(reason).into()),
            (status, _, _) => Err(SessionError::NotFinished { run_id, status }),
        }
    }

    pub async fn list(&self) -> Result<Vec<RunSummary>, SessionError> {
        Ok(self.engine.store().list().await?)
    }

    /// Remove a run that is not executing.
    pub async fn delete(&self, run_id: RunId) -> Result<bool, SessionError> {
        if self.is_executing(&run_id)? {
            return Err(SessionError::AlreadyRunning(run_id));
        }
        let removed = self.engine.store().delete(&run_id).await?;
        self.engine.bus().forget(&run_id);
        Ok(removed)
    }

    pub fn is_executing(&self, run_id: &RunId) -> Result<bool, SessionError> {
        Ok(self.lock()?.contains_key(run_id))
    }

    // ==================== Background execution ====================

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<RunId, Execution>>, SessionError> {
        self.executions
            .lock()
            .map_err(|_| SessionError::Poisoned)
    }

    fn execution_token(&self, run_id: &RunId) -> Result<Option<CancellationToken>, SessionError> {
        Ok(self.lock()?.get(run_id).map(|e| e.cancel.clone()))
    }

    /// Block until the current background execution of `run_id`, if any,
    /// has released the run.
    async fn join_execution(&self, run_id: RunId) -> Result<(), SessionError> {
        let done = self
            .lock()?
            .get(&run_id)
            .map(|execution| execution.done.clone());
        if let Some(mut done) = done {
            let finished = done.wait_for(|result| result.is_some()).await;
            if let Ok(result) = finished
                && let Some(Err(detail)) = result.as_ref()
            {
                warn!(%run_id, "Execution ended with error: {}", detail);
            }
        }
        Ok(())
    }

    fn spawn(&self, run_id: RunId) -> Result<(), SessionError> {
        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(None);
        {
            let mut executions = self.lock()?;
            if executions.contains_key(&run_id) {
                return Err(SessionError::AlreadyRunning(run_id));
            }
            executions.insert(
                run_id,
                Execution {
                    cancel: cancel.clone(),
                    done: rx,
                },
            );
        }

        let engine = Arc::clone(&self.engine);
        let executions = Arc::clone(&self.executions);
        tokio::spawn(async move {
            let mut result = engine.execute(run_id, &cancel).await;
            // Cancellation that arrived after the last phase boundary.
            if cancel.is_cancelled()
                && matches!(result, Ok(status) if !status.is_terminal())
            {
                result = engine.cancel_idle(run_id).await.map(|run| run.status);
            }
            match &result {
                Ok(status) => info!(%run_id, %status, "Execution finished"),
                Err(e) => warn!(%run_id, "Execution failed: {}", e),
            }
            if let Ok(mut executions) = executions.lock() {
                executions.remove(&run_id);
            }
            let _ = tx.send(Some(result.map_err(|e| e.to_string())));
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentProfile, EngineConfig, RetryPolicy};
    use crate::ports::agent_gateway::{AgentGateway, GatewayError};
    use crate::ports::run_store::{InMemoryRunStore, RunStore};
    use async_trait::async_trait;
    use council_domain::{AgentRequest, EventKind, RequestPayload};
    use serde_json::{Value, json};
    use std::time::Duration;

    /// Valid replies; agent `a` asks for the budget until it is told.
    struct Council {
        ask_budget: bool,
        reject: bool,
    }

    impl Council {
        fn cooperative() -> Arc<Self> {
            Arc::new(Self {
                ask_budget: false,
                reject: false,
            })
        }
    }

    #[async_trait]
    impl AgentGateway for Council {
        async fn invoke(&self, request: &AgentRequest) -> Result<Value, GatewayError> {
            Ok(match &request.payload {
                RequestPayload::Ideation
                    if self.ask_budget
                        && request.agent.as_str() == "a"
                        && request.clarifications.is_empty() =>
                {
                    json!({"insufficient_information": {"question": "What is the budget?"}})
                }
                RequestPayload::Ideation => json!({
                    "title": format!("{} plan", request.agent),
                    "summary": "Queue-based pipeline",
                    "approach": "Workers behind a durable queue",
                    "confidence": 0.6
                }),
                RequestPayload::Critique { targets } => json!({
                    "critiques": targets
                        .iter()
                        .map(|p| json!({"target": p.id, "agreement": 0.7}))
                        .collect::<Vec<_>>()
                }),
                RequestPayload::Audit { proposals, .. } => json!({
                    "verdict": if self.reject { "REJECT" } else { "ACCEPT" },
                    "preferred_proposal": proposals[0].id,
                    "rationale": "Fits the team",
                    "consensus_level": 0.8
                }),
            })
        }
    }

    fn manager(gateway: Arc<Council>, max_rounds: u32) -> SessionManager {
        let config = EngineConfig::new(
            vec![AgentProfile::new("a"), AgentProfile::new("b")],
            AgentProfile::new("auditor"),
        )
        .with_max_rounds(max_rounds)
        .with_agent_retry(RetryPolicy::none())
        .with_agent_timeout(Duration::from_secs(5));
        let engine = DeliberationEngine::new(gateway, Arc::new(InMemoryRunStore::new()), config);
        SessionManager::new(Arc::new(engine))
    }

    const QUESTION: &str = "Which message broker should the order service use?";

    #[tokio::test]
    async fn test_start_runs_to_convergence() {
        let sessions = manager(Council::cooperative(), 3);
        let run_id = sessions.start(QUESTION, None).await.unwrap();

        let run = sessions.wait(run_id).await.unwrap();
        assert_eq!(run.status, RunStatus::Converged);
        assert!(!sessions.is_executing(&run_id).unwrap());

        let adr = sessions.outcome(run_id).await.unwrap();
        assert_eq!(adr.title, "ADR: a plan");
        let history = sessions.history(run_id).await.unwrap();
        assert_eq!(history[0].sequence, 0);
        assert_eq!(history[0].kind.name(), "run_created");
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_question() {
        let sessions = manager(Council::cooperative(), 3);
        let err = sessions.start("   short ", None).await.unwrap_err();
        assert!(matches!(err, SessionError::Domain(DomainError::InvalidQuestion(_))));
        assert!(sessions.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clarification_resumes_the_run() {
        let gateway = Arc::new(Council {
            ask_budget: true,
            reject: false,
        });
        let sessions = manager(gateway, 3);
        let run_id = sessions.start(QUESTION, None).await.unwrap();

        let run = sessions.wait(run_id).await.unwrap();
        assert_eq!(run.status, RunStatus::AwaitingClarification);
        let pending = run.pending_clarification.unwrap();

        let err = sessions
            .answer_clarification(run_id, &pending.id, "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::EmptyAnswer));

        sessions
            .answer_clarification(run_id, &pending.id, "Around 2k EUR per month")
            .await
            .unwrap();
        let run = sessions.wait(run_id).await.unwrap();
        assert_eq!(run.status, RunStatus::Converged);

        let history = sessions.history(run_id).await.unwrap();
        let asked = history
            .iter()
            .filter(|e| matches!(e.kind, EventKind::ClarificationNeeded { .. }))
            .count();
        let answered = history
            .iter()
            .filter(|e| matches!(e.kind, EventKind::ClarificationAnswered { .. }))
            .count();
        assert_eq!((asked, answered), (1, 1));
    }

    #[tokio::test]
    async fn test_stale_clarification_id_is_rejected() {
        let gateway = Arc::new(Council {
            ask_budget: true,
            reject: false,
        });
        let sessions = manager(gateway, 3);
        let run_id = sessions.start(QUESTION, None).await.unwrap();
        sessions.wait(run_id).await.unwrap();

        let err = sessions
            .answer_clarification(run_id, "clr-7", "Answer")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Engine(EngineError::StaleClarification { .. })
        ));
    }

    #[tokio::test]
    async fn test_failure_report_carries_history() {
        let gateway = Arc::new(Council {
            ask_budget: false,
            reject: true,
        });
        let sessions = manager(gateway, 2);
        let run_id = sessions.start(QUESTION, None).await.unwrap();
        assert_eq!(sessions.wait(run_id).await.unwrap().status, RunStatus::Failed);

        let report = sessions.failure_report(run_id).await.unwrap();
        assert_eq!(report.reason, FailureReason::ConvergenceExhausted { rounds: 2 });
        assert_eq!(report.rounds.len(), 2);
        assert_eq!(report.events, sessions.history(run_id).await.unwrap());

        let err = sessions.outcome(run_id).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Engine(EngineError::ConvergenceExhausted { rounds: 2 })
        ));
    }

    #[tokio::test]
    async fn test_cancel_before_first_phase() {
        let sessions = manager(Council::cooperative(), 3);
        let run_id = sessions.start(QUESTION, None).await.unwrap();
        sessions.cancel(run_id).await.unwrap();

        let run = sessions.wait(run_id).await.unwrap();
        assert_eq!(run.status, RunStatus::Cancelled);
        assert!(run.final_artifact.is_none());
        assert!(sessions.outcome(run_id).await.is_err());
    }

    #[tokio::test]
    async fn test_cancel_suspended_run_is_immediate() {
        let gateway = Arc::new(Council {
            ask_budget: true,
            reject: false,
        });
        let sessions = manager(gateway, 3);
        let run_id = sessions.start(QUESTION, None).await.unwrap();
        sessions.wait(run_id).await.unwrap();

        sessions.cancel(run_id).await.unwrap();
        let run = sessions.snapshot(run_id).await.unwrap();
        assert_eq!(run.status, RunStatus::Cancelled);
        assert!(run.pending_clarification.is_none());
    }

    #[tokio::test]
    async fn test_cancel_terminal_run_is_a_no_op() {
        let sessions = manager(Council::cooperative(), 3);
        let run_id = sessions.start(QUESTION, None).await.unwrap();
        sessions.wait(run_id).await.unwrap();

        sessions.cancel(run_id).await.unwrap();
        assert_eq!(
            sessions.snapshot(run_id).await.unwrap().status,
            RunStatus::Converged
        );
    }

    #[tokio::test]
    async fn test_subscribe_replays_from_sequence() {
        let sessions = manager(Council::cooperative(), 3);
        let run_id = sessions.start(QUESTION, None).await.unwrap();
        sessions.wait(run_id).await.unwrap();

        let mut subscription = sessions.subscribe(run_id, 3).await.unwrap();
        let mut seen = Vec::new();
        while let Some(event) = subscription.recv().await {
            seen.push(event);
        }
        let history = sessions.history(run_id).await.unwrap();
        assert_eq!(seen, history[3..].to_vec());
    }

    #[tokio::test]
    async fn test_recover_resumes_running_runs() {
        let store = Arc::new(InMemoryRunStore::new());
        let config = EngineConfig::new(
            vec![AgentProfile::new("a"), AgentProfile::new("b")],
            AgentProfile::new("auditor"),
        )
        .with_agent_retry(RetryPolicy::none());

        // A run persisted by an earlier process that never executed it.
        let earlier = DeliberationEngine::new(Council::cooperative(), store.clone(), config.clone());
        let run = earlier
            .create(Question::parse(QUESTION).unwrap(), None)
            .await
            .unwrap();

        let engine = DeliberationEngine::new(Council::cooperative(), store.clone(), config);
        let sessions = SessionManager::new(Arc::new(engine));
        let resumed = sessions.recover().await.unwrap();
        assert_eq!(resumed, vec![run.id]);

        assert_eq!(
            sessions.wait(run.id).await.unwrap().status,
            RunStatus::Converged
        );
        assert!(sessions.recover().await.unwrap().is_empty());
        assert_eq!(
            store.load(&run.id).await.unwrap().unwrap().run.status,
            RunStatus::Converged
        );
    }

    #[tokio::test]
    async fn test_delete_removes_run() {
        let sessions = manager(Council::cooperative(), 3);
        let run_id = sessions.start(QUESTION, None).await.unwrap();
        sessions.wait(run_id).await.unwrap();

        assert!(sessions.delete(run_id).await.unwrap());
        assert!(matches!(
            sessions.snapshot(run_id).await.unwrap_err(),
            SessionError::Engine(EngineError::RunNotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_answer_as_soon_as_clarification_is_published() {
        let gateway = Arc::new(Council {
            ask_budget: true,
            reject: false,
        });
        let sessions = manager(gateway, 3);

        for _ in 0..50 {
            let run_id = sessions.start(QUESTION, None).await.unwrap();
            let mut subscription = sessions.subscribe(run_id, 0).await.unwrap();
            let mut answered = 0;
            while let Some(event) = subscription.recv().await {
                if let EventKind::ClarificationNeeded { request } = &event.kind {
                    sessions
                        .answer_clarification(run_id, &request.id, "Around 2k EUR per month")
                        .await
                        .unwrap();
                    answered += 1;
                }
            }
            assert_eq!(answered, 1);
            assert_eq!(
                sessions.wait(run_id).await.unwrap().status,
                RunStatus::Converged
            );
        }
    }
}
