//! Domain layer for adr-council
//!
//! This crate contains the deliberation state machine, the records a run
//! accumulates, the phase output schemas and the convergence policy.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Deliberation
//!
//! A run moves through rounds of four phases:
//!
//! - **Ideation**: every agent proposes an architecture, blind to the others
//! - **Critique**: every agent critiques every other proposal
//! - **Audit**: a designated auditor weighs proposals and critiques
//! - **Convergence Check**: accept, go another round, or ask the human
//!
//! ## Events
//!
//! Everything that happens to a run is a [`RunEvent`]. The [`Run`] snapshot is
//! the fold of its events, so replay always reproduces the live state.

pub mod context;
pub mod convergence;
pub mod core;
pub mod deliberation;
pub mod events;
pub mod machine;
pub mod prompt;
pub mod schema;

// Re-export commonly used types
pub use context::{Constraint, ConstraintSeverity, SystemContext};
pub use convergence::{ConvergenceChecker, ConvergenceVerdict, DefaultConvergenceChecker};
pub use core::{
    error::DomainError,
    ids::{AgentId, RunId},
    question::Question,
    sanitize::{InjectionKind, Sanitized, sanitize},
};
pub use deliberation::{
    adr::{AdrStatus, ArchitectureDecisionRecord, AuditReference},
    failure::{AgentFailure, FailureReason},
    phase::{Phase, RunStatus},
    records::{
        AnsweredClarification, AuditDecision, ClarificationAnswer, ClarificationRecord,
        ClarificationRequest, Critique, Proposal, Round, critique_id, proposal_id,
    },
    request::{AgentRequest, AuditDigest, RequestPayload},
    run::Run,
};
pub use events::{EventKind, ResponseOutcome, RunEvent};
pub use machine::{EngineState, MachineInput, transition};
pub use prompt::PromptTemplate;
pub use schema::{
    AgentReply, AuditOutput, AuditVerdict, CritiqueOutput, IdeationOutput, PhaseOutput, Risk,
    RiskSeverity, TargetCritique, ValidationError, ViolationKind, validate,
};
