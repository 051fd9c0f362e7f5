//! Phase output schemas and their validator.
//!
//! Agents answer with free-form JSON. Nothing enters a run until
//! [`validate`] has turned that JSON into one of the typed outputs in
//! [`output`], or into an [`AgentReply::InsufficientInformation`] signal.

pub mod error;
pub mod output;
pub mod validate;

pub use error::{ValidationError, ViolationKind};
pub use output::{
    AuditOutput, AuditVerdict, Component, CritiqueOutput, IdeationOutput, PhaseOutput, Risk,
    RiskSeverity, TargetCritique, TradeOff,
};
pub use validate::{AgentReply, check_audit_references, check_targets, validate};
