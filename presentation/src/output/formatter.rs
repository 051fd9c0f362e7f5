//! Output formatter trait

use council_application::{FailureReport, RunSummary};
use council_domain::{ArchitectureDecisionRecord, EventKind, ResponseOutcome, Run, RunEvent};
use serde::Serialize;

use super::{ConsoleFormatter, MarkdownFormatter};
use crate::cli::commands::OutputFormat;

/// Trait for rendering council results
pub trait OutputFormatter {
    /// Render the final decision record
    fn format_adr(&self, adr: &ArchitectureDecisionRecord) -> String;

    /// Render a run snapshot, including its ADR or failure when present
    fn format_run(&self, run: &Run) -> String;

    /// Render why a run failed
    fn format_failure(&self, report: &FailureReport) -> String;

    /// Render stored run summaries
    fn format_list(&self, runs: &[RunSummary]) -> String;

    /// Render one event as a single line
    fn format_event(&self, event: &RunEvent) -> String;
}

/// Formatter matching the `--format` flag
pub fn formatter_for(format: OutputFormat) -> Box<dyn OutputFormatter + Send + Sync> {
    match format {
        OutputFormat::Text => Box::new(ConsoleFormatter),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// One-line, uncolored description of an event
pub fn describe_event(kind: &EventKind) -> String {
    match kind {
        EventKind::RunCreated { question, .. } => format!("run created: {}", question.content()),
        EventKind::PhaseStarted { phase, round } => {
            format!("{} started (round {})", phase.display_name(), round)
        }
        EventKind::AgentResponded {
            agent,
            phase,
            outcome,
            attempts,
            ..
        } => {
            let result = match outcome {
                ResponseOutcome::Accepted => "ok".to_string(),
                ResponseOutcome::NeedsInformation { question } => {
                    format!("needs information: {}", question)
                }
                ResponseOutcome::Failed { failure } => format!("failed: {}", failure),
            };
            format!("{} responded to {} after {} attempt(s): {}", agent, phase, attempts, result)
        }
        EventKind::ProposalRecorded { proposal } => format!(
            "proposal {} by {}: {}",
            proposal.id, proposal.author, proposal.content.title
        ),
        EventKind::CritiqueRecorded { critique } => format!(
            "{} critiqued {} (agreement {:.0}%{})",
            critique.author,
            critique.target,
            critique.content.agreement * 100.0,
            if critique.content.blocking { ", blocking" } else { "" }
        ),
        EventKind::AuditRecorded { audit } => format!(
            "audit by {}: {} (consensus {:.0}%)",
            audit.auditor,
            audit.content.verdict,
            audit.content.consensus_level * 100.0
        ),
        EventKind::ClarificationNeeded { request } => format!(
            "clarification {} from {}: {}",
            request.id, request.agent, request.question
        ),
        EventKind::ClarificationAnswered { answer } => {
            format!("clarification {} answered", answer.request_id)
        }
        EventKind::PhaseCompleted {
            phase,
            round,
            duration_ms,
        } => format!(
            "{} completed (round {}, {:.1}s)",
            phase.display_name(),
            round,
            *duration_ms as f64 / 1000.0
        ),
        EventKind::RoundCompleted { round, verdict } => {
            format!("round {} completed: {}", round, verdict)
        }
        EventKind::RunConverged { artifact } => format!("converged: {}", artifact.title),
        EventKind::RunFailed { reason } => format!("failed: {}", reason),
        EventKind::RunCancelled => "cancelled".to_string(),
    }
}

/// Machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    fn pretty<T: Serialize>(value: &T) -> String {
        serde_json::to_string_pretty(value)
            .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_adr(&self, adr: &ArchitectureDecisionRecord) -> String {
        Self::pretty(adr)
    }

    fn format_run(&self, run: &Run) -> String {
        Self::pretty(run)
    }

    fn format_failure(&self, report: &FailureReport) -> String {
        Self::pretty(report)
    }

    fn format_list(&self, runs: &[RunSummary]) -> String {
        Self::pretty(&runs)
    }

    fn format_event(&self, event: &RunEvent) -> String {
        serde_json::to_string(event)
            .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, TimeZone, Utc};
    use council_application::RunSummary;
    use council_domain::{
        AdrStatus, AgentId, AnsweredClarification, ArchitectureDecisionRecord, AuditReference, AuditVerdict,
        IdeationOutput, Proposal, Risk, RiskSeverity, RunId, RunStatus,
    };

    pub fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 4, 9, 30, 0).unwrap()
    }

    pub fn adr() -> ArchitectureDecisionRecord {
        let proposal = Proposal::new(
            AgentId::new("architect"),
            0,
            IdeationOutput {
                title: "Append-only ledger".to_string(),
                summary: "Store every balance change as an immutable entry".to_string(),
                approach: "Event log in Postgres with hourly snapshots".to_string(),
                components: vec![],
                trade_offs: vec![],
                risks: vec![],
                confidence: 0.8,
                uncertainties: vec![],
                mermaid_diagram: Some("graph TD; api-->ledger".to_string()),
                clarification_needed: None,
            },
            at(),
        );
        ArchitectureDecisionRecord {
            title: "ADR: Append-only ledger".to_string(),
            status: AdrStatus::Accepted,
            decided_at: at(),
            decision: "Store every balance change as an immutable entry".to_string(),
            rationale: "Auditability outweighs write amplification".to_string(),
            context: "How should we design the payments ledger?".to_string(),
            constraints: vec!["PCI scope must not grow".to_string()],
            clarifications: vec![AnsweredClarification {
                question: "Which regions must hold a copy?".to_string(),
                answer: "EU only".to_string(),
            }],
            majority_opinion: proposal,
            minority_report: Some("engineer proposed: Mutable balances".to_string()),
            alternatives_considered: vec!["Mutable balances: update rows in place".to_string()],
            positive_consequences: vec!["Full history for auditors".to_string()],
            negative_consequences: vec!["Snapshot job to operate".to_string()],
            risks: vec![Risk {
                category: "operations".to_string(),
                severity: RiskSeverity::High,
                description: "Snapshot drift".to_string(),
                mitigation: "Nightly reconciliation".to_string(),
            }],
            mermaid_diagram: Some("graph TD; api-->ledger".to_string()),
            consensus_level: 0.82,
            rounds_taken: 1,
            source: AuditReference {
                round: 0,
                auditor: AgentId::new("auditor"),
                verdict: AuditVerdict::Accept,
            },
        }
    }

    pub fn summary(status: RunStatus) -> RunSummary {
        RunSummary {
            id: RunId::new(),
            question: "How should we design the payments ledger?".to_string(),
            status,
            rounds: 2,
            created_at: at(),
            updated_at: at(),
        }
    }
}
