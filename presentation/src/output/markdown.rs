//! Markdown rendering of decision records

use council_application::{FailureReport, RunSummary};
use council_domain::{ArchitectureDecisionRecord, Run, RunEvent, RunStatus};

use super::formatter::{OutputFormatter, describe_event};

/// Renders ADRs as standalone markdown documents
pub struct MarkdownFormatter;

impl MarkdownFormatter {
    fn list_section(out: &mut String, title: &str, items: &[String]) {
        if items.is_empty() {
            return;
        }
        out.push_str(&format!("\n## {}\n\n", title));
        for item in items {
            out.push_str(&format!("- {}\n", item));
        }
    }

    fn escape_cell(text: &str) -> String {
        text.replace('|', "\\|").replace('\n', " ")
    }
}

impl OutputFormatter for MarkdownFormatter {
    fn format_adr(&self, adr: &ArchitectureDecisionRecord) -> String {
        let mut out = format!("# {}\n\n", adr.title);
        out.push_str(&format!(
            "- **Status:** Accepted\n- **Date:** {}\n- **Consensus:** {:.0}%\n- **Rounds:** {}\n- **Audited by:** {} (round {}, {})\n",
            adr.decided_at.format("%Y-%m-%d"),
            adr.consensus_level * 100.0,
            adr.rounds_taken,
            adr.source.auditor,
            adr.source.round,
            adr.source.verdict
        ));

        out.push_str(&format!("\n## Context\n\n{}\n", adr.context));
        Self::list_section(&mut out, "Constraints", &adr.constraints);
        if !adr.clarifications.is_empty() {
            out.push_str("\n## Clarifications\n\n");
            for clarification in &adr.clarifications {
                out.push_str(&format!(
                    "- **Q:** {}\n  **A:** {}\n",
                    clarification.question, clarification.answer
                ));
            }
        }

        out.push_str(&format!("\n## Decision\n\n{}\n", adr.decision));
        let approach = &adr.majority_opinion.content.approach;
        if !approach.is_empty() {
            out.push_str(&format!("\n{}\n", approach));
        }
        out.push_str(&format!("\n## Rationale\n\n{}\n", adr.rationale));

        if let Some(diagram) = &adr.mermaid_diagram {
            out.push_str(&format!("\n## Architecture\n\n```mermaid\n{}\n```\n", diagram.trim()));
        }

        Self::list_section(&mut out, "Positive Consequences", &adr.positive_consequences);
        Self::list_section(&mut out, "Negative Consequences", &adr.negative_consequences);

        if !adr.risks.is_empty() {
            out.push_str("\n## Risks\n\n| Severity | Category | Description | Mitigation |\n|---|---|---|---|\n");
            for risk in &adr.risks {
                out.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    risk.severity.as_str(),
                    Self::escape_cell(&risk.category),
                    Self::escape_cell(&risk.description),
                    Self::escape_cell(&risk.mitigation)
                ));
            }
        }

        Self::list_section(&mut out, "Alternatives Considered", &adr.alternatives_considered);
        if let Some(minority) = &adr.minority_report {
            out.push_str(&format!("\n## Minority Report\n\n{}\n", minority));
        }
        out
    }

    fn format_run(&self, run: &Run) -> String {
        if let (RunStatus::Converged, Some(adr)) = (run.status, &run.final_artifact) {
            return self.format_adr(adr);
        }
        let mut out = format!("# Run {}\n\n", run.id);
        out.push_str(&format!(
            "- **Status:** {}\n- **Question:** {}\n- **Rounds:** {} of {}\n",
            run.status,
            run.question.content(),
            run.rounds.len(),
            run.max_rounds
        ));
        if let Some(request) = &run.pending_clarification {
            out.push_str(&format!(
                "\n## Pending Clarification `{}`\n\n> {}\n\nAsked by {} during {}.\n",
                request.id, request.question, request.agent, request.phase
            ));
        }
        if let Some(reason) = &run.failure {
            out.push_str(&format!("\n## Failure\n\n{}\n", reason));
        }
        out
    }

    fn format_failure(&self, report: &FailureReport) -> String {
        let mut out = format!("# Run {} failed\n\n{}\n", report.run_id, report.reason);
        for round in &report.rounds {
            out.push_str(&format!("\n## Round {}\n\n", round.sequence));
            for proposal in &round.proposals {
                out.push_str(&format!(
                    "- Proposal `{}` by {}: {}\n",
                    proposal.id, proposal.author, proposal.content.title
                ));
            }
            if let Some(audit) = &round.audit {
                out.push_str(&format!(
                    "- Audit: **{}** ({})\n",
                    audit.content.verdict, audit.content.rationale
                ));
            }
        }
        out.push_str(&format!("\n## Events\n\n{} events recorded.\n", report.events.len()));
        out
    }

    fn format_list(&self, runs: &[RunSummary]) -> String {
        let mut out = "| Run | Status | Rounds | Updated | Question |\n|---|---|---|---|---|\n".to_string();
        for run in runs {
            out.push_str(&format!(
                "| `{}` | {} | {} | {} | {} |\n",
                run.id,
                run.status,
                run.rounds,
                run.updated_at.format("%Y-%m-%d %H:%M"),
                Self::escape_cell(&run.question)
            ));
        }
        out
    }

    fn format_event(&self, event: &RunEvent) -> String {
        format!("- `{}` {}", event.sequence, describe_event(&event.kind))
    }
}
