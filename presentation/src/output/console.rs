//! Console output formatter for council results

use colored::{ColoredString, Colorize};
use council_application::{FailureReport, RunSummary};
use council_domain::{ArchitectureDecisionRecord, EventKind, Run, RunEvent, RunStatus};

use super::formatter::{OutputFormatter, describe_event};

/// Formats council results for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }

    fn bullets(out: &mut String, title: &str, items: &[String]) {
        if items.is_empty() {
            return;
        }
        out.push_str(&Self::section_header(title));
        for item in items {
            out.push_str(&format!("  - {}\n", item));
        }
    }

    fn status(status: RunStatus) -> ColoredString {
        match status {
            RunStatus::Running => status.as_str().yellow(),
            RunStatus::AwaitingClarification => status.as_str().magenta().bold(),
            RunStatus::Converged => status.as_str().green().bold(),
            RunStatus::Failed => status.as_str().red().bold(),
            RunStatus::Cancelled => status.as_str().dimmed(),
        }
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format_adr(&self, adr: &ArchitectureDecisionRecord) -> String {
        let mut out = Self::header(&adr.title);
        out.push('\n');

        out.push_str(&format!(
            "{} {}   {} {:.0}%   {} {}\n",
            "Decided:".cyan().bold(),
            adr.decided_at.format("%Y-%m-%d %H:%M UTC"),
            "Consensus:".cyan().bold(),
            adr.consensus_level * 100.0,
            "Rounds:".cyan().bold(),
            adr.rounds_taken
        ));
        out.push_str(&format!(
            "{} {} (round {}, {})\n",
            "Audited by:".cyan().bold(),
            adr.source.auditor,
            adr.source.round,
            adr.source.verdict
        ));

        out.push_str(&Self::section_header("Context"));
        out.push_str(&format!("{}\n", Self::indent(&adr.context, "  ")));
        Self::bullets(&mut out, "Constraints", &adr.constraints);
        if !adr.clarifications.is_empty() {
            out.push_str(&Self::section_header("Clarifications"));
            for clarification in &adr.clarifications {
                out.push_str(&format!(
                    "  {} {}
  {} {}
",
                    "Q:".magenta().bold(),
                    clarification.question,
                    "A:".green().bold(),
                    clarification.answer
                ));
            }
        }

        out.push_str(&Self::section_header("Decision"));
        out.push_str(&format!(
            "{}\n{}\n",
            format!("── {} ──", adr.majority_opinion.author).yellow().bold(),
            Self::indent(&adr.decision, "  ")
        ));

        out.push_str(&Self::section_header("Rationale"));
        out.push_str(&format!("{}\n", Self::indent(&adr.rationale, "  ")));

        Self::bullets(&mut out, "Positive Consequences", &adr.positive_consequences);
        Self::bullets(&mut out, "Negative Consequences", &adr.negative_consequences);

        if !adr.risks.is_empty() {
            out.push_str(&Self::section_header("Risks"));
            for risk in &adr.risks {
                out.push_str(&format!(
                    "  [{}] {}: {}\n",
                    risk.severity.as_str().to_uppercase().red(),
                    risk.category.bold(),
                    risk.description
                ));
                if !risk.mitigation.is_empty() {
                    out.push_str(&format!("      {} {}\n", "mitigation:".dimmed(), risk.mitigation));
                }
            }
        }

        Self::bullets(&mut out, "Alternatives Considered", &adr.alternatives_considered);
        if let Some(minority) = &adr.minority_report {
            out.push_str(&Self::section_header("Minority Report"));
            out.push_str(&format!("{}\n", Self::indent(minority, "  ")));
        }
        if let Some(diagram) = &adr.mermaid_diagram {
            out.push_str(&Self::section_header("Diagram (mermaid)"));
            out.push_str(&format!("{}\n", Self::indent(diagram.trim(), "  ").dimmed()));
        }

        out.push_str(&Self::footer());
        out
    }

    fn format_run(&self, run: &Run) -> String {
        if let (RunStatus::Converged, Some(adr)) = (run.status, &run.final_artifact) {
            return self.format_adr(adr);
        }

        let mut out = Self::header(&format!("Run {}", run.id));
        out.push('\n');
        out.push_str(&format!("{} {}\n", "Status:".cyan().bold(), Self::status(run.status)));
        out.push_str(&format!(
            "{} {}\n",
            "Question:".cyan().bold(),
            run.question.content()
        ));
        out.push_str(&format!("{} {}\n", "State:".cyan().bold(), run.state));

        for round in &run.rounds {
            out.push_str(&Self::section_header(&format!(
                "Round {} of {}",
                round.sequence + 1,
                run.max_rounds
            )));
            for proposal in &round.proposals {
                out.push_str(&format!(
                    "  {} {} {} ({:.0}% confident)\n",
                    "proposal".yellow(),
                    proposal.author.as_str().bold(),
                    proposal.content.title,
                    proposal.content.confidence * 100.0
                ));
            }
            let blocking = round.critiques.iter().filter(|c| c.content.blocking).count();
            if !round.critiques.is_empty() {
                out.push_str(&format!(
                    "  {} {} recorded, {} blocking\n",
                    "critiques".yellow(),
                    round.critiques.len(),
                    blocking
                ));
            }
            if let Some(audit) = &round.audit {
                out.push_str(&format!(
                    "  {} {} by {}\n",
                    "audit".yellow(),
                    audit.content.verdict.as_str().to_uppercase().bold(),
                    audit.auditor
                ));
            }
            if let Some(verdict) = &round.verdict {
                out.push_str(&format!("  {} {}\n", "verdict".yellow(), verdict));
            }
        }

        if let Some(request) = &run.pending_clarification {
            out.push_str(&Self::section_header("Clarification Needed"));
            out.push_str(&format!(
                "  [{}] {} asks: {}\n",
                request.id.magenta(),
                request.agent.as_str().bold(),
                request.question
            ));
            out.push_str(&format!(
                "  {}\n",
                format!("adr-council answer {} {} \"<answer>\"", run.id, request.id).dimmed()
            ));
        }
        if let Some(reason) = &run.failure {
            out.push_str(&Self::section_header("Failure"));
            out.push_str(&format!("  {}\n", reason.to_string().red()));
        }

        out.push_str(&Self::footer());
        out
    }

    fn format_failure(&self, report: &FailureReport) -> String {
        let mut out = Self::header("Deliberation Failed");
        out.push('\n');
        out.push_str(&format!("{} {}\n", "Run:".cyan().bold(), report.run_id));
        out.push_str(&format!(
            "{} {}\n",
            "Reason:".cyan().bold(),
            report.reason.to_string().red()
        ));

        for round in &report.rounds {
            out.push_str(&Self::section_header(&format!("Round {}", round.sequence + 1)));
            for proposal in &round.proposals {
                out.push_str(&format!(
                    "  {} {}: {}\n",
                    "proposal".yellow(),
                    proposal.author,
                    proposal.content.title
                ));
            }
            for critique in round.critiques.iter().filter(|c| c.content.blocking) {
                out.push_str(&format!(
                    "  {} {} on {}: {}\n",
                    "blocking".red(),
                    critique.author,
                    critique.target,
                    critique.content.concerns.join("; ")
                ));
            }
            if let Some(audit) = &round.audit {
                out.push_str(&format!(
                    "  {} {}: {}\n",
                    "audit".yellow(),
                    audit.content.verdict,
                    audit.content.rationale
                ));
            }
        }

        let failures: Vec<&RunEvent> = report
            .events
            .iter()
            .filter(|e| {
                matches!(
                    &e.kind,
                    EventKind::AgentResponded { outcome, .. } if !outcome.is_success()
                )
            })
            .collect();
        if !failures.is_empty() {
            out.push_str(&Self::section_header("Agent Failures"));
            for event in failures {
                out.push_str(&format!("  {}\n", describe_event(&event.kind)));
            }
        }
        out.push_str(&format!(
            "\n{} {} events recorded\n",
            "History:".cyan().bold(),
            report.events.len()
        ));
        out.push_str(&Self::footer());
        out
    }

    fn format_list(&self, runs: &[RunSummary]) -> String {
        if runs.is_empty() {
            return "No runs stored.".dimmed().to_string();
        }
        runs.iter()
            .map(|run| {
                format!(
                    "{}  {:<24} {:>2} round(s)  {}  {}",
                    run.id.to_string().bold(),
                    Self::status(run.status),
                    run.rounds,
                    run.updated_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
                    run.question
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn format_event(&self, event: &RunEvent) -> String {
        let name = match &event.kind {
            EventKind::RunConverged { .. } => event.kind.name().green().bold(),
            EventKind::RunFailed { .. } => event.kind.name().red().bold(),
            EventKind::ClarificationNeeded { .. } => event.kind.name().magenta().bold(),
            _ => event.kind.name().cyan(),
        };
        format!(
            "{:>4} {} {:<22} {}",
            event.sequence,
            event.at.format("%H:%M:%S").to_string().dimmed(),
            name,
            describe_event(&event.kind)
        )
    }
}
