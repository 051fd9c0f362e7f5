//! Progress reporting for deliberation runs
//!
//! Reporters consume the run's event stream; they never query the engine.

use colored::Colorize;
use council_domain::{EventKind, Phase, RunEvent};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Mutex;

use crate::output::formatter::describe_event;

/// Receives every event of a followed run, in order
pub trait ProgressNotifier: Send + Sync {
    fn on_event(&self, event: &RunEvent);

    /// Called once the client stops following
    fn finish(&self) {}
}

/// Reports progress with a bar per phase
pub struct ProgressReporter {
    multi: MultiProgress,
    agents: usize,
    phase_bar: Mutex<Option<ProgressBar>>,
}

impl ProgressReporter {
    /// `agents` is the council size, i.e. the number of calls in ideation and critique.
    pub fn new(agents: usize) -> Self {
        Self {
            multi: MultiProgress::new(),
            agents,
            phase_bar: Mutex::new(None),
        }
    }

    fn phase_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    fn calls_in(&self, phase: Phase) -> u64 {
        match phase {
            Phase::Ideation | Phase::Critique => self.agents as u64,
            Phase::Audit => 1,
            Phase::ConvergenceCheck => 0,
        }
    }

    fn with_bar(&self, f: impl FnOnce(&mut Option<ProgressBar>)) {
        if let Ok(mut bar) = self.phase_bar.lock() {
            f(&mut bar);
        }
    }

    fn close(&self, message: String) {
        self.with_bar(|bar| {
            if let Some(pb) = bar.take() {
                pb.finish_with_message(message);
            }
        });
    }
}

impl ProgressNotifier for ProgressReporter {
    fn on_event(&self, event: &RunEvent) {
        match &event.kind {
            EventKind::PhaseStarted { phase, round } => {
                let pb = self.multi.add(ProgressBar::new(self.calls_in(*phase)));
                pb.set_style(Self::phase_style());
                pb.set_prefix(format!("R{} {} {}", round + 1, phase.emoji(), phase.display_name()));
                pb.set_message("Starting...");
                self.with_bar(|bar| {
                    if let Some(previous) = bar.replace(pb) {
                        previous.finish();
                    }
                });
            }
            EventKind::AgentResponded { agent, outcome, .. } => self.with_bar(|bar| {
                if let Some(pb) = bar.as_ref() {
                    let status = if outcome.is_success() {
                        format!("{} {}", "v".green(), agent)
                    } else {
                        format!("{} {}", "x".red(), agent)
                    };
                    pb.set_message(status);
                    pb.inc(1);
                }
            }),
            EventKind::PhaseCompleted { phase, .. } => {
                self.close(format!("{} complete!", phase.display_name().green()));
            }
            EventKind::RoundCompleted { .. } => {
                let _ = self.multi.println(describe_event(&event.kind).dimmed().to_string());
            }
            EventKind::ClarificationNeeded { request } => {
                self.close(format!("{} {}", "?".magenta(), request.agent));
            }
            EventKind::RunConverged { .. } => self.close("converged".green().to_string()),
            EventKind::RunFailed { reason } => self.close(reason.to_string().red().to_string()),
            EventKind::RunCancelled => self.close("cancelled".dimmed().to_string()),
            _ => {}
        }
    }

    fn finish(&self) {
        self.with_bar(|bar| {
            if let Some(pb) = bar.take() {
                pb.abandon();
            }
        });
    }
}

/// Simple text-based progress (no fancy UI)
pub struct SimpleProgress;

impl ProgressNotifier for SimpleProgress {
    fn on_event(&self, event: &RunEvent) {
        match &event.kind {
            EventKind::PhaseStarted { phase, round } => println!(
                "{} {} (round {})",
                "->".cyan(),
                phase.display_name().bold(),
                round + 1
            ),
            EventKind::AgentResponded { agent, outcome, .. } => {
                if outcome.is_success() {
                    println!("  {} {}", "v".green(), agent);
                } else {
                    println!("  {} {} ({})", "x".red(), agent, describe_event(&event.kind));
                }
            }
            EventKind::RoundCompleted { .. }
            | EventKind::ClarificationNeeded { .. }
            | EventKind::RunFailed { .. }
            | EventKind::RunCancelled => println!("{} {}", "=>".cyan(), describe_event(&event.kind)),
            _ => {}
        }
    }
}

/// Prints nothing
pub struct QuietProgress;

impl ProgressNotifier for QuietProgress {
    fn on_event(&self, _event: &RunEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use council_domain::{AgentId, ResponseOutcome, RunId};

    fn event(sequence: u64, kind: EventKind) -> RunEvent {
        RunEvent {
            run_id: RunId::new(),
            sequence,
            at: Utc.with_ymd_and_hms(2026, 3, 4, 9, 30, 0).unwrap(),
            kind,
        }
    }

    #[test]
    fn test_reporter_tracks_phase_bar() {
        let reporter = ProgressReporter::new(3);
        reporter.on_event(&event(
            1,
            EventKind::PhaseStarted {
                phase: Phase::Ideation,
                round: 0,
            },
        ));
        reporter.on_event(&event(
            2,
            EventKind::AgentResponded {
                agent: AgentId::new("a"),
                phase: Phase::Ideation,
                round: 0,
                outcome: ResponseOutcome::Accepted,
                attempts: 1,
            },
        ));
        {
            let bar = reporter.phase_bar.lock().unwrap();
            let pb = bar.as_ref().unwrap();
            assert_eq!(pb.length(), Some(3));
            assert_eq!(pb.position(), 1);
        }

        reporter.on_event(&event(
            3,
            EventKind::PhaseCompleted {
                phase: Phase::Ideation,
                round: 0,
                duration_ms: 1500,
            },
        ));
        assert!(reporter.phase_bar.lock().unwrap().is_none());
    }

    #[test]
    fn test_audit_phase_has_one_call() {
        let reporter = ProgressReporter::new(4);
        assert_eq!(reporter.calls_in(Phase::Audit), 1);
        assert_eq!(reporter.calls_in(Phase::Critique), 4);
    }
}
