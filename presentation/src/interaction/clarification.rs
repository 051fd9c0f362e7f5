//! Interactive clarification prompt.
//!
//! When an agent cannot proceed without more information the run pauses and
//! the user sees:
//!
//! ```text
//! ═══════════════════════════════════════════════════════════════
//!   ?  Clarification Needed [clr-1]
//! ═══════════════════════════════════════════════════════════════
//!
//! architect asks (ideation, round 1):
//!   What is the expected write volume?
//!
//! Type your answer, or press Enter to leave the run paused.
//!
//! answer>
//! ```

use async_trait::async_trait;
use colored::Colorize;
use council_domain::ClarificationRequest;
use std::io::{self, BufRead, Write};

/// Supplies answers to clarification requests.
#[async_trait]
pub trait ClarificationResponder: Send + Sync {
    /// The answer, or `None` to leave the run suspended.
    async fn respond(&self, request: &ClarificationRequest) -> io::Result<Option<String>>;
}

/// Asks the user on the terminal.
#[derive(Debug, Default)]
pub struct StdinClarification;

impl StdinClarification {
    pub fn new() -> Self {
        Self
    }

    fn display_prompt(request: &ClarificationRequest) {
        let rule = "═══════════════════════════════════════════════════════════════";
        println!();
        println!("{}", rule.magenta().bold());
        println!(
            "{}",
            format!("  ?  Clarification Needed [{}]", request.id).magenta().bold()
        );
        println!("{}", rule.magenta().bold());
        println!();
        println!(
            "{} asks ({}, round {}):",
            request.agent.as_str().cyan().bold(),
            request.phase,
            request.round + 1
        );
        println!("  {}", request.question);
        println!();
        println!(
            "{}",
            "Type your answer, or press Enter to leave the run paused.".dimmed()
        );
        println!();
    }

    fn read_answer() -> io::Result<Option<String>> {
        print!("{} ", "answer>".magenta().bold());
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(parse_answer(&line))
    }
}

/// Blank input means "not now".
fn parse_answer(line: &str) -> Option<String> {
    let answer = line.trim();
    if answer.is_empty() {
        None
    } else {
        Some(answer.to_string())
    }
}

#[async_trait]
impl ClarificationResponder for StdinClarification {
    async fn respond(&self, request: &ClarificationRequest) -> io::Result<Option<String>> {
        Self::display_prompt(request);
        tokio::task::spawn_blocking(Self::read_answer)
            .await
            .map_err(io::Error::other)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("  \n"), None);
        assert_eq!(
            parse_answer("  about 2k writes/s \n"),
            Some("about 2k writes/s".to_string())
        );
    }
}
