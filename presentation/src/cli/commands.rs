//! CLI command definitions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for runs and decision records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Colored terminal output
    #[default]
    Text,
    /// Markdown ADR document
    Markdown,
    /// JSON output
    Json,
}

/// CLI arguments for adr-council
#[derive(Parser, Debug)]
#[command(name = "adr-council")]
#[command(author, version, about = "A council of AI agents deliberates a design question into an ADR")]
#[command(long_about = r#"
adr-council runs a council of agents through rounds of structured debate
and records the outcome as an Architecture Decision Record.

Each round has four phases:
1. Ideation: every agent proposes an architecture, blind to the others
2. Critique: every agent critiques every other proposal
3. Audit: the auditor weighs proposals and critiques
4. Convergence check: accept, run another round, or ask you a question

Configuration files are loaded from (in priority order):
1. COUNCIL_* environment variables
2. --config <path>     Explicit config file
3. ./council.toml      Project-level config
4. ~/.config/adr-council/config.toml   Global config

Example:
  adr-council ask "How should we shard the order history table?"
  adr-council ask --context context.json "Event sourcing or CRUD for billing?"
  adr-council --format markdown status 3f0c...
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Start a deliberation and follow it to the end
    Ask {
        /// The design question
        question: String,

        /// JSON file describing the system context
        #[arg(long, value_name = "FILE")]
        context: Option<PathBuf>,

        /// Never prompt; leave the run paused if an agent needs clarification
        #[arg(long)]
        detach: bool,
    },

    /// Show a run's current state
    Status {
        run_id: String,
    },

    /// Answer a pending clarification and continue the run
    Answer {
        run_id: String,
        /// Clarification id (`clr-N`)
        request_id: String,
        /// Your answer
        text: String,
    },

    /// Cancel a run
    Cancel {
        run_id: String,
    },

    /// Continue a run interrupted by a restart
    Resume {
        run_id: String,
    },

    /// List stored runs, most recent first
    List,

    /// Print a run's event log
    Events {
        run_id: String,

        /// First sequence number to print
        #[arg(long, default_value_t = 0)]
        from: u64,
    },

    /// Delete a stored run
    Delete {
        run_id: String,
    },

    /// Show configuration file locations and the effective configuration
    ShowConfig,
}
