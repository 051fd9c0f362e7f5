//! Presentation layer for adr-council
//!
//! This crate contains CLI definitions, output formatters,
//! progress reporters, and the interactive clarification prompt.

pub mod cli;
pub mod follow;
pub mod interaction;
pub mod output;
pub mod progress;

// Re-export commonly used types
pub use cli::commands::{Cli, Command, OutputFormat};
pub use follow::{FollowError, RunFollower};
pub use interaction::{ClarificationResponder, StdinClarification};
pub use output::{
    ConsoleFormatter, JsonFormatter, MarkdownFormatter, OutputFormatter, formatter_for,
};
pub use progress::{ProgressNotifier, ProgressReporter, QuietProgress, SimpleProgress};
