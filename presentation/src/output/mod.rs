//! Output formatting for runs, decision records and event logs

pub mod console;
pub mod formatter;
pub mod markdown;

pub use console::ConsoleFormatter;
pub use formatter::{JsonFormatter, OutputFormatter, formatter_for};
pub use markdown::MarkdownFormatter;
