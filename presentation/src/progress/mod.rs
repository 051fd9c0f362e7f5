//! Live progress display for a following client

pub mod reporter;

pub use reporter::{ProgressNotifier, ProgressReporter, QuietProgress, SimpleProgress};
