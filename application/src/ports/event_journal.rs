//! Port for the machine-readable event journal.
//!
//! Every committed [`RunEvent`] is offered to the journal after it has been
//! persisted. This is separate from `tracing`-based operation logs: tracing
//! handles human-readable diagnostics, while the journal keeps a complete
//! record in a machine-readable format (JSONL).

use council_domain::RunEvent;

/// Port for recording run events.
///
/// `record` is synchronous and non-fallible so a broken journal never
/// interrupts a deliberation; implementations swallow their own errors.
pub trait EventJournal: Send + Sync {
    fn record(&self, event: &RunEvent);
}

/// No-op implementation for tests and when journaling is disabled.
pub struct NoEventJournal;

impl EventJournal for NoEventJournal {
    fn record(&self, _event: &RunEvent) {}
}
