//! Logging infrastructure: machine-readable run event journal.
//!
//! Provides [`JsonlEventJournal`], a JSONL writer that implements
//! the [`EventJournal`](council_application::EventJournal) port.

mod jsonl_journal;

pub use jsonl_journal::JsonlEventJournal;
