//! JSONL file writer for run events.
//!
//! Each [`RunEvent`] is serialized as a single JSON line carrying its `type`
//! and a `timestamp`, appended to `<dir>/<run_id>.events.jsonl`.

use council_application::EventJournal;
use council_domain::{RunEvent, RunId};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Event journal writing one JSONL file per run.
///
/// Thread-safe via a `Mutex` around the open writers. Flushes after every
/// line and on `Drop`.
pub struct JsonlEventJournal {
    dir: PathBuf,
    writers: Mutex<HashMap<RunId, BufWriter<File>>>,
}

impl JsonlEventJournal {
    /// Create a journal writing into `dir`.
    ///
    /// Creates the directory if it doesn't exist.
    /// Returns `None` if the directory cannot be created.
    pub fn new(dir: impl AsRef<Path>) -> Option<Self> {
        let dir = dir.as_ref();
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!("Could not create event journal directory {}: {}", dir.display(), e);
            return None;
        }
        Some(Self {
            dir: dir.to_path_buf(),
            writers: Mutex::new(HashMap::new()),
        })
    }

    /// Path of the journal file for a run.
    pub fn path_for(&self, run_id: &RunId) -> PathBuf {
        self.dir.join(format!("{}.events.jsonl", run_id))
    }

    fn line(event: &RunEvent) -> Option<String> {
        let mut record = serde_json::to_value(event).ok()?;
        if let serde_json::Value::Object(map) = &mut record {
            map.insert(
                "timestamp".to_string(),
                serde_json::Value::String(
                    event
                        .at
                        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                ),
            );
        }
        serde_json::to_string(&record).ok()
    }
}

impl EventJournal for JsonlEventJournal {
    fn record(&self, event: &RunEvent) {
        let Some(line) = Self::line(event) else {
            return;
        };
        let Ok(mut writers) = self.writers.lock() else {
            return;
        };

        if !writers.contains_key(&event.run_id) {
            let path = self.path_for(&event.run_id);
            match OpenOptions::new().create(true).append(true).open(&path) {
                Ok(file) => {
                    writers.insert(event.run_id, BufWriter::new(file));
                }
                Err(e) => {
                    warn!("Could not open event journal {}: {}", path.display(), e);
                    return;
                }
            }
        }

        if let Some(writer) = writers.get_mut(&event.run_id) {
            let _ = writeln!(writer, "{}", line);
            let _ = writer.flush();
        }
        if event.kind.is_terminal() {
            writers.remove(&event.run_id);
        }
    }
}

impl Drop for JsonlEventJournal {
    fn drop(&mut self) {
        if let Ok(mut writers) = self.writers.lock() {
            for writer in writers.values_mut() {
                let _ = writer.flush();
            }
        }
    }
}
