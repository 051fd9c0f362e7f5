//! Run Store port
//!
//! Durable home of every run: the snapshot plus the full event log, written
//! as one record. Saves are compare-and-swap on the record revision so two
//! writers can never interleave.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use council_domain::{Run, RunEvent, RunId, RunStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// Errors that can occur in a run store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Run {run_id} was modified concurrently (expected revision {expected}, found {actual})")]
    Conflict {
        run_id: RunId,
        expected: u64,
        actual: u64,
    },

    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Everything persisted for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run: Run,
    pub events: Vec<RunEvent>,
}

impl RunRecord {
    /// Revision used for compare-and-swap: the number of events.
    pub fn revision(&self) -> u64 {
        self.events.len() as u64
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            id: self.run.id,
            question: self.run.question.content().to_string(),
            status: self.run.status,
            rounds: self.run.rounds.len(),
            created_at: self.run.created_at,
            updated_at: self.run.updated_at,
        }
    }
}

/// Listing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: RunId,
    pub question: String,
    pub status: RunStatus,
    pub rounds: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persistent storage for runs.
///
/// Guarantees:
/// - `save` succeeds only if the stored revision equals `expected_revision`
///   (0 means the run must not exist yet), otherwise `StoreError::Conflict`.
/// - `load` returns exactly what the last successful `save` wrote.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn load(&self, id: &RunId) -> StoreResult<Option<RunRecord>>;

    async fn save(&self, record: &RunRecord, expected_revision: u64) -> StoreResult<()>;

    /// All runs, most recently updated first.
    async fn list(&self) -> StoreResult<Vec<RunSummary>>;

    /// Returns whether a run was removed.
    async fn delete(&self, id: &RunId) -> StoreResult<bool>;
}

// ---------------------------------------------------------------------------
// InMemoryRunStore
// ---------------------------------------------------------------------------

/// Run store backed by a `HashMap`. Nothing survives the process.
#[derive(Debug, Default)]
pub struct InMemoryRunStore {
    runs: Mutex<HashMap<RunId, RunRecord>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> StoreResult<std::sync::MutexGuard<'_, HashMap<RunId, RunRecord>>> {
        self.runs
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn load(&self, id: &RunId) -> StoreResult<Option<RunRecord>> {
        Ok(self.locked()?.get(id).cloned())
    }

    async fn save(&self, record: &RunRecord, expected_revision: u64) -> StoreResult<()> {
        let mut runs = self.locked()?;
        let actual = runs.get(&record.run.id).map(|r| r.revision()).unwrap_or(0);
        if actual != expected_revision {
            return Err(StoreError::Conflict {
                run_id: record.run.id,
                expected: expected_revision,
                actual,
            });
        }
        runs.insert(record.run.id, record.clone());
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<RunSummary>> {
        let mut summaries: Vec<RunSummary> =
            self.locked()?.values().map(RunRecord::summary).collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    async fn delete(&self, id: &RunId) -> StoreResult<bool> {
        Ok(self.locked()?.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use council_domain::{EventKind, Question};

    fn record() -> RunRecord {
        let event = Run::creation_event(
            RunId::new(),
            Question::parse("Should we adopt gRPC internally?").unwrap(),
            None,
            3,
            Utc.with_ymd_and_hms(2026, 4, 4, 4, 4, 4).unwrap(),
        );
        RunRecord {
            run: Run::genesis(&event).unwrap(),
            events: vec![event],
        }
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = InMemoryRunStore::new();
        let rec = record();
        store.save(&rec, 0).await.unwrap();
        assert_eq!(store.load(&rec.run.id).await.unwrap(), Some(rec));
    }

    #[tokio::test]
    async fn test_stale_revision_conflicts() {
        let store = InMemoryRunStore::new();
        let mut rec = record();
        store.save(&rec, 0).await.unwrap();

        let event = rec.run.next_event(EventKind::RunCancelled, rec.run.created_at);
        rec.run.apply(&event).unwrap();
        rec.events.push(event);

        store.save(&rec, 1).await.unwrap();
        let err = store.save(&rec, 1).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_create_twice_conflicts() {
        let store = InMemoryRunStore::new();
        let rec = record();
        store.save(&rec, 0).await.unwrap();
        assert!(store.save(&rec, 0).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let store = InMemoryRunStore::new();
        let rec = record();
        store.save(&rec, 0).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
        assert!(store.delete(&rec.run.id).await.unwrap());
        assert!(!store.delete(&rec.run.id).await.unwrap());
        assert!(store.load(&rec.run.id).await.unwrap().is_none());
    }
}
