//! File-backed run store
//!
//! One JSON document per run (`<dir>/<run_id>.json`) holding the snapshot
//! and the full event log. Writes go to a temporary file that is renamed
//! into place, so readers never observe a partial record. A lock file per
//! run serializes the compare-and-swap across processes.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use council_application::{RunRecord, RunStore, RunSummary, StoreError, StoreResult};
use council_domain::RunId;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, info, warn};

/// A lock file older than this belongs to a crashed writer.
const STALE_LOCK_AFTER: Duration = Duration::from_secs(30);

/// Run store keeping each run in its own JSON file
#[derive(Debug, Clone)]
pub struct FileRunStore {
    dir: PathBuf,
}

impl FileRunStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::Io(format!("{}: {}", dir.display(), e)))?;
        Ok(Self { dir })
    }

    /// Default location: `$XDG_DATA_HOME/adr-council/runs`.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("adr-council").join("runs"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &RunId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn lock_path(&self, id: &RunId) -> PathBuf {
        self.dir.join(format!("{}.lock", id))
    }

    async fn read(path: &Path) -> StoreResult<Option<RunRecord>> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(format!("{}: {}", path.display(), e))),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Serialization(format!("{}: {}", path.display(), e)))
    }

    async fn acquire_lock(&self, id: &RunId) -> StoreResult<PathBuf> {
        let path = self.lock_path(id);
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(_) => Ok(path),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if Self::is_stale(&path).await {
                    warn!(run_id = %id, "Removing stale lock file");
                    let _ = fs::remove_file(&path).await;
                }
                Err(StoreError::Unavailable(format!("run {} is locked", id)))
            }
            Err(e) => Err(StoreError::Io(format!("{}: {}", path.display(), e))),
        }
    }

    async fn is_stale(path: &Path) -> bool {
        let Ok(metadata) = fs::metadata(path).await else {
            return false;
        };
        metadata
            .modified()
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age > STALE_LOCK_AFTER)
    }

    async fn write_atomically(&self, record: &RunRecord) -> StoreResult<()> {
        let path = self.record_path(&record.run.id);
        let tmp = path.with_extension(format!("json.{}.tmp", std::process::id()));
        let bytes = serde_json::to_vec_pretty(record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        fs::write(&tmp, bytes)
            .await
            .map_err(|e| StoreError::Io(format!("{}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::Io(format!("{}: {}", path.display(), e)))
    }

    /// Delete terminal runs not updated within `ttl`.
    ///
    /// Returns the number of runs removed. Runs still in progress or
    /// awaiting clarification are kept regardless of age.
    pub async fn cleanup(&self, ttl: Duration) -> StoreResult<usize> {
        let ttl = ChronoDuration::from_std(ttl).map_err(|e| StoreError::Io(e.to_string()))?;
        let cutoff = Utc::now() - ttl;
        let mut removed = 0;
        for summary in self.list().await? {
            if summary.status.is_terminal()
                && summary.updated_at < cutoff
                && self.delete(&summary.id).await?
            {
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "Cleaned up expired runs");
        }
        Ok(removed)
    }
}

#[async_trait]
impl RunStore for FileRunStore {
    async fn load(&self, id: &RunId) -> StoreResult<Option<RunRecord>> {
        Self::read(&self.record_path(id)).await
    }

    async fn save(&self, record: &RunRecord, expected_revision: u64) -> StoreResult<()> {
        let id = record.run.id;
        let lock = self.acquire_lock(&id).await?;

        let result = async {
            let actual = Self::read(&self.record_path(&id))
                .await?
                .map(|r| r.revision())
                .unwrap_or(0);
            if actual != expected_revision {
                return Err(StoreError::Conflict {
                    run_id: id,
                    expected: expected_revision,
                    actual,
                });
            }
            self.write_atomically(record).await
        }
        .await;

        if let Err(e) = fs::remove_file(&lock).await {
            warn!(run_id = %id, "Could not release lock file: {}", e);
        }
        if result.is_ok() {
            debug!(run_id = %id, revision = record.revision(), "Run saved");
        }
        result
    }

    async fn list(&self) -> StoreResult<Vec<RunSummary>> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| StoreError::Io(format!("{}: {}", self.dir.display(), e)))?;
        let mut summaries = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read(&path).await {
                Ok(Some(record)) => summaries.push(record.summary()),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable run file: {}", e),
            }
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    async fn delete(&self, id: &RunId) -> StoreResult<bool> {
        match fs::remove_file(self.record_path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(e.to_string())),
        }
    }
}
