//! Single-writer leases for runs within one process.

use council_domain::RunId;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Registry of runs currently being executed.
///
/// Only one [`RunLease`] per run can exist at a time. Cross-process writers
/// are caught separately by the store's revision check.
#[derive(Debug, Clone, Default)]
pub struct RunLeases {
    held: Arc<Mutex<HashSet<RunId>>>,
}

impl RunLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lease for `run_id`, or `None` if someone else holds it.
    pub fn try_acquire(&self, run_id: RunId) -> Option<RunLease> {
        let mut held = match self.held.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !held.insert(run_id) {
            return None;
        }
        debug!(%run_id, "Lease acquired");
        Some(RunLease {
            run_id,
            held: Arc::clone(&self.held),
        })
    }

    pub fn is_held(&self, run_id: &RunId) -> bool {
        match self.held.lock() {
            Ok(held) => held.contains(run_id),
            Err(poisoned) => poisoned.into_inner().contains(run_id),
        }
    }
}

/// Exclusive right to write a run. Released on drop.
#[derive(Debug)]
pub struct RunLease {
    run_id: RunId,
    held: Arc<Mutex<HashSet<RunId>>>,
}

impl RunLease {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }
}

impl Drop for RunLease {
    fn drop(&mut self) {
        let mut held = match self.held.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        held.remove(&self.run_id);
        debug!(run_id = %self.run_id, "Lease released");
    }
}
