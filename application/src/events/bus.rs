//! Event bus for run events
//!
//! Each run has its own append-only log and broadcast channel. Publishing is
//! idempotent per sequence number, so re-publishing persisted events after a
//! restart is harmless. Subscribers can join at any sequence number and get
//! the backlog followed by live events, in order and without duplicates.
//!
//! A run's log is dropped once its terminal event is older than the
//! retention window. The run store stays the source of truth; replaying the
//! durable log with [`EventBus::catch_up`] brings it back.

use council_domain::{RunEvent, RunId};
use futures::{Stream, stream};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Channel capacity for broadcast
const CHANNEL_CAPACITY: usize = 256;

/// How long a finished run stays in memory
const DEFAULT_RETENTION: Duration = Duration::from_secs(600);

/// Error type for event bus operations
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Run {run_id}: expected sequence {expected}, got {actual}")]
    SequenceGap {
        run_id: RunId,
        expected: u64,
        actual: u64,
    },

    #[error("Event bus lock poisoned")]
    Poisoned,
}

/// Result type for event bus operations
pub type EventBusResult<T> = Result<T, EventBusError>;

/// Shared reference to EventBus
pub type SharedEventBus = Arc<EventBus>;

struct RunChannel {
    log: Arc<Mutex<Vec<RunEvent>>>,
    sender: broadcast::Sender<RunEvent>,
    finished_at: Option<Instant>,
}

impl RunChannel {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            sender,
            finished_at: None,
        }
    }
}

/// Per-run ordered event log with live fan-out
pub struct EventBus {
    runs: Mutex<HashMap<RunId, RunChannel>>,
    retention: Duration,
}

impl Default for EventBus {
    fn default() -> Self {
        Self {
            runs: Mutex::new(HashMap::new()),
            retention: DEFAULT_RETENTION,
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep finished runs for `retention` after their terminal event.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Create a shared reference to this event bus
    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    fn runs(&self) -> EventBusResult<MutexGuard<'_, HashMap<RunId, RunChannel>>> {
        self.runs.lock().map_err(|_| EventBusError::Poisoned)
    }

    fn evict_finished(&self, runs: &mut HashMap<RunId, RunChannel>) {
        let retention = self.retention;
        runs.retain(|run_id, channel| {
            let keep = channel
                .finished_at
                .is_none_or(|at| at.elapsed() < retention);
            if !keep {
                debug!(%run_id, "Finished run evicted from event bus");
            }
            keep
        });
    }

    /// Publish an event.
    ///
    /// Returns `false` when the sequence number was already published.
    /// A sequence number beyond the next expected one is an error: events
    /// must reach the bus in order.
    pub fn publish(&self, event: RunEvent) -> EventBusResult<bool> {
        let mut runs = self.runs()?;
        self.evict_finished(&mut runs);
        let channel = runs.entry(event.run_id).or_insert_with(RunChannel::new);
        let mut log = channel.log.lock().map_err(|_| EventBusError::Poisoned)?;

        let expected = log.len() as u64;
        if event.sequence < expected {
            debug!(run_id = %event.run_id, sequence = event.sequence, "Duplicate event ignored");
            return Ok(false);
        }
        if event.sequence > expected {
            warn!(run_id = %event.run_id, expected, actual = event.sequence, "Event sequence gap");
            return Err(EventBusError::SequenceGap {
                run_id: event.run_id,
                expected,
                actual: event.sequence,
            });
        }

        if event.kind.is_terminal() {
            channel.finished_at = Some(Instant::now());
        }
        log.push(event.clone());
        let event_type = event.kind.name();
        let sequence = event.sequence;
        // No receivers is fine: the log keeps the event for late subscribers.
        match channel.sender.send(event) {
            Ok(count) => debug!(event_type, sequence, receivers = count, "Event published"),
            Err(_) => debug!(event_type, sequence, "Event published (no receivers)"),
        }
        Ok(true)
    }

    /// Publish every event the bus has not seen yet.
    ///
    /// Used after a restart with the persisted log of a run.
    pub fn catch_up(&self, events: &[RunEvent]) -> EventBusResult<usize> {
        let mut published = 0;
        for event in events {
            if self.publish(event.clone())? {
                published += 1;
            }
        }
        Ok(published)
    }

    /// Events of a run from `from` onward.
    pub fn history(&self, run_id: &RunId, from: u64) -> EventBusResult<Vec<RunEvent>> {
        let runs = self.runs()?;
        let Some(channel) = runs.get(run_id) else {
            return Ok(Vec::new());
        };
        let log = channel.log.lock().map_err(|_| EventBusError::Poisoned)?;
        Ok(log.iter().skip(from as usize).cloned().collect())
    }

    /// Highest published sequence number for a run, if any.
    pub fn last_sequence(&self, run_id: &RunId) -> EventBusResult<Option<u64>> {
        Ok(self
            .history(run_id, 0)?
            .last()
            .map(|event| event.sequence))
    }

    /// Subscribe to a run starting at sequence `from`.
    pub fn subscribe(&self, run_id: RunId, from: u64) -> EventBusResult<EventSubscription> {
        let mut runs = self.runs()?;
        self.evict_finished(&mut runs);
        let channel = runs.entry(run_id).or_insert_with(RunChannel::new);
        // Holding the log lock while subscribing means no event can slip
        // between the backlog snapshot and the live receiver.
        let log = channel.log.lock().map_err(|_| EventBusError::Poisoned)?;
        let backlog: VecDeque<RunEvent> = log.iter().skip(from as usize).cloned().collect();
        let receiver = channel.sender.subscribe();
        drop(log);

        Ok(EventSubscription {
            run_id,
            next: from,
            backlog,
            receiver,
            log: Arc::clone(&channel.log),
            finished: false,
        })
    }

    /// Get the number of live subscribers of a run
    pub fn subscriber_count(&self, run_id: &RunId) -> usize {
        self.runs()
            .ok()
            .and_then(|runs| runs.get(run_id).map(|c| c.sender.receiver_count()))
            .unwrap_or(0)
    }

    /// Number of runs currently held in memory
    pub fn run_count(&self) -> usize {
        self.runs().map(|runs| runs.len()).unwrap_or(0)
    }

    /// Drop a run's log and channel. Open subscriptions end.
    pub fn forget(&self, run_id: &RunId) {
        if let Ok(mut runs) = self.runs() {
            runs.remove(run_id);
        }
    }
}

/// Ordered view of one run's events.
///
/// Ends after delivering a terminal event, or when the run is forgotten.
pub struct EventSubscription {
    run_id: RunId,
    next: u64,
    backlog: VecDeque<RunEvent>,
    receiver: broadcast::Receiver<RunEvent>,
    log: Arc<Mutex<Vec<RunEvent>>>,
    finished: bool,
}

impl EventSubscription {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Sequence number of the next event this subscription will yield.
    pub fn next_sequence(&self) -> u64 {
        self.next
    }

    /// Next event, or `None` once the run has finished.
    pub async fn recv(&mut self) -> Option<RunEvent> {
        loop {
            if self.finished {
                return None;
            }
            if let Some(event) = self.backlog.pop_front() {
                if event.sequence < self.next {
                    continue;
                }
                return Some(self.deliver(event));
            }
            match self.receiver.recv().await {
                Ok(event) if event.sequence < self.next => continue,
                Ok(event) if event.sequence == self.next => return Some(self.deliver(event)),
                Ok(_) => self.refill(),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(run_id = %self.run_id, skipped, "Subscriber lagged, refilling from log");
                    self.refill();
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.finished = true;
                    return None;
                }
            }
        }
    }

    /// Adapt into a stream that ends with the run.
    pub fn into_stream(self) -> impl Stream<Item = RunEvent> + Send {
        stream::unfold(self, |mut subscription| async move {
            subscription.recv().await.map(|event| (event, subscription))
        })
    }

    /// Events already available, without waiting.
    pub fn drain_ready(&mut self) -> Vec<RunEvent> {
        self.refill();
        let mut ready = Vec::new();
        while let Some(event) = self.backlog.pop_front() {
            if event.sequence < self.next {
                continue;
            }
            let terminal = event.kind.is_terminal();
            ready.push(self.deliver(event));
            if terminal {
                break;
            }
        }
        ready
    }

    fn deliver(&mut self, event: RunEvent) -> RunEvent {
        self.next = event.sequence + 1;
        if event.kind.is_terminal() {
            self.finished = true;
        }
        event
    }

    fn refill(&mut self) {
        if let Ok(log) = self.log.lock() {
            let start = self.next as usize;
            self.backlog = log.iter().skip(start).cloned().collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use council_domain::{EventKind, Phase};

    fn event(run_id: RunId, sequence: u64) -> RunEvent {
        RunEvent {
            run_id,
            sequence,
            at: Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap(),
            kind: EventKind::PhaseStarted {
                phase: Phase::Ideation,
                round: 0,
            },
        }
    }

    fn terminal(run_id: RunId, sequence: u64) -> RunEvent {
        RunEvent {
            kind: EventKind::RunCancelled,
            ..event(run_id, sequence)
        }
    }

    #[test]
    fn test_publish_is_idempotent() {
        let bus = EventBus::new();
        let id = RunId::new();
        assert!(bus.publish(event(id, 0)).unwrap());
        assert!(!bus.publish(event(id, 0)).unwrap());
        assert_eq!(bus.history(&id, 0).unwrap().len(), 1);
    }

    #[test]
    fn test_gap_is_rejected() {
        let bus = EventBus::new();
        let id = RunId::new();
        bus.publish(event(id, 0)).unwrap();
        assert!(matches!(
            bus.publish(event(id, 2)),
            Err(EventBusError::SequenceGap {
                expected: 1,
                actual: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_catch_up_skips_known_events() {
        let bus = EventBus::new();
        let id = RunId::new();
        bus.publish(event(id, 0)).unwrap();
        let log = vec![event(id, 0), event(id, 1), event(id, 2)];
        assert_eq!(bus.catch_up(&log).unwrap(), 2);
        assert_eq!(bus.last_sequence(&id).unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_subscribe_mid_stream_gets_backlog_then_live() {
        let bus = EventBus::new();
        let id = RunId::new();
        for seq in 0..3 {
            bus.publish(event(id, seq)).unwrap();
        }
        let mut sub = bus.subscribe(id, 1).unwrap();
        bus.publish(event(id, 3)).unwrap();
        bus.publish(terminal(id, 4)).unwrap();

        let mut seen = Vec::new();
        while let Some(e) = sub.recv().await {
            seen.push(e.sequence);
        }
        assert_eq!(seen, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_stream_ends_with_the_run() {
        use futures::StreamExt;

        let bus = EventBus::new();
        let id = RunId::new();
        bus.publish(event(id, 0)).unwrap();
        bus.publish(terminal(id, 1)).unwrap();
        let sequences: Vec<u64> = bus
            .subscribe(id, 0)
            .unwrap()
            .into_stream()
            .map(|e| e.sequence)
            .collect()
            .await;
        assert_eq!(sequences, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_runs_are_isolated() {
        let bus = EventBus::new();
        let a = RunId::new();
        let b = RunId::new();
        bus.publish(event(a, 0)).unwrap();
        bus.publish(terminal(b, 0)).unwrap();
        let mut sub = bus.subscribe(b, 0).unwrap();
        assert_eq!(sub.recv().await.map(|e| e.run_id), Some(b));
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber_recovers_from_log() {
        let bus = EventBus::new();
        let id = RunId::new();
        let mut sub = bus.subscribe(id, 0).unwrap();
        let total = CHANNEL_CAPACITY as u64 + 10;
        for seq in 0..total {
            bus.publish(event(id, seq)).unwrap();
        }
        bus.publish(terminal(id, total)).unwrap();

        let mut count = 0;
        let mut last = None;
        while let Some(e) = sub.recv().await {
            if let Some(prev) = last {
                assert_eq!(e.sequence, prev + 1);
            }
            last = Some(e.sequence);
            count += 1;
        }
        assert_eq!(count, total + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_runs_are_evicted_after_retention() {
        let bus = EventBus::new().with_retention(Duration::from_secs(60));
        let done = RunId::new();
        let live = RunId::new();
        bus.publish(event(done, 0)).unwrap();
        bus.publish(terminal(done, 1)).unwrap();
        bus.publish(event(live, 0)).unwrap();

        tokio::time::advance(Duration::from_secs(30)).await;
        bus.publish(event(live, 1)).unwrap();
        assert_eq!(bus.history(&done, 0).unwrap().len(), 2);

        tokio::time::advance(Duration::from_secs(31)).await;
        bus.publish(event(live, 2)).unwrap();
        assert!(bus.history(&done, 0).unwrap().is_empty());
        assert_eq!(bus.history(&live, 0).unwrap().len(), 3);
        assert_eq!(bus.run_count(), 1);

        // Unfinished runs are never evicted.
        tokio::time::advance(Duration::from_secs(3600)).await;
        bus.subscribe(RunId::new(), 0).unwrap();
        assert_eq!(bus.history(&live, 0).unwrap().len(), 3);

        assert_eq!(bus.catch_up(&[event(done, 0), terminal(done, 1)]).unwrap(), 2);
        assert_eq!(bus.last_sequence(&done).unwrap(), Some(1));
    }

    #[test]
    fn test_drain_ready_stops_at_terminal() {
        let bus = EventBus::new();
        let id = RunId::new();
        bus.publish(event(id, 0)).unwrap();
        bus.publish(terminal(id, 1)).unwrap();
        let mut sub = bus.subscribe(id, 0).unwrap();
        let ready = sub.drain_ready();
        assert_eq!(ready.len(), 2);
        assert!(sub.drain_ready().is_empty());
    }
}
