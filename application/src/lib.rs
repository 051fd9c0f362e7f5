//! Application layer for adr-council
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod events;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::{AgentProfile, ConfigError, EngineConfig, RetryPolicy};
pub use events::{EventBus, EventBusError, EventSubscription, SharedEventBus};
pub use ports::{
    agent_gateway::{AgentGateway, GatewayError},
    clock::{Clock, FixedClock, SystemClock},
    event_journal::{EventJournal, NoEventJournal},
    run_store::{InMemoryRunStore, RunRecord, RunStore, RunSummary, StoreError, StoreResult},
};
pub use use_cases::deliberation::{DeliberationEngine, EngineError};
pub use use_cases::lease::{RunLease, RunLeases};
pub use use_cases::session::{FailureReport, SessionError, SessionManager};
