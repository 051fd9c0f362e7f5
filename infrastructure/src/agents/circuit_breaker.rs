//! Circuit breaker around an agent gateway
//!
//! Consecutive transport failures open the breaker; while open every call
//! fails fast with [`GatewayError::Unavailable`]. After the reset timeout a
//! single trial call is let through. Its success closes the breaker and its
//! failure opens it again.

use async_trait::async_trait;
use council_application::{AgentGateway, GatewayError};
use council_domain::AgentRequest;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Success,
    Failure,
    /// The call never reached the provider or says nothing about its health.
    Neutral,
}

impl Outcome {
    fn of(result: &Result<Value, GatewayError>) -> Self {
        match result {
            // The provider answered, even if the reply was unusable.
            Ok(_) | Err(GatewayError::InvalidResponse(_)) => Outcome::Success,
            Err(
                GatewayError::ConnectionError(_)
                | GatewayError::RequestFailed(_)
                | GatewayError::Timeout,
            ) => Outcome::Failure,
            Err(_) => Outcome::Neutral,
        }
    }
}

#[derive(Debug)]
struct Breaker {
    state: CircuitState,
    failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Wraps any [`AgentGateway`] with a shared circuit breaker
pub struct CircuitBreakerGateway {
    inner: Arc<dyn AgentGateway>,
    failure_threshold: u32,
    reset_timeout: Duration,
    breaker: Mutex<Breaker>,
}

impl CircuitBreakerGateway {
    pub fn new(inner: Arc<dyn AgentGateway>, failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            inner,
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            breaker: Mutex::new(Breaker {
                state: CircuitState::Closed,
                failures: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    fn lock(&self) -> MutexGuard<'_, Breaker> {
        // Breaker state stays consistent even if a holder panicked.
        self.breaker.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn admit(&self) -> Result<(), GatewayError> {
        let mut breaker = self.lock();
        match breaker.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let elapsed = breaker
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(self.reset_timeout);
                if elapsed < self.reset_timeout {
                    let remaining = self.reset_timeout - elapsed;
                    return Err(GatewayError::Unavailable(format!(
                        "circuit open after {} failures, retry in {}ms",
                        breaker.failures,
                        remaining.as_millis()
                    )));
                }
                info!("Circuit breaker half-open, sending trial call");
                breaker.state = CircuitState::HalfOpen;
                breaker.trial_in_flight = true;
                Ok(())
            }
            CircuitState::HalfOpen if !breaker.trial_in_flight => {
                breaker.trial_in_flight = true;
                Ok(())
            }
            CircuitState::HalfOpen => Err(GatewayError::Unavailable(
                "circuit half-open, trial call in flight".to_string(),
            )),
        }
    }

    fn record(&self, outcome: Outcome) {
        let mut breaker = self.lock();
        breaker.trial_in_flight = false;
        match outcome {
            Outcome::Success => {
                if breaker.state != CircuitState::Closed {
                    info!("Circuit breaker closed");
                }
                breaker.state = CircuitState::Closed;
                breaker.failures = 0;
                breaker.opened_at = None;
            }
            Outcome::Failure => {
                breaker.failures += 1;
                if breaker.state == CircuitState::HalfOpen
                    || breaker.failures >= self.failure_threshold
                {
                    if breaker.state != CircuitState::Open {
                        warn!(failures = breaker.failures, "Circuit breaker open");
                    }
                    breaker.state = CircuitState::Open;
                    breaker.opened_at = Some(Instant::now());
                }
            }
            Outcome::Neutral => {}
        }
    }
}

/// Records a failure if the call is dropped before it finishes.
struct Attempt<'a> {
    gateway: &'a CircuitBreakerGateway,
    settled: bool,
}

impl Attempt<'_> {
    fn settle(mut self, outcome: Outcome) {
        self.settled = true;
        self.gateway.record(outcome);
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.gateway.record(Outcome::Failure);
        }
    }
}

#[async_trait]
impl AgentGateway for CircuitBreakerGateway {
    async fn invoke(&self, request: &AgentRequest) -> Result<Value, GatewayError> {
        self.admit()?;
        let attempt = Attempt {
            gateway: self,
            settled: false,
        };
        let result = self.inner.invoke(request).await;
        attempt.settle(Outcome::of(&result));
        result
    }
}
