//! Agent gateway adapters.

mod circuit_breaker;
mod extract;
mod openai;

pub use circuit_breaker::{CircuitBreakerGateway, CircuitState};
pub use extract::extract_json;
pub use openai::{AgentModel, OpenAiCompatibleGateway};
