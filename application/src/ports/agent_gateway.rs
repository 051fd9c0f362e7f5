//! Agent Gateway port
//!
//! Defines how the engine reaches a council member. Whatever sits behind it
//! (an LLM provider, a scripted stub, a human) returns raw JSON; validation
//! is the engine's job.

use async_trait::async_trait;
use council_domain::AgentRequest;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while invoking an agent
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Response is not JSON: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Other error: {0}")]
    Other(String),
}

/// Gateway to council members
///
/// Implementations (adapters) live in the infrastructure layer. A call may
/// take arbitrarily long; the engine bounds it with its own timeout.
#[async_trait]
pub trait AgentGateway: Send + Sync {
    /// Ask `request.agent` to perform `request.phase()` and return its raw reply.
    async fn invoke(&self, request: &AgentRequest) -> Result<Value, GatewayError>;
}
