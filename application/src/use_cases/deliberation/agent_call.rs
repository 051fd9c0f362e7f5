//! One agent call: timeout, retries with backoff, and one corrective retry.

use council_domain::schema::{check_audit_references, check_targets};
use council_domain::{
    AgentFailure, AgentReply, AgentRequest, PhaseOutput, RequestPayload, ValidationError, validate,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::RetryPolicy;
use crate::ports::agent_gateway::AgentGateway;

/// Final result of calling one agent.
#[derive(Debug, Clone)]
pub(crate) struct CallOutcome {
    pub result: Result<AgentReply, AgentFailure>,
    pub attempts: u32,
}

/// Validate a raw reply against everything the request implies.
pub(crate) fn validate_reply(
    request: &AgentRequest,
    raw: &Value,
) -> Result<AgentReply, ValidationError> {
    let reply = validate(request.phase(), raw)?;
    match (&reply, &request.payload) {
        (AgentReply::Output(PhaseOutput::Critique(output)), _) => {
            check_targets(output, &request.expected_targets())?;
        }
        (
            AgentReply::Output(PhaseOutput::Audit(output)),
            RequestPayload::Audit {
                proposals,
                critiques,
            },
        ) => {
            let proposal_ids: Vec<String> = proposals.iter().map(|p| p.id.clone()).collect();
            let critique_ids: Vec<String> = critiques.iter().map(|c| c.id.clone()).collect();
            check_audit_references(output, &proposal_ids, &critique_ids)?;
        }
        _ => {}
    }
    Ok(reply)
}

/// Call an agent until it produces a valid reply or retries run out.
///
/// Timeouts and gateway errors are retried with backoff. The first invalid
/// reply triggers an immediate corrective request carrying the validation
/// detail; any later invalid reply counts as a failed attempt.
pub(crate) async fn call_agent(
    gateway: Arc<dyn AgentGateway>,
    mut request: AgentRequest,
    timeout: Duration,
    retry: RetryPolicy,
) -> CallOutcome {
    let mut attempts = 0;
    let mut retries = 0;
    let mut corrected = false;

    loop {
        attempts += 1;
        let failure = match tokio::time::timeout(timeout, gateway.invoke(&request)).await {
            Err(_) => AgentFailure::Timeout {
                after_ms: timeout.as_millis() as u64,
            },
            Ok(Err(e)) => AgentFailure::Error {
                message: e.to_string(),
            },
            Ok(Ok(raw)) => match validate_reply(&request, &raw) {
                Ok(reply) => {
                    debug!(agent = %request.agent, phase = %request.phase(), attempts, "Agent reply accepted");
                    return CallOutcome {
                        result: Ok(reply),
                        attempts,
                    };
                }
                Err(error) if !corrected => {
                    debug!(agent = %request.agent, %error, "Requesting correction");
                    corrected = true;
                    request = request.with_correction(error.correction_hint());
                    continue;
                }
                Err(error) => AgentFailure::Validation { error },
            },
        };

        if retries >= retry.max_retries {
            warn!(agent = %request.agent, phase = %request.phase(), attempts, "Agent failed: {}", failure);
            return CallOutcome {
                result: Err(failure),
                attempts,
            };
        }
        retries += 1;
        let delay = retry.delay_for(retries);
        debug!(agent = %request.agent, retries, ?delay, "Retrying agent after: {}", failure);
        tokio::time::sleep(delay).await;
    }
}
