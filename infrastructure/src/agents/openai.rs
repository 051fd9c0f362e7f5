//! OpenAI-compatible chat completions adapter
//!
//! Works with any endpoint exposing `POST {base_url}/chat/completions`
//! (OpenAI, OpenRouter, Ollama, vLLM, ...). Each council member maps to a
//! model; the phase decides the system prompt.

use async_trait::async_trait;
use council_application::{AgentGateway, GatewayError};
use council_domain::{AgentId, AgentRequest, PromptTemplate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::extract::extract_json;

/// Model used by one council member.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentModel {
    pub agent: AgentId,
    pub model: String,
}

/// Agent gateway backed by an OpenAI-compatible HTTP API
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    temperature: f64,
    models: HashMap<AgentId, String>,
}

impl OpenAiCompatibleGateway {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        models: Vec<AgentModel>,
        request_timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("adr-council/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GatewayError::ConnectionError(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            temperature: 0.3,
            models: models.into_iter().map(|m| (m.agent, m.model)).collect(),
        })
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn body(&self, model: &str, request: &AgentRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: PromptTemplate::system_for(request.phase()).to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: PromptTemplate::user_prompt(request),
                },
            ],
            temperature: Some(self.temperature),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[async_trait]
impl AgentGateway for OpenAiCompatibleGateway {
    async fn invoke(&self, request: &AgentRequest) -> Result<Value, GatewayError> {
        let model = self
            .models
            .get(&request.agent)
            .ok_or_else(|| GatewayError::UnknownAgent(request.agent.to_string()))?;
        debug!(agent = %request.agent, %model, phase = %request.phase(), "Sending chat completion");

        let mut builder = self.client.post(self.endpoint()).json(&self.body(model, request));
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::ConnectionError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GatewayError::RequestFailed(format!("{}: {}", status, detail)));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        extract_json(&content).ok_or_else(|| {
            let preview: String = content.chars().take(120).collect();
            GatewayError::InvalidResponse(format!("no JSON object in reply: {}", preview))
        })
    }
}
