//! Prompt domain
//!
//! Templates that turn an [`AgentRequest`](crate::deliberation::request::AgentRequest)
//! into the system and user prompts sent to a language model.

mod template;

pub use template::PromptTemplate;
