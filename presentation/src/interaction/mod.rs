//! Human-in-the-loop prompts

pub mod clarification;

pub use clarification::{ClarificationResponder, StdinClarification};
