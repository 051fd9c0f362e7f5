//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod deliberation;
pub mod lease;
pub mod session;
