//! Core domain concepts shared across all subdomains.
//!
//! - [`ids`]: run and agent identifiers
//! - [`question::Question`]: a validated, sanitized design question
//! - [`sanitize`]: prompt-injection screening for human-supplied text
//! - [`error::DomainError`]: domain-level errors

pub mod error;
pub mod ids;
pub mod question;
pub mod sanitize;
