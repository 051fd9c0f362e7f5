//! Domain error types

use thiserror::Error;

use crate::deliberation::phase::RunStatus;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid question: {0}")]
    InvalidQuestion(String),

    #[error("Invalid run id: {0}")]
    InvalidRunId(String),

    #[error("Event out of order: expected sequence {expected}, got {actual}")]
    OutOfOrderEvent { expected: u64, actual: u64 },

    #[error("Event belongs to run {actual}, not {expected}")]
    ForeignEvent { expected: String, actual: String },

    #[error("Run has not been created yet")]
    NotCreated,

    #[error("Run is {0} and cannot accept further events")]
    Terminal(RunStatus),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Round {0} has no audit decision")]
    MissingAudit(u32),
}

impl DomainError {
    /// Check if this error was raised because the run already finished
    pub fn is_terminal(&self) -> bool {
        matches!(self, DomainError::Terminal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_order_display() {
        let error = DomainError::OutOfOrderEvent {
            expected: 3,
            actual: 5,
        };
        assert_eq!(
            error.to_string(),
            "Event out of order: expected sequence 3, got 5"
        );
    }

    #[test]
    fn test_is_terminal_check() {
        assert!(DomainError::Terminal(RunStatus::Converged).is_terminal());
        assert!(!DomainError::NotCreated.is_terminal());
        assert!(!DomainError::InvalidQuestion("x".to_string()).is_terminal());
    }
}
