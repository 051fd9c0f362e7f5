//! Validation errors with enough detail to ask an agent for a correction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::deliberation::phase::Phase;

/// What exactly is wrong at a given path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    NotAnObject,
    Missing,
    WrongType { expected: String },
    Empty,
    InvalidValue { allowed: Vec<String> },
    OutOfRange { min: f64, max: f64 },
    UnknownTarget { target: String },
    DuplicateTarget { target: String },
    MissingTarget { target: String },
    NotAnAgentPhase,
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationKind::NotAnObject => write!(f, "expected a JSON object"),
            ViolationKind::Missing => write!(f, "required field is missing"),
            ViolationKind::WrongType { expected } => write!(f, "expected {}", expected),
            ViolationKind::Empty => write!(f, "must not be empty"),
            ViolationKind::InvalidValue { allowed } => {
                write!(f, "must be one of: {}", allowed.join(", "))
            }
            ViolationKind::OutOfRange { min, max } => {
                write!(f, "must be between {} and {}", min, max)
            }
            ViolationKind::UnknownTarget { target } => {
                write!(f, "'{}' is not one of the provided items", target)
            }
            ViolationKind::DuplicateTarget { target } => {
                write!(f, "'{}' appears more than once", target)
            }
            ViolationKind::MissingTarget { target } => {
                write!(f, "no entry for '{}'", target)
            }
            ViolationKind::NotAnAgentPhase => write!(f, "phase takes no agent output"),
        }
    }
}

/// A phase output did not match its schema.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{phase} output invalid at `{path}`: {kind}")]
pub struct ValidationError {
    pub phase: Phase,
    /// JSON path of the offending value, e.g. `critiques[1].agreement`.
    pub path: String,
    pub kind: ViolationKind,
}

impl ValidationError {
    pub fn new(phase: Phase, path: impl Into<String>, kind: ViolationKind) -> Self {
        Self {
            phase,
            path: path.into(),
            kind,
        }
    }

    /// Instruction sent back to the agent in a corrective request.
    pub fn correction_hint(&self) -> String {
        let at = if self.path.is_empty() {
            "the top level".to_string()
        } else {
            format!("`{}`", self.path)
        };
        format!(
            "Your previous response was rejected: the value at {} {}. \
             Reply again with a single JSON object that follows the required format.",
            at, self.kind
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_phase_and_path() {
        let err = ValidationError::new(
            Phase::Critique,
            "critiques[1].agreement",
            ViolationKind::OutOfRange { min: 0.0, max: 1.0 },
        );
        assert_eq!(
            err.to_string(),
            "critique output invalid at `critiques[1].agreement`: must be between 0 and 1"
        );
    }

    #[test]
    fn test_correction_hint_for_root() {
        let err = ValidationError::new(Phase::Audit, "", ViolationKind::NotAnObject);
        assert!(err.correction_hint().contains("the top level expected a JSON object"));
    }
}
