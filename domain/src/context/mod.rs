//! Background supplied with a question.
//!
//! [`SystemContext`] describes the environment the decision has to fit into.
//! It is fixed when the run starts and rendered into every agent request.

pub mod system;

pub use system::{
    Constraint, ConstraintSeverity, ExistingSystem, PerformanceSla, SystemContext, TeamInfo,
};
