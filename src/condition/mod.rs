//! Step conditions.
//!
//! A [`Condition`] is parsed once when the job is loaded and evaluated by a
//! [`ConditionEvaluator`] each time the runner needs a decision.

pub mod evaluator;
pub mod expression;

use thiserror::Error;

pub use evaluator::{ConditionEvaluator, StatusEvaluator};
pub use expression::{Condition, Expr};

/// Failure to parse or evaluate a condition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConditionError {
    #[error("Unable to parse condition '{expression}': {message}")]
    Parse { expression: String, message: String },

    #[error("Unable to evaluate condition '{expression}': {message}")]
    Evaluation { expression: String, message: String },
}

/// Parse a condition expression.
pub fn parse(source: &str) -> Result<Condition, ConditionError> {
    Condition::parse(source)
}
