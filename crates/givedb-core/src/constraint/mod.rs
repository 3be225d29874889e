//! Constraint enforcement.
//!
//! This module provides:
//! - Check constraint expression evaluation
//! - The unique index used for uniqueness constraints
//! - Validation of writes against the catalog

mod check_evaluator;
mod unique_index;
mod validator;

pub use check_evaluator::{CheckEvaluator, EvaluationError};
pub use unique_index::UniqueIndex;
pub use validator::ConstraintValidator;
