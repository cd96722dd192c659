//! Error types for policy coercion, validation and compilation.

use crate::schema::{Dimension, Operator};

/// Errors raised while reconstructing, validating or compiling policies.
///
/// All of these surface at catalog-load time; an installed policy set never
/// produces them during evaluation.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// A persisted value could not be reconstructed into the expected shape.
    #[error("value shape error: {0}")]
    ValueShape(String),

    /// A dimension id that is not in the rule catalog.
    #[error("unknown dimension '{0}'")]
    UnknownDimension(String),

    /// The operator cannot be applied to this dimension or value.
    #[error("policy {policy_id}: operator '{operator}' is not supported for {dimension} ({reason})")]
    UnsupportedOperator {
        policy_id: String,
        dimension: Dimension,
        operator: Operator,
        reason: String,
    },

    /// One or more policies failed validation.
    #[error("validation failed: {0}")]
    Validation(String),
}

/// Result alias for policy operations.
pub type Result<T> = std::result::Result<T, PolicyError>;
