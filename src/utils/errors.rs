//! Error types for the polyhedral front end.
//!
//! Every precondition failure in the entity model or the transformation
//! pipeline surfaces as one of the variants of [`Error`]. Failures inside
//! the set/map algebra are grouped under [`AlgebraError`]. No error is
//! recovered internally: the user-facing call fails and the function is
//! left in its pre-call state.

use thiserror::Error;

/// Top-level error type for the front end.
#[derive(Error, Debug)]
pub enum Error {
    /// A structurally invalid argument: empty name, malformed text,
    /// non-positive dimension size, out-of-range tile size, and so on.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Two spaces that must agree on dimensionality do not, or a
    /// transformation addresses a dimension that does not exist.
    #[error("dimensionality mismatch: {0}")]
    DimensionalityMismatch(String),

    /// An operation was invoked in the wrong lifecycle phase, e.g. a
    /// schedule transformation on a frozen function.
    #[error("phase violation: {0}")]
    PhaseViolation(String),

    /// A schedulable computation reached lowering without an access
    /// relation.
    #[error("computation `{0}` has no access relation; bind it to a buffer or enable auto data mapping")]
    UnboundComputation(String),

    /// The set/map algebra reported a failure.
    #[error(transparent)]
    Algebra(#[from] AlgebraError),
}

/// Error raised by the integer-set/affine-map algebra.
#[derive(Error, Debug)]
pub enum AlgebraError {
    /// Set or map text that does not follow the ISL syntax.
    #[error("malformed text at offset {offset}: {message}")]
    MalformedText {
        /// What went wrong.
        message: String,
        /// Byte offset into the input text.
        offset: usize,
    },

    /// A set is empty where a non-empty set is required.
    #[error("set `{0}` is empty where a non-empty set is required")]
    EmptySet(String),

    /// A constraint system became unsatisfiable during a rewrite.
    #[error("unsatisfiable constraint system: {0}")]
    Unsatisfiable(String),

    /// A dimension could not be expressed as an affine function of the
    /// opposite side of a relation.
    #[error("dimension `{0}` cannot be solved from the relation's equalities")]
    NotInvertible(String),

    /// A loop dimension has no finite upper or lower bound.
    #[error("dimension `{0}` has no finite bound")]
    Unbounded(String),
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnboundComputation("S0".to_string());
        assert!(err.to_string().contains("S0"));

        let err = Error::from(AlgebraError::MalformedText {
            message: "expected `]`".to_string(),
            offset: 12,
        });
        assert!(err.to_string().contains("offset 12"));
    }
}
