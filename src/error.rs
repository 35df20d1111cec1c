//! Error types for the NNFW container core.
//!
//! This module provides a unified error type for all container and algebra
//! operations, using the `thiserror` crate for ergonomic error handling.

use thiserror::Error;

/// Coarse classification of an [`NnfwError`].
///
/// Callers that only care about *what went wrong*, not about the exact
/// operand sizes, match on this instead of on the error variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Index outside `[0, len)`
    OutOfBounds,
    /// Operand sizes don't match an operation's contract
    IncompatibleDimensions,
    /// Resize or rebind attempted on an internal container or a view
    StructuralMutationDenied,
    /// A view's declared rectangle doesn't match its backing range
    DimensionMismatch,
    /// Malformed text input
    Parse,
}

/// The main error type for NNFW operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NnfwError {
    /// Index out of bounds
    #[error("Index out of bounds: index {index}, length {length}")]
    IndexOutOfBounds {
        /// The index that was accessed
        index: usize,
        /// The valid length
        length: usize,
    },

    /// Vector operands of differing length
    #[error("Incompatible vectors in {operation}: expected length {expected}, got {actual}")]
    IncompatibleVectors {
        /// Operation that rejected its operands
        operation: &'static str,
        /// Length required by the operation
        expected: usize,
        /// Length received
        actual: usize,
    },

    /// Matrix operands of incompatible shape
    #[error("Incompatible matrices in {operation}: expected {expected:?}, got {actual:?}")]
    IncompatibleMatrices {
        /// Operation that rejected its operands
        operation: &'static str,
        /// Shape required by the operation
        expected: (usize, usize),
        /// Shape received
        actual: (usize, usize),
    },

    /// Resize or rebind attempted on a container that forbids it
    #[error("{operation} not allowed: {reason}")]
    StructuralMutationDenied {
        /// The denied operation
        operation: &'static str,
        /// Why the container refuses it
        reason: &'static str,
    },

    /// A `rows x cols` view over a range of a different length
    #[error("Dimension mismatch: {rows}x{cols} view over a range of {length} elements")]
    DimensionMismatch {
        /// Declared rows
        rows: usize,
        /// Declared columns
        cols: usize,
        /// Length of the backing range
        length: usize,
    },

    /// Text could not be parsed into a container
    #[error("Parse error: {0}")]
    Parse(String),
}

impl NnfwError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            NnfwError::IndexOutOfBounds { .. } => ErrorKind::OutOfBounds,
            NnfwError::IncompatibleVectors { .. } | NnfwError::IncompatibleMatrices { .. } => {
                ErrorKind::IncompatibleDimensions
            }
            NnfwError::StructuralMutationDenied { .. } => ErrorKind::StructuralMutationDenied,
            NnfwError::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            NnfwError::Parse(_) => ErrorKind::Parse,
        }
    }
}

/// A specialized `Result` type for NNFW operations.
pub type Result<T> = std::result::Result<T, NnfwError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NnfwError::IndexOutOfBounds {
            index: 7,
            length: 3,
        };
        assert_eq!(err.to_string(), "Index out of bounds: index 7, length 3");

        let err = NnfwError::IncompatibleVectors {
            operation: "mse",
            expected: 3,
            actual: 5,
        };
        assert_eq!(
            err.to_string(),
            "Incompatible vectors in mse: expected length 3, got 5"
        );

        let err = NnfwError::IncompatibleMatrices {
            operation: "matmul",
            expected: (2, 3),
            actual: (4, 3),
        };
        assert_eq!(
            err.to_string(),
            "Incompatible matrices in matmul: expected (2, 3), got (4, 3)"
        );
    }

    #[test]
    fn test_error_kind() {
        let err = NnfwError::StructuralMutationDenied {
            operation: "resize",
            reason: "vector is internal",
        };
        assert_eq!(err.kind(), ErrorKind::StructuralMutationDenied);
        assert_eq!(err.to_string(), "resize not allowed: vector is internal");

        let err = NnfwError::IncompatibleMatrices {
            operation: "add",
            expected: (1, 1),
            actual: (2, 2),
        };
        assert_eq!(err.kind(), ErrorKind::IncompatibleDimensions);

        let err = NnfwError::DimensionMismatch {
            rows: 2,
            cols: 3,
            length: 5,
        };
        assert_eq!(err.kind(), ErrorKind::DimensionMismatch);
    }

    #[test]
    fn test_result_type() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }

        assert_eq!(returns_result().unwrap(), 42);
    }
}
