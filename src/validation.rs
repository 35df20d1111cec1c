//! Checked/unchecked build switch.
//!
//! Dimension and structural checks are a compile-time choice:
//!
//! - **Checked** (`debug_assertions`, or the `checked` feature): violations
//!   return a typed [`NnfwError`] the caller may handle.
//! - **Unchecked** (release builds, or the `unchecked` feature which wins
//!   over everything else): the checks are compiled out. Behavior on a
//!   violated precondition is *unspecified*: an operation may panic or may
//!   work on some overlap of its operands. It is never memory-unsafe, but
//!   callers must not rely on any particular outcome.
//!
//! Pin-related behavior is never an error in either mode.

use crate::error::{NnfwError, Result};

/// Whether dimension validation is compiled in.
pub const ENABLED: bool = cfg!(all(
    any(debug_assertions, feature = "checked"),
    not(feature = "unchecked")
));

/// Require `actual == expected` for a vector-length contract.
#[inline]
pub(crate) fn check_len(operation: &'static str, expected: usize, actual: usize) -> Result<()> {
    if ENABLED && expected != actual {
        return Err(NnfwError::IncompatibleVectors {
            operation,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Require `actual == expected` for a matrix-shape contract.
#[inline]
pub(crate) fn check_shape(
    operation: &'static str,
    expected: (usize, usize),
    actual: (usize, usize),
) -> Result<()> {
    if ENABLED && expected != actual {
        return Err(NnfwError::IncompatibleMatrices {
            operation,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Index check used by the `at` accessors. Always active.
#[inline]
pub(crate) fn check_index(index: usize, length: usize) -> Result<()> {
    if index >= length {
        return Err(NnfwError::IndexOutOfBounds { index, length });
    }
    Ok(())
}

/// Range check for view construction: `start <= end <= length`.
#[inline]
pub(crate) fn check_range(start: usize, end: usize, length: usize) -> Result<()> {
    if ENABLED {
        if end > length {
            return Err(NnfwError::IndexOutOfBounds { index: end, length });
        }
        if start > end {
            return Err(NnfwError::IndexOutOfBounds { index: start, length: end });
        }
    }
    Ok(())
}
