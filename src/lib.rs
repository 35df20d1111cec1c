//! Nnfw - Containers and Algebra for Neural Network Simulation
//!
//! Nnfw is the numeric core of a neural-network simulation framework: the
//! storage that clusters (neuron groups) and linkers (weighted connections)
//! keep their inputs, outputs and weights in, and the per-step algebra that
//! transforms them.
//!
//! # Key Characteristics
//!
//! - Copy-on-write vectors and matrices: `clone()` is O(1), the first write
//!   detaches
//! - Per-element pinning ("steady" elements ignore writes)
//! - Row, column and range views that write straight into their source
//! - Compile-time checked/unchecked validation switch
//!
//! # Architecture
//!
//! - **PinnableCell**: one real value with a free/pinned write policy
//! - **RealVector**: resizable copy-on-write vector of pinnable cells, with
//!   views, internal protection and chained operators
//! - **RealMatrix**: row-major matrix whose rows and columns are live views
//! - **DynArray**: plain resizable array with range views (masks, flags)
//! - **algebra**: reductions, destination-writing kernels, matrix-vector
//!   products and delta-rule updates
//!
//! # Examples
//!
//! ## Vectors
//!
//! ```
//! use nnfw::RealVector;
//!
//! let a = RealVector::from_slice(&[2.0, 4.0, 6.0]);
//! let half = &a / 2.0;
//! assert_eq!(half.to_vec(), vec![1.0, 2.0, 3.0]);
//! assert_eq!(a.to_vec(), vec![2.0, 4.0, 6.0]);
//!
//! // Chained expressions reuse the intermediate buffer
//! let b = &a + &half - &a;
//! assert_eq!(b, half);
//! ```
//!
//! ## Weights and Learning
//!
//! ```
//! use nnfw::{algebra, RealMatrix, RealVector};
//!
//! let mut weights = RealMatrix::new(3, 2);
//! weights.steady(0, 1);
//!
//! let x = RealVector::from_slice(&[1.0, 2.0, 3.0]);
//! let y = RealVector::from_slice(&[1.0, 1.0]);
//! algebra::deltarule_matrix(&mut weights, 0.5, &x, &y).unwrap();
//!
//! assert_eq!(weights.row(0).to_vec(), vec![0.5, 0.0]);
//! assert_eq!(weights.column(0).to_vec(), vec![0.5, 1.0, 1.5]);
//! ```
//!
//! # Validation
//!
//! Dimension checks follow [`validation::ENABLED`]: on in debug builds or
//! with the `checked` feature, off in release builds or with the `unchecked`
//! feature. Checked violations come back as [`NnfwError`]; operators panic
//! with the same message. Indexed access is always bounds-checked.

// Module declarations
pub mod error;
pub mod validation;

pub mod cell;
mod storage;

pub mod real_matrix;
pub mod real_vector;

pub mod dyn_array;

pub mod algebra;

// Re-exports for convenient access
pub use cell::{CellState, PinnableCell, Real};
pub use dyn_array::DynArray;
pub use error::{ErrorKind, NnfwError, Result};
pub use real_matrix::{LineMut, RealMatrix};
pub use real_vector::{CellMut, RealVector};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Framework name
pub const NAME: &str = "Nnfw";

/// Get version string
pub fn version() -> String {
    format!("{} v{}", NAME, VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(ver.contains("Nnfw"));
        assert!(ver.contains("1.0.0"));
    }

    #[test]
    fn test_re_exports() {
        let _v = RealVector::zeros(4);
        let _m = RealMatrix::identity(2);
        let _a: DynArray<bool> = DynArray::new();
        let _result: Result<()> = Ok(());
        assert_eq!(PinnableCell::default().state(), CellState::Free);
    }
}
