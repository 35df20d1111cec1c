//! Integration tests for the algebra functions.

use approx::assert_relative_eq;
use nnfw::{algebra, validation, ErrorKind, RealMatrix, RealVector};

fn weights() -> RealMatrix {
    RealMatrix::from_rows(&[
        vec![1.0, 0.0, 2.0],
        vec![0.0, 1.0, 1.0],
    ])
    .unwrap()
}

// =============================================================================
// Reductions
// =============================================================================

#[test]
fn test_max_index_first_of_ties() {
    let v = RealVector::from_slice(&[0.1, 0.9, 0.3, 0.9]);
    assert_eq!(algebra::max_index(&v), 1);
}

#[test]
fn test_sum_mean() {
    let v = RealVector::from_slice(&[1.0, 2.0, 3.0, 4.0]);
    assert_relative_eq!(algebra::sum(&v), 10.0);
    assert_relative_eq!(algebra::mean(&v), 2.5);
}

#[test]
fn test_mean_of_empty_is_nan() {
    assert!(algebra::mean(&RealVector::new()).is_nan());
}

#[test]
fn test_mse() {
    let target = RealVector::from_slice(&[1.0, 1.0, 1.0]);
    let actual = RealVector::from_slice(&[1.0, 2.0, 4.0]);
    assert_relative_eq!(algebra::mse(&target, &actual).unwrap(), 10.0 / 3.0);
}

#[test]
fn test_mse_size_mismatch() {
    if !validation::ENABLED {
        return;
    }
    let err = algebra::mse(&RealVector::zeros(3), &RealVector::zeros(5)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IncompatibleDimensions);
}

#[test]
fn test_in_place_functions_chain() {
    let mut v = RealVector::from_slice(&[1.0, 2.0]);
    algebra::square(&mut v).add_scalar(1.0);
    assert_eq!(v.to_vec(), vec![2.0, 5.0]);
    algebra::inv(&mut v);
    assert_relative_eq!(v.get(1), 0.2);

    let mut z = RealVector::zeros(2);
    algebra::exp(&mut z);
    assert_eq!(z.to_vec(), vec![1.0, 1.0]);
}

// =============================================================================
// Destination Kernels
// =============================================================================

#[test]
fn test_destination_kernels() {
    let x = RealVector::from_slice(&[1.0, 2.0, 3.0]);
    let y = RealVector::from_slice(&[4.0, 5.0, 6.0]);
    let mut dst = RealVector::zeros(3);

    algebra::add(&mut dst, &x, &y).unwrap();
    assert_eq!(dst.to_vec(), vec![5.0, 7.0, 9.0]);
    algebra::subtract(&mut dst, &y, &x).unwrap();
    assert_eq!(dst.to_vec(), vec![3.0, 3.0, 3.0]);
    algebra::mul(&mut dst, &x, &y).unwrap();
    assert_eq!(dst.to_vec(), vec![4.0, 10.0, 18.0]);
    algebra::mul_scalar(&mut dst, -1.0, &x).unwrap();
    assert_eq!(dst.to_vec(), vec![-1.0, -2.0, -3.0]);
}

#[test]
fn test_deltarule_vector() {
    let x = RealVector::from_slice(&[1.0, 2.0]);
    let y = RealVector::from_slice(&[3.0, 4.0]);
    let mut w = RealVector::from_slice(&[1.0, 1.0]);
    w.steady(1);
    algebra::deltarule(&mut w, 0.1, &x, &y).unwrap();
    assert_relative_eq!(w.get(0), 1.3);
    assert_eq!(w.get(1), 1.0);
}

#[test]
fn test_kernel_size_mismatch() {
    if !validation::ENABLED {
        return;
    }
    let mut dst = RealVector::zeros(2);
    let err = algebra::subtract(&mut dst, &RealVector::zeros(3), &RealVector::zeros(3)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IncompatibleDimensions);
}

// =============================================================================
// Matrix-Vector Products
// =============================================================================

#[test]
fn test_mul_vec_mat() {
    let x = RealVector::from_slice(&[1.0, 2.0]);
    let mut y = RealVector::zeros(3);
    algebra::mul_vec_mat(&mut y, &x, &weights()).unwrap();
    assert_eq!(y.to_vec(), vec![1.0, 2.0, 4.0]);

    algebra::amul_vec_mat(&mut y, &x, &weights()).unwrap();
    assert_eq!(y.to_vec(), vec![2.0, 4.0, 8.0]);
}

#[test]
fn test_mul_mat_vec() {
    let x = RealVector::from_slice(&[1.0, 1.0, 1.0]);
    let mut y = RealVector::from_slice(&[10.0, 10.0]);
    algebra::mul_mat_vec(&mut y, &weights(), &x).unwrap();
    assert_eq!(y.to_vec(), vec![3.0, 2.0]);

    algebra::amul_mat_vec(&mut y, &weights(), &x).unwrap();
    assert_eq!(y.to_vec(), vec![6.0, 4.0]);
}

#[test]
fn test_product_honors_steady_output() {
    let x = RealVector::from_slice(&[1.0, 1.0, 1.0]);
    let mut y = RealVector::from_slice(&[-1.0, -1.0]);
    y.steady(0);
    algebra::mul_mat_vec(&mut y, &weights(), &x).unwrap();
    assert_eq!(y.to_vec(), vec![-1.0, 2.0]);
}

#[test]
fn test_product_with_column_operand() {
    // x is a column of the weight matrix itself
    let m = RealMatrix::identity(3);
    let mut y = RealVector::zeros(3);
    algebra::mul_mat_vec(&mut y, &m, m.column(1)).unwrap();
    assert_eq!(y.to_vec(), vec![0.0, 1.0, 0.0]);
}

#[test]
fn test_product_size_mismatch() {
    if !validation::ENABLED {
        return;
    }
    let m = RealMatrix::new(5, 5);
    let mut y = RealVector::zeros(4);
    let err = algebra::mul_vec_mat(&mut y, &RealVector::zeros(3), &m).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IncompatibleDimensions);
    let err = algebra::amul_mat_vec(&mut y, &m, &RealVector::zeros(5)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IncompatibleDimensions);
}

// =============================================================================
// Delta Rule on Matrices
// =============================================================================

#[test]
fn test_deltarule_matrix_outer_product() {
    let mut m = RealMatrix::new(3, 2);
    let x = RealVector::from_slice(&[1.0, 2.0, 3.0]);
    let y = RealVector::from_slice(&[1.0, 1.0]);
    algebra::deltarule_matrix(&mut m, 0.5, &x, &y).unwrap();
    assert_eq!(
        m.to_rows(),
        vec![vec![0.5, 0.5], vec![1.0, 1.0], vec![1.5, 1.5]]
    );
}

#[test]
fn test_deltarule_matrix_zero_rate() {
    let mut m = weights();
    let before = m.clone();
    let x = RealVector::from_slice(&[3.0, -2.0]);
    let y = RealVector::from_slice(&[0.5, 7.0, 1.0]);
    algebra::deltarule_matrix(&mut m, 0.0, &x, &y).unwrap();
    assert_eq!(m, before);
}

#[test]
fn test_deltarule_matrix_skips_steady_and_detaches() {
    let original = weights();
    let mut m = original.clone();
    m.steady(0, 2);
    let x = RealVector::from_slice(&[1.0, 1.0]);
    let y = RealVector::from_slice(&[1.0, 1.0, 1.0]);
    algebra::deltarule_matrix(&mut m, 1.0, &x, &y).unwrap();
    assert_eq!(m.to_rows(), vec![vec![2.0, 1.0, 2.0], vec![1.0, 2.0, 2.0]]);
    assert_eq!(original, weights());
}
