//! Algebra - free functions over vectors and matrices.
//!
//! These are the per-step kernels that clusters and linkers call: reductions,
//! element-wise functions, pre-allocated-destination arithmetic, matrix-vector
//! products and the delta-rule learning updates.
//!
//! Every function that takes a destination writes into it without allocating
//! (an operand that aliases the destination is snapshotted first) and honors
//! the destination's steady elements. Dimension contracts are checked in
//! checked builds and reported as `IncompatibleVectors`.
//!
//! # Examples
//!
//! ```
//! use nnfw::{algebra, RealMatrix, RealVector};
//!
//! let mut weights = RealMatrix::new(3, 2);
//! let x = RealVector::from_slice(&[1.0, 2.0, 3.0]);
//! let y = RealVector::from_slice(&[1.0, 1.0]);
//! algebra::deltarule_matrix(&mut weights, 0.5, &x, &y).unwrap();
//! assert_eq!(weights.to_rows(), vec![vec![0.5, 0.5], vec![1.0, 1.0], vec![1.5, 1.5]]);
//!
//! let mut out = RealVector::zeros(2);
//! algebra::mul_vec_mat(&mut out, &x, &weights).unwrap();
//! assert_eq!(out.to_vec(), vec![7.0, 7.0]);
//! ```

use crate::cell::Real;
use crate::error::Result;
use crate::real_matrix::RealMatrix;
use crate::real_vector::RealVector;
use crate::validation;

// =============================================================================
// Reductions and Element-wise Functions
// =============================================================================

/// Index of the first maximum element.
#[inline]
pub fn max_index(v: &RealVector) -> usize {
    v.max_index()
}

/// Exponential of every free element, in place.
#[inline]
pub fn exp(v: &mut RealVector) -> &mut RealVector {
    v.exp()
}

/// Reciprocal of every free element, in place.
#[inline]
pub fn inv(v: &mut RealVector) -> &mut RealVector {
    v.inv()
}

/// Square of every free element, in place.
#[inline]
pub fn square(v: &mut RealVector) -> &mut RealVector {
    v.square()
}

#[inline]
pub fn sum(v: &RealVector) -> Real {
    v.sum()
}

/// `sum(v) / len(v)`. `v` must not be empty (NaN otherwise).
#[inline]
pub fn mean(v: &RealVector) -> Real {
    v.mean()
}

/// Mean squared error between `target` and `actual`.
///
/// # Errors
///
/// In checked builds, `IncompatibleVectors` if the lengths differ.
#[inline]
pub fn mse(target: &RealVector, actual: &RealVector) -> Result<Real> {
    target.mse(actual)
}

// =============================================================================
// Vector Kernels
// =============================================================================

/// `dst[i] = f(dst[i], x[i], y[i])` for every free `dst[i]`.
fn zip_into<'a>(
    operation: &'static str,
    dst: &'a mut RealVector,
    x: &RealVector,
    y: &RealVector,
    f: impl Fn(Real, Real, Real) -> Real,
) -> Result<&'a mut RealVector> {
    validation::check_len(operation, x.len(), y.len())?;
    validation::check_len(operation, x.len(), dst.len())?;
    {
        let (xs, ys) = (x.read_for(dst), y.read_for(dst));
        let mut out = dst.cells_mut();
        let n = out.len().min(xs.len()).min(ys.len());
        for i in 0..n {
            let value = f(out.get(i), xs.get(i), ys.get(i));
            out.write(i, value);
        }
    }
    Ok(dst)
}

/// `dst = x + y`.
pub fn add<'a>(dst: &'a mut RealVector, x: &RealVector, y: &RealVector) -> Result<&'a mut RealVector> {
    zip_into("add", dst, x, y, |_, a, b| a + b)
}

/// `dst = x - y`.
///
/// # Errors
///
/// In checked builds, `IncompatibleVectors` unless all three lengths match.
pub fn subtract<'a>(
    dst: &'a mut RealVector,
    x: &RealVector,
    y: &RealVector,
) -> Result<&'a mut RealVector> {
    zip_into("subtract", dst, x, y, |_, a, b| a - b)
}

/// `dst = x * y` element-wise.
pub fn mul<'a>(dst: &'a mut RealVector, x: &RealVector, y: &RealVector) -> Result<&'a mut RealVector> {
    zip_into("mul", dst, x, y, |_, a, b| a * b)
}

/// `dst = scalar * x`.
pub fn mul_scalar<'a>(
    dst: &'a mut RealVector,
    scalar: Real,
    x: &RealVector,
) -> Result<&'a mut RealVector> {
    validation::check_len("mul_scalar", x.len(), dst.len())?;
    {
        let xs = x.read_for(dst);
        let mut out = dst.cells_mut();
        for i in 0..out.len().min(xs.len()) {
            out.write(i, scalar * xs.get(i));
        }
    }
    Ok(dst)
}

/// `dst += rate * x * y` element-wise.
///
/// # Examples
///
/// ```
/// use nnfw::{algebra, RealVector};
///
/// let mut w = RealVector::from_slice(&[1.0, 1.0]);
/// let x = RealVector::from_slice(&[2.0, 3.0]);
/// let y = RealVector::from_slice(&[1.0, -1.0]);
/// algebra::deltarule(&mut w, 0.5, &x, &y).unwrap();
/// assert_eq!(w.to_vec(), vec![2.0, -0.5]);
/// ```
pub fn deltarule<'a>(
    dst: &'a mut RealVector,
    rate: Real,
    x: &RealVector,
    y: &RealVector,
) -> Result<&'a mut RealVector> {
    zip_into("deltarule", dst, x, y, |d, a, b| d + rate * a * b)
}

// =============================================================================
// Matrix-Vector Products
// =============================================================================

/// Which side of the matrix the vector operand multiplies.
#[derive(Clone, Copy)]
enum Side {
    /// `y = x * M` (`x` has `rows` elements, `y` has `cols`)
    Left,
    /// `y = M * x` (`x` has `cols` elements, `y` has `rows`)
    Right,
}

fn product<'a>(
    operation: &'static str,
    y: &'a mut RealVector,
    x: &RealVector,
    m: &RealMatrix,
    side: Side,
    accumulate: bool,
) -> Result<&'a mut RealVector> {
    let (rows, cols) = m.shape();
    let (x_len, y_len) = match side {
        Side::Left => (rows, cols),
        Side::Right => (cols, rows),
    };
    validation::check_len(operation, x_len, x.len())?;
    validation::check_len(operation, y_len, y.len())?;

    {
        let xs = x.read_for(y);
        let weights = m.flat().read_for(y);
        let mut out = y.cells_mut();
        let inner = x_len.min(xs.len());
        for j in 0..y_len.min(out.len()) {
            let mut acc = 0.0;
            for k in 0..inner {
                let w = match side {
                    Side::Left => weights.get(k * cols + j),
                    Side::Right => weights.get(j * cols + k),
                };
                acc += xs.get(k) * w;
            }
            let value = if accumulate { out.get(j) + acc } else { acc };
            out.write(j, value);
        }
    }
    Ok(y)
}

/// `y = x * M` (row vector times matrix).
///
/// # Errors
///
/// In checked builds, `IncompatibleVectors` unless `x.len() == M.rows()` and
/// `y.len() == M.cols()`.
pub fn mul_vec_mat<'a>(
    y: &'a mut RealVector,
    x: &RealVector,
    m: &RealMatrix,
) -> Result<&'a mut RealVector> {
    product("mul_vec_mat", y, x, m, Side::Left, false)
}

/// `y = M * x` (matrix times column vector).
///
/// # Errors
///
/// In checked builds, `IncompatibleVectors` unless `x.len() == M.cols()` and
/// `y.len() == M.rows()`.
pub fn mul_mat_vec<'a>(
    y: &'a mut RealVector,
    m: &RealMatrix,
    x: &RealVector,
) -> Result<&'a mut RealVector> {
    product("mul_mat_vec", y, x, m, Side::Right, false)
}

/// `y += x * M`.
pub fn amul_vec_mat<'a>(
    y: &'a mut RealVector,
    x: &RealVector,
    m: &RealMatrix,
) -> Result<&'a mut RealVector> {
    product("amul_vec_mat", y, x, m, Side::Left, true)
}

/// `y += M * x`.
pub fn amul_mat_vec<'a>(
    y: &'a mut RealVector,
    m: &RealMatrix,
    x: &RealVector,
) -> Result<&'a mut RealVector> {
    product("amul_mat_vec", y, x, m, Side::Right, true)
}

/// Outer-product learning update `M[r][c] += rate * x[r] * y[c]`.
///
/// Steady weights are left untouched.
///
/// # Errors
///
/// In checked builds, `IncompatibleVectors` unless `x.len() == M.rows()` and
/// `y.len() == M.cols()`.
pub fn deltarule_matrix<'a>(
    m: &'a mut RealMatrix,
    rate: Real,
    x: &RealVector,
    y: &RealVector,
) -> Result<&'a mut RealMatrix> {
    let (rows, cols) = m.shape();
    validation::check_len("deltarule_matrix", rows, x.len())?;
    validation::check_len("deltarule_matrix", cols, y.len())?;

    {
        let data = m.flat_mut();
        let (xs, ys) = (x.read_for(data), y.read_for(data));
        let mut out = data.cells_mut();
        for r in 0..rows.min(xs.len()) {
            let scaled = rate * xs.get(r);
            for c in 0..cols.min(ys.len()) {
                let i = r * cols + c;
                let value = out.get(i) + scaled * ys.get(c);
                out.write(i, value);
            }
        }
    }
    Ok(m)
}
