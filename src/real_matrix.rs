//! RealMatrix - copy-on-write matrix of pinnable real numbers.
//!
//! A `rows x cols` matrix stores its elements in one flat, row-major
//! [`RealVector`] and keeps one view per row and one per column into that
//! same buffer. All three access paths (flat index, row view, column view)
//! reach the same [`PinnableCell`](crate::PinnableCell), so pinning a cell
//! through one of them pins it for all of them.
//!
//! Matrices follow the same sharing rules as vectors: `clone()` shares the
//! buffer until one side writes, a matrix built over a range of a vector
//! (`view_of`) aliases that vector and can't resize, and internal matrices
//! refuse resize and whole-matrix assignment.
//!
//! A matrix view whose source shrinks below its range collapses to `0 x 0`
//! for good. Resizing or reassigning a matrix invalidates vector views taken
//! of its rows, columns or flat data; they re-base to the whole buffer.
//!
//! # Examples
//!
//! ```
//! use nnfw::RealMatrix;
//!
//! let mut m = RealMatrix::new(3, 4);
//! m.steady(2, 3);
//! m.row_mut(2).set(3, 1.0);
//! m.column_mut(3).set(2, 1.0);
//! m.set(2, 3, 1.0);
//! assert_eq!(m.get(2, 3), 0.0);
//!
//! m.column_mut(3).unsteady(2);
//! m.row_mut(2).set(3, 1.0);
//! assert_eq!(m.get(2, 3), 1.0);
//! assert!(!m.is_steady(2, 3));
//! ```

use std::fmt;
use std::ops::{
    Add, AddAssign, Deref, Div, DivAssign, Mul, MulAssign, Rem, RemAssign, Sub, SubAssign,
};
use std::rc::Rc;
use std::str::FromStr;

use itertools::Itertools;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cell::{PinnableCell, Real};
use crate::error::{NnfwError, Result};
use crate::real_vector::{CellMut, RealVector};
use crate::validation;

/// Resizable, reference-counted, copy-on-write matrix of real numbers.
#[derive(Serialize, Deserialize)]
#[serde(try_from = "MatrixRepr", into = "MatrixRepr")]
pub struct RealMatrix {
    /// Flat row-major storage (internal)
    data: RealVector,
    n_rows: usize,
    n_cols: usize,
    /// One internal view per row, stride 1
    row_views: Vec<RealVector>,
    /// One internal view per column, stride `n_cols`
    col_views: Vec<RealVector>,
    internal: bool,
}

impl RealMatrix {
    // =========================================================================
    // Construction
    // =========================================================================

    fn wire(data: RealVector, n_rows: usize, n_cols: usize) -> Self {
        let mut matrix = Self {
            data: data.into_internal(),
            n_rows,
            n_cols,
            row_views: Vec::new(),
            col_views: Vec::new(),
            internal: false,
        };
        matrix.rewire();
        matrix
    }

    /// Rebuild the row and column views after a change of shape or buffer.
    fn rewire(&mut self) {
        let (rows, cols) = self.shape();
        self.row_views = (0..rows)
            .map(|r| RealVector::window_of(&self.data, r * cols, cols, 1).into_internal())
            .collect();
        self.col_views = (0..cols)
            .map(|c| RealVector::window_of(&self.data, c, rows, cols).into_internal())
            .collect();
    }

    /// Create a `rows x cols` matrix of zeros.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::wire(RealVector::zeros(rows * cols), rows, cols)
    }

    /// Create a matrix from row-major `values`.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if `values.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, values: Vec<Real>) -> Result<Self> {
        if values.len() != rows * cols {
            return Err(NnfwError::DimensionMismatch {
                rows,
                cols,
                length: values.len(),
            });
        }
        Ok(Self::wire(RealVector::from(values), rows, cols))
    }

    /// Create a matrix from a slice of rows.
    ///
    /// # Errors
    ///
    /// `IncompatibleVectors` if the rows have different lengths.
    ///
    /// # Examples
    ///
    /// ```
    /// use nnfw::RealMatrix;
    ///
    /// let m = RealMatrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
    /// assert_eq!(m.get(1, 0), 3.0);
    /// ```
    pub fn from_rows(rows: &[Vec<Real>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if let Some(ragged) = rows.iter().find(|row| row.len() != cols) {
            return Err(NnfwError::IncompatibleVectors {
                operation: "from_rows",
                expected: cols,
                actual: ragged.len(),
            });
        }
        let values = rows.iter().flatten().copied().collect();
        Self::from_vec(rows.len(), cols, values)
    }

    /// Create an `n x n` identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut matrix = Self::new(n, n);
        matrix.set_identity();
        matrix
    }

    /// Interpret elements `[start, end)` of `source` as a `rows x cols`
    /// row-major matrix aliasing `source`.
    ///
    /// If `rows * cols` doesn't match the range length, the result is a
    /// degenerate `0 x 0` matrix and a `DimensionMismatch` diagnostic is
    /// logged. Use [`try_view_of`](Self::try_view_of) to get the error.
    pub fn view_of(source: &RealVector, start: usize, end: usize, rows: usize, cols: usize) -> Self {
        match Self::try_view_of(source, start, end, rows, cols) {
            Ok(matrix) => matrix,
            Err(err) => {
                log::warn!("{}; falling back to an empty matrix view", err);
                Self::wire(RealVector::window_of(source, 0, 0, 1), 0, 0)
            }
        }
    }

    /// Like [`view_of`](Self::view_of) but returns the error.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if `rows * cols != end - start`; in checked builds,
    /// `IndexOutOfBounds` for a range outside `source`.
    pub fn try_view_of(
        source: &RealVector,
        start: usize,
        end: usize,
        rows: usize,
        cols: usize,
    ) -> Result<Self> {
        validation::check_range(start, end, source.len())?;
        let length = end.saturating_sub(start);
        if rows * cols != length {
            return Err(NnfwError::DimensionMismatch { rows, cols, length });
        }
        let data = RealVector::collapsing_window_of(source, start, length);
        Ok(Self::wire(data, rows, cols))
    }

    /// Mark this matrix as embedded in another structure (one-way).
    ///
    /// Internal matrices refuse `resize` and `assign`.
    pub fn into_internal(mut self) -> Self {
        self.internal = true;
        self
    }

    // =========================================================================
    // Queries
    // =========================================================================

    #[inline]
    pub fn rows(&self) -> usize {
        self.shape().0
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.shape().1
    }

    /// Total number of elements (`rows * cols`).
    #[inline]
    pub fn len(&self) -> usize {
        let (rows, cols) = self.shape();
        rows * cols
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(rows, cols)`.
    ///
    /// A matrix view whose source no longer holds its range reports `(0, 0)`
    /// from then on.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        if self.data.len() == self.n_rows * self.n_cols {
            (self.n_rows, self.n_cols)
        } else {
            (0, 0)
        }
    }

    #[inline]
    pub fn is_square(&self) -> bool {
        let (rows, cols) = self.shape();
        rows == cols
    }

    /// Does this matrix alias a range of another vector?
    #[inline]
    pub fn is_view(&self) -> bool {
        self.data.is_view()
    }

    #[inline]
    pub fn is_internal(&self) -> bool {
        self.internal
    }

    /// Do both matrices currently read from the same buffer?
    pub fn shares_storage_with(&self, other: &RealMatrix) -> bool {
        self.data.shares_storage_with(&other.data)
    }

    /// Flat row-major element vector (internal: can't be resized or rebound).
    #[inline]
    pub fn flat(&self) -> &RealVector {
        &self.data
    }

    #[inline]
    pub(crate) fn flat_mut(&mut self) -> &mut RealVector {
        &mut self.data
    }

    /// Free-standing owner with no outside views of its buffer.
    #[inline]
    fn is_scratch(&self) -> bool {
        let wired = 1 + self.row_views.len() + self.col_views.len();
        !self.internal && !self.data.is_view() && self.data.anchor_handles() == wired
    }

    fn deny_structural(&self, operation: &'static str) -> Result<()> {
        if self.internal {
            return Err(NnfwError::StructuralMutationDenied {
                operation,
                reason: "matrix is internal",
            });
        }
        if self.data.is_view() {
            return Err(NnfwError::StructuralMutationDenied {
                operation,
                reason: "matrix is a view",
            });
        }
        Ok(())
    }

    // =========================================================================
    // Element Access
    // =========================================================================

    #[inline]
    fn flat_index(&self, row: usize, col: usize) -> usize {
        let (rows, cols) = self.shape();
        assert!(
            row < rows && col < cols,
            "cell ({}, {}) out of bounds ({}x{})",
            row,
            col,
            rows,
            cols
        );
        row * cols + col
    }

    /// Value at (`row`, `col`).
    ///
    /// # Panics
    ///
    /// Panics if the cell is outside the matrix.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Real {
        self.data.get(self.flat_index(row, col))
    }

    /// Write `value` at (`row`, `col`) unless the cell is steady.
    ///
    /// # Panics
    ///
    /// Panics if the cell is outside the matrix.
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: Real) {
        let index = self.flat_index(row, col);
        self.data.set(index, value);
    }

    /// Value at (`row`, `col`), or `IndexOutOfBounds`.
    pub fn at(&self, row: usize, col: usize) -> Result<Real> {
        let (rows, cols) = self.shape();
        validation::check_index(row, rows)?;
        validation::check_index(col, cols)?;
        self.data.at(row * cols + col)
    }

    /// Proxy for reading, writing and pinning the cell at (`row`, `col`).
    pub fn cell_mut(&mut self, row: usize, col: usize) -> CellMut<'_> {
        let index = self.flat_index(row, col);
        self.data.cell_mut(index)
    }

    /// Value at row-major position `index`.
    pub fn get_flat(&self, index: usize) -> Real {
        self.data.get(index)
    }

    /// Write at row-major position `index` unless the cell is steady.
    pub fn set_flat(&mut self, index: usize, value: Real) {
        self.data.set(index, value);
    }

    /// Live view of row `row`.
    ///
    /// # Panics
    ///
    /// Panics if `row >= rows`.
    pub fn row(&self, row: usize) -> &RealVector {
        let rows = self.rows();
        assert!(row < rows, "row {} out of bounds (rows: {})", row, rows);
        &self.row_views[row]
    }

    /// Mutable handle on row `row`; writes go straight into the matrix.
    pub fn row_mut(&mut self, row: usize) -> LineMut<'_> {
        let rows = self.rows();
        assert!(row < rows, "row {} out of bounds (rows: {})", row, rows);
        LineMut {
            line: &mut self.row_views[row],
        }
    }

    /// Live view of column `col`.
    ///
    /// # Panics
    ///
    /// Panics if `col >= cols`.
    pub fn column(&self, col: usize) -> &RealVector {
        let cols = self.cols();
        assert!(col < cols, "column {} out of bounds (cols: {})", col, cols);
        &self.col_views[col]
    }

    /// Mutable handle on column `col`; writes go straight into the matrix.
    pub fn column_mut(&mut self, col: usize) -> LineMut<'_> {
        let cols = self.cols();
        assert!(col < cols, "column {} out of bounds (cols: {})", col, cols);
        LineMut {
            line: &mut self.col_views[col],
        }
    }

    /// Copy the values out as one `Vec` per row.
    pub fn to_rows(&self) -> Vec<Vec<Real>> {
        (0..self.rows()).map(|r| self.row_views[r].to_vec()).collect()
    }

    /// Copy the values out in row-major order.
    pub fn to_vec(&self) -> Vec<Real> {
        self.data.to_vec()
    }

    // =========================================================================
    // Structural Operations
    // =========================================================================

    /// Resize to `rows x cols`, keeping the overlapping top-left block (values
    /// and pin state). New cells are zero.
    ///
    /// # Errors
    ///
    /// `StructuralMutationDenied` if the matrix is internal or a view.
    pub fn resize(&mut self, rows: usize, cols: usize) -> Result<()> {
        self.deny_structural("resize")?;
        let (old_rows, old_cols) = self.shape();
        log::trace!(
            "resizing matrix from {}x{} to {}x{}",
            old_rows,
            old_cols,
            rows,
            cols
        );

        let mut cells = vec![PinnableCell::default(); rows * cols];
        {
            let old = self.data.cells();
            for r in 0..rows.min(old_rows) {
                for c in 0..cols.min(old_cols) {
                    cells[r * cols + c] = *old.cell(r * old_cols + c);
                }
            }
        }
        self.data.set_payload(Rc::new(cells));
        self.data.relayout();
        self.n_rows = rows;
        self.n_cols = cols;
        self.rewire();
        Ok(())
    }

    /// Rebind this matrix to `source`'s storage and shape (whole-matrix
    /// assignment). Both share one buffer until either is written.
    ///
    /// # Errors
    ///
    /// `StructuralMutationDenied` if this matrix is internal or a view.
    pub fn assign(&mut self, source: &RealMatrix) -> Result<()> {
        self.deny_structural("assign")?;
        let (rows, cols) = source.shape();
        self.data.set_payload(source.data.shared_payload());
        self.data.relayout();
        self.n_rows = rows;
        self.n_cols = cols;
        self.rewire();
        Ok(())
    }

    /// Copy the overlapping top-left block of `source`, skipping steady cells.
    pub fn copy_values(&mut self, source: &RealMatrix) -> &mut Self {
        self.copy_values_strided(source, 0, 0, 0, 0, 1, 1)
    }

    /// Copy `source` starting at (`row_offset`, `col_offset`) into this matrix
    /// starting at (`this_row_offset`, `this_col_offset`), clipped to the
    /// overlap and skipping steady cells.
    pub fn copy_values_offset(
        &mut self,
        source: &RealMatrix,
        row_offset: usize,
        col_offset: usize,
        this_row_offset: usize,
        this_col_offset: usize,
    ) -> &mut Self {
        self.copy_values_strided(
            source,
            row_offset,
            col_offset,
            this_row_offset,
            this_col_offset,
            1,
            1,
        )
    }

    /// Like [`copy_values_offset`](Self::copy_values_offset) but reads every
    /// `row_stride`-th row and `col_stride`-th column of `source` into
    /// consecutive rows and columns of this matrix.
    ///
    /// A stride of 0 copies nothing.
    ///
    /// # Examples
    ///
    /// ```
    /// use nnfw::RealMatrix;
    ///
    /// let src = RealMatrix::from_rows(&[
    ///     vec![0.0, 1.0, 2.0, 3.0],
    ///     vec![4.0, 5.0, 6.0, 7.0],
    ///     vec![8.0, 9.0, 10.0, 11.0],
    /// ]).unwrap();
    /// let mut dst = RealMatrix::new(2, 2);
    /// dst.copy_values_strided(&src, 0, 1, 0, 0, 2, 2);
    /// assert_eq!(dst.to_rows(), vec![vec![1.0, 3.0], vec![9.0, 11.0]]);
    /// ```
    #[allow(clippy::too_many_arguments)]
    pub fn copy_values_strided(
        &mut self,
        source: &RealMatrix,
        row_offset: usize,
        col_offset: usize,
        this_row_offset: usize,
        this_col_offset: usize,
        row_stride: usize,
        col_stride: usize,
    ) -> &mut Self {
        if row_stride == 0 || col_stride == 0 {
            return self;
        }

        let (src_rows, src_cols) = source.shape();
        let (dst_rows, dst_cols) = self.shape();
        let rows = dst_rows
            .saturating_sub(this_row_offset)
            .min(src_rows.saturating_sub(row_offset).div_ceil(row_stride));
        let cols = dst_cols
            .saturating_sub(this_col_offset)
            .min(src_cols.saturating_sub(col_offset).div_ceil(col_stride));

        {
            let values = source.data.read_for(&self.data);
            let mut cells = self.data.cells_mut();
            for i in 0..rows {
                let src_row = (row_offset + i * row_stride) * src_cols;
                let dst_row = (this_row_offset + i) * dst_cols;
                for j in 0..cols {
                    let value = values.get(src_row + col_offset + j * col_stride);
                    cells.write(dst_row + this_col_offset + j, value);
                }
            }
        }
        self
    }

    // =========================================================================
    // Pinning
    // =========================================================================

    /// Pin the cell at (`row`, `col`) for every access path.
    pub fn steady(&mut self, row: usize, col: usize) {
        let index = self.flat_index(row, col);
        self.data.steady(index);
    }

    pub fn unsteady(&mut self, row: usize, col: usize) {
        let index = self.flat_index(row, col);
        self.data.unsteady(index);
    }

    pub fn is_steady(&self, row: usize, col: usize) -> bool {
        self.data.is_steady(self.flat_index(row, col))
    }

    // =========================================================================
    // Bulk Writes
    // =========================================================================

    /// Set every free cell to `value`.
    pub fn set_all(&mut self, value: Real) -> &mut Self {
        self.data.set_all(value);
        self
    }

    pub fn zeroing(&mut self) -> &mut Self {
        self.data.zeroing();
        self
    }

    /// Set free cells to 1 where `row == col` and 0 elsewhere.
    pub fn set_identity(&mut self) -> &mut Self {
        let cols = self.cols();
        {
            let mut cells = self.data.cells_mut();
            for i in 0..cells.len() {
                cells.write(i, if i / cols == i % cols { 1.0 } else { 0.0 });
            }
        }
        self
    }

    /// Fill free cells with values drawn uniformly from `[min, max]`.
    pub fn randomize<R: Rng>(&mut self, rng: &mut R, min: Real, max: Real) -> &mut Self {
        self.data.randomize(rng, min, max);
        self
    }

    // =========================================================================
    // Arithmetic
    // =========================================================================

    fn check_same_shape(&self, operation: &'static str, other: &RealMatrix) -> Result<()> {
        validation::check_shape(operation, self.shape(), other.shape())
    }

    fn zip_in_place(
        &mut self,
        operation: &'static str,
        other: &RealMatrix,
        f: impl Fn(Real, Real) -> Real,
    ) -> Result<&mut Self> {
        self.check_same_shape(operation, other)?;
        self.data.zip_in_place(operation, &other.data, f)?;
        Ok(self)
    }

    fn zip_overwrite(
        &mut self,
        operation: &'static str,
        other: &RealMatrix,
        f: impl Fn(Real, Real) -> Real,
    ) -> Result<()> {
        self.check_same_shape(operation, other)?;
        self.data.zip_overwrite(operation, &other.data, f)
    }

    fn zip_new(
        &self,
        operation: &'static str,
        other: &RealMatrix,
        f: impl Fn(Real, Real) -> Real,
    ) -> Result<RealMatrix> {
        self.check_same_shape(operation, other)?;
        let (rows, cols) = self.shape();
        let data = self.data.zip_new(operation, &other.data, f)?;
        Ok(Self::wire(data, rows, cols))
    }

    fn map_new(&self, f: impl Fn(Real) -> Real) -> RealMatrix {
        let (rows, cols) = self.shape();
        Self::wire(self.data.map_new(f), rows, cols)
    }

    /// Element-wise `self += other`, skipping steady cells.
    ///
    /// # Errors
    ///
    /// In checked builds, `IncompatibleMatrices` if the shapes differ.
    pub fn add_mat(&mut self, other: &RealMatrix) -> Result<&mut Self> {
        self.zip_in_place("add", other, |a, b| a + b)
    }

    /// Element-wise `self -= other`, skipping steady cells.
    pub fn sub_mat(&mut self, other: &RealMatrix) -> Result<&mut Self> {
        self.zip_in_place("sub", other, |a, b| a - b)
    }

    /// Element-wise (Hadamard) `self *= other`, skipping steady cells.
    pub fn mul_elem(&mut self, other: &RealMatrix) -> Result<&mut Self> {
        self.zip_in_place("mul_elem", other, |a, b| a * b)
    }

    /// Element-wise `self /= other`, skipping steady cells.
    pub fn div_mat(&mut self, other: &RealMatrix) -> Result<&mut Self> {
        self.zip_in_place("div", other, |a, b| a / b)
    }

    pub fn add_scalar(&mut self, value: Real) -> &mut Self {
        self.data.add_scalar(value);
        self
    }

    pub fn sub_scalar(&mut self, value: Real) -> &mut Self {
        self.data.sub_scalar(value);
        self
    }

    pub fn mul_scalar(&mut self, value: Real) -> &mut Self {
        self.data.mul_scalar(value);
        self
    }

    pub fn div_scalar(&mut self, value: Real) -> &mut Self {
        self.data.div_scalar(value);
        self
    }

    /// Matrix product `self * right` as a new `rows x right.cols` matrix.
    ///
    /// Naive row-major triple loop.
    ///
    /// # Errors
    ///
    /// In checked builds, `IncompatibleMatrices` unless
    /// `self.cols() == right.rows()`.
    ///
    /// # Examples
    ///
    /// ```
    /// use nnfw::RealMatrix;
    ///
    /// let a = RealMatrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
    /// let b = RealMatrix::from_rows(&[vec![0.0, 1.0], vec![1.0, 0.0]]).unwrap();
    /// let c = a.matmul(&b).unwrap();
    /// assert_eq!(c.to_rows(), vec![vec![2.0, 1.0], vec![4.0, 3.0]]);
    /// ```
    pub fn matmul(&self, right: &RealMatrix) -> Result<RealMatrix> {
        let (rows, lhs_cols) = self.shape();
        let (rhs_rows, cols) = right.shape();
        validation::check_shape("matmul", (lhs_cols, cols), (rhs_rows, cols))?;

        let inner = lhs_cols.min(rhs_rows);
        let (lhs, rhs) = (self.data.cells(), right.data.cells());
        let mut values = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                let mut acc = 0.0;
                for k in 0..inner {
                    acc += lhs.get(r * lhs_cols + k) * rhs.get(k * cols + c);
                }
                values.push(acc);
            }
        }
        Ok(Self::wire(RealVector::from(values), rows, cols))
    }

    /// `self = self * right`.
    ///
    /// When the product keeps this matrix's shape its values are copied in
    /// (steady cells are kept); otherwise the matrix is rebound to the
    /// product, which internal and view matrices refuse.
    pub fn matmul_assign(&mut self, right: &RealMatrix) -> Result<&mut Self> {
        let product = self.matmul(right)?;
        if product.shape() == self.shape() {
            self.copy_values(&product);
        } else {
            self.assign(&product)?;
        }
        Ok(self)
    }
}

// =============================================================================
// Row and Column Handles
// =============================================================================

/// Mutable handle on one row or column of a [`RealMatrix`].
///
/// Reads go through `Deref<Target = RealVector>`. Writes are limited to the
/// elements themselves (values, pins, copies and in-place arithmetic), so the
/// line keeps its length and stays wired into the matrix.
///
/// # Examples
///
/// ```
/// use nnfw::{RealMatrix, RealVector};
///
/// let mut m = RealMatrix::new(2, 3);
/// m.row_mut(1)
///     .copy_values(&RealVector::from_slice(&[1.0, 2.0, 3.0]))
///     .unwrap()
///     .mul_scalar(2.0);
/// assert_eq!(m.column(2).to_vec(), vec![0.0, 6.0]);
/// ```
///
/// The line itself can't be replaced:
///
/// ```compile_fail
/// use nnfw::{RealMatrix, RealVector};
///
/// let mut m = RealMatrix::new(2, 2);
/// *m.row_mut(0) = RealVector::zeros(5);
/// ```
pub struct LineMut<'a> {
    line: &'a mut RealVector,
}

impl LineMut<'_> {
    /// Write `value` at `index` unless the element is steady.
    pub fn set(&mut self, index: usize, value: Real) {
        self.line.set(index, value);
    }

    pub fn cell_mut(&mut self, index: usize) -> CellMut<'_> {
        self.line.cell_mut(index)
    }

    pub fn steady(&mut self, index: usize) {
        self.line.steady(index);
    }

    pub fn unsteady(&mut self, index: usize) {
        self.line.unsteady(index);
    }

    pub fn set_all(&mut self, value: Real) -> &mut Self {
        self.line.set_all(value);
        self
    }

    pub fn zeroing(&mut self) -> &mut Self {
        self.line.zeroing();
        self
    }

    pub fn randomize<R: Rng>(&mut self, rng: &mut R, min: Real, max: Real) -> &mut Self {
        self.line.randomize(rng, min, max);
        self
    }

    /// See [`RealVector::copy_values`].
    pub fn copy_values(&mut self, source: &RealVector) -> Result<&mut Self> {
        self.line.copy_values(source)?;
        Ok(self)
    }

    pub fn copy_values_offset(
        &mut self,
        source: &RealVector,
        source_offset: usize,
        this_offset: usize,
    ) -> &mut Self {
        self.line.copy_values_offset(source, source_offset, this_offset);
        self
    }

    pub fn copy_values_strided(
        &mut self,
        source: &RealVector,
        source_offset: usize,
        this_offset: usize,
        stride: usize,
    ) -> &mut Self {
        self.line
            .copy_values_strided(source, source_offset, this_offset, stride);
        self
    }

    pub fn add_vec(&mut self, other: &RealVector) -> Result<&mut Self> {
        self.line.add_vec(other)?;
        Ok(self)
    }

    pub fn sub_vec(&mut self, other: &RealVector) -> Result<&mut Self> {
        self.line.sub_vec(other)?;
        Ok(self)
    }

    pub fn mul_vec(&mut self, other: &RealVector) -> Result<&mut Self> {
        self.line.mul_vec(other)?;
        Ok(self)
    }

    pub fn div_vec(&mut self, other: &RealVector) -> Result<&mut Self> {
        self.line.div_vec(other)?;
        Ok(self)
    }

    pub fn add_scalar(&mut self, value: Real) -> &mut Self {
        self.line.add_scalar(value);
        self
    }

    pub fn sub_scalar(&mut self, value: Real) -> &mut Self {
        self.line.sub_scalar(value);
        self
    }

    pub fn mul_scalar(&mut self, value: Real) -> &mut Self {
        self.line.mul_scalar(value);
        self
    }

    pub fn div_scalar(&mut self, value: Real) -> &mut Self {
        self.line.div_scalar(value);
        self
    }

    pub fn square(&mut self) -> &mut Self {
        self.line.square();
        self
    }

    pub fn exp(&mut self) -> &mut Self {
        self.line.exp();
        self
    }

    pub fn inv(&mut self) -> &mut Self {
        self.line.inv();
        self
    }
}

impl Deref for LineMut<'_> {
    type Target = RealVector;

    fn deref(&self) -> &RealVector {
        self.line
    }
}

impl fmt::Debug for LineMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.line, f)
    }
}

// =============================================================================
// Standard Traits
// =============================================================================

impl Default for RealMatrix {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl Clone for RealMatrix {
    /// Shares the buffer (copy-on-write); a view matrix is copied deeply.
    fn clone(&self) -> Self {
        let (rows, cols) = self.shape();
        Self::wire(self.data.clone(), rows, cols)
    }
}

impl PartialEq for RealMatrix {
    fn eq(&self, other: &Self) -> bool {
        self.shape() == other.shape() && self.data == other.data
    }
}

impl fmt::Debug for RealMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (rows, cols) = self.shape();
        f.debug_struct("RealMatrix")
            .field("rows", &rows)
            .field("cols", &cols)
            .field("values", &self.to_rows())
            .field("view", &self.is_view())
            .field("internal", &self.internal)
            .finish()
    }
}

impl fmt::Display for RealMatrix {
    /// One line per row, whitespace-separated values.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.row_views[..self.rows()].iter().join("\n"))
    }
}

impl FromStr for RealMatrix {
    type Err = NnfwError;

    fn from_str(s: &str) -> Result<Self> {
        let rows = s
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.parse::<RealVector>().map(|row| row.to_vec()))
            .collect::<Result<Vec<_>>>()?;
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != cols) {
            return Err(NnfwError::DimensionMismatch {
                rows: rows.len(),
                cols,
                length: rows.iter().map(Vec::len).sum(),
            });
        }
        Self::from_rows(&rows)
    }
}

/// Serialized form: shape, row-major values and steady cells.
#[derive(Serialize, Deserialize)]
struct MatrixRepr {
    rows: usize,
    cols: usize,
    values: Vec<Real>,
    #[serde(default)]
    steady: Vec<(usize, usize)>,
}

impl From<RealMatrix> for MatrixRepr {
    fn from(matrix: RealMatrix) -> Self {
        let (rows, cols) = matrix.shape();
        MatrixRepr {
            rows,
            cols,
            values: matrix.to_vec(),
            steady: matrix
                .data
                .steady_indices()
                .into_iter()
                .map(|i| (i / cols, i % cols))
                .collect(),
        }
    }
}

impl TryFrom<MatrixRepr> for RealMatrix {
    type Error = NnfwError;

    fn try_from(repr: MatrixRepr) -> Result<Self> {
        let mut matrix = RealMatrix::from_vec(repr.rows, repr.cols, repr.values)?;
        for (row, col) in repr.steady {
            validation::check_index(row, matrix.n_rows)?;
            validation::check_index(col, matrix.n_cols)?;
            matrix.steady(row, col);
        }
        Ok(matrix)
    }
}

// =============================================================================
// Operators
// =============================================================================

macro_rules! impl_matrix_op {
    (
        $Op:ident, $op:ident, $OpAssign:ident, $op_assign:ident,
        $named:ident, $label:literal, |$a:ident, $b:ident| $body:expr
    ) => {
        impl $Op<&RealMatrix> for &RealMatrix {
            type Output = RealMatrix;

            fn $op(self, rhs: &RealMatrix) -> RealMatrix {
                self.zip_new($label, rhs, |$a, $b| $body)
                    .unwrap_or_else(|err| panic!("{}", err))
            }
        }

        impl $Op<&RealMatrix> for RealMatrix {
            type Output = RealMatrix;

            /// Reuses the left operand's buffer when it is free-standing.
            fn $op(mut self, rhs: &RealMatrix) -> RealMatrix {
                if !self.is_scratch() {
                    return <&RealMatrix as $Op<&RealMatrix>>::$op(&self, rhs);
                }
                if let Err(err) = self.zip_overwrite($label, rhs, |$a, $b| $body) {
                    panic!("{}", err);
                }
                self
            }
        }

        impl $Op<RealMatrix> for RealMatrix {
            type Output = RealMatrix;

            fn $op(self, rhs: RealMatrix) -> RealMatrix {
                <RealMatrix as $Op<&RealMatrix>>::$op(self, &rhs)
            }
        }

        impl $Op<RealMatrix> for &RealMatrix {
            type Output = RealMatrix;

            fn $op(self, rhs: RealMatrix) -> RealMatrix {
                <&RealMatrix as $Op<&RealMatrix>>::$op(self, &rhs)
            }
        }

        impl $OpAssign<&RealMatrix> for RealMatrix {
            fn $op_assign(&mut self, rhs: &RealMatrix) {
                if let Err(err) = self.$named(rhs) {
                    panic!("{}", err);
                }
            }
        }
    };
}

macro_rules! impl_matrix_scalar_op {
    ($Op:ident, $op:ident, $OpAssign:ident, $op_assign:ident, $named:ident, |$a:ident, $b:ident| $body:expr) => {
        impl $Op<Real> for &RealMatrix {
            type Output = RealMatrix;

            fn $op(self, rhs: Real) -> RealMatrix {
                self.map_new(|$a| {
                    let $b = rhs;
                    $body
                })
            }
        }

        impl $Op<Real> for RealMatrix {
            type Output = RealMatrix;

            fn $op(mut self, rhs: Real) -> RealMatrix {
                if !self.is_scratch() {
                    return <&RealMatrix as $Op<Real>>::$op(&self, rhs);
                }
                self.data.map_overwrite(|$a| {
                    let $b = rhs;
                    $body
                });
                self
            }
        }

        impl $OpAssign<Real> for RealMatrix {
            fn $op_assign(&mut self, rhs: Real) {
                self.$named(rhs);
            }
        }
    };
}

impl_matrix_op!(Add, add, AddAssign, add_assign, add_mat, "add", |a, b| a + b);
impl_matrix_op!(Sub, sub, SubAssign, sub_assign, sub_mat, "sub", |a, b| a - b);
impl_matrix_op!(Rem, rem, RemAssign, rem_assign, mul_elem, "mul_elem", |a, b| a * b);
impl_matrix_op!(Div, div, DivAssign, div_assign, div_mat, "div", |a, b| a / b);

impl_matrix_scalar_op!(Add, add, AddAssign, add_assign, add_scalar, |a, b| a + b);
impl_matrix_scalar_op!(Sub, sub, SubAssign, sub_assign, sub_scalar, |a, b| a - b);
impl_matrix_scalar_op!(Mul, mul, MulAssign, mul_assign, mul_scalar, |a, b| a * b);
impl_matrix_scalar_op!(Div, div, DivAssign, div_assign, div_scalar, |a, b| a / b);

impl Mul<&RealMatrix> for &RealMatrix {
    type Output = RealMatrix;

    /// Matrix product.
    fn mul(self, rhs: &RealMatrix) -> RealMatrix {
        self.matmul(rhs).unwrap_or_else(|err| panic!("{}", err))
    }
}

impl Mul<&RealMatrix> for RealMatrix {
    type Output = RealMatrix;

    fn mul(self, rhs: &RealMatrix) -> RealMatrix {
        &self * rhs
    }
}

impl Mul<RealMatrix> for RealMatrix {
    type Output = RealMatrix;

    fn mul(self, rhs: RealMatrix) -> RealMatrix {
        &self * &rhs
    }
}

impl MulAssign<&RealMatrix> for RealMatrix {
    fn mul_assign(&mut self, rhs: &RealMatrix) {
        if let Err(err) = self.matmul_assign(rhs) {
            panic!("{}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_wires_views() {
        let m = RealMatrix::new(3, 2);
        assert_eq!(m.shape(), (3, 2));
        assert_eq!(m.row(0).len(), 2);
        assert_eq!(m.column(1).len(), 3);
        assert!(m.row(2).is_internal());
        assert!(m.column(0).is_view());
    }

    #[test]
    fn test_column_view_stride() {
        let mut m = RealMatrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        assert_eq!(m.column(1).to_vec(), vec![2.0, 4.0, 6.0]);
        m.column_mut(0).set(2, 50.0);
        assert_eq!(m.get(2, 0), 50.0);
        assert_eq!(m.row(2).to_vec(), vec![50.0, 6.0]);
    }

    #[test]
    fn test_row_views_denied_structure() {
        let mut m = RealMatrix::new(2, 2);
        let other = RealVector::zeros(2);
        assert!(m.row_views[0].resize(5).is_err());
        assert!(m.row_views[0].assign(&other).is_err());
        assert!(m.col_views[0].convert_to_view(&other, 0, 1).is_err());
        assert_eq!(m.row_mut(0).len(), 2);
    }

    #[test]
    fn test_scratch_counts_wired_views() {
        let m = RealMatrix::new(2, 3);
        assert!(m.is_scratch());
        let w = RealVector::view_of(m.column(0), 0, 1).unwrap();
        assert!(!m.is_scratch());
        drop(w);
        assert!(m.is_scratch());
    }

    #[test]
    fn test_clone_detaches_on_write() {
        let a = RealMatrix::identity(2);
        let mut b = a.clone();
        assert!(a.shares_storage_with(&b));
        b.row_mut(0).set(1, 7.0);
        assert!(!a.shares_storage_with(&b));
        assert_eq!(a.get(0, 1), 0.0);
        assert_eq!(b.get(0, 1), 7.0);
    }

    #[test]
    fn test_matmul_assign_square() {
        let mut m = RealMatrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let id = RealMatrix::identity(2);
        m *= &id;
        assert_eq!(m.to_rows(), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn test_display_round_trip() {
        let m = RealMatrix::from_rows(&[vec![1.0, 2.5], vec![-3.0, 4.0]]).unwrap();
        let text = m.to_string();
        assert_eq!(text, "1 2.5\n-3 4");
        let parsed: RealMatrix = text.parse().unwrap();
        assert_eq!(parsed, m);
        assert!("1 2\n3".parse::<RealMatrix>().is_err());
    }
}
