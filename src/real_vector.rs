//! RealVector - copy-on-write vector of pinnable real numbers.
//!
//! `RealVector` is the storage type behind neuron inputs/outputs and the rows
//! and columns of [`RealMatrix`](crate::RealMatrix).
//!
//! # Sharing model
//!
//! - **Owner**: holds a reference-counted buffer. `clone()` is O(1) and
//!   shares the buffer; the first mutation through either copy detaches it
//!   (deep copy) so the other copy never observes the change.
//! - **View**: aliases a window of another vector's buffer. Writes through a
//!   view land in the source and vice versa. Views can't resize or be
//!   rebound. Cloning a view yields an independent owner of the viewed
//!   values.
//! - **Internal**: an owner or view embedded in another structure (the flat
//!   data and row/column views of a matrix, the buffers of a cluster). Resize
//!   and rebinding are denied so the owning structure's layout can't be
//!   corrupted.
//!
//! Chained expressions reuse buffers through ownership: an operator whose
//! left operand is an owned, free-standing vector writes its result in place
//! instead of allocating, so `&a + &b - &c` allocates once.
//!
//! # Pinning
//!
//! Every element is a [`PinnableCell`]. A *steady* (pinned) element silently
//! ignores writes from indexed assignment, arithmetic, `set_all`, `zeroing`
//! and `copy_values*`. Results of non-mutating operators are always fresh,
//! unpinned vectors.
//!
//! # Examples
//!
//! ```
//! use nnfw::RealVector;
//!
//! let b = RealVector::from_slice(&[1.0, 2.0, 3.0]);
//! let mut a = b.clone();
//! a.set(0, 9.0);
//! assert_eq!(b.get(0), 1.0);
//! assert_eq!(a.get(0), 9.0);
//!
//! a.steady(1);
//! a.set(1, 100.0);
//! assert_eq!(a.get(1), 2.0);
//! ```

use std::cell::{Ref, RefMut};
use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};
use std::rc::Rc;
use std::str::FromStr;

use itertools::Itertools;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cell::{PinnableCell, Real};
use crate::error::{NnfwError, Result};
use crate::storage::{self, Anchor, Buffer, Rebase, ViewWindow, Window};
use crate::validation;

/// Copy-on-write cell buffer shared between owners.
pub(crate) type CowCells = Rc<Vec<PinnableCell>>;

/// Resizable, reference-counted, copy-on-write vector of real numbers.
#[derive(Serialize, Deserialize)]
#[serde(try_from = "VectorRepr", into = "VectorRepr")]
pub struct RealVector {
    /// Buffer anchor (own for owners, the source's for views)
    anchor: Anchor<CowCells>,
    /// Window into the source buffer; `None` for owners
    view: Option<ViewWindow>,
    /// Embedded in another structure: no resize, no rebinding
    internal: bool,
}

// =============================================================================
// Buffer Access
// =============================================================================

/// Read guard over the elements of a vector.
pub(crate) struct Cells<'a> {
    cells: Ref<'a, [PinnableCell]>,
    window: Window,
}

impl Cells<'_> {
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.window.len
    }

    #[inline(always)]
    pub fn cell(&self, i: usize) -> &PinnableCell {
        &self.cells[self.window.slot(i)]
    }

    #[inline(always)]
    pub fn get(&self, i: usize) -> Real {
        self.cell(i).read()
    }
}

/// Write guard over the elements of a vector (buffer already detached).
pub(crate) struct CellsMut<'a> {
    cells: RefMut<'a, [PinnableCell]>,
    window: Window,
}

impl CellsMut<'_> {
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.window.len
    }

    #[inline(always)]
    pub fn get(&self, i: usize) -> Real {
        self.cells[self.window.slot(i)].read()
    }

    #[inline(always)]
    pub fn cell_mut(&mut self, i: usize) -> &mut PinnableCell {
        &mut self.cells[self.window.slot(i)]
    }

    /// Pin-honoring write.
    #[inline(always)]
    pub fn write(&mut self, i: usize, value: Real) {
        self.cell_mut(i).write(value);
    }

    /// Overwrite with a fresh free cell (scratch results only).
    #[inline(always)]
    pub fn put(&mut self, i: usize, value: Real) {
        *self.cell_mut(i) = PinnableCell::new(value);
    }
}

/// Operand values for a write into another vector.
///
/// Borrowed live unless the operand aliases the destination's buffer, in
/// which case it is snapshotted first.
pub(crate) enum Source<'a> {
    Live(Cells<'a>),
    Snapshot(Vec<Real>),
}

impl Source<'_> {
    #[inline(always)]
    pub fn len(&self) -> usize {
        match self {
            Source::Live(cells) => cells.len(),
            Source::Snapshot(values) => values.len(),
        }
    }

    #[inline(always)]
    pub fn get(&self, i: usize) -> Real {
        match self {
            Source::Live(cells) => cells.get(i),
            Source::Snapshot(values) => values[i],
        }
    }
}

impl RealVector {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Create an empty vector.
    pub fn new() -> Self {
        Self::from_cells(Vec::new())
    }

    /// Create a vector of `n` zeros.
    ///
    /// # Examples
    ///
    /// ```
    /// use nnfw::RealVector;
    ///
    /// let v = RealVector::zeros(4);
    /// assert_eq!(v.len(), 4);
    /// assert_eq!(v.sum(), 0.0);
    /// ```
    pub fn zeros(n: usize) -> Self {
        Self::from_cells(vec![PinnableCell::default(); n])
    }

    /// Create a vector of `n` copies of `value`.
    pub fn from_elem(n: usize, value: Real) -> Self {
        Self::from_cells(vec![PinnableCell::new(value); n])
    }

    /// Create a vector holding a copy of `values`.
    pub fn from_slice(values: &[Real]) -> Self {
        Self::from_cells(values.iter().copied().map(PinnableCell::new).collect())
    }

    pub(crate) fn from_cells(cells: Vec<PinnableCell>) -> Self {
        Self::from_payload(Rc::new(cells))
    }

    fn from_payload(payload: CowCells) -> Self {
        Self {
            anchor: storage::anchor(payload),
            view: None,
            internal: false,
        }
    }

    /// Create a view aliasing elements `[start, end)` of `source`.
    ///
    /// Writes through the view modify `source` and vice versa. If `source`
    /// later shrinks below the window, the view re-bases to the full source
    /// range; if `source` is dropped, the view becomes empty.
    ///
    /// # Errors
    ///
    /// In checked builds, `IndexOutOfBounds` if the range doesn't lie within
    /// `source`.
    ///
    /// # Examples
    ///
    /// ```
    /// use nnfw::RealVector;
    ///
    /// let mut v = RealVector::from_slice(&[0.0, 1.0, 2.0, 3.0]);
    /// let mut w = RealVector::view_of(&v, 1, 3).unwrap();
    /// w.set(0, 10.0);
    /// assert_eq!(v.get(1), 10.0);
    ///
    /// v.set(2, 20.0);
    /// assert_eq!(w.get(1), 20.0);
    /// ```
    pub fn view_of(source: &RealVector, start: usize, end: usize) -> Result<Self> {
        validation::check_range(start, end, source.len())?;
        Ok(Self::window_of(source, start, end.saturating_sub(start), 1))
    }

    /// View of `len` elements of `source` starting at `offset`, stepping by
    /// `stride`. No range validation.
    pub(crate) fn window_of(source: &RealVector, offset: usize, len: usize, stride: usize) -> Self {
        Self::window_with(source, offset, len, stride, Rebase::Full)
    }

    /// Like `window_of`, but the view empties instead of re-basing to the
    /// full source range once it goes stale.
    pub(crate) fn collapsing_window_of(source: &RealVector, offset: usize, len: usize) -> Self {
        Self::window_with(source, offset, len, 1, Rebase::Empty)
    }

    fn window_with(
        source: &RealVector,
        offset: usize,
        len: usize,
        stride: usize,
        rebase: Rebase,
    ) -> Self {
        let window = source.window().sub(offset, len, stride);
        let generation = source.anchor.generation();
        Self {
            anchor: Rc::clone(&source.anchor),
            view: Some(ViewWindow::with_rebase(window, generation, rebase)),
            internal: false,
        }
    }

    /// Mark this vector as embedded in another structure.
    ///
    /// Internal vectors refuse `resize`, `assign` and `convert_to_view`. The
    /// flag is one-way.
    pub fn into_internal(mut self) -> Self {
        self.internal = true;
        self
    }

    // =========================================================================
    // Queries
    // =========================================================================

    #[inline]
    fn window_for(&self, slots: usize) -> Window {
        match &self.view {
            None => Window::full(slots),
            Some(view) => view.resolve(slots, self.anchor.generation()),
        }
    }

    #[inline]
    fn window(&self) -> Window {
        let slots = self.anchor.borrow().slots();
        self.window_for(slots)
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.window().len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Does this vector alias another vector's buffer?
    #[inline]
    pub fn is_view(&self) -> bool {
        self.view.is_some()
    }

    #[inline]
    pub fn is_internal(&self) -> bool {
        self.internal
    }

    /// Do both vectors currently read from the same buffer?
    ///
    /// True for copy-on-write copies that haven't detached yet and for a view
    /// and its source.
    pub fn shares_storage_with(&self, other: &RealVector) -> bool {
        Rc::ptr_eq(&*self.anchor.borrow(), &*other.anchor.borrow())
    }

    #[inline]
    pub(crate) fn same_anchor(&self, other: &RealVector) -> bool {
        Rc::ptr_eq(&self.anchor, &other.anchor)
    }

    /// Free-standing owner with no views, whose buffer may be recycled for a
    /// result.
    #[inline]
    pub(crate) fn is_scratch(&self) -> bool {
        self.view.is_none() && !self.internal && self.anchor_handles() == 1
    }

    /// Number of vectors (this one included) holding this vector's anchor.
    #[inline]
    pub(crate) fn anchor_handles(&self) -> usize {
        Rc::strong_count(&self.anchor)
    }

    /// Invalidate the windows of every view into this vector's buffer.
    pub(crate) fn relayout(&self) {
        self.anchor.relayout();
    }

    // =========================================================================
    // Buffer Plumbing
    // =========================================================================

    pub(crate) fn cells(&self) -> Cells<'_> {
        let guard = self.anchor.borrow();
        let window = self.window_for(guard.slots());
        Cells {
            cells: Ref::map(guard, |payload| payload.as_slice()),
            window,
        }
    }

    /// Mutable access, detaching a shared buffer first.
    pub(crate) fn cells_mut(&mut self) -> CellsMut<'_> {
        let guard = self.anchor.borrow_mut();
        let window = self.window_for(guard.slots());
        if Rc::strong_count(&*guard) > 1 {
            log::trace!("detaching shared buffer of {} elements", guard.len());
        }
        CellsMut {
            cells: RefMut::map(guard, |payload| Rc::make_mut(payload).as_mut_slice()),
            window,
        }
    }

    /// Read `self` as an operand for a write into `writer`.
    pub(crate) fn read_for<'a>(&'a self, writer: &RealVector) -> Source<'a> {
        if self.same_anchor(writer) {
            Source::Snapshot(self.to_vec())
        } else {
            Source::Live(self.cells())
        }
    }

    /// Buffer to share with a new owner: the buffer itself for owners, a
    /// fresh copy of the window for views.
    pub(crate) fn shared_payload(&self) -> CowCells {
        match self.view {
            None => Rc::clone(&self.anchor.borrow()),
            Some(_) => Rc::new(self.to_cells()),
        }
    }

    /// Swap the buffer behind this vector's anchor. Views re-base lazily.
    pub(crate) fn set_payload(&self, payload: CowCells) {
        *self.anchor.borrow_mut() = payload;
    }

    pub(crate) fn to_cells(&self) -> Vec<PinnableCell> {
        let cells = self.cells();
        (0..cells.len()).map(|i| *cells.cell(i)).collect()
    }

    fn deny_structural(&self, operation: &'static str) -> Result<()> {
        if self.internal {
            return Err(NnfwError::StructuralMutationDenied {
                operation,
                reason: "vector is internal",
            });
        }
        if self.view.is_some() {
            return Err(NnfwError::StructuralMutationDenied {
                operation,
                reason: "vector is a view",
            });
        }
        Ok(())
    }

    // =========================================================================
    // Element Access
    // =========================================================================

    /// Value at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    #[inline]
    pub fn get(&self, index: usize) -> Real {
        let cells = self.cells();
        assert!(
            index < cells.len(),
            "index {} out of bounds (length: {})",
            index,
            cells.len()
        );
        cells.get(index)
    }

    /// Write `value` at `index` (no effect if the element is steady).
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    #[inline]
    pub fn set(&mut self, index: usize, value: Real) {
        let len = self.len();
        assert!(index < len, "index {} out of bounds (length: {})", index, len);
        self.cells_mut().write(index, value);
    }

    /// Value at `index`, or `IndexOutOfBounds`.
    pub fn at(&self, index: usize) -> Result<Real> {
        let cells = self.cells();
        validation::check_index(index, cells.len())?;
        Ok(cells.get(index))
    }

    /// Copy of the cell (value and pin state) at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn cell(&self, index: usize) -> PinnableCell {
        let cells = self.cells();
        assert!(
            index < cells.len(),
            "index {} out of bounds (length: {})",
            index,
            cells.len()
        );
        *cells.cell(index)
    }

    /// Proxy for reading, writing and pinning the element at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn cell_mut(&mut self, index: usize) -> CellMut<'_> {
        let len = self.len();
        assert!(index < len, "index {} out of bounds (length: {})", index, len);
        CellMut {
            vector: self,
            index,
        }
    }

    /// Proxy for the element at `index`, or `IndexOutOfBounds`.
    pub fn at_mut(&mut self, index: usize) -> Result<CellMut<'_>> {
        validation::check_index(index, self.len())?;
        Ok(CellMut {
            vector: self,
            index,
        })
    }

    /// Iterate over the element values.
    ///
    /// # Panics
    ///
    /// Writing to the same buffer through another handle while the iterator
    /// is alive panics (the buffer is borrowed).
    pub fn iter(&self) -> impl Iterator<Item = Real> + '_ {
        let cells = self.cells();
        (0..cells.len()).map(move |i| cells.get(i))
    }

    /// Copy the element values out.
    pub fn to_vec(&self) -> Vec<Real> {
        self.iter().collect()
    }

    // =========================================================================
    // Structural Operations
    // =========================================================================

    /// Resize to `n` elements.
    ///
    /// The first `min(len, n)` elements (and their pin state) are kept and new
    /// elements are zero. Views of this vector whose window no longer fits
    /// re-base on their next access.
    ///
    /// # Errors
    ///
    /// `StructuralMutationDenied` if the vector is internal or a view.
    ///
    /// # Examples
    ///
    /// ```
    /// use nnfw::RealVector;
    ///
    /// let mut v = RealVector::from_slice(&[1.0, 2.0, 3.0]);
    /// v.resize(5).unwrap();
    /// assert_eq!(v.to_vec(), vec![1.0, 2.0, 3.0, 0.0, 0.0]);
    /// ```
    pub fn resize(&mut self, n: usize) -> Result<()> {
        self.deny_structural("resize")?;
        let mut payload = self.anchor.borrow_mut();
        log::trace!("resizing vector from {} to {} elements", payload.len(), n);
        Rc::make_mut(&mut *payload).resize(n, PinnableCell::default());
        Ok(())
    }

    /// Rebind this vector to `source`'s storage (whole-vector assignment).
    ///
    /// Afterwards both share one buffer until either is written. Pin state
    /// comes along with the values. If `source` is a view, this vector gets a
    /// fresh copy of the viewed elements instead.
    ///
    /// # Errors
    ///
    /// `StructuralMutationDenied` if this vector is internal or a view.
    pub fn assign(&mut self, source: &RealVector) -> Result<()> {
        self.deny_structural("assign")?;
        let payload = source.shared_payload();
        self.set_payload(payload);
        Ok(())
    }

    /// Turn this vector into a view of elements `[start, end)` of `source`.
    ///
    /// If this vector was an owner, its own buffer is released and any views
    /// of it become empty.
    ///
    /// # Errors
    ///
    /// `StructuralMutationDenied` if the vector is internal; in checked
    /// builds, `IndexOutOfBounds` for a range outside `source`.
    pub fn convert_to_view(&mut self, source: &RealVector, start: usize, end: usize) -> Result<()> {
        if self.internal {
            return Err(NnfwError::StructuralMutationDenied {
                operation: "convert_to_view",
                reason: "vector is internal",
            });
        }
        validation::check_range(start, end, source.len())?;

        let window = source.window().sub(start, end.saturating_sub(start), 1);
        let anchor = Rc::clone(&source.anchor);
        if self.view.is_none() && !Rc::ptr_eq(&self.anchor, &anchor) {
            storage::release(&self.anchor);
        }
        let generation = anchor.generation();
        self.anchor = anchor;
        self.view = Some(ViewWindow::new(window, generation));
        Ok(())
    }

    // =========================================================================
    // Pinning
    // =========================================================================

    /// Pin the element at `index`: later writes are ignored.
    pub fn steady(&mut self, index: usize) {
        let len = self.len();
        assert!(index < len, "index {} out of bounds (length: {})", index, len);
        self.cells_mut().cell_mut(index).pin();
    }

    /// Unpin the element at `index`.
    pub fn unsteady(&mut self, index: usize) {
        let len = self.len();
        assert!(index < len, "index {} out of bounds (length: {})", index, len);
        self.cells_mut().cell_mut(index).unpin();
    }

    pub fn is_steady(&self, index: usize) -> bool {
        self.cell(index).is_pinned()
    }

    /// Indices of all steady elements, ascending.
    pub fn steady_indices(&self) -> Vec<usize> {
        let cells = self.cells();
        (0..cells.len()).filter(|&i| cells.cell(i).is_pinned()).collect()
    }

    // =========================================================================
    // Bulk Writes
    // =========================================================================

    /// Set every free element to `value`.
    pub fn set_all(&mut self, value: Real) -> &mut Self {
        self.map_in_place(|_| value);
        self
    }

    /// Set every free element to zero.
    pub fn zeroing(&mut self) -> &mut Self {
        self.set_all(0.0)
    }

    /// Fill free elements with values drawn uniformly from `[min, max]`.
    pub fn randomize<R: Rng>(&mut self, rng: &mut R, min: Real, max: Real) -> &mut Self {
        debug_assert!(min <= max, "min {} > max {}", min, max);
        {
            let mut cells = self.cells_mut();
            for i in 0..cells.len() {
                cells.write(i, rng.gen_range(min..=max));
            }
        }
        self
    }

    /// Copy `source`'s values element by element, skipping steady elements.
    ///
    /// Unlike [`assign`](Self::assign) this never changes which buffer the
    /// vector uses, so it works on views and internal vectors.
    ///
    /// # Errors
    ///
    /// In checked builds, `IncompatibleVectors` if the lengths differ.
    pub fn copy_values(&mut self, source: &RealVector) -> Result<&mut Self> {
        validation::check_len("copy_values", self.len(), source.len())?;
        Ok(self.copy_values_strided(source, 0, 0, 1))
    }

    /// Copy `source[source_offset..]` into `self[this_offset..]`, clipped to
    /// whatever overlaps. Never fails.
    pub fn copy_values_offset(
        &mut self,
        source: &RealVector,
        source_offset: usize,
        this_offset: usize,
    ) -> &mut Self {
        self.copy_values_strided(source, source_offset, this_offset, 1)
    }

    /// Copy every `stride`-th element of `source` starting at `source_offset`
    /// into consecutive elements of `self` starting at `this_offset`.
    ///
    /// Clipped to the overlap; a `stride` of 0 copies nothing.
    ///
    /// # Examples
    ///
    /// ```
    /// use nnfw::RealVector;
    ///
    /// let src = RealVector::from_slice(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    /// let mut dst = RealVector::zeros(4);
    /// dst.copy_values_strided(&src, 1, 1, 2);
    /// assert_eq!(dst.to_vec(), vec![0.0, 1.0, 3.0, 5.0]);
    /// ```
    pub fn copy_values_strided(
        &mut self,
        source: &RealVector,
        source_offset: usize,
        this_offset: usize,
        stride: usize,
    ) -> &mut Self {
        if stride == 0 {
            return self;
        }
        {
            let src = source.read_for(self);
            let mut dst = self.cells_mut();
            let available = src.len().saturating_sub(source_offset).div_ceil(stride);
            let count = dst.len().saturating_sub(this_offset).min(available);
            for k in 0..count {
                dst.write(this_offset + k, src.get(source_offset + k * stride));
            }
        }
        self
    }

    // =========================================================================
    // Element-wise Kernels
    // =========================================================================

    fn map_in_place(&mut self, f: impl Fn(Real) -> Real) {
        let mut cells = self.cells_mut();
        for i in 0..cells.len() {
            let value = f(cells.get(i));
            cells.write(i, value);
        }
    }

    pub(crate) fn zip_in_place(
        &mut self,
        operation: &'static str,
        other: &RealVector,
        f: impl Fn(Real, Real) -> Real,
    ) -> Result<()> {
        validation::check_len(operation, self.len(), other.len())?;
        let rhs = other.read_for(self);
        let mut cells = self.cells_mut();
        for i in 0..cells.len().min(rhs.len()) {
            let value = f(cells.get(i), rhs.get(i));
            cells.write(i, value);
        }
        Ok(())
    }

    /// Like `zip_in_place` but ignores pins: used only on scratch results.
    pub(crate) fn zip_overwrite(
        &mut self,
        operation: &'static str,
        other: &RealVector,
        f: impl Fn(Real, Real) -> Real,
    ) -> Result<()> {
        validation::check_len(operation, self.len(), other.len())?;
        let rhs = other.read_for(self);
        let mut cells = self.cells_mut();
        for i in 0..cells.len().min(rhs.len()) {
            let value = f(cells.get(i), rhs.get(i));
            cells.put(i, value);
        }
        Ok(())
    }

    pub(crate) fn map_overwrite(&mut self, f: impl Fn(Real) -> Real) {
        let mut cells = self.cells_mut();
        for i in 0..cells.len() {
            let value = f(cells.get(i));
            cells.put(i, value);
        }
    }

    pub(crate) fn zip_new(
        &self,
        operation: &'static str,
        other: &RealVector,
        f: impl Fn(Real, Real) -> Real,
    ) -> Result<RealVector> {
        validation::check_len(operation, self.len(), other.len())?;
        let (lhs, rhs) = (self.cells(), other.cells());
        Ok((0..lhs.len().min(rhs.len()))
            .map(|i| f(lhs.get(i), rhs.get(i)))
            .collect())
    }

    pub(crate) fn map_new(&self, f: impl Fn(Real) -> Real) -> RealVector {
        self.iter().map(f).collect()
    }

    // =========================================================================
    // In-place Arithmetic
    // =========================================================================

    /// `self[i] += other[i]`, skipping steady elements.
    ///
    /// # Errors
    ///
    /// In checked builds, `IncompatibleVectors` if the lengths differ.
    pub fn add_vec(&mut self, other: &RealVector) -> Result<&mut Self> {
        self.zip_in_place("add", other, |a, b| a + b)?;
        Ok(self)
    }

    /// `self[i] -= other[i]`, skipping steady elements.
    pub fn sub_vec(&mut self, other: &RealVector) -> Result<&mut Self> {
        self.zip_in_place("sub", other, |a, b| a - b)?;
        Ok(self)
    }

    /// `self[i] *= other[i]`, skipping steady elements.
    pub fn mul_vec(&mut self, other: &RealVector) -> Result<&mut Self> {
        self.zip_in_place("mul", other, |a, b| a * b)?;
        Ok(self)
    }

    /// `self[i] /= other[i]`, skipping steady elements.
    pub fn div_vec(&mut self, other: &RealVector) -> Result<&mut Self> {
        self.zip_in_place("div", other, |a, b| a / b)?;
        Ok(self)
    }

    pub fn add_scalar(&mut self, value: Real) -> &mut Self {
        self.map_in_place(|a| a + value);
        self
    }

    pub fn sub_scalar(&mut self, value: Real) -> &mut Self {
        self.map_in_place(|a| a - value);
        self
    }

    pub fn mul_scalar(&mut self, value: Real) -> &mut Self {
        self.map_in_place(|a| a * value);
        self
    }

    pub fn div_scalar(&mut self, value: Real) -> &mut Self {
        self.map_in_place(|a| a / value);
        self
    }

    // =========================================================================
    // Reductions and Element-wise Functions
    // =========================================================================

    pub fn sum(&self) -> Real {
        self.iter().sum()
    }

    /// Arithmetic mean.
    ///
    /// The vector must not be empty; an empty vector yields NaN.
    pub fn mean(&self) -> Real {
        self.sum() / self.len() as Real
    }

    /// Index of the first maximum element (0 for an empty vector).
    pub fn max_index(&self) -> usize {
        let mut best = 0;
        let mut best_value = Real::NEG_INFINITY;
        for (i, value) in self.iter().enumerate() {
            if i == 0 || value > best_value {
                best = i;
                best_value = value;
            }
        }
        best
    }

    /// Square every free element in place.
    pub fn square(&mut self) -> &mut Self {
        self.map_in_place(|a| a * a);
        self
    }

    /// Replace every free element by its exponential.
    pub fn exp(&mut self) -> &mut Self {
        self.map_in_place(Real::exp);
        self
    }

    /// Replace every free element by its reciprocal.
    ///
    /// Zero elements become infinite; avoiding them is the caller's job.
    pub fn inv(&mut self) -> &mut Self {
        self.map_in_place(|a| 1.0 / a);
        self
    }

    /// Mean squared difference between `self` (the target) and `actual`.
    ///
    /// # Errors
    ///
    /// In checked builds, `IncompatibleVectors` if the lengths differ.
    pub fn mse(&self, actual: &RealVector) -> Result<Real> {
        validation::check_len("mse", self.len(), actual.len())?;
        let (target, actual) = (self.cells(), actual.cells());
        let n = target.len().min(actual.len());
        let sum: Real = (0..n)
            .map(|i| {
                let d = target.get(i) - actual.get(i);
                d * d
            })
            .sum();
        Ok(sum / n as Real)
    }
}

// =============================================================================
// Cell Proxy
// =============================================================================

/// Mutable handle on one element of a [`RealVector`].
///
/// # Examples
///
/// ```
/// use nnfw::RealVector;
///
/// let mut v = RealVector::zeros(3);
/// let mut cell = v.cell_mut(1);
/// cell.set(4.0);
/// cell.pin();
/// cell.set(5.0);
/// assert_eq!(cell.get(), 4.0);
/// assert!(v.is_steady(1));
/// ```
#[derive(Debug)]
pub struct CellMut<'a> {
    vector: &'a mut RealVector,
    index: usize,
}

impl CellMut<'_> {
    pub fn get(&self) -> Real {
        self.vector.get(self.index)
    }

    /// Write unless pinned.
    pub fn set(&mut self, value: Real) {
        self.vector.set(self.index, value);
    }

    pub fn pin(&mut self) {
        self.vector.steady(self.index);
    }

    pub fn unpin(&mut self) {
        self.vector.unsteady(self.index);
    }

    pub fn is_pinned(&self) -> bool {
        self.vector.is_steady(self.index)
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

// =============================================================================
// Standard Traits
// =============================================================================

impl Default for RealVector {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for RealVector {
    /// O(1) shared copy for owners; a deep copy of the window for views.
    /// The copy is never internal.
    fn clone(&self) -> Self {
        Self::from_payload(self.shared_payload())
    }
}

impl Drop for RealVector {
    fn drop(&mut self) {
        if self.view.is_none() {
            storage::release(&self.anchor);
        }
    }
}

impl PartialEq for RealVector {
    /// Value equality; pin state is ignored.
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl fmt::Debug for RealVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealVector")
            .field("values", &self.to_vec())
            .field("steady", &self.steady_indices())
            .field("view", &self.is_view())
            .field("internal", &self.internal)
            .finish()
    }
}

impl fmt::Display for RealVector {
    /// Whitespace-separated values.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.iter().join(" "))
    }
}

impl FromStr for RealVector {
    type Err = NnfwError;

    fn from_str(s: &str) -> Result<Self> {
        s.split_whitespace()
            .map(|token| {
                token
                    .parse::<Real>()
                    .map_err(|err| NnfwError::Parse(format!("'{}': {}", token, err)))
            })
            .collect()
    }
}

impl From<Vec<Real>> for RealVector {
    fn from(values: Vec<Real>) -> Self {
        Self::from_cells(values.into_iter().map(PinnableCell::new).collect())
    }
}

impl From<&[Real]> for RealVector {
    fn from(values: &[Real]) -> Self {
        Self::from_slice(values)
    }
}

impl FromIterator<Real> for RealVector {
    fn from_iter<I: IntoIterator<Item = Real>>(iter: I) -> Self {
        Self::from_cells(iter.into_iter().map(PinnableCell::new).collect())
    }
}

/// Serialized form: values plus the indices of steady elements.
#[derive(Serialize, Deserialize)]
struct VectorRepr {
    values: Vec<Real>,
    #[serde(default)]
    steady: Vec<usize>,
}

impl From<RealVector> for VectorRepr {
    fn from(vector: RealVector) -> Self {
        VectorRepr {
            values: vector.to_vec(),
            steady: vector.steady_indices(),
        }
    }
}

impl TryFrom<VectorRepr> for RealVector {
    type Error = NnfwError;

    fn try_from(repr: VectorRepr) -> Result<Self> {
        let mut cells: Vec<PinnableCell> = repr.values.into_iter().map(PinnableCell::new).collect();
        for &index in &repr.steady {
            validation::check_index(index, cells.len())?;
            cells[index].pin();
        }
        Ok(Self::from_cells(cells))
    }
}

// =============================================================================
// Operators
// =============================================================================

macro_rules! impl_vector_op {
    (
        $Op:ident, $op:ident, $OpAssign:ident, $op_assign:ident,
        $named:ident, $named_scalar:ident, $label:literal,
        |$a:ident, $b:ident| $body:expr
    ) => {
        impl $Op<&RealVector> for &RealVector {
            type Output = RealVector;

            fn $op(self, rhs: &RealVector) -> RealVector {
                self.zip_new($label, rhs, |$a, $b| $body)
                    .unwrap_or_else(|err| panic!("{}", err))
            }
        }

        impl $Op<&RealVector> for RealVector {
            type Output = RealVector;

            /// Reuses the left operand's buffer when it is free-standing.
            fn $op(mut self, rhs: &RealVector) -> RealVector {
                if !self.is_scratch() {
                    return <&RealVector as $Op<&RealVector>>::$op(&self, rhs);
                }
                if let Err(err) = self.zip_overwrite($label, rhs, |$a, $b| $body) {
                    panic!("{}", err);
                }
                self
            }
        }

        impl $Op<RealVector> for RealVector {
            type Output = RealVector;

            fn $op(self, rhs: RealVector) -> RealVector {
                <RealVector as $Op<&RealVector>>::$op(self, &rhs)
            }
        }

        impl $Op<RealVector> for &RealVector {
            type Output = RealVector;

            fn $op(self, rhs: RealVector) -> RealVector {
                <&RealVector as $Op<&RealVector>>::$op(self, &rhs)
            }
        }

        impl $Op<Real> for &RealVector {
            type Output = RealVector;

            fn $op(self, rhs: Real) -> RealVector {
                self.map_new(|$a| {
                    let $b = rhs;
                    $body
                })
            }
        }

        impl $Op<Real> for RealVector {
            type Output = RealVector;

            fn $op(mut self, rhs: Real) -> RealVector {
                if !self.is_scratch() {
                    return <&RealVector as $Op<Real>>::$op(&self, rhs);
                }
                self.map_overwrite(|$a| {
                    let $b = rhs;
                    $body
                });
                self
            }
        }

        impl $Op<&RealVector> for Real {
            type Output = RealVector;

            fn $op(self, rhs: &RealVector) -> RealVector {
                rhs.map_new(|$b| {
                    let $a = self;
                    $body
                })
            }
        }

        impl $OpAssign<&RealVector> for RealVector {
            fn $op_assign(&mut self, rhs: &RealVector) {
                if let Err(err) = self.$named(rhs) {
                    panic!("{}", err);
                }
            }
        }

        impl $OpAssign<Real> for RealVector {
            fn $op_assign(&mut self, rhs: Real) {
                self.$named_scalar(rhs);
            }
        }
    };
}

impl_vector_op!(Add, add, AddAssign, add_assign, add_vec, add_scalar, "add", |a, b| a + b);
impl_vector_op!(Sub, sub, SubAssign, sub_assign, sub_vec, sub_scalar, "sub", |a, b| a - b);
impl_vector_op!(Mul, mul, MulAssign, mul_assign, mul_vec, mul_scalar, "mul", |a, b| a * b);
impl_vector_op!(Div, div, DivAssign, div_assign, div_vec, div_scalar, "div", |a, b| a / b);

impl Neg for &RealVector {
    type Output = RealVector;

    fn neg(self) -> RealVector {
        self.map_new(|a| -a)
    }
}

impl Neg for RealVector {
    type Output = RealVector;

    fn neg(mut self) -> RealVector {
        if !self.is_scratch() {
            return -&self;
        }
        self.map_overwrite(|a| -a);
        self
    }
}
