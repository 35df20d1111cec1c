//! DynArray - resizable sequence of arbitrary elements with range views.
//!
//! `DynArray<T>` is the plain sibling of [`RealVector`](crate::RealVector):
//! no copy-on-write and no pinning. Cloning copies the elements. It still
//! supports views: an array converted with
//! [`convert_to_view`](DynArray::convert_to_view) aliases a range of another
//! array, and re-bases to the full source range if the source shrinks below
//! it.
//!
//! Typical contents are connectivity masks (`DynArray<bool>`) and
//! per-element flags (`DynArray<i32>` from [`compare`](DynArray::compare)).
//!
//! # Examples
//!
//! ```
//! use nnfw::DynArray;
//!
//! let source = DynArray::from(vec![1, 2, 3, 4, 5]);
//! let mut view = DynArray::new();
//! view.convert_to_view(&source, 1, 4).unwrap();
//! assert_eq!(view.to_vec(), vec![2, 3, 4]);
//!
//! view.set(0, 20);
//! assert_eq!(source.get(1), 20);
//! ```

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{NnfwError, Result};
use crate::storage::{self, Anchor, Buffer, ViewWindow, Window};
use crate::validation;

/// Resizable array with optional view semantics.
#[derive(Serialize, Deserialize)]
#[serde(
    from = "Vec<T>",
    into = "Vec<T>",
    bound(serialize = "T: Serialize + Clone", deserialize = "T: Deserialize<'de>")
)]
pub struct DynArray<T> {
    anchor: Anchor<Vec<T>>,
    view: Option<ViewWindow>,
}

impl<T> DynArray<T> {
    /// Create an empty array.
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Take ownership of `values`.
    pub fn from_vec(values: Vec<T>) -> Self {
        Self {
            anchor: storage::anchor(values),
            view: None,
        }
    }

    #[inline]
    fn window(&self) -> Window {
        let slots = self.anchor.borrow().slots();
        match &self.view {
            None => Window::full(slots),
            Some(view) => view.resolve(slots, self.anchor.generation()),
        }
    }

    #[inline]
    fn slot(&self, index: usize) -> usize {
        let window = self.window();
        assert!(
            index < window.len,
            "index {} out of bounds (length: {})",
            index,
            window.len
        );
        window.slot(index)
    }

    fn deny_on_view(&self, operation: &'static str) -> Result<()> {
        if self.view.is_some() {
            return Err(NnfwError::StructuralMutationDenied {
                operation,
                reason: "array is a view",
            });
        }
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.window().len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_view(&self) -> bool {
        self.view.is_some()
    }

    // =========================================================================
    // Element Access
    // =========================================================================

    /// Copy of the element at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn get(&self, index: usize) -> T
    where
        T: Clone,
    {
        let slot = self.slot(index);
        self.anchor.borrow()[slot].clone()
    }

    /// Copy of the element at `index`, or `IndexOutOfBounds`.
    pub fn at(&self, index: usize) -> Result<T>
    where
        T: Clone,
    {
        let window = self.window();
        validation::check_index(index, window.len)?;
        Ok(self.anchor.borrow()[window.slot(index)].clone())
    }

    /// Overwrite the element at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn set(&mut self, index: usize, value: T) {
        let slot = self.slot(index);
        self.anchor.borrow_mut()[slot] = value;
    }

    /// Copy the elements out.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        let window = self.window();
        let buffer = self.anchor.borrow();
        (0..window.len)
            .map(|i| buffer[window.slot(i)].clone())
            .collect()
    }

    // =========================================================================
    // Structural Operations
    // =========================================================================

    /// Resize to `n` elements, keeping the prefix and filling with
    /// `T::default()`.
    ///
    /// # Errors
    ///
    /// `StructuralMutationDenied` on a view.
    pub fn resize(&mut self, n: usize) -> Result<()>
    where
        T: Default + Clone,
    {
        self.deny_on_view("resize")?;
        self.anchor.borrow_mut().resize(n, T::default());
        Ok(())
    }

    /// Push `value` at the end.
    ///
    /// # Errors
    ///
    /// `StructuralMutationDenied` on a view.
    pub fn append(&mut self, value: T) -> Result<()> {
        self.deny_on_view("append")?;
        self.anchor.borrow_mut().push(value);
        Ok(())
    }

    /// Remove the element at `index`, shifting later elements down.
    ///
    /// # Errors
    ///
    /// `StructuralMutationDenied` on a view, `IndexOutOfBounds` if
    /// `index >= len`.
    pub fn erase(&mut self, index: usize) -> Result<T> {
        self.deny_on_view("erase")?;
        let mut buffer = self.anchor.borrow_mut();
        validation::check_index(index, buffer.len())?;
        Ok(buffer.remove(index))
    }

    /// Turn this array into a view of elements `[start, end)` of `source`.
    ///
    /// If this array owned its elements they are released, so views of it
    /// become empty.
    ///
    /// # Errors
    ///
    /// In checked builds, `IndexOutOfBounds` for a range outside `source`.
    pub fn convert_to_view(&mut self, source: &DynArray<T>, start: usize, end: usize) -> Result<()> {
        validation::check_range(start, end, source.len())?;
        let window = source.window().sub(start, end.saturating_sub(start), 1);
        if self.view.is_none() && !Rc::ptr_eq(&self.anchor, &source.anchor) {
            storage::release(&self.anchor);
        }
        self.anchor = Rc::clone(&source.anchor);
        self.view = Some(ViewWindow::new(window, source.anchor.generation()));
        Ok(())
    }

    /// Move this view to elements `[start, end)` of the buffer it aliases.
    ///
    /// # Errors
    ///
    /// `StructuralMutationDenied` if this array is not a view; in checked
    /// builds, `IndexOutOfBounds` for a range outside the buffer.
    pub fn set_view(&mut self, start: usize, end: usize) -> Result<()> {
        let Some(view) = &self.view else {
            return Err(NnfwError::StructuralMutationDenied {
                operation: "set_view",
                reason: "array is not a view",
            });
        };
        validation::check_range(start, end, self.anchor.borrow().slots())?;
        view.set(
            Window {
                offset: start,
                len: end.saturating_sub(start),
                stride: 1,
            },
            self.anchor.generation(),
        );
        Ok(())
    }

    // =========================================================================
    // Bulk Writes
    // =========================================================================

    /// Overwrite every element with a clone of `value`.
    pub fn set_all(&mut self, value: T)
    where
        T: Clone,
    {
        let window = self.window();
        let mut buffer = self.anchor.borrow_mut();
        for i in 0..window.len {
            buffer[window.slot(i)] = value.clone();
        }
    }

    /// Reset every element to `T::default()`.
    pub fn zeroing(&mut self)
    where
        T: Default,
    {
        let window = self.window();
        let mut buffer = self.anchor.borrow_mut();
        for i in 0..window.len {
            buffer[window.slot(i)] = T::default();
        }
    }

    /// Element-wise difference flags: 1 where the arrays differ, 0 where they
    /// are equal.
    ///
    /// # Errors
    ///
    /// In checked builds, `IncompatibleVectors` if the lengths differ.
    ///
    /// # Examples
    ///
    /// ```
    /// use nnfw::DynArray;
    ///
    /// let a = DynArray::from(vec!['a', 'b', 'c']);
    /// let b = DynArray::from(vec!['a', 'x', 'c']);
    /// assert_eq!(a.compare(&b).unwrap().to_vec(), vec![0, 1, 0]);
    /// ```
    pub fn compare(&self, other: &DynArray<T>) -> Result<DynArray<i32>>
    where
        T: PartialEq,
    {
        let (lhs, rhs) = (self.window(), other.window());
        validation::check_len("compare", lhs.len, rhs.len)?;
        let (a, b) = (self.anchor.borrow(), other.anchor.borrow());
        Ok((0..lhs.len.min(rhs.len))
            .map(|i| i32::from(a[lhs.slot(i)] != b[rhs.slot(i)]))
            .collect())
    }
}

// =============================================================================
// Standard Traits
// =============================================================================

impl<T> Default for DynArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for DynArray<T> {
    fn drop(&mut self) {
        if self.view.is_none() {
            storage::release(&self.anchor);
        }
    }
}

impl<T: Clone> Clone for DynArray<T> {
    /// Deep copy of the elements; a clone of a view is an owner.
    fn clone(&self) -> Self {
        Self::from_vec(self.to_vec())
    }
}

impl<T: PartialEq> PartialEq for DynArray<T> {
    fn eq(&self, other: &Self) -> bool {
        let (lhs, rhs) = (self.window(), other.window());
        if lhs.len != rhs.len {
            return false;
        }
        let (a, b) = (self.anchor.borrow(), other.anchor.borrow());
        (0..lhs.len).all(|i| a[lhs.slot(i)] == b[rhs.slot(i)])
    }
}

impl<T: fmt::Debug> fmt::Debug for DynArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let window = self.window();
        let buffer = self.anchor.borrow();
        f.debug_list()
            .entries((0..window.len).map(|i| &buffer[window.slot(i)]))
            .finish()
    }
}

impl<T> From<Vec<T>> for DynArray<T> {
    fn from(values: Vec<T>) -> Self {
        Self::from_vec(values)
    }
}

impl<T: Clone> From<DynArray<T>> for Vec<T> {
    fn from(array: DynArray<T>) -> Self {
        array.to_vec()
    }
}

impl<T> FromIterator<T> for DynArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_fills_default() {
        let mut a = DynArray::from(vec![1u32, 2, 3]);
        a.resize(5).unwrap();
        assert_eq!(a.to_vec(), vec![1, 2, 3, 0, 0]);
        a.resize(1).unwrap();
        assert_eq!(a.to_vec(), vec![1]);
    }

    #[test]
    fn test_erase_shifts() {
        let mut a = DynArray::from(vec!["a", "b", "c"]);
        assert_eq!(a.erase(1).unwrap(), "b");
        assert_eq!(a.to_vec(), vec!["a", "c"]);
        assert!(a.erase(2).is_err());
    }

    #[test]
    fn test_view_denies_structure() {
        let source = DynArray::from(vec![1, 2, 3]);
        let mut view = DynArray::new();
        view.convert_to_view(&source, 0, 2).unwrap();
        assert!(view.resize(4).is_err());
        assert!(view.append(9).is_err());
        assert!(view.erase(0).is_err());
    }

    #[test]
    fn test_set_view_requires_view() {
        let mut owner = DynArray::from(vec![1, 2, 3]);
        assert!(owner.set_view(0, 1).is_err());

        let mut view = DynArray::new();
        view.convert_to_view(&owner, 0, 1).unwrap();
        view.set_view(1, 3).unwrap();
        assert_eq!(view.to_vec(), vec![2, 3]);
        owner.set(2, 30);
        assert_eq!(view.get(1), 30);
    }

    #[test]
    fn test_view_rebases_after_source_shrinks() {
        let mut source: DynArray<i32> = (0..10).collect();
        let mut view = DynArray::new();
        view.convert_to_view(&source, 2, 5).unwrap();
        source.resize(3).unwrap();
        assert_eq!(view.len(), 3);
        assert_eq!(view.to_vec(), vec![0, 1, 2]);
    }

    #[test]
    fn test_clone_is_deep() {
        let a = DynArray::from(vec![1.0, 2.0]);
        let mut b = a.clone();
        b.set(0, 5.0);
        assert_eq!(a.get(0), 1.0);
    }

    #[test]
    fn test_set_all_and_zeroing_on_view() {
        let source = DynArray::from(vec![1, 2, 3, 4]);
        let mut view = DynArray::new();
        view.convert_to_view(&source, 1, 3).unwrap();
        view.set_all(7);
        assert_eq!(source.to_vec(), vec![1, 7, 7, 4]);
        view.zeroing();
        assert_eq!(source.to_vec(), vec![1, 0, 0, 4]);
    }
}
