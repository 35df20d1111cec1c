//! Shared anchors and view windows.
//!
//! Every owning container holds its buffer behind an *anchor*
//! (`Rc<Shared<B>>`, a `RefCell<B>` plus a layout generation). Views never
//! own a buffer; they hold a clone of the source's anchor plus a [`Window`]
//! describing which slots of the buffer they alias.
//!
//! # Re-basing
//!
//! Instead of the source notifying its views on every structural change,
//! a view re-validates its window against the live buffer length each time it
//! is resolved. A window that no longer fits is clamped to the full source
//! range, or emptied for matrix views (reported through `log` in checked
//! builds). When an owner is
//! dropped it releases its buffer, so its views resolve to an empty window
//! and never see stale storage.
//!
//! An owner whose slot layout changes without the buffer shrinking (a matrix
//! resized to a new shape) bumps the anchor's layout generation. Views
//! created under an older generation re-base as if their window no longer
//! fit.

use std::cell::{Cell, RefCell};
use std::ops::Deref;
use std::rc::Rc;

use crate::validation;

/// Buffer plus the generation of its slot layout.
#[derive(Debug)]
pub(crate) struct Shared<B> {
    buffer: RefCell<B>,
    generation: Cell<u64>,
}

impl<B> Shared<B> {
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    /// Invalidate the windows of every existing view.
    pub fn relayout(&self) {
        self.generation.set(self.generation.get().wrapping_add(1));
    }
}

impl<B> Deref for Shared<B> {
    type Target = RefCell<B>;

    #[inline(always)]
    fn deref(&self) -> &RefCell<B> {
        &self.buffer
    }
}

/// Shared handle to a container buffer.
pub(crate) type Anchor<B> = Rc<Shared<B>>;

/// Storage buffers that can be measured and released by their owner.
pub(crate) trait Buffer {
    /// Number of slots in the buffer.
    fn slots(&self) -> usize;

    /// Drop the contents, leaving an empty buffer behind for any views.
    fn release(&mut self);
}

impl<T> Buffer for Vec<T> {
    #[inline]
    fn slots(&self) -> usize {
        self.len()
    }

    fn release(&mut self) {
        *self = Vec::new();
    }
}

impl<T> Buffer for Rc<Vec<T>> {
    #[inline]
    fn slots(&self) -> usize {
        self.len()
    }

    fn release(&mut self) {
        *self = Rc::new(Vec::new());
    }
}

/// Create an anchor around `buffer`.
#[inline]
pub(crate) fn anchor<B>(buffer: B) -> Anchor<B> {
    Rc::new(Shared {
        buffer: RefCell::new(buffer),
        generation: Cell::new(0),
    })
}

/// Release an owner's buffer if views may still be looking at it.
///
/// The buffer can only be borrowed here if a view's guard (an iterator
/// from `RealVector::iter`) outlives the owner. That view then keeps the
/// buffer alive until the guard is gone, and views stay within bounds.
pub(crate) fn release<B: Buffer>(anchor: &Anchor<B>) {
    if Rc::strong_count(anchor) > 1 {
        match anchor.try_borrow_mut() {
            Ok(mut buffer) => buffer.release(),
            Err(_) => log::trace!(
                "buffer still borrowed by a view while its owner is dropped; not released"
            ),
        }
    }
}

/// Strided run of slots: `offset, offset + stride, ...` (`len` slots).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Window {
    pub offset: usize,
    pub len: usize,
    pub stride: usize,
}

impl Window {
    /// Contiguous window covering a whole buffer of `len` slots.
    #[inline]
    pub const fn full(len: usize) -> Self {
        Self {
            offset: 0,
            len,
            stride: 1,
        }
    }

    /// Buffer slot of logical element `i`.
    #[inline(always)]
    pub fn slot(&self, i: usize) -> usize {
        self.offset + i * self.stride
    }

    /// Does every slot of this window exist in a buffer of `slots` slots?
    #[inline]
    pub fn fits(&self, slots: usize) -> bool {
        self.len == 0 || self.slot(self.len - 1) < slots
    }

    /// Window of `len` elements starting at element `offset` of this one,
    /// taking every `stride`-th element.
    #[inline]
    pub fn sub(&self, offset: usize, len: usize, stride: usize) -> Window {
        Window {
            offset: self.slot(offset),
            len,
            stride: self.stride * stride,
        }
    }
}

/// Where a stale view lands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Rebase {
    /// Clamp to the full source range.
    Full,
    /// Collapse to an empty window (matrix views, whose shape can't follow).
    Empty,
}

/// Window state of a view, re-based lazily when its source shrinks or
/// changes layout.
#[derive(Debug)]
pub(crate) struct ViewWindow {
    window: Cell<Window>,
    generation: Cell<u64>,
    rebase: Rebase,
}

impl ViewWindow {
    pub fn new(window: Window, generation: u64) -> Self {
        Self::with_rebase(window, generation, Rebase::Full)
    }

    pub fn with_rebase(window: Window, generation: u64, rebase: Rebase) -> Self {
        Self {
            window: Cell::new(window),
            generation: Cell::new(generation),
            rebase,
        }
    }

    /// Replace the window (used by `set_view`).
    pub fn set(&self, window: Window, generation: u64) {
        self.window.set(window);
        self.generation.set(generation);
    }

    /// Is the window still valid for a source of `slots` slots at layout
    /// `generation`? Never re-bases.
    #[inline]
    pub fn is_current(&self, slots: usize, generation: u64) -> bool {
        self.generation.get() == generation && self.window.get().fits(slots)
    }

    /// Current window, re-based if it no longer fits a source of `slots`
    /// slots or was created under another layout `generation`.
    #[inline]
    pub fn resolve(&self, slots: usize, generation: u64) -> Window {
        let window = self.window.get();
        if self.is_current(slots, generation) {
            return window;
        }

        let rebased = match self.rebase {
            Rebase::Full => Window::full(slots),
            Rebase::Empty => Window {
                offset: 0,
                len: 0,
                stride: 1,
            },
        };
        if validation::ENABLED {
            log::warn!(
                "view of {} elements at offset {} (stride {}) no longer fits its source of {} \
                 elements; re-basing to {} elements",
                window.len,
                window.offset,
                window.stride,
                slots,
                rebased.len
            );
        }
        self.set(rebased, generation);
        rebased
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_slots() {
        let w = Window {
            offset: 2,
            len: 3,
            stride: 4,
        };
        assert_eq!(w.slot(0), 2);
        assert_eq!(w.slot(2), 10);
        assert!(w.fits(11));
        assert!(!w.fits(10));
    }

    #[test]
    fn test_empty_window_always_fits() {
        let w = Window {
            offset: 100,
            len: 0,
            stride: 1,
        };
        assert!(w.fits(0));
    }

    #[test]
    fn test_sub_window_composes() {
        // Column 1 of a 3x4 matrix stored at offset 12 of a larger buffer
        let data = Window {
            offset: 12,
            len: 12,
            stride: 1,
        };
        let col = data.sub(1, 3, 4);
        assert_eq!(col.slot(0), 13);
        assert_eq!(col.slot(2), 21);

        // Every other element of that column
        let sparse = col.sub(0, 2, 2);
        assert_eq!(sparse.slot(1), 21);
    }

    #[test]
    fn test_resolve_rebases_stale_window() {
        let view = ViewWindow::new(
            Window {
                offset: 2,
                len: 3,
                stride: 1,
            },
            0,
        );
        assert_eq!(view.resolve(10, 0).len, 3);

        let rebased = view.resolve(3, 0);
        assert_eq!(rebased, Window::full(3));

        // Re-basing is sticky
        assert_eq!(view.resolve(10, 0), Window::full(3));
    }

    #[test]
    fn test_resolve_rebases_on_relayout() {
        let owner: Anchor<Vec<u8>> = anchor(vec![0; 6]);
        let view = ViewWindow::new(
            Window {
                offset: 3,
                len: 3,
                stride: 1,
            },
            owner.generation(),
        );
        assert!(view.is_current(6, owner.generation()));

        owner.relayout();
        assert!(!view.is_current(6, owner.generation()));
        assert_eq!(view.resolve(6, owner.generation()), Window::full(6));
        assert!(view.is_current(6, owner.generation()));
    }

    #[test]
    fn test_collapsing_view_goes_empty() {
        let view = ViewWindow::with_rebase(
            Window {
                offset: 0,
                len: 4,
                stride: 1,
            },
            0,
            Rebase::Empty,
        );
        assert_eq!(view.resolve(3, 0).len, 0);
        // Stays empty when the source grows back
        assert_eq!(view.resolve(8, 0).len, 0);
    }

    #[test]
    fn test_release_only_when_shared() {
        let owner: Anchor<Vec<u8>> = anchor(vec![1, 2, 3]);
        release(&owner);
        assert_eq!(owner.borrow().len(), 3);

        let view = Rc::clone(&owner);
        release(&owner);
        assert_eq!(view.borrow().len(), 0);
    }

    #[test]
    fn test_release_skipped_while_borrowed() {
        let owner: Anchor<Vec<u8>> = anchor(vec![1, 2, 3]);
        let view = Rc::clone(&owner);
        let guard = view.borrow();
        release(&owner);
        assert_eq!(guard.len(), 3);
        drop(guard);
        assert_eq!(view.borrow().len(), 3);
    }
}
