//! PinnableCell - a single real-valued slot that can reject writes.
//!
//! A cell is either **free** (writes pass through) or **pinned** (writes are
//! silently absorbed, reads keep returning the value the cell held when it
//! was pinned). Pinning is what the higher layers call making an element
//! *steady*: an input neuron clamped to an external value, or a weight
//! excluded from learning.
//!
//! The state is a plain tag checked on every write; there is no separate
//! discard slot.
//!
//! # Examples
//!
//! ```
//! use nnfw::PinnableCell;
//!
//! let mut cell = PinnableCell::new(1.5);
//! cell.pin();
//! cell.write(9.0);
//! assert_eq!(cell.read(), 1.5);
//!
//! cell.unpin();
//! cell.write(9.0);
//! assert_eq!(cell.read(), 9.0);
//! ```

use serde::{Deserialize, Serialize};

/// Real number type used by all containers.
pub type Real = f64;

/// Write policy of a [`PinnableCell`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CellState {
    /// Writes overwrite the value
    #[default]
    Free,
    /// Writes are discarded
    Pinned,
}

/// A real value with a free/pinned write policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PinnableCell {
    value: Real,
    state: CellState,
}

impl PinnableCell {
    /// Create a free cell holding `value`.
    #[inline]
    pub const fn new(value: Real) -> Self {
        Self {
            value,
            state: CellState::Free,
        }
    }

    /// Current value.
    #[inline(always)]
    pub fn read(&self) -> Real {
        self.value
    }

    /// Overwrite the value unless the cell is pinned.
    #[inline(always)]
    pub fn write(&mut self, value: Real) {
        if self.state == CellState::Free {
            self.value = value;
        }
    }

    /// Freeze the current value. Idempotent.
    #[inline]
    pub fn pin(&mut self) {
        self.state = CellState::Pinned;
    }

    /// Let writes through again. Idempotent.
    #[inline]
    pub fn unpin(&mut self) {
        self.state = CellState::Free;
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.state == CellState::Pinned
    }

    #[inline]
    pub fn state(&self) -> CellState {
        self.state
    }
}

impl From<Real> for PinnableCell {
    fn from(value: Real) -> Self {
        PinnableCell::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_free() {
        let cell = PinnableCell::new(3.0);
        assert_eq!(cell.read(), 3.0);
        assert!(!cell.is_pinned());
        assert_eq!(cell.state(), CellState::Free);
    }

    #[test]
    fn test_pinned_write_is_absorbed() {
        let mut cell = PinnableCell::new(2.0);
        cell.pin();
        cell.write(7.0);
        assert_eq!(cell.read(), 2.0);
        assert!(cell.is_pinned());
    }

    #[test]
    fn test_pin_idempotent() {
        let mut cell = PinnableCell::new(2.0);
        cell.pin();
        cell.pin();
        cell.unpin();
        assert!(!cell.is_pinned());
        cell.unpin();
        cell.write(4.0);
        assert_eq!(cell.read(), 4.0);
    }

    #[test]
    fn test_default() {
        let cell = PinnableCell::default();
        assert_eq!(cell.read(), 0.0);
        assert!(!cell.is_pinned());
    }
}
