//! Tests for PinnableCell.

use nnfw::{CellState, PinnableCell};

#[test]
fn test_free_cell_accepts_writes() {
    let mut cell = PinnableCell::new(1.0);
    cell.write(2.0);
    assert_eq!(cell.read(), 2.0);
    assert_eq!(cell.state(), CellState::Free);
}

#[test]
fn test_pinned_cell_keeps_value() {
    let mut cell = PinnableCell::new(1.0);
    cell.pin();
    for value in [5.0, -3.0, f64::NAN] {
        cell.write(value);
        assert_eq!(cell.read(), 1.0);
    }
    assert_eq!(cell.state(), CellState::Pinned);
}

#[test]
fn test_unpin_restores_writes() {
    let mut cell = PinnableCell::new(1.0);
    cell.pin();
    cell.write(9.0);
    cell.unpin();
    cell.write(9.0);
    assert_eq!(cell.read(), 9.0);
}

#[test]
fn test_copy_carries_state() {
    let mut cell = PinnableCell::from(4.0);
    cell.pin();
    let mut copy = cell;
    copy.write(1.0);
    assert_eq!(copy.read(), 4.0);
    assert!(copy.is_pinned());
}

#[test]
fn test_serde_round_trip() {
    let mut cell = PinnableCell::new(0.25);
    cell.pin();
    let json = serde_json::to_string(&cell).unwrap();
    let back: PinnableCell = serde_json::from_str(&json).unwrap();
    assert_eq!(back, cell);
}
