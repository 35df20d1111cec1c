//! Integration tests for DynArray.

use nnfw::{validation, DynArray, ErrorKind};

#[test]
fn test_basic_access() {
    let mut a: DynArray<bool> = DynArray::from(vec![false; 4]);
    assert_eq!(a.len(), 4);
    a.set(2, true);
    assert!(a.get(2));
    assert_eq!(a.at(4).unwrap_err().kind(), ErrorKind::OutOfBounds);
}

#[test]
fn test_append_and_erase() {
    let mut a = DynArray::new();
    for i in 0..5 {
        a.append(i * 10).unwrap();
    }
    assert_eq!(a.erase(0).unwrap(), 0);
    assert_eq!(a.erase(2).unwrap(), 30);
    assert_eq!(a.to_vec(), vec![10, 20, 40]);
    assert_eq!(a.erase(3).unwrap_err().kind(), ErrorKind::OutOfBounds);
}

#[test]
fn test_clone_is_deep() {
    let a = DynArray::from(vec![String::from("x"), String::from("y")]);
    let mut b = a.clone();
    b.set(0, String::from("z"));
    assert_eq!(a.get(0), "x");
    assert_eq!(b.get(0), "z");
}

#[test]
fn test_clone_of_view_is_owner() {
    let source = DynArray::from(vec![1, 2, 3]);
    let mut view = DynArray::new();
    view.convert_to_view(&source, 1, 3).unwrap();
    let mut copy = view.clone();
    assert!(!copy.is_view());
    copy.append(4).unwrap();
    assert_eq!(copy.to_vec(), vec![2, 3, 4]);
    assert_eq!(source.len(), 3);
}

#[test]
fn test_view_follows_source_writes() {
    let mut source = DynArray::from(vec![0u8; 6]);
    let mut view = DynArray::new();
    view.convert_to_view(&source, 2, 4).unwrap();
    source.set(3, 9);
    assert_eq!(view.to_vec(), vec![0, 9]);
}

#[test]
fn test_view_growth_of_source_keeps_window() {
    let mut source = DynArray::from(vec![1, 2, 3]);
    let mut view = DynArray::new();
    view.convert_to_view(&source, 1, 2).unwrap();
    source.resize(10).unwrap();
    assert_eq!(view.to_vec(), vec![2]);
}

#[test]
fn test_view_after_source_dropped_is_empty() {
    let mut view = DynArray::new();
    {
        let source = DynArray::from(vec![1.5, 2.5]);
        view.convert_to_view(&source, 0, 2).unwrap();
    }
    assert!(view.is_empty());
}

#[test]
fn test_set_view_range_checked() {
    if !validation::ENABLED {
        return;
    }
    let source = DynArray::from(vec![1, 2, 3]);
    let mut view = DynArray::new();
    view.convert_to_view(&source, 0, 1).unwrap();
    assert_eq!(
        view.set_view(2, 5).unwrap_err().kind(),
        ErrorKind::OutOfBounds
    );
}

#[test]
fn test_compare_flags() {
    let a = DynArray::from(vec![1, 2, 3, 4]);
    let b = DynArray::from(vec![1, 0, 3, 0]);
    assert_eq!(a.compare(&b).unwrap().to_vec(), vec![0, 1, 0, 1]);
    assert_eq!(a.compare(&a).unwrap().to_vec(), vec![0; 4]);
}

#[test]
fn test_compare_length_checked() {
    if !validation::ENABLED {
        return;
    }
    let a = DynArray::from(vec![1, 2]);
    let b = DynArray::from(vec![1, 2, 3]);
    assert_eq!(
        a.compare(&b).unwrap_err().kind(),
        ErrorKind::IncompatibleDimensions
    );
}

#[test]
fn test_equality_and_debug() {
    let a: DynArray<i32> = (1..=3).collect();
    let b = DynArray::from(vec![1, 2, 3]);
    assert_eq!(a, b);
    assert_eq!(format!("{:?}", a), "[1, 2, 3]");
}

#[test]
fn test_serde_round_trip() {
    let a = DynArray::from(vec![true, false, true]);
    let json = serde_json::to_string(&a).unwrap();
    assert_eq!(json, "[true,false,true]");
    let back: DynArray<bool> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, a);

    let bytes = bincode::serialize(&a).unwrap();
    let back: DynArray<bool> = bincode::deserialize(&bytes).unwrap();
    assert_eq!(back, a);
}
