//! Property-based tests for the container invariants.

use approx::assert_relative_eq;
use nnfw::{RealMatrix, RealVector};
use proptest::prelude::*;

fn values(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1e3..1e3f64, 1..max_len)
}

fn matrix() -> impl Strategy<Value = (usize, usize, Vec<f64>)> {
    (1usize..6, 1usize..6).prop_flat_map(|(rows, cols)| {
        (
            Just(rows),
            Just(cols),
            prop::collection::vec(-100.0..100.0f64, rows * cols),
        )
    })
}

proptest! {
    #[test]
    fn prop_pin_round_trip(data in values(32), index in any::<prop::sample::Index>(), delta in 1.0..10.0f64) {
        let mut v = RealVector::from_slice(&data);
        let i = index.index(data.len());

        v.steady(i);
        let old = v.get(i);
        v.set(i, old + delta);
        prop_assert_eq!(v.get(i), old);

        v.unsteady(i);
        v.set(i, old + delta);
        prop_assert_eq!(v.get(i), old + delta);
    }

    #[test]
    fn prop_clone_write_isolated(data in values(32), index in any::<prop::sample::Index>()) {
        let original = RealVector::from_slice(&data);
        let mut copy = original.clone();
        let i = index.index(data.len());
        copy.set(i, data[i] + 1.0);
        prop_assert_eq!(original.to_vec(), data);
    }

    #[test]
    fn prop_resize_preserves_prefix(data in values(32), n in 0usize..64) {
        let mut v = RealVector::from_slice(&data);
        v.resize(n).unwrap();
        prop_assert_eq!(v.len(), n);
        for i in 0..n {
            let expected = if i < data.len() { data[i] } else { 0.0 };
            prop_assert_eq!(v.get(i), expected);
        }
    }

    #[test]
    fn prop_view_never_outgrows_source(
        data in values(32),
        start in 0usize..32,
        len in 0usize..32,
        shrink in 0usize..32,
    ) {
        let mut v = RealVector::from_slice(&data);
        let start = start.min(data.len());
        let end = (start + len).min(data.len());
        let w = RealVector::view_of(&v, start, end).unwrap();
        v.resize(shrink).unwrap();
        prop_assert!(w.len() <= v.len());
        prop_assert_eq!(w.to_vec().len(), w.len());
    }

    #[test]
    fn prop_identity_product((rows, cols, data) in matrix()) {
        let m = RealMatrix::from_vec(rows, cols, data).unwrap();
        let product = &RealMatrix::identity(rows) * &m;
        prop_assert_eq!(product.shape(), m.shape());
        for (a, b) in product.to_vec().iter().zip(m.to_vec()) {
            assert_relative_eq!(*a, b);
        }
    }

    #[test]
    fn prop_row_and_column_views_agree((rows, cols, data) in matrix()) {
        let m = RealMatrix::from_vec(rows, cols, data).unwrap();
        for r in 0..rows {
            for c in 0..cols {
                prop_assert_eq!(m.row(r).get(c), m.get(r, c));
                prop_assert_eq!(m.column(c).get(r), m.get(r, c));
            }
        }
    }

    #[test]
    fn prop_add_then_sub_round_trips(a in values(16), b_seed in values(16)) {
        let n = a.len().min(b_seed.len());
        let a = RealVector::from_slice(&a[..n]);
        let b = RealVector::from_slice(&b_seed[..n]);
        let r = &a + &b - &b;
        for i in 0..n {
            assert_relative_eq!(r.get(i), a.get(i), epsilon = 1e-9);
        }
    }
}
