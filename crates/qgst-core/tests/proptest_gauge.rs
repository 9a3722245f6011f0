//! Property-based tests for the forward model.
//!
//! Any invertible gauge transform must leave every predicted probability
//! unchanged, and unitary channels must map to trace-preserving PTMs with
//! positive Choi matrices.

use ndarray::Array2;
use proptest::prelude::*;
use qgst_core::linalg::hermitian_eigh;
use qgst_core::unitary::{rx, ry, rz};
use qgst_core::{GateSet, GateSetBasis, PauliBasis};

/// Perturbation of the identity; entries are small enough that the matrix
/// stays well conditioned.
fn arb_gauge() -> impl Strategy<Value = Array2<f64>> {
    prop::collection::vec(-0.15_f64..0.15, 16).prop_map(|v| {
        let mut b = Array2::eye(4);
        for (x, dv) in b.iter_mut().zip(v) {
            *x += dv;
        }
        b
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn predictions_are_gauge_invariant(b in arb_gauge()) {
        let basis = GateSetBasis::standard().unwrap();
        let ideal = GateSet::ideal(&basis);
        let moved = ideal.gauge_transform(&b).unwrap();
        for key in basis.catalog().required_keys() {
            let p = ideal.predict(basis.catalog(), &key).unwrap();
            let q = moved.predict(basis.catalog(), &key).unwrap();
            prop_assert!((p - q).abs() < 1e-10, "{key}: {p} vs {q}");
        }
    }

    #[test]
    fn gauge_transforms_compose(b in arb_gauge(), c in arb_gauge()) {
        let basis = GateSetBasis::standard().unwrap();
        let ideal = GateSet::ideal(&basis);
        let stepwise = ideal.gauge_transform(&b).unwrap().gauge_transform(&c).unwrap();
        let direct = ideal.gauge_transform(&c.dot(&b)).unwrap();
        prop_assert!(stepwise.total_gate_distance(&direct).unwrap() < 1e-18);
    }

    #[test]
    fn unitary_channels_are_physical(
        a in -3.2_f64..3.2,
        b in -3.2_f64..3.2,
        c in -3.2_f64..3.2,
    ) {
        let pauli = PauliBasis::new(1).unwrap();
        let u = rz(a).dot(&ry(b)).dot(&rx(c));
        let ptm = pauli.ptm_from_unitary(&u);

        prop_assert!((ptm[[0, 0]] - 1.0).abs() < 1e-12);
        for j in 1..4 {
            prop_assert!(ptm[[0, j]].abs() < 1e-12);
            prop_assert!(ptm[[j, 0]].abs() < 1e-12);
        }

        let (eigs, _) = hermitian_eigh(&pauli.ptm_to_choi(&ptm)).unwrap();
        prop_assert!(eigs[0] > -1e-10);
        // Unitary channels have rank-one Choi matrices with eigenvalue d.
        prop_assert!((eigs[3] - 2.0).abs() < 1e-10);
    }
}
