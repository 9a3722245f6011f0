//! Tests for two-qubit bases and designs.

use approx::assert_abs_diff_eq;
use ndarray::Array2;
use num_complex::Complex64;
use qgst_core::linalg::{hermitian_eigh, invert};
use qgst_core::unitary::{identity, kron, rx, ry};
use qgst_core::{ExperimentKey, Fiducial, GateLabel, GateSet, GateSetBasis, PauliBasis};
use std::f64::consts::FRAC_PI_2;

fn cnot() -> Array2<Complex64> {
    let one = Complex64::new(1.0, 0.0);
    let mut u = Array2::zeros((4, 4));
    u[[0, 0]] = one;
    u[[1, 1]] = one;
    u[[2, 3]] = one;
    u[[3, 2]] = one;
    u
}

fn product_basis() -> GateSetBasis {
    let pauli = PauliBasis::new(2).unwrap();
    let id = identity(2);
    let x90 = rx(FRAC_PI_2);
    let y90 = ry(FRAC_PI_2);
    let gates: Vec<(GateLabel, Array2<f64>)> = [
        ("II", kron(&id, &id)),
        ("XI", kron(&x90, &id)),
        ("YI", kron(&y90, &id)),
        ("IX", kron(&id, &x90)),
        ("IY", kron(&id, &y90)),
    ]
    .iter()
    .map(|(l, u)| (GateLabel::from(*l), pauli.ptm_from_unitary(u)))
    .collect();

    let first = [vec!["II"], vec!["XI"], vec!["YI"], vec!["XI", "XI"]];
    let second = [vec!["II"], vec!["IX"], vec!["IY"], vec!["IX", "IX"]];
    let mut fiducials = Vec::new();
    for (a, fa) in first.iter().enumerate() {
        for (b, fb) in second.iter().enumerate() {
            let seq: Vec<&str> = fa.iter().chain(fb.iter()).copied().collect();
            fiducials.push(Fiducial::new(format!("F{a}{b}"), seq));
        }
    }
    GateSetBasis::new(pauli, gates, fiducials).unwrap()
}

// ---------------------------------------------------------------------------
// Pauli basis
// ---------------------------------------------------------------------------

#[test]
fn cnot_ptm_is_signed_permutation() {
    let pauli = PauliBasis::new(2).unwrap();
    let ptm = pauli.ptm_from_unitary(&cnot());
    for row in ptm.rows() {
        let nonzero: Vec<f64> = row.iter().copied().filter(|x| x.abs() > 1e-12).collect();
        assert_eq!(nonzero.len(), 1);
        assert_abs_diff_eq!(nonzero[0].abs(), 1.0, epsilon = 1e-12);
    }
    // CNOT propagates X from control to target: XI -> XX.
    let xi = 4;
    let xx = 5;
    assert_abs_diff_eq!(ptm[[xx, xi]], 1.0, epsilon = 1e-12);
}

#[test]
fn cnot_choi_is_rank_one() {
    let pauli = PauliBasis::new(2).unwrap();
    let choi = pauli.ptm_to_choi(&pauli.ptm_from_unitary(&cnot()));
    let (eigs, _) = hermitian_eigh(&choi).unwrap();
    assert_abs_diff_eq!(eigs[15], 4.0, epsilon = 1e-10);
    assert!(eigs.iter().take(15).all(|&e| e.abs() < 1e-10));
}

// ---------------------------------------------------------------------------
// Designs
// ---------------------------------------------------------------------------

#[test]
fn product_design_has_invertible_gram() {
    let basis = product_basis();
    assert_eq!(basis.catalog().num_spam(), 16);
    let gs = GateSet::ideal(&basis);
    let cat = basis.catalog();
    let gram = Array2::from_shape_fn((16, 16), |(i, j)| {
        gs.predict(cat, &cat.spam_key(i, j)).unwrap()
    });
    assert!(invert(&gram).is_ok());
    assert!(invert(&basis.preparation_matrix()).is_ok());
}

#[test]
fn product_design_predictions() {
    let basis = product_basis();
    let gs = GateSet::ideal(&basis);
    let cat = basis.catalog();
    let p = gs.predict(cat, &ExperimentKey::spam("F00", "F00")).unwrap();
    assert_abs_diff_eq!(p, 1.0, epsilon = 1e-12);
    // Flipping the second qubit makes the all-zeros outcome impossible.
    let p = gs.predict(cat, &ExperimentKey::spam("F00", "F03")).unwrap();
    assert_abs_diff_eq!(p, 0.0, epsilon = 1e-12);
    // One qubit on the equator: one half.
    let p = gs.predict(cat, &ExperimentKey::gate("F00", "XI", "F00")).unwrap();
    assert_abs_diff_eq!(p, 0.5, epsilon = 1e-12);
}

#[test]
fn product_design_identity_fiducial() {
    let basis = product_basis();
    assert_eq!(basis.identity_fiducial(), Some(0));
    assert_abs_diff_eq!(GateSet::ideal(&basis).rho_trace(), 1.0, epsilon = 1e-14);
}
