//! Shared fixtures for the fitting tests.

#![allow(dead_code)]

use ndarray::{Array2, array};
use qgst_core::basis::ID;
use qgst_core::linalg::hs_distance;
use qgst_core::{GateSet, GateSetBasis, ProbabilityTable};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Single-qubit depolarizing channel with strength `p`.
pub fn depolarizing(p: f64) -> Array2<f64> {
    Array2::from_diag(&array![1.0, 1.0 - p, 1.0 - p, 1.0 - p])
}

/// Single-qubit amplitude damping towards `|0⟩` with rate `gamma`.
pub fn amplitude_damping(gamma: f64) -> Array2<f64> {
    let s = (1.0 - gamma).sqrt();
    array![
        [1.0, 0.0, 0.0, 0.0],
        [0.0, s, 0.0, 0.0],
        [0.0, 0.0, s, 0.0],
        [gamma, 0.0, 0.0, 1.0 - gamma],
    ]
}

/// Ideal gate set of `basis` with `noise` applied after every gate but `Id`.
pub fn noisy_gate_set(basis: &GateSetBasis, noise: &Array2<f64>) -> GateSet {
    let ideal = GateSet::ideal(basis);
    let gates = ideal
        .labels()
        .iter()
        .zip(ideal.gates())
        .map(|(label, g)| {
            if label.as_str() == ID {
                g.clone()
            } else {
                noise.dot(g)
            }
        })
        .collect();
    GateSet::new(
        ideal.labels().to_vec(),
        gates,
        ideal.measurement().clone(),
        ideal.rho().clone(),
    )
    .unwrap()
}

/// Exact table for `truth`.
pub fn exact_table(basis: &GateSetBasis, truth: &GateSet) -> ProbabilityTable {
    truth.predict_table(basis.catalog()).unwrap()
}

/// Finite-shot table for `truth` from a fixed seed.
pub fn sampled_table(basis: &GateSetBasis, truth: &GateSet, shots: u64, seed: u64) -> ProbabilityTable {
    let mut rng = StdRng::seed_from_u64(seed);
    exact_table(basis, truth).resample(shots, &mut rng)
}

/// Largest squared Hilbert-Schmidt distance between matching gates.
pub fn max_gate_distance(a: &GateSet, b: &GateSet) -> f64 {
    a.gates()
        .iter()
        .zip(b.gates())
        .map(|(x, y)| hs_distance(x, y))
        .fold(0.0, f64::max)
}
