//! Gate sets: a measurement effect, a state, and one PTM per gate.
//!
//! The same value type carries ideal references, raw linear-inversion
//! output, gauge-fixed seeds, final estimates and simulated ground truths.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::basis::{GateSetBasis, sequence_product};
use crate::error::{CoreError, CoreResult};
use crate::labels::{ExperimentKey, GateLabel, LabelCatalog};
use crate::linalg::{self, hermitian_eigh};
use crate::pauli::PauliBasis;
use crate::table::ProbabilityTable;

/// `(E, rho, {G_k})` in the Pauli transfer representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateSet {
    labels: Vec<GateLabel>,
    gates: Vec<Array2<f64>>,
    measurement: Array1<f64>,
    rho: Array1<f64>,
}

impl GateSet {
    /// Assemble a gate set, checking that all shapes agree.
    pub fn new(
        labels: Vec<GateLabel>,
        gates: Vec<Array2<f64>>,
        measurement: Array1<f64>,
        rho: Array1<f64>,
    ) -> CoreResult<Self> {
        if labels.len() != gates.len() {
            return Err(CoreError::DimensionMismatch {
                context: "gate labels".to_string(),
                expected: gates.len(),
                got: labels.len(),
            });
        }
        let sq = rho.len();
        let d = ((sq as f64).sqrt().round() as usize).max(2);
        if d * d != sq {
            return Err(CoreError::DimensionMismatch {
                context: "state vector (must have d² entries, d ≥ 2)".to_string(),
                expected: d * d,
                got: sq,
            });
        }
        if measurement.len() != sq {
            return Err(CoreError::DimensionMismatch {
                context: "measurement effect".to_string(),
                expected: sq,
                got: measurement.len(),
            });
        }
        for (label, g) in labels.iter().zip(&gates) {
            if g.dim() != (sq, sq) {
                return Err(CoreError::DimensionMismatch {
                    context: format!("gate {label}"),
                    expected: sq,
                    got: g.nrows().max(g.ncols()),
                });
            }
        }
        Ok(Self {
            labels,
            gates,
            measurement,
            rho,
        })
    }

    /// The ideal gate set of a basis.
    pub fn ideal(basis: &GateSetBasis) -> Self {
        Self {
            labels: basis.gate_labels().to_vec(),
            gates: basis.ideal_gates().to_vec(),
            measurement: basis.measurement().clone(),
            rho: basis.rho().clone(),
        }
    }

    /// Gate labels in catalog order.
    pub fn labels(&self) -> &[GateLabel] {
        &self.labels
    }

    /// Gate PTMs in catalog order.
    pub fn gates(&self) -> &[Array2<f64>] {
        &self.gates
    }

    /// PTM of a gate by label.
    pub fn gate(&self, label: &GateLabel) -> CoreResult<&Array2<f64>> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|k| &self.gates[k])
            .ok_or_else(|| CoreError::UnknownGate(label.clone()))
    }

    /// Measurement effect as a Pauli covector.
    pub fn measurement(&self) -> &Array1<f64> {
        &self.measurement
    }

    /// State as a Pauli vector.
    pub fn rho(&self) -> &Array1<f64> {
        &self.rho
    }

    /// Superoperator dimension d².
    pub fn superop_dim(&self) -> usize {
        self.rho.len()
    }

    /// Physical trace of the state, `Tr ρ = √d · rho_0`.
    pub fn rho_trace(&self) -> f64 {
        let d = (self.superop_dim() as f64).sqrt();
        d.sqrt() * self.rho[0]
    }

    /// `E · G_{s0} · G_{s1} · … · rho` for a sequence of gate indices.
    pub fn predict_sequence(&self, seq: &[usize]) -> f64 {
        let v = seq
            .iter()
            .rev()
            .fold(self.rho.clone(), |v, &k| self.gates[k].dot(&v));
        self.measurement.dot(&v)
    }

    /// Predicted probability of one experiment.
    ///
    /// Gate indices refer to the catalog, which must list gates in the same
    /// order as this gate set.
    pub fn predict(&self, catalog: &LabelCatalog, key: &ExperimentKey) -> CoreResult<f64> {
        Ok(self.predict_sequence(&catalog.expand(key)?))
    }

    /// Predict every experiment the catalog needs, clamped to `[0, 1]`.
    pub fn predict_table(&self, catalog: &LabelCatalog) -> CoreResult<ProbabilityTable> {
        let mut table = ProbabilityTable::new();
        for key in catalog.required_keys() {
            let p = self.predict(catalog, &key)?.clamp(0.0, 1.0);
            table.insert(key, p)?;
        }
        Ok(table)
    }

    /// Apply a gauge transform: `(E·B⁻¹, B·rho, B·G·B⁻¹)`.
    pub fn gauge_transform(&self, b: &Array2<f64>) -> CoreResult<Self> {
        let sq = self.superop_dim();
        if b.dim() != (sq, sq) {
            return Err(CoreError::DimensionMismatch {
                context: "gauge transform".to_string(),
                expected: sq,
                got: b.nrows().max(b.ncols()),
            });
        }
        let b_inv = linalg::invert(b).map_err(|e| CoreError::linalg("gauge transform", e))?;
        Ok(Self {
            labels: self.labels.clone(),
            gates: self.gates.iter().map(|g| b.dot(g).dot(&b_inv)).collect(),
            measurement: self.measurement.dot(&b_inv),
            rho: b.dot(&self.rho),
        })
    }

    /// Squared Hilbert-Schmidt distance of every gate to the same-labelled
    /// gate of `other`.
    pub fn gate_distances(&self, other: &GateSet) -> CoreResult<Vec<(GateLabel, f64)>> {
        self.labels
            .iter()
            .zip(&self.gates)
            .map(|(label, g)| Ok((label.clone(), linalg::hs_distance(g, other.gate(label)?))))
            .collect()
    }

    /// Sum of [`gate_distances`](Self::gate_distances).
    pub fn total_gate_distance(&self, other: &GateSet) -> CoreResult<f64> {
        Ok(self.gate_distances(other)?.iter().map(|(_, d)| d).sum())
    }

    /// Export as a label map: each gate, `"E"` as 1×d² and `"rho"` as d²×1.
    ///
    /// A gate labelled `E` or `rho` is shadowed by the SPAM entry.
    pub fn to_map(&self) -> BTreeMap<String, Array2<f64>> {
        let sq = self.superop_dim();
        let mut map: BTreeMap<String, Array2<f64>> = self
            .labels
            .iter()
            .zip(&self.gates)
            .map(|(l, g)| (l.to_string(), g.clone()))
            .collect();
        map.insert(
            "E".to_string(),
            Array2::from_shape_fn((1, sq), |(_, j)| self.measurement[j]),
        );
        map.insert(
            "rho".to_string(),
            Array2::from_shape_fn((sq, 1), |(i, _)| self.rho[i]),
        );
        map
    }

    /// Diagnose how far the gate set is from a physical one.
    pub fn physicality_report(&self, pauli: &PauliBasis) -> CoreResult<PhysicalityReport> {
        let sq = self.superop_dim();
        if pauli.superop_dim() != sq {
            return Err(CoreError::DimensionMismatch {
                context: "Pauli basis".to_string(),
                expected: sq,
                got: pauli.superop_dim(),
            });
        }

        let mut gates = Vec::with_capacity(self.gates.len());
        for (label, g) in self.labels.iter().zip(&self.gates) {
            let top_row_deviation = g
                .row(0)
                .iter()
                .enumerate()
                .map(|(j, &x)| (x - if j == 0 { 1.0 } else { 0.0 }).abs())
                .fold(0.0, f64::max);
            let max_abs_entry = g
                .rows()
                .into_iter()
                .skip(1)
                .flat_map(|row| row.to_vec())
                .map(f64::abs)
                .fold(0.0, f64::max);
            let (eigs, _) = hermitian_eigh(&pauli.ptm_to_choi(g))
                .map_err(|e| CoreError::linalg(format!("Choi matrix of {label}"), e))?;
            gates.push(GatePhysicality {
                label: label.clone(),
                top_row_deviation,
                max_abs_entry,
                min_choi_eigenvalue: eigs[0],
            });
        }

        let rho_op = pauli.operator(&self.rho);
        let (rho_eigs, _) =
            hermitian_eigh(&rho_op).map_err(|e| CoreError::linalg("rho", e))?;

        Ok(PhysicalityReport {
            gates,
            rho_trace: self.rho_trace(),
            min_rho_eigenvalue: rho_eigs[0],
        })
    }
}

/// Physicality diagnostics of one gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatePhysicality {
    /// Gate label.
    pub label: GateLabel,
    /// `max_j |R_0j − δ_0j|`.
    pub top_row_deviation: f64,
    /// Largest `|R_ij|` outside the first row.
    pub max_abs_entry: f64,
    /// Smallest eigenvalue of the Choi matrix.
    pub min_choi_eigenvalue: f64,
}

/// Which physical bound a violation concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhysicalBound {
    /// First PTM row equals `[1, 0, …, 0]`.
    TracePreserving,
    /// PTM entries lie in `[-1, 1]`.
    EntryRange,
    /// Choi matrix is positive semidefinite.
    CompletePositivity,
    /// `Tr ρ = 1`.
    UnitTrace,
    /// ρ is positive semidefinite.
    PositiveState,
}

impl fmt::Display for PhysicalBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PhysicalBound::TracePreserving => "trace preservation (PTM row 0 = [1, 0, ...])",
            PhysicalBound::EntryRange => "PTM entries in [-1, 1]",
            PhysicalBound::CompletePositivity => "positive semidefinite Choi matrix",
            PhysicalBound::UnitTrace => "Tr(rho) = 1",
            PhysicalBound::PositiveState => "positive semidefinite rho",
        };
        f.write_str(name)
    }
}

/// A bound broken by more than the allowed tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundViolation {
    /// Gate label, or `rho`.
    pub object: String,
    /// The broken bound.
    pub bound: PhysicalBound,
    /// Amount by which the bound is exceeded.
    pub deviation: f64,
}

/// Physicality diagnostics of a whole gate set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalityReport {
    /// Per-gate diagnostics in catalog order.
    pub gates: Vec<GatePhysicality>,
    /// `Tr ρ`.
    pub rho_trace: f64,
    /// Smallest eigenvalue of ρ.
    pub min_rho_eigenvalue: f64,
}

impl PhysicalityReport {
    /// Every bound exceeded by more than `tol`, gates first.
    pub fn violations(&self, tol: f64) -> Vec<BoundViolation> {
        let mut out = Vec::new();
        for g in &self.gates {
            let object = g.label.to_string();
            let checks = [
                (PhysicalBound::TracePreserving, g.top_row_deviation),
                (PhysicalBound::EntryRange, g.max_abs_entry - 1.0),
                (PhysicalBound::CompletePositivity, -g.min_choi_eigenvalue),
            ];
            for (bound, deviation) in checks {
                if deviation > tol {
                    out.push(BoundViolation {
                        object: object.clone(),
                        bound,
                        deviation,
                    });
                }
            }
        }
        let trace_dev = (self.rho_trace - 1.0).abs();
        if trace_dev > tol {
            out.push(BoundViolation {
                object: "rho".to_string(),
                bound: PhysicalBound::UnitTrace,
                deviation: trace_dev,
            });
        }
        if -self.min_rho_eigenvalue > tol {
            out.push(BoundViolation {
                object: "rho".to_string(),
                bound: PhysicalBound::PositiveState,
                deviation: -self.min_rho_eigenvalue,
            });
        }
        out
    }

    /// Whether no bound is exceeded by more than `tol`.
    pub fn is_physical(&self, tol: f64) -> bool {
        self.violations(tol).is_empty()
    }
}

/// Product of the gates of a gate set along a sequence.
pub fn compose(gateset: &GateSet, seq: &[usize]) -> Array2<f64> {
    sequence_product(gateset.gates(), seq, gateset.superop_dim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::{ID, X_ROT_90};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn standard() -> (GateSetBasis, GateSet) {
        let basis = GateSetBasis::standard().unwrap();
        let gs = GateSet::ideal(&basis);
        (basis, gs)
    }

    #[test]
    fn test_ideal_predictions() {
        let (basis, gs) = standard();
        let cat = basis.catalog();
        // |0⟩ measured in Z.
        assert_abs_diff_eq!(
            gs.predict(cat, &ExperimentKey::spam("F0", "F0")).unwrap(),
            1.0,
            epsilon = 1e-14
        );
        // X90 takes |0⟩ to the equator.
        assert_abs_diff_eq!(
            gs.predict(cat, &ExperimentKey::spam("F0", "F1")).unwrap(),
            0.5,
            epsilon = 1e-14
        );
        // X180 flips it.
        assert_abs_diff_eq!(
            gs.predict(cat, &ExperimentKey::gate("F1", X_ROT_90, "F0"))
                .unwrap(),
            0.0,
            epsilon = 1e-14
        );
    }

    #[test]
    fn test_predict_table_is_complete() {
        let (basis, gs) = standard();
        let table = gs.predict_table(basis.catalog()).unwrap();
        table.check_complete(basis.catalog()).unwrap();
        assert_eq!(table.len(), 64);
    }

    #[test]
    fn test_gauge_transform_preserves_predictions() {
        let (basis, gs) = standard();
        let b = array![
            [1.0, 0.0, 0.0, 0.0],
            [0.1, 0.9, 0.2, 0.0],
            [0.0, -0.3, 1.1, 0.1],
            [0.05, 0.0, 0.2, 0.8],
        ];
        let moved = gs.gauge_transform(&b).unwrap();
        for key in basis.catalog().required_keys() {
            let p = gs.predict(basis.catalog(), &key).unwrap();
            let q = moved.predict(basis.catalog(), &key).unwrap();
            assert_abs_diff_eq!(p, q, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_singular_gauge_is_an_error() {
        let (_, gs) = standard();
        let err = gs.gauge_transform(&Array2::zeros((4, 4))).unwrap_err();
        assert!(matches!(err, CoreError::LinearAlgebra { .. }));
    }

    #[test]
    fn test_distances() {
        let (_, gs) = standard();
        assert_eq!(gs.total_gate_distance(&gs).unwrap(), 0.0);

        let mut noisy = gs.clone();
        noisy.gates[0] = Array2::from_diag(&array![1.0, 0.9, 0.9, 0.9]);
        let d = gs.gate_distances(&noisy).unwrap();
        assert_eq!(d[0].0, GateLabel::from(ID));
        assert_abs_diff_eq!(d[0].1, 0.03, epsilon = 1e-12);
        assert_eq!(d[1].1, 0.0);
    }

    #[test]
    fn test_to_map_shapes() {
        let (_, gs) = standard();
        let map = gs.to_map();
        assert_eq!(map.len(), 5);
        assert_eq!(map["E"].dim(), (1, 4));
        assert_eq!(map["rho"].dim(), (4, 1));
        assert_eq!(map[X_ROT_90].dim(), (4, 4));
    }

    #[test]
    fn test_new_rejects_bad_state_length() {
        let labels: Vec<GateLabel> = vec!["Id".into()];
        for sq in [0, 1, 5, 8] {
            let result = GateSet::new(
                labels.clone(),
                vec![Array2::eye(sq)],
                Array1::zeros(sq),
                Array1::zeros(sq),
            );
            assert!(
                matches!(result, Err(CoreError::DimensionMismatch { got, .. }) if got == sq),
                "length {sq} accepted"
            );
        }
        let ok = GateSet::new(labels, vec![Array2::eye(4)], Array1::zeros(4), Array1::zeros(4));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_ideal_is_physical() {
        let (basis, gs) = standard();
        let report = gs.physicality_report(basis.pauli()).unwrap();
        assert!(report.is_physical(1e-10));
        assert_abs_diff_eq!(report.rho_trace, 1.0, epsilon = 1e-14);
    }

    #[test]
    fn test_unphysical_gate_reported() {
        let (basis, gs) = standard();
        let mut bad = gs.clone();
        bad.gates[0] = Array2::from_diag(&array![1.0, 1.2, 1.0, 1.0]);
        let violations = bad.physicality_report(basis.pauli()).unwrap().violations(1e-6);
        assert!(violations
            .iter()
            .any(|v| v.object == ID && v.bound == PhysicalBound::EntryRange));
        assert!(violations
            .iter()
            .any(|v| v.bound == PhysicalBound::CompletePositivity));
    }

    #[test]
    fn test_json_roundtrip() {
        let (_, gs) = standard();
        let json = serde_json::to_string(&gs).unwrap();
        let back: GateSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back.labels(), gs.labels());
        assert!(back.total_gate_distance(&gs).unwrap() < 1e-24);
        assert_abs_diff_eq!(back.rho()[3], gs.rho()[3], epsilon = 1e-15);
    }
}
