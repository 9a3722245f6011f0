//! Constrained maximum-likelihood refinement.
//!
//! Every object is parameterized by a complex factor `T` so that positivity
//! holds by construction:
//!
//! - the measurement effect and the state are `T·T†` (d×d), converted to
//!   Pauli (co)vectors;
//! - each gate's Choi matrix is `T·T†` (d²×d²), converted to a PTM.
//!
//! A factor with `n×n` entries occupies `2n²` parameters: real parts
//! row-major, then imaginary parts row-major. The parameter vector is laid
//! out as `[E, rho, G_0, G_1, …]`.
//!
//! The fit minimizes the squared residuals of every `(F_i, G_k, F_j)`
//! experiment subject to `Tr ρ = 1`, first PTM row `[1, 0, …, 0]`, and every
//! other PTM entry in `[-1, 1]`.

use ndarray::{Array1, Array2};
use num_complex::Complex64;
use qgst_core::linalg::{outer_self, sqrt_factor};
use qgst_core::{CoreError, GateSet, GateSetBasis, PauliBasis, ProbabilityTable};
use tracing::{info, instrument};

use crate::config::MleConfig;
use crate::error::{FitError, FitResult};
use crate::optimize::{ConstrainedLeastSquares, ProblemValues, Termination};

/// Decoded values of one parameter vector.
#[derive(Debug, Clone)]
pub struct Decoded {
    /// Measurement effect as a Pauli covector.
    pub measurement: Array1<f64>,
    /// State as a Pauli vector.
    pub rho: Array1<f64>,
    /// `Tr ρ` computed from the density matrix.
    pub rho_trace: Complex64,
    /// Gate PTMs in catalog order.
    pub gates: Vec<Array2<f64>>,
}

/// The least-squares problem for one probability table.
#[derive(Debug, Clone)]
pub struct MleProblem<'a> {
    basis: &'a GateSetBasis,
    /// Gate indices of each fiducial, in multiplication order.
    fiducials: Vec<Vec<usize>>,
    /// Observed `P(F_i, G_k, F_j)` at `[k][i·n + j]`.
    observed: Vec<Vec<f64>>,
}

fn factor_len(n: usize) -> usize {
    2 * n * n
}

fn read_factor(params: &[f64], n: usize) -> Array2<Complex64> {
    let (re, im) = params.split_at(n * n);
    Array2::from_shape_fn((n, n), |(i, j)| Complex64::new(re[i * n + j], im[i * n + j]))
}

fn write_factor(t: &Array2<Complex64>, out: &mut Vec<f64>) {
    out.extend(t.iter().map(|z| z.re));
    out.extend(t.iter().map(|z| z.im));
}

impl<'a> MleProblem<'a> {
    /// Collect the observed gate experiments from a table.
    pub fn new(basis: &'a GateSetBasis, table: &ProbabilityTable) -> FitResult<Self> {
        let catalog = basis.catalog();
        let observed = (0..catalog.num_gates())
            .map(|k| {
                catalog
                    .gate_keys(k)
                    .iter()
                    .map(|key| table.get(key))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        let fiducials = (0..catalog.num_spam())
            .map(|i| catalog.fiducial_indices(i))
            .collect();
        Ok(Self {
            basis,
            fiducials,
            observed,
        })
    }

    fn pauli(&self) -> &PauliBasis {
        self.basis.pauli()
    }

    fn num_gates(&self) -> usize {
        self.observed.len()
    }

    /// Decode a parameter vector.
    pub fn decode(&self, params: &[f64]) -> Decoded {
        let d = self.basis.dim();
        let sq = self.basis.superop_dim();
        let spam_len = factor_len(d);
        let gate_len = factor_len(sq);

        let e_op = outer_self(&read_factor(&params[..spam_len], d));
        let rho_op = outer_self(&read_factor(&params[spam_len..2 * spam_len], d));
        let rho_trace = rho_op.diag().sum();

        let gates = (0..self.num_gates())
            .map(|k| {
                let start = 2 * spam_len + k * gate_len;
                let choi = outer_self(&read_factor(&params[start..start + gate_len], sq));
                self.pauli().choi_to_ptm(&choi)
            })
            .collect();

        Decoded {
            measurement: self.pauli().vectorize(&e_op),
            rho: self.pauli().vectorize(&rho_op),
            rho_trace,
            gates,
        }
    }

    /// Decode a parameter vector into a gate set.
    pub fn decode_gate_set(&self, params: &[f64]) -> FitResult<GateSet> {
        let decoded = self.decode(params);
        Ok(GateSet::new(
            self.basis.gate_labels().to_vec(),
            decoded.gates,
            decoded.measurement,
            decoded.rho,
        )?)
    }

    /// Gates of `gate_set` in catalog order, looked up by label.
    ///
    /// Fails if the gate set has another superoperator dimension or does
    /// not carry exactly the basis gates.
    fn catalog_gates<'g>(&self, gate_set: &'g GateSet) -> FitResult<Vec<&'g Array2<f64>>> {
        let sq = self.basis.superop_dim();
        if gate_set.superop_dim() != sq {
            return Err(CoreError::DimensionMismatch {
                context: "gate set superoperator dimension".to_string(),
                expected: sq,
                got: gate_set.superop_dim(),
            }
            .into());
        }
        let labels = self.basis.gate_labels();
        if gate_set.labels().len() != labels.len() {
            return Err(CoreError::DimensionMismatch {
                context: "gate set gate count".to_string(),
                expected: labels.len(),
                got: gate_set.labels().len(),
            }
            .into());
        }
        Ok(labels
            .iter()
            .map(|label| gate_set.gate(label))
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Encode a gate set, factoring each object's PSD part.
    pub fn encode(&self, gate_set: &GateSet) -> FitResult<Vec<f64>> {
        let gates = self.catalog_gates(gate_set)?;
        let pauli = self.pauli();
        let mut params = Vec::with_capacity(self.num_params());

        let e_factor = sqrt_factor(&pauli.operator(gate_set.measurement()))
            .map_err(|e| FitError::linalg("factoring E", e))?;
        write_factor(&e_factor, &mut params);
        let rho_factor = sqrt_factor(&pauli.operator(gate_set.rho()))
            .map_err(|e| FitError::linalg("factoring rho", e))?;
        write_factor(&rho_factor, &mut params);

        for gate in gates {
            let choi = pauli.ptm_to_choi(gate);
            let factor =
                sqrt_factor(&choi).map_err(|e| FitError::linalg("factoring a Choi matrix", e))?;
            write_factor(&factor, &mut params);
        }
        Ok(params)
    }

    /// `E·F_i·G_k·F_j·rho − P(F_i, G_k, F_j)` for every experiment.
    fn residuals(
        &self,
        measurement: &Array1<f64>,
        rho: &Array1<f64>,
        gates: &[&Array2<f64>],
    ) -> Vec<f64> {
        // Measurement rows E·F_i and preparation columns F_j·rho.
        let lefts: Vec<Array1<f64>> = self
            .fiducials
            .iter()
            .map(|seq| seq.iter().fold(measurement.clone(), |v, &g| v.dot(gates[g])))
            .collect();
        let rights: Vec<Array1<f64>> = self
            .fiducials
            .iter()
            .map(|seq| seq.iter().rev().fold(rho.clone(), |v, &g| gates[g].dot(&v)))
            .collect();

        let n = self.fiducials.len();
        let mut out = Vec::with_capacity(self.num_gates() * n * n);
        for (gate, observed) in gates.iter().zip(&self.observed) {
            let moved: Vec<Array1<f64>> = rights.iter().map(|r| gate.dot(r)).collect();
            for (i, left) in lefts.iter().enumerate() {
                for (j, right) in moved.iter().enumerate() {
                    out.push(left.dot(right) - observed[i * n + j]);
                }
            }
        }
        out
    }

    /// Sum of squared residuals of an arbitrary gate set.
    ///
    /// Gates are matched to the catalog by label, so their order in
    /// `gate_set` does not matter.
    pub fn objective(&self, gate_set: &GateSet) -> FitResult<f64> {
        let gates = self.catalog_gates(gate_set)?;
        Ok(self
            .residuals(gate_set.measurement(), gate_set.rho(), &gates)
            .iter()
            .map(|r| r * r)
            .sum())
    }
}

impl ConstrainedLeastSquares for MleProblem<'_> {
    fn num_params(&self) -> usize {
        2 * factor_len(self.basis.dim()) + self.num_gates() * factor_len(self.basis.superop_dim())
    }

    fn evaluate(&self, x: &[f64]) -> ProblemValues {
        let decoded = self.decode(x);
        let sq = self.basis.superop_dim();

        let mut equalities = Vec::with_capacity(2 + self.num_gates() * sq);
        equalities.push(decoded.rho_trace.re - 1.0);
        equalities.push(decoded.rho_trace.im);
        let mut inequalities = Vec::with_capacity(2 * self.num_gates() * sq * (sq - 1));

        for ptm in &decoded.gates {
            for (j, &v) in ptm.row(0).iter().enumerate() {
                equalities.push(v - if j == 0 { 1.0 } else { 0.0 });
            }
            for &v in ptm.rows().into_iter().skip(1).flatten() {
                inequalities.push(v + 1.0);
                inequalities.push(1.0 - v);
            }
        }

        ProblemValues {
            residuals: self.residuals(
                &decoded.measurement,
                &decoded.rho,
                &decoded.gates.iter().collect::<Vec<_>>(),
            ),
            equalities,
            inequalities,
        }
    }
}

/// Outcome of the constrained fit.
#[derive(Debug, Clone)]
pub struct MleResult {
    /// Physical gate set.
    pub gate_set: GateSet,
    /// Sum of squared residuals.
    pub objective: f64,
    /// Largest constraint violation reported by the solver.
    pub max_violation: f64,
    /// Multiplier updates performed.
    pub outer_iterations: usize,
    /// Levenberg-Marquardt iterations performed.
    pub inner_iterations: usize,
    /// Problem evaluations.
    pub evaluations: usize,
    /// Why the solver stopped.
    pub termination: Termination,
}

/// Runs the constrained fit and checks the physicality of the result.
#[derive(Debug, Clone)]
pub struct MleOptimizer<'a> {
    basis: &'a GateSetBasis,
    config: MleConfig,
}

impl<'a> MleOptimizer<'a> {
    /// Create an optimizer for a basis.
    pub fn new(basis: &'a GateSetBasis, config: MleConfig) -> Self {
        Self { basis, config }
    }

    /// Sum of squared residuals of `gate_set` against `table`.
    pub fn objective(&self, table: &ProbabilityTable, gate_set: &GateSet) -> FitResult<f64> {
        MleProblem::new(self.basis, table)?.objective(gate_set)
    }

    /// Fit starting from `seed`.
    ///
    /// A final estimate that breaks a physical bound by more than the
    /// configured tolerance is an error; running out of budget is not.
    #[instrument(skip_all, fields(gates = self.basis.catalog().num_gates()))]
    pub fn fit(&self, table: &ProbabilityTable, seed: &GateSet) -> FitResult<MleResult> {
        let problem = MleProblem::new(self.basis, table)?;
        let initial = problem.encode(seed)?;
        let solution = self.config.solver().solve(&problem, initial);
        let gate_set = problem.decode_gate_set(&solution.params)?;

        info!(
            objective = solution.objective,
            violation = solution.max_violation,
            outer = solution.outer_iterations,
            inner = solution.inner_iterations,
            termination = %solution.termination,
            "Constrained fit finished"
        );

        let report = gate_set.physicality_report(self.basis.pauli())?;
        if let Some(v) = report
            .violations(self.config.physicality_tolerance)
            .into_iter()
            .next()
        {
            return Err(FitError::ConstraintViolation {
                object: v.object,
                bound: v.bound,
                deviation: v.deviation,
            });
        }

        Ok(MleResult {
            gate_set,
            objective: solution.objective,
            max_violation: solution.max_violation,
            outer_iterations: solution.outer_iterations,
            inner_iterations: solution.inner_iterations,
            evaluations: solution.num_evaluations,
            termination: solution.termination,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use qgst_core::PhysicalBound;

    fn setup() -> (GateSetBasis, GateSet, ProbabilityTable) {
        let basis = GateSetBasis::standard().unwrap();
        let ideal = GateSet::ideal(&basis);
        let table = ideal.predict_table(basis.catalog()).unwrap();
        (basis, ideal, table)
    }

    #[test]
    fn test_layout_size() {
        let (basis, _, table) = setup();
        let problem = MleProblem::new(&basis, &table).unwrap();
        // 2·(2·4) for SPAM, 3·(2·16) for gates.
        assert_eq!(problem.num_params(), 16 + 96);
    }

    #[test]
    fn test_encode_decode_preserves_physical_gate_set() {
        let (basis, ideal, table) = setup();
        let problem = MleProblem::new(&basis, &table).unwrap();
        let params = problem.encode(&ideal).unwrap();
        assert_eq!(params.len(), problem.num_params());

        let decoded = problem.decode_gate_set(&params).unwrap();
        assert!(decoded.total_gate_distance(&ideal).unwrap() < 1e-20);
        for (x, y) in decoded.rho().iter().zip(ideal.rho().iter()) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_ideal_point_is_feasible_with_zero_residual() {
        let (basis, ideal, table) = setup();
        let problem = MleProblem::new(&basis, &table).unwrap();
        let values = problem.evaluate(&problem.encode(&ideal).unwrap());
        assert!(values.objective() < 1e-24);
        assert!(values.max_violation() < 1e-12);
        assert_eq!(values.equalities.len(), 2 + 3 * 4);
        assert_eq!(values.inequalities.len(), 3 * 2 * 12);
        assert_eq!(values.residuals.len(), 3 * 16);
    }

    #[test]
    fn test_trace_constraint_sees_scaled_state() {
        let (basis, ideal, table) = setup();
        let problem = MleProblem::new(&basis, &table).unwrap();
        let mut params = problem.encode(&ideal).unwrap();
        // Scale the rho factor by √2 so Tr ρ = 2.
        for p in &mut params[8..16] {
            *p *= std::f64::consts::SQRT_2;
        }
        let values = problem.evaluate(&params);
        assert_abs_diff_eq!(values.equalities[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(values.equalities[1], 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_fit_from_ideal_stays_put() {
        let (basis, ideal, table) = setup();
        let result = MleOptimizer::new(&basis, MleConfig::default())
            .fit(&table, &ideal)
            .unwrap();
        assert!(result.termination.is_converged());
        assert!(result.objective < 1e-16);
        assert!(result.gate_set.total_gate_distance(&ideal).unwrap() < 1e-10);
    }

    #[test]
    fn test_objective_of_arbitrary_gate_set() {
        let (basis, ideal, table) = setup();
        let mle = MleOptimizer::new(&basis, MleConfig::default());
        assert!(mle.objective(&table, &ideal).unwrap() < 1e-24);

        let shifted = ideal
            .gauge_transform(&Array2::from_diag(&ndarray::array![1.0, 0.9, 1.1, 0.8]))
            .unwrap();
        assert!(mle.objective(&table, &shifted).unwrap() < 1e-24);
    }

    #[test]
    fn test_mismatched_gate_set_is_rejected() {
        let (basis, ideal, table) = setup();
        let problem = MleProblem::new(&basis, &table).unwrap();

        let two_qubit = GateSet::new(
            ideal.labels().to_vec(),
            vec![Array2::eye(16); 3],
            Array1::zeros(16),
            Array1::zeros(16),
        )
        .unwrap();
        for result in [
            problem.encode(&two_qubit).map(|_| ()),
            problem.objective(&two_qubit).map(|_| ()),
        ] {
            assert!(matches!(
                result,
                Err(FitError::Core(CoreError::DimensionMismatch {
                    expected: 4,
                    got: 16,
                    ..
                }))
            ));
        }

        let renamed = GateSet::new(
            vec!["Id".into(), "X_Rot_90".into(), "Z_Rot_90".into()],
            ideal.gates().to_vec(),
            ideal.measurement().clone(),
            ideal.rho().clone(),
        )
        .unwrap();
        assert!(matches!(
            problem.objective(&renamed),
            Err(FitError::Core(CoreError::UnknownGate(_)))
        ));

        let truncated = GateSet::new(
            ideal.labels()[..2].to_vec(),
            ideal.gates()[..2].to_vec(),
            ideal.measurement().clone(),
            ideal.rho().clone(),
        )
        .unwrap();
        assert!(matches!(
            problem.encode(&truncated),
            Err(FitError::Core(CoreError::DimensionMismatch { expected: 3, got: 2, .. }))
        ));
    }

    #[test]
    fn test_objective_matches_gates_by_label() {
        let (basis, ideal, table) = setup();
        let problem = MleProblem::new(&basis, &table).unwrap();
        let mut labels = ideal.labels().to_vec();
        let mut gates = ideal.gates().to_vec();
        labels.reverse();
        gates.reverse();
        let reordered =
            GateSet::new(labels, gates, ideal.measurement().clone(), ideal.rho().clone()).unwrap();
        assert!(problem.objective(&reordered).unwrap() < 1e-24);

        let params = problem.encode(&reordered).unwrap();
        assert_eq!(params, problem.encode(&ideal).unwrap());
    }

    #[test]
    fn test_unphysical_result_is_reported() {
        let (basis, ideal, table) = setup();
        // A zero budget leaves the seed untouched, and a seed with Tr ρ = 2
        // survives into the final estimate.
        let config = MleConfig {
            max_outer_iterations: 1,
            max_inner_iterations: 1,
            max_seconds: Some(1e-9),
            ..MleConfig::default()
        };
        let doubled = GateSet::new(
            ideal.labels().to_vec(),
            ideal.gates().to_vec(),
            ideal.measurement().clone(),
            ideal.rho() * 2.0,
        )
        .unwrap();
        let err = MleOptimizer::new(&basis, config)
            .fit(&table, &doubled)
            .unwrap_err();
        assert!(matches!(
            err,
            FitError::ConstraintViolation {
                bound: PhysicalBound::UnitTrace,
                ..
            }
        ));
    }
}
