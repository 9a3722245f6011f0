//! Gauge optimization.
//!
//! Linear inversion only determines a gate set up to an invertible `B`.
//! This stage searches for the `B` that brings the raw estimate closest to
//! the ideal gates,
//!
//! ```text
//! min_B  Σ_k ‖G_k,ideal − B·G_k,raw·B⁻¹‖_F
//! ```
//!
//! starting from `B₀ = [F_j·rho]`, which is exact for noiseless data.

use ndarray::Array2;
use qgst_core::linalg::{frobenius_norm, invert};
use qgst_core::{GateLabel, GateSet, GateSetBasis};
use tracing::{debug, info, instrument};

use crate::config::{GaugeConfig, GaugeMethod};
use crate::error::FitResult;
use crate::linear_inversion::RawEstimate;
use crate::optimize::{OptimizationResult, Optimizer, Termination};

/// Outcome of gauge optimization.
#[derive(Debug, Clone)]
pub struct GaugeResult {
    /// The optimal transform `B`.
    pub transform: Array2<f64>,
    /// Gauge-fixed gate set.
    pub gate_set: GateSet,
    /// Objective value at `transform`.
    pub distance: f64,
    /// `‖G_k,ideal − B·G_k,raw·B⁻¹‖_F` per gate.
    pub gate_distances: Vec<(GateLabel, f64)>,
    /// Minimizer iterations.
    pub iterations: usize,
    /// Objective evaluations.
    pub evaluations: usize,
    /// Why the minimizer stopped.
    pub termination: Termination,
}

/// Finds the gauge that best aligns a raw estimate with the ideal gates.
#[derive(Debug, Clone)]
pub struct GaugeOptimizer<'a> {
    basis: &'a GateSetBasis,
    config: GaugeConfig,
}

impl<'a> GaugeOptimizer<'a> {
    /// Create an optimizer for a basis.
    pub fn new(basis: &'a GateSetBasis, config: GaugeConfig) -> Self {
        Self { basis, config }
    }

    /// Per-gate distances after applying `b`, or `None` if `b` is singular.
    pub fn gate_distances(&self, raw_gates: &[Array2<f64>], b: &Array2<f64>) -> Option<Vec<f64>> {
        let b_inv = invert(b).ok()?;
        Some(
            self.basis
                .ideal_gates()
                .iter()
                .zip(raw_gates)
                .map(|(ideal, raw)| frobenius_norm(&(ideal - &b.dot(raw).dot(&b_inv))))
                .collect(),
        )
    }

    /// Total distance after applying `b`; `f64::INFINITY` if `b` is singular.
    pub fn objective(&self, raw_gates: &[Array2<f64>], b: &Array2<f64>) -> f64 {
        self.gate_distances(raw_gates, b)
            .map_or(f64::INFINITY, |d| d.iter().sum())
    }

    /// Run the configured minimizer from the standard seed.
    #[instrument(skip_all, fields(method = %self.config.method))]
    pub fn optimize(&self, raw: &RawEstimate) -> FitResult<GaugeResult> {
        let seed = self.basis.preparation_matrix();
        self.optimize_from(raw, seed)
    }

    /// Run the configured minimizer from an explicit seed.
    pub fn optimize_from(&self, raw: &RawEstimate, seed: Array2<f64>) -> FitResult<GaugeResult> {
        let sq = self.basis.superop_dim();
        let to_matrix = |params: &[f64]| {
            Array2::from_shape_vec((sq, sq), params.to_vec()).unwrap_or_else(|_| Array2::zeros((sq, sq)))
        };
        let objective = |params: &[f64]| self.objective(&raw.gates, &to_matrix(params));

        let initial: Vec<f64> = seed.iter().copied().collect();
        debug!(seed_distance = objective(&initial), "Starting gauge optimization");

        let result: OptimizationResult = match self.config.method {
            GaugeMethod::Bfgs => self.config.bfgs().minimize(objective, initial),
            GaugeMethod::NelderMead => self.config.nelder_mead().minimize(objective, initial),
        };

        let transform = to_matrix(&result.optimal_params);
        let gate_set = apply(self.basis, raw, &transform)?;
        let gate_distances = self
            .gate_distances(&raw.gates, &transform)
            .unwrap_or_default();

        info!(
            distance = result.optimal_value,
            iterations = result.num_iterations,
            evaluations = result.num_evaluations,
            termination = %result.termination,
            "Gauge optimization finished"
        );

        Ok(GaugeResult {
            transform,
            gate_set,
            distance: result.optimal_value,
            gate_distances: raw.labels.iter().cloned().zip(gate_distances).collect(),
            iterations: result.num_iterations,
            evaluations: result.num_evaluations,
            termination: result.termination,
        })
    }
}

/// Apply `b` to the raw gates and whichever SPAM the raw estimate carries;
/// missing SPAM is taken from the basis reference.
fn apply(basis: &GateSetBasis, raw: &RawEstimate, b: &Array2<f64>) -> FitResult<GateSet> {
    let moved = raw.to_gate_set(basis)?.gauge_transform(b)?;
    let measurement = match raw.measurement {
        Some(_) => moved.measurement().clone(),
        None => basis.measurement().clone(),
    };
    let rho = match raw.rho {
        Some(_) => moved.rho().clone(),
        None => basis.rho().clone(),
    };
    Ok(GateSet::new(
        moved.labels().to_vec(),
        moved.gates().to_vec(),
        measurement,
        rho,
    )?)
}
