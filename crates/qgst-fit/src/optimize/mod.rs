//! Numerical minimizers used by the gauge and likelihood stages.
//!
//! - [`Bfgs`]: quasi-Newton with finite-difference gradients
//! - [`NelderMead`]: derivative-free simplex search
//! - [`AugmentedLagrangian`]: constrained nonlinear least squares with a
//!   Levenberg-Marquardt inner solver

pub mod augmented;
pub mod bfgs;
pub mod nelder_mead;

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

pub use augmented::{AugmentedLagrangian, ConstrainedLeastSquares, ConstrainedResult, ProblemValues};
pub use bfgs::Bfgs;
pub use nelder_mead::NelderMead;

/// Why a minimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// A convergence criterion was met.
    Converged,
    /// The iteration budget ran out.
    IterationLimit,
    /// The wall-clock budget ran out.
    TimeLimit,
    /// No step could reduce the objective any further.
    Stalled,
}

impl Termination {
    /// Whether a convergence criterion was met.
    pub fn is_converged(self) -> bool {
        self == Termination::Converged
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Termination::Converged => "converged",
            Termination::IterationLimit => "iteration limit reached",
            Termination::TimeLimit => "time limit reached",
            Termination::Stalled => "stalled",
        };
        f.write_str(s)
    }
}

/// Result of an unconstrained minimization.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Best parameters found.
    pub optimal_params: Vec<f64>,
    /// Objective at `optimal_params`.
    pub optimal_value: f64,
    /// Number of objective evaluations.
    pub num_evaluations: usize,
    /// Number of iterations.
    pub num_iterations: usize,
    /// Objective after each accepted iteration.
    pub history: Vec<f64>,
    /// Why the run stopped.
    pub termination: Termination,
}

impl OptimizationResult {
    /// Whether the run converged.
    pub fn converged(&self) -> bool {
        self.termination.is_converged()
    }
}

/// Unconstrained minimizer over a flat parameter vector.
///
/// Objectives may return `f64::INFINITY` for infeasible points; minimizers
/// treat such points as rejected steps.
pub trait Optimizer {
    /// Minimize `objective` starting from `initial_params`.
    fn minimize<F>(&self, objective: F, initial_params: Vec<f64>) -> OptimizationResult
    where
        F: FnMut(&[f64]) -> f64;
}

/// Optional wall-clock limit measured from construction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline(Option<Instant>);

impl Deadline {
    pub(crate) fn after(limit: Option<Duration>) -> Self {
        Deadline(limit.and_then(|d| Instant::now().checked_add(d)))
    }

    pub(crate) fn expired(&self) -> bool {
        self.0.is_some_and(|t| Instant::now() >= t)
    }
}

/// Central-difference gradient, falling back to a one-sided difference when
/// the shifted point is infeasible.
pub(crate) fn numerical_gradient<F>(objective: &mut F, x: &[f64], fx: f64, step: f64) -> (Vec<f64>, usize)
where
    F: FnMut(&[f64]) -> f64,
{
    let mut shifted_x = x.to_vec();
    let mut grad = vec![0.0; x.len()];
    let mut evaluations = 0;
    for i in 0..x.len() {
        let h = step * x[i].abs().max(1.0);
        shifted_x[i] = x[i] + h;
        let f_plus = objective(&shifted_x);
        shifted_x[i] = x[i] - h;
        let f_minus = objective(&shifted_x);
        shifted_x[i] = x[i];
        evaluations += 2;

        grad[i] = match (f_plus.is_finite(), f_minus.is_finite()) {
            (true, true) => (f_plus - f_minus) / (2.0 * h),
            (true, false) => (f_plus - fx) / h,
            (false, true) => (fx - f_minus) / h,
            (false, false) => 0.0,
        };
    }
    (grad, evaluations)
}
