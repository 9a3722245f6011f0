//! Constrained nonlinear least squares.
//!
//! Minimizes `Σ r_i(x)²` subject to `c(x) = 0` and `h(x) ≥ 0` with a
//! Powell-Hestenes-Rockafellar augmented Lagrangian. Each outer iteration
//! minimizes the stacked residual
//!
//! ```text
//! a(x) = [ r(x) ; √μ·(c(x) + λ/μ) ; √μ·max(0, ν/μ − h(x)) ]
//! ```
//!
//! with Levenberg-Marquardt, then updates the multipliers `λ`, `ν` and the
//! penalty `μ`. Jacobians are forward differences.

use std::time::Duration;

use ndarray::{Array1, Array2};
use qgst_core::linalg::cholesky_solve;
use tracing::{debug, trace};

use super::{Deadline, Termination};

/// Residuals and constraint values at one point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProblemValues {
    /// Least-squares residuals.
    pub residuals: Vec<f64>,
    /// Equality constraints, satisfied at zero.
    pub equalities: Vec<f64>,
    /// Inequality constraints, satisfied when non-negative.
    pub inequalities: Vec<f64>,
}

impl ProblemValues {
    /// `Σ r_i²`.
    pub fn objective(&self) -> f64 {
        self.residuals.iter().map(|r| r * r).sum()
    }

    /// Largest constraint violation.
    pub fn max_violation(&self) -> f64 {
        let eq = self.equalities.iter().map(|c| c.abs());
        let ineq = self.inequalities.iter().map(|h| (-h).max(0.0));
        eq.chain(ineq).fold(0.0, f64::max)
    }

    fn is_finite(&self) -> bool {
        self.residuals
            .iter()
            .chain(&self.equalities)
            .chain(&self.inequalities)
            .all(|v| v.is_finite())
    }
}

/// A least-squares problem with equality and inequality constraints.
///
/// One call to [`evaluate`](Self::evaluate) produces residuals and both
/// constraint vectors, so expensive decoding of `x` happens once per point.
pub trait ConstrainedLeastSquares {
    /// Length of the parameter vector.
    fn num_params(&self) -> usize;

    /// Residuals and constraints at `x`.
    fn evaluate(&self, x: &[f64]) -> ProblemValues;
}

/// Result of a constrained solve.
#[derive(Debug, Clone)]
pub struct ConstrainedResult {
    /// Final parameters.
    pub params: Vec<f64>,
    /// `Σ r_i²` at `params`.
    pub objective: f64,
    /// Largest constraint violation at `params`.
    pub max_violation: f64,
    /// Outer (multiplier) iterations performed.
    pub outer_iterations: usize,
    /// Levenberg-Marquardt iterations summed over all outer iterations.
    pub inner_iterations: usize,
    /// Problem evaluations, including Jacobian columns.
    pub num_evaluations: usize,
    /// Final penalty parameter.
    pub penalty: f64,
    /// Why the solver stopped.
    pub termination: Termination,
}

/// Augmented-Lagrangian solver configuration.
#[derive(Debug, Clone)]
pub struct AugmentedLagrangian {
    /// Maximum multiplier updates.
    pub max_outer: usize,
    /// Maximum Levenberg-Marquardt iterations per outer iteration.
    pub max_inner: usize,
    /// Inner stopping tolerance on gradient, step and relative decrease.
    pub tol: f64,
    /// Largest constraint violation accepted as feasible.
    pub constraint_tol: f64,
    /// Initial penalty μ.
    pub initial_penalty: f64,
    /// Upper bound on μ.
    pub max_penalty: f64,
    /// Relative forward-difference step.
    pub fd_step: f64,
    /// Optional wall-clock budget for the whole solve.
    pub max_duration: Option<Duration>,
}

impl Default for AugmentedLagrangian {
    fn default() -> Self {
        Self {
            max_outer: 30,
            max_inner: 200,
            tol: 1e-10,
            constraint_tol: 1e-8,
            initial_penalty: 10.0,
            max_penalty: 1e8,
            fd_step: 1e-7,
            max_duration: None,
        }
    }
}

/// Multipliers and penalty of the current outer iteration.
struct Lagrangian<'a> {
    lambda: &'a [f64],
    nu: &'a [f64],
    mu: f64,
}

impl Lagrangian<'_> {
    fn augment(&self, values: &ProblemValues) -> Array1<f64> {
        let sqrt_mu = self.mu.sqrt();
        let eq = values
            .equalities
            .iter()
            .zip(self.lambda)
            .map(|(c, l)| sqrt_mu * (c + l / self.mu));
        let ineq = values
            .inequalities
            .iter()
            .zip(self.nu)
            .map(|(h, v)| sqrt_mu * (v / self.mu - h).max(0.0));
        values.residuals.iter().copied().chain(eq).chain(ineq).collect()
    }
}

struct InnerOutcome {
    x: Array1<f64>,
    values: ProblemValues,
    iterations: usize,
    evaluations: usize,
    termination: Termination,
}

impl AugmentedLagrangian {
    /// Create a solver with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set outer and inner iteration limits.
    pub fn with_iterations(mut self, max_outer: usize, max_inner: usize) -> Self {
        self.max_outer = max_outer;
        self.max_inner = max_inner;
        self
    }

    /// Set the wall-clock budget.
    pub fn with_max_duration(mut self, limit: Option<Duration>) -> Self {
        self.max_duration = limit;
        self
    }

    /// Solve `problem` starting from `initial`.
    pub fn solve<P: ConstrainedLeastSquares>(&self, problem: &P, initial: Vec<f64>) -> ConstrainedResult {
        let deadline = Deadline::after(self.max_duration);
        let mut x = Array1::from(initial);
        let mut values = problem.evaluate(x.as_slice().unwrap_or(&[]));
        let mut num_evaluations = 1;

        let mut lambda = vec![0.0; values.equalities.len()];
        let mut nu = vec![0.0; values.inequalities.len()];
        let mut mu = self.initial_penalty;
        let mut previous_violation = values.max_violation();

        let mut termination = Termination::IterationLimit;
        let mut outer_iterations = 0;
        let mut inner_iterations = 0;

        for outer in 0..self.max_outer {
            if deadline.expired() {
                termination = Termination::TimeLimit;
                break;
            }
            let lagrangian = Lagrangian {
                lambda: &lambda,
                nu: &nu,
                mu,
            };
            let inner = self.minimize_inner(problem, &lagrangian, x, values, &deadline);
            x = inner.x;
            values = inner.values;
            inner_iterations += inner.iterations;
            num_evaluations += inner.evaluations;
            outer_iterations = outer + 1;

            let violation = values.max_violation();
            debug!(
                outer,
                objective = values.objective(),
                violation,
                penalty = mu,
                inner_iterations = inner.iterations,
                inner = %inner.termination,
                "Augmented Lagrangian iteration"
            );

            if inner.termination == Termination::TimeLimit {
                termination = Termination::TimeLimit;
                break;
            }
            // A stalled inner solve has no descent step left at this penalty.
            let settled = matches!(
                inner.termination,
                Termination::Converged | Termination::Stalled
            );
            if violation <= self.constraint_tol && settled {
                termination = Termination::Converged;
                break;
            }

            for (l, c) in lambda.iter_mut().zip(&values.equalities) {
                *l += mu * c;
            }
            for (v, h) in nu.iter_mut().zip(&values.inequalities) {
                *v = (*v - mu * h).max(0.0);
            }
            if violation > 0.25 * previous_violation {
                mu = (mu * 10.0).min(self.max_penalty);
            }
            previous_violation = violation;
        }

        ConstrainedResult {
            params: x.to_vec(),
            objective: values.objective(),
            max_violation: values.max_violation(),
            outer_iterations,
            inner_iterations,
            num_evaluations,
            penalty: mu,
            termination,
        }
    }

    fn jacobian<P: ConstrainedLeastSquares>(
        &self,
        problem: &P,
        lagrangian: &Lagrangian<'_>,
        x: &Array1<f64>,
        a: &Array1<f64>,
    ) -> Array2<f64> {
        let mut jac = Array2::zeros((a.len(), x.len()));
        let mut shifted_x = x.to_vec();
        for i in 0..x.len() {
            let h = self.fd_step * x[i].abs().max(1.0);
            shifted_x[i] = x[i] + h;
            let shifted = lagrangian.augment(&problem.evaluate(&shifted_x));
            shifted_x[i] = x[i];
            let mut column = jac.column_mut(i);
            for ((slot, s), base) in column.iter_mut().zip(shifted.iter()).zip(a.iter()) {
                let d = (s - base) / h;
                *slot = if d.is_finite() { d } else { 0.0 };
            }
        }
        jac
    }

    fn minimize_inner<P: ConstrainedLeastSquares>(
        &self,
        problem: &P,
        lagrangian: &Lagrangian<'_>,
        mut x: Array1<f64>,
        mut values: ProblemValues,
        deadline: &Deadline,
    ) -> InnerOutcome {
        let n = x.len();
        let mut a = lagrangian.augment(&values);
        let mut cost = 0.5 * a.dot(&a);
        let mut evaluations = 0;

        let mut jac = self.jacobian(problem, lagrangian, &x, &a);
        evaluations += n;
        let mut jtj = jac.t().dot(&jac);
        let mut grad = jac.t().dot(&a);

        let max_diag = jtj.diag().iter().copied().fold(0.0, f64::max);
        let mut damping = 1e-3 * max_diag.max(1e-12);
        let mut growth = 2.0;
        let mut termination = Termination::IterationLimit;
        let mut iterations = 0;

        for iteration in 0..self.max_inner {
            iterations = iteration;
            if deadline.expired() {
                termination = Termination::TimeLimit;
                break;
            }
            if grad.iter().all(|g| g.abs() <= self.tol) {
                termination = Termination::Converged;
                break;
            }

            let mut system = jtj.clone();
            for i in 0..n {
                system[[i, i]] += damping;
            }
            let Ok(step) = cholesky_solve(&system, &grad.mapv(|g| -g)) else {
                damping *= growth;
                growth *= 2.0;
                continue;
            };

            let step_norm = step.dot(&step).sqrt();
            let x_norm = x.dot(&x).sqrt();
            if step_norm <= self.tol * (x_norm + self.tol) {
                termination = Termination::Converged;
                break;
            }

            let candidate = &x + &step;
            let candidate_values = problem.evaluate(candidate.as_slice().unwrap_or(&[]));
            evaluations += 1;
            let candidate_a = lagrangian.augment(&candidate_values);
            let candidate_cost = 0.5 * candidate_a.dot(&candidate_a);

            let predicted = 0.5 * step.dot(&(&step * damping - &grad));
            let actual = cost - candidate_cost;
            let gain = actual / predicted;

            if candidate_values.is_finite() && predicted > 0.0 && gain > 0.0 {
                trace!(iteration, cost = candidate_cost, damping, "LM step accepted");
                x = candidate;
                values = candidate_values;
                a = candidate_a;
                let previous_cost = cost;
                cost = candidate_cost;
                damping *= (1.0 - (2.0 * gain - 1.0).powi(3)).max(1.0 / 3.0);
                growth = 2.0;

                if actual <= self.tol * previous_cost {
                    iterations = iteration + 1;
                    termination = Termination::Converged;
                    break;
                }

                jac = self.jacobian(problem, lagrangian, &x, &a);
                evaluations += n;
                jtj = jac.t().dot(&jac);
                grad = jac.t().dot(&a);
            } else {
                damping *= growth;
                growth *= 2.0;
                if !damping.is_finite() || damping > 1e32 {
                    iterations = iteration + 1;
                    termination = Termination::Stalled;
                    break;
                }
            }
            iterations = iteration + 1;
        }

        InnerOutcome {
            x,
            values,
            iterations,
            evaluations,
            termination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fit `y = p0 + p1·t` subject to `p0 + p1 = 1` and `p1 ≤ 0.5`.
    struct ConstrainedLine;

    impl ConstrainedLeastSquares for ConstrainedLine {
        fn num_params(&self) -> usize {
            2
        }

        fn evaluate(&self, x: &[f64]) -> ProblemValues {
            let data = [(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)];
            ProblemValues {
                residuals: data.iter().map(|(t, y)| x[0] + x[1] * t - y).collect(),
                equalities: vec![x[0] + x[1] - 1.0],
                inequalities: vec![0.5 - x[1]],
            }
        }
    }

    /// Rosenbrock residuals with no constraints.
    struct Rosenbrock;

    impl ConstrainedLeastSquares for Rosenbrock {
        fn num_params(&self) -> usize {
            2
        }

        fn evaluate(&self, x: &[f64]) -> ProblemValues {
            ProblemValues {
                residuals: vec![1.0 - x[0], 10.0 * (x[1] - x[0] * x[0])],
                ..Default::default()
            }
        }
    }

    #[test]
    fn test_unconstrained_least_squares() {
        let result = AugmentedLagrangian::new().solve(&Rosenbrock, vec![-1.2, 1.0]);
        assert!(result.termination.is_converged());
        assert!(result.objective < 1e-12);
        assert!((result.params[0] - 1.0).abs() < 1e-5);
        assert!((result.params[1] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_active_inequality() {
        let result = AugmentedLagrangian::new().solve(&ConstrainedLine, vec![0.0, 0.0]);
        // With p1 capped at 0.5 the equality forces p0 = 0.5.
        assert!(result.max_violation < 1e-6);
        assert!((result.params[0] - 0.5).abs() < 1e-4);
        assert!((result.params[1] - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_violation_measures() {
        let values = ProblemValues {
            residuals: vec![3.0, 4.0],
            equalities: vec![-0.2, 0.1],
            inequalities: vec![0.5, -0.3],
        };
        assert_eq!(values.objective(), 25.0);
        assert!((values.max_violation() - 0.3).abs() < 1e-15);
    }

    #[test]
    fn test_outer_budget_is_respected() {
        let solver = AugmentedLagrangian::new().with_iterations(1, 2);
        let result = solver.solve(&ConstrainedLine, vec![0.0, 0.0]);
        assert_eq!(result.outer_iterations, 1);
        assert!(result.inner_iterations <= 2);
        assert!(!result.termination.is_converged());
    }
}
