//! BFGS quasi-Newton minimizer with finite-difference gradients.

use std::time::Duration;

use ndarray::{Array1, Array2};

use super::{Deadline, OptimizationResult, Optimizer, Termination, numerical_gradient};

const ARMIJO_C1: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 50;

/// BFGS optimizer configuration.
#[derive(Debug, Clone)]
pub struct Bfgs {
    /// Maximum number of iterations.
    pub maxiter: usize,
    /// Stop when the largest gradient component falls below this.
    pub gtol: f64,
    /// Stop when the objective, or its relative decrease, falls below this.
    pub ftol: f64,
    /// Relative finite-difference step.
    pub fd_step: f64,
    /// Optional wall-clock budget.
    pub max_duration: Option<Duration>,
}

impl Default for Bfgs {
    fn default() -> Self {
        Self {
            maxiter: 500,
            gtol: 1e-8,
            ftol: 1e-12,
            fd_step: 1e-7,
            max_duration: None,
        }
    }
}

impl Bfgs {
    /// Create a new BFGS optimizer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum iterations.
    pub fn with_maxiter(mut self, maxiter: usize) -> Self {
        self.maxiter = maxiter;
        self
    }

    /// Set gradient and objective tolerances.
    pub fn with_tol(mut self, gtol: f64, ftol: f64) -> Self {
        self.gtol = gtol;
        self.ftol = ftol;
        self
    }

    /// Set the wall-clock budget.
    pub fn with_max_duration(mut self, limit: Option<Duration>) -> Self {
        self.max_duration = limit;
        self
    }
}

impl Optimizer for Bfgs {
    fn minimize<F>(&self, mut objective: F, initial_params: Vec<f64>) -> OptimizationResult
    where
        F: FnMut(&[f64]) -> f64,
    {
        let deadline = Deadline::after(self.max_duration);
        let n = initial_params.len();
        let mut x = Array1::from(initial_params);
        let mut f_x = objective(x.as_slice().unwrap_or(&[]));
        let mut num_evaluations = 1;
        let mut history = vec![f_x];

        if !f_x.is_finite() {
            return OptimizationResult {
                optimal_params: x.to_vec(),
                optimal_value: f_x,
                num_evaluations,
                num_iterations: 0,
                history,
                termination: Termination::Stalled,
            };
        }

        let (g, evals) = numerical_gradient(&mut objective, &x.to_vec(), f_x, self.fd_step);
        num_evaluations += evals;
        let mut grad = Array1::from(g);
        let mut h_inv = Array2::<f64>::eye(n);
        let mut first_step = true;
        let mut termination = Termination::IterationLimit;
        let mut num_iterations = 0;

        for iteration in 0..self.maxiter {
            num_iterations = iteration;
            if deadline.expired() {
                termination = Termination::TimeLimit;
                break;
            }
            if f_x <= self.ftol || grad.iter().all(|g| g.abs() <= self.gtol) {
                termination = Termination::Converged;
                break;
            }

            let mut direction = -h_inv.dot(&grad);
            let mut slope = grad.dot(&direction);
            if slope >= 0.0 || !slope.is_finite() {
                // Curvature information went bad; restart from steepest descent.
                h_inv = Array2::eye(n);
                direction = -&grad;
                slope = -grad.dot(&grad);
                first_step = true;
            }

            // Backtracking Armijo line search.
            let mut alpha = 1.0;
            let mut accepted = None;
            for _ in 0..MAX_BACKTRACKS {
                let candidate = &x + &(&direction * alpha);
                let f_candidate = objective(candidate.as_slice().unwrap_or(&[]));
                num_evaluations += 1;
                if f_candidate.is_finite() && f_candidate <= f_x + ARMIJO_C1 * alpha * slope {
                    accepted = Some((candidate, f_candidate));
                    break;
                }
                alpha *= 0.5;
            }

            let Some((x_new, f_new)) = accepted else {
                termination = if f_x <= self.ftol.sqrt() {
                    Termination::Converged
                } else {
                    Termination::Stalled
                };
                break;
            };

            let (g, evals) =
                numerical_gradient(&mut objective, &x_new.to_vec(), f_new, self.fd_step);
            num_evaluations += evals;
            let grad_new = Array1::from(g);

            let s = &x_new - &x;
            let y = &grad_new - &grad;
            let sy = s.dot(&y);
            let decrease = f_x - f_new;

            x = x_new;
            f_x = f_new;
            grad = grad_new;
            history.push(f_x);

            if decrease <= self.ftol * f_x.abs().max(1.0) {
                num_iterations = iteration + 1;
                termination = Termination::Converged;
                break;
            }

            if sy > 1e-14 {
                if first_step {
                    h_inv *= sy / y.dot(&y);
                    first_step = false;
                }
                let rho = 1.0 / sy;
                let hy = h_inv.dot(&y);
                let yhy = y.dot(&hy);
                // H ← H − ρ(H y sᵀ + s yᵀ H) + (ρ² yᵀHy + ρ) s sᵀ
                for i in 0..n {
                    for j in 0..n {
                        h_inv[[i, j]] += -rho * (hy[i] * s[j] + s[i] * hy[j])
                            + (rho * rho * yhy + rho) * s[i] * s[j];
                    }
                }
            }
            num_iterations = iteration + 1;
        }

        OptimizationResult {
            optimal_params: x.to_vec(),
            optimal_value: f_x,
            num_evaluations,
            num_iterations,
            history,
            termination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bfgs_quadratic() {
        let bfgs = Bfgs::new().with_maxiter(100);

        // Minimize (x-1)^2 + 10(y-2)^2
        let result = bfgs.minimize(
            |p| (p[0] - 1.0).powi(2) + 10.0 * (p[1] - 2.0).powi(2),
            vec![0.0, 0.0],
        );

        assert!(result.converged());
        assert!(result.optimal_value < 1e-10);
        assert!((result.optimal_params[0] - 1.0).abs() < 1e-5);
        assert!((result.optimal_params[1] - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_bfgs_rosenbrock() {
        let bfgs = Bfgs::new().with_maxiter(2000);

        let result = bfgs.minimize(
            |p| (1.0 - p[0]).powi(2) + 100.0 * (p[1] - p[0].powi(2)).powi(2),
            vec![-1.2, 1.0],
        );

        assert!(result.optimal_value < 1e-6);
        assert!((result.optimal_params[0] - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_bfgs_avoids_infeasible_region() {
        let bfgs = Bfgs::new();

        // Minimum at x = 0.5; everything below 0.2 is infeasible.
        let result = bfgs.minimize(
            |p| {
                if p[0] < 0.2 {
                    f64::INFINITY
                } else {
                    (p[0] - 0.5).powi(2)
                }
            },
            vec![3.0],
        );

        assert!(result.optimal_value.is_finite());
        assert!((result.optimal_params[0] - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_bfgs_infeasible_start() {
        let result = Bfgs::new().minimize(|_| f64::INFINITY, vec![1.0]);
        assert_eq!(result.termination, Termination::Stalled);
        assert_eq!(result.num_evaluations, 1);
    }

    #[test]
    fn test_bfgs_iteration_limit() {
        let result = Bfgs::new()
            .with_maxiter(1)
            .minimize(|p| (1.0 - p[0]).powi(2) + 100.0 * (p[1] - p[0].powi(2)).powi(2), vec![-1.2, 1.0]);
        assert_eq!(result.termination, Termination::IterationLimit);
    }
}
