//! Nelder-Mead simplex minimizer.
//!
//! Derivative-free, so it tolerates the non-smooth points of the gauge
//! objective, at the cost of many more evaluations than [`super::Bfgs`].

use std::time::Duration;

use super::{Deadline, OptimizationResult, Optimizer, Termination};

/// Nelder-Mead optimizer configuration.
#[derive(Debug, Clone)]
pub struct NelderMead {
    /// Maximum number of iterations.
    pub maxiter: usize,
    /// Stop when the objective spread across the simplex falls below this.
    pub ftol: f64,
    /// Stop when the simplex diameter falls below this.
    pub xtol: f64,
    /// Edge length of the initial simplex.
    pub initial_step: f64,
    /// Optional wall-clock budget.
    pub max_duration: Option<Duration>,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            maxiter: 5000,
            ftol: 1e-12,
            xtol: 1e-10,
            initial_step: 0.05,
            max_duration: None,
        }
    }
}

impl NelderMead {
    /// Create a new Nelder-Mead optimizer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum iterations.
    pub fn with_maxiter(mut self, maxiter: usize) -> Self {
        self.maxiter = maxiter;
        self
    }

    /// Set convergence tolerance on the objective spread.
    pub fn with_tol(mut self, ftol: f64) -> Self {
        self.ftol = ftol;
        self
    }

    /// Set the initial simplex edge length.
    pub fn with_initial_step(mut self, step: f64) -> Self {
        self.initial_step = step;
        self
    }

    /// Set the wall-clock budget.
    pub fn with_max_duration(mut self, limit: Option<Duration>) -> Self {
        self.max_duration = limit;
        self
    }
}

fn order(values: &[f64]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..values.len()).collect();
    indices.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    indices
}

impl Optimizer for NelderMead {
    fn minimize<F>(&self, mut objective: F, initial_params: Vec<f64>) -> OptimizationResult
    where
        F: FnMut(&[f64]) -> f64,
    {
        let deadline = Deadline::after(self.max_duration);
        let n = initial_params.len();
        let mut num_evaluations = 0;
        let mut eval = |p: &[f64], count: &mut usize| {
            *count += 1;
            let v = objective(p);
            // NaN would poison the ordering.
            if v.is_nan() { f64::INFINITY } else { v }
        };

        let mut simplex: Vec<Vec<f64>> = vec![initial_params.clone()];
        let mut f_simplex = vec![eval(&initial_params, &mut num_evaluations)];
        for i in 0..n {
            let mut point = initial_params.clone();
            point[i] += self.initial_step;
            f_simplex.push(eval(&point, &mut num_evaluations));
            simplex.push(point);
        }

        let mut history = vec![f_simplex[0]];
        let mut termination = Termination::IterationLimit;
        let mut num_iterations = 0;

        for iteration in 0..self.maxiter {
            num_iterations = iteration;
            if deadline.expired() {
                termination = Termination::TimeLimit;
                break;
            }

            let indices = order(&f_simplex);
            let best_idx = indices[0];
            let worst_idx = indices[n];
            let second_worst_idx = indices[n.saturating_sub(1)];

            // Check convergence
            let spread = f_simplex[worst_idx] - f_simplex[best_idx];
            let diameter = simplex
                .iter()
                .flat_map(|p| p.iter().zip(&simplex[best_idx]).map(|(a, b)| (a - b).abs()))
                .fold(0.0, f64::max);
            if (spread.is_finite() && spread <= self.ftol) || diameter <= self.xtol {
                termination = Termination::Converged;
                break;
            }

            // Centroid of all points except worst
            let mut centroid = vec![0.0; n];
            for &idx in &indices[..n] {
                for (c, x) in centroid.iter_mut().zip(&simplex[idx]) {
                    *c += x;
                }
            }
            for val in &mut centroid {
                *val /= n as f64;
            }

            let blend = |t: f64, toward: &[f64]| -> Vec<f64> {
                centroid
                    .iter()
                    .zip(toward)
                    .map(|(c, w)| c + t * (w - c))
                    .collect()
            };

            let reflected = blend(-1.0, &simplex[worst_idx]);
            let f_reflected = eval(&reflected, &mut num_evaluations);

            if f_reflected < f_simplex[best_idx] {
                // Expansion
                let expanded = blend(-2.0, &simplex[worst_idx]);
                let f_expanded = eval(&expanded, &mut num_evaluations);
                if f_expanded < f_reflected {
                    simplex[worst_idx] = expanded;
                    f_simplex[worst_idx] = f_expanded;
                } else {
                    simplex[worst_idx] = reflected;
                    f_simplex[worst_idx] = f_reflected;
                }
            } else if f_reflected < f_simplex[second_worst_idx] {
                simplex[worst_idx] = reflected;
                f_simplex[worst_idx] = f_reflected;
            } else {
                // Contraction, outside if the reflection helped at all.
                let (contracted, target) = if f_reflected < f_simplex[worst_idx] {
                    (blend(-0.5, &simplex[worst_idx]), f_reflected)
                } else {
                    (blend(0.5, &simplex[worst_idx]), f_simplex[worst_idx])
                };
                let f_contracted = eval(&contracted, &mut num_evaluations);

                if f_contracted < target {
                    simplex[worst_idx] = contracted;
                    f_simplex[worst_idx] = f_contracted;
                } else {
                    // Shrink toward the best point
                    let best = simplex[best_idx].clone();
                    for i in 0..=n {
                        if i != best_idx {
                            for (x, b) in simplex[i].iter_mut().zip(&best) {
                                *x = 0.5 * (b + *x);
                            }
                            f_simplex[i] = eval(&simplex[i], &mut num_evaluations);
                        }
                    }
                }
            }

            let current_best = f_simplex.iter().copied().fold(f64::INFINITY, f64::min);
            if history.last().is_some_and(|&h| current_best < h) {
                history.push(current_best);
            }
            num_iterations = iteration + 1;
        }

        let best_idx = order(&f_simplex)[0];
        OptimizationResult {
            optimal_params: simplex.swap_remove(best_idx),
            optimal_value: f_simplex[best_idx],
            num_evaluations,
            num_iterations,
            history,
            termination,
        }
    }
}
