//! Dense linear algebra for the small matrices gate set tomography works with.
//!
//! Superoperators for one or two qubits are at most 16x16, so everything here
//! is a straightforward dense routine:
//!
//! - Gauss-Jordan inversion with partial pivoting and a 1-norm condition
//!   estimate
//! - Hermitian eigendecomposition (faer's self-adjoint solver)
//! - the "Cholesky-like" square-root factor `T = V·√Λ` of a Hermitian matrix
//! - Cholesky solves for symmetric positive-definite systems (faer `Llt`)
//!
//! Inputs stay `ndarray`; they are copied into `faer::Mat` at the call.

use faer::linalg::solvers::{Llt, Solve};
use faer::{Mat, Side, c64};
use ndarray::{Array1, Array2};
use num_complex::Complex64;
use thiserror::Error;

/// Pivots smaller than this fraction of the largest entry count as zero.
const SINGULAR_RTOL: f64 = 1e-13;

/// Failures of the dense routines.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum LinalgError {
    /// Operation requires a square matrix.
    #[error("matrix is {rows}x{cols}, expected square")]
    NotSquare {
        /// Row count.
        rows: usize,
        /// Column count.
        cols: usize,
    },

    /// No usable pivot was found.
    #[error("matrix is singular (pivot {pivot:.3e} in column {column})")]
    Singular {
        /// Column where elimination broke down.
        column: usize,
        /// Magnitude of the best pivot candidate.
        pivot: f64,
    },

    /// The inverse exists but amplifies errors beyond the accepted limit.
    #[error("matrix is ill-conditioned (condition number {condition:.3e} exceeds {limit:.3e})")]
    IllConditioned {
        /// Estimated 1-norm condition number.
        condition: f64,
        /// Configured upper bound.
        limit: f64,
    },

    /// Cholesky factorization hit a non-positive pivot.
    #[error("matrix is not positive definite")]
    NotPositiveDefinite,

    /// Right-hand side length does not match the system.
    #[error("right-hand side has length {got}, expected {expected}")]
    RhsMismatch {
        /// System dimension.
        expected: usize,
        /// Supplied length.
        got: usize,
    },

    /// The eigensolver did not converge.
    #[error("eigendecomposition did not converge")]
    NoConvergence,

    /// Input contains NaN or infinity.
    #[error("matrix contains non-finite entries")]
    NonFinite,
}

fn square_dim<T>(a: &Array2<T>) -> Result<usize, LinalgError> {
    let (rows, cols) = a.dim();
    if rows != cols {
        return Err(LinalgError::NotSquare { rows, cols });
    }
    Ok(rows)
}

/// Invert a real square matrix by Gauss-Jordan elimination with partial pivoting.
pub fn invert(a: &Array2<f64>) -> Result<Array2<f64>, LinalgError> {
    let n = square_dim(a)?;
    if a.iter().any(|v| !v.is_finite()) {
        return Err(LinalgError::NonFinite);
    }

    let scale = a.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let mut work = a.clone();
    let mut inv = Array2::<f64>::eye(n);

    for col in 0..n {
        let (pivot_row, pivot_abs) = (col..n)
            .map(|r| (r, work[[r, col]].abs()))
            .fold((col, -1.0), |best, cand| if cand.1 > best.1 { cand } else { best });

        if scale == 0.0 || pivot_abs <= SINGULAR_RTOL * scale {
            return Err(LinalgError::Singular {
                column: col,
                pivot: pivot_abs.max(0.0),
            });
        }

        if pivot_row != col {
            for j in 0..n {
                work.swap([pivot_row, j], [col, j]);
                inv.swap([pivot_row, j], [col, j]);
            }
        }

        let pivot = work[[col, col]];
        for j in 0..n {
            work[[col, j]] /= pivot;
            inv[[col, j]] /= pivot;
        }

        for r in 0..n {
            if r == col {
                continue;
            }
            let factor = work[[r, col]];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                let w = work[[col, j]];
                let v = inv[[col, j]];
                work[[r, j]] -= factor * w;
                inv[[r, j]] -= factor * v;
            }
        }
    }

    Ok(inv)
}

/// Maximum absolute column sum.
pub fn norm_1(a: &Array2<f64>) -> f64 {
    a.columns()
        .into_iter()
        .map(|c| c.iter().map(|v| v.abs()).sum::<f64>())
        .fold(0.0, f64::max)
}

/// Invert `a` and reject the result when `‖a‖₁·‖a⁻¹‖₁` exceeds `max_condition`.
///
/// Returns the inverse together with the condition estimate.
pub fn invert_conditioned(
    a: &Array2<f64>,
    max_condition: f64,
) -> Result<(Array2<f64>, f64), LinalgError> {
    let inv = invert(a)?;
    let condition = norm_1(a) * norm_1(&inv);
    if !condition.is_finite() || condition > max_condition {
        return Err(LinalgError::IllConditioned {
            condition,
            limit: max_condition,
        });
    }
    Ok((inv, condition))
}

/// Frobenius (Hilbert-Schmidt) norm.
pub fn frobenius_norm(a: &Array2<f64>) -> f64 {
    a.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// Squared Hilbert-Schmidt distance `Σ |a_ij - b_ij|²`.
pub fn hs_distance(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Conjugate transpose.
pub fn dagger(a: &Array2<Complex64>) -> Array2<Complex64> {
    a.t().mapv(|z| z.conj())
}

/// `T·T†`, Hermitian positive-semidefinite for any `T`.
pub fn outer_self(t: &Array2<Complex64>) -> Array2<Complex64> {
    t.dot(&dagger(t))
}

/// Eigendecomposition of a Hermitian matrix.
///
/// Returns eigenvalues in ascending order and the unitary whose columns are
/// the matching eigenvectors. Only the Hermitian part of `a` is used.
pub fn hermitian_eigh(
    a: &Array2<Complex64>,
) -> Result<(Array1<f64>, Array2<Complex64>), LinalgError> {
    let n = square_dim(a)?;
    if a.iter().any(|z| !z.re.is_finite() || !z.im.is_finite()) {
        return Err(LinalgError::NonFinite);
    }

    let h = Array2::from_shape_fn((n, n), |(i, j)| 0.5 * (a[[i, j]] + a[[j, i]].conj()));
    let m = Mat::<c64>::from_fn(n, n, |i, j| c64::new(h[[i, j]].re, h[[i, j]].im));
    let evd = m
        .as_ref()
        .self_adjoint_eigen(Side::Lower)
        .map_err(|_| LinalgError::NoConvergence)?;

    let u = evd.U();
    let unsorted = Array2::from_shape_fn((n, n), |(i, k)| {
        let z = u[(i, k)];
        Complex64::new(z.re, z.im)
    });

    // Rayleigh quotients of the unit eigenvectors.
    let quotients: Vec<f64> = (0..n)
        .map(|k| {
            let v = unsorted.column(k);
            let hv = h.dot(&v);
            v.iter().zip(hv.iter()).map(|(x, y)| (x.conj() * y).re).sum()
        })
        .collect();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| quotients[i].total_cmp(&quotients[j]));
    let values = Array1::from_iter(order.iter().map(|&k| quotients[k]));
    let vectors = Array2::from_shape_fn((n, n), |(row, k)| unsorted[[row, order[k]]]);
    Ok((values, vectors))
}

/// Square-root factor `T` with `T·T† = A₊`, where `A₊` is `A` with its negative
/// eigenvalues clamped to zero.
pub fn sqrt_factor(a: &Array2<Complex64>) -> Result<Array2<Complex64>, LinalgError> {
    let (values, vectors) = hermitian_eigh(a)?;
    let mut t = vectors;
    for (k, &lambda) in values.iter().enumerate() {
        let scale = lambda.max(0.0).sqrt();
        t.column_mut(k).mapv_inplace(|z| z * scale);
    }
    Ok(t)
}

/// Solve `A·x = b` for symmetric positive-definite `A` through an `LLᵀ`
/// factorization.
pub fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>, LinalgError> {
    let n = square_dim(a)?;
    if b.len() != n {
        return Err(LinalgError::RhsMismatch {
            expected: n,
            got: b.len(),
        });
    }
    if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
        return Err(LinalgError::NonFinite);
    }

    let m = Mat::<f64>::from_fn(n, n, |i, j| a[[i, j]]);
    let llt = Llt::new(m.as_ref(), Side::Lower).map_err(|_| LinalgError::NotPositiveDefinite)?;
    let rhs = Mat::<f64>::from_fn(n, 1, |i, _| b[i]);
    let x = llt.solve(rhs.as_ref());

    let x = Array1::from_shape_fn(n, |i| x[(i, 0)]);
    if x.iter().any(|v| !v.is_finite()) {
        return Err(LinalgError::NonFinite);
    }
    Ok(x)
}
