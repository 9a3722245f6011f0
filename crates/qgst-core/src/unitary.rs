//! Single-qubit unitaries used to build ideal gate catalogs.

use std::f64::consts::FRAC_1_SQRT_2;

use ndarray::{Array2, array};
use num_complex::Complex64;

fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

/// d×d identity.
pub fn identity(dim: usize) -> Array2<Complex64> {
    Array2::eye(dim)
}

/// `exp(-iθX/2)`.
pub fn rx(theta: f64) -> Array2<Complex64> {
    let (s, co) = (theta / 2.0).sin_cos();
    array![[c(co, 0.0), c(0.0, -s)], [c(0.0, -s), c(co, 0.0)]]
}

/// `exp(-iθY/2)`.
pub fn ry(theta: f64) -> Array2<Complex64> {
    let (s, co) = (theta / 2.0).sin_cos();
    array![[c(co, 0.0), c(-s, 0.0)], [c(s, 0.0), c(co, 0.0)]]
}

/// `exp(-iθZ/2)`.
pub fn rz(theta: f64) -> Array2<Complex64> {
    let (s, co) = (theta / 2.0).sin_cos();
    array![[c(co, -s), c(0.0, 0.0)], [c(0.0, 0.0), c(co, s)]]
}

/// Hadamard.
pub fn hadamard() -> Array2<Complex64> {
    let h = c(FRAC_1_SQRT_2, 0.0);
    array![[h, h], [h, -h]]
}

/// Phase gate `diag(1, i)`.
pub fn s_gate() -> Array2<Complex64> {
    array![[c(1.0, 0.0), c(0.0, 0.0)], [c(0.0, 0.0), c(0.0, 1.0)]]
}

/// Kronecker product of two operators; `a` acts on the more significant qubit.
pub fn kron(a: &Array2<Complex64>, b: &Array2<Complex64>) -> Array2<Complex64> {
    let (ra, ca) = a.dim();
    let (rb, cb) = b.dim();
    Array2::from_shape_fn((ra * rb, ca * cb), |(i, j)| {
        a[[i / rb, j / cb]] * b[[i % rb, j % cb]]
    })
}
