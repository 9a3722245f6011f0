//! Normalized Pauli basis and conversions between channel representations.
//!
//! Superoperators are expressed as Pauli transfer matrices (PTMs) in the
//! orthonormal basis `P_a = σ_a / √d`, ordered lexicographically over
//! `{I, X, Y, Z}` with qubit 0 as the leftmost tensor factor.
//!
//! For a channel Λ the two pictures used by the fitter are
//!
//!   PTM:   R_ab = Tr(P_a · Λ(P_b))
//!   Choi:  J    = Σ_ij |i⟩⟨j| ⊗ Λ(|i⟩⟨j|) = Σ_ab R_ab · (P_bᵀ ⊗ P_a)
//!
//! Λ is completely positive iff J ⪰ 0 and trace preserving iff the first row
//! of R is `[1, 0, …, 0]`.
//!
//! Every Pauli string is a monomial matrix (one non-zero per row and column),
//! so all conversions below cost O(d²) per basis element instead of O(d⁴).

use ndarray::{Array1, Array2};
use num_complex::Complex64;

use crate::error::{CoreError, CoreResult};

/// Largest register the dense basis supports.
pub const MAX_QUBITS: usize = 2;

const PAULI_LABELS: [char; 4] = ['I', 'X', 'Y', 'Z'];

/// A matrix with exactly one non-zero entry per row, at `(r, cols[r])`.
#[derive(Debug, Clone, PartialEq)]
pub struct Monomial {
    cols: Vec<usize>,
    values: Vec<Complex64>,
}

impl Monomial {
    fn single_qubit(op: usize) -> Self {
        let one = Complex64::new(1.0, 0.0);
        let i = Complex64::new(0.0, 1.0);
        match op {
            0 => Self { cols: vec![0, 1], values: vec![one, one] },
            1 => Self { cols: vec![1, 0], values: vec![one, one] },
            2 => Self { cols: vec![1, 0], values: vec![-i, i] },
            _ => Self { cols: vec![0, 1], values: vec![one, -one] },
        }
    }

    /// Matrix dimension.
    pub fn dim(&self) -> usize {
        self.cols.len()
    }

    /// Kronecker product `self ⊗ other`.
    pub fn kron(&self, other: &Monomial) -> Monomial {
        let db = other.dim();
        let n = self.dim() * db;
        let mut cols = Vec::with_capacity(n);
        let mut values = Vec::with_capacity(n);
        for (&ca, &va) in self.cols.iter().zip(&self.values) {
            for (&cb, &vb) in other.cols.iter().zip(&other.values) {
                cols.push(ca * db + cb);
                values.push(va * vb);
            }
        }
        Monomial { cols, values }
    }

    /// Plain (non-conjugating) transpose.
    pub fn transpose(&self) -> Monomial {
        let n = self.dim();
        let mut cols = vec![0; n];
        let mut values = vec![Complex64::new(0.0, 0.0); n];
        for (r, (&c, &v)) in self.cols.iter().zip(&self.values).enumerate() {
            cols[c] = r;
            values[c] = v;
        }
        Monomial { cols, values }
    }

    fn scaled(mut self, factor: f64) -> Monomial {
        for v in &mut self.values {
            *v *= factor;
        }
        self
    }

    /// Dense copy of the matrix.
    pub fn to_dense(&self) -> Array2<Complex64> {
        let n = self.dim();
        let mut m = Array2::zeros((n, n));
        for (r, (&c, &v)) in self.cols.iter().zip(&self.values).enumerate() {
            m[[r, c]] = v;
        }
        m
    }

    /// `Tr(self · op)`.
    pub fn trace_with(&self, op: &Array2<Complex64>) -> Complex64 {
        self.cols
            .iter()
            .zip(&self.values)
            .enumerate()
            .map(|(r, (&c, &v))| v * op[[c, r]])
            .sum()
    }

    /// Hilbert-Schmidt inner product `Tr(self† · op)`.
    pub fn inner(&self, op: &Array2<Complex64>) -> Complex64 {
        self.cols
            .iter()
            .zip(&self.values)
            .enumerate()
            .map(|(r, (&c, &v))| v.conj() * op[[r, c]])
            .sum()
    }

    /// `target += coeff · self`.
    pub fn add_scaled_to(&self, coeff: f64, target: &mut Array2<Complex64>) {
        for (r, (&c, &v)) in self.cols.iter().zip(&self.values).enumerate() {
            target[[r, c]] += v * coeff;
        }
    }
}

/// Orthonormal Pauli operator basis for an `n`-qubit register.
#[derive(Debug, Clone, PartialEq)]
pub struct PauliBasis {
    num_qubits: usize,
    dim: usize,
    /// `σ_a / √d` for `a` in `0..d²`.
    elements: Vec<Monomial>,
    /// `P_bᵀ ⊗ P_a` stored at `a·d² + b`.
    choi_elements: Vec<Monomial>,
}

impl PauliBasis {
    /// Build the basis for `num_qubits` qubits.
    pub fn new(num_qubits: usize) -> CoreResult<Self> {
        if num_qubits == 0 || num_qubits > MAX_QUBITS {
            return Err(CoreError::UnsupportedQubits(num_qubits));
        }
        let dim = 1usize << num_qubits;
        let norm = 1.0 / (dim as f64).sqrt();

        let elements: Vec<Monomial> = (0..dim * dim)
            .map(|index| {
                digits(index, num_qubits)
                    .into_iter()
                    .map(Monomial::single_qubit)
                    .reduce(|acc, op| acc.kron(&op))
                    .unwrap_or_else(|| Monomial::single_qubit(0))
                    .scaled(norm)
            })
            .collect();

        let sq = dim * dim;
        let mut choi_elements = Vec::with_capacity(sq * sq);
        for a in 0..sq {
            for b in 0..sq {
                choi_elements.push(elements[b].transpose().kron(&elements[a]));
            }
        }

        Ok(Self {
            num_qubits,
            dim,
            elements,
            choi_elements,
        })
    }

    /// Number of qubits.
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Hilbert-space dimension d.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Superoperator dimension d².
    pub fn superop_dim(&self) -> usize {
        self.dim * self.dim
    }

    /// Basis element `P_a`.
    pub fn element(&self, a: usize) -> &Monomial {
        &self.elements[a]
    }

    /// Pauli string label of element `a`, e.g. `"IZ"`.
    pub fn label(&self, a: usize) -> String {
        digits(a, self.num_qubits)
            .into_iter()
            .map(|d| PAULI_LABELS[d])
            .collect()
    }

    /// Pauli coordinates `Re Tr(P_a · op)` of a Hermitian operator.
    ///
    /// # Panics
    /// Panics if `op` is not d×d.
    pub fn vectorize(&self, op: &Array2<Complex64>) -> Array1<f64> {
        assert_eq!(op.dim(), (self.dim, self.dim), "operator must be d x d");
        self.elements
            .iter()
            .map(|p| p.trace_with(op).re)
            .collect()
    }

    /// Operator `Σ_a v_a P_a` from Pauli coordinates.
    ///
    /// # Panics
    /// Panics if `v` does not have d² entries.
    pub fn operator(&self, v: &Array1<f64>) -> Array2<Complex64> {
        assert_eq!(v.len(), self.superop_dim(), "vector must have d^2 entries");
        let mut op = Array2::zeros((self.dim, self.dim));
        for (p, &coeff) in self.elements.iter().zip(v.iter()) {
            p.add_scaled_to(coeff, &mut op);
        }
        op
    }

    /// Convert a Choi matrix to its (real part) Pauli transfer matrix.
    ///
    /// # Panics
    /// Panics if `choi` is not d²×d².
    pub fn choi_to_ptm(&self, choi: &Array2<Complex64>) -> Array2<f64> {
        let sq = self.superop_dim();
        assert_eq!(choi.dim(), (sq, sq), "Choi matrix must be d^2 x d^2");
        Array2::from_shape_fn((sq, sq), |(a, b)| {
            self.choi_elements[a * sq + b].inner(choi).re
        })
    }

    /// Convert a Pauli transfer matrix to its Choi matrix.
    ///
    /// # Panics
    /// Panics if `ptm` is not d²×d².
    pub fn ptm_to_choi(&self, ptm: &Array2<f64>) -> Array2<Complex64> {
        let sq = self.superop_dim();
        assert_eq!(ptm.dim(), (sq, sq), "PTM must be d^2 x d^2");
        let mut choi = Array2::zeros((sq, sq));
        for ((a, b), &r) in ptm.indexed_iter() {
            if r != 0.0 {
                self.choi_elements[a * sq + b].add_scaled_to(r, &mut choi);
            }
        }
        choi
    }

    /// Pauli transfer matrix of the unitary channel `ρ ↦ U·ρ·U†`.
    ///
    /// # Panics
    /// Panics if `u` is not d×d.
    pub fn ptm_from_unitary(&self, u: &Array2<Complex64>) -> Array2<f64> {
        assert_eq!(u.dim(), (self.dim, self.dim), "unitary must be d x d");
        let sq = self.superop_dim();
        let u_dag = crate::linalg::dagger(u);
        let mut ptm = Array2::zeros((sq, sq));
        for (b, pb) in self.elements.iter().enumerate() {
            let image = u.dot(&pb.to_dense()).dot(&u_dag);
            for (a, pa) in self.elements.iter().enumerate() {
                ptm[[a, b]] = pa.trace_with(&image).re;
            }
        }
        ptm
    }
}

/// Base-4 digits of `index`, most significant first, padded to `n` digits.
fn digits(mut index: usize, n: usize) -> Vec<usize> {
    let mut out = vec![0; n];
    for slot in out.iter_mut().rev() {
        *slot = index % 4;
        index /= 4;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::hermitian_eigh;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use std::f64::consts::FRAC_1_SQRT_2;

    fn rx90() -> Array2<Complex64> {
        let c = Complex64::new(FRAC_1_SQRT_2, 0.0);
        let s = Complex64::new(0.0, -FRAC_1_SQRT_2);
        array![[c, s], [s, c]]
    }

    #[test]
    fn test_labels_and_sizes() {
        let one = PauliBasis::new(1).unwrap();
        assert_eq!(one.superop_dim(), 4);
        assert_eq!(one.label(2), "Y");

        let two = PauliBasis::new(2).unwrap();
        assert_eq!(two.superop_dim(), 16);
        assert_eq!(two.label(0), "II");
        assert_eq!(two.label(7), "XZ");
    }

    #[test]
    fn test_unsupported_qubits() {
        assert!(matches!(
            PauliBasis::new(0),
            Err(CoreError::UnsupportedQubits(0))
        ));
        assert!(PauliBasis::new(3).is_err());
    }

    #[test]
    fn test_basis_is_orthonormal() {
        let basis = PauliBasis::new(2).unwrap();
        for a in 0..16 {
            for b in 0..16 {
                let ip = basis.element(a).inner(&basis.element(b).to_dense());
                let expected = if a == b { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(ip.re, expected, epsilon = 1e-14);
                assert_abs_diff_eq!(ip.im, 0.0, epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn test_ground_state_vector() {
        let basis = PauliBasis::new(1).unwrap();
        let mut rho = Array2::<Complex64>::zeros((2, 2));
        rho[[0, 0]] = Complex64::new(1.0, 0.0);
        let v = basis.vectorize(&rho);
        assert_abs_diff_eq!(v[0], FRAC_1_SQRT_2, epsilon = 1e-15);
        assert_abs_diff_eq!(v[1], 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(v[2], 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(v[3], FRAC_1_SQRT_2, epsilon = 1e-15);

        let back = basis.operator(&v);
        assert!((back[[0, 0]] - Complex64::new(1.0, 0.0)).norm() < 1e-14);
        assert!(back[[1, 1]].norm() < 1e-14);
    }

    #[test]
    fn test_x90_ptm_matches_textbook() {
        let basis = PauliBasis::new(1).unwrap();
        let ptm = basis.ptm_from_unitary(&rx90());
        let expected = array![
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, -1.0],
            [0.0, 0.0, 1.0, 0.0],
        ];
        for (x, y) in ptm.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_identity_choi_is_maximally_entangled() {
        let basis = PauliBasis::new(1).unwrap();
        let choi = basis.ptm_to_choi(&Array2::eye(4));
        // |Ω⟩⟨Ω| with |Ω⟩ = |00⟩ + |11⟩.
        for ((i, j), z) in choi.indexed_iter() {
            let expected = if (i == 0 || i == 3) && (j == 0 || j == 3) { 1.0 } else { 0.0 };
            assert_abs_diff_eq!(z.re, expected, epsilon = 1e-14);
            assert_abs_diff_eq!(z.im, 0.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_choi_ptm_inverse_pair() {
        let basis = PauliBasis::new(1).unwrap();
        let ptm = basis.ptm_from_unitary(&rx90());
        let back = basis.choi_to_ptm(&basis.ptm_to_choi(&ptm));
        for (x, y) in back.iter().zip(ptm.iter()) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_depolarizing_choi_is_psd() {
        let basis = PauliBasis::new(1).unwrap();
        let p = 0.1;
        let ptm = Array2::from_diag(&array![1.0, 1.0 - p, 1.0 - p, 1.0 - p]);
        let (vals, _) = hermitian_eigh(&basis.ptm_to_choi(&ptm)).unwrap();
        assert!(vals[0] > 0.0);
        assert_abs_diff_eq!(vals.sum(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_transpose_of_y_flips_sign() {
        let y = Monomial::single_qubit(2);
        let yt = y.transpose().to_dense();
        let dense = y.to_dense();
        for i in 0..2 {
            for j in 0..2 {
                assert_eq!(yt[[i, j]], dense[[j, i]]);
            }
        }
        assert_eq!(yt[[0, 1]], Complex64::new(0.0, 1.0));
    }
}
