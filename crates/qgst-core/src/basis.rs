//! Gate set basis: the catalog of labels with their ideal matrices.
//!
//! A [`GateSetBasis`] is an immutable value that pairs a [`LabelCatalog`]
//! with the ideal PTM of every gate and the reference state and measurement.
//! It is resolved once from a [`BasisSpec`] and then passed by reference to
//! every fitting stage.

use ndarray::{Array1, Array2};
use num_complex::Complex64;
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::labels::{Fiducial, GateLabel, LabelCatalog, SpamLabel};
use crate::pauli::PauliBasis;
use crate::unitary;

/// Label of the idle gate in the standard basis.
pub const ID: &str = "Id";
/// Label of the π/2 X rotation in the standard basis.
pub const X_ROT_90: &str = "X_Rot_90";
/// Label of the π/2 Y rotation in the standard basis.
pub const Y_ROT_90: &str = "Y_Rot_90";

const IDENTITY_TOL: f64 = 1e-12;

/// Catalog plus ideal matrices for one experiment design.
#[derive(Debug, Clone, PartialEq)]
pub struct GateSetBasis {
    catalog: LabelCatalog,
    pauli: PauliBasis,
    gates: Vec<Array2<f64>>,
    rho: Array1<f64>,
    measurement: Array1<f64>,
}

impl GateSetBasis {
    /// Build a basis from ideal PTMs and fiducials.
    ///
    /// The reference state and measurement default to `|0…0⟩⟨0…0|`. The
    /// design must have exactly d² fiducials.
    pub fn new(
        pauli: PauliBasis,
        gates: Vec<(GateLabel, Array2<f64>)>,
        fiducials: Vec<Fiducial>,
    ) -> CoreResult<Self> {
        let sq = pauli.superop_dim();
        if fiducials.len() != sq {
            return Err(CoreError::IncompleteDesign {
                spam: fiducials.len(),
                dim: sq,
            });
        }
        for (label, ptm) in &gates {
            check_square(&format!("ideal gate {label}"), ptm, sq)?;
        }

        let (labels, ptms): (Vec<_>, Vec<_>) = gates.into_iter().unzip();
        let catalog = LabelCatalog::new(labels, fiducials)?;

        let mut ground = Array2::<Complex64>::zeros((pauli.dim(), pauli.dim()));
        ground[[0, 0]] = Complex64::new(1.0, 0.0);
        let rho = pauli.vectorize(&ground);

        debug!(
            qubits = pauli.num_qubits(),
            gates = catalog.num_gates(),
            fiducials = catalog.num_spam(),
            "Built gate set basis"
        );

        Ok(Self {
            catalog,
            pauli,
            gates: ptms,
            measurement: rho.clone(),
            rho,
        })
    }

    /// The one-qubit `{Id, X_Rot_90, Y_Rot_90}` basis with fiducials
    /// `F0=(Id)`, `F1=(X_Rot_90)`, `F2=(Y_Rot_90)`, `F3=(X_Rot_90, X_Rot_90)`.
    pub fn standard() -> CoreResult<Self> {
        let pauli = PauliBasis::new(1)?;
        let half_pi = std::f64::consts::FRAC_PI_2;
        let gates = vec![
            (GateLabel::from(ID), pauli.ptm_from_unitary(&unitary::identity(2))),
            (GateLabel::from(X_ROT_90), pauli.ptm_from_unitary(&unitary::rx(half_pi))),
            (GateLabel::from(Y_ROT_90), pauli.ptm_from_unitary(&unitary::ry(half_pi))),
        ];
        let fiducials = vec![
            Fiducial::new("F0", [ID]),
            Fiducial::new("F1", [X_ROT_90]),
            Fiducial::new("F2", [Y_ROT_90]),
            Fiducial::new("F3", [X_ROT_90, X_ROT_90]),
        ];
        Self::new(pauli, gates, fiducials)
    }

    /// Add a gate given by its ideal PTM.
    pub fn with_gate(mut self, label: impl Into<GateLabel>, ptm: Array2<f64>) -> CoreResult<Self> {
        let label = label.into();
        check_square(&format!("ideal gate {label}"), &ptm, self.superop_dim())?;
        self.catalog.push_gate(label)?;
        self.gates.push(ptm);
        Ok(self)
    }

    /// Add a gate given by a unitary, converted to its PTM.
    pub fn with_unitary_gate(
        self,
        label: impl Into<GateLabel>,
        unitary: &Array2<Complex64>,
    ) -> CoreResult<Self> {
        let d = self.dim();
        if unitary.dim() != (d, d) {
            return Err(CoreError::DimensionMismatch {
                context: "unitary".to_string(),
                expected: d,
                got: unitary.nrows(),
            });
        }
        let ptm = self.pauli.ptm_from_unitary(unitary);
        self.with_gate(label, ptm)
    }

    /// Replace the reference state (Pauli vector, length d²).
    pub fn with_rho(mut self, rho: Array1<f64>) -> CoreResult<Self> {
        check_len("reference rho", &rho, self.superop_dim())?;
        self.rho = rho;
        Ok(self)
    }

    /// Replace the reference measurement effect (Pauli covector, length d²).
    pub fn with_measurement(mut self, measurement: Array1<f64>) -> CoreResult<Self> {
        check_len("reference E", &measurement, self.superop_dim())?;
        self.measurement = measurement;
        Ok(self)
    }

    /// Label catalog.
    pub fn catalog(&self) -> &LabelCatalog {
        &self.catalog
    }

    /// Pauli basis for the register.
    pub fn pauli(&self) -> &PauliBasis {
        &self.pauli
    }

    /// Hilbert-space dimension d.
    pub fn dim(&self) -> usize {
        self.pauli.dim()
    }

    /// Superoperator dimension d².
    pub fn superop_dim(&self) -> usize {
        self.pauli.superop_dim()
    }

    /// Gate labels in catalog order.
    pub fn gate_labels(&self) -> &[GateLabel] {
        self.catalog.gates()
    }

    /// Ideal PTMs in catalog order.
    pub fn ideal_gates(&self) -> &[Array2<f64>] {
        &self.gates
    }

    /// Ideal PTM of a gate.
    pub fn ideal_gate(&self, label: &GateLabel) -> CoreResult<&Array2<f64>> {
        Ok(&self.gates[self.catalog.gate_index(label)?])
    }

    /// Reference state as a Pauli vector.
    pub fn rho(&self) -> &Array1<f64> {
        &self.rho
    }

    /// Reference measurement effect as a Pauli covector.
    pub fn measurement(&self) -> &Array1<f64> {
        &self.measurement
    }

    /// Product of a fiducial's ideal PTMs in listed order.
    pub fn spam_matrix(&self, label: &SpamLabel) -> CoreResult<Array2<f64>> {
        Ok(self.spam_matrix_at(self.catalog.spam_index(label)?))
    }

    /// [`spam_matrix`](Self::spam_matrix) by fiducial position.
    pub fn spam_matrix_at(&self, index: usize) -> Array2<f64> {
        sequence_product(&self.gates, &self.catalog.fiducial_indices(index), self.superop_dim())
    }

    /// Position of the first fiducial whose ideal SPAM matrix is the identity.
    pub fn identity_fiducial(&self) -> Option<usize> {
        let eye = Array2::<f64>::eye(self.superop_dim());
        (0..self.catalog.num_spam()).find(|&i| {
            self.spam_matrix_at(i)
                .iter()
                .zip(eye.iter())
                .all(|(a, b)| (a - b).abs() < IDENTITY_TOL)
        })
    }

    /// Columns `F_j · rho` for every fiducial, the gauge of noiseless
    /// linear inversion.
    pub fn preparation_matrix(&self) -> Array2<f64> {
        let sq = self.superop_dim();
        let mut b = Array2::zeros((sq, sq));
        for j in 0..self.catalog.num_spam() {
            let col = self.spam_matrix_at(j).dot(&self.rho);
            b.column_mut(j).assign(&col);
        }
        b
    }
}

/// Catalog selection: the built-in design or a caller-provided one.
#[derive(Debug, Clone, Default)]
pub enum BasisSpec {
    /// [`GateSetBasis::standard`].
    #[default]
    Standard,
    /// A fully specified basis.
    Custom(GateSetBasis),
}

impl BasisSpec {
    /// Resolve into a concrete basis.
    pub fn resolve(self) -> CoreResult<GateSetBasis> {
        match self {
            BasisSpec::Standard => GateSetBasis::standard(),
            BasisSpec::Custom(basis) => Ok(basis),
        }
    }
}

impl From<GateSetBasis> for BasisSpec {
    fn from(basis: GateSetBasis) -> Self {
        BasisSpec::Custom(basis)
    }
}

/// Product `G_{s0} · G_{s1} · …` of the gates indexed by `seq`.
pub fn sequence_product(gates: &[Array2<f64>], seq: &[usize], dim: usize) -> Array2<f64> {
    seq.iter()
        .fold(Array2::eye(dim), |acc: Array2<f64>, &k| acc.dot(&gates[k]))
}

fn check_square(context: &str, m: &Array2<f64>, dim: usize) -> CoreResult<()> {
    let (r, c) = m.dim();
    if r != dim || c != dim {
        return Err(CoreError::DimensionMismatch {
            context: context.to_string(),
            expected: dim,
            got: if r != dim { r } else { c },
        });
    }
    Ok(())
}

fn check_len(context: &str, v: &Array1<f64>, dim: usize) -> CoreResult<()> {
    if v.len() != dim {
        return Err(CoreError::DimensionMismatch {
            context: context.to_string(),
            expected: dim,
            got: v.len(),
        });
    }
    Ok(())
}
