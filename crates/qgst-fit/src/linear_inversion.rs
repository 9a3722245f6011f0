//! Closed-form linear inversion.
//!
//! With `A` the measurement rows `E·F_i` and `B` the preparation columns
//! `F_j·rho`, the data satisfy `g = A·B` and `M_k = A·G_k·B`, so
//! `g⁻¹·M_k = B⁻¹·G_k·B`: every gate is recovered up to the unknown gauge
//! `B`.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};
use qgst_core::{CoreResult, GateLabel, GateSet, GateSetBasis, ProbabilityTable};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::LinearInversionConfig;
use crate::error::{FitError, FitResult};

/// Gauge-ambiguous gate set produced by linear inversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEstimate {
    /// Gate labels in catalog order.
    pub labels: Vec<GateLabel>,
    /// `g⁻¹·M_k` per gate.
    pub gates: Vec<Array2<f64>>,
    /// Measurement effect in the same gauge, when the design has an
    /// identity fiducial.
    pub measurement: Option<Array1<f64>>,
    /// State in the same gauge, when the design has an identity fiducial.
    pub rho: Option<Array1<f64>>,
    /// The Gram matrix `g`.
    pub gram: Array2<f64>,
    /// 1-norm condition estimate of `g`.
    pub condition: f64,
}

impl RawEstimate {
    /// Raw PTM of a gate.
    pub fn gate(&self, label: &GateLabel) -> Option<&Array2<f64>> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|k| &self.gates[k])
    }

    /// Label map of the raw gates, plus `E` and `rho` when available.
    pub fn to_map(&self) -> BTreeMap<String, Array2<f64>> {
        let mut map: BTreeMap<String, Array2<f64>> = self
            .labels
            .iter()
            .zip(&self.gates)
            .map(|(l, g)| (l.to_string(), g.clone()))
            .collect();
        if let Some(e) = &self.measurement {
            map.insert("E".to_string(), e.clone().insert_axis(ndarray::Axis(0)));
        }
        if let Some(r) = &self.rho {
            map.insert("rho".to_string(), r.clone().insert_axis(ndarray::Axis(1)));
        }
        map
    }

    /// Complete gate set, falling back to the basis reference SPAM when the
    /// raw state or measurement is unavailable.
    pub fn to_gate_set(&self, basis: &GateSetBasis) -> CoreResult<GateSet> {
        GateSet::new(
            self.labels.clone(),
            self.gates.clone(),
            self.measurement
                .clone()
                .unwrap_or_else(|| basis.measurement().clone()),
            self.rho.clone().unwrap_or_else(|| basis.rho().clone()),
        )
    }
}

/// Builds the Gram and data matrices and inverts them.
#[derive(Debug, Clone)]
pub struct LinearInversionSolver<'a> {
    basis: &'a GateSetBasis,
    config: LinearInversionConfig,
}

impl<'a> LinearInversionSolver<'a> {
    /// Create a solver for a basis.
    pub fn new(basis: &'a GateSetBasis, config: LinearInversionConfig) -> Self {
        Self { basis, config }
    }

    /// `g[i][j] = P(F_i, F_j)`.
    pub fn gram_matrix(&self, table: &ProbabilityTable) -> FitResult<Array2<f64>> {
        let catalog = self.basis.catalog();
        let n = catalog.num_spam();
        let mut g = Array2::zeros((n, n));
        for i in 0..n {
            for j in 0..n {
                g[[i, j]] = table.get(&catalog.spam_key(i, j))?;
            }
        }
        Ok(g)
    }

    /// `M_k[i][j] = P(F_i, G_k, F_j)`.
    pub fn gate_matrix(&self, table: &ProbabilityTable, k: usize) -> FitResult<Array2<f64>> {
        let catalog = self.basis.catalog();
        let n = catalog.num_spam();
        let mut m = Array2::zeros((n, n));
        for i in 0..n {
            for j in 0..n {
                m[[i, j]] = table.get(&catalog.gate_key(i, k, j))?;
            }
        }
        Ok(m)
    }

    /// Run linear inversion on a table.
    #[instrument(skip_all, fields(gates = self.basis.catalog().num_gates()))]
    pub fn solve(&self, table: &ProbabilityTable) -> FitResult<RawEstimate> {
        let gram = self.gram_matrix(table)?;
        let (gram_inv, condition) =
            qgst_core::linalg::invert_conditioned(&gram, self.config.max_condition)
                .map_err(|e| FitError::linalg("Gram matrix inversion", e))?;
        debug!(condition, "Inverted Gram matrix");

        let catalog = self.basis.catalog();
        let gates = (0..catalog.num_gates())
            .map(|k| Ok(gram_inv.dot(&self.gate_matrix(table, k)?)))
            .collect::<FitResult<Vec<_>>>()?;

        let (measurement, rho) = match self.basis.identity_fiducial() {
            Some(idx) => {
                let mut rho = Array1::zeros(catalog.num_spam());
                rho[idx] = 1.0;
                (Some(gram.row(idx).to_owned()), Some(rho))
            }
            None => (None, None),
        };
        debug!(
            spam_available = measurement.is_some(),
            "Linear inversion finished"
        );

        Ok(RawEstimate {
            labels: catalog.gates().to_vec(),
            gates,
            measurement,
            rho,
            gram,
            condition,
        })
    }
}
