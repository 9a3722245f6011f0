//! The three-stage fitting pipeline.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::Array2;
use qgst_core::{BasisSpec, GateSet, GateSetBasis, ProbabilityTable};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::config::FitConfig;
use crate::error::FitResult;
use crate::gauge::{GaugeOptimizer, GaugeResult};
use crate::linear_inversion::{LinearInversionSolver, RawEstimate};
use crate::mle::{MleOptimizer, MleResult};
use crate::optimize::Termination;

/// Non-fatal conditions encountered during a fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FitWarning {
    /// Gauge optimization stopped before meeting its tolerance.
    GaugeNotConverged {
        /// Why the minimizer stopped.
        termination: Termination,
        /// Iterations performed.
        iterations: usize,
    },
    /// The constrained fit stopped before meeting its tolerance.
    MleNotConverged {
        /// Why the solver stopped.
        termination: Termination,
        /// Multiplier updates performed.
        outer_iterations: usize,
        /// Largest constraint violation at the returned point.
        max_violation: f64,
    },
}

impl fmt::Display for FitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitWarning::GaugeNotConverged {
                termination,
                iterations,
            } => write!(
                f,
                "gauge optimization did not converge ({termination} after {iterations} iterations)"
            ),
            FitWarning::MleNotConverged {
                termination,
                outer_iterations,
                max_violation,
            } => write!(
                f,
                "constrained fit did not converge ({termination} after {outer_iterations} \
                 outer iterations, max violation {max_violation:.2e})"
            ),
        }
    }
}

/// Gauge stage summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeSummary {
    /// Objective at the optimum.
    pub distance: f64,
    /// Minimizer iterations.
    pub iterations: usize,
    /// Why the minimizer stopped.
    pub termination: Termination,
}

/// Constrained fit summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MleSummary {
    /// Sum of squared residuals.
    pub objective: f64,
    /// Largest constraint violation.
    pub max_violation: f64,
    /// Multiplier updates.
    pub outer_iterations: usize,
    /// Levenberg-Marquardt iterations.
    pub inner_iterations: usize,
    /// Why the solver stopped.
    pub termination: Termination,
}

impl From<&MleResult> for MleSummary {
    fn from(r: &MleResult) -> Self {
        Self {
            objective: r.objective,
            max_violation: r.max_violation,
            outer_iterations: r.outer_iterations,
            inner_iterations: r.inner_iterations,
            termination: r.termination,
        }
    }
}

/// Final estimate of a fit with its diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitReport {
    /// Physical gate set.
    pub gate_set: GateSet,
    /// Gauge stage summary, absent for a refit.
    pub gauge: Option<GaugeSummary>,
    /// Constrained fit summary.
    pub mle: MleSummary,
    /// Non-fatal conditions.
    pub warnings: Vec<FitWarning>,
}

impl FitReport {
    /// Label map of the estimate: each gate, `E` and `rho`.
    pub fn to_map(&self) -> BTreeMap<String, Array2<f64>> {
        self.gate_set.to_map()
    }

    /// Sum of squared residuals of the estimate.
    pub fn objective(&self) -> f64 {
        self.mle.objective
    }
}

/// Gate set tomography fitter for one probability table.
#[derive(Debug, Clone)]
pub struct GatesetTomographyFitter {
    basis: GateSetBasis,
    table: ProbabilityTable,
    config: FitConfig,
}

impl GatesetTomographyFitter {
    /// Resolve the basis, validate the configuration and check that the
    /// table holds every experiment the fit needs.
    pub fn new(
        basis: impl Into<BasisSpec>,
        table: ProbabilityTable,
        config: FitConfig,
    ) -> FitResult<Self> {
        let basis = basis.into().resolve()?;
        config.validate()?;
        table.check_complete(basis.catalog())?;
        Ok(Self {
            basis,
            table,
            config,
        })
    }

    /// The resolved basis.
    pub fn basis(&self) -> &GateSetBasis {
        &self.basis
    }

    /// The input table.
    pub fn table(&self) -> &ProbabilityTable {
        &self.table
    }

    /// The configuration.
    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    /// Raw, gauge-ambiguous estimate.
    pub fn linear_inversion(&self) -> FitResult<RawEstimate> {
        LinearInversionSolver::new(&self.basis, self.config.linear_inversion.clone())
            .solve(&self.table)
    }

    /// Gauge-fix a raw estimate against the ideal gates.
    pub fn gauge_optimize(&self, raw: &RawEstimate) -> FitResult<GaugeResult> {
        GaugeOptimizer::new(&self.basis, self.config.gauge.clone()).optimize(raw)
    }

    /// Sum of squared residuals of any gate set against the table.
    pub fn objective(&self, gate_set: &GateSet) -> FitResult<f64> {
        MleOptimizer::new(&self.basis, self.config.mle.clone()).objective(&self.table, gate_set)
    }

    /// Run linear inversion, gauge optimization and the constrained fit.
    #[instrument(skip_all)]
    pub fn fit(&self) -> FitResult<FitReport> {
        let raw = self.linear_inversion()?;
        let gauge = self.gauge_optimize(&raw)?;

        let mut warnings = Vec::new();
        if !gauge.termination.is_converged() {
            push_warning(
                &mut warnings,
                FitWarning::GaugeNotConverged {
                    termination: gauge.termination,
                    iterations: gauge.iterations,
                },
            );
        }

        let summary = GaugeSummary {
            distance: gauge.distance,
            iterations: gauge.iterations,
            termination: gauge.termination,
        };
        let mut report = self.refine(&gauge.gate_set)?;
        report.gauge = Some(summary);
        warnings.append(&mut report.warnings);
        report.warnings = warnings;

        info!(
            objective = report.mle.objective,
            warnings = report.warnings.len(),
            "Gate set tomography fit finished"
        );
        Ok(report)
    }

    /// Run only the constrained fit from an explicit seed.
    pub fn refine(&self, seed: &GateSet) -> FitResult<FitReport> {
        let result = MleOptimizer::new(&self.basis, self.config.mle.clone()).fit(&self.table, seed)?;

        let mut warnings = Vec::new();
        if !result.termination.is_converged() {
            push_warning(
                &mut warnings,
                FitWarning::MleNotConverged {
                    termination: result.termination,
                    outer_iterations: result.outer_iterations,
                    max_violation: result.max_violation,
                },
            );
        }

        Ok(FitReport {
            mle: MleSummary::from(&result),
            gate_set: result.gate_set,
            gauge: None,
            warnings,
        })
    }
}

fn push_warning(warnings: &mut Vec<FitWarning>, warning: FitWarning) {
    warn!("{warning}");
    warnings.push(warning);
}
