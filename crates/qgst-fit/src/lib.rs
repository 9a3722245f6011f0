//! `qgst-fit`: gate set tomography fitting.
//!
//! Turns a [`ProbabilityTable`](qgst_core::ProbabilityTable) into a physical
//! gate set in three stages:
//!
//! 1. **Linear inversion** ([`LinearInversionSolver`]): closed-form,
//!    gauge-ambiguous estimate from the Gram and data matrices.
//! 2. **Gauge optimization** ([`GaugeOptimizer`]): the invertible `B` that
//!    brings the raw gates closest to the ideal ones.
//! 3. **Constrained fit** ([`MleOptimizer`]): least squares over
//!    Cholesky-style factors, with trace preservation and entry bounds
//!    enforced by an augmented Lagrangian.
//!
//! [`GatesetTomographyFitter`] chains the three and reports non-fatal
//! problems as [`FitWarning`]s.
//!
//! # Example
//!
//! ```rust
//! use qgst_core::{BasisSpec, GateSet, GateSetBasis};
//! use qgst_fit::{FitConfig, GatesetTomographyFitter};
//!
//! let basis = GateSetBasis::standard().unwrap();
//! let table = GateSet::ideal(&basis).predict_table(basis.catalog()).unwrap();
//!
//! let fitter = GatesetTomographyFitter::new(BasisSpec::Standard, table, FitConfig::default())
//!     .unwrap();
//! let report = fitter.fit().unwrap();
//! assert!((report.gate_set.rho_trace() - 1.0).abs() < 1e-6);
//! ```

pub mod config;
pub mod error;
pub mod fitter;
pub mod gauge;
pub mod linear_inversion;
pub mod mle;
pub mod optimize;

pub use config::{ConfigError, FitConfig, GaugeConfig, GaugeMethod, LinearInversionConfig, MleConfig};
pub use error::{FitError, FitResult};
pub use fitter::{FitReport, FitWarning, GatesetTomographyFitter, GaugeSummary, MleSummary};
pub use gauge::{GaugeOptimizer, GaugeResult};
pub use linear_inversion::{LinearInversionSolver, RawEstimate};
pub use mle::{Decoded, MleOptimizer, MleProblem, MleResult};
pub use optimize::{
    AugmentedLagrangian, Bfgs, ConstrainedLeastSquares, NelderMead, OptimizationResult, Optimizer,
    ProblemValues, Termination,
};
