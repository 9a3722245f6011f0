//! Error types for the fitting crate.

use qgst_core::{CoreError, LinalgError, PhysicalBound};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors produced by the fitting pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FitError {
    /// Catalog, table or gate-set failure, including missing data.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A matrix the pipeline must invert is singular or ill-conditioned.
    #[error("Linear algebra failure during {stage}: {source}")]
    LinearAlgebra {
        /// Pipeline stage, e.g. `Gram matrix inversion`.
        stage: &'static str,
        /// Underlying failure.
        #[source]
        source: LinalgError,
    },

    /// The final estimate breaks a physical bound beyond tolerance.
    #[error("Constraint violation on {object}: {bound} exceeded by {deviation:.3e}")]
    ConstraintViolation {
        /// Gate label, or `rho`.
        object: String,
        /// The broken bound.
        bound: PhysicalBound,
        /// Amount by which the bound is exceeded.
        deviation: f64,
    },

    /// Invalid fitter configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl FitError {
    pub(crate) fn linalg(stage: &'static str, source: LinalgError) -> Self {
        FitError::LinearAlgebra { stage, source }
    }
}

/// Result type for fitting operations.
pub type FitResult<T> = Result<T, FitError>;
