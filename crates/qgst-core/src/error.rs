//! Error types for the core crate.

use thiserror::Error;

use crate::labels::{ExperimentKey, GateLabel, SpamLabel};
use crate::linalg::LinalgError;

/// Errors produced while building catalogs, tables and gate sets.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoreError {
    /// A probability required by the fit is absent from the table.
    #[error("Missing probability for experiment {0}")]
    MissingData(ExperimentKey),

    /// A probability is non-finite or outside [0, 1].
    #[error("Probability {value} for experiment {key} is outside [0, 1]")]
    InvalidProbability {
        /// The offending experiment.
        key: ExperimentKey,
        /// The rejected value.
        value: f64,
    },

    /// A count record contains no shots.
    #[error("Counts for experiment {0} contain no shots")]
    EmptyCounts(ExperimentKey),

    /// A gate label is not part of the catalog.
    #[error("Unknown gate label '{0}'")]
    UnknownGate(GateLabel),

    /// A SPAM label is not part of the catalog.
    #[error("Unknown SPAM label '{0}'")]
    UnknownSpam(SpamLabel),

    /// A label appears twice in the catalog.
    #[error("Duplicate label '{0}' in catalog")]
    DuplicateLabel(String),

    /// The catalog has no gates.
    #[error("Gate set catalog contains no gates")]
    EmptyCatalog,

    /// Matrix or vector has the wrong size.
    #[error("Dimension mismatch for {context}: expected {expected}, got {got}")]
    DimensionMismatch {
        /// What was being checked.
        context: String,
        /// Expected size.
        expected: usize,
        /// Actual size.
        got: usize,
    },

    /// The number of fiducials does not match the superoperator dimension.
    #[error(
        "Design has {spam} SPAM labels but the superoperator space has dimension {dim}; \
         linear inversion needs exactly {dim}"
    )]
    IncompleteDesign {
        /// Number of SPAM labels in the catalog.
        spam: usize,
        /// d² for the catalog's Hilbert dimension.
        dim: usize,
    },

    /// Only small registers are supported by the dense Pauli basis.
    #[error("Unsupported number of qubits: {0} (supported: 1 or 2)")]
    UnsupportedQubits(usize),

    /// Dense linear algebra failed.
    #[error("Linear algebra failure for {context}: {source}")]
    LinearAlgebra {
        /// The object being processed (e.g. a gate label).
        context: String,
        /// Underlying failure.
        #[source]
        source: LinalgError,
    },
}

impl CoreError {
    /// Wrap a linear-algebra failure with the name of the object it concerns.
    pub fn linalg(context: impl Into<String>, source: LinalgError) -> Self {
        CoreError::LinearAlgebra {
            context: context.into(),
            source,
        }
    }
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
