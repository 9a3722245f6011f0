//! `qgst-core`: data model for gate set tomography.
//!
//! Provides the pieces every fitting stage shares:
//!
//! - **Labels**: [`GateLabel`], [`SpamLabel`], [`Fiducial`] and the
//!   experiment combinatorics of a design ([`LabelCatalog`], [`ExperimentKey`])
//! - **Data**: [`ProbabilityTable`], the observed click probabilities
//! - **Representations**: the normalized [`PauliBasis`], PTM ⇄ Choi
//!   conversion and the small dense solvers in [`linalg`]
//! - **Gate sets**: [`GateSetBasis`] (ideal catalog) and [`GateSet`]
//!   (forward model, gauge transforms, physicality diagnostics)
//!
//! # Quick start
//!
//! ```rust
//! use qgst_core::{ExperimentKey, GateSet, GateSetBasis};
//!
//! let basis = GateSetBasis::standard().unwrap();
//! let ideal = GateSet::ideal(&basis);
//!
//! // X90 followed by X90 flips |0⟩, so the 0 outcome never fires.
//! let key = ExperimentKey::gate("F1", "X_Rot_90", "F0");
//! let p = ideal.predict(basis.catalog(), &key).unwrap();
//! assert!(p.abs() < 1e-12);
//!
//! // Synthetic noiseless data for every experiment of the design.
//! let table = ideal.predict_table(basis.catalog()).unwrap();
//! assert_eq!(table.len(), 64);
//! ```

pub mod basis;
pub mod error;
pub mod gateset;
pub mod labels;
pub mod linalg;
pub mod pauli;
pub mod table;
pub mod unitary;

pub use basis::{BasisSpec, GateSetBasis};
pub use error::{CoreError, CoreResult};
pub use gateset::{BoundViolation, GatePhysicality, GateSet, PhysicalBound, PhysicalityReport};
pub use labels::{ExperimentKey, Fiducial, GateLabel, LabelCatalog, SpamLabel};
pub use linalg::LinalgError;
pub use pauli::PauliBasis;
pub use table::{ProbabilityEntry, ProbabilityTable};
