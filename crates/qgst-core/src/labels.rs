//! Gate and SPAM labels, and the experiment combinatorics of a GST design.
//!
//! A design is an ordered list of gate labels plus an ordered list of
//! fiducials (SPAM labels). Each fiducial is a short gate sequence used both
//! to prepare states and to rotate measurements. The experiments needed by
//! the fit are every `(F_i, F_j)` pair and every `(F_i, G_k, F_j)` triple.
//!
//! Sequences are always read in multiplication order: the experiment
//! `(F_i, G_k, F_j)` predicts `E · F_i · G_k · F_j · rho`, where each
//! fiducial contributes the product of its gates as listed.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Identifier of a gate in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GateLabel(String);

impl GateLabel {
    /// Create a gate label.
    pub fn new(name: impl Into<String>) -> Self {
        GateLabel(name.into())
    }

    /// The label text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GateLabel {
    fn from(name: &str) -> Self {
        GateLabel(name.to_string())
    }
}

impl From<String> for GateLabel {
    fn from(name: String) -> Self {
        GateLabel(name)
    }
}

/// Identifier of a fiducial (SPAM label).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpamLabel(String);

impl SpamLabel {
    /// Create a SPAM label.
    pub fn new(name: impl Into<String>) -> Self {
        SpamLabel(name.into())
    }

    /// The label text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpamLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SpamLabel {
    fn from(name: &str) -> Self {
        SpamLabel(name.to_string())
    }
}

impl From<String> for SpamLabel {
    fn from(name: String) -> Self {
        SpamLabel(name)
    }
}

/// A fiducial: a SPAM label and the gates it applies, in multiplication order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fiducial {
    /// The label experiments refer to.
    pub label: SpamLabel,
    /// Constituent gates. An empty sequence is the identity.
    pub gates: Vec<GateLabel>,
}

impl Fiducial {
    /// Create a fiducial from a label and a gate sequence.
    pub fn new<G>(label: impl Into<SpamLabel>, gates: impl IntoIterator<Item = G>) -> Self
    where
        G: Into<GateLabel>,
    {
        Self {
            label: label.into(),
            gates: gates.into_iter().map(Into::into).collect(),
        }
    }
}

/// Key of one entry in a probability table.
///
/// The first SPAM label sits next to the measurement, the last next to the
/// state preparation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExperimentKey {
    /// `(F_i, F_j)`: fiducials only, used for the Gram matrix.
    Spam(SpamLabel, SpamLabel),
    /// `(F_i, G_k, F_j)`: one gate sandwiched between fiducials.
    Gate(SpamLabel, GateLabel, SpamLabel),
}

impl ExperimentKey {
    /// Key for a fiducial pair.
    pub fn spam(left: impl Into<SpamLabel>, right: impl Into<SpamLabel>) -> Self {
        ExperimentKey::Spam(left.into(), right.into())
    }

    /// Key for a gate experiment.
    pub fn gate(
        left: impl Into<SpamLabel>,
        gate: impl Into<GateLabel>,
        right: impl Into<SpamLabel>,
    ) -> Self {
        ExperimentKey::Gate(left.into(), gate.into(), right.into())
    }

    /// The gate under test, if any.
    pub fn gate_label(&self) -> Option<&GateLabel> {
        match self {
            ExperimentKey::Spam(..) => None,
            ExperimentKey::Gate(_, g, _) => Some(g),
        }
    }

    /// The two SPAM labels, measurement side first.
    pub fn spam_labels(&self) -> (&SpamLabel, &SpamLabel) {
        match self {
            ExperimentKey::Spam(l, r) | ExperimentKey::Gate(l, _, r) => (l, r),
        }
    }
}

impl fmt::Display for ExperimentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExperimentKey::Spam(l, r) => write!(f, "({l}, {r})"),
            ExperimentKey::Gate(l, g, r) => write!(f, "({l}, {g}, {r})"),
        }
    }
}

/// Ordered gate and fiducial labels of an experiment design.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelCatalog {
    gates: Vec<GateLabel>,
    fiducials: Vec<Fiducial>,
    gate_index: FxHashMap<GateLabel, usize>,
    spam_index: FxHashMap<SpamLabel, usize>,
}

impl LabelCatalog {
    /// Build a catalog, checking for duplicates and unknown gates in fiducials.
    pub fn new(gates: Vec<GateLabel>, fiducials: Vec<Fiducial>) -> CoreResult<Self> {
        if gates.is_empty() {
            return Err(CoreError::EmptyCatalog);
        }

        let mut gate_index = FxHashMap::default();
        for (i, g) in gates.iter().enumerate() {
            if gate_index.insert(g.clone(), i).is_some() {
                return Err(CoreError::DuplicateLabel(g.to_string()));
            }
        }

        let mut spam_index = FxHashMap::default();
        for (i, f) in fiducials.iter().enumerate() {
            if spam_index.insert(f.label.clone(), i).is_some() {
                return Err(CoreError::DuplicateLabel(f.label.to_string()));
            }
            if let Some(unknown) = f.gates.iter().find(|g| !gate_index.contains_key(*g)) {
                return Err(CoreError::UnknownGate(unknown.clone()));
            }
        }

        Ok(Self {
            gates,
            fiducials,
            gate_index,
            spam_index,
        })
    }

    /// Append a gate label. Returns its index.
    pub fn push_gate(&mut self, label: GateLabel) -> CoreResult<usize> {
        if self.gate_index.contains_key(&label) {
            return Err(CoreError::DuplicateLabel(label.to_string()));
        }
        let index = self.gates.len();
        self.gate_index.insert(label.clone(), index);
        self.gates.push(label);
        Ok(index)
    }

    /// Gate labels in catalog order.
    pub fn gates(&self) -> &[GateLabel] {
        &self.gates
    }

    /// Fiducials in catalog order.
    pub fn fiducials(&self) -> &[Fiducial] {
        &self.fiducials
    }

    /// Number of gates.
    pub fn num_gates(&self) -> usize {
        self.gates.len()
    }

    /// Number of fiducials.
    pub fn num_spam(&self) -> usize {
        self.fiducials.len()
    }

    /// Position of a gate label.
    pub fn gate_index(&self, label: &GateLabel) -> CoreResult<usize> {
        self.gate_index
            .get(label)
            .copied()
            .ok_or_else(|| CoreError::UnknownGate(label.clone()))
    }

    /// Position of a SPAM label.
    pub fn spam_index(&self, label: &SpamLabel) -> CoreResult<usize> {
        self.spam_index
            .get(label)
            .copied()
            .ok_or_else(|| CoreError::UnknownSpam(label.clone()))
    }

    /// Fiducial for a SPAM label.
    pub fn fiducial(&self, label: &SpamLabel) -> CoreResult<&Fiducial> {
        Ok(&self.fiducials[self.spam_index(label)?])
    }

    /// Gate indices of a fiducial, in multiplication order.
    pub fn fiducial_indices(&self, spam: usize) -> Vec<usize> {
        self.fiducials[spam]
            .gates
            .iter()
            .map(|g| self.gate_index[g])
            .collect()
    }

    /// Expand an experiment into gate indices, in multiplication order.
    pub fn expand(&self, key: &ExperimentKey) -> CoreResult<Vec<usize>> {
        let (left, right) = key.spam_labels();
        let mut seq = self.fiducial_indices(self.spam_index(left)?);
        if let Some(g) = key.gate_label() {
            seq.push(self.gate_index(g)?);
        }
        seq.extend(self.fiducial_indices(self.spam_index(right)?));
        Ok(seq)
    }

    /// Key of `(F_i, F_j)` by position.
    pub fn spam_key(&self, i: usize, j: usize) -> ExperimentKey {
        ExperimentKey::Spam(
            self.fiducials[i].label.clone(),
            self.fiducials[j].label.clone(),
        )
    }

    /// Key of `(F_i, G_k, F_j)` by position.
    pub fn gate_key(&self, i: usize, k: usize, j: usize) -> ExperimentKey {
        ExperimentKey::Gate(
            self.fiducials[i].label.clone(),
            self.gates[k].clone(),
            self.fiducials[j].label.clone(),
        )
    }

    /// Gram-matrix keys, row-major.
    pub fn gram_keys(&self) -> Vec<ExperimentKey> {
        let n = self.num_spam();
        (0..n)
            .flat_map(|i| (0..n).map(move |j| (i, j)))
            .map(|(i, j)| self.spam_key(i, j))
            .collect()
    }

    /// Keys of the data matrix for gate `k`, row-major.
    pub fn gate_keys(&self, k: usize) -> Vec<ExperimentKey> {
        let n = self.num_spam();
        (0..n)
            .flat_map(|i| (0..n).map(move |j| (i, j)))
            .map(|(i, j)| self.gate_key(i, k, j))
            .collect()
    }

    /// Every key a full fit reads: the Gram keys, then each gate's keys.
    pub fn required_keys(&self) -> Vec<ExperimentKey> {
        let mut keys = self.gram_keys();
        for k in 0..self.num_gates() {
            keys.extend(self.gate_keys(k));
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> LabelCatalog {
        LabelCatalog::new(
            vec!["Id".into(), "X".into(), "Y".into()],
            vec![
                Fiducial::new("F0", ["Id"]),
                Fiducial::new("F1", ["X"]),
                Fiducial::new("F2", ["Y"]),
                Fiducial::new("F3", ["X", "X"]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_expand_gate_experiment() {
        let cat = catalog();
        let seq = cat.expand(&ExperimentKey::gate("F3", "Y", "F1")).unwrap();
        assert_eq!(seq, vec![1, 1, 2, 1]);
    }

    #[test]
    fn test_expand_spam_experiment() {
        let cat = catalog();
        let seq = cat.expand(&ExperimentKey::spam("F2", "F0")).unwrap();
        assert_eq!(seq, vec![2, 0]);
    }

    #[test]
    fn test_expand_unknown_labels() {
        let cat = catalog();
        assert!(matches!(
            cat.expand(&ExperimentKey::spam("F9", "F0")),
            Err(CoreError::UnknownSpam(_))
        ));
        assert!(matches!(
            cat.expand(&ExperimentKey::gate("F0", "H", "F0")),
            Err(CoreError::UnknownGate(_))
        ));
    }

    #[test]
    fn test_required_key_count() {
        let cat = catalog();
        let keys = cat.required_keys();
        assert_eq!(keys.len(), 16 + 3 * 16);
        assert_eq!(keys[1], ExperimentKey::spam("F0", "F1"));
        assert_eq!(keys[16], ExperimentKey::gate("F0", "Id", "F0"));
    }

    #[test]
    fn test_duplicate_and_unknown_rejected() {
        let dup = LabelCatalog::new(vec!["Id".into(), "Id".into()], vec![]);
        assert!(matches!(dup, Err(CoreError::DuplicateLabel(_))));

        let unknown = LabelCatalog::new(vec!["Id".into()], vec![Fiducial::new("F0", ["Z"])]);
        assert!(matches!(unknown, Err(CoreError::UnknownGate(_))));

        let empty = LabelCatalog::new(vec![], vec![]);
        assert!(matches!(empty, Err(CoreError::EmptyCatalog)));
    }

    #[test]
    fn test_push_gate() {
        let mut cat = catalog();
        assert_eq!(cat.push_gate("H".into()).unwrap(), 3);
        assert_eq!(cat.gate_index(&"H".into()).unwrap(), 3);
        assert!(cat.push_gate("X".into()).is_err());
    }

    #[test]
    fn test_key_display_and_serde() {
        let key = ExperimentKey::gate("F0", "X", "F2");
        assert_eq!(key.to_string(), "(F0, X, F2)");
        assert_eq!(ExperimentKey::spam("F1", "F3").to_string(), "(F1, F3)");

        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, r#"{"Gate":["F0","X","F2"]}"#);
        let back: ExperimentKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
