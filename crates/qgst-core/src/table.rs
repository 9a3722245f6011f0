//! Probability table: observed click probabilities indexed by experiment.

use rand::Rng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::labels::{ExperimentKey, LabelCatalog};

/// One serialized table row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityEntry {
    /// Experiment the probability belongs to.
    pub key: ExperimentKey,
    /// Probability of the `0` outcome.
    pub probability: f64,
}

/// Mapping from experiment key to the probability of the `0` outcome.
///
/// Values are validated on insertion, so every stored probability is finite
/// and lies in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<ProbabilityEntry>", try_from = "Vec<ProbabilityEntry>")]
pub struct ProbabilityTable {
    entries: FxHashMap<ExperimentKey, f64>,
}

impl ProbabilityTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a probability.
    pub fn insert(&mut self, key: ExperimentKey, probability: f64) -> CoreResult<()> {
        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(CoreError::InvalidProbability {
                key,
                value: probability,
            });
        }
        self.entries.insert(key, probability);
        Ok(())
    }

    /// Insert a probability estimated from measurement counts.
    ///
    /// The probability is the fraction of shots whose bitstring is all zeros.
    pub fn insert_counts<'a, I>(&mut self, key: ExperimentKey, counts: I) -> CoreResult<()>
    where
        I: IntoIterator<Item = (&'a str, u64)>,
    {
        let mut zeros = 0u64;
        let mut total = 0u64;
        for (bits, n) in counts {
            total += n;
            if bits.chars().all(|c| c == '0') {
                zeros += n;
            }
        }
        if total == 0 {
            return Err(CoreError::EmptyCounts(key));
        }
        self.insert(key, zeros as f64 / total as f64)
    }

    /// Look up a probability.
    pub fn get(&self, key: &ExperimentKey) -> CoreResult<f64> {
        self.entries
            .get(key)
            .copied()
            .ok_or_else(|| CoreError::MissingData(key.clone()))
    }

    /// Whether a key is present.
    pub fn contains(&self, key: &ExperimentKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&ExperimentKey, f64)> {
        self.entries.iter().map(|(k, &p)| (k, p))
    }

    /// Check that every experiment the catalog needs is present.
    ///
    /// Reports the first missing key in catalog order.
    pub fn check_complete(&self, catalog: &LabelCatalog) -> CoreResult<()> {
        match catalog
            .required_keys()
            .into_iter()
            .find(|k| !self.entries.contains_key(k))
        {
            Some(missing) => Err(CoreError::MissingData(missing)),
            None => Ok(()),
        }
    }

    /// Draw a finite-shot estimate of this table.
    ///
    /// Each entry is replaced by the observed frequency of `shots` Bernoulli
    /// trials with the stored probability.
    pub fn resample<R: Rng + ?Sized>(&self, shots: u64, rng: &mut R) -> Self {
        if shots == 0 {
            return self.clone();
        }
        let entries = self
            .entries
            .iter()
            .map(|(k, &p)| {
                let hits = (0..shots).filter(|_| rng.gen_bool(p)).count();
                (k.clone(), hits as f64 / shots as f64)
            })
            .collect();
        Self { entries }
    }
}

impl From<ProbabilityTable> for Vec<ProbabilityEntry> {
    fn from(table: ProbabilityTable) -> Self {
        let mut rows: Vec<ProbabilityEntry> = table
            .entries
            .into_iter()
            .map(|(key, probability)| ProbabilityEntry { key, probability })
            .collect();
        rows.sort_by_cached_key(|e| e.key.to_string());
        rows
    }
}

impl TryFrom<Vec<ProbabilityEntry>> for ProbabilityTable {
    type Error = CoreError;

    fn try_from(rows: Vec<ProbabilityEntry>) -> Result<Self, Self::Error> {
        let mut table = ProbabilityTable::new();
        for row in rows {
            table.insert(row.key, row.probability)?;
        }
        Ok(table)
    }
}
