//! Synthetic tomography data.

use ndarray::Array2;
use qgst_core::{GateSet, GateSetBasis, ProbabilityTable};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::DemoError;
use crate::noise::NoiseChannel;

/// A noisy gate set and the data it produces.
///
/// Channels act after every gate except the idle one. SPAM stays ideal.
#[derive(Debug, Clone)]
pub struct SyntheticExperiment {
    basis: GateSetBasis,
    noise: Vec<NoiseChannel>,
    shots: Option<u64>,
    seed: u64,
}

impl SyntheticExperiment {
    /// Noiseless experiment with exact probabilities.
    pub fn new(basis: GateSetBasis) -> Self {
        Self {
            basis,
            noise: Vec::new(),
            shots: None,
            seed: 0,
        }
    }

    /// Add a noise channel.
    pub fn with_noise(mut self, channel: NoiseChannel) -> Result<Self, DemoError> {
        channel.validate()?;
        self.noise.push(channel);
        Ok(self)
    }

    /// Sample `shots` repetitions per experiment instead of exact values.
    pub fn with_shots(mut self, shots: u64) -> Self {
        self.shots = Some(shots);
        self
    }

    /// Seed for sampling.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// The basis.
    pub fn basis(&self) -> &GateSetBasis {
        &self.basis
    }

    /// The configured channels.
    pub fn noise(&self) -> &[NoiseChannel] {
        &self.noise
    }

    /// The gate set that generates the data.
    pub fn truth(&self) -> Result<GateSet, DemoError> {
        let num_qubits = self.basis.pauli().num_qubits();
        let sq = self.basis.superop_dim();
        let identity = Array2::<f64>::eye(sq);

        let channel = self
            .noise
            .iter()
            .fold(identity.clone(), |acc, ch| ch.ptm(num_qubits).dot(&acc));

        let gates = self
            .basis
            .ideal_gates()
            .iter()
            .map(|g| {
                if is_idle(g, &identity) {
                    g.clone()
                } else {
                    channel.dot(g)
                }
            })
            .collect();
        Ok(GateSet::new(
            self.basis.gate_labels().to_vec(),
            gates,
            self.basis.measurement().clone(),
            self.basis.rho().clone(),
        )?)
    }

    /// Probability table of the truth, sampled if shots are set.
    pub fn table(&self) -> Result<ProbabilityTable, DemoError> {
        let exact = self.truth()?.predict_table(self.basis.catalog())?;
        Ok(match self.shots {
            Some(shots) => {
                debug!(shots, seed = self.seed, "Sampling synthetic table");
                let mut rng = StdRng::seed_from_u64(self.seed);
                exact.resample(shots, &mut rng)
            }
            None => exact,
        })
    }
}

fn is_idle(gate: &Array2<f64>, identity: &Array2<f64>) -> bool {
    gate.iter()
        .zip(identity.iter())
        .all(|(a, b)| (a - b).abs() < 1e-12)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_noiseless_truth_is_ideal() {
        let basis = GateSetBasis::standard().unwrap();
        let truth = SyntheticExperiment::new(basis.clone()).truth().unwrap();
        assert!(truth.total_gate_distance(&GateSet::ideal(&basis)).unwrap() < 1e-24);
    }

    #[test]
    fn test_idle_gate_is_untouched() {
        let basis = GateSetBasis::standard().unwrap();
        let truth = SyntheticExperiment::new(basis)
            .with_noise(NoiseChannel::Depolarizing { p: 0.1 })
            .unwrap()
            .truth()
            .unwrap();
        let idle = truth.gate(&"Id".into()).unwrap();
        assert_abs_diff_eq!(idle[[1, 1]], 1.0);
        let x = truth.gate(&"X_Rot_90".into()).unwrap();
        assert_abs_diff_eq!(x[[1, 1]], 0.9, epsilon = 1e-12);
    }

    #[test]
    fn test_channels_compose_in_order() {
        let basis = GateSetBasis::standard().unwrap();
        let truth = SyntheticExperiment::new(basis.clone())
            .with_noise(NoiseChannel::Depolarizing { p: 0.1 })
            .unwrap()
            .with_noise(NoiseChannel::AmplitudeDamping { gamma: 0.19 })
            .unwrap()
            .truth()
            .unwrap();
        // Y_Rot_90 maps Z to X, then depolarizing (0.9) and damping (√0.81).
        let y = truth.gate(&"Y_Rot_90".into()).unwrap();
        assert_abs_diff_eq!(y[[1, 3]].abs(), 0.9 * 0.9, epsilon = 1e-12);
        assert_eq!(truth.measurement(), basis.measurement());
    }

    #[test]
    fn test_sampling_is_reproducible() {
        let basis = GateSetBasis::standard().unwrap();
        let experiment = SyntheticExperiment::new(basis)
            .with_shots(500)
            .with_seed(3);
        let a = experiment.table().unwrap();
        let b = experiment.table().unwrap();
        for (key, p) in a.iter() {
            assert_eq!(b.get(key).unwrap(), p);
        }
    }
}
