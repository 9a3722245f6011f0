//! Noise channels for synthetic gate sets.
//!
//! Every channel acts independently on each qubit, so its PTM on `n` qubits
//! is the `n`-fold Kronecker power of the single-qubit PTM in the normalized
//! `{I, X, Y, Z}` basis.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, array};
use serde::{Deserialize, Serialize};

use crate::DemoError;

/// A single-qubit noise channel.
///
/// Only used to corrupt synthetic gate sets for the demo and its tests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum NoiseChannel {
    /// With probability `p`, replaces the state with the maximally mixed
    /// state.
    Depolarizing {
        /// Error probability (0.0 to 1.0).
        p: f64,
    },

    /// Energy relaxation towards `|0⟩` (T1 decay).
    AmplitudeDamping {
        /// Damping parameter (0.0 to 1.0).
        gamma: f64,
    },
}

impl NoiseChannel {
    /// Short name used on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            NoiseChannel::Depolarizing { .. } => "depolarizing",
            NoiseChannel::AmplitudeDamping { .. } => "amplitude_damping",
        }
    }

    /// The channel's only parameter.
    pub fn error_param(&self) -> f64 {
        match *self {
            NoiseChannel::Depolarizing { p } => p,
            NoiseChannel::AmplitudeDamping { gamma } => gamma,
        }
    }

    /// Reject parameters outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), DemoError> {
        let value = self.error_param();
        if (0.0..=1.0).contains(&value) {
            Ok(())
        } else {
            Err(DemoError::InvalidNoise {
                channel: self.name().to_string(),
                value,
            })
        }
    }

    /// Single-qubit PTM.
    pub fn single_qubit_ptm(&self) -> Array2<f64> {
        match *self {
            NoiseChannel::Depolarizing { p } => Array2::from_diag(&array![1.0, 1.0 - p, 1.0 - p, 1.0 - p]),
            NoiseChannel::AmplitudeDamping { gamma } => {
                let s = (1.0 - gamma).sqrt();
                array![
                    [1.0, 0.0, 0.0, 0.0],
                    [0.0, s, 0.0, 0.0],
                    [0.0, 0.0, s, 0.0],
                    [gamma, 0.0, 0.0, 1.0 - gamma],
                ]
            }
        }
    }

    /// PTM on `num_qubits` qubits.
    pub fn ptm(&self, num_qubits: usize) -> Array2<f64> {
        let single = self.single_qubit_ptm();
        (1..num_qubits).fold(single.clone(), |acc, _| ndarray::linalg::kron(&acc, &single))
    }
}

impl fmt::Display for NoiseChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoiseChannel::Depolarizing { p } => write!(f, "{}(p={p:.4})", self.name()),
            NoiseChannel::AmplitudeDamping { gamma } => write!(f, "{}(γ={gamma:.4})", self.name()),
        }
    }
}

/// Parses `name:value`, e.g. `depolarizing:0.05`.
impl FromStr for NoiseChannel {
    type Err = DemoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, value) = s
            .split_once(':')
            .ok_or_else(|| DemoError::NoiseSyntax(s.to_string()))?;
        let value: f64 = value
            .trim()
            .parse()
            .map_err(|_| DemoError::NoiseSyntax(s.to_string()))?;

        let channel = match name.trim().to_lowercase().replace('-', "_").as_str() {
            "depolarizing" | "dep" => NoiseChannel::Depolarizing { p: value },
            "amplitude_damping" | "ad" => NoiseChannel::AmplitudeDamping { gamma: value },
            _ => return Err(DemoError::NoiseSyntax(s.to_string())),
        };
        channel.validate()?;
        Ok(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_parse() {
        let ch: NoiseChannel = "depolarizing:0.05".parse().unwrap();
        assert_eq!(ch, NoiseChannel::Depolarizing { p: 0.05 });
        let ch: NoiseChannel = "Amplitude-Damping: 0.1".parse().unwrap();
        assert_eq!(ch, NoiseChannel::AmplitudeDamping { gamma: 0.1 });
        assert!("depolarizing".parse::<NoiseChannel>().is_err());
        assert!("depolarizing:1.5".parse::<NoiseChannel>().is_err());
        assert!("leakage:0.1".parse::<NoiseChannel>().is_err());
        assert!("phase_flip:0.1".parse::<NoiseChannel>().is_err());
    }

    #[test]
    fn test_trace_preserving() {
        for ch in [
            NoiseChannel::Depolarizing { p: 0.2 },
            NoiseChannel::AmplitudeDamping { gamma: 0.3 },
        ] {
            let ptm = ch.ptm(2);
            assert_eq!(ptm.dim(), (16, 16));
            assert_abs_diff_eq!(ptm[[0, 0]], 1.0);
            for b in 1..16 {
                assert_abs_diff_eq!(ptm[[0, b]], 0.0);
            }
        }
    }

    #[test]
    fn test_full_depolarization_erases_bloch_vector() {
        let ptm = NoiseChannel::Depolarizing { p: 1.0 }.single_qubit_ptm();
        let out = ptm.dot(&array![1.0, 0.3, -0.2, 0.5]);
        assert_abs_diff_eq!(out[0], 1.0);
        assert_abs_diff_eq!(out[1] + out[2].abs() + out[3].abs(), 0.0);
    }

    #[test]
    fn test_serde_tagging() {
        let json = serde_json::to_string(&NoiseChannel::AmplitudeDamping { gamma: 0.1 }).unwrap();
        assert_eq!(json, r#"{"channel":"amplitude_damping","gamma":0.1}"#);
        assert_eq!(NoiseChannel::AmplitudeDamping { gamma: 0.1 }.to_string(), "amplitude_damping(γ=0.1000)");
    }
}
