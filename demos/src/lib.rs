//! qgst Demo Suite
//!
//! Synthetic gate set tomography experiments:
//!
//! - **Noise channels** ([`noise::NoiseChannel`]): depolarizing and
//!   amplitude damping as Pauli transfer matrices
//! - **Synthetic data** ([`synthetic::SyntheticExperiment`]): a noisy
//!   gate set and its exact or sampled probability table
//!
//! The `gst-demo` binary drives both together with the fitter.

pub mod noise;
pub mod synthetic;

use console::style;
use qgst_core::{CoreError, GateSet, PauliBasis};
use thiserror::Error;

/// Errors raised while building synthetic experiments.
#[derive(Debug, Error)]
pub enum DemoError {
    /// Noise parameter outside `[0, 1]`.
    #[error("Invalid {channel} parameter: {value} (must be within [0, 1])")]
    InvalidNoise {
        /// Channel name.
        channel: String,
        /// Offending value.
        value: f64,
    },

    /// Unparseable `name:value` noise spec.
    #[error("Cannot parse noise channel '{0}', expected e.g. 'depolarizing:0.05'")]
    NoiseSyntax(String),

    /// Gate set construction failed.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Print a demo header.
pub fn print_header(title: &str) {
    println!();
    println!("{}", style("═".repeat(60)).cyan());
    println!("{}", style(format!("  {title}")).cyan().bold());
    println!("{}", style("═".repeat(60)).cyan());
    println!();
}

/// Print a demo section.
pub fn print_section(title: &str) {
    println!();
    println!("{}", style(format!("▶ {title}")).green().bold());
    println!("{}", style("─".repeat(40)).dim());
}

/// Print a result line.
pub fn print_result(label: &str, value: impl std::fmt::Display) {
    println!("  {} {}", style(format!("{label}:")).dim(), value);
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", style("✓").green().bold(), message);
}

/// Print a warning message.
pub fn print_warning(message: &str) {
    println!("{} {}", style("⚠").yellow().bold(), message);
}

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", style("ℹ").blue(), message);
}

/// Print every matrix of a gate set, labelled with Pauli names.
pub fn print_gate_set(gate_set: &GateSet, pauli: &PauliBasis) {
    let sq = gate_set.superop_dim();
    let header: Vec<String> = (0..sq).map(|a| format!("{:>8}", pauli.label(a))).collect();

    for (label, gate) in gate_set.labels().iter().zip(gate_set.gates()) {
        println!("  {}", style(label).yellow().bold());
        println!("  {:>4}{}", "", header.join(""));
        for a in 0..sq {
            let row: Vec<String> = gate.row(a).iter().map(|v| format!("{v:>8.4}")).collect();
            println!("  {:>4}{}", pauli.label(a), row.join(""));
        }
    }
    let fmt_vec = |v: &ndarray::Array1<f64>| {
        v.iter()
            .map(|x| format!("{x:.4}"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    println!("  {} [{}]", style("E  ").yellow().bold(), fmt_vec(gate_set.measurement()));
    println!("  {} [{}]", style("rho").yellow().bold(), fmt_vec(gate_set.rho()));
}
