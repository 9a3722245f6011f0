//! Configuration for the fitting pipeline.
//!
//! Supports loading configuration from:
//! 1. Configuration files (YAML)
//! 2. Environment variables (with QGST_ prefix)
//!
//! Configuration precedence (highest to lowest):
//! 1. Environment variables
//! 2. Configuration file
//! 3. Default values

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::optimize::{AugmentedLagrangian, Bfgs, NelderMead};

/// Complete fitter configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FitConfig {
    /// Linear inversion settings
    #[serde(default)]
    pub linear_inversion: LinearInversionConfig,

    /// Gauge optimization settings
    #[serde(default)]
    pub gauge: GaugeConfig,

    /// Constrained maximum-likelihood settings
    #[serde(default)]
    pub mle: MleConfig,
}

/// Linear inversion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearInversionConfig {
    /// Largest accepted 1-norm condition estimate of the Gram matrix
    #[serde(default = "default_max_condition")]
    pub max_condition: f64,
}

/// Minimizer used for gauge optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GaugeMethod {
    /// Quasi-Newton with finite-difference gradients
    #[default]
    Bfgs,
    /// Derivative-free simplex search
    NelderMead,
}

impl fmt::Display for GaugeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GaugeMethod::Bfgs => write!(f, "bfgs"),
            GaugeMethod::NelderMead => write!(f, "nelder_mead"),
        }
    }
}

impl FromStr for GaugeMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bfgs" => Ok(GaugeMethod::Bfgs),
            "nelder_mead" | "nelder-mead" | "neldermead" => Ok(GaugeMethod::NelderMead),
            other => Err(ConfigError::ValidationError(format!(
                "Unknown gauge method: {other}"
            ))),
        }
    }
}

/// Gauge optimization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeConfig {
    /// Minimizer choice
    #[serde(default)]
    pub method: GaugeMethod,

    /// Iteration budget of the minimizer
    #[serde(default = "default_gauge_max_iterations")]
    pub max_iterations: usize,

    /// Convergence tolerance
    #[serde(default = "default_gauge_tolerance")]
    pub tolerance: f64,

    /// Wall-clock budget in seconds
    #[serde(default)]
    pub max_seconds: Option<f64>,
}

/// Constrained maximum-likelihood settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MleConfig {
    /// Multiplier updates of the augmented Lagrangian
    #[serde(default = "default_mle_max_outer")]
    pub max_outer_iterations: usize,

    /// Levenberg-Marquardt iterations per multiplier update
    #[serde(default = "default_mle_max_inner")]
    pub max_inner_iterations: usize,

    /// Inner stopping tolerance
    #[serde(default = "default_mle_tolerance")]
    pub tolerance: f64,

    /// Largest constraint violation accepted as converged
    #[serde(default = "default_constraint_tolerance")]
    pub constraint_tolerance: f64,

    /// Initial penalty parameter
    #[serde(default = "default_initial_penalty")]
    pub initial_penalty: f64,

    /// Wall-clock budget in seconds
    #[serde(default)]
    pub max_seconds: Option<f64>,

    /// Allowed deviation from a physical bound in the final estimate
    #[serde(default = "default_physicality_tolerance")]
    pub physicality_tolerance: f64,
}

// Default value functions
fn default_max_condition() -> f64 {
    1e10
}

fn default_gauge_max_iterations() -> usize {
    2000
}

fn default_gauge_tolerance() -> f64 {
    1e-10
}

fn default_mle_max_outer() -> usize {
    30
}

fn default_mle_max_inner() -> usize {
    200
}

fn default_mle_tolerance() -> f64 {
    1e-10
}

fn default_constraint_tolerance() -> f64 {
    1e-8
}

fn default_initial_penalty() -> f64 {
    10.0
}

fn default_physicality_tolerance() -> f64 {
    1e-4
}

impl Default for LinearInversionConfig {
    fn default() -> Self {
        Self {
            max_condition: default_max_condition(),
        }
    }
}

impl Default for GaugeConfig {
    fn default() -> Self {
        Self {
            method: GaugeMethod::default(),
            max_iterations: default_gauge_max_iterations(),
            tolerance: default_gauge_tolerance(),
            max_seconds: None,
        }
    }
}

impl Default for MleConfig {
    fn default() -> Self {
        Self {
            max_outer_iterations: default_mle_max_outer(),
            max_inner_iterations: default_mle_max_inner(),
            tolerance: default_mle_tolerance(),
            constraint_tolerance: default_constraint_tolerance(),
            initial_penalty: default_initial_penalty(),
            max_seconds: None,
            physicality_tolerance: default_physicality_tolerance(),
        }
    }
}

fn seconds(limit: Option<f64>) -> Option<Duration> {
    limit.and_then(|s| Duration::try_from_secs_f64(s).ok())
}

impl GaugeConfig {
    /// BFGS minimizer with this budget.
    pub fn bfgs(&self) -> Bfgs {
        Bfgs::new()
            .with_maxiter(self.max_iterations)
            .with_tol(self.tolerance, self.tolerance)
            .with_max_duration(seconds(self.max_seconds))
    }

    /// Nelder-Mead minimizer with this budget.
    pub fn nelder_mead(&self) -> NelderMead {
        NelderMead::new()
            .with_maxiter(self.max_iterations)
            .with_tol(self.tolerance)
            .with_max_duration(seconds(self.max_seconds))
    }
}

impl MleConfig {
    /// Augmented-Lagrangian solver with these settings.
    pub fn solver(&self) -> AugmentedLagrangian {
        AugmentedLagrangian {
            tol: self.tolerance,
            constraint_tol: self.constraint_tolerance,
            initial_penalty: self.initial_penalty,
            ..AugmentedLagrangian::default()
        }
        .with_iterations(self.max_outer_iterations, self.max_inner_iterations)
        .with_max_duration(seconds(self.max_seconds))
    }
}

impl FitConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: FitConfig = serde_yaml_ng::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment variable overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = FitConfig::default().merge_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with the following precedence:
    /// 1. Load from file if provided
    /// 2. Apply environment variable overrides
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let config = if let Some(path) = config_file {
            Self::from_file(path)?
        } else {
            FitConfig::default()
        };

        let config = config.merge_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Merge environment variables into this configuration.
    ///
    /// Only variables that are set override the current values.
    pub fn merge_env(self) -> Result<Self, ConfigError> {
        self.merge_vars(|key| std::env::var(key).ok())
    }

    fn merge_vars<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::ParseError(format!("{key}={value}")))
        }

        // Linear inversion
        if let Some(v) = lookup("QGST_MAX_CONDITION") {
            self.linear_inversion.max_condition = parse("QGST_MAX_CONDITION", v)?;
        }

        // Gauge
        if let Some(v) = lookup("QGST_GAUGE_METHOD") {
            self.gauge.method = v.parse()?;
        }
        if let Some(v) = lookup("QGST_GAUGE_MAX_ITERATIONS") {
            self.gauge.max_iterations = parse("QGST_GAUGE_MAX_ITERATIONS", v)?;
        }

        // Maximum likelihood
        if let Some(v) = lookup("QGST_MLE_MAX_OUTER") {
            self.mle.max_outer_iterations = parse("QGST_MLE_MAX_OUTER", v)?;
        }
        if let Some(v) = lookup("QGST_MLE_MAX_INNER") {
            self.mle.max_inner_iterations = parse("QGST_MLE_MAX_INNER", v)?;
        }
        if let Some(v) = lookup("QGST_MLE_MAX_SECONDS") {
            self.mle.max_seconds = Some(parse("QGST_MLE_MAX_SECONDS", v)?);
        }
        if let Some(v) = lookup("QGST_PHYSICALITY_TOLERANCE") {
            self.mle.physicality_tolerance = parse("QGST_PHYSICALITY_TOLERANCE", v)?;
        }

        Ok(self)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(name: &str, value: f64) -> Result<(), ConfigError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::ValidationError(format!(
                    "{name} must be a positive number, got {value}"
                )))
            }
        }

        if !(self.linear_inversion.max_condition >= 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "max_condition must be at least 1, got {}",
                self.linear_inversion.max_condition
            )));
        }

        positive("gauge.tolerance", self.gauge.tolerance)?;
        positive("mle.tolerance", self.mle.tolerance)?;
        positive("mle.constraint_tolerance", self.mle.constraint_tolerance)?;
        positive("mle.initial_penalty", self.mle.initial_penalty)?;
        positive("mle.physicality_tolerance", self.mle.physicality_tolerance)?;
        if let Some(s) = self.gauge.max_seconds {
            positive("gauge.max_seconds", s)?;
        }
        if let Some(s) = self.mle.max_seconds {
            positive("mle.max_seconds", s)?;
        }

        if self.gauge.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "gauge.max_iterations must be greater than 0".to_string(),
            ));
        }
        if self.mle.max_outer_iterations == 0 || self.mle.max_inner_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "mle iteration limits must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
