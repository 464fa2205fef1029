//! Run configuration for the penalty engine
use std::sync::{LazyLock, RwLock};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Process wide defaults, used when building reactions without explicit bounds
pub static CONFIGURATION: LazyLock<RwLock<Configuration>> =
    LazyLock::new(|| RwLock::new(Configuration::default()));

/// Configuration of a penalty run
///
/// Every field has a default (see [`Configuration::default`]), so a
/// [`ConfigurationBuilder`] only needs the values which should differ.
///
/// # Examples
/// ```rust
/// use compass_core::configuration::ConfigurationBuilder;
/// let config = ConfigurationBuilder::default()
///     .processes(4)
///     .optimality_fraction(0.9)
///     .build()
///     .unwrap();
/// assert_eq!(config.processes, 4);
/// ```
#[derive(Builder, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[builder(default)]
pub struct Configuration {
    /// Default lower flux bound for reactions
    pub lower_bound: f64,
    /// Default upper flux bound for reactions
    pub upper_bound: f64,
    /// Absolute tolerance, fluxes at or below this are treated as zero
    pub tolerance: f64,
    /// Fraction of a reaction's maximal flux it is held at while the penalty is minimized
    pub optimality_fraction: f64,
    /// Weight for reactions without a GPR, or whose genes were all unmeasured
    pub default_weight: f64,
    /// Value substituted for genes missing from a sample's expression.
    ///
    /// `None` skips those genes, so a node is evaluated over its measured children
    pub missing_gene_value: Option<f64>,
    /// LP solver backend
    pub solver: Solver,
    /// Maximum number of samples computed concurrently
    pub processes: usize,
    /// Solver time limit per LP in seconds, a halted solve is recorded as unsolved
    pub time_limit: Option<f64>,
    /// Solver iteration limit per LP
    pub max_iterations: u32,
    /// How many times a sample is handed out before it is marked failed
    pub max_sample_attempts: u32,
    /// Let a restarted sample keep the reactions it had already durably stored
    pub reuse_partial_results: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            lower_bound: -1000.,
            upper_bound: 1000.,
            tolerance: 1e-07,
            optimality_fraction: 0.95,
            default_weight: 0.,
            missing_gene_value: None,
            solver: Solver::default(),
            processes: 1,
            time_limit: None,
            max_iterations: 200,
            max_sample_attempts: 3,
            reuse_partial_results: false,
        }
    }
}

impl Configuration {
    /// Check that the values are usable for a run
    pub fn check(&self) -> Result<(), ConfigurationError> {
        if !(self.optimality_fraction > 0. && self.optimality_fraction <= 1.) {
            return Err(ConfigurationError::OptimalityFraction(self.optimality_fraction));
        }
        if !(self.tolerance > 0.) {
            return Err(ConfigurationError::Tolerance(self.tolerance));
        }
        if self.lower_bound > self.upper_bound {
            return Err(ConfigurationError::InvalidDefaultBounds);
        }
        if !(self.default_weight >= 0.) {
            return Err(ConfigurationError::NegativeWeight(self.default_weight));
        }
        if let Some(value) = self.missing_gene_value {
            if !(value >= 0.) {
                return Err(ConfigurationError::NegativeWeight(value));
            }
        }
        if self.processes == 0 {
            return Err(ConfigurationError::NoProcesses);
        }
        if self.max_sample_attempts == 0 {
            return Err(ConfigurationError::NoAttempts);
        }
        Ok(())
    }
}

/// Enum used to specify the solver to use
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Solver {
    /// Use the Clarabel interior point solver
    #[default]
    Clarabel,
    /// Use the microlp simplex solver, requires the minilp feature to be enabled
    Microlp,
}

/// Errors for configuration values which can't be used
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("optimality fraction must be in (0, 1], got {0}")]
    OptimalityFraction(f64),
    #[error("tolerance must be positive, got {0}")]
    Tolerance(f64),
    #[error("default lower bound is greater than the default upper bound")]
    InvalidDefaultBounds,
    #[error("expression derived weights must be non-negative, got {0}")]
    NegativeWeight(f64),
    #[error("at least one process is required")]
    NoProcesses,
    #[error("samples need at least one attempt")]
    NoAttempts,
}
