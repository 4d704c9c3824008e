//! Configuration for clade-shift analyses.

use serde::{Deserialize, Serialize};

use crate::ancestral::Method;
use crate::constants::{DEFAULT_RAREFACTION_DRAWS, DEFAULT_REPLICATES, DEFAULT_SEED};
use crate::error::{Error, Result};

/// Configuration options for `CladeShift` and `PermutationTest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Ancestral state estimation strategy (default: topology).
    pub method: Method,

    /// Permutation replicates for the null distribution (default: 1,000).
    pub replicates: usize,

    /// Repeat the test over subset sizes 1..=n (default: false).
    pub rarefaction: bool,

    /// Random subsets drawn per rarefied size (default: 20).
    pub rarefaction_draws: usize,

    /// Seed for every random draw of the run (default: 42).
    ///
    /// Set once at analysis start; the same seed and inputs reproduce the
    /// run bit for bit, with or without the `parallel` feature.
    pub seed: u64,

    /// Direction of the test (default: two-sided).
    pub alternative: Alternative,

    /// Coverage of the central null interval reported as `expvar` (default: 0.95).
    pub expvar_level: f64,

    /// Significance level used in rarefaction summaries (default: 0.05).
    pub alpha: f64,

    /// How per-clade values are pooled into one distribution (default: flatten).
    pub pooling: Pooling,

    /// Natural-log transform body sizes before testing (default: true).
    pub log_transform: bool,

    /// Divide body size by predator size before the transform (default: false).
    pub rescale_by_predator: bool,
}

/// Direction in which the observed effect is judged extreme.
///
/// The effect is `statistic(all) - statistic(change subset)`, so `Less`
/// means the change subset sits above the pooled distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Alternative {
    /// |null| ≥ |observed|.
    #[default]
    TwoSided,
    /// null ≤ observed.
    Less,
    /// null ≥ observed.
    Greater,
}

/// Pooling of the per-clade buckets into the tested distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Pooling {
    /// Every tip value counts once; change values form the tail.
    #[default]
    Flatten,
    /// Each non-empty clade bucket contributes one value, its statistic.
    CladeSummary,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            method: Method::Topology,
            replicates: DEFAULT_REPLICATES,
            rarefaction: false,
            rarefaction_draws: DEFAULT_RAREFACTION_DRAWS,
            seed: DEFAULT_SEED,
            alternative: Alternative::TwoSided,
            expvar_level: 0.95,
            alpha: 0.05,
            pooling: Pooling::Flatten,
            log_transform: true,
            rescale_by_predator: false,
        }
    }
}

impl Config {
    /// Check value ranges.
    ///
    /// # Errors
    /// [`Error::InvalidConfig`] for zero replicates or draws, or levels
    /// outside (0, 1).
    pub fn validate(&self) -> Result<()> {
        validate_testing(
            self.replicates,
            self.rarefaction,
            self.rarefaction_draws,
            self.expvar_level,
            self.alpha,
        )
    }
}

/// Range checks shared by [`Config`] and the permutation tester.
pub(crate) fn validate_testing(
    replicates: usize,
    rarefaction: bool,
    rarefaction_draws: usize,
    expvar_level: f64,
    alpha: f64,
) -> Result<()> {
    if replicates == 0 {
        return Err(Error::InvalidConfig("replicates must be at least 1".to_string()));
    }
    if rarefaction && rarefaction_draws == 0 {
        return Err(Error::InvalidConfig(
            "rarefaction_draws must be at least 1".to_string(),
        ));
    }
    if !(expvar_level > 0.0 && expvar_level < 1.0) {
        return Err(Error::InvalidConfig(format!(
            "expvar_level {expvar_level} outside (0, 1)"
        )));
    }
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(Error::InvalidConfig(format!("alpha {alpha} outside (0, 1)")));
    }
    Ok(())
}
