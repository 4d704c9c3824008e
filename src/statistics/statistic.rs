//! Summary statistics used by the permutation test.
//!
//! The tester only needs "reduce a sample to one number". Built-ins cover the
//! median (default), mean and arbitrary quantiles; any closure
//! `Fn(&[f64]) -> f64` works as well.

use std::fmt;

use super::quantile::{compute_quantile, median};

/// Why a statistic could not be computed on a sample.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticError(pub String);

impl fmt::Display for StatisticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for StatisticError {}

/// A reduction of a numeric sample to a scalar.
///
/// Implementations must be deterministic and thread-safe; the tester calls
/// `reduce` from worker threads under the `parallel` feature.
pub trait Statistic: Sync {
    /// Name used in reports and error messages.
    fn name(&self) -> &str;

    /// Reduce `sample` to a single value.
    fn reduce(&self, sample: &[f64]) -> Result<f64, StatisticError>;
}

fn non_empty(sample: &[f64]) -> Result<(), StatisticError> {
    if sample.is_empty() {
        Err(StatisticError("empty sample".to_string()))
    } else {
        Ok(())
    }
}

/// Sample median.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Median;

impl Statistic for Median {
    fn name(&self) -> &str {
        "median"
    }

    fn reduce(&self, sample: &[f64]) -> Result<f64, StatisticError> {
        non_empty(sample)?;
        Ok(median(sample))
    }
}

/// Arithmetic mean.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Mean;

impl Statistic for Mean {
    fn name(&self) -> &str {
        "mean"
    }

    fn reduce(&self, sample: &[f64]) -> Result<f64, StatisticError> {
        non_empty(sample)?;
        Ok(sample.iter().sum::<f64>() / sample.len() as f64)
    }
}

/// Quantile at probability `p` (R-7 definition).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantile(pub f64);

impl Statistic for Quantile {
    fn name(&self) -> &str {
        "quantile"
    }

    fn reduce(&self, sample: &[f64]) -> Result<f64, StatisticError> {
        non_empty(sample)?;
        if !(0.0..=1.0).contains(&self.0) {
            return Err(StatisticError(format!(
                "quantile probability {} outside [0, 1]",
                self.0
            )));
        }
        let mut scratch = sample.to_vec();
        Ok(compute_quantile(&mut scratch, self.0))
    }
}

/// Closures are statistics; a non-finite result counts as a failure.
impl<F> Statistic for F
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    fn name(&self) -> &str {
        "custom"
    }

    fn reduce(&self, sample: &[f64]) -> Result<f64, StatisticError> {
        let value = self(sample);
        if value.is_finite() {
            Ok(value)
        } else {
            Err(StatisticError(format!("non-finite result {value}")))
        }
    }
}
