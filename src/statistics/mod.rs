//! Statistical building blocks for the permutation test.
//!
//! - Quantile computation using O(n) selection algorithms
//! - Pluggable summary statistics (median by default)
//! - Seeded resampling without replacement

mod bootstrap;
mod quantile;
mod statistic;

pub use bootstrap::{choose_positions, counter_rng_seed, sample_without_replacement_into};
pub use quantile::{compute_quantile, compute_quantile_sorted, median, median_inplace};
pub use statistic::{Mean, Median, Quantile, Statistic, StatisticError};
