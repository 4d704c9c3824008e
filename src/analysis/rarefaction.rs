//! Rarefaction: how the p-value depends on the number of change values.
//!
//! For every size `k` in `1..=n`, `draws` random `k`-subsets of the change
//! positions are tested against a null built from `k`-samples of the pool.
//! The null for size `k` uses the main seed, so at `k = n` (where every draw
//! is the full subset) the curve reproduces the main p-value exactly.

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::permutation::{null_effects, p_value, reduce};
use crate::config::Alternative;
use crate::constants::RAREFACTION_STREAM;
use crate::error::Result;
use crate::result::RarefactionPoint;
use crate::statistics::{choose_positions, counter_rng_seed, median, Statistic};

/// Rarefaction curve over subset sizes `1..=subset.len()`.
///
/// `subset` must be sorted, deduplicated and in range.
#[allow(clippy::too_many_arguments)]
pub(crate) fn rarefy<S>(
    distribution: &[f64],
    subset: &[usize],
    statistic_all: f64,
    statistic: &S,
    replicates: usize,
    draws: usize,
    seed: u64,
    alternative: Alternative,
    alpha: f64,
) -> Result<Vec<RarefactionPoint>>
where
    S: Statistic + ?Sized,
{
    let sizes = 1..=subset.len();
    let point = |size: usize| {
        rarefy_size(
            distribution,
            subset,
            size,
            statistic_all,
            statistic,
            replicates,
            draws,
            seed,
            alternative,
            alpha,
        )
    };

    #[cfg(feature = "parallel")]
    let points: Result<Vec<RarefactionPoint>> =
        crate::thread_pool::install(|| sizes.into_par_iter().map(point).collect());

    #[cfg(not(feature = "parallel"))]
    let points: Result<Vec<RarefactionPoint>> = sizes.map(point).collect();

    points
}

#[allow(clippy::too_many_arguments)]
fn rarefy_size<S>(
    distribution: &[f64],
    subset: &[usize],
    size: usize,
    statistic_all: f64,
    statistic: &S,
    replicates: usize,
    draws: usize,
    seed: u64,
    alternative: Alternative,
    alpha: f64,
) -> Result<RarefactionPoint>
where
    S: Statistic + ?Sized,
{
    let null = null_effects(distribution, size, statistic_all, statistic, replicates, seed)?;

    let mut observed = Vec::with_capacity(draws);
    let mut p_values = Vec::with_capacity(draws);
    let mut values = Vec::with_capacity(size);
    for draw in 0..draws {
        let counter = ((size as u64) << 32) | draw as u64;
        let mut rng =
            Xoshiro256PlusPlus::seed_from_u64(counter_rng_seed(seed ^ RAREFACTION_STREAM, counter));
        let chosen = choose_positions(subset, size, &mut rng);

        values.clear();
        values.extend(chosen.iter().map(|&i| distribution[i]));
        let effect = statistic_all - reduce(statistic, &values)?;

        p_values.push(p_value(effect, &null, alternative));
        observed.push(effect);
    }

    let significant = p_values.iter().filter(|&&p| p < alpha).count();
    let point = RarefactionPoint {
        size,
        median_p_value: median(&p_values),
        min_p_value: p_values.iter().copied().fold(f64::INFINITY, f64::min),
        max_p_value: p_values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        fraction_significant: significant as f64 / draws as f64,
        observed,
        p_values,
    };

    debug!(
        size,
        median_p_value = point.median_p_value,
        "rarefied subset size"
    );

    Ok(point)
}
