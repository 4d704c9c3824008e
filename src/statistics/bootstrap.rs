//! Seeded resampling primitives.
//!
//! Every resampling replicate gets its own generator seeded from the
//! analysis seed and the replicate index, so results do not depend on how
//! replicates are scheduled across threads.

use rand::seq::index;
use rand::Rng;

/// Counter-based RNG seed generation using SplitMix64.
///
/// This is a stateless PRF that generates deterministic, well-distributed
/// seeds from a base seed and counter. Using this instead of simple addition
/// provides better statistical properties and avoids sequential correlation.
///
/// # Arguments
///
/// * `base_seed` - Base random seed
/// * `counter` - Iteration counter (0, 1, 2, ...)
///
/// # Returns
///
/// A 64-bit seed suitable for initializing an RNG.
#[inline]
pub fn counter_rng_seed(base_seed: u64, counter: u64) -> u64 {
    // SplitMix64: high-quality 64-bit hash function
    // See: https://xoshiro.di.unimi.it/splitmix64.c
    let mut z = base_seed.wrapping_add(counter.wrapping_mul(0x9e3779b97f4a7c15));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

/// Draw `out.len()` values from `data` without replacement into `out`.
///
/// # Panics
///
/// Panics if `out.len() > data.len()`.
pub fn sample_without_replacement_into<R: Rng + ?Sized>(data: &[f64], rng: &mut R, out: &mut [f64]) {
    assert!(
        out.len() <= data.len(),
        "Cannot draw {} values without replacement from {}",
        out.len(),
        data.len()
    );

    let picks = index::sample(rng, data.len(), out.len());
    for (slot, i) in out.iter_mut().zip(picks.into_iter()) {
        *slot = data[i];
    }
}

/// Choose `amount` distinct positions from `positions`, returned in ascending order.
///
/// Sorting keeps the extracted subsample in the caller's original order, so a
/// draw of every position reproduces the full subset exactly.
///
/// # Panics
///
/// Panics if `amount > positions.len()`.
pub fn choose_positions<R: Rng + ?Sized>(positions: &[usize], amount: usize, rng: &mut R) -> Vec<usize> {
    let mut chosen: Vec<usize> = index::sample(rng, positions.len(), amount)
        .into_iter()
        .map(|i| positions[i])
        .collect();
    chosen.sort_unstable();
    chosen
}
