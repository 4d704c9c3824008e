//! Sample quantiles (R-7 linear interpolation).
//!
//! Unsorted input goes through `select_nth_unstable_by`, so one quantile costs
//! O(n) on average instead of a full sort.

/// Rank of the lower order statistic and the interpolation weight towards the
/// next one, for `len` values at probability `p`.
fn r7_position(len: usize, p: f64) -> (usize, f64) {
    let last = len - 1;
    let position = last as f64 * p;
    let rank = (position.floor() as usize).min(last);
    (rank, position - rank as f64)
}

/// Quantile at probability `p`, partially reordering `data`.
///
/// # Panics
///
/// Panics if `data` is empty or if `p` is outside [0, 1].
pub fn compute_quantile(data: &mut [f64], p: f64) -> f64 {
    assert!(!data.is_empty(), "Cannot compute quantile of empty slice");
    assert!(
        (0.0..=1.0).contains(&p),
        "Quantile probability must be in [0, 1]"
    );

    let (rank, weight) = r7_position(data.len(), p);
    let (_, &mut below, above) = data.select_nth_unstable_by(rank, f64::total_cmp);
    if weight == 0.0 {
        return below;
    }

    // Everything above `rank` is unordered; its minimum is order statistic rank + 1
    above
        .iter()
        .copied()
        .min_by(f64::total_cmp)
        .map_or(below, |next| below + weight * (next - below))
}

/// Quantile of data that is already sorted ascending (R-7 definition).
///
/// # Panics
///
/// Panics if `sorted` is empty.
pub fn compute_quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    assert!(!sorted.is_empty(), "Cannot compute quantile of empty slice");

    let (rank, weight) = r7_position(sorted.len(), p.clamp(0.0, 1.0));
    match sorted.get(rank + 1) {
        Some(&next) if weight > 0.0 => sorted[rank] + weight * (next - sorted[rank]),
        _ => sorted[rank],
    }
}

/// Median of `data`, reordering it in place.
///
/// For an even count this is the mean of the two middle values.
///
/// # Panics
///
/// Panics if `data` is empty.
pub fn median_inplace(data: &mut [f64]) -> f64 {
    compute_quantile(data, 0.5)
}

/// Median of `data` without touching it (copies into a scratch buffer).
///
/// # Panics
///
/// Panics if `data` is empty.
pub fn median(data: &[f64]) -> f64 {
    let mut scratch = data.to_vec();
    median_inplace(&mut scratch)
}
