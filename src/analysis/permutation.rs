//! Permutation test for a shift of the change subset against the pooled values.
//!
//! Given a pooled distribution and the positions of the "change" values in it,
//! the observed effect is
//!
//! ```text
//! effect = statistic(all) - statistic(all[subset])
//! ```
//!
//! Under the null hypothesis the change values are an arbitrary sample of the
//! pool, so the null distribution is built by drawing `n = |subset|` values
//! without replacement from the pool, `replicates` times, and computing the
//! same effect. The p-value is the proportion of null effects at least as
//! extreme as the observed one.
//!
//! Replicate `i` draws from its own generator seeded with
//! `counter_rng_seed(seed, i)`, so sequential and parallel runs agree bit for
//! bit.

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::rarefaction::rarefy;
use crate::config::{validate_testing, Alternative, Config};
use crate::constants::{DEFAULT_RAREFACTION_DRAWS, DEFAULT_SEED, TIE_TOLERANCE};
use crate::error::{Error, Result};
use crate::result::{ExpectedVariability, TestResult};
use crate::statistics::{counter_rng_seed, sample_without_replacement_into, Statistic};

/// Configured permutation tester.
///
/// # Example
///
/// ```
/// use clade_shift::analysis::PermutationTest;
/// use clade_shift::statistics::Median;
///
/// let pooled: Vec<f64> = (1..=10).map(f64::from).collect();
/// let result = PermutationTest::new(1000)
///     .seed(7)
///     .test(&pooled, &[8, 9], &Median)
///     .unwrap();
///
/// assert_eq!(result.observed, -4.0);
/// assert!(result.p_value < 0.1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PermutationTest {
    replicates: usize,
    rarefaction: bool,
    rarefaction_draws: usize,
    seed: u64,
    alternative: Alternative,
    expvar_level: f64,
    alpha: f64,
}

impl Default for PermutationTest {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl PermutationTest {
    /// Tester with `replicates` null draws and default settings otherwise.
    pub fn new(replicates: usize) -> Self {
        Self {
            replicates,
            ..Self::default()
        }
    }

    /// Tester configured from the testing fields of `config`.
    pub fn from_config(config: &Config) -> Self {
        Self {
            replicates: config.replicates,
            rarefaction: config.rarefaction,
            rarefaction_draws: config.rarefaction_draws,
            seed: config.seed,
            alternative: config.alternative,
            expvar_level: config.expvar_level,
            alpha: config.alpha,
        }
    }

    /// Set the number of null replicates.
    pub fn replicates(mut self, replicates: usize) -> Self {
        self.replicates = replicates;
        self
    }

    /// Enable or disable rarefaction.
    pub fn rarefaction(mut self, enabled: bool) -> Self {
        self.rarefaction = enabled;
        self
    }

    /// Set the number of random subsets per rarefied size.
    pub fn rarefaction_draws(mut self, draws: usize) -> Self {
        self.rarefaction_draws = draws;
        self
    }

    /// Set the seed all draws derive from.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the test direction.
    pub fn alternative(mut self, alternative: Alternative) -> Self {
        self.alternative = alternative;
        self
    }

    /// Set the coverage of the `expvar` interval.
    pub fn expvar_level(mut self, level: f64) -> Self {
        self.expvar_level = level;
        self
    }

    /// Set the significance level for rarefaction summaries.
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    fn validate(&self) -> Result<()> {
        validate_testing(
            self.replicates,
            self.rarefaction,
            self.rarefaction_draws,
            self.expvar_level,
            self.alpha,
        )
    }

    /// Run the test.
    ///
    /// # Arguments
    ///
    /// * `distribution` - Pooled values (normal and change together)
    /// * `subset_indices` - Positions of the change values in `distribution`;
    ///   order and duplicates are ignored
    /// * `statistic` - Reduction applied to the pool and to each sample
    ///
    /// # Errors
    ///
    /// - [`Error::EmptySubset`] if `subset_indices` is empty
    /// - [`Error::InvalidSubset`] if a position is out of range
    /// - [`Error::NonFiniteValue`] if `distribution` holds a NaN or infinity
    /// - [`Error::InvalidStatistic`] if `statistic` fails or returns a
    ///   non-finite value on any sample
    /// - [`Error::InvalidConfig`] for zero replicates or a bad `expvar` or
    ///   `alpha` level
    pub fn test<S>(
        &self,
        distribution: &[f64],
        subset_indices: &[usize],
        statistic: &S,
    ) -> Result<TestResult>
    where
        S: Statistic + ?Sized,
    {
        self.validate()?;

        let mut subset = subset_indices.to_vec();
        subset.sort_unstable();
        subset.dedup();
        if subset.is_empty() {
            return Err(Error::EmptySubset);
        }
        if let Some(&index) = subset.iter().find(|&&i| i >= distribution.len()) {
            return Err(Error::InvalidSubset {
                index,
                len: distribution.len(),
            });
        }

        if let Some(index) = distribution.iter().position(|x| !x.is_finite()) {
            return Err(Error::NonFiniteValue { index });
        }

        let n = subset.len();
        let statistic_all = reduce(statistic, distribution)?;
        let subset_values: Vec<f64> = subset.iter().map(|&i| distribution[i]).collect();
        let statistic_subset = reduce(statistic, &subset_values)?;
        let observed = statistic_all - statistic_subset;

        debug!(
            statistic = statistic.name(),
            n,
            pool = distribution.len(),
            replicates = self.replicates,
            "building null distribution"
        );

        let null = null_effects(
            distribution,
            n,
            statistic_all,
            statistic,
            self.replicates,
            self.seed,
        )?;
        let p_value = p_value(observed, &null, self.alternative);
        let expvar = ExpectedVariability::from_null(&null, self.expvar_level);

        let rarefaction = if self.rarefaction {
            Some(rarefy(
                distribution,
                &subset,
                statistic_all,
                statistic,
                self.replicates,
                self.rarefaction_draws,
                self.seed,
                self.alternative,
                self.alpha,
            )?)
        } else {
            None
        };

        info!(
            statistic = statistic.name(),
            observed,
            p_value,
            n,
            "permutation test complete"
        );

        Ok(TestResult {
            statistic: statistic.name().to_string(),
            statistic_all,
            statistic_subset,
            observed,
            p_value,
            alternative: self.alternative,
            subset_size: n,
            distribution_size: distribution.len(),
            replicates: self.replicates,
            seed: self.seed,
            expvar,
            null_distribution: null,
            rarefaction,
        })
    }
}

/// Run a permutation test with the common knobs and default settings otherwise.
///
/// See [`PermutationTest::test`].
pub fn permutation_test<S>(
    distribution: &[f64],
    subset_indices: &[usize],
    statistic: &S,
    replicates: usize,
    rarefaction: bool,
    seed: Option<u64>,
) -> Result<TestResult>
where
    S: Statistic + ?Sized,
{
    PermutationTest::new(replicates)
        .rarefaction(rarefaction)
        .rarefaction_draws(DEFAULT_RAREFACTION_DRAWS)
        .seed(seed.unwrap_or(DEFAULT_SEED))
        .test(distribution, subset_indices, statistic)
}

/// Apply `statistic`, mapping failures and non-finite results to
/// [`Error::InvalidStatistic`].
pub(crate) fn reduce<S>(statistic: &S, sample: &[f64]) -> Result<f64>
where
    S: Statistic + ?Sized,
{
    let invalid = |reason: String| Error::InvalidStatistic {
        statistic: statistic.name().to_string(),
        reason,
    };

    let value = statistic
        .reduce(sample)
        .map_err(|err| invalid(err.to_string()))?;
    if !value.is_finite() {
        return Err(invalid(format!("non-finite result {value}")));
    }
    Ok(value)
}

/// Null effects for samples of `size` drawn without replacement from `distribution`.
///
/// Depends only on `(distribution, size, statistic, replicates, seed)`, so the
/// rarefaction curve at full size reuses exactly the main test's null.
pub(crate) fn null_effects<S>(
    distribution: &[f64],
    size: usize,
    statistic_all: f64,
    statistic: &S,
    replicates: usize,
    seed: u64,
) -> Result<Vec<f64>>
where
    S: Statistic + ?Sized,
{
    #[cfg(feature = "parallel")]
    let effects: Result<Vec<f64>> = crate::thread_pool::install(|| {
        (0..replicates)
            .into_par_iter()
            .map_init(
                // Per-thread scratch buffer
                || vec![0.0; size],
                |sample, i| null_replicate(distribution, statistic_all, statistic, seed, i, sample),
            )
            .collect()
    });

    #[cfg(not(feature = "parallel"))]
    let effects: Result<Vec<f64>> = {
        let mut sample = vec![0.0; size];
        (0..replicates)
            .map(|i| null_replicate(distribution, statistic_all, statistic, seed, i, &mut sample))
            .collect()
    };

    effects
}

fn null_replicate<S>(
    distribution: &[f64],
    statistic_all: f64,
    statistic: &S,
    seed: u64,
    i: usize,
    sample: &mut [f64],
) -> Result<f64>
where
    S: Statistic + ?Sized,
{
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(counter_rng_seed(seed, i as u64));
    sample_without_replacement_into(distribution, &mut rng, sample);
    Ok(statistic_all - reduce(statistic, sample)?)
}

/// Proportion of `null` effects at least as extreme as `observed`.
///
/// Differences within a relative [`TIE_TOLERANCE`] of `observed` count as ties
/// (extreme), so rounding noise cannot flip a comparison.
pub(crate) fn p_value(observed: f64, null: &[f64], alternative: Alternative) -> f64 {
    if null.is_empty() {
        return 1.0;
    }

    let tol = TIE_TOLERANCE * observed.abs();
    let extreme = null
        .iter()
        .filter(|&&effect| match alternative {
            Alternative::TwoSided => effect.abs() >= observed.abs() - tol,
            Alternative::Less => effect <= observed + tol,
            Alternative::Greater => effect >= observed - tol,
        })
        .count();

    extreme as f64 / null.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::{Mean, Median};

    fn one_to_ten() -> Vec<f64> {
        (1..=10).map(|x| x as f64).collect()
    }

    #[test]
    fn test_concrete_scenario() {
        let pooled = one_to_ten();
        let result = PermutationTest::new(1000)
            .test(&pooled, &[8, 9], &Median)
            .unwrap();

        assert_eq!(result.statistic_all, 5.5);
        assert_eq!(result.statistic_subset, 9.5);
        assert_eq!(result.observed, -4.0);
        // Only {1,2} and {9,10} reach |effect| = 4: 2 of 45 pairs
        assert!(result.p_value < 0.1, "p = {}", result.p_value);
        assert_eq!(result.null_distribution.len(), 1000);
        assert_eq!(result.subset_size, 2);
        assert!(result.rarefaction.is_none());
    }

    #[test]
    fn test_idempotent_with_same_seed() {
        let pooled = one_to_ten();
        let tester = PermutationTest::new(500).seed(99);
        let first = tester.test(&pooled, &[2, 7], &Median).unwrap();
        let second = tester.test(&pooled, &[2, 7], &Median).unwrap();

        assert_eq!(first.p_value.to_bits(), second.p_value.to_bits());
        assert_eq!(first.observed.to_bits(), second.observed.to_bits());
        assert_eq!(first.null_distribution, second.null_distribution);
    }

    #[test]
    fn test_subset_order_and_duplicates_ignored() {
        let pooled = one_to_ten();
        let tester = PermutationTest::new(200);
        let a = tester.test(&pooled, &[9, 8], &Median).unwrap();
        let b = tester.test(&pooled, &[8, 9, 9], &Median).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_subset() {
        let pooled = one_to_ten();
        assert_eq!(
            PermutationTest::new(10).test(&pooled, &[], &Median),
            Err(Error::EmptySubset)
        );
    }

    #[test]
    fn test_out_of_range_subset() {
        let pooled = one_to_ten();
        assert_eq!(
            PermutationTest::new(10).test(&pooled, &[3, 10], &Median),
            Err(Error::InvalidSubset { index: 10, len: 10 })
        );
    }

    #[test]
    fn test_failing_statistic() {
        let pooled = one_to_ten();
        // Fails whenever the sample contains the value 3
        let picky = |s: &[f64]| {
            if s.contains(&3.0) {
                f64::NAN
            } else {
                s.iter().sum::<f64>()
            }
        };
        let result = PermutationTest::new(200).test(&pooled[3..], &[0], &picky);
        assert!(result.is_ok());

        let result = PermutationTest::new(200).test(&pooled, &[0], &picky);
        assert!(matches!(result, Err(Error::InvalidStatistic { .. })));
    }

    #[test]
    fn test_non_finite_pool_rejected() {
        let mut pooled = one_to_ten();
        pooled[0] = f64::NAN;
        assert_eq!(
            PermutationTest::new(200).test(&pooled, &[4, 5], &Mean),
            Err(Error::NonFiniteValue { index: 0 })
        );

        let mut pooled = one_to_ten();
        pooled[7] = f64::INFINITY;
        assert_eq!(
            PermutationTest::new(200).test(&pooled, &[1], &Median),
            Err(Error::NonFiniteValue { index: 7 })
        );
    }

    #[test]
    fn test_builtin_statistic_overflow_rejected() {
        // Finite inputs whose mean overflows to infinity
        let pooled = vec![f64::MAX, f64::MAX, 1.0];
        match PermutationTest::new(50).test(&pooled, &[2], &Mean) {
            Err(Error::InvalidStatistic { statistic, reason }) => {
                assert_eq!(statistic, "mean");
                assert!(reason.contains("non-finite"));
            }
            other => panic!("expected InvalidStatistic, got {other:?}"),
        }
    }

    #[test]
    fn test_alpha_out_of_range_rejected() {
        let pooled = one_to_ten();
        for alpha in [0.0, 1.0, f64::NAN] {
            assert!(matches!(
                PermutationTest::new(10).alpha(alpha).test(&pooled, &[1], &Median),
                Err(Error::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_zero_replicates_rejected() {
        let pooled = one_to_ten();
        assert!(matches!(
            PermutationTest::new(0).test(&pooled, &[1], &Median),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_full_subset_has_zero_effect() {
        let pooled = one_to_ten();
        let all: Vec<usize> = (0..10).collect();
        let result = PermutationTest::new(50).test(&pooled, &all, &Mean).unwrap();
        assert!(result.observed.abs() < 1e-12);
        assert_eq!(result.p_value, 1.0);
    }

    #[test]
    fn test_p_value_directions() {
        let null = vec![-3.0, -1.0, 0.0, 1.0, 3.0];
        assert_eq!(p_value(2.0, &null, Alternative::TwoSided), 0.4);
        assert_eq!(p_value(2.0, &null, Alternative::Greater), 0.2);
        assert_eq!(p_value(-1.0, &null, Alternative::Less), 0.4);
        assert_eq!(p_value(0.0, &null, Alternative::TwoSided), 1.0);
    }

    #[test]
    fn test_one_sided_scenario() {
        let pooled = one_to_ten();
        let less = PermutationTest::new(1000)
            .alternative(Alternative::Less)
            .test(&pooled, &[8, 9], &Median)
            .unwrap();
        let greater = PermutationTest::new(1000)
            .alternative(Alternative::Greater)
            .test(&pooled, &[8, 9], &Median)
            .unwrap();
        assert!(less.p_value < 0.1);
        assert!(greater.p_value > 0.9);
    }

    #[test]
    fn test_expvar_brackets_null() {
        let pooled: Vec<f64> = (0..200).map(|x| (x as f64 * 0.37).sin()).collect();
        let result = PermutationTest::new(400)
            .expvar_level(0.9)
            .test(&pooled, &[1, 5, 9, 13, 17], &Median)
            .unwrap();
        let inside = result
            .null_distribution
            .iter()
            .filter(|&&x| result.expvar.contains(x))
            .count();
        let coverage = inside as f64 / 400.0;
        assert!((0.85..=0.97).contains(&coverage), "coverage {coverage}");
    }

    #[test]
    fn test_free_function_matches_builder() {
        let pooled = one_to_ten();
        let a = permutation_test(&pooled, &[8, 9], &Median, 300, false, Some(5)).unwrap();
        let b = PermutationTest::new(300).seed(5).test(&pooled, &[8, 9], &Median).unwrap();
        assert_eq!(a, b);
    }
}
