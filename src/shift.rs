//! Main `CladeShift` entry point and builder.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info};

use crate::analysis::PermutationTest;
use crate::ancestral::{marginal_probabilities, Method, Rate, Reconstruction};
use crate::changes::detect;
use crate::config::{Alternative, Config, Pooling};
use crate::error::{Error, Result};
use crate::result::{ChangeBundle, ShiftReport};
use crate::statistics::{median, Median};
use crate::tree::{duplicate_labels, TreeModel};
use crate::types::{NodeStates, State, Taxon};

/// Main entry point for clade-shift analyses.
///
/// Use the builder pattern to configure and run an analysis.
///
/// # Example
///
/// ```
/// use clade_shift::tree::TreeBuilder;
/// use clade_shift::{CladeShift, State, Taxon};
///
/// // ((A,B),C,D): C and D differ from the absent root
/// let mut builder = TreeBuilder::new();
/// let a = builder.add_tip("A", Some(1.0));
/// let b = builder.add_tip("B", Some(1.0));
/// let c = builder.add_tip("C", Some(2.0));
/// let d = builder.add_tip("D", Some(2.0));
/// let ab = builder.add_internal(&[a, b], Some(1.0));
/// builder.add_internal(&[ab, c, d], None);
/// let tree = builder.build().unwrap();
///
/// let taxa = vec![
///     Taxon::new("A", 1.0, State::Absent),
///     Taxon::new("B", 2.0, State::Absent),
///     Taxon::new("C", 30.0, State::Present),
///     Taxon::new("D", 40.0, State::Present),
/// ];
///
/// let report = CladeShift::quick().run(&tree, &taxa).unwrap();
/// assert_eq!(report.bundle.num_change(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CladeShift {
    config: Config,
}

impl CladeShift {
    /// Create with default configuration.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Create with fast configuration for exploration and tests.
    ///
    /// Settings:
    /// - 200 replicates (vs 1,000 default)
    /// - 5 rarefaction draws per size (vs 20 default)
    pub fn quick() -> Self {
        Self {
            config: Config {
                replicates: 200,
                rarefaction_draws: 5,
                ..Config::default()
            },
        }
    }

    /// Create from an explicit configuration.
    pub fn with_config(config: Config) -> Self {
        Self { config }
    }

    /// Current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Set the ancestral state estimation method.
    pub fn method(mut self, method: Method) -> Self {
        self.config.method = method;
        self
    }

    /// Set the number of permutation replicates.
    pub fn replicates(mut self, replicates: usize) -> Self {
        self.config.replicates = replicates;
        self
    }

    /// Enable or disable rarefaction.
    pub fn rarefaction(mut self, enabled: bool) -> Self {
        self.config.rarefaction = enabled;
        self
    }

    /// Set the number of random subsets per rarefied size.
    pub fn rarefaction_draws(mut self, draws: usize) -> Self {
        self.config.rarefaction_draws = draws;
        self
    }

    /// Set the seed all random draws derive from.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Set the test direction.
    pub fn alternative(mut self, alternative: Alternative) -> Self {
        self.config.alternative = alternative;
        self
    }

    /// Set how clade buckets are pooled.
    pub fn pooling(mut self, pooling: Pooling) -> Self {
        self.config.pooling = pooling;
        self
    }

    /// Natural-log transform body sizes (default: on).
    pub fn log_transform(mut self, enabled: bool) -> Self {
        self.config.log_transform = enabled;
        self
    }

    /// Divide body size by predator size before the transform.
    pub fn rescale_by_predator(mut self, enabled: bool) -> Self {
        self.config.rescale_by_predator = enabled;
        self
    }

    /// Run the full pipeline: reconstruct, detect changes, pool, test.
    ///
    /// # Errors
    /// - [`Error::LabelMismatch`] for duplicate taxa or labels that do not
    ///   match the tree tips
    /// - [`Error::InvalidTraitValue`] for a body or predator size that is not
    ///   positive and finite
    /// - [`Error::EmptySubset`] when no tip lies in a change bucket, which
    ///   includes trees whose only changes are internal nodes
    /// - any error of the estimation method or the permutation test
    pub fn run(&self, tree: &TreeModel, taxa: &[Taxon]) -> Result<ShiftReport> {
        let start = Instant::now();
        self.config.validate()?;

        let duplicates = duplicate_labels(taxa.iter().map(|t| t.label.as_str()));
        if !duplicates.is_empty() {
            return Err(Error::LabelMismatch {
                missing_in_data: Vec::new(),
                missing_in_tree: duplicates,
            });
        }

        let tip_states: HashMap<String, State> = taxa
            .iter()
            .map(|t| (t.label.clone(), t.state))
            .collect();
        let tip_values = taxa
            .iter()
            .map(|t| Ok((t.label.clone(), self.transform(t)?)))
            .collect::<Result<HashMap<String, f64>>>()?;

        let (node_states, reconstruction) = self.estimate(tree, &tip_states)?;
        let bundle = detect(tree, &node_states, &tip_values)?;
        info!(
            method = self.config.method.name(),
            clades = bundle.clades.len(),
            changes = bundle.node_changes.len(),
            change_tips = bundle.num_change(),
            "pooling clade buckets"
        );

        let (distribution, subset_indices) = pool(&bundle, self.config.pooling);
        let test = PermutationTest::from_config(&self.config).test(
            &distribution,
            &subset_indices,
            &Median,
        )?;

        Ok(ShiftReport {
            method: self.config.method,
            node_states,
            reconstruction,
            bundle,
            distribution,
            subset_indices,
            test,
            runtime_secs: start.elapsed().as_secs_f64(),
        })
    }

    fn estimate(
        &self,
        tree: &TreeModel,
        tip_states: &HashMap<String, State>,
    ) -> Result<(NodeStates, Option<Reconstruction>)> {
        match self.config.method {
            Method::Topology => Ok((Method::Topology.estimate(tree, tip_states)?, None)),
            Method::BranchLength(rate) => {
                let reconstruction = marginal_probabilities(tree, tip_states, rate)?;
                debug!(
                    rate = reconstruction.rate,
                    fitted = matches!(rate, Rate::MaximumLikelihood),
                    log_likelihood = reconstruction.log_likelihood,
                    "branch-length reconstruction"
                );
                Ok((reconstruction.states(), Some(reconstruction)))
            }
        }
    }

    /// Body size after the optional predator rescale and log transform.
    fn transform(&self, taxon: &Taxon) -> Result<f64> {
        let invalid = |value: f64| Error::InvalidTraitValue {
            label: taxon.label.clone(),
            value,
        };

        let mut value = positive(taxon.body_size).ok_or_else(|| invalid(taxon.body_size))?;
        if self.config.rescale_by_predator {
            let predator = taxon.predator_size.ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "predator rescaling requested but taxon `{}` has no predator size",
                    taxon.label
                ))
            })?;
            value /= positive(predator).ok_or_else(|| invalid(predator))?;
        }
        if self.config.log_transform {
            value = value.ln();
        }
        Ok(value)
    }
}

fn positive(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0).then_some(value)
}

/// Pool the clade buckets into one distribution and the change positions in it.
fn pool(bundle: &ChangeBundle, pooling: Pooling) -> (Vec<f64>, Vec<usize>) {
    let (normal, change) = match pooling {
        Pooling::Flatten => (bundle.flat_normal(), bundle.flat_change()),
        Pooling::CladeSummary => {
            let summarize = |buckets: &[Vec<f64>]| -> Vec<f64> {
                buckets
                    .iter()
                    .filter(|bucket| !bucket.is_empty())
                    .map(|bucket| median(bucket))
                    .collect()
            };
            (summarize(&bundle.normal_val), summarize(&bundle.change_val))
        }
    };

    let subset = (normal.len()..normal.len() + change.len()).collect();
    let mut distribution = normal;
    distribution.extend(change);
    (distribution, subset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::TreeBuilder;

    /// ((A,B),(C,(D,E))) with D and E present.
    fn fixture() -> (TreeModel, Vec<Taxon>) {
        let mut builder = TreeBuilder::new();
        let a = builder.add_tip("A", Some(1.0));
        let b = builder.add_tip("B", Some(1.0));
        let c = builder.add_tip("C", Some(2.0));
        let d = builder.add_tip("D", Some(1.0));
        let e = builder.add_tip("E", Some(1.0));
        let ab = builder.add_internal(&[a, b], Some(1.0));
        let de = builder.add_internal(&[d, e], Some(1.0));
        let cde = builder.add_internal(&[c, de], Some(1.0));
        builder.add_internal(&[ab, cde], None);
        let tree = builder.build().unwrap();

        let taxa = vec![
            Taxon::new("A", 1.0, State::Absent),
            Taxon::new("B", 2.0, State::Absent),
            Taxon::new("C", 3.0, State::Absent),
            Taxon::new("D", 50.0, State::Present),
            Taxon::new("E", 60.0, State::Present),
        ];
        (tree, taxa)
    }

    #[test]
    fn test_flatten_pools_change_tail_last() {
        let (tree, taxa) = fixture();
        let report = CladeShift::quick().run(&tree, &taxa).unwrap();

        assert_eq!(report.distribution.len(), 5);
        assert_eq!(report.subset_indices.len(), report.bundle.num_change());
        let first = report.subset_indices[0];
        assert_eq!(first, report.bundle.num_normal());
        assert_eq!(
            report.distribution[first..].to_vec(),
            report.bundle.flat_change()
        );
        assert!(report.reconstruction.is_none());
    }

    #[test]
    fn test_log_transform() {
        let (tree, taxa) = fixture();
        let logged = CladeShift::quick().run(&tree, &taxa).unwrap();
        let raw = CladeShift::quick()
            .log_transform(false)
            .run(&tree, &taxa)
            .unwrap();

        let mut expected: Vec<f64> = raw.distribution.iter().map(|v| v.ln()).collect();
        let mut got = logged.distribution.clone();
        expected.sort_by(|a, b| a.total_cmp(b));
        got.sort_by(|a, b| a.total_cmp(b));
        for (e, g) in expected.iter().zip(&got) {
            assert!((e - g).abs() < 1e-12);
        }
    }

    #[test]
    fn test_predator_rescale() {
        let (tree, taxa) = fixture();
        let taxa: Vec<Taxon> = taxa
            .into_iter()
            .map(|t| {
                let predator = t.body_size * 2.0;
                t.with_predator_size(predator)
            })
            .collect();
        let report = CladeShift::quick()
            .rescale_by_predator(true)
            .run(&tree, &taxa)
            .unwrap();
        for value in &report.distribution {
            assert!((value - 0.5f64.ln()).abs() < 1e-12);
        }
    }

    #[test]
    fn test_missing_predator_size() {
        let (tree, taxa) = fixture();
        let result = CladeShift::quick().rescale_by_predator(true).run(&tree, &taxa);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_invalid_body_size() {
        let (tree, mut taxa) = fixture();
        taxa[2].body_size = 0.0;
        let result = CladeShift::quick().run(&tree, &taxa);
        assert_eq!(
            result.unwrap_err(),
            Error::InvalidTraitValue {
                label: "C".to_string(),
                value: 0.0
            }
        );
    }

    #[test]
    fn test_duplicate_taxa() {
        let (tree, mut taxa) = fixture();
        taxa.push(Taxon::new("A", 1.0, State::Absent));
        match CladeShift::quick().run(&tree, &taxa) {
            Err(Error::LabelMismatch {
                missing_in_tree, ..
            }) => assert_eq!(missing_in_tree, vec!["A".to_string()]),
            other => panic!("expected LabelMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_no_changes_is_empty_subset() {
        let (tree, mut taxa) = fixture();
        for taxon in &mut taxa {
            taxon.state = State::Absent;
        }
        assert_eq!(
            CladeShift::quick().run(&tree, &taxa).unwrap_err(),
            Error::EmptySubset
        );
    }

    #[test]
    fn test_internal_changes_only_is_empty_subset() {
        // ((P,P,P),A,A,A,A): the present clade flips at its root node and
        // its tips match the flipped origination
        let mut builder = TreeBuilder::new();
        let present: Vec<_> = (0..3)
            .map(|i| builder.add_tip(format!("p{i}"), Some(1.0)))
            .collect();
        let mut root_children = vec![builder.add_internal(&present, Some(1.0))];
        root_children.extend((0..4).map(|i| builder.add_tip(format!("a{i}"), Some(1.0))));
        builder.add_internal(&root_children, None);
        let tree = builder.build().unwrap();

        let mut taxa: Vec<Taxon> = (0..3)
            .map(|i| Taxon::new(format!("p{i}"), 10.0, State::Present))
            .collect();
        taxa.extend((0..4).map(|i| Taxon::new(format!("a{i}"), 1.0, State::Absent)));

        let tip_states: HashMap<String, State> =
            taxa.iter().map(|t| (t.label.clone(), t.state)).collect();
        let tip_values: HashMap<String, f64> =
            taxa.iter().map(|t| (t.label.clone(), t.body_size)).collect();
        let states = Method::Topology.estimate(&tree, &tip_states).unwrap();
        let bundle = detect(&tree, &states, &tip_values).unwrap();
        assert_eq!(bundle.node_changes, vec![root_children[0]]);
        assert_eq!(bundle.num_change(), 0);
        assert_eq!(bundle.num_normal(), 7);

        let err = CladeShift::quick().run(&tree, &taxa).unwrap_err();
        assert_eq!(err, Error::EmptySubset);
        assert!(err.to_string().contains("no tip lies in a change bucket"));
    }

    #[test]
    fn test_clade_summary_pooling() {
        let bundle = ChangeBundle {
            normal_val: vec![vec![1.0, 3.0], vec![], vec![10.0]],
            change_val: vec![vec![5.0, 7.0, 9.0], vec![2.0], vec![]],
            node_changes: vec![],
            clades: vec![],
            change_labels: vec![],
        };
        let (distribution, subset) = pool(&bundle, Pooling::CladeSummary);
        assert_eq!(distribution, vec![2.0, 10.0, 7.0, 2.0]);
        assert_eq!(subset, vec![2, 3]);

        let (distribution, subset) = pool(&bundle, Pooling::Flatten);
        assert_eq!(distribution, vec![1.0, 3.0, 10.0, 5.0, 7.0, 9.0, 2.0]);
        assert_eq!(subset, vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_branch_length_keeps_reconstruction() {
        let mut builder = TreeBuilder::new();
        let tips: Vec<_> = (0..5)
            .map(|i| builder.add_tip(format!("t{i}"), Some(1.0)))
            .collect();
        builder.add_internal(&tips, None);
        let tree = builder.build().unwrap();
        let taxa: Vec<Taxon> = (0..5)
            .map(|i| Taxon::new(format!("t{i}"), 1.0 + i as f64, State::from(i == 4)))
            .collect();

        let report = CladeShift::quick()
            .method(Method::BranchLength(Rate::Fixed(0.3)))
            .run(&tree, &taxa)
            .unwrap();
        let reconstruction = report.reconstruction.unwrap();
        assert_eq!(reconstruction.rate, 0.3);
        assert_eq!(reconstruction.states(), report.node_states);
        assert_eq!(report.node_states[tree.root()], State::Absent);
        assert_eq!(report.bundle.change_labels, vec!["t4".to_string()]);
    }
}
