//! Result types: change buckets, test results and the full report.

use serde::{Deserialize, Serialize};

use crate::ancestral::{Method, Reconstruction};
use crate::config::Alternative;
use crate::statistics::compute_quantile_sorted;
use crate::tree::NodeId;
use crate::types::{NodeStates, State};

/// A clade: the node where an origination segment starts, and its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clade {
    /// Root of the tree or a change node.
    pub node: NodeId,
    /// State every descendant tip is compared against.
    pub origination: State,
}

/// Tip values split into "consistent with clade origin" and "measured at a change".
///
/// `normal_val`, `change_val` and `clades` are parallel: entry `k` of each
/// belongs to clade `k`. Serialized with the field names plotting code
/// expects (`normal.val`, `change.val`, `node.changes`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeBundle {
    /// Values of tips matching their clade's origination, per clade.
    #[serde(rename = "normal.val")]
    pub normal_val: Vec<Vec<f64>>,

    /// Values of tips whose state differs from their clade's origination, per clade.
    #[serde(rename = "change.val")]
    pub change_val: Vec<Vec<f64>>,

    /// Change points in pre-order (internal nodes and tips).
    #[serde(rename = "node.changes")]
    pub node_changes: Vec<NodeId>,

    /// Clades in the order they were opened (root clade first).
    pub clades: Vec<Clade>,

    /// Labels of change-bucket tips, in flattened `change_val` order.
    pub change_labels: Vec<String>,
}

impl ChangeBundle {
    /// Number of values in the normal buckets.
    pub fn num_normal(&self) -> usize {
        self.normal_val.iter().map(Vec::len).sum()
    }

    /// Number of values in the change buckets.
    pub fn num_change(&self) -> usize {
        self.change_val.iter().map(Vec::len).sum()
    }

    /// All normal values, clade by clade.
    pub fn flat_normal(&self) -> Vec<f64> {
        self.normal_val.iter().flatten().copied().collect()
    }

    /// All change values, clade by clade.
    pub fn flat_change(&self) -> Vec<f64> {
        self.change_val.iter().flatten().copied().collect()
    }
}

/// Central interval and moments of the null distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedVariability {
    /// Coverage of the interval (e.g. 0.95).
    pub level: f64,
    /// Lower bound of the central interval.
    pub lower: f64,
    /// Upper bound of the central interval.
    pub upper: f64,
    /// Mean of the null effects.
    pub mean: f64,
    /// Standard deviation of the null effects.
    pub sd: f64,
}

impl ExpectedVariability {
    /// Summarize null effects.
    ///
    /// # Panics
    /// Panics if `null` is empty.
    pub fn from_null(null: &[f64], level: f64) -> Self {
        let mut sorted = null.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let tail = (1.0 - level) / 2.0;
        let n = null.len() as f64;
        let mean = null.iter().sum::<f64>() / n;
        let sd = if null.len() < 2 {
            0.0
        } else {
            (null.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        };

        Self {
            level,
            lower: compute_quantile_sorted(&sorted, tail),
            upper: compute_quantile_sorted(&sorted, 1.0 - tail),
            mean,
            sd,
        }
    }

    /// Whether `value` falls inside the central interval.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Test outcome at one rarefied subset size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RarefactionPoint {
    /// Subset size drawn from the change positions.
    pub size: usize,
    /// Observed effect for each draw.
    pub observed: Vec<f64>,
    /// p-value for each draw.
    pub p_values: Vec<f64>,
    /// Median of `p_values`.
    pub median_p_value: f64,
    /// Smallest p-value across draws.
    pub min_p_value: f64,
    /// Largest p-value across draws.
    pub max_p_value: f64,
    /// Fraction of draws with p-value below `alpha`.
    pub fraction_significant: f64,
}

/// Complete result of a permutation test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Name of the statistic.
    pub statistic: String,
    /// Statistic of the whole pooled distribution.
    pub statistic_all: f64,
    /// Statistic of the change subset.
    pub statistic_subset: f64,
    /// Observed effect, `statistic_all - statistic_subset`.
    pub observed: f64,
    /// Proportion of null effects at least as extreme as `observed`.
    pub p_value: f64,
    /// Direction used for `p_value`.
    pub alternative: Alternative,
    /// Size of the change subset.
    pub subset_size: usize,
    /// Size of the pooled distribution.
    pub distribution_size: usize,
    /// Number of null replicates.
    pub replicates: usize,
    /// Seed the run was derived from.
    pub seed: u64,
    /// Null distribution summary.
    pub expvar: ExpectedVariability,
    /// Raw null effects, in replicate order.
    pub null_distribution: Vec<f64>,
    /// p-value curve over subset sizes 1..=n, when requested.
    pub rarefaction: Option<Vec<RarefactionPoint>>,
}

impl TestResult {
    /// Whether the p-value is below `alpha`.
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

/// Everything an analysis run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftReport {
    /// Estimation method used.
    pub method: Method,
    /// State of every node.
    pub node_states: NodeStates,
    /// Likelihood reconstruction details (branch-length method only).
    pub reconstruction: Option<Reconstruction>,
    /// Change buckets.
    pub bundle: ChangeBundle,
    /// Pooled distribution handed to the tester.
    pub distribution: Vec<f64>,
    /// Positions of the change subset in `distribution`.
    pub subset_indices: Vec<usize>,
    /// Permutation test outcome.
    pub test: TestResult,
    /// Wall time of the run in seconds.
    pub runtime_secs: f64,
}
