//! Marginal ancestral reconstruction under a two-state Markov model.
//!
//! The defense trait evolves along branches as a continuous-time Markov chain
//! with equal gain and loss rate `q`:
//!
//! ```text
//! Q = [[-q, q], [q, -q]]      P(t) = exp(Qt)
//! ```
//!
//! Conditional likelihoods are pruned from the tips to the root (Felsenstein),
//! then an outside pass carries the information from the rest of the tree back
//! down to every node. Combining the two gives the marginal posterior of each
//! internal node under a flat root prior, the same answer rerooting at every
//! node would give.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Rate;
use crate::error::{Error, Result};
use crate::tree::TreeModel;
use crate::types::{NodeStates, State};

/// Flat prior on the root state.
const ROOT_PRIOR: [f64; 2] = [0.5, 0.5];

/// Golden ratio conjugate for the rate search.
const INV_PHI: f64 = 0.618_033_988_749_894_8;

/// Iteration cap for the rate search.
const MAX_RATE_ITERATIONS: usize = 200;

/// Output of the branch-length reconstruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconstruction {
    /// Marginal probability of `Present` for each node (tips are 0 or 1).
    pub probabilities: Vec<f64>,
    /// Transition rate used (fitted or fixed).
    pub rate: f64,
    /// Log-likelihood of the tip states at that rate.
    pub log_likelihood: f64,
}

impl Reconstruction {
    /// Discretize: `Present` iff the marginal probability is at least 0.5.
    pub fn states(&self) -> NodeStates {
        self.probabilities
            .iter()
            .map(|&p| State::from(p >= 0.5))
            .collect()
    }
}

/// Marginal probabilities of presence for every node.
///
/// # Errors
/// - [`Error::LabelMismatch`] if `tip_states` and the tree tips disagree
/// - [`Error::MissingBranchLength`] if an edge length is absent or non-positive
/// - [`Error::InvalidRate`] for a non-positive or non-finite fixed rate
pub fn marginal_probabilities(
    tree: &TreeModel,
    tip_states: &HashMap<String, State>,
    rate: Rate,
) -> Result<Reconstruction> {
    let tips = tree.tip_values(tip_states)?;
    reconstruct(tree, &tips, rate)
}

pub(super) fn reconstruct(
    tree: &TreeModel,
    tips: &[Option<State>],
    rate: Rate,
) -> Result<Reconstruction> {
    if let Some(node) = tree.first_missing_branch_length() {
        return Err(Error::MissingBranchLength { node });
    }

    let rate = match rate {
        Rate::Fixed(q) if q.is_finite() && q > 0.0 => q,
        Rate::Fixed(q) => return Err(Error::InvalidRate(q)),
        Rate::MaximumLikelihood => fit_rate(tree, tips),
    };

    let pruned = prune(tree, tips, rate);
    let log_likelihood = root_log_likelihood(tree, &pruned);
    let probabilities = marginals(tree, &pruned, rate);

    debug!(rate, log_likelihood, "branch-length reconstruction");

    Ok(Reconstruction {
        probabilities,
        rate,
        log_likelihood,
    })
}

/// Transition probability matrix for binary evolution.
///
/// Analytical solution for the 2×2 chain with gain rate λ and loss rate μ.
///
/// # Returns
/// `[[P00, P01], [P10, P11]]`
fn transition_matrix(gain_rate: f64, loss_rate: f64, t: f64) -> [[f64; 2]; 2] {
    let total = gain_rate + loss_rate;

    if total < 1e-300 {
        return [[1.0, 0.0], [0.0, 1.0]];
    }

    let exp_term = (-total * t).exp();

    let p00 = (loss_rate + gain_rate * exp_term) / total;
    let p01 = (gain_rate - gain_rate * exp_term) / total;
    let p10 = (loss_rate - loss_rate * exp_term) / total;
    let p11 = (gain_rate + loss_rate * exp_term) / total;

    [[p00, p01], [p10, p11]]
}

fn edge_matrix(tree: &TreeModel, node: usize, rate: f64) -> [[f64; 2]; 2] {
    let t = tree.branch_length(node).unwrap_or(0.0);
    transition_matrix(rate, rate, t)
}

/// `P · v` for a 2-vector.
fn propagate(p: &[[f64; 2]; 2], v: &[f64; 2]) -> [f64; 2] {
    [
        p[0][0] * v[0] + p[0][1] * v[1],
        p[1][0] * v[0] + p[1][1] * v[1],
    ]
}

/// Scale `v` to sum to one, returning the factor removed.
fn normalize(v: &mut [f64; 2]) -> f64 {
    let sum = v[0] + v[1];
    if sum > 0.0 {
        v[0] /= sum;
        v[1] /= sum;
    }
    sum
}

/// Rescaled conditional likelihoods from the pruning pass.
struct Pruned {
    /// `conditionals[node][s]` ∝ P(tips below node | node in state s)
    conditionals: Vec<[f64; 2]>,
    /// Sum of log scale factors removed on the way up.
    log_scale: f64,
}

fn prune(tree: &TreeModel, tips: &[Option<State>], rate: f64) -> Pruned {
    let mut conditionals = vec![[1.0; 2]; tree.num_nodes()];
    let mut log_scale = 0.0;

    for node in tree.post_order() {
        if tree.is_tip(node) {
            conditionals[node] = match tips[node].unwrap_or_default() {
                State::Absent => [1.0, 0.0],
                State::Present => [0.0, 1.0],
            };
            continue;
        }

        let mut acc = [1.0; 2];
        for &child in tree.children(node) {
            let contrib = propagate(&edge_matrix(tree, child, rate), &conditionals[child]);
            acc[0] *= contrib[0];
            acc[1] *= contrib[1];
        }

        // Rescale at every node so deep trees do not underflow
        let scale = normalize(&mut acc);
        if scale > 0.0 {
            log_scale += scale.ln();
        } else {
            log_scale = f64::NEG_INFINITY;
        }
        conditionals[node] = acc;
    }

    Pruned {
        conditionals,
        log_scale,
    }
}

fn root_log_likelihood(tree: &TreeModel, pruned: &Pruned) -> f64 {
    let root = pruned.conditionals[tree.root()];
    let likelihood = ROOT_PRIOR[0] * root[0] + ROOT_PRIOR[1] * root[1];
    likelihood.ln() + pruned.log_scale
}

fn log_likelihood(tree: &TreeModel, tips: &[Option<State>], rate: f64) -> f64 {
    root_log_likelihood(tree, &prune(tree, tips, rate))
}

/// Outside pass: combine each node's subtree likelihood with everything above it.
fn marginals(tree: &TreeModel, pruned: &Pruned, rate: f64) -> Vec<f64> {
    let n = tree.num_nodes();
    let cond = &pruned.conditionals;

    // outside[node][s] ∝ P(tips outside the subtree, node in state s)
    let mut outside = vec![ROOT_PRIOR; n];
    let mut probabilities = vec![0.0; n];

    for node in tree.pre_order() {
        let mut marginal = [
            outside[node][0] * cond[node][0],
            outside[node][1] * cond[node][1],
        ];
        normalize(&mut marginal);
        probabilities[node] = marginal[1];

        let children = tree.children(node);
        if children.is_empty() {
            continue;
        }

        let messages: Vec<[f64; 2]> = children
            .iter()
            .map(|&child| propagate(&edge_matrix(tree, child, rate), &cond[child]))
            .collect();

        for (i, &child) in children.iter().enumerate() {
            let mut above = outside[node];
            for (j, message) in messages.iter().enumerate() {
                if i != j {
                    above[0] *= message[0];
                    above[1] *= message[1];
                }
            }

            // Carry the parent-side vector down the child's edge: Pᵀ · above
            let p = edge_matrix(tree, child, rate);
            let mut down = [
                above[0] * p[0][0] + above[1] * p[1][0],
                above[0] * p[0][1] + above[1] * p[1][1],
            ];
            normalize(&mut down);
            outside[child] = down;
        }
    }

    probabilities
}

/// Maximum-likelihood equal transition rate via golden-section search on `ln q`.
///
/// The bracket is scaled by the mean branch length so it covers "almost never
/// changes" to "saturated" regardless of the tree's time units.
fn fit_rate(tree: &TreeModel, tips: &[Option<State>]) -> f64 {
    let lengths: Vec<f64> = tree
        .nodes()
        .iter()
        .filter(|n| n.id() != tree.root())
        .filter_map(|n| n.branch_length())
        .collect();
    let mean_length = if lengths.is_empty() {
        1.0
    } else {
        lengths.iter().sum::<f64>() / lengths.len() as f64
    };

    let objective = |log_rate: f64| -log_likelihood(tree, tips, log_rate.exp());

    let mut lo = (1e-6 / mean_length).ln();
    let mut hi = (1e3 / mean_length).ln();
    let mut x1 = hi - INV_PHI * (hi - lo);
    let mut x2 = lo + INV_PHI * (hi - lo);
    let mut f1 = objective(x1);
    let mut f2 = objective(x2);

    for _ in 0..MAX_RATE_ITERATIONS {
        if (hi - lo).abs() < 1e-8 {
            break;
        }
        if f1 <= f2 {
            hi = x2;
            x2 = x1;
            f2 = f1;
            x1 = hi - INV_PHI * (hi - lo);
            f1 = objective(x1);
        } else {
            lo = x1;
            x1 = x2;
            f1 = f2;
            x2 = lo + INV_PHI * (hi - lo);
            f2 = objective(x2);
        }
    }

    let rate = (0.5 * (lo + hi)).exp();
    debug!(rate, mean_length, "fitted transition rate");
    rate
}
