//! Ancestral state estimation for the binary defense trait.
//!
//! Two strategies assign a [`State`] to every internal node:
//!
//! - [`Method::Topology`]: majority rule over the tip descendants of each
//!   node, ignoring branch lengths. Exact ties resolve to [`State::Absent`].
//! - [`Method::BranchLength`]: marginal reconstruction under a two-state
//!   continuous-time Markov model with branch lengths as time. A node is
//!   `Present` when its marginal probability of presence is at least 0.5.
//!
//! Estimation is stateless and deterministic for a fixed method.

mod likelihood;
mod topology;

pub use likelihood::{marginal_probabilities, Reconstruction};

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tree::TreeModel;
use crate::types::{NodeStates, State};

/// Transition rate of the two-state model.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Rate {
    /// Fit the (equal) transition rate by maximum likelihood.
    #[default]
    MaximumLikelihood,
    /// Use this rate (per unit branch length) for both directions.
    Fixed(f64),
}

/// Ancestral state estimation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Method {
    /// Strict majority of tip descendants; ties go to absence.
    #[default]
    Topology,
    /// Two-state Markov reconstruction using branch lengths.
    BranchLength(Rate),
}

impl Method {
    /// Short selector name (`topology` / `branch-length`).
    pub fn name(&self) -> &'static str {
        match self {
            Method::Topology => "topology",
            Method::BranchLength(_) => "branch-length",
        }
    }

    /// Estimate a state for every node of `tree`.
    ///
    /// Tips keep their observed state.
    ///
    /// # Errors
    /// - [`Error::LabelMismatch`] if `tip_states` and the tree tips disagree
    /// - [`Error::MissingBranchLength`] for the branch-length method on a tree
    ///   with an absent or non-positive edge length
    /// - [`Error::InvalidRate`] for a non-positive fixed rate
    pub fn estimate(
        &self,
        tree: &TreeModel,
        tip_states: &HashMap<String, State>,
    ) -> Result<NodeStates> {
        let tips = tree.tip_values(tip_states)?;
        match *self {
            Method::Topology => Ok(topology::majority_states(tree, &tips)),
            Method::BranchLength(rate) => {
                let reconstruction = likelihood::reconstruct(tree, &tips, rate)?;
                Ok(reconstruction.states())
            }
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "topology" => Ok(Method::Topology),
            "branch-length" | "branch_length" | "branchlength" => {
                Ok(Method::BranchLength(Rate::MaximumLikelihood))
            }
            other => Err(Error::InvalidConfig(format!(
                "unknown method `{other}` (expected `topology` or `branch-length`)"
            ))),
        }
    }
}

/// Estimate a state for every node of `tree` with `method`.
///
/// See [`Method::estimate`].
pub fn estimate(
    tree: &TreeModel,
    tip_states: &HashMap<String, State>,
    method: Method,
) -> Result<NodeStates> {
    method.estimate(tree, tip_states)
}
