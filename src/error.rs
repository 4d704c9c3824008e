//! Error taxonomy for tree handling, reconstruction and significance testing.
//!
//! Every variant is fatal to the call that produced it. Nothing here is
//! transient: the core is pure computation, so retrying with the same inputs
//! reproduces the same error. Callers pick a different strategy instead
//! (e.g. fall back from `Method::BranchLength` to `Method::Topology`).

use thiserror::Error;

use crate::tree::NodeId;

/// Errors produced by this crate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Structural defect in the tree (cycle, unlabelled tip, missing root, ...).
    #[error("malformed tree: {0}")]
    MalformedTree(String),

    /// The branch-length method needs a positive length on every non-root edge.
    #[error("branch length missing or non-positive above node {node}")]
    MissingBranchLength {
        /// Node whose incoming edge has no usable length.
        node: NodeId,
    },

    /// Tip labels in the trait data and in the tree do not line up.
    #[error(
        "tip labels do not match: {} tree tip(s) missing from data {:?}, {} data label(s) missing from tree {:?}",
        missing_in_data.len(),
        missing_in_data,
        missing_in_tree.len(),
        missing_in_tree
    )]
    LabelMismatch {
        /// Tree tips without a trait value.
        missing_in_data: Vec<String>,
        /// Trait records naming no tree tip (or duplicated labels).
        missing_in_tree: Vec<String>,
    },

    /// The statistic failed on a drawn sample.
    #[error("statistic `{statistic}` failed: {reason}")]
    InvalidStatistic {
        /// Name of the statistic.
        statistic: String,
        /// Why it failed.
        reason: String,
    },

    /// No tip lies in a change bucket, so the test is undefined.
    ///
    /// Internal change nodes alone do not help: their matching descendants
    /// count as normal for the clade they open.
    #[error("subset is empty: no tip lies in a change bucket")]
    EmptySubset,

    /// The pooled distribution holds a NaN or infinite value.
    #[error("non-finite value at position {index} of the pooled distribution")]
    NonFiniteValue {
        /// Position of the offending value.
        index: usize,
    },

    /// A subset position points outside the pooled distribution.
    #[error("subset index {index} out of range for distribution of length {len}")]
    InvalidSubset {
        /// Offending position.
        index: usize,
        /// Length of the pooled distribution.
        len: usize,
    },

    /// A continuous trait value cannot be transformed (non-positive or non-finite).
    #[error("invalid trait value {value} for taxon `{label}`")]
    InvalidTraitValue {
        /// Taxon label.
        label: String,
        /// Offending value.
        value: f64,
    },

    /// A fixed transition rate must be positive and finite.
    #[error("invalid transition rate {0}")]
    InvalidRate(f64),

    /// Configuration values out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_mismatch_message_lists_both_sides() {
        let err = Error::LabelMismatch {
            missing_in_data: vec!["A".to_string()],
            missing_in_tree: vec!["Z".to_string(), "Y".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("1 tree tip(s)"));
        assert!(msg.contains("2 data label(s)"));
        assert!(msg.contains("\"Z\""));
    }

    #[test]
    fn test_missing_branch_length_names_node() {
        let err = Error::MissingBranchLength { node: 7 };
        assert_eq!(err.to_string(), "branch length missing or non-positive above node 7");
    }

    #[test]
    fn test_empty_subset_mentions_change_bucket() {
        assert!(Error::EmptySubset.to_string().contains("no tip lies in a change bucket"));
    }
}
