//! Clade origination and change-point detection.
//!
//! A single pre-order walk assigns every clade an origination state and sorts
//! each tip's continuous value into the `normal` bucket (tip state matches
//! the clade's origination) or the `change` bucket (the tip itself is where
//! the lineage diverged).
//!
//! An internal node whose state differs from the current origination is a
//! change point: it opens a new clade whose origination is the node's own
//! state, and its descendants are judged against that. Only the topmost node of
//! a contiguous divergent run is flagged. A sub-clade that flips and later
//! flips back yields two change points (the entry and the nested reversal).

use std::collections::HashMap;

use tracing::debug;

use crate::error::{Error, Result};
use crate::result::{ChangeBundle, Clade};
use crate::tree::{NodeId, TreeModel};
use crate::types::State;

/// Partition tip values into normal and change buckets, per clade.
///
/// # Arguments
/// * `tree` - The phylogeny
/// * `node_states` - State of every node, indexed by [`NodeId`]
/// * `tip_values` - Continuous trait value per tip label
///
/// # Errors
/// - [`Error::MalformedTree`] if `node_states` does not cover every node
/// - [`Error::LabelMismatch`] if `tip_values` and the tree tips disagree
pub fn detect(
    tree: &TreeModel,
    node_states: &[State],
    tip_values: &HashMap<String, f64>,
) -> Result<ChangeBundle> {
    if node_states.len() != tree.num_nodes() {
        return Err(Error::MalformedTree(format!(
            "{} node states for a tree of {} nodes",
            node_states.len(),
            tree.num_nodes()
        )));
    }
    let values = tree.tip_values(tip_values)?;

    let root = tree.root();
    let mut bundle = ChangeBundle {
        normal_val: vec![Vec::new()],
        change_val: vec![Vec::new()],
        node_changes: Vec::new(),
        clades: vec![Clade {
            node: root,
            origination: node_states[root],
        }],
        change_labels: Vec::new(),
    };

    let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];
    while let Some((node, clade)) = stack.pop() {
        let origination = bundle.clades[clade].origination;
        let state = node_states[node];

        if tree.is_tip(node) {
            let value = values[node].unwrap_or(f64::NAN);
            if state == origination {
                bundle.normal_val[clade].push(value);
            } else {
                bundle.change_val[clade].push(value);
                bundle.node_changes.push(node);
                bundle
                    .change_labels
                    .push(tree.label(node).unwrap_or_default().to_string());
            }
            continue;
        }

        let clade = if state != origination {
            bundle.node_changes.push(node);
            bundle.clades.push(Clade {
                node,
                origination: state,
            });
            bundle.normal_val.push(Vec::new());
            bundle.change_val.push(Vec::new());
            bundle.clades.len() - 1
        } else {
            clade
        };

        stack.extend(tree.children(node).iter().rev().map(|&child| (child, clade)));
    }

    debug!(
        clades = bundle.clades.len(),
        change_points = bundle.node_changes.len(),
        change_values = bundle.num_change(),
        "change detection complete"
    );

    Ok(bundle)
}
