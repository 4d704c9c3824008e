//! In-memory phylogeny.
//!
//! Nodes live in an arena (`Vec<Node>`) and reference each other by
//! [`NodeId`], never by pointer. Parsing tree files is left to external
//! loaders; they hand over parallel arrays via [`TreeModel::from_structure`],
//! while [`TreeBuilder`] assembles small trees by hand.

mod traversal;

pub use traversal::{PostOrderIter, PreOrderIter};

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};

/// Index of a node in the tree arena.
pub type NodeId = usize;

/// A node of the phylogeny.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: NodeId,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    branch_length: Option<f64>,
    label: Option<String>,
}

impl Node {
    /// Arena index of this node.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Parent index, `None` for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in declaration order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Length of the edge above this node.
    pub fn branch_length(&self) -> Option<f64> {
        self.branch_length
    }

    /// Tip label (tips only).
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Whether this node is a tip.
    pub fn is_tip(&self) -> bool {
        self.children.is_empty()
    }
}

/// A rooted (bi- or multifurcating) phylogeny with labelled tips.
///
/// # Structure
/// - Exactly one root; every other node has one parent.
/// - Every node is reachable from the root (no cycles).
/// - Tips carry unique, non-empty labels.
/// - Branch lengths are optional, but if present must be finite and non-negative.
#[derive(Debug, Clone)]
pub struct TreeModel {
    nodes: Vec<Node>,
    root: NodeId,
    tips: Vec<NodeId>,
    tip_index: HashMap<String, NodeId>,
}

impl TreeModel {
    /// Build a tree from parallel structure arrays.
    ///
    /// The first `tip_labels.len()` nodes are declared tips, the rest internal
    /// nodes.
    ///
    /// # Arguments
    /// * `parents` - Parent index for each node (`None` for the root)
    /// * `branch_lengths` - Length of the edge above each node
    /// * `tip_labels` - Labels of the tips, in node order
    ///
    /// # Errors
    /// [`Error::MalformedTree`] when the arrays disagree in length, a parent
    /// index is out of range, the parent links form a cycle, a declared tip has
    /// children or no label, or a declared internal node has no children.
    pub fn from_structure(
        parents: Vec<Option<NodeId>>,
        branch_lengths: Vec<Option<f64>>,
        tip_labels: Vec<String>,
    ) -> Result<Self> {
        let n_nodes = parents.len();
        if branch_lengths.len() != n_nodes {
            return Err(Error::MalformedTree(format!(
                "{} parent entries but {} branch lengths",
                n_nodes,
                branch_lengths.len()
            )));
        }
        if tip_labels.len() > n_nodes {
            return Err(Error::MalformedTree(format!(
                "{} tip labels for {} nodes",
                tip_labels.len(),
                n_nodes
            )));
        }

        let n_tips = tip_labels.len();
        let mut labels = tip_labels.into_iter();
        let mut nodes: Vec<Node> = parents
            .iter()
            .zip(branch_lengths)
            .enumerate()
            .map(|(id, (&parent, branch_length))| Node {
                id,
                parent,
                children: Vec::new(),
                branch_length,
                label: if id < n_tips { labels.next() } else { None },
            })
            .collect();

        for (child, &parent) in parents.iter().enumerate() {
            if let Some(parent) = parent {
                if parent >= n_nodes {
                    return Err(Error::MalformedTree(format!(
                        "node {child} names parent {parent}, but tree has {n_nodes} nodes"
                    )));
                }
                nodes[parent].children.push(child);
            }
        }

        let declared_tips: Vec<bool> = (0..n_nodes).map(|id| id < n_tips).collect();
        Self::assemble(nodes, &declared_tips)
    }

    /// Validate linked nodes and index tips.
    fn assemble(nodes: Vec<Node>, declared_tips: &[bool]) -> Result<Self> {
        if nodes.is_empty() {
            return Err(Error::MalformedTree("tree has no nodes".to_string()));
        }

        let mut roots = nodes.iter().filter(|n| n.parent.is_none()).map(|n| n.id);
        let root = roots
            .next()
            .ok_or_else(|| Error::MalformedTree("no root (every node has a parent)".to_string()))?;
        if let Some(other) = roots.next() {
            return Err(Error::MalformedTree(format!(
                "multiple roots: nodes {root} and {other} have no parent"
            )));
        }

        // Every node has at most one parent, so anything unreachable from the
        // root sits on a cycle or hangs below one.
        let mut seen = vec![false; nodes.len()];
        let mut stack = vec![root];
        let mut reached = 0;
        while let Some(id) = stack.pop() {
            if seen[id] {
                return Err(Error::MalformedTree(format!("node {id} reached twice")));
            }
            seen[id] = true;
            reached += 1;
            stack.extend(nodes[id].children.iter().copied());
        }
        if reached != nodes.len() {
            let stray = seen.iter().position(|&s| !s).unwrap_or(0);
            return Err(Error::MalformedTree(format!(
                "cycle detected: node {stray} is not reachable from root {root}"
            )));
        }

        let mut tips = Vec::new();
        let mut tip_index = HashMap::new();
        for node in &nodes {
            let declared_tip = declared_tips[node.id];
            match (declared_tip, node.is_tip()) {
                (true, false) => {
                    return Err(Error::MalformedTree(format!(
                        "declared tip {} has {} children",
                        node.id,
                        node.children.len()
                    )));
                }
                (false, true) => {
                    return Err(Error::MalformedTree(format!(
                        "declared internal node {} has no children",
                        node.id
                    )));
                }
                _ => {}
            }

            if let Some(length) = node.branch_length {
                if !length.is_finite() || length < 0.0 {
                    return Err(Error::MalformedTree(format!(
                        "node {} has invalid branch length {length}",
                        node.id
                    )));
                }
            }

            if node.is_tip() {
                let label = match node.label.as_deref() {
                    Some(label) if !label.is_empty() => label,
                    _ => {
                        return Err(Error::MalformedTree(format!("tip {} has no label", node.id)));
                    }
                };
                if tip_index.insert(label.to_string(), node.id).is_some() {
                    return Err(Error::MalformedTree(format!("duplicate tip label `{label}`")));
                }
                tips.push(node.id);
            }
        }

        Ok(TreeModel {
            nodes,
            root,
            tips,
            tip_index,
        })
    }

    /// Index of the root.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The node at `id`.
    ///
    /// # Panics
    /// Panics if `id` is out of bounds.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// All nodes in arena order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Parent of `id`, `None` for the root.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    /// Children of `id`.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    /// Length of the edge above `id`.
    pub fn branch_length(&self, id: NodeId) -> Option<f64> {
        self.nodes[id].branch_length
    }

    /// Tip label of `id`, if it is a tip.
    pub fn label(&self, id: NodeId) -> Option<&str> {
        self.nodes[id].label()
    }

    /// Whether `id` is a tip.
    pub fn is_tip(&self, id: NodeId) -> bool {
        self.nodes[id].is_tip()
    }

    /// Node index of the tip with this label.
    pub fn tip_by_label(&self, label: &str) -> Option<NodeId> {
        self.tip_index.get(label).copied()
    }

    /// Tip indices in arena order.
    pub fn tips(&self) -> &[NodeId] {
        &self.tips
    }

    /// Number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of tips.
    pub fn num_tips(&self) -> usize {
        self.tips.len()
    }

    /// Iterator over node indices, parents before children.
    pub fn pre_order(&self) -> PreOrderIter<'_> {
        PreOrderIter::new(self, self.root)
    }

    /// Iterator over the subtree rooted at `id`, parents before children.
    pub fn pre_order_from(&self, id: NodeId) -> PreOrderIter<'_> {
        PreOrderIter::new(self, id)
    }

    /// Iterator over node indices, children before parents.
    pub fn post_order(&self) -> PostOrderIter<'_> {
        PostOrderIter::new(self, self.root)
    }

    /// Tips in the subtree rooted at `id`, in pre-order.
    pub fn descendant_tips(&self, id: NodeId) -> Vec<NodeId> {
        self.pre_order_from(id).filter(|&n| self.is_tip(n)).collect()
    }

    /// Whether every non-root edge carries a positive length.
    pub fn has_positive_branch_lengths(&self) -> bool {
        self.first_missing_branch_length().is_none()
    }

    /// First non-root node (arena order) without a positive incoming length.
    pub(crate) fn first_missing_branch_length(&self) -> Option<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.id != self.root)
            .find(|n| !matches!(n.branch_length, Some(l) if l > 0.0))
            .map(|n| n.id)
    }

    /// Resolve label-keyed tip data into a dense per-node vector.
    ///
    /// Tips get `Some(value)`, internal nodes `None`.
    ///
    /// # Errors
    /// [`Error::LabelMismatch`] if a tip has no entry or an entry names no tip.
    pub fn tip_values<T: Clone>(&self, data: &HashMap<String, T>) -> Result<Vec<Option<T>>> {
        let mut missing_in_data: Vec<String> = self
            .tips
            .iter()
            .filter_map(|&tip| self.label(tip))
            .filter(|label| !data.contains_key(*label))
            .map(str::to_string)
            .collect();
        let mut missing_in_tree: Vec<String> = data
            .keys()
            .filter(|label| !self.tip_index.contains_key(*label))
            .cloned()
            .collect();

        if !missing_in_data.is_empty() || !missing_in_tree.is_empty() {
            missing_in_data.sort();
            missing_in_tree.sort();
            return Err(Error::LabelMismatch {
                missing_in_data,
                missing_in_tree,
            });
        }

        let mut values = vec![None; self.nodes.len()];
        for (label, &tip) in &self.tip_index {
            values[tip] = data.get(label).cloned();
        }
        Ok(values)
    }
}

/// Incremental tree construction.
///
/// Add tips first, then internal nodes naming their children; the single node
/// left without a parent becomes the root.
///
/// ```
/// use clade_shift::tree::TreeBuilder;
///
/// let mut builder = TreeBuilder::new();
/// let a = builder.add_tip("A", Some(1.0));
/// let b = builder.add_tip("B", Some(1.0));
/// builder.add_internal(&[a, b], None);
/// let tree = builder.build().unwrap();
/// assert_eq!(tree.num_tips(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TreeBuilder {
    nodes: Vec<Node>,
    declared_tips: Vec<bool>,
    errors: Vec<String>,
}

impl TreeBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tip, returning its index.
    pub fn add_tip(&mut self, label: impl Into<String>, branch_length: Option<f64>) -> NodeId {
        self.push(Some(label.into()), Vec::new(), branch_length, true)
    }

    /// Add an internal node over `children`, returning its index.
    pub fn add_internal(&mut self, children: &[NodeId], branch_length: Option<f64>) -> NodeId {
        let id = self.nodes.len();
        for &child in children {
            match self.nodes.get_mut(child) {
                None => self
                    .errors
                    .push(format!("node {id} names unknown child {child}")),
                Some(node) if node.parent.is_some() => self.errors.push(format!(
                    "node {child} already has parent {}",
                    node.parent.unwrap_or_default()
                )),
                Some(node) => node.parent = Some(id),
            }
        }
        self.push(None, children.to_vec(), branch_length, false)
    }

    fn push(
        &mut self,
        label: Option<String>,
        children: Vec<NodeId>,
        branch_length: Option<f64>,
        tip: bool,
    ) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            id,
            parent: None,
            children,
            branch_length,
            label,
        });
        self.declared_tips.push(tip);
        id
    }

    /// Validate and produce the tree.
    pub fn build(self) -> Result<TreeModel> {
        if let Some(first) = self.errors.into_iter().next() {
            return Err(Error::MalformedTree(first));
        }
        TreeModel::assemble(self.nodes, &self.declared_tips)
    }
}

/// Set of labels appearing more than once, sorted.
pub(crate) fn duplicate_labels<'a>(labels: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates: Vec<String> = labels
        .into_iter()
        .filter(|label| !seen.insert(*label))
        .map(str::to_string)
        .collect();
    duplicates.sort();
    duplicates.dedup();
    duplicates
}
