//! Stack-based tree traversals.
//!
//! Both iterators borrow the tree and yield [`NodeId`]s lazily. They never
//! recurse, so deep (caterpillar) trees cannot overflow the call stack, and a
//! fresh iterator can be created at any time to restart a walk.

use super::{NodeId, TreeModel};

/// Iterator for pre-order traversal (parents before children).
///
/// Children are visited in declaration order.
#[derive(Debug, Clone)]
pub struct PreOrderIter<'a> {
    tree: &'a TreeModel,
    stack: Vec<NodeId>,
}

impl<'a> PreOrderIter<'a> {
    pub(super) fn new(tree: &'a TreeModel, start: NodeId) -> Self {
        PreOrderIter {
            tree,
            stack: vec![start],
        }
    }
}

impl Iterator for PreOrderIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.stack.pop()?;

        // Push in reverse so the first child is processed first
        self.stack
            .extend(self.tree.children(index).iter().rev().copied());

        Some(index)
    }
}

/// Iterator for post-order traversal (children before parents).
///
/// Each node is yielded after all of its descendants.
#[derive(Debug, Clone)]
pub struct PostOrderIter<'a> {
    tree: &'a TreeModel,
    stack: Vec<(NodeId, bool)>, // (index, children_visited)
}

impl<'a> PostOrderIter<'a> {
    pub(super) fn new(tree: &'a TreeModel, start: NodeId) -> Self {
        PostOrderIter {
            tree,
            stack: vec![(start, false)],
        }
    }
}

impl Iterator for PostOrderIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((index, children_visited)) = self.stack.pop() {
            let children = self.tree.children(index);
            if children_visited || children.is_empty() {
                return Some(index);
            }

            self.stack.push((index, true));
            self.stack
                .extend(children.iter().rev().map(|&child| (child, false)));
        }
        None
    }
}
