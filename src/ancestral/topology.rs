//! Majority-rule reconstruction from tree topology alone.

use crate::tree::TreeModel;
use crate::types::{NodeStates, State};

/// Assign each node the state held by a strict majority of its tip descendants.
///
/// Single post-order pass accumulating `[absent, present]` tip counts; a tie
/// yields [`State::Absent`]. Tips keep their observed state.
pub(super) fn majority_states(tree: &TreeModel, tips: &[Option<State>]) -> NodeStates {
    let n = tree.num_nodes();
    let mut counts = vec![[0usize; 2]; n];
    let mut states = vec![State::Absent; n];

    for id in tree.post_order() {
        if tree.is_tip(id) {
            let state = tips[id].unwrap_or_default();
            counts[id][state.as_index()] = 1;
            states[id] = state;
            continue;
        }

        let mut total = [0usize; 2];
        for &child in tree.children(id) {
            total[0] += counts[child][0];
            total[1] += counts[child][1];
        }
        counts[id] = total;
        states[id] = State::from(total[1] > total[0]);
    }

    states
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::TreeBuilder;
    use State::*;

    #[test]
    fn test_star_tree_majority() {
        let mut builder = TreeBuilder::new();
        let ids: Vec<_> = (0..4).map(|i| builder.add_tip(format!("t{i}"), None)).collect();
        builder.add_internal(&ids, None);
        let tree = builder.build().unwrap();

        let tips = vec![Some(Absent), Some(Absent), Some(Absent), Some(Present), None];
        let states = majority_states(&tree, &tips);
        assert_eq!(states[tree.root()], Absent);
        assert_eq!(states[3], Present);
    }

    #[test]
    fn test_tie_defaults_to_absent() {
        let mut builder = TreeBuilder::new();
        let ids: Vec<_> = (0..4).map(|i| builder.add_tip(format!("t{i}"), None)).collect();
        builder.add_internal(&ids, None);
        let tree = builder.build().unwrap();

        let tips = vec![Some(Absent), Some(Absent), Some(Present), Some(Present), None];
        assert_eq!(majority_states(&tree, &tips)[tree.root()], Absent);
    }

    #[test]
    fn test_counts_all_descendants_not_children() {
        // ((P,P,P),A,A): root has 3 present vs 2 absent tips although only
        // one of its three children is present.
        let mut builder = TreeBuilder::new();
        let p: Vec<_> = (0..3).map(|i| builder.add_tip(format!("p{i}"), None)).collect();
        let inner = builder.add_internal(&p, None);
        let a0 = builder.add_tip("a0", None);
        let a1 = builder.add_tip("a1", None);
        let root = builder.add_internal(&[inner, a0, a1], None);
        let tree = builder.build().unwrap();

        let mut tips = vec![None; tree.num_nodes()];
        for &id in &p {
            tips[id] = Some(Present);
        }
        tips[a0] = Some(Absent);
        tips[a1] = Some(Absent);

        let states = majority_states(&tree, &tips);
        assert_eq!(states[inner], Present);
        assert_eq!(states[root], Present);
    }
}
