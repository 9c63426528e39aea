// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Backward traversal helpers over parent adjacency maps

use std::collections::{HashMap, HashSet};

use crate::domain::{NodeId, PatternNode};

/// Parent adjacency: child -> direct parents
pub type ParentGraph = HashMap<NodeId, Vec<NodeId>>;

/// Depth-first search from `start` along parent links.
///
/// Returns the offending path (ending with the revisited node) if any node is
/// reached again while still on the current path.
pub fn find_cycle(start: NodeId, parents: &ParentGraph) -> Option<Vec<NodeId>> {
    let mut done: HashSet<NodeId> = HashSet::new();
    let mut on_path: HashSet<NodeId> = HashSet::from([start]);
    let mut path: Vec<NodeId> = vec![start];
    let mut stack: Vec<(NodeId, usize)> = vec![(start, 0)];

    while let Some(&(current, next)) = stack.last() {
        let neighbors = parents.get(&current).map(Vec::as_slice).unwrap_or(&[]);
        match neighbors.get(next) {
            Some(&neighbor) => {
                if let Some(frame) = stack.last_mut() {
                    frame.1 += 1;
                }
                if on_path.contains(&neighbor) {
                    let from = path.iter().position(|id| *id == neighbor).unwrap_or(0);
                    let mut cycle = path[from..].to_vec();
                    cycle.push(neighbor);
                    return Some(cycle);
                }
                if !done.contains(&neighbor) {
                    on_path.insert(neighbor);
                    path.push(neighbor);
                    stack.push((neighbor, 0));
                }
            }
            None => {
                stack.pop();
                path.pop();
                on_path.remove(&current);
                done.insert(current);
            }
        }
    }

    None
}

/// Oldest first: by generation, then creation time, then id for a total order
pub fn sort_ancestors(ancestors: &mut [PatternNode]) {
    ancestors.sort_by(|a, b| {
        a.generation
            .cmp(&b.generation)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_has_no_cycle() {
        let (a, b, c) = (NodeId::new(), NodeId::new(), NodeId::new());
        let graph: ParentGraph = HashMap::from([(c, vec![b]), (b, vec![a]), (a, vec![])]);
        assert_eq!(find_cycle(c, &graph), None);
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let (root, left, right, merged) = (NodeId::new(), NodeId::new(), NodeId::new(), NodeId::new());
        let graph: ParentGraph = HashMap::from([
            (merged, vec![left, right]),
            (left, vec![root]),
            (right, vec![root]),
            (root, vec![]),
        ]);
        assert_eq!(find_cycle(merged, &graph), None);
    }

    #[test]
    fn test_cycle_path_is_reported() {
        let (a, b, c) = (NodeId::new(), NodeId::new(), NodeId::new());
        let graph: ParentGraph = HashMap::from([(a, vec![b]), (b, vec![c]), (c, vec![a])]);

        let cycle = find_cycle(a, &graph).unwrap();
        assert_eq!(cycle, vec![a, b, c, a]);
    }

    #[test]
    fn test_self_loop_is_reported() {
        let a = NodeId::new();
        let graph: ParentGraph = HashMap::from([(a, vec![a])]);
        assert_eq!(find_cycle(a, &graph), Some(vec![a, a]));
    }
}
