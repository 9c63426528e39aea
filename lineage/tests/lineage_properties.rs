// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Property tests for lineage graph invariants
//!
//! Random sequences of creations, modifications and merges are replayed
//! against the in-memory store and checked for:
//!   - acyclicity (no node in its own ancestry)
//!   - generation = 1 + max(parent generation), 0 for roots
//!   - ancestry completeness against an independent reachability count
//!   - identical results on repeated ancestry reads

use proptest::prelude::*;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use pattern_lineage::{
    CreateNodeRequest, EdgeType, InMemoryLineageRepository, LineageService, NodeId, ParentRef,
    StandardLineageService, TransformationType,
};

struct Replayed {
    service: StandardLineageService,
    nodes: Vec<NodeId>,
    parents: HashMap<NodeId, Vec<NodeId>>,
    generations: HashMap<NodeId, u32>,
}

async fn replay(ops: &[Vec<usize>]) -> Replayed {
    let service = StandardLineageService::with_repository(Arc::new(InMemoryLineageRepository::new()));
    let mut nodes: Vec<NodeId> = Vec::new();
    let mut parents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    let mut generations: HashMap<NodeId, u32> = HashMap::new();

    for (i, picks) in ops.iter().enumerate() {
        let mut chosen: Vec<NodeId> = Vec::new();
        if !nodes.is_empty() {
            for pick in picks {
                let id = nodes[pick % nodes.len()];
                if !chosen.contains(&id) {
                    chosen.push(id);
                }
            }
        }

        let edge_type = if chosen.len() > 1 { EdgeType::MergedFrom } else { EdgeType::ModifiedFrom };
        let request = CreateNodeRequest::derived(
            format!("pattern_{}", i),
            "1.0",
            json!({ "step": i }),
            chosen.iter().copied().map(ParentRef::Node).collect(),
            edge_type,
            TransformationType::Refactor,
        );
        let created = service.create_node(request).await.expect("create_node");

        nodes.push(created.node_id);
        generations.insert(created.node_id, created.generation);
        parents.insert(created.node_id, chosen);
    }

    Replayed { service, nodes, parents, generations }
}

fn reachable_ancestors(start: NodeId, parents: &HashMap<NodeId, Vec<NodeId>>) -> HashSet<NodeId> {
    let mut seen = HashSet::new();
    let mut stack = parents.get(&start).cloned().unwrap_or_default();
    while let Some(id) = stack.pop() {
        if seen.insert(id) {
            stack.extend(parents.get(&id).cloned().unwrap_or_default());
        }
    }
    seen
}

fn ops_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
    prop::collection::vec(prop::collection::vec(0usize..64, 0..4), 1..16)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_lineage_invariants_hold(ops in ops_strategy()) {
        tokio_test::block_on(async {
            let replayed = replay(&ops).await;

            for id in &replayed.nodes {
                let expected_generation = replayed.parents[id]
                    .iter()
                    .map(|p| replayed.generations[p] + 1)
                    .max()
                    .unwrap_or(0);
                assert_eq!(replayed.generations[id], expected_generation);

                let view = replayed.service.node_ancestry(*id, false).await.unwrap();
                let ancestor_ids = view.ancestor_ids();
                assert!(!ancestor_ids.contains(id), "node appears in its own ancestry");

                let reachable = reachable_ancestors(*id, &replayed.parents);
                assert_eq!(view.total_ancestors, reachable.len());
                assert_eq!(ancestor_ids.iter().copied().collect::<HashSet<_>>(), reachable);
                assert_eq!(view.ancestry_depth, replayed.generations[id]);

                let again = replayed.service.node_ancestry(*id, false).await.unwrap();
                assert_eq!(again.ancestor_ids(), ancestor_ids);
                assert_eq!(again.total_ancestors, view.total_ancestors);

                let recomputed = replayed.service.node_ancestry(*id, true).await.unwrap();
                assert_eq!(recomputed.ancestor_ids(), ancestor_ids);
            }
        });
    }

    #[test]
    fn prop_ancestors_are_ordered_oldest_first(ops in ops_strategy()) {
        tokio_test::block_on(async {
            let replayed = replay(&ops).await;
            let last = *replayed.nodes.last().unwrap();
            let view = replayed.service.node_ancestry(last, false).await.unwrap();
            let generations: Vec<u32> = view.ancestors.iter().map(|a| a.generation).collect();
            let mut sorted = generations.clone();
            sorted.sort();
            assert_eq!(generations, sorted);
        });
    }
}
