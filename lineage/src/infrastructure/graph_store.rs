// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory lineage repository
//!
//! Nodes, edges and events live in flat arenas with id-keyed indexes, all
//! behind one lock so that a node write is atomic with respect to readers.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::{
    AncestryCacheEntry, LineageEdge, LineageError, LineageEvent, NodeId, PatternNode,
};
use crate::infrastructure::repository::{LineageRepository, NodeWrite};

#[derive(Default)]
struct LineageTables {
    nodes: Vec<PatternNode>,
    node_index: HashMap<NodeId, usize>,
    /// pattern_id -> arena slots in insertion order
    pattern_index: HashMap<String, Vec<usize>>,
    edges: Vec<LineageEdge>,
    incoming: HashMap<NodeId, Vec<usize>>,
    outgoing: HashMap<NodeId, Vec<usize>>,
    events: Vec<LineageEvent>,
    events_by_node: HashMap<NodeId, Vec<usize>>,
    ancestry: HashMap<NodeId, AncestryCacheEntry>,
}

impl LineageTables {
    fn node(&self, id: &NodeId) -> Option<&PatternNode> {
        self.node_index.get(id).map(|slot| &self.nodes[*slot])
    }

    fn has_version(&self, pattern_id: &str, version: &str) -> bool {
        self.pattern_index
            .get(pattern_id)
            .map(|slots| slots.iter().any(|slot| self.nodes[*slot].version == version))
            .unwrap_or(false)
    }

    fn push_event(&mut self, event: LineageEvent) {
        let slot = self.events.len();
        self.events_by_node
            .entry(event.pattern_node_id)
            .or_default()
            .push(slot);
        self.events.push(event);
    }

    fn mark_stale(&mut self, node_id: NodeId) {
        if let Some(entry) = self.ancestry.get_mut(&node_id) {
            entry.stale = true;
        }
    }
}

/// In-memory implementation of LineageRepository for development and testing
#[derive(Clone)]
pub struct InMemoryLineageRepository {
    tables: Arc<RwLock<LineageTables>>,
}

impl InMemoryLineageRepository {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(LineageTables::default())),
        }
    }

    pub async fn node_count(&self) -> usize {
        self.tables.read().await.nodes.len()
    }

    pub async fn edge_count(&self) -> usize {
        self.tables.read().await.edges.len()
    }
}

impl Default for InMemoryLineageRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LineageRepository for InMemoryLineageRepository {
    async fn insert_node(&self, write: NodeWrite) -> Result<(), LineageError> {
        let mut tables = self.tables.write().await;
        let NodeWrite { node, edges, event } = write;

        // All checks happen before the first mutation so a rejected write
        // leaves the tables untouched.
        if tables.node_index.contains_key(&node.id) {
            return Err(LineageError::Conflict(format!("node {} already exists", node.id)));
        }
        if tables.has_version(&node.pattern_id, &node.version) {
            return Err(LineageError::Conflict(format!(
                "version {} of pattern '{}' already exists",
                node.version, node.pattern_id
            )));
        }
        for edge in &edges {
            if edge.target_node_id != node.id {
                return Err(LineageError::InvalidInput(format!(
                    "edge target {} does not match node {}",
                    edge.target_node_id, node.id
                )));
            }
            if tables.node(&edge.source_node_id).is_none() {
                return Err(LineageError::DanglingReference(format!(
                    "parent node {} does not exist",
                    edge.source_node_id
                )));
            }
        }
        for (i, edge) in edges.iter().enumerate() {
            if edges[..i].iter().any(|other| {
                other.source_node_id == edge.source_node_id && other.edge_type == edge.edge_type
            }) {
                return Err(LineageError::Conflict(format!(
                    "duplicate {} edge from {}",
                    edge.edge_type, edge.source_node_id
                )));
            }
        }

        let slot = tables.nodes.len();
        tables.node_index.insert(node.id, slot);
        tables
            .pattern_index
            .entry(node.pattern_id.clone())
            .or_default()
            .push(slot);
        tables.nodes.push(node);

        for edge in edges {
            let edge_slot = tables.edges.len();
            tables.mark_stale(edge.source_node_id);
            tables.mark_stale(edge.target_node_id);
            tables
                .outgoing
                .entry(edge.source_node_id)
                .or_default()
                .push(edge_slot);
            tables
                .incoming
                .entry(edge.target_node_id)
                .or_default()
                .push(edge_slot);
            tables.edges.push(edge);
        }

        tables.push_event(event);
        Ok(())
    }

    async fn find_node(&self, id: NodeId) -> Result<Option<PatternNode>, LineageError> {
        let tables = self.tables.read().await;
        Ok(tables.node(&id).cloned())
    }

    async fn find_nodes(&self, ids: &[NodeId]) -> Result<Vec<PatternNode>, LineageError> {
        let tables = self.tables.read().await;
        Ok(ids.iter().filter_map(|id| tables.node(id).cloned()).collect())
    }

    async fn find_latest(&self, pattern_id: &str) -> Result<Option<PatternNode>, LineageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .pattern_index
            .get(pattern_id)
            .and_then(|slots| slots.last())
            .map(|slot| tables.nodes[*slot].clone()))
    }

    async fn find_version(
        &self,
        pattern_id: &str,
        version: &str,
    ) -> Result<Option<PatternNode>, LineageError> {
        let tables = self.tables.read().await;
        Ok(tables.pattern_index.get(pattern_id).and_then(|slots| {
            slots
                .iter()
                .map(|slot| &tables.nodes[*slot])
                .find(|node| node.version == version)
                .cloned()
        }))
    }

    async fn find_versions(&self, pattern_id: &str) -> Result<Vec<PatternNode>, LineageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .pattern_index
            .get(pattern_id)
            .map(|slots| slots.iter().map(|slot| tables.nodes[*slot].clone()).collect())
            .unwrap_or_default())
    }

    async fn incoming_edges(&self, node_id: NodeId) -> Result<Vec<LineageEdge>, LineageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .incoming
            .get(&node_id)
            .map(|slots| slots.iter().map(|slot| tables.edges[*slot].clone()).collect())
            .unwrap_or_default())
    }

    async fn outgoing_edges(&self, node_id: NodeId) -> Result<Vec<LineageEdge>, LineageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .outgoing
            .get(&node_id)
            .map(|slots| slots.iter().map(|slot| tables.edges[*slot].clone()).collect())
            .unwrap_or_default())
    }

    async fn append_event(&self, event: &LineageEvent) -> Result<(), LineageError> {
        let mut tables = self.tables.write().await;
        if tables.node(&event.pattern_node_id).is_none() {
            return Err(LineageError::NotFound(format!(
                "node {} for event {}",
                event.pattern_node_id, event.id
            )));
        }
        tables.push_event(event.clone());
        Ok(())
    }

    async fn find_events(&self, node_ids: &[NodeId]) -> Result<Vec<LineageEvent>, LineageError> {
        let tables = self.tables.read().await;
        let mut events: Vec<LineageEvent> = node_ids
            .iter()
            .filter_map(|id| tables.events_by_node.get(id))
            .flatten()
            .map(|slot| tables.events[*slot].clone())
            .collect();
        events.sort_by_key(|event| event.timestamp);
        Ok(events)
    }

    async fn load_ancestry(&self, node_id: NodeId) -> Result<Option<AncestryCacheEntry>, LineageError> {
        let tables = self.tables.read().await;
        Ok(tables.ancestry.get(&node_id).cloned())
    }

    async fn store_ancestry(&self, entry: &AncestryCacheEntry) -> Result<(), LineageError> {
        let mut tables = self.tables.write().await;
        if tables.node(&entry.node_id).is_none() {
            return Err(LineageError::NotFound(format!("node {}", entry.node_id)));
        }
        tables.ancestry.insert(entry.node_id, entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        EdgeType, LineageEventType, LineageId, TransformationType,
    };
    use chrono::Utc;
    use serde_json::json;

    fn node(pattern_id: &str, version: &str, generation: u32, lineage_id: LineageId) -> PatternNode {
        PatternNode {
            id: NodeId::new(),
            pattern_id: pattern_id.to_string(),
            name: pattern_id.to_string(),
            pattern_type: "generic".to_string(),
            version: version.to_string(),
            lineage_id,
            generation,
            payload: json!({}),
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    fn root_write(node: PatternNode) -> NodeWrite {
        let event = LineageEvent::new(LineageEventType::Created, node.id, "test", None);
        NodeWrite { node, edges: vec![], event }
    }

    #[tokio::test]
    async fn test_insert_and_find_latest() {
        let repo = InMemoryLineageRepository::new();
        let lineage = LineageId::new();
        let v1 = node("p", "1.0", 0, lineage);
        let v2 = node("p", "1.1", 1, lineage);
        let edge = LineageEdge::new(v1.id, v2.id, EdgeType::ModifiedFrom, TransformationType::Bugfix);

        repo.insert_node(root_write(v1.clone())).await.unwrap();
        repo.insert_node(NodeWrite {
            event: LineageEvent::new(LineageEventType::Modified, v2.id, "test", None),
            node: v2.clone(),
            edges: vec![edge],
        })
        .await
        .unwrap();

        assert_eq!(repo.find_latest("p").await.unwrap().unwrap().id, v2.id);
        assert_eq!(repo.find_versions("p").await.unwrap().len(), 2);
        assert_eq!(repo.incoming_edges(v2.id).await.unwrap().len(), 1);
        assert_eq!(repo.outgoing_edges(v1.id).await.unwrap().len(), 1);
        assert_eq!(repo.find_events(&[v1.id, v2.id]).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_version_conflicts() {
        let repo = InMemoryLineageRepository::new();
        let lineage = LineageId::new();
        repo.insert_node(root_write(node("p", "1.0", 0, lineage))).await.unwrap();

        let err = repo
            .insert_node(root_write(node("p", "1.0", 0, lineage)))
            .await
            .unwrap_err();
        assert!(matches!(err, LineageError::Conflict(_)));
        assert_eq!(repo.node_count().await, 1);
    }

    #[tokio::test]
    async fn test_dangling_parent_leaves_tables_untouched() {
        let repo = InMemoryLineageRepository::new();
        let child = node("p", "1.1", 1, LineageId::new());
        let edge = LineageEdge::new(NodeId::new(), child.id, EdgeType::ModifiedFrom, TransformationType::Bugfix);

        let err = repo
            .insert_node(NodeWrite {
                event: LineageEvent::new(LineageEventType::Modified, child.id, "test", None),
                node: child.clone(),
                edges: vec![edge],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, LineageError::DanglingReference(_)));
        assert_eq!(repo.node_count().await, 0);
        assert_eq!(repo.edge_count().await, 0);
        assert!(repo.find_node(child.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_edge_write_marks_endpoints_stale() {
        let repo = InMemoryLineageRepository::new();
        let lineage = LineageId::new();
        let parent = node("p", "1.0", 0, lineage);
        repo.insert_node(root_write(parent.clone())).await.unwrap();
        repo.store_ancestry(&AncestryCacheEntry {
            node_id: parent.id,
            ancestors: vec![],
            ancestry_depth: 0,
            total_ancestors: 0,
            lineage_id: lineage,
            computed_at: Utc::now(),
            stale: false,
        })
        .await
        .unwrap();

        let child = node("p", "1.1", 1, lineage);
        let edge = LineageEdge::new(parent.id, child.id, EdgeType::ModifiedFrom, TransformationType::Refactor);
        repo.insert_node(NodeWrite {
            event: LineageEvent::new(LineageEventType::Modified, child.id, "test", None),
            node: child,
            edges: vec![edge],
        })
        .await
        .unwrap();

        let entry = repo.load_ancestry(parent.id).await.unwrap().unwrap();
        assert!(entry.stale);
    }
}
