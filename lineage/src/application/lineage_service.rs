// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # LineageService - Pattern Version Graph
//!
//! Application service over the lineage repository. Owns every rule the
//! storage layer cannot express on its own:
//!
//! - parent resolution through the [`PatternRegistry`] (by node id or by
//!   pattern id, the latter meaning "latest version")
//! - `generation = 1 + max(parent.generation)`, `0` for roots
//! - lineage inheritance (a merge adopts its first parent's lineage)
//! - a defensive cycle check before multi-parent merges
//! - ancestry queries served from the materialized cache unless stale
//!
//! Queries addressed by `pattern_id` resolve to that pattern's latest version.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::traversal::{find_cycle, sort_ancestors, ParentGraph};
use crate::domain::{
    AncestryCacheEntry, CreateNodeRequest, CreatedNode, EdgeType, LineageEdge, LineageError,
    LineageEvent, LineageEventType, LineageId, NodeId, ParentRef, PatternNode,
    TransformationType,
};
use crate::infrastructure::{LineageRepository, NodeWrite, PatternRegistry, RepositoryPatternRegistry};

/// Ancestor chain of one node, oldest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AncestryView {
    pub node: PatternNode,
    pub ancestors: Vec<PatternNode>,
    pub ancestry_depth: u32,
    pub total_ancestors: usize,
    pub lineage_id: LineageId,
    pub from_cache: bool,
}

impl AncestryView {
    pub fn ancestor_ids(&self) -> Vec<NodeId> {
        self.ancestors.iter().map(|node| node.id).collect()
    }
}

/// A direct child with the edge that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Descendant {
    pub node: PatternNode,
    pub edge_type: EdgeType,
    pub transformation_type: TransformationType,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescendantsView {
    pub node: PatternNode,
    pub descendants: Vec<Descendant>,
    pub total_descendants: usize,
}

/// LineageService interface
#[async_trait]
pub trait LineageService: Send + Sync {
    /// Write a new version together with its parent edges and creation event
    async fn create_node(&self, request: CreateNodeRequest) -> Result<CreatedNode, LineageError>;

    /// Ancestors of a pattern's latest version, served from cache when fresh
    async fn query_ancestry(&self, pattern_id: &str) -> Result<AncestryView, LineageError>;

    /// Like `query_ancestry` but always recomputed from edges
    async fn query_ancestry_fresh(&self, pattern_id: &str) -> Result<AncestryView, LineageError>;

    /// Ancestors of an exact node
    async fn node_ancestry(&self, node_id: NodeId, fresh: bool) -> Result<AncestryView, LineageError>;

    /// Direct (one-hop) children of a pattern's latest version
    async fn query_descendants(&self, pattern_id: &str) -> Result<DescendantsView, LineageError>;

    /// Append a deprecation event; history is never removed
    async fn deprecate(
        &self,
        pattern_id: &str,
        reason: &str,
        triggered_by: &str,
    ) -> Result<LineageEvent, LineageError>;

    /// Append a non-structural event (applied, validated) to a pattern's latest version
    async fn record_event(
        &self,
        pattern_id: &str,
        event_type: LineageEventType,
        triggered_by: &str,
        reason: Option<String>,
        context: Value,
    ) -> Result<LineageEvent, LineageError>;

    /// Offending path if the backward graph of the pattern's latest version revisits a node
    async fn detect_cycles(&self, pattern_id: &str) -> Result<Option<Vec<NodeId>>, LineageError>;

    async fn latest(&self, pattern_id: &str) -> Result<PatternNode, LineageError>;

    /// Audit log across every version of a pattern
    async fn events_for_pattern(&self, pattern_id: &str) -> Result<Vec<LineageEvent>, LineageError>;

    async fn is_deprecated(&self, pattern_id: &str) -> Result<bool, LineageError>;
}

/// Standard implementation of LineageService
pub struct StandardLineageService {
    repository: Arc<dyn LineageRepository>,
    registry: Arc<dyn PatternRegistry>,
}

impl StandardLineageService {
    pub fn new(repository: Arc<dyn LineageRepository>, registry: Arc<dyn PatternRegistry>) -> Self {
        Self { repository, registry }
    }

    /// Uses the repository itself as the pattern registry
    pub fn with_repository(repository: Arc<dyn LineageRepository>) -> Self {
        let registry = Arc::new(RepositoryPatternRegistry::new(repository.clone()));
        Self::new(repository, registry)
    }

    async fn resolve_parent(&self, parent: &ParentRef) -> Result<PatternNode, LineageError> {
        let resolved = match parent {
            ParentRef::Node(id) => self.repository.find_node(*id).await?,
            ParentRef::Pattern(pattern_id) => self.registry.latest_version(pattern_id).await?,
        };
        resolved.ok_or_else(|| LineageError::DanglingReference(format!("parent {} does not exist", parent)))
    }

    async fn resolve_parents(&self, parents: &[ParentRef]) -> Result<Vec<PatternNode>, LineageError> {
        let mut resolved: Vec<PatternNode> = Vec::with_capacity(parents.len());
        for parent in parents {
            let node = self.resolve_parent(parent).await?;
            if !resolved.iter().any(|existing| existing.id == node.id) {
                resolved.push(node);
            }
        }
        Ok(resolved)
    }

    async fn parent_graph(&self, start: NodeId) -> Result<ParentGraph, LineageError> {
        let mut graph: ParentGraph = HashMap::new();
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            if graph.contains_key(&current) {
                continue;
            }
            let parents: Vec<NodeId> = self
                .repository
                .incoming_edges(current)
                .await?
                .into_iter()
                .map(|edge| edge.source_node_id)
                .collect();
            for parent in &parents {
                if !graph.contains_key(parent) {
                    queue.push_back(*parent);
                }
            }
            graph.insert(current, parents);
        }

        Ok(graph)
    }

    async fn compute_ancestry(&self, node: &PatternNode) -> Result<(AncestryCacheEntry, Vec<PatternNode>), LineageError> {
        let graph = self.parent_graph(node.id).await?;
        let ids: Vec<NodeId> = graph.keys().filter(|id| **id != node.id).copied().collect();
        let mut ancestors = self.repository.find_nodes(&ids).await?;
        if ancestors.len() != ids.len() {
            return Err(LineageError::StorageRead(format!(
                "ancestry of {} references {} missing nodes",
                node.id,
                ids.len() - ancestors.len()
            )));
        }
        sort_ancestors(&mut ancestors);

        let entry = AncestryCacheEntry {
            node_id: node.id,
            ancestors: ancestors.iter().map(|a| a.id).collect(),
            ancestry_depth: node.generation,
            total_ancestors: ancestors.len(),
            lineage_id: node.lineage_id,
            computed_at: Utc::now(),
            stale: false,
        };
        Ok((entry, ancestors))
    }

    async fn ancestry_of(&self, node: PatternNode, fresh: bool) -> Result<AncestryView, LineageError> {
        if !fresh {
            if let Some(entry) = self.repository.load_ancestry(node.id).await? {
                if entry.is_fresh() {
                    metrics::counter!("lineage_ancestry_cache_hits_total").increment(1);
                    let mut ancestors = self.repository.find_nodes(&entry.ancestors).await?;
                    sort_ancestors(&mut ancestors);
                    return Ok(AncestryView {
                        node,
                        ancestors,
                        ancestry_depth: entry.ancestry_depth,
                        total_ancestors: entry.total_ancestors,
                        lineage_id: entry.lineage_id,
                        from_cache: true,
                    });
                }
            }
            metrics::counter!("lineage_ancestry_cache_misses_total").increment(1);
        }

        let (entry, ancestors) = self.compute_ancestry(&node).await?;
        if let Err(e) = self.repository.store_ancestry(&entry).await {
            warn!(node_id = %node.id, error = %e, "Failed to refresh ancestry cache");
        }
        debug!(node_id = %node.id, total_ancestors = entry.total_ancestors, "Recomputed ancestry");

        Ok(AncestryView {
            node,
            ancestors,
            ancestry_depth: entry.ancestry_depth,
            total_ancestors: entry.total_ancestors,
            lineage_id: entry.lineage_id,
            from_cache: false,
        })
    }

    fn creation_event_type(request: &CreateNodeRequest, parents: &[PatternNode]) -> LineageEventType {
        if parents.is_empty() {
            LineageEventType::Created
        } else if parents.len() > 1 || request.edge_type == EdgeType::MergedFrom {
            LineageEventType::Merged
        } else if matches!(request.edge_type, EdgeType::DerivedFrom | EdgeType::InspiredBy)
            && parents.iter().any(|p| p.pattern_id != request.pattern_id)
        {
            LineageEventType::Forked
        } else {
            LineageEventType::Modified
        }
    }
}

#[async_trait]
impl LineageService for StandardLineageService {
    async fn create_node(&self, request: CreateNodeRequest) -> Result<CreatedNode, LineageError> {
        if request.pattern_id.trim().is_empty() {
            return Err(LineageError::InvalidInput("pattern_id cannot be empty".to_string()));
        }
        if request.version.trim().is_empty() {
            return Err(LineageError::InvalidInput("version cannot be empty".to_string()));
        }
        if self
            .repository
            .find_version(&request.pattern_id, &request.version)
            .await?
            .is_some()
        {
            return Err(LineageError::Conflict(format!(
                "version {} of pattern '{}' already exists",
                request.version, request.pattern_id
            )));
        }

        let parents = self.resolve_parents(&request.parents).await?;

        // Merges join independently grown subgraphs; refuse if any of them is corrupt.
        if parents.len() > 1 {
            for parent in &parents {
                let graph = self.parent_graph(parent.id).await?;
                if let Some(path) = find_cycle(parent.id, &graph) {
                    let rendered: Vec<String> = path.iter().map(NodeId::to_string).collect();
                    return Err(LineageError::Conflict(format!(
                        "merge would join a cycle: {}",
                        rendered.join(" -> ")
                    )));
                }
            }
        }

        let generation = parents
            .iter()
            .map(|p| p.generation + 1)
            .max()
            .unwrap_or(0);
        let lineage_id = parents
            .first()
            .map(|p| p.lineage_id)
            .unwrap_or_else(LineageId::new);
        let event_type = Self::creation_event_type(&request, &parents);

        let node = PatternNode {
            id: NodeId::new(),
            pattern_id: request.pattern_id.clone(),
            name: request.name.clone(),
            pattern_type: request.pattern_type.clone(),
            version: request.version.clone(),
            lineage_id,
            generation,
            payload: request.payload.clone(),
            metadata: request.metadata.clone(),
            created_at: Utc::now(),
        };
        let edges: Vec<LineageEdge> = parents
            .iter()
            .map(|parent| {
                LineageEdge::new(parent.id, node.id, request.edge_type, request.transformation_type)
            })
            .collect();
        let event = LineageEvent::new(event_type, node.id, request.triggered_by.clone(), request.reason.clone());

        let created = CreatedNode {
            node_id: node.id,
            lineage_id,
            generation,
            parent_node_ids: parents.iter().map(|p| p.id).collect(),
            event: event.clone(),
            created_at: node.created_at,
        };

        self.repository.insert_node(NodeWrite { node, edges, event }).await?;

        metrics::counter!("lineage_nodes_created_total", "event_type" => event_type.as_str())
            .increment(1);
        info!(
            pattern_id = %request.pattern_id,
            version = %request.version,
            node_id = %created.node_id,
            generation = generation,
            parents = created.parent_node_ids.len(),
            "Lineage node created"
        );

        Ok(created)
    }

    async fn query_ancestry(&self, pattern_id: &str) -> Result<AncestryView, LineageError> {
        let node = self.latest(pattern_id).await?;
        self.ancestry_of(node, false).await
    }

    async fn query_ancestry_fresh(&self, pattern_id: &str) -> Result<AncestryView, LineageError> {
        let node = self.latest(pattern_id).await?;
        self.ancestry_of(node, true).await
    }

    async fn node_ancestry(&self, node_id: NodeId, fresh: bool) -> Result<AncestryView, LineageError> {
        let node = self
            .repository
            .find_node(node_id)
            .await?
            .ok_or_else(|| LineageError::NotFound(format!("node {}", node_id)))?;
        self.ancestry_of(node, fresh).await
    }

    async fn query_descendants(&self, pattern_id: &str) -> Result<DescendantsView, LineageError> {
        let node = self.latest(pattern_id).await?;
        let edges = self.repository.outgoing_edges(node.id).await?;
        let child_ids: Vec<NodeId> = edges.iter().map(|edge| edge.target_node_id).collect();
        let children: HashMap<NodeId, PatternNode> = self
            .repository
            .find_nodes(&child_ids)
            .await?
            .into_iter()
            .map(|child| (child.id, child))
            .collect();

        let mut seen = HashSet::new();
        let descendants: Vec<Descendant> = edges
            .into_iter()
            .filter(|edge| seen.insert(edge.target_node_id))
            .filter_map(|edge| {
                children.get(&edge.target_node_id).map(|child| Descendant {
                    node: child.clone(),
                    edge_type: edge.edge_type,
                    transformation_type: edge.transformation_type,
                    weight: edge.weight,
                })
            })
            .collect();

        Ok(DescendantsView {
            total_descendants: descendants.len(),
            node,
            descendants,
        })
    }

    async fn deprecate(
        &self,
        pattern_id: &str,
        reason: &str,
        triggered_by: &str,
    ) -> Result<LineageEvent, LineageError> {
        let event = self
            .record_event(
                pattern_id,
                LineageEventType::Deprecated,
                triggered_by,
                Some(reason.to_string()),
                Value::Null,
            )
            .await?;
        info!(pattern_id = %pattern_id, reason = %reason, "Pattern deprecated");
        Ok(event)
    }

    async fn record_event(
        &self,
        pattern_id: &str,
        event_type: LineageEventType,
        triggered_by: &str,
        reason: Option<String>,
        context: Value,
    ) -> Result<LineageEvent, LineageError> {
        let node = self.latest(pattern_id).await?;
        let event = LineageEvent::new(event_type, node.id, triggered_by, reason).with_context(context);
        self.repository.append_event(&event).await?;
        debug!(pattern_id = %pattern_id, event_type = %event_type, "Lineage event recorded");
        Ok(event)
    }

    async fn detect_cycles(&self, pattern_id: &str) -> Result<Option<Vec<NodeId>>, LineageError> {
        let node = self.latest(pattern_id).await?;
        let graph = self.parent_graph(node.id).await?;
        let cycle = find_cycle(node.id, &graph);
        if cycle.is_some() {
            warn!(pattern_id = %pattern_id, "Cycle detected in lineage graph");
        }
        Ok(cycle)
    }

    async fn latest(&self, pattern_id: &str) -> Result<PatternNode, LineageError> {
        self.repository
            .find_latest(pattern_id)
            .await?
            .ok_or_else(|| LineageError::NotFound(format!("pattern '{}'", pattern_id)))
    }

    async fn events_for_pattern(&self, pattern_id: &str) -> Result<Vec<LineageEvent>, LineageError> {
        let versions = self.repository.find_versions(pattern_id).await?;
        if versions.is_empty() {
            return Err(LineageError::NotFound(format!("pattern '{}'", pattern_id)));
        }
        let ids: Vec<NodeId> = versions.iter().map(|v| v.id).collect();
        self.repository.find_events(&ids).await
    }

    async fn is_deprecated(&self, pattern_id: &str) -> Result<bool, LineageError> {
        let node = self.latest(pattern_id).await?;
        let events = self.repository.find_events(&[node.id]).await?;
        Ok(events
            .iter()
            .any(|event| event.event_type == LineageEventType::Deprecated))
    }
}
