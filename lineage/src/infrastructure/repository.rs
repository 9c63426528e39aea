// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository interfaces for the Lineage Store bounded context
//! Defines the contracts for node, edge, event and ancestry cache storage

use async_trait::async_trait;

use crate::domain::{
    AncestryCacheEntry, LineageEdge, LineageError, LineageEvent, NodeId, PatternNode,
};

/// Everything written together when a new version is created
#[derive(Debug, Clone)]
pub struct NodeWrite {
    pub node: PatternNode,
    pub edges: Vec<LineageEdge>,
    pub event: LineageEvent,
}

/// Durable append-only storage for the lineage graph
///
/// `insert_node` is the only way nodes and edges enter the store. It must be
/// atomic: the node, its parent edges, its creation event and the staleness
/// markers for every edge endpoint become visible together or not at all.
#[async_trait]
pub trait LineageRepository: Send + Sync {
    /// Atomically persist a node with its parent edges and creation event.
    ///
    /// Fails with `Conflict` on a duplicate `(pattern_id, version)` and with
    /// `DanglingReference` when an edge source does not exist.
    async fn insert_node(&self, write: NodeWrite) -> Result<(), LineageError>;

    async fn find_node(&self, id: NodeId) -> Result<Option<PatternNode>, LineageError>;

    /// Batch lookup; unknown ids are skipped
    async fn find_nodes(&self, ids: &[NodeId]) -> Result<Vec<PatternNode>, LineageError>;

    /// Most recently written version of a pattern
    async fn find_latest(&self, pattern_id: &str) -> Result<Option<PatternNode>, LineageError>;

    async fn find_version(
        &self,
        pattern_id: &str,
        version: &str,
    ) -> Result<Option<PatternNode>, LineageError>;

    /// All versions of a pattern, oldest first
    async fn find_versions(&self, pattern_id: &str) -> Result<Vec<PatternNode>, LineageError>;

    /// Edges whose target is `node_id`
    async fn incoming_edges(&self, node_id: NodeId) -> Result<Vec<LineageEdge>, LineageError>;

    /// Edges whose source is `node_id`
    async fn outgoing_edges(&self, node_id: NodeId) -> Result<Vec<LineageEdge>, LineageError>;

    async fn append_event(&self, event: &LineageEvent) -> Result<(), LineageError>;

    /// Events for the given nodes, ordered by timestamp
    async fn find_events(&self, node_ids: &[NodeId]) -> Result<Vec<LineageEvent>, LineageError>;

    async fn load_ancestry(&self, node_id: NodeId) -> Result<Option<AncestryCacheEntry>, LineageError>;

    async fn store_ancestry(&self, entry: &AncestryCacheEntry) -> Result<(), LineageError>;
}

/// Read-only view over registered patterns
///
/// Consulted before a new node references a pattern as its parent.
#[async_trait]
pub trait PatternRegistry: Send + Sync {
    async fn latest_version(&self, pattern_id: &str) -> Result<Option<PatternNode>, LineageError>;

    async fn exists(&self, pattern_id: &str) -> Result<bool, LineageError> {
        Ok(self.latest_version(pattern_id).await?.is_some())
    }
}
