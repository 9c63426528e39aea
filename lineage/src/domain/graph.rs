// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Lineage graph edges and the materialized ancestry cache
//!
//! The graph is stored as flat tables keyed by [`NodeId`]; edges point from
//! parent (`source_node_id`) to child (`target_node_id`). Nodes and edges are
//! only ever appended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::LineageError;
use super::pattern::{LineageId, NodeId};

/// How a child version relates to its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    DerivedFrom,
    ModifiedFrom,
    MergedFrom,
    ReplacedBy,
    InspiredBy,
    DeprecatedBy,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::DerivedFrom => "derived_from",
            EdgeType::ModifiedFrom => "modified_from",
            EdgeType::MergedFrom => "merged_from",
            EdgeType::ReplacedBy => "replaced_by",
            EdgeType::InspiredBy => "inspired_by",
            EdgeType::DeprecatedBy => "deprecated_by",
        }
    }
}

impl FromStr for EdgeType {
    type Err = LineageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "derived_from" => Ok(EdgeType::DerivedFrom),
            "modified_from" => Ok(EdgeType::ModifiedFrom),
            "merged_from" => Ok(EdgeType::MergedFrom),
            "replaced_by" => Ok(EdgeType::ReplacedBy),
            "inspired_by" => Ok(EdgeType::InspiredBy),
            "deprecated_by" => Ok(EdgeType::DeprecatedBy),
            other => Err(LineageError::InvalidInput(format!("unknown edge type '{}'", other))),
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of change applied between parent and child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationType {
    Refactor,
    Enhancement,
    Bugfix,
    Merge,
    Optimization,
    Simplification,
}

impl TransformationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformationType::Refactor => "refactor",
            TransformationType::Enhancement => "enhancement",
            TransformationType::Bugfix => "bugfix",
            TransformationType::Merge => "merge",
            TransformationType::Optimization => "optimization",
            TransformationType::Simplification => "simplification",
        }
    }
}

impl FromStr for TransformationType {
    type Err = LineageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "refactor" => Ok(TransformationType::Refactor),
            "enhancement" => Ok(TransformationType::Enhancement),
            "bugfix" => Ok(TransformationType::Bugfix),
            "merge" => Ok(TransformationType::Merge),
            "optimization" => Ok(TransformationType::Optimization),
            "simplification" => Ok(TransformationType::Simplification),
            other => Err(LineageError::InvalidInput(format!(
                "unknown transformation type '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for TransformationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directed parent → child relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageEdge {
    pub source_node_id: NodeId,
    pub target_node_id: NodeId,
    pub edge_type: EdgeType,
    pub transformation_type: TransformationType,
    pub weight: f64,
    pub created_at: DateTime<Utc>,
}

impl LineageEdge {
    pub fn new(
        source_node_id: NodeId,
        target_node_id: NodeId,
        edge_type: EdgeType,
        transformation_type: TransformationType,
    ) -> Self {
        Self {
            source_node_id,
            target_node_id,
            edge_type,
            transformation_type,
            weight: 1.0,
            created_at: Utc::now(),
        }
    }

    /// Whether this edge touches `node_id` at either end
    pub fn touches(&self, node_id: NodeId) -> bool {
        self.source_node_id == node_id || self.target_node_id == node_id
    }
}

/// Materialized ancestor path for one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AncestryCacheEntry {
    pub node_id: NodeId,
    /// Oldest first
    pub ancestors: Vec<NodeId>,
    pub ancestry_depth: u32,
    pub total_ancestors: usize,
    pub lineage_id: LineageId,
    pub computed_at: DateTime<Utc>,
    pub stale: bool,
}

impl AncestryCacheEntry {
    pub fn is_fresh(&self) -> bool {
        !self.stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_type_string_forms_agree_with_serde() {
        for edge_type in [
            EdgeType::DerivedFrom,
            EdgeType::ModifiedFrom,
            EdgeType::MergedFrom,
            EdgeType::ReplacedBy,
            EdgeType::InspiredBy,
            EdgeType::DeprecatedBy,
        ] {
            let json = serde_json::to_value(edge_type).unwrap();
            assert_eq!(json, edge_type.as_str());
            assert_eq!(edge_type.as_str().parse::<EdgeType>().unwrap(), edge_type);
        }
    }

    #[test]
    fn test_unknown_transformation_is_invalid_input() {
        let err = "rewrite".parse::<TransformationType>().unwrap_err();
        assert!(matches!(err, LineageError::InvalidInput(_)));
    }

    #[test]
    fn test_new_edge_has_unit_weight() {
        let parent = NodeId::new();
        let child = NodeId::new();
        let edge = LineageEdge::new(parent, child, EdgeType::ModifiedFrom, TransformationType::Bugfix);
        assert_eq!(edge.weight, 1.0);
        assert!(edge.touches(parent));
        assert!(edge.touches(child));
        assert!(!edge.touches(NodeId::new()));
    }
}
