// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Pattern version nodes
//!
//! A [`PatternNode`] is one immutable version of a reusable pattern. Nodes are
//! grouped by `pattern_id` (many versions per pattern) and by `lineage_id`
//! (every node descended from a common root).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use super::graph::{EdgeType, TransformationType};

/// Identifier of a single pattern version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier shared by all nodes descended from a common root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineageId(pub Uuid);

impl LineageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LineageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LineageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One immutable version of a pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternNode {
    pub id: NodeId,
    pub pattern_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub pattern_type: String,
    pub version: String,
    pub lineage_id: LineageId,
    pub generation: u32,
    /// Opaque pattern content
    pub payload: Value,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl PatternNode {
    pub fn is_root(&self) -> bool {
        self.generation == 0
    }

    /// Human-readable `pattern_id@version` label used in logs and CLI output
    pub fn label(&self) -> String {
        format!("{}@{}", self.pattern_id, self.version)
    }
}

/// Reference to a parent version when creating a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ParentRef {
    /// An exact node
    Node(NodeId),
    /// The latest version of a pattern, resolved through the pattern registry
    Pattern(String),
}

impl From<NodeId> for ParentRef {
    fn from(id: NodeId) -> Self {
        ParentRef::Node(id)
    }
}

impl From<&str> for ParentRef {
    fn from(pattern_id: &str) -> Self {
        ParentRef::Pattern(pattern_id.to_string())
    }
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentRef::Node(id) => write!(f, "node {}", id),
            ParentRef::Pattern(pattern_id) => write!(f, "pattern '{}'", pattern_id),
        }
    }
}

/// Request to write a new pattern version together with its parent edges
#[derive(Debug, Clone)]
pub struct CreateNodeRequest {
    pub pattern_id: String,
    pub name: String,
    pub pattern_type: String,
    pub version: String,
    pub payload: Value,
    pub metadata: HashMap<String, Value>,
    pub parents: Vec<ParentRef>,
    /// Ignored for roots
    pub edge_type: EdgeType,
    pub transformation_type: TransformationType,
    pub triggered_by: String,
    pub reason: Option<String>,
}

impl CreateNodeRequest {
    /// A root version with no parents
    pub fn root(pattern_id: impl Into<String>, version: impl Into<String>, payload: Value) -> Self {
        let pattern_id = pattern_id.into();
        Self {
            name: pattern_id.clone(),
            pattern_id,
            pattern_type: "generic".to_string(),
            version: version.into(),
            payload,
            metadata: HashMap::new(),
            parents: Vec::new(),
            edge_type: EdgeType::DerivedFrom,
            transformation_type: TransformationType::Refactor,
            triggered_by: "system".to_string(),
            reason: None,
        }
    }

    /// A version derived from one or more parents
    pub fn derived(
        pattern_id: impl Into<String>,
        version: impl Into<String>,
        payload: Value,
        parents: Vec<ParentRef>,
        edge_type: EdgeType,
        transformation_type: TransformationType,
    ) -> Self {
        Self {
            parents,
            edge_type,
            transformation_type,
            ..Self::root(pattern_id, version, payload)
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_type(mut self, pattern_type: impl Into<String>) -> Self {
        self.pattern_type = pattern_type.into();
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn triggered_by(mut self, actor: impl Into<String>) -> Self {
        self.triggered_by = actor.into();
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Outcome of a successful node write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedNode {
    pub node_id: NodeId,
    pub lineage_id: LineageId,
    pub generation: u32,
    pub parent_node_ids: Vec<NodeId>,
    /// Audit event written with the node
    pub event: super::events::LineageEvent,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_derived_request_inherits_root_defaults() {
        let request = CreateNodeRequest::derived(
            "retry_policy",
            "1.1",
            json!({"max_retries": 5}),
            vec!["retry_policy".into()],
            EdgeType::ModifiedFrom,
            TransformationType::Optimization,
        );

        assert_eq!(request.name, "retry_policy");
        assert_eq!(request.pattern_type, "generic");
        assert_eq!(request.parents, vec![ParentRef::Pattern("retry_policy".to_string())]);
        assert_eq!(request.edge_type, EdgeType::ModifiedFrom);
    }

    #[test]
    fn test_parent_ref_serialization() {
        let id = NodeId::new();
        let json = serde_json::to_value(ParentRef::Node(id)).unwrap();
        assert_eq!(json["kind"], "node");
        assert_eq!(json["value"], id.0.to_string());
    }
}
