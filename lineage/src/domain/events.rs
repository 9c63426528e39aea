// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Append-only lineage audit log
//!
//! Every node write appends exactly one event in the same transaction.
//! Applications, validations and deprecations append events without
//! touching nodes or edges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::error::LineageError;
use super::pattern::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineageEventType {
    Created,
    Modified,
    Merged,
    Applied,
    Deprecated,
    Forked,
    Validated,
}

impl LineageEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineageEventType::Created => "created",
            LineageEventType::Modified => "modified",
            LineageEventType::Merged => "merged",
            LineageEventType::Applied => "applied",
            LineageEventType::Deprecated => "deprecated",
            LineageEventType::Forked => "forked",
            LineageEventType::Validated => "validated",
        }
    }
}

impl FromStr for LineageEventType {
    type Err = LineageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(LineageEventType::Created),
            "modified" => Ok(LineageEventType::Modified),
            "merged" => Ok(LineageEventType::Merged),
            "applied" => Ok(LineageEventType::Applied),
            "deprecated" => Ok(LineageEventType::Deprecated),
            "forked" => Ok(LineageEventType::Forked),
            "validated" => Ok(LineageEventType::Validated),
            other => Err(LineageError::InvalidInput(format!("unknown event type '{}'", other))),
        }
    }
}

impl fmt::Display for LineageEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageEvent {
    pub id: EventId,
    pub event_type: LineageEventType,
    pub pattern_node_id: NodeId,
    pub timestamp: DateTime<Utc>,
    pub triggered_by: String,
    pub reason: Option<String>,
    /// Free-form context, e.g. the execution context of an application
    #[serde(default)]
    pub context: Value,
}

impl LineageEvent {
    pub fn new(
        event_type: LineageEventType,
        pattern_node_id: NodeId,
        triggered_by: impl Into<String>,
        reason: Option<String>,
    ) -> Self {
        Self {
            id: EventId::new(),
            event_type,
            pattern_node_id,
            timestamp: Utc::now(),
            triggered_by: triggered_by.into(),
            reason,
            context: Value::Null,
        }
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }
}
