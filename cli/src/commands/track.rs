// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Lineage tracking commands
//!
//! Commands: create, modify, merge, apply, deprecate
//!
//! Parents are given with `--parent` and may be either a node UUID or a
//! pattern id, which resolves to that pattern's latest version.

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use uuid::Uuid;

use lineage_orchestrator::application::tracking_service::{
    TrackCreation, TrackMerge, TrackModification, TrackingService,
};
use pattern_lineage::{EdgeType, NodeId, ParentRef, TransformationType};

use crate::runtime::LineageRuntime;

#[derive(Subcommand)]
pub enum TrackCommand {
    /// Record a brand new pattern (generation 0, new lineage)
    Create {
        /// Pattern identifier
        pattern_id: String,

        /// Display name (defaults to the pattern id)
        #[arg(long)]
        name: Option<String>,

        /// Pattern category
        #[arg(long = "type", default_value = "generic")]
        pattern_type: String,

        #[arg(long, default_value = "1.0")]
        version: String,

        /// Pattern content as a JSON document
        #[arg(long, default_value = "{}")]
        payload: String,

        /// Metadata as a JSON object
        #[arg(long, default_value = "{}")]
        metadata: String,
    },

    /// Record a new version derived from one or more parents
    Modify {
        pattern_id: String,

        #[arg(long)]
        version: String,

        /// Parent node UUID or pattern id (repeatable)
        #[arg(long = "parent", required = true)]
        parents: Vec<String>,

        #[arg(long, default_value = "{}")]
        payload: String,

        #[arg(long, default_value = "modified_from")]
        edge_type: EdgeType,

        #[arg(long, default_value = "enhancement")]
        transformation: TransformationType,

        #[arg(long)]
        reason: Option<String>,
    },

    /// Record a version that merges two or more parents
    Merge {
        pattern_id: String,

        #[arg(long)]
        version: String,

        /// Parent node UUID or pattern id (at least two)
        #[arg(long = "parent", required = true, num_args = 1..)]
        parents: Vec<String>,

        #[arg(long, default_value = "{}")]
        payload: String,

        #[arg(long, default_value = "merge")]
        transformation: TransformationType,
    },

    /// Record that the pattern's latest version was applied
    Apply {
        pattern_id: String,

        /// Execution context as a JSON document
        #[arg(long, default_value = "{}")]
        context: String,

        #[arg(long, default_value = "{}")]
        metadata: String,
    },

    /// Deprecate the pattern's latest version
    Deprecate {
        pattern_id: String,

        #[arg(long)]
        reason: String,
    },
}

pub async fn handle_command(command: TrackCommand, config_override: Option<PathBuf>) -> Result<()> {
    let runtime = LineageRuntime::new(config_override, None).await?;
    let tracking = &runtime.tracking;

    match command {
        TrackCommand::Create {
            pattern_id,
            name,
            pattern_type,
            version,
            payload,
            metadata,
        } => {
            let created = tracking
                .track_creation(TrackCreation {
                    name: name.unwrap_or_else(|| pattern_id.clone()),
                    pattern_id,
                    pattern_type,
                    version,
                    payload: parse_json(&payload, "payload")?,
                    metadata: parse_metadata(&metadata)?,
                })
                .await
                .context("Failed to track pattern creation")?;
            print_json(&created)
        }
        TrackCommand::Modify {
            pattern_id,
            version,
            parents,
            payload,
            edge_type,
            transformation,
            reason,
        } => {
            let modified = tracking
                .track_modification(TrackModification {
                    pattern_id,
                    version,
                    payload: parse_json(&payload, "payload")?,
                    parents: parents.iter().map(|p| parse_parent(p)).collect(),
                    edge_type,
                    transformation_type: transformation,
                    reason,
                })
                .await
                .context("Failed to track pattern modification")?;
            print_json(&modified)
        }
        TrackCommand::Merge {
            pattern_id,
            version,
            parents,
            payload,
            transformation,
        } => {
            let merged = tracking
                .track_merge(TrackMerge {
                    pattern_id,
                    version,
                    payload: parse_json(&payload, "payload")?,
                    parents: parents.iter().map(|p| parse_parent(p)).collect(),
                    transformation_type: transformation,
                })
                .await
                .context("Failed to track pattern merge")?;
            print_json(&merged)
        }
        TrackCommand::Apply {
            pattern_id,
            context,
            metadata,
        } => {
            let applied = tracking
                .track_application(
                    &pattern_id,
                    parse_json(&context, "context")?,
                    parse_metadata(&metadata)?,
                )
                .await
                .context("Failed to track pattern application")?;
            print_json(&applied)
        }
        TrackCommand::Deprecate { pattern_id, reason } => {
            let deprecated = tracking
                .track_deprecation(&pattern_id, &reason)
                .await
                .context("Failed to deprecate pattern")?;
            print_json(&deprecated)
        }
    }
}

/// A UUID names an exact node; anything else is a pattern id
pub fn parse_parent(raw: &str) -> ParentRef {
    match Uuid::parse_str(raw) {
        Ok(id) => ParentRef::Node(NodeId(id)),
        Err(_) => ParentRef::Pattern(raw.to_string()),
    }
}

pub fn parse_json(raw: &str, field: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("--{} is not valid JSON", field))
}

pub fn parse_metadata(raw: &str) -> Result<HashMap<String, Value>> {
    serde_json::from_str(raw).context("--metadata must be a JSON object")
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
