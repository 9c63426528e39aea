// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Lineage query commands
//!
//! Commands: ancestry, descendants, events

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::PathBuf;

use lineage_orchestrator::application::tracking_service::TrackingService;

use super::track::print_json;
use crate::runtime::LineageRuntime;

#[derive(Subcommand)]
pub enum QueryCommand {
    /// Ancestors of the pattern's latest version, oldest first
    Ancestry { pattern_id: String },

    /// Every version derived from the pattern's latest version
    Descendants { pattern_id: String },

    /// Lineage events recorded against the pattern
    Events { pattern_id: String },
}

pub async fn handle_command(command: QueryCommand, config_override: Option<PathBuf>) -> Result<()> {
    let runtime = LineageRuntime::new(config_override, None).await?;
    let tracking = &runtime.tracking;

    match command {
        QueryCommand::Ancestry { pattern_id } => {
            let report = tracking
                .query_ancestry(&pattern_id)
                .await
                .with_context(|| format!("Failed to query ancestry of '{}'", pattern_id))?;
            print_json(&report)
        }
        QueryCommand::Descendants { pattern_id } => {
            let report = tracking
                .query_descendants(&pattern_id)
                .await
                .with_context(|| format!("Failed to query descendants of '{}'", pattern_id))?;
            print_json(&report)
        }
        QueryCommand::Events { pattern_id } => {
            let events = tracking
                .query_events(&pattern_id)
                .await
                .with_context(|| format!("Failed to query events of '{}'", pattern_id))?;
            print_json(&events)
        }
    }
}
