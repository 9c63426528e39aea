// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Database Update Command
//!
//! `lineage update` applies pending schema migrations for the lineage DAG
//! tables and the improvement proposal table.
//!
//! ```bash
//! # Apply all pending migrations
//! lineage update
//!
//! # Preview migrations without applying
//! lineage update --dry-run
//! ```
//!
//! The database URL is read from `LINEAGE_DATABASE_URL`, falling back to
//! `spec.storage.database_url` in the loaded configuration.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;

use lineage_orchestrator::domain::lineage_config::LineageConfigManifest;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Args)]
pub struct UpdateCommand {
    /// Perform a dry run without applying changes
    #[arg(long)]
    dry_run: bool,
}

pub async fn execute(cmd: UpdateCommand, config_override: Option<PathBuf>) -> Result<()> {
    println!("{}", "Lineage Update".bold().green());

    let database_url = resolve_database_url(config_override)?;

    println!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    // The tracking table does not exist before the first run
    let applied_count = sqlx::query("SELECT version FROM _sqlx_migrations")
        .fetch_all(&pool)
        .await
        .map(|rows| rows.len())
        .unwrap_or(0);

    let total_migrations = MIGRATOR.iter().count();

    println!(
        "Migration status: {} applied, {} total available.",
        applied_count, total_migrations
    );

    if applied_count < total_migrations {
        if cmd.dry_run {
            println!("Pending migrations found (Dry Run):");
            for migration in MIGRATOR.iter().skip(applied_count) {
                println!(" - {} {}", migration.version, migration.description);
            }
            println!("Skipping application due to --dry-run");
            return Ok(());
        }

        println!("Applying pending migrations...");
        MIGRATOR
            .run(&pool)
            .await
            .context("Failed to apply migrations")?;
        println!("{}", "✓ Database updated successfully.".green());
    } else {
        println!("{}", "✓ Database is up to date.".green());
    }

    Ok(())
}

fn resolve_database_url(config_override: Option<PathBuf>) -> Result<String> {
    if let Ok(url) = std::env::var("LINEAGE_DATABASE_URL") {
        return Ok(url);
    }
    let config = LineageConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;
    config.spec.storage.database_url.context(
        "No database URL configured. Set LINEAGE_DATABASE_URL or spec.storage.database_url.",
    )
}
