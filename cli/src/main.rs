// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Pattern Lineage CLI
//!
//! The `lineage` binary records pattern versions, queries their history and
//! runs the feedback loop against an execution trace file.
//!
//! ## Commands
//!
//! - `lineage config show|validate|generate` - Configuration management
//! - `lineage update [--dry-run]` - Apply database migrations
//! - `lineage track create|modify|merge|apply|deprecate` - Record lineage
//! - `lineage query ancestry|descendants|events` - Inspect lineage
//! - `lineage loop run --traces FILE --pattern ID` - Run the feedback loop once

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

use pattern_lineage_cli::commands::{
    self, ConfigCommand, LoopCommand, QueryCommand, TrackCommand, UpdateCommand,
};

/// Pattern lineage tracking and feedback loop
#[derive(Parser)]
#[command(name = "lineage")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "LINEAGE_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LINEAGE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Compact,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Update the lineage database schema
    #[command(name = "update")]
    Update {
        #[command(flatten)]
        command: UpdateCommand,
    },

    /// Record pattern versions and lineage events
    #[command(name = "track")]
    Track {
        #[command(subcommand)]
        command: TrackCommand,
    },

    /// Query pattern lineage
    #[command(name = "query")]
    Query {
        #[command(subcommand)]
        command: QueryCommand,
    },

    /// Feedback loop operations
    #[command(name = "loop")]
    Loop {
        #[command(subcommand)]
        command: LoopCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.log_format)?;

    match cli.command {
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        Some(Commands::Update { command }) => commands::update::execute(command, cli.config).await,
        Some(Commands::Track { command }) => {
            commands::track::handle_command(command, cli.config).await
        }
        Some(Commands::Query { command }) => {
            commands::query::handle_command(command, cli.config).await
        }
        Some(Commands::Loop { command }) => {
            commands::feedback::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().with_current_span(true).init(),
    }

    Ok(())
}
