// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Feedback loop commands
//!
//! `lineage loop run` executes one feedback loop against a JSON trace file
//! and prints the report. Ctrl-C cancels the run at the next stage boundary.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use lineage_orchestrator::application::tracking_service::TrackingService;
use lineage_orchestrator::domain::feedback::{FeedbackType, TimeWindow};
use lineage_orchestrator::domain::feedback_loop::{FeedbackLoopReport, FeedbackLoopRequest};
use lineage_orchestrator::domain::lineage_config::FeedbackLoopConfig;
use pattern_lineage::LineageError;

use super::track::print_json;
use crate::runtime::LineageRuntime;

#[derive(Subcommand)]
pub enum LoopCommand {
    /// Run the feedback loop once for a pattern
    Run(RunArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// JSON file holding the execution trace records
    #[arg(long, value_name = "FILE")]
    pub traces: PathBuf,

    /// Pattern to analyze
    #[arg(long)]
    pub pattern: String,

    /// Restrict the analysis to one improvement class
    #[arg(long, default_value = "all")]
    pub feedback_type: FeedbackType,

    /// Length of the window ending now (e.g. "7days", "12h")
    #[arg(long, value_parser = humantime::parse_duration)]
    pub window: Option<Duration>,

    #[arg(long)]
    pub auto_apply_threshold: Option<f64>,

    #[arg(long)]
    pub min_sample_size: Option<usize>,

    #[arg(long)]
    pub significance_level: Option<f64>,

    /// Never auto-apply; proposals whose effect exceeds min_effect_size go to
    /// manual review and the rest are rejected
    #[arg(long)]
    pub no_ab_testing: bool,
}

impl RunArgs {
    /// Flags override the configured defaults
    pub fn to_request(&self, defaults: &FeedbackLoopConfig) -> Result<FeedbackLoopRequest> {
        let mut request = defaults.request_for(self.pattern.clone());
        request.feedback_type = self.feedback_type;
        if let Some(window) = self.window {
            let window = chrono::Duration::from_std(window).context("--window is too large")?;
            request.time_window = TimeWindow::last(window);
        }
        if let Some(threshold) = self.auto_apply_threshold {
            request.auto_apply_threshold = threshold;
        }
        if let Some(size) = self.min_sample_size {
            request.min_sample_size = size;
        }
        if let Some(level) = self.significance_level {
            request.significance_level = level;
        }
        if self.no_ab_testing {
            request.enable_ab_testing = false;
        }
        Ok(request)
    }
}

pub async fn handle_command(command: LoopCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        LoopCommand::Run(args) => run(args, config_override).await,
    }
}

async fn run(args: RunArgs, config_override: Option<PathBuf>) -> Result<()> {
    let runtime = LineageRuntime::new(config_override, Some(args.traces.as_path())).await?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling feedback loop");
            on_signal.cancel();
        }
    });

    let report = run_with(&runtime, &args, cancel).await?;

    print_json(&report)?;

    if !report.success {
        let reason = report
            .failure
            .as_ref()
            .map(|f| f.message.clone())
            .unwrap_or_else(|| "unknown failure".to_string());
        eprintln!(
            "{}",
            format!("✗ Feedback loop ended in {:?}: {}", report.final_state, reason).red()
        );
        std::process::exit(1);
    }
    Ok(())
}

async fn run_with(
    runtime: &LineageRuntime,
    args: &RunArgs,
    cancel: CancellationToken,
) -> Result<FeedbackLoopReport> {
    let request = args.to_request(&runtime.config.spec.feedback_loop)?;

    match runtime.tracking.query_ancestry(&request.pattern_id).await {
        Ok(_) => {}
        Err(LineageError::NotFound(_)) => bail!(
            "Pattern '{}' is not tracked. Record it with `lineage track create {}` first; \
             the in_memory storage backend starts empty on every invocation.",
            request.pattern_id,
            request.pattern_id
        ),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to look up '{}'", request.pattern_id))
        }
    }

    runtime
        .tracking
        .run_feedback_loop(request, cancel)
        .await
        .context("Feedback loop failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use lineage_orchestrator::domain::lineage_config::LineageConfigManifest;

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: LoopCommand,
    }

    #[test]
    fn test_flags_override_configured_defaults() {
        let cli = TestCli::try_parse_from([
            "lineage",
            "run",
            "--traces",
            "traces.json",
            "--pattern",
            "buffered_writer",
            "--feedback-type",
            "performance",
            "--window",
            "2days",
            "--min-sample-size",
            "50",
            "--no-ab-testing",
        ])
        .unwrap();
        let LoopCommand::Run(args) = cli.command;

        let defaults = FeedbackLoopConfig::default();
        let request = args.to_request(&defaults).unwrap();

        assert_eq!(request.pattern_id, "buffered_writer");
        assert_eq!(request.feedback_type, FeedbackType::Performance);
        assert_eq!(request.min_sample_size, 50);
        assert!(!request.enable_ab_testing);
        assert_eq!(request.significance_level, defaults.significance_level);
        assert_eq!(
            request.time_window.end - request.time_window.start,
            chrono::Duration::days(2)
        );
    }

    #[tokio::test]
    async fn test_unknown_pattern_fails_before_the_loop_runs() {
        let runtime = LineageRuntime::from_config(LineageConfigManifest::default(), None)
            .await
            .unwrap();
        let cli = TestCli::try_parse_from([
            "lineage",
            "run",
            "--traces",
            "traces.json",
            "--pattern",
            "never_created",
        ])
        .unwrap();
        let LoopCommand::Run(args) = cli.command;

        let err = run_with(&runtime, &args, CancellationToken::new())
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("'never_created' is not tracked"), "{}", message);
        assert!(message.contains("lineage track create never_created"));
    }
}
