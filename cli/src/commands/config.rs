// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use lineage_orchestrator::domain::lineage_config::LineageConfigManifest;

pub const MINIMAL_TEMPLATE: &str = include_str!("../../templates/config-minimal.yaml");
pub const EXAMPLES_TEMPLATE: &str = include_str!("../../templates/config-with-examples.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective configuration as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./lineage-config.yaml)
        #[arg(short, long, default_value = "./lineage-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = LineageConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. LINEAGE_CONFIG_PATH: {}",
            std::env::var("LINEAGE_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./lineage-config.yaml");
        println!("  4. ~/.lineage/config.yaml");
        println!("  5. /etc/lineage/config.yaml");
        println!();
    }

    if as_yaml {
        print!("{}", config.to_yaml_string()?);
        return Ok(());
    }

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    let fl = &config.spec.feedback_loop;
    println!("{}", "Feedback Loop:".bold());
    println!("  Auto-apply threshold: {}", fl.auto_apply_threshold);
    println!("  Min sample size: {}", fl.min_sample_size);
    println!("  Significance level: {}", fl.significance_level);
    println!("  A/B testing: {}", fl.enable_ab_testing);
    println!("  Bonferroni correction: {}", fl.bonferroni_correction);
    println!("  Min effect size: {}", fl.min_effect_size);
    println!(
        "  Validation timeout: {}",
        humantime::format_duration(fl.validation_timeout)
    );
    println!(
        "  Default window: {}",
        humantime::format_duration(fl.default_time_window)
    );
    println!();

    let analyzer = &config.spec.analyzer;
    println!("{}", "Analyzer:".bold());
    println!("  Baseline fraction: {}", analyzer.baseline_fraction);
    println!("  Performance threshold: {}", analyzer.performance_threshold);
    println!("  Quality threshold: {}", analyzer.quality_threshold);
    println!("  Reliability threshold: {}", analyzer.reliability_threshold);
    println!();

    println!("{}", "Storage:".bold());
    println!("  Backend: {:?}", config.spec.storage.backend);
    if config.spec.storage.database_url.is_some() {
        println!("  Database URL: {}", "(set)".dimmed());
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = LineageConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        EXAMPLES_TEMPLATE
    } else {
        MINIMAL_TEMPLATE
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineage_orchestrator::domain::lineage_config::StorageKind;

    #[test]
    fn test_templates_are_valid() {
        let minimal = LineageConfigManifest::from_yaml_str(MINIMAL_TEMPLATE).unwrap();
        minimal.validate().unwrap();
        assert_eq!(minimal.spec.storage.backend, StorageKind::InMemory);

        let full = LineageConfigManifest::from_yaml_str(EXAMPLES_TEMPLATE).unwrap();
        full.validate().unwrap();
        assert_eq!(full.spec.storage.backend, StorageKind::Postgres);
        assert_eq!(full.spec.feedback_loop.default_time_window.as_secs(), 7 * 24 * 3600);
    }

    #[tokio::test]
    async fn test_generate_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("lineage-config.yaml");

        generate(output.clone(), false).await.unwrap();

        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(written, MINIMAL_TEMPLATE);
    }
}
