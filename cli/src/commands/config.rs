// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use conductor_core::domain::config::RouterConfigManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective manifest as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate a configuration file populated with the defaults
    Generate {
        /// Output path (default: ./conductor-config.yaml)
        #[arg(short, long, default_value = "./conductor-config.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, force } => generate(output, force).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = RouterConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. CONDUCTOR_CONFIG_PATH: {}",
            std::env::var("CONDUCTOR_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./conductor-config.yaml");
        println!("  4. ~/.conductor/config.yaml");
        println!("  5. /etc/conductor/config.yaml");
        println!();
    }

    if as_yaml {
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    println!("{}", "Confidence:".bold());
    println!(
        "  Bands: high ≥ {}, medium ≥ {}, confirmation below {}",
        spec.confidence.high, spec.confidence.medium, spec.confidence.fallback
    );
    println!("  Calibration buckets: {}", spec.confidence.bucket_count);
    println!("  Domain floor: {}", spec.analyzer.floor);
    println!();

    println!("{}", "Strategy:".bold());
    println!("  Dominance gap: {}", spec.strategy.dominance_gap);
    println!("  Max parallel domains: {}", spec.strategy.max_parallel_domains);
    println!(
        "  Coordinator: {}",
        spec.strategy.coordinator_handler.as_deref().unwrap_or("(none)")
    );
    println!("  Escalation severity: {}", spec.conflicts.escalation_severity);
    println!();

    println!("{}", "Dispatch:".bold());
    println!("  Max concurrent handlers: {}", spec.dispatch.max_concurrent_handlers);
    println!(
        "  Default timeout: {}ms (retry once: {})",
        spec.dispatch.default_timeout.as_millis(),
        spec.dispatch.retry_once
    );
    println!();

    println!("{}", "Learning:".bold());
    println!("  Backend: {:?}", spec.learning.backend);
    if let Some(path) = &spec.learning.path {
        println!("  Path: {}", path.display());
    }
    println!("  Lookup budget: {}ms", spec.learning.lookup_budget.as_millis());
    println!();

    println!("{}", "Handlers:".bold());
    for handler in &spec.registry.handlers {
        println!(
            "  {} ({}), {} trigger term(s)",
            handler.id.as_str().bold(),
            handler.capability,
            handler.triggers.len()
        );
    }
    println!(
        "  Default: {}",
        spec.registry.default_handler.as_deref().unwrap_or("(none)")
    );

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = RouterConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", output.display());
    }

    RouterConfigManifest::default()
        .to_yaml_file(&output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
