// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Pattern store audit commands
//!
//! Commands: export, import, inspect

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use conductor_core::domain::config::{RouterConfigManifest, StoreBackend};
use conductor_core::domain::query::Query;
use conductor_core::infrastructure::pattern_store::PatternStore;
use conductor_cortex::{Pattern, PatternTier};

use crate::embedded::EmbeddedRouter;

#[derive(Subcommand)]
pub enum PatternsCommand {
    /// Export every pattern, deprecated ones included, as JSON
    Export {
        /// Output file (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Rebuild the pattern log from an audit export
    Import {
        /// Export produced by `conductor patterns export`
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Show the learned pattern for a query
    Inspect {
        #[arg(value_name = "QUERY")]
        query: String,
    },
}

pub async fn handle_command(command: PatternsCommand, config_path: Option<PathBuf>) -> Result<()> {
    match command {
        PatternsCommand::Export { output } => export(config_path, output).await,
        PatternsCommand::Import { file } => import(config_path, file).await,
        PatternsCommand::Inspect { query } => inspect(config_path, query).await,
    }
}

async fn export(config_path: Option<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    let router = EmbeddedRouter::new(config_path).await?;
    let patterns = router.learning().export_patterns().await;
    router.shutdown().await?;
    let patterns = patterns.context("Failed to export patterns")?;

    let json = serde_json::to_string_pretty(&patterns)?;
    match output {
        Some(path) => {
            std::fs::write(&path, json).with_context(|| format!("Failed to write export to {:?}", path))?;
            eprintln!(
                "{}",
                format!("✓ Exported {} pattern(s) to {}", patterns.len(), path.display()).green()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

async fn import(config_path: Option<PathBuf>, file: PathBuf) -> Result<()> {
    let manifest = RouterConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
    let learning = &manifest.spec.learning;
    if learning.backend != StoreBackend::File {
        anyhow::bail!("Import requires the file backend (spec.learning.backend: file)");
    }

    let store = PatternStore::rebuild(learning, &file)
        .await
        .with_context(|| format!("Failed to rebuild pattern log from {:?}", file))?;
    let count = store.repository().count().await?;

    println!(
        "{}",
        format!(
            "✓ Rebuilt {} with {} pattern(s)",
            learning.resolved_path().display(),
            count
        )
        .green()
    );
    Ok(())
}

async fn inspect(config_path: Option<PathBuf>, text: String) -> Result<()> {
    let router = EmbeddedRouter::new(config_path).await?;
    let query = Query::new(text);
    let pattern = router.learning().audit_lookup(&query.signature).await;
    router.shutdown().await?;

    println!("{} {}", "Signature:".bold(), query.signature.short());
    match pattern.context("Pattern lookup failed")? {
        Some(pattern) => print_pattern(&pattern),
        None => println!("{}", "No pattern learned for this query".dimmed()),
    }
    Ok(())
}

fn print_pattern(pattern: &Pattern) {
    let tier = match pattern.tier {
        PatternTier::HighConfidence | PatternTier::Validated => pattern.tier.as_str().green(),
        PatternTier::Candidate => pattern.tier.as_str().yellow(),
        PatternTier::Deprecated => pattern.tier.as_str().red(),
    };
    println!("  Tier:         {}", tier);
    println!("  Strategy:     {} ({})", pattern.plan.strategy, pattern.plan.rule);
    println!("  Handlers:     {}", pattern.plan.handlers().join(", "));
    println!(
        "  Success rate: {:.3} over {} observation(s), {} recent",
        pattern.success_rate,
        pattern.observations,
        pattern.recent_outcomes.len()
    );
    println!("  Confidence:   {:.3}", pattern.confidence);
    println!("  Mean latency: {:.0}ms", pattern.mean_latency_ms);
    println!("  Last used:    {}", pattern.last_used.to_rfc3339());
}
