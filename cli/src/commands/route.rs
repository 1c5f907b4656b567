// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Route a query and print the coordination plan

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use conductor_core::domain::confidence::ConfidenceBand;
use conductor_core::domain::plan::CoordinationPlan;
use conductor_core::domain::query::Query;
use conductor_core::domain::config::RouterConfigManifest;
use conductor_swarm::DispatchReport;

use crate::embedded::EmbeddedRouter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportedOutcome {
    Success,
    Failure,
}

#[derive(Args)]
pub struct RouteArgs {
    /// Free-form problem description
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Query attribute as key=value (repeatable)
    #[arg(long = "attr", value_name = "KEY=VALUE", value_parser = parse_attribute)]
    pub attributes: Vec<(String, String)>,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,

    /// Dispatch the plan to loopback handlers and record the outcome
    #[arg(long, conflicts_with = "report")]
    pub simulate: bool,

    /// Record an outcome for the plan after routing
    #[arg(long, value_enum, value_name = "OUTCOME")]
    pub report: Option<ReportedOutcome>,

    /// Latency recorded with --report
    #[arg(long, default_value_t = 0, requires = "report")]
    pub latency_ms: u64,
}

pub async fn handle_command(args: RouteArgs, config_path: Option<PathBuf>) -> Result<()> {
    let manifest = RouterConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
    let router = EmbeddedRouter::from_manifest(manifest, args.simulate).await?;

    let query = Query::new(args.query.clone()).with_attributes(args.attributes.iter().cloned().collect());
    let outcome = run(&router, &query, &args).await;
    router.shutdown().await?;
    let (plan, report) = outcome?;

    if args.json {
        let value = match &report {
            Some(report) => serde_json::json!({ "plan": plan, "dispatch": report }),
            None => serde_json::to_value(&plan)?,
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print_plan(&plan);
        if let Some(report) = &report {
            print_report(report);
        }
    }
    Ok(())
}

async fn run(
    router: &EmbeddedRouter,
    query: &Query,
    args: &RouteArgs,
) -> Result<(CoordinationPlan, Option<DispatchReport>)> {
    if args.simulate {
        let (plan, report) = router
            .dispatcher()
            .route_and_dispatch(query, &CancellationToken::new())
            .await
            .context("Dispatch failed")?;
        return Ok((plan, Some(report)));
    }

    let plan = router.engine().route(query).await.context("Routing failed")?;
    if let Some(outcome) = args.report {
        router
            .engine()
            .report_outcome(&plan.signature, plan.id, outcome == ReportedOutcome::Success, args.latency_ms)
            .await
            .context("Failed to record outcome")?;
    }
    Ok((plan, None))
}

fn parse_attribute(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.trim().to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

fn band_label(band: ConfidenceBand) -> colored::ColoredString {
    let label = band.to_string();
    match band {
        ConfidenceBand::High => label.green(),
        ConfidenceBand::Medium => label.yellow(),
        _ => label.red(),
    }
}

fn print_plan(plan: &CoordinationPlan) {
    println!("{} {}", "Plan".bold(), plan.id.to_string().dimmed());
    println!("  Strategy:   {}", plan.strategy.to_string().bold());
    println!("  Rule:       {}", plan.rule.as_str());
    println!(
        "  Confidence: {:.3} ({})",
        plan.aggregate_confidence,
        band_label(plan.band)
    );
    println!("  Signature:  {}", plan.signature.short());
    println!();

    println!("{}", "Handler groups:".bold());
    for (index, group) in plan.groups.iter().enumerate() {
        let members: Vec<&str> = group.iter().map(|h| h.as_str()).collect();
        println!("  {}. {}", index + 1, members.join(", "));
    }
    if !plan.fallbacks.is_empty() {
        println!("{}", "Fallbacks:".bold());
        for (handler, fallback) in &plan.fallbacks {
            println!("  {} → {}", handler, fallback);
        }
    }

    if !plan.conflicts.is_empty() {
        println!("{}", "Conflicts:".bold());
        for conflict in &plan.conflicts {
            println!(
                "  {} [{}] severity {:.3}: {}",
                conflict.pair, conflict.category, conflict.severity, conflict.description
            );
        }
    }

    if !plan.advisories.is_empty() {
        println!("{}", "Advisories:".bold());
        for advisory in &plan.advisories {
            println!("  {}", advisory.kind().yellow());
        }
    }

    println!(
        "Estimated cost: {} invocation(s), ~{}ms critical path",
        plan.estimated_cost.handler_invocations, plan.estimated_cost.critical_path_ms
    );
    if plan.requires_confirmation {
        println!("{}", "⚠ Low confidence: confirm before dispatching".yellow());
    }
}

fn print_report(report: &DispatchReport) {
    println!();
    println!("{}", "Dispatch:".bold());
    for result in &report.results {
        let status = if result.succeeded() {
            result.status.as_str().green()
        } else {
            result.status.as_str().red()
        };
        let served = if result.used_fallback() {
            format!(" (via {})", result.served_by)
        } else {
            String::new()
        };
        println!("  {}{}: {} in {}ms", result.handler, served, status, result.latency_ms);
    }
    let verdict = if report.success { "✓ succeeded".green() } else { "✗ failed".red() };
    println!("  {} in {}ms, outcome {:?}", verdict, report.latency_ms, report.feedback);
}
