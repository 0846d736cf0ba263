//! `run-quality`: the Discovery → Review → Audit → Generate loop.

use anyhow::{Context, Result};
use clap::Args;
use std::time::Duration;

use strata_codegen::fs::LocalFileSystem;
use strata_codegen::TemplateCatalog;
use strata_core::spec::SpecResolver;
use strata_quality::{Collaborators, CommandRunner, GitCli, QualityOrchestrator, Target};

use super::Session;
use crate::output;

#[derive(Args)]
pub struct QualityArgs {
    /// uncommitted, last-change, feature:<name> or files:<a,b,...>
    #[arg(long, default_value = "uncommitted")]
    pub target: Target,

    /// Coverage percentage every component must reach
    #[arg(long, value_parser = parse_percent)]
    pub threshold: Option<f64>,

    /// Maximum Generate cycles before reporting the remaining gaps
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Plan one round of test generation without writing it
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_percent(raw: &str) -> Result<f64, String> {
    let value: f64 = raw.parse().map_err(|_| format!("'{raw}' is not a number"))?;
    if (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is outside 0..=100"))
    }
}

pub async fn execute(args: QualityArgs, session: &Session) -> Result<u8> {
    let config = &session.config;
    let catalog = TemplateCatalog::load(config, &session.project_dir)
        .context("Failed to load the template catalog")?;
    let resolver = SpecResolver::from_config(config);

    let fs = LocalFileSystem::new(&session.project_dir);
    let vcs = GitCli::new(&session.project_dir, Duration::from_secs(config.quality.timeout_secs))
        .with_cancel(session.cancel.clone());
    let runner = CommandRunner::from_config(&config.quality, &session.project_dir);

    let mut orchestrator = QualityOrchestrator::new(
        config,
        &resolver,
        &catalog,
        Collaborators {
            fs: &fs,
            vcs: &vcs,
            runner: &runner,
        },
    )
    .context("Invalid review checklist")?
    .dry_run(args.dry_run)
    .with_cancel(session.cancel.clone());
    if let Some(threshold) = args.threshold {
        orchestrator = orchestrator.with_threshold(threshold);
    }
    if let Some(max) = args.max_iterations {
        orchestrator = orchestrator.with_max_iterations(max);
    }

    let mut recovery = session.recovery();
    let summary = orchestrator.run(&args.target, &mut recovery).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        output::print_run_summary(&summary);
    }
    Ok(summary.exit_code())
}
