//! `scaffold-feature`: emit every layer of one feature.

use anyhow::{Context, Result};
use clap::Args;

use strata_codegen::fs::{DryRunFileSystem, FileSystem, LocalFileSystem};
use strata_codegen::{ScaffoldOutcome, ScaffoldReport, Scaffolder, TemplateCatalog};
use strata_core::spec::parser::split_list;
use strata_core::spec::{RawFeatureRequest, SpecResolver};

use super::Session;
use crate::output;

#[derive(Args)]
pub struct ScaffoldArgs {
    /// Feature base name, e.g. Invoice or "order item"
    #[arg(long)]
    pub name: String,

    /// Comma-separated properties, each `name[:kind][?][=default]`
    #[arg(long, default_value = "")]
    pub properties: String,

    /// Comma-separated operations: create, read, update, delete, search, crud, all
    #[arg(long, default_value = "crud")]
    pub operations: String,

    /// Feature option as `key=value`; a bare key means true (repeatable)
    #[arg(long = "option", value_name = "KEY=VALUE")]
    pub options: Vec<String>,

    /// Show what would be written without touching any file
    #[arg(long)]
    pub dry_run: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl ScaffoldArgs {
    fn request(&self) -> RawFeatureRequest {
        RawFeatureRequest {
            name: self.name.clone(),
            properties: split_list(&self.properties),
            operations: split_list(&self.operations),
            options: self.options.clone(),
        }
    }
}

pub fn execute(args: ScaffoldArgs, session: &Session) -> Result<u8> {
    let catalog = TemplateCatalog::load(&session.config, &session.project_dir)
        .context("Failed to load the template catalog")?;
    let resolver = SpecResolver::from_config(&session.config);

    let local = LocalFileSystem::new(&session.project_dir);
    let dry = DryRunFileSystem::new(&local);
    let fs: &dyn FileSystem = if args.dry_run { &dry } else { &local };

    let mut recovery = session.recovery();
    let report = Scaffolder::new(&catalog, &resolver, fs)
        .with_tie_break(session.config.catalog.multiple_markers)
        .with_cancel(session.cancel.clone())
        .run(&args.request(), &mut recovery)
        .with_context(|| format!("Cannot scaffold feature '{}'", args.name))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        output::print_scaffold_report(&report, args.dry_run);
    }
    Ok(exit_code(&report))
}

fn exit_code(report: &ScaffoldReport) -> u8 {
    match report.outcome {
        ScaffoldOutcome::Completed if report.has_warnings() => 1,
        ScaffoldOutcome::Completed => 0,
        ScaffoldOutcome::Aborted => 2,
        ScaffoldOutcome::Cancelled => 3,
    }
}
