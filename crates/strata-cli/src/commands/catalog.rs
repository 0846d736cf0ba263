//! Template catalog inspection commands.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::collections::BTreeSet;

use strata_codegen::TemplateCatalog;
use strata_core::config::{OptionKind, OptionSchema};
use strata_core::spec::{FeatureSpec, RawFeatureRequest, SpecResolver};
use strata_core::Layer;

use super::Session;
use crate::output;

#[derive(Subcommand)]
pub enum CatalogCommands {
    /// List templates grouped by layer
    List {
        /// Only this layer
        #[arg(long)]
        layer: Option<String>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load the catalog and render every template against sample features
    Check,
}

pub fn execute(cmd: CatalogCommands, session: &Session) -> Result<u8> {
    let catalog = TemplateCatalog::load(&session.config, &session.project_dir)
        .context("Failed to load the template catalog")?;

    match cmd {
        CatalogCommands::List { layer, json } => cmd_list(&catalog, layer.as_deref(), json),
        CatalogCommands::Check => cmd_check(&catalog, session),
    }
}

fn cmd_list(catalog: &TemplateCatalog, layer: Option<&str>, json: bool) -> Result<u8> {
    let layer = layer
        .map(|raw| Layer::from_str(raw).with_context(|| format!("Unknown layer '{raw}'")))
        .transpose()?;
    let templates: Vec<_> = catalog
        .list()
        .iter()
        .filter(|t| layer.map_or(true, |l| t.layer == l))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&templates)?);
    } else {
        output::print_catalog(catalog.source(), &templates);
    }
    Ok(0)
}

fn cmd_check(catalog: &TemplateCatalog, session: &Session) -> Result<u8> {
    let resolver = SpecResolver::from_config(&session.config);
    let mut problems = BTreeSet::new();
    let mut rendered = BTreeSet::new();

    for request in sample_requests(&session.config.options) {
        let spec = resolver
            .resolve(&request)
            .context("Sample feature does not resolve against the option schema")?;
        for problem in render_all(catalog, &spec, &mut rendered) {
            problems.insert(problem);
        }
    }

    let unreached: Vec<&str> = catalog
        .list()
        .iter()
        .map(|t| t.id.as_str())
        .filter(|id| !rendered.contains(*id))
        .collect();

    println!(
        "{} {} templates across {} layers ({})",
        "Catalog".bold(),
        catalog.list().len(),
        catalog.layers().len(),
        catalog.source()
    );
    for id in &unreached {
        println!("  {} {} is never selected by the sample features", "!".yellow(), id);
    }

    if problems.is_empty() {
        println!("{} Every selected template renders", "✓".green().bold());
        return Ok(if unreached.is_empty() { 0 } else { 1 });
    }
    for problem in &problems {
        println!("  {} {}", "✗".red(), problem);
    }
    println!("{} {} template problem(s)", "✗".red().bold(), problems.len());
    Ok(2)
}

/// Render every template selected for `spec`, recording the ids that were
/// selected and returning the problems found.
fn render_all(catalog: &TemplateCatalog, spec: &FeatureSpec, rendered: &mut BTreeSet<String>) -> Vec<String> {
    let context = catalog.context(spec);
    let mut problems = Vec::new();
    for layer in catalog.layers() {
        for template in catalog.resolve(layer, spec) {
            rendered.insert(template.id.clone());
            if let Err(e) = catalog.render_path(template, &context) {
                problems.push(format!("{} (path): {}", template.id, e));
            }
            if let Err(e) = catalog.render_body(template, &context) {
                problems.push(format!("{} (body): {}", template.id, e));
            }
        }
    }
    problems
}

/// A bare feature, then one feature per choice position with every boolean
/// option switched on, so option-gated templates are exercised too.
fn sample_requests(schema: &OptionSchema) -> Vec<RawFeatureRequest> {
    let base = RawFeatureRequest {
        name: "Sample Item".to_string(),
        properties: vec![
            "title:string".to_string(),
            "notes:text?".to_string(),
            "quantity:integer=1".to_string(),
            "price:decimal".to_string(),
            "active:boolean".to_string(),
            "dueOn:date?".to_string(),
        ],
        operations: vec!["all".to_string()],
        options: Vec::new(),
    };

    let widest = schema
        .0
        .values()
        .map(|kind| match kind {
            OptionKind::Bool => 1,
            OptionKind::Choice(choices) => choices.len(),
        })
        .max()
        .unwrap_or(0);

    let mut requests = vec![base.clone()];
    for position in 0..widest {
        let options = schema
            .0
            .iter()
            .filter_map(|(key, kind)| match kind {
                OptionKind::Bool => Some(format!("{key}=true")),
                OptionKind::Choice(choices) => choices
                    .get(position)
                    .or_else(|| choices.last())
                    .map(|choice| format!("{key}={choice}")),
            })
            .collect();
        requests.push(RawFeatureRequest { options, ..base.clone() });
    }
    requests
}
