//! Terminal output formatting.

use colored::{ColoredString, Colorize};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use strata_codegen::catalog::CatalogSource;
use strata_codegen::scaffold::FailureRecord;
use strata_codegen::{
    ArtifactOutcome, CollisionPolicy, GeneratedArtifact, ScaffoldOutcome, ScaffoldReport, TemplateDescriptor,
};
use strata_core::naming::NamingVariantSet;
use strata_quality::{RunNote, RunOutcome, RunSummary};

/// Print the result of `scaffold-feature`.
pub fn print_scaffold_report(report: &ScaffoldReport, dry_run: bool) {
    let title = if dry_run { "Planned" } else { "Scaffolded" };
    println!("{} {}", title.bold(), report.feature.cyan().bold());
    if report.restarts > 0 {
        println!("  {}", format!("restarted {} time(s) after edits", report.restarts).dimmed());
    }
    println!();

    print_artifacts(&report.artifacts, dry_run);
    print_failures(&report.failures);
    if !report.skipped_layers.is_empty() {
        let layers: Vec<&str> = report.skipped_layers.iter().map(|l| l.as_str()).collect();
        println!("{} skipped layers: {}", "!".yellow(), layers.join(", "));
    }

    let written = report.written().count();
    let skipped = report.skipped().count();
    let line = format!(
        "{} written · {} skipped · {} failed",
        written,
        skipped,
        report.failures.len()
    );
    println!();
    match report.outcome {
        ScaffoldOutcome::Completed if report.has_warnings() => println!("{} {}", "!".yellow().bold(), line),
        ScaffoldOutcome::Completed => println!("{} {}", "✓".green().bold(), line),
        ScaffoldOutcome::Aborted => println!("{} aborted: {}", "✗".red().bold(), line),
        ScaffoldOutcome::Cancelled => println!("{} cancelled: {}", "✗".red().bold(), line),
    }
}

/// Print the result of `run-quality`.
pub fn print_run_summary(summary: &RunSummary) {
    println!(
        "{} {} {}",
        "Quality run".bold(),
        summary.target.cyan().bold(),
        format!("({})", &summary.run_id.to_string()[..8]).dimmed()
    );
    let phases: Vec<&str> = summary.phases.iter().map(|p| p.as_str()).collect();
    println!("  {} {}", "Phases:".dimmed(), phases.join(" → "));
    println!(
        "  {} {}/{}",
        "Iterations:".dimmed(),
        summary.iterations,
        summary.max_iterations
    );
    println!();

    if !summary.review_warnings.is_empty() {
        println!("{}", "Review".bold());
        for finding in &summary.review_warnings {
            println!("  {} {}", "!".yellow(), finding);
        }
        println!();
    }

    match &summary.last_audit {
        Some(audit) => {
            println!(
                "{} {:.1}% overall, threshold {}%, {} of {} component(s) under",
                "Coverage".bold(),
                audit.overall_percent,
                audit.threshold,
                audit.under_covered.len(),
                audit.audited
            );
            let width = term_width().saturating_sub(6).max(20);
            for component in &audit.under_covered {
                println!("  {} {}", "✗".red(), truncate_visual(component, width));
            }
        }
        None => println!("{}", "No coverage audit was completed.".dimmed()),
    }
    println!();

    if !summary.artifacts.is_empty() {
        println!("{}", "Generated tests".bold());
        print_artifacts(&summary.artifacts, summary.has_note(|n| matches!(n, RunNote::DryRun { .. })));
        println!();
    }
    print_failures(&summary.failures);

    for note in &summary.notes {
        println!("{} {}", "note:".yellow(), describe_note(note));
    }
    for decision in &summary.decisions {
        let note = decision.note.as_deref().map(|n| format!(" ({n})")).unwrap_or_default();
        println!("  {} {}: {}{}", "↺".dimmed(), decision.point, decision.decision, note.dimmed());
    }
    if let Some(error) = &summary.last_error {
        println!("{} {}", "error:".red(), error);
    }

    println!();
    println!(
        "{} {} in {:.1}s",
        outcome_marker(summary.outcome),
        summary.outcome.as_str(),
        summary.duration().num_milliseconds() as f64 / 1000.0
    );
}

/// Print templates grouped by layer.
pub fn print_catalog(source: &CatalogSource, templates: &[&TemplateDescriptor]) {
    if templates.is_empty() {
        println!("{}", "No templates found.".dimmed());
        return;
    }
    println!("{} {}", "Template catalog".bold(), format!("({source})").dimmed());

    let id_width = templates
        .iter()
        .map(|t| UnicodeWidthStr::width(t.id.as_str()))
        .max()
        .unwrap_or(0)
        .min(32);
    let path_width = term_width().saturating_sub(id_width + 20).max(24);

    let mut current = None;
    for template in templates {
        if current != Some(template.layer) {
            current = Some(template.layer);
            println!();
            println!("  {} {}", "▸".dimmed(), template.layer.as_str().cyan().bold());
        }
        let when = if template.predicate.is_always() {
            String::new()
        } else {
            format!(" when {}", template.predicate)
        };
        println!(
            "    {} {} {}{}",
            pad_right(&truncate_visual(&template.id, id_width), id_width),
            truncate_visual(&template.path_pattern, path_width),
            collision_label(template.collision),
            when.dimmed()
        );
    }
    println!();
    println!("{} template(s) total", templates.len());
}

/// Print every naming variant of a feature.
pub fn print_names(names: &NamingVariantSet) {
    let rows = [
        ("PascalCase", &names.pascal_singular, &names.pascal_plural),
        ("camelCase", &names.camel_singular, &names.camel_plural),
        ("kebab-case", &names.kebab_singular, &names.kebab_plural),
        ("snake_case", &names.snake_singular, &names.snake_plural),
        ("Title Case", &names.title_singular, &names.title_plural),
    ];
    let width = rows
        .iter()
        .map(|(_, singular, _)| UnicodeWidthStr::width(singular.as_str()))
        .max()
        .unwrap_or(0)
        .max("Singular".len());

    println!("{:<12} {} {}", "", pad_right("Singular", width).bold(), "Plural".bold());
    for (label, singular, plural) in rows {
        println!("{:<12} {} {}", label.dimmed(), pad_right(singular, width), plural);
    }
}

fn print_artifacts(artifacts: &[GeneratedArtifact], dry_run: bool) {
    if artifacts.is_empty() {
        println!("{}", "No artifacts.".dimmed());
        return;
    }
    let width = term_width().saturating_sub(14).max(20);
    for artifact in artifacts {
        let path = truncate_visual(&artifact.path.display().to_string(), width);
        match &artifact.outcome {
            ArtifactOutcome::Written if dry_run => println!("  {} {}", "→".dimmed(), path),
            ArtifactOutcome::Written => println!("  {} {}", "✓".green(), path),
            ArtifactOutcome::Merged => println!("  {} {} {}", "+".green(), path, "(merged)".dimmed()),
            ArtifactOutcome::Unchanged => println!("  {} {}", "=".dimmed(), path.dimmed()),
            ArtifactOutcome::Skipped { reason } => {
                println!("  {} {} {}", "-".yellow(), path, format!("({reason})").dimmed())
            }
        }
    }
}

fn print_failures(failures: &[FailureRecord]) {
    for failure in failures {
        println!(
            "  {} {} [{}] {}",
            "✗".red(),
            failure.template_id,
            failure.kind.red(),
            failure.message
        );
    }
}

fn describe_note(note: &RunNote) -> String {
    match note {
        RunNote::IterationCapExceeded { iterations, residual } => format!(
            "iteration cap reached after {} cycle(s); {} component(s) still under threshold",
            iterations,
            residual.len()
        ),
        RunNote::CancelledMidGeneration => "cancelled during test generation; written files were kept".to_string(),
        RunNote::DiscoverySkipped => "target discovery failed and was skipped; the whole report was audited".to_string(),
        RunNote::AuditSkipped => "coverage could not be collected; audit skipped".to_string(),
        RunNote::GenerationSkipped { feature } => format!("test generation for {feature} was skipped"),
        RunNote::DryRun { planned } => format!("dry run; {} file(s) would be written", planned.len()),
    }
}

fn outcome_marker(outcome: RunOutcome) -> ColoredString {
    match outcome {
        RunOutcome::Passed => "✓".green().bold(),
        RunOutcome::PassedWithGaps => "!".yellow().bold(),
        RunOutcome::Failed => "✗".red().bold(),
        RunOutcome::Cancelled => "✗".red(),
    }
}

fn collision_label(policy: CollisionPolicy) -> ColoredString {
    match policy {
        CollisionPolicy::Skip => "[skip]".yellow(),
        CollisionPolicy::MergeGuarded => "[merge]".magenta(),
        CollisionPolicy::Overwrite => "[overwrite]".dimmed(),
    }
}

/// Terminal columns, 80 when stdout is not a terminal.
fn term_width() -> usize {
    match terminal_size::terminal_size() {
        Some((terminal_size::Width(w), _)) => usize::from(w),
        None => 80,
    }
}

/// Right-pad to `width` display columns.
fn pad_right(s: &str, width: usize) -> String {
    let pad = width.saturating_sub(UnicodeWidthStr::width(s));
    format!("{s}{}", " ".repeat(pad))
}

/// Shorten to at most `max_width` display columns, ending in `..`.
fn truncate_visual(s: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    if max_width <= 3 {
        return ".".repeat(max_width);
    }
    let budget = max_width - 2;
    let mut used = 0;
    let mut out: String = s
        .chars()
        .take_while(|&ch| {
            used += UnicodeWidthChar::width(ch).unwrap_or(0);
            used <= budget
        })
        .collect();
    out.push_str("..");
    out
}
