//! Interactive recovery prompt.

use colored::Colorize;
use dialoguer::{Input, Select};

use strata_core::recovery::{Failure, RecoveryDecision, RecoveryDecisionKind, RecoveryPolicy};
use strata_core::spec::parser::split_list;
use strata_core::spec::RawFeatureRequest;

/// Asks on the terminal what to do about each failure. A broken prompt
/// (closed stdin, no terminal) counts as Abort.
pub struct PromptPolicy;

impl RecoveryPolicy for PromptPolicy {
    fn decide(&mut self, failure: &Failure) -> RecoveryDecision {
        match ask(failure) {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!("Recovery prompt failed, aborting: {}", e);
                RecoveryDecision::Abort
            }
        }
    }
}

fn ask(failure: &Failure) -> dialoguer::Result<RecoveryDecision> {
    eprintln!();
    eprintln!("{} {}", "✗".red().bold(), format!("Failure during {}", failure.point).bold());
    for message in &failure.messages {
        eprintln!("  {}", message);
    }

    let choices = offered(failure);
    let labels: Vec<&str> = choices.iter().map(|k| label(*k)).collect();
    let index = Select::new()
        .with_prompt("How do you want to proceed?")
        .items(&labels)
        .default(0)
        .interact()?;

    Ok(match choices[index] {
        RecoveryDecisionKind::Retry => RecoveryDecision::Retry,
        RecoveryDecisionKind::Skip => RecoveryDecision::Skip,
        RecoveryDecisionKind::Abort => RecoveryDecision::Abort,
        RecoveryDecisionKind::Modify => {
            RecoveryDecision::Modify(edit(failure.request.clone().unwrap_or_default())?)
        }
    })
}

/// Options for this failure; Modify only when there is a request to edit.
fn offered(failure: &Failure) -> Vec<RecoveryDecisionKind> {
    failure
        .point
        .options()
        .iter()
        .copied()
        .filter(|k| *k != RecoveryDecisionKind::Modify || failure.request.is_some())
        .collect()
}

fn label(kind: RecoveryDecisionKind) -> &'static str {
    match kind {
        RecoveryDecisionKind::Retry => "Retry",
        RecoveryDecisionKind::Skip => "Skip and continue",
        RecoveryDecisionKind::Modify => "Edit the feature and start over",
        RecoveryDecisionKind::Abort => "Abort",
    }
}

fn edit(current: RawFeatureRequest) -> dialoguer::Result<RawFeatureRequest> {
    let name: String = Input::new()
        .with_prompt("Feature name")
        .with_initial_text(current.name.clone())
        .interact_text()?;
    let properties = edit_list("Properties", &current.properties)?;
    let operations = edit_list("Operations", &current.operations)?;
    let options = edit_list("Options", &current.options)?;

    Ok(RawFeatureRequest {
        name,
        properties,
        operations,
        options,
    })
}

fn edit_list(prompt: &str, current: &[String]) -> dialoguer::Result<Vec<String>> {
    let raw: String = Input::new()
        .with_prompt(format!("{prompt} (comma-separated)"))
        .with_initial_text(current.join(", "))
        .allow_empty(true)
        .interact_text()?;
    Ok(split_list(&raw))
}
