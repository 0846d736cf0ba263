//! CLI command definitions and handlers.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;

use strata_core::cancel::{cancel_pair, CancelSignal};
use strata_core::recovery::RecoveryController;
use strata_core::StrataConfig;

use crate::prompt::PromptPolicy;

pub mod catalog;
pub mod names;
pub mod quality;
pub mod scaffold;

/// Strata - layered feature scaffolding with a coverage-gated quality loop
#[derive(Parser)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to project directory (defaults to current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Also write logs (without colors) to this file
    #[arg(long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Never prompt; take the configured recovery decision on failures
    #[arg(long, global = true, env = "STRATA_NON_INTERACTIVE")]
    pub non_interactive: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate every layer of a feature from a short description
    ScaffoldFeature(scaffold::ScaffoldArgs),

    /// Audit coverage and generate tests until the threshold is met
    RunQuality(quality::QualityArgs),

    /// Inspect the template catalog
    #[command(subcommand)]
    Catalog(catalog::CatalogCommands),

    /// Show the naming variants derived from a feature name
    Names(names::NamesArgs),
}

/// What every command gets: project location, loaded configuration and
/// the run-wide cancellation signal.
pub struct Session {
    pub project_dir: PathBuf,
    pub config: StrataConfig,
    pub cancel: CancelSignal,
    interactive: bool,
}

impl Session {
    /// Recovery controller for this session: a terminal prompt when one is
    /// available, the configured default otherwise.
    pub fn recovery(&self) -> RecoveryController {
        if self.interactive {
            RecoveryController::new(Box::new(PromptPolicy), self.config.recovery.max_retries)
        } else {
            tracing::debug!(
                "Non-interactive recovery: default decision is {}",
                self.config.recovery.default
            );
            RecoveryController::headless(&self.config.recovery)
        }
    }
}

impl Cli {
    /// Run the selected command and return the process exit code.
    pub async fn execute(self) -> Result<u8> {
        let project_dir = match self.project {
            Some(dir) => dir,
            None => std::env::current_dir().context("Cannot determine the current directory")?,
        };

        let config = StrataConfig::load(&project_dir).context("Invalid configuration")?;
        let session = Session {
            project_dir,
            config,
            cancel: cancel_on_ctrl_c(),
            interactive: !self.non_interactive && std::io::stdin().is_terminal(),
        };

        match self.command {
            Commands::ScaffoldFeature(args) => scaffold::execute(args, &session),
            Commands::RunQuality(args) => quality::execute(args, &session).await,
            Commands::Catalog(cmd) => catalog::execute(cmd, &session),
            Commands::Names(args) => names::execute(&args, &session),
        }
    }
}

/// Trip the returned signal on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancelSignal {
    let (handle, signal) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing the current step and stopping");
            handle.cancel();
        }
    });
    signal
}
