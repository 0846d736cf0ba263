//! Strata CLI - layered feature scaffolding and a coverage-gated quality loop.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::Path;
use std::process::ExitCode;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod output;
mod prompt;

use commands::Cli;

const DEFAULT_FILTER: &str = "strata=info,strata_core=info,strata_codegen=info,strata_quality=info";
const VERBOSE_FILTER: &str = "strata=debug,strata_core=debug,strata_codegen=debug,strata_quality=debug";

/// Initialize tracing with optional file logging.
///
/// Console output goes to stderr so `--json` output on stdout stays parseable.
/// The returned guard flushes the file writer and must live until exit.
fn init_tracing(verbose: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let default = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default.into());
    let console = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let Some(path) = log_file else {
        tracing_subscriber::registry().with(env_filter).with(console).init();
        return Ok(None);
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("Log path {} has no file name", path.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .init();
    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match init_tracing(cli.verbose, cli.log.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            return ExitCode::from(2);
        }
    };

    match cli.execute().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(2)
        }
    }
}
