//! Build/test runner collaborator producing coverage reports.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use strata_core::cancel::CancelSignal;
use strata_core::config::{QualityConfig, ReportFormat, RunnerConfig};
use strata_core::coverage::parser::parse_report;
use strata_core::coverage::CoverageReport;
use strata_core::{StrataError, StrataResult};

use crate::process::{self, ProcessError, ProcessSpec};
use crate::target::TargetSet;

/// Runs the project's tests and returns their coverage.
#[async_trait]
pub trait BuildRunner: Send + Sync {
    fn name(&self) -> &str;

    async fn coverage(&self, targets: &TargetSet, cancel: &CancelSignal) -> StrataResult<CoverageReport>;
}

/// Where the runner leaves its report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportSource {
    Stdout,
    /// Project-relative file, read after the command exits.
    File(PathBuf),
}

/// A runner backed by an external command.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    name: String,
    program: String,
    args: Vec<String>,
    format: ReportFormat,
    source: ReportSource,
    project_dir: PathBuf,
    timeout: Duration,
    threshold: f64,
}

impl CommandRunner {
    /// Build the runner for the configured provider.
    pub fn from_config(config: &QualityConfig, project_dir: &Path) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        let (name, program, args, format, source) = match &config.runner {
            RunnerConfig::Dotnet { project } => {
                let report = PathBuf::from("coverage/lcov.info");
                let mut args = vec!["test".to_string()];
                args.extend(project.iter().cloned());
                args.extend([
                    "/p:CollectCoverage=true".to_string(),
                    "/p:CoverletOutputFormat=lcov".to_string(),
                    format!("/p:CoverletOutput={}", project_dir.join(&report).display()),
                ]);
                ("dotnet", "dotnet".to_string(), args, ReportFormat::Lcov, ReportSource::File(report))
            }
            RunnerConfig::Cargo { package } => {
                let report = PathBuf::from("target/strata/lcov.info");
                let mut args = vec![
                    "llvm-cov".to_string(),
                    "--lcov".to_string(),
                    "--output-path".to_string(),
                    report.display().to_string(),
                ];
                if let Some(package) = package {
                    args.extend(["-p".to_string(), package.clone()]);
                }
                ("cargo", "cargo".to_string(), args, ReportFormat::Lcov, ReportSource::File(report))
            }
            RunnerConfig::Command {
                program,
                args,
                format,
                report_path,
            } => (
                "command",
                program.clone(),
                args.clone(),
                *format,
                report_path
                    .clone()
                    .map_or(ReportSource::Stdout, ReportSource::File),
            ),
        };

        Self {
            name: name.to_string(),
            program,
            args,
            format,
            source,
            project_dir: project_dir.to_path_buf(),
            timeout,
            threshold: config.threshold,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn source(&self) -> &ReportSource {
        &self.source
    }
}

#[async_trait]
impl BuildRunner for CommandRunner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn coverage(&self, targets: &TargetSet, cancel: &CancelSignal) -> StrataResult<CoverageReport> {
        let mut env = vec![("STRATA_TARGETS".to_string(), targets.labels().join("\n"))];
        if let ReportSource::File(path) = &self.source {
            env.push((
                "STRATA_REPORT".to_string(),
                self.project_dir.join(path).display().to_string(),
            ));
        }

        tracing::info!("Collecting coverage with {} runner", self.name);
        let spec = ProcessSpec {
            program: &self.program,
            args: self.args.clone(),
            cwd: &self.project_dir,
            env,
            timeout: self.timeout,
        };
        let output = process::run(spec, cancel).await.map_err(|e| match e {
            ProcessError::Cancelled => StrataError::Cancelled(format!("{} runner", self.name)),
            other => StrataError::CoverageUnavailable(format!("{}: {}", self.program, other)),
        })?;

        let raw = match &self.source {
            ReportSource::Stdout => {
                if !output.success {
                    return Err(StrataError::CoverageUnavailable(format!(
                        "{} exited with {:?}: {}",
                        self.program,
                        output.code,
                        output.stderr_tail()
                    )));
                }
                output.stdout
            }
            ReportSource::File(path) => {
                let full = self.project_dir.join(path);
                match std::fs::read_to_string(&full) {
                    Ok(raw) => {
                        // Failing tests still produce usable coverage.
                        if !output.success {
                            tracing::warn!(
                                "{} exited with {:?}; using the report it left",
                                self.program,
                                output.code
                            );
                        }
                        raw
                    }
                    Err(e) => {
                        return Err(StrataError::CoverageUnavailable(format!(
                            "no report at {} ({}); {}",
                            full.display(),
                            e,
                            output.stderr_tail()
                        )))
                    }
                }
            }
        };

        parse_report(&raw, self.format, self.threshold)
    }
}
