//! Bounded, cancellable child processes.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

use strata_core::cancel::CancelSignal;

const MAX_CAPTURED_BYTES: usize = 1 << 20;

/// Captured result of a finished process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// Last non-empty stderr line, for error messages.
    pub fn stderr_tail(&self) -> &str {
        self.stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to run: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("cancelled")]
    Cancelled,
}

/// A program invocation.
#[derive(Debug, Clone)]
pub struct ProcessSpec<'a> {
    pub program: &'a str,
    pub args: Vec<String>,
    pub cwd: &'a Path,
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
}

/// Run to completion. The child is killed on timeout or cancellation.
pub async fn run(spec: ProcessSpec<'_>, cancel: &CancelSignal) -> Result<ProcessOutput, ProcessError> {
    let mut command = Command::new(spec.program);
    command
        .args(&spec.args)
        .current_dir(spec.cwd)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!("Running {} {}", spec.program, spec.args.join(" "));
    let child = command.spawn().map_err(ProcessError::Spawn)?;

    // Dropping the wait future drops the child, which kills it.
    tokio::select! {
        waited = timeout(spec.timeout, child.wait_with_output()) => match waited {
            Ok(Ok(output)) => Ok(ProcessOutput {
                success: output.status.success(),
                code: output.status.code(),
                stdout: captured(&output.stdout),
                stderr: captured(&output.stderr),
            }),
            Ok(Err(e)) => Err(ProcessError::Spawn(e)),
            Err(_) => {
                tracing::warn!("{} timed out after {}s", spec.program, spec.timeout.as_secs());
                Err(ProcessError::TimedOut(spec.timeout))
            }
        },
        _ = cancel.cancelled() => {
            tracing::warn!("{} cancelled", spec.program);
            Err(ProcessError::Cancelled)
        }
    }
}

fn captured(bytes: &[u8]) -> String {
    let mut text = String::from_utf8_lossy(bytes).into_owned();
    if text.len() > MAX_CAPTURED_BYTES {
        let mut cut = MAX_CAPTURED_BYTES;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    text
}
