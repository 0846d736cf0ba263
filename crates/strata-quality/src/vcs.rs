//! Version-control collaborator.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use strata_core::cancel::CancelSignal;
use strata_core::{StrataError, StrataResult};

use crate::process::{self, ProcessError, ProcessSpec};

/// Changed paths, relative to the repository root. Deleted files are omitted.
#[async_trait]
pub trait VersionControl: Send + Sync {
    async fn uncommitted(&self) -> StrataResult<Vec<PathBuf>>;
    async fn last_change(&self) -> StrataResult<Vec<PathBuf>>;
}

/// The `git` command line.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo: PathBuf,
    timeout: Duration,
    cancel: CancelSignal,
}

impl GitCli {
    pub fn new(repo: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            repo: repo.into(),
            timeout,
            cancel: CancelSignal::never(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    async fn git(&self, args: &[&str]) -> StrataResult<String> {
        let spec = ProcessSpec {
            program: "git",
            args: args.iter().map(|s| s.to_string()).collect(),
            cwd: &self.repo,
            env: Vec::new(),
            timeout: self.timeout,
        };
        let output = process::run(spec, &self.cancel).await.map_err(|e| match e {
            ProcessError::Cancelled => StrataError::Cancelled(format!("git {}", args.join(" "))),
            other => StrataError::Vcs(format!("git {}: {}", args.join(" "), other)),
        })?;
        if !output.success {
            return Err(StrataError::Vcs(format!(
                "git {} exited with {}: {}",
                args.join(" "),
                output.code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
                output.stderr_tail()
            )));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn uncommitted(&self) -> StrataResult<Vec<PathBuf>> {
        let out = self.git(&["status", "--porcelain", "--untracked-files=all"]).await?;
        Ok(parse_porcelain(&out))
    }

    async fn last_change(&self) -> StrataResult<Vec<PathBuf>> {
        let out = self
            .git(&["diff", "--name-only", "--diff-filter=d", "HEAD~1", "HEAD"])
            .await?;
        Ok(parse_name_list(&out))
    }
}

/// Paths from `git status --porcelain` (v1). Renames yield the new path.
pub fn parse_porcelain(out: &str) -> Vec<PathBuf> {
    out.lines()
        .filter(|line| line.len() > 3)
        .filter_map(|line| {
            let (status, rest) = line.split_at(2);
            if status.contains('D') {
                return None;
            }
            let path = rest.trim_start();
            let path = path.rsplit_once(" -> ").map_or(path, |(_, new)| new);
            Some(PathBuf::from(unquote(path)))
        })
        .collect()
}

/// One path per non-empty line.
pub fn parse_name_list(out: &str) -> Vec<PathBuf> {
    out.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| PathBuf::from(unquote(l)))
        .collect()
}

/// Undo git's C-style quoting. Octal escapes are raw bytes, so `\303\251`
/// is `é`.
fn unquote(path: &str) -> String {
    let Some(inner) = path.strip_prefix('"').and_then(|p| p.strip_suffix('"')) else {
        return path.to_string();
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut rest = inner.as_bytes();
    while let Some((&b, tail)) = rest.split_first() {
        rest = tail;
        if b != b'\\' {
            bytes.push(b);
            continue;
        }
        let octal: Vec<u8> = rest
            .iter()
            .take(3)
            .copied()
            .take_while(|d| (b'0'..=b'7').contains(d))
            .collect();
        if octal.len() == 3 {
            let value = octal.iter().fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
            bytes.push(value as u8);
            rest = &rest[3..];
            continue;
        }
        let Some((&escaped, tail)) = rest.split_first() else {
            bytes.push(b'\\');
            break;
        };
        rest = tail;
        bytes.push(match escaped {
            b'a' => 0x07,
            b'b' => 0x08,
            b't' => b'\t',
            b'n' => b'\n',
            b'v' => 0x0b,
            b'f' => 0x0c,
            b'r' => b'\r',
            other => other,
        });
    }
    String::from_utf8_lossy(&bytes).into_owned()
}
