//! Quality-run targets and their discovery.

use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;

use strata_core::{StrataError, StrataResult};

use crate::vcs::VersionControl;

/// What a quality run looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Target {
    /// Files with uncommitted changes.
    Uncommitted,
    /// Files touched by the last commit.
    LastChange,
    /// Every component mentioning a feature name.
    Feature(String),
    Files(Vec<PathBuf>),
}

impl FromStr for Target {
    type Err = StrataError;

    /// `uncommitted`, `last-change`, `feature:<name>` or `files:<a,b,...>`.
    fn from_str(raw: &str) -> StrataResult<Self> {
        let raw = raw.trim();
        match raw {
            "uncommitted" => return Ok(Self::Uncommitted),
            "last-change" | "last_change" => return Ok(Self::LastChange),
            _ => {}
        }
        if let Some(name) = raw.strip_prefix("feature:") {
            let name = name.trim();
            if name.is_empty() {
                return Err(StrataError::config("target 'feature:' needs a feature name"));
            }
            return Ok(Self::Feature(name.to_string()));
        }
        if let Some(list) = raw.strip_prefix("files:") {
            let files: Vec<PathBuf> = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect();
            if files.is_empty() {
                return Err(StrataError::config("target 'files:' needs at least one path"));
            }
            return Ok(Self::Files(files));
        }
        Err(StrataError::config(format!(
            "unknown target '{raw}' (expected uncommitted, last-change, feature:<name> or files:<paths>)"
        )))
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uncommitted => f.write_str("uncommitted"),
            Self::LastChange => f.write_str("last-change"),
            Self::Feature(name) => write!(f, "feature:{name}"),
            Self::Files(files) => {
                let list: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
                write!(f, "files:{}", list.join(","))
            }
        }
    }
}

/// The resolved set of things under consideration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TargetSet {
    /// Project-relative file paths.
    pub files: Vec<PathBuf>,
    /// Set for feature targets; coverage is filtered by name instead of path.
    pub feature: Option<String>,
}

impl TargetSet {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.feature.is_none()
    }

    /// Display form of each target, for state and summaries.
    pub fn labels(&self) -> Vec<String> {
        match &self.feature {
            Some(feature) => vec![format!("feature:{feature}")],
            None => self.files.iter().map(|p| p.display().to_string()).collect(),
        }
    }
}

/// Resolve `target` to a concrete set, asking version control when needed.
pub async fn discover(target: &Target, vcs: &dyn VersionControl) -> StrataResult<TargetSet> {
    let mut files = match target {
        Target::Feature(name) => {
            return Ok(TargetSet {
                files: Vec::new(),
                feature: Some(name.clone()),
            })
        }
        Target::Files(files) => files.clone(),
        Target::Uncommitted => vcs.uncommitted().await?,
        Target::LastChange => vcs.last_change().await?,
    };

    files.sort();
    files.dedup();
    tracing::debug!("Discovered {} file(s) for {}", files.len(), target);
    Ok(TargetSet { files, feature: None })
}
