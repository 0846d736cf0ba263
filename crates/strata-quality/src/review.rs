//! Static review checklists. Findings are warnings; they never fail a run.

use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};

use strata_core::config::ChecklistRule;
use strata_core::{StrataError, StrataResult};

/// A rule violation in one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewFinding {
    pub rule: String,
    pub description: String,
    pub path: PathBuf,
    /// 1-based line of a forbidden match; `None` for a missing requirement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl std::fmt::Display for ReviewFinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}: [{}] {}", self.path.display(), line, self.rule, self.description),
            None => write!(f, "{}: [{}] {}", self.path.display(), self.rule, self.description),
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    id: String,
    description: String,
    extensions: Vec<String>,
    forbid: Option<Regex>,
    require: Option<Regex>,
}

impl CompiledRule {
    fn applies_to(&self, path: &Path) -> bool {
        let name = path.to_string_lossy();
        self.extensions.is_empty() || self.extensions.iter().any(|ext| name.ends_with(ext.as_str()))
    }
}

/// Compiled checklist rules.
#[derive(Debug, Clone, Default)]
pub struct Checklist {
    rules: Vec<CompiledRule>,
}

impl Checklist {
    /// Compile every rule. An invalid pattern is a configuration error.
    pub fn compile(rules: &[ChecklistRule]) -> StrataResult<Self> {
        let compile = |id: &str, pattern: &Option<String>| -> StrataResult<Option<Regex>> {
            pattern
                .as_deref()
                .map(|p| {
                    Regex::new(p).map_err(|e| {
                        StrataError::config(format!("checklist rule '{id}': invalid pattern: {e}"))
                    })
                })
                .transpose()
        };

        let rules = rules
            .iter()
            .map(|rule| {
                Ok(CompiledRule {
                    id: rule.id.clone(),
                    description: rule.description.clone(),
                    extensions: rule.extensions.clone(),
                    forbid: compile(&rule.id, &rule.forbid)?,
                    require: compile(&rule.id, &rule.require)?,
                })
            })
            .collect::<StrataResult<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every relevant rule to one file.
    pub fn review(&self, path: &Path, content: &str) -> Vec<ReviewFinding> {
        let mut findings = Vec::new();
        for rule in self.rules.iter().filter(|r| r.applies_to(path)) {
            let finding = |line| ReviewFinding {
                rule: rule.id.clone(),
                description: rule.description.clone(),
                path: path.to_path_buf(),
                line,
            };
            if let Some(forbid) = &rule.forbid {
                findings.extend(
                    content
                        .lines()
                        .enumerate()
                        .filter(|(_, text)| forbid.is_match(text))
                        .map(|(i, _)| finding(Some(i + 1))),
                );
            }
            if let Some(require) = &rule.require {
                if !require.is_match(content) {
                    findings.push(finding(None));
                }
            }
        }
        findings
    }
}
