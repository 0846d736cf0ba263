//! Coverage report models.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default coverage threshold, in percent.
pub const DEFAULT_THRESHOLD: f64 = 85.0;

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

/// Coverage of one component (usually one source file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentCoverage {
    pub covered_percent: f64,
    #[serde(default)]
    pub tested_scenarios: Vec<String>,
}

/// Coverage report as produced by the build runner.
///
/// The JSON shape is the native one:
/// `{"threshold": 85, "overallPercent": 72.5, "components": {"X": {"coveredPercent": 60}}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageReport {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// The report's own aggregate. Never recomputed from components.
    pub overall_percent: f64,
    #[serde(default)]
    pub components: BTreeMap<String, ComponentCoverage>,
}

impl CoverageReport {
    pub fn new(threshold: f64, overall_percent: f64) -> Self {
        Self {
            threshold,
            overall_percent,
            components: BTreeMap::new(),
        }
    }

    pub fn with_component(mut self, id: impl Into<String>, covered_percent: f64) -> Self {
        self.components.insert(
            id.into(),
            ComponentCoverage {
                covered_percent,
                tested_scenarios: Vec::new(),
            },
        );
        self
    }

    /// Narrow to components matching one of `targets`, keeping the aggregate.
    ///
    /// A component matches when its id and the target are equal, or one ends
    /// with the other on a `/` boundary, so absolute and project-relative
    /// paths line up but `SalesInvoice.cs` is not `Invoice.cs`.
    pub fn restrict<S: AsRef<str>>(&self, targets: &[S]) -> Self {
        let components = self
            .components
            .iter()
            .filter(|(id, _)| {
                let id = normalize(id);
                targets.iter().any(|t| {
                    let t = normalize(t.as_ref());
                    is_path_suffix(&id, &t) || is_path_suffix(&t, &id)
                })
            })
            .map(|(id, c)| (id.clone(), c.clone()))
            .collect();
        Self {
            threshold: self.threshold,
            overall_percent: self.overall_percent,
            components,
        }
    }
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches("./").to_string()
}

fn is_path_suffix(path: &str, suffix: &str) -> bool {
    match path.strip_suffix(suffix) {
        Some(rest) => !suffix.is_empty() && (rest.is_empty() || rest.ends_with('/')),
        None => false,
    }
}

/// Outcome of an audit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResult {
    /// Component ids below threshold, in id order.
    pub under_covered: Vec<String>,
    pub overall_percent: f64,
    pub threshold: f64,
    /// Number of components considered.
    pub audited: usize,
}

impl AuditResult {
    pub fn passed(&self) -> bool {
        self.under_covered.is_empty()
    }
}
