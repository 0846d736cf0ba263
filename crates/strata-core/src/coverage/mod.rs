//! Coverage auditing.

pub mod model;
pub mod parser;

pub use model::{AuditResult, ComponentCoverage, CoverageReport, DEFAULT_THRESHOLD};

use crate::spec::FeatureSpec;

/// Classify the components of `report` against its threshold.
///
/// A component is under-covered unless its percentage is at or above the
/// threshold, so `NaN` is under-covered. With a `spec`, only components
/// whose id mentions the feature are considered.
pub fn audit(report: &CoverageReport, spec: Option<&FeatureSpec>) -> AuditResult {
    let mut audited = 0;
    let mut under_covered = Vec::new();

    for (id, component) in &report.components {
        if let Some(spec) = spec {
            if !spec.naming.is_mentioned_in(id) {
                continue;
            }
        }
        audited += 1;
        if !(component.covered_percent >= report.threshold) {
            under_covered.push(id.clone());
        }
    }

    tracing::debug!(
        "Audited {} components: {} under {}%",
        audited,
        under_covered.len(),
        report.threshold
    );

    AuditResult {
        under_covered,
        overall_percent: report.overall_percent,
        threshold: report.threshold,
        audited,
    }
}
