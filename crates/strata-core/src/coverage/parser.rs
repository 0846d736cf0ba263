//! Coverage report parsers.

use std::collections::BTreeMap;

use super::model::{ComponentCoverage, CoverageReport};
use crate::config::ReportFormat;
use crate::error::{StrataError, StrataResult};

/// Parse a report in `format`, applying `threshold` when the report does
/// not carry its own.
pub fn parse_report(raw: &str, format: ReportFormat, threshold: f64) -> StrataResult<CoverageReport> {
    match format {
        ReportFormat::Json => parse_json(raw),
        ReportFormat::Lcov => parse_lcov(raw, threshold),
    }
}

/// Parse the native JSON report.
pub fn parse_json(raw: &str) -> StrataResult<CoverageReport> {
    serde_json::from_str(raw)
        .map_err(|e| StrataError::CoverageUnavailable(format!("malformed JSON report: {e}")))
}

/// Parse LCOV tracefile text.
///
/// Each `SF:` record becomes a component; its percentage is `LH / LF`.
/// The aggregate is total hit over total found lines across all records.
/// A record without instrumented lines counts as fully covered.
pub fn parse_lcov(raw: &str, threshold: f64) -> StrataResult<CoverageReport> {
    let mut components = BTreeMap::new();
    let mut current: Option<String> = None;
    let (mut hit, mut found) = (0u64, 0u64);
    let (mut total_hit, mut total_found) = (0u64, 0u64);

    for (lineno, line) in raw.lines().enumerate() {
        let line = line.trim();
        if let Some(path) = line.strip_prefix("SF:") {
            current = Some(path.to_string());
            hit = 0;
            found = 0;
        } else if let Some(n) = line.strip_prefix("LH:") {
            hit = parse_count(n, lineno)?;
        } else if let Some(n) = line.strip_prefix("LF:") {
            found = parse_count(n, lineno)?;
        } else if line == "end_of_record" {
            let path = current.take().ok_or_else(|| {
                StrataError::CoverageUnavailable(format!(
                    "line {}: end_of_record without SF",
                    lineno + 1
                ))
            })?;
            total_hit += hit;
            total_found += found;
            components.insert(
                path,
                ComponentCoverage {
                    covered_percent: percent(hit, found),
                    tested_scenarios: Vec::new(),
                },
            );
        }
    }

    if current.is_some() {
        return Err(StrataError::CoverageUnavailable(
            "truncated LCOV report: missing end_of_record".to_string(),
        ));
    }
    if components.is_empty() {
        return Err(StrataError::CoverageUnavailable(
            "LCOV report contains no records".to_string(),
        ));
    }

    Ok(CoverageReport {
        threshold,
        overall_percent: percent(total_hit, total_found),
        components,
    })
}

fn parse_count(raw: &str, lineno: usize) -> StrataResult<u64> {
    raw.trim().parse().map_err(|_| {
        StrataError::CoverageUnavailable(format!("line {}: invalid count '{}'", lineno + 1, raw))
    })
}

fn percent(hit: u64, found: u64) -> f64 {
    if found == 0 {
        100.0
    } else {
        hit as f64 * 100.0 / found as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LCOV: &str = "\
TN:
SF:src/Application/Invoices/CreateInvoiceCommandHandler.cs
DA:1,1
LH:3
LF:4
end_of_record
SF:src/Domain/Entities/Invoice.cs
LH:1
LF:4
end_of_record
";

    #[test]
    fn test_parse_lcov() {
        let report = parse_lcov(LCOV, 85.0).unwrap();
        assert_eq!(report.components.len(), 2);
        assert_eq!(
            report.components["src/Application/Invoices/CreateInvoiceCommandHandler.cs"].covered_percent,
            75.0
        );
        assert_eq!(report.components["src/Domain/Entities/Invoice.cs"].covered_percent, 25.0);
        assert_eq!(report.overall_percent, 50.0);
        assert_eq!(report.threshold, 85.0);
    }

    #[test]
    fn test_lcov_errors() {
        assert!(parse_lcov("", 85.0).is_err());
        assert!(parse_lcov("SF:a.cs\nLH:1\nLF:2\n", 85.0).is_err());
        assert!(parse_lcov("SF:a.cs\nLH:x\nLF:2\nend_of_record\n", 85.0).is_err());
    }

    #[test]
    fn test_malformed_json_is_unavailable() {
        let err = parse_report("{not json", ReportFormat::Json, 85.0).unwrap_err();
        assert!(matches!(err, StrataError::CoverageUnavailable(_)));
    }
}
