//! Structured result of a quality run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use strata_codegen::scaffold::FailureRecord;
use strata_codegen::GeneratedArtifact;
use strata_core::coverage::AuditResult;
use strata_core::recovery::RecordedDecision;

use crate::review::ReviewFinding;
use crate::workflow::Phase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Passed,
    /// Finished, but coverage gaps remain or something was skipped.
    PassedWithGaps,
    Failed,
    Cancelled,
}

impl RunOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Passed => 0,
            Self::PassedWithGaps => 1,
            Self::Failed => 2,
            Self::Cancelled => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::PassedWithGaps => "passed with gaps",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Informational notes attached to a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "note", rename_all = "snake_case")]
pub enum RunNote {
    /// The Generate→Audit cap was reached with gaps left.
    IterationCapExceeded { iterations: u32, residual: Vec<String> },
    CancelledMidGeneration,
    /// Discovery failed and was skipped; the whole report was audited.
    DiscoverySkipped,
    /// Coverage could not be collected and the audit was skipped.
    AuditSkipped,
    /// A component was left without generated tests.
    GenerationSkipped { feature: String },
    DryRun { planned: Vec<String> },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub target: String,
    pub targets: Vec<String>,
    pub phases: Vec<Phase>,
    /// Report or Failed; the phase the run ended in before being discarded.
    pub final_phase: Phase,
    pub iterations: u32,
    pub max_iterations: u32,
    pub last_audit: Option<AuditResult>,
    pub review_warnings: Vec<ReviewFinding>,
    pub artifacts: Vec<GeneratedArtifact>,
    pub failures: Vec<FailureRecord>,
    pub notes: Vec<RunNote>,
    pub decisions: Vec<RecordedDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub outcome: RunOutcome,
}

impl RunSummary {
    pub fn new(target: impl Into<String>, max_iterations: u32) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            target: target.into(),
            targets: Vec::new(),
            phases: Vec::new(),
            final_phase: Phase::Discovery,
            iterations: 0,
            max_iterations,
            last_audit: None,
            review_warnings: Vec::new(),
            artifacts: Vec::new(),
            failures: Vec::new(),
            notes: Vec::new(),
            decisions: Vec::new(),
            last_error: None,
            outcome: RunOutcome::Failed,
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.outcome.exit_code()
    }

    pub fn has_note(&self, matches: impl Fn(&RunNote) -> bool) -> bool {
        self.notes.iter().any(matches)
    }

    pub fn written(&self) -> usize {
        self.artifacts.iter().filter(|a| a.wrote()).count()
    }

    pub fn skipped(&self) -> usize {
        self.artifacts.iter().filter(|a| a.is_skipped()).count()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
