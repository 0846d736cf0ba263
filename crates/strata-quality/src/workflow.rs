//! Quality workflow phases and state.

use serde::Serialize;

use strata_core::{StrataError, StrataResult};

/// Workflow phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Discovery,
    Review,
    Audit,
    Generate,
    Report,
    Done,
    Failed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Review => "review",
            Self::Audit => "audit",
            Self::Generate => "generate",
            Self::Report => "report",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Check if transition to target phase is valid.
    pub fn can_transition_to(&self, target: &Phase) -> bool {
        use Phase::*;
        matches!(
            (self, target),
            (Discovery, Review)
                | (Review, Audit)
                | (Audit, Generate)
                | (Audit, Report)
                | (Generate, Audit)
                | (Generate, Report)
                | (Report, Done)
                | (Failed, Done)
                | (Discovery | Review | Audit | Generate, Failed)
        )
    }

    /// No further work happens in this phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Report | Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one quality run. Only changed through [`transition`](Self::transition).
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowState {
    phase: Phase,
    target_set: Vec<String>,
    iteration_count: u32,
    last_error: Option<String>,
    visited: Vec<Phase>,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Discovery,
            target_set: Vec::new(),
            iteration_count: 0,
            last_error: None,
            visited: vec![Phase::Discovery],
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn target_set(&self) -> &[String] {
        &self.target_set
    }

    pub fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Phases in the order they were entered.
    pub fn visited(&self) -> &[Phase] {
        &self.visited
    }

    pub fn transition(&mut self, next: Phase) -> StrataResult<()> {
        if !self.phase.can_transition_to(&next) {
            return Err(StrataError::InvalidStateTransition {
                from: self.phase.to_string(),
                to: next.to_string(),
            });
        }
        tracing::info!("Quality phase: {} -> {}", self.phase, next);
        if next == Phase::Generate {
            self.iteration_count += 1;
        }
        self.phase = next;
        self.visited.push(next);
        Ok(())
    }

    /// Record `error` and move to [`Phase::Failed`].
    pub fn fail(&mut self, error: impl Into<String>) -> StrataResult<()> {
        self.last_error = Some(error.into());
        self.transition(Phase::Failed)
    }

    pub fn set_targets(&mut self, targets: Vec<String>) {
        self.target_set = targets;
    }
}
