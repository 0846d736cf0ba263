//! Failure recovery: the Retry / Skip / Modify / Abort suspend point.
//!
//! Emitters and the orchestrator never talk to a terminal. When something
//! fails they describe it as a [`Failure`] and ask a [`RecoveryController`],
//! which consults its [`RecoveryPolicy`] and enforces the retry budget.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::RecoveryConfig;
use crate::layer::Layer;
use crate::spec::RawFeatureRequest;

/// Decision without payload; what configuration and summaries carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryDecisionKind {
    Retry,
    Skip,
    Modify,
    Abort,
}

impl RecoveryDecisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retry => "retry",
            Self::Skip => "skip",
            Self::Modify => "modify",
            Self::Abort => "abort",
        }
    }
}

impl std::fmt::Display for RecoveryDecisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do about a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryDecision {
    Retry,
    Skip,
    /// Re-resolve with a replacement request and start over.
    Modify(RawFeatureRequest),
    Abort,
}

impl RecoveryDecision {
    pub fn kind(&self) -> RecoveryDecisionKind {
        match self {
            Self::Retry => RecoveryDecisionKind::Retry,
            Self::Skip => RecoveryDecisionKind::Skip,
            Self::Modify(_) => RecoveryDecisionKind::Modify,
            Self::Abort => RecoveryDecisionKind::Abort,
        }
    }
}

/// Where a failure happened.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case", tag = "point", content = "subject")]
pub enum FailurePoint {
    /// Target discovery through the version-control collaborator.
    Discovery,
    /// Coverage collection through the build runner.
    Audit,
    /// Test regeneration for one component.
    Generate(String),
    /// Emission of one layer of a feature.
    Emit(Layer),
}

impl FailurePoint {
    /// Emission failures can be fixed by editing the request; collaborator
    /// failures cannot.
    pub fn options(&self) -> &'static [RecoveryDecisionKind] {
        use RecoveryDecisionKind::*;
        match self {
            Self::Discovery | Self::Audit => &[Retry, Skip, Abort],
            Self::Generate(_) | Self::Emit(_) => &[Retry, Skip, Modify, Abort],
        }
    }
}

impl std::fmt::Display for FailurePoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discovery => f.write_str("discovery"),
            Self::Audit => f.write_str("audit"),
            Self::Generate(component) => write!(f, "generate {component}"),
            Self::Emit(layer) => write!(f, "emit {layer}"),
        }
    }
}

/// A failure presented for a decision.
#[derive(Debug, Clone)]
pub struct Failure {
    pub point: FailurePoint,
    pub messages: Vec<String>,
    /// The request being worked on, offered as the starting point for Modify.
    pub request: Option<RawFeatureRequest>,
}

impl Failure {
    pub fn new(point: FailurePoint, messages: Vec<String>) -> Self {
        Self {
            point,
            messages,
            request: None,
        }
    }

    pub fn with_request(mut self, request: RawFeatureRequest) -> Self {
        self.request = Some(request);
        self
    }

    pub fn offers(&self, kind: RecoveryDecisionKind) -> bool {
        self.point.options().contains(&kind)
    }
}

/// Source of recovery decisions.
pub trait RecoveryPolicy: Send {
    fn decide(&mut self, failure: &Failure) -> RecoveryDecision;
}

/// Headless policy answering every failure with the same decision.
#[derive(Debug, Clone, Copy)]
pub struct FixedPolicy {
    decision: RecoveryDecisionKind,
}

impl FixedPolicy {
    pub fn new(decision: RecoveryDecisionKind) -> Self {
        Self { decision }
    }
}

impl RecoveryPolicy for FixedPolicy {
    fn decide(&mut self, failure: &Failure) -> RecoveryDecision {
        match self.decision {
            RecoveryDecisionKind::Retry => RecoveryDecision::Retry,
            RecoveryDecisionKind::Skip => RecoveryDecision::Skip,
            // Headless Modify replays the current request unchanged.
            RecoveryDecisionKind::Modify => match &failure.request {
                Some(request) => RecoveryDecision::Modify(request.clone()),
                None => RecoveryDecision::Abort,
            },
            RecoveryDecisionKind::Abort => RecoveryDecision::Abort,
        }
    }
}

/// A decision as it appears in the run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedDecision {
    pub point: String,
    pub decision: RecoveryDecisionKind,
    /// Set when the requested decision was replaced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Applies a policy, the offered-options rule and the retry budget.
///
/// Retry and Modify both draw on the per-point budget, so a headless Modify
/// that replays the same request cannot loop.
pub struct RecoveryController {
    policy: Box<dyn RecoveryPolicy>,
    max_retries: u32,
    retries: BTreeMap<FailurePoint, u32>,
    decisions: Vec<RecordedDecision>,
}

impl std::fmt::Debug for RecoveryController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryController")
            .field("max_retries", &self.max_retries)
            .field("retries", &self.retries)
            .field("decisions", &self.decisions)
            .finish_non_exhaustive()
    }
}

impl RecoveryController {
    pub fn new(policy: Box<dyn RecoveryPolicy>, max_retries: u32) -> Self {
        Self {
            policy,
            max_retries,
            retries: BTreeMap::new(),
            decisions: Vec::new(),
        }
    }

    /// Controller answering with the configured default.
    pub fn headless(config: &RecoveryConfig) -> Self {
        Self::new(Box::new(FixedPolicy::new(config.default)), config.max_retries)
    }

    /// Ask for a decision on `failure`.
    pub fn decide(&mut self, failure: &Failure) -> RecoveryDecision {
        let requested = self.policy.decide(failure);
        let requested_kind = requested.kind();
        let mut note = None;

        let decision = if !failure.offers(requested_kind) {
            note = Some(format!("{requested_kind} not offered here"));
            RecoveryDecision::Abort
        } else if matches!(
            requested_kind,
            RecoveryDecisionKind::Retry | RecoveryDecisionKind::Modify
        ) {
            let used = self.retries.entry(failure.point.clone()).or_insert(0);
            if *used >= self.max_retries {
                note = Some(format!("retry budget of {} exhausted", self.max_retries));
                RecoveryDecision::Abort
            } else {
                *used += 1;
                requested
            }
        } else {
            requested
        };

        match &note {
            Some(reason) => tracing::warn!(
                "Recovery at {}: {} replaced by abort ({})",
                failure.point,
                requested_kind,
                reason
            ),
            None => tracing::debug!("Recovery at {}: {}", failure.point, decision.kind()),
        }

        self.decisions.push(RecordedDecision {
            point: failure.point.to_string(),
            decision: decision.kind(),
            note,
        });
        decision
    }

    pub fn decisions(&self) -> &[RecordedDecision] {
        &self.decisions
    }

    pub fn into_decisions(self) -> Vec<RecordedDecision> {
        self.decisions
    }
}
