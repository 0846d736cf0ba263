//! The coverage-gated quality loop.
//!
//! Discovery → Review → Audit → (Generate → Audit)* → Report, with every
//! collaborator failure routed through the recovery controller. The number
//! of Generate cycles is capped; reaching the cap with gaps left ends in
//! Report with an iteration-cap note rather than another cycle.

use chrono::Utc;
use std::path::PathBuf;

use strata_codegen::fs::{DryRunFileSystem, FileSystem};
use strata_codegen::{ScaffoldOutcome, Scaffolder, TemplateCatalog};
use strata_core::cancel::CancelSignal;
use strata_core::config::{MarkerTieBreak, StrataConfig};
use strata_core::coverage::{audit, AuditResult, CoverageReport};
use strata_core::layer::Layer;
use strata_core::recovery::{Failure, FailurePoint, RecoveryController, RecoveryDecision};
use strata_core::spec::{FeatureSpec, RawFeatureRequest, SpecResolver};
use strata_core::{StrataError, StrataResult};

use crate::components::ComponentMapper;
use crate::review::Checklist;
use crate::runner::BuildRunner;
use crate::summary::{RunNote, RunOutcome, RunSummary};
use crate::target::{discover, Target, TargetSet};
use crate::vcs::VersionControl;
use crate::workflow::{Phase, WorkflowState};

/// External collaborators of a quality run.
pub struct Collaborators<'a> {
    pub fs: &'a dyn FileSystem,
    pub vcs: &'a dyn VersionControl,
    pub runner: &'a dyn BuildRunner,
}

/// Why a run stopped early.
enum Stop {
    Failed(String),
    Cancelled(String),
}

impl From<StrataError> for Stop {
    fn from(err: StrataError) -> Self {
        match err {
            StrataError::Cancelled(what) => Stop::Cancelled(what),
            other => Stop::Failed(other.to_string()),
        }
    }
}

type Step<T> = Result<T, Stop>;

/// Drives one quality run. Holds no state between runs.
pub struct QualityOrchestrator<'a> {
    resolver: &'a SpecResolver,
    catalog: &'a TemplateCatalog,
    fs: &'a dyn FileSystem,
    vcs: &'a dyn VersionControl,
    runner: &'a dyn BuildRunner,
    checklist: Checklist,
    mapper: ComponentMapper,
    threshold: Option<f64>,
    max_iterations: u32,
    tie_break: MarkerTieBreak,
    dry_run: bool,
    cancel: CancelSignal,
}

impl<'a> QualityOrchestrator<'a> {
    /// Invalid checklist patterns fail here, before any work starts.
    pub fn new(
        config: &StrataConfig,
        resolver: &'a SpecResolver,
        catalog: &'a TemplateCatalog,
        collaborators: Collaborators<'a>,
    ) -> StrataResult<Self> {
        Ok(Self {
            resolver,
            catalog,
            fs: collaborators.fs,
            vcs: collaborators.vcs,
            runner: collaborators.runner,
            checklist: Checklist::compile(&config.quality.checklist)?,
            mapper: ComponentMapper::new(&config.quality, resolver.naming().clone()),
            threshold: None,
            max_iterations: config.quality.max_iterations,
            tie_break: config.catalog.multiple_markers,
            dry_run: false,
            cancel: CancelSignal::never(),
        })
    }

    /// Override the threshold carried by coverage reports.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Plan test generation once without writing, then report.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the loop for `target` and summarize it.
    pub async fn run(&self, target: &Target, recovery: &mut RecoveryController) -> RunSummary {
        let mut state = WorkflowState::new();
        let mut summary = RunSummary::new(target.to_string(), self.max_iterations);
        tracing::info!("Quality run {} for {}", summary.run_id, target);

        let outcome = match self.drive(target, recovery, &mut state, &mut summary).await {
            Ok(outcome) => outcome,
            Err(stop) => {
                let (message, outcome) = match stop {
                    Stop::Failed(message) => (message, RunOutcome::Failed),
                    Stop::Cancelled(what) => (format!("cancelled: {what}"), RunOutcome::Cancelled),
                };
                tracing::warn!("Quality run stopped: {}", message);
                if let Err(e) = state.fail(message.clone()) {
                    tracing::error!("{}", e);
                }
                summary.last_error = Some(message);
                outcome
            }
        };

        summary.final_phase = state.phase();
        if let Err(e) = state.transition(Phase::Done) {
            tracing::error!("{}", e);
        }
        summary.outcome = outcome;
        summary.phases = state.visited().to_vec();
        summary.iterations = state.iteration_count();
        summary.targets = state.target_set().to_vec();
        summary.decisions = recovery.decisions().to_vec();
        summary.finished_at = Utc::now();
        tracing::info!(
            "Quality run {} finished: {} after {} iteration(s)",
            summary.run_id,
            outcome.as_str(),
            summary.iterations
        );
        summary
    }

    async fn drive(
        &self,
        target: &Target,
        recovery: &mut RecoveryController,
        state: &mut WorkflowState,
        summary: &mut RunSummary,
    ) -> Step<RunOutcome> {
        let (targets, spec) = self.discovery(target, recovery, summary).await?;
        state.set_targets(targets.labels());

        state.transition(Phase::Review)?;
        self.review(&targets, summary);

        state.transition(Phase::Audit)?;
        loop {
            self.check_cancelled("audit")?;
            let Some(result) = self.audit(&targets, spec.as_ref(), recovery, summary).await? else {
                state.transition(Phase::Report)?;
                return Ok(RunOutcome::PassedWithGaps);
            };

            if result.passed() {
                state.transition(Phase::Report)?;
                return Ok(self.passing_outcome(summary));
            }

            if state.iteration_count() >= self.max_iterations {
                tracing::warn!(
                    "Iteration cap of {} reached with {} component(s) under {}%",
                    self.max_iterations,
                    result.under_covered.len(),
                    result.threshold
                );
                summary.notes.push(RunNote::IterationCapExceeded {
                    iterations: state.iteration_count(),
                    residual: result.under_covered.clone(),
                });
                state.transition(Phase::Report)?;
                return Ok(RunOutcome::PassedWithGaps);
            }

            state.transition(Phase::Generate)?;
            let planned = self.generate(&result.under_covered, recovery, summary)?;

            if self.dry_run {
                summary.notes.push(RunNote::DryRun { planned });
                state.transition(Phase::Report)?;
                return Ok(RunOutcome::PassedWithGaps);
            }
            state.transition(Phase::Audit)?;
        }
    }

    async fn discovery(
        &self,
        target: &Target,
        recovery: &mut RecoveryController,
        summary: &mut RunSummary,
    ) -> Step<(TargetSet, Option<FeatureSpec>)> {
        let targets = loop {
            self.check_cancelled("discovery")?;
            let err = match discover(target, self.vcs).await {
                Ok(set) => break set,
                Err(StrataError::Cancelled(what)) => return Err(Stop::Cancelled(what)),
                Err(e) => e,
            };
            match recovery.decide(&Failure::new(FailurePoint::Discovery, vec![err.to_string()])) {
                RecoveryDecision::Retry => continue,
                RecoveryDecision::Skip => {
                    summary.notes.push(RunNote::DiscoverySkipped);
                    return Ok((TargetSet::default(), None));
                }
                _ => return Err(err.into()),
            }
        };

        if targets.is_empty() {
            return Err(Stop::Failed(format!("no targets found for {target}")));
        }
        let spec = match &targets.feature {
            Some(feature) => Some(
                self.resolver
                    .resolve(&RawFeatureRequest::for_tests(feature))
                    .map_err(|e| Stop::Failed(format!("ambiguous feature target: {e}")))?,
            ),
            None => None,
        };
        Ok((targets, spec))
    }

    fn review(&self, targets: &TargetSet, summary: &mut RunSummary) {
        for path in &targets.files {
            match self.fs.read(path) {
                Ok(Some(content)) => {
                    for finding in self.checklist.review(path, &content) {
                        tracing::warn!("Review: {}", finding);
                        summary.review_warnings.push(finding);
                    }
                }
                Ok(None) => tracing::debug!("Review: {} does not exist", path.display()),
                Err(e) => tracing::warn!("Review: cannot read {}: {}", path.display(), e),
            }
        }
        tracing::info!(
            "Review found {} warning(s) in {} file(s)",
            summary.review_warnings.len(),
            targets.files.len()
        );
    }

    /// `None` when the audit was skipped through recovery.
    async fn audit(
        &self,
        targets: &TargetSet,
        spec: Option<&FeatureSpec>,
        recovery: &mut RecoveryController,
        summary: &mut RunSummary,
    ) -> Step<Option<AuditResult>> {
        let mut report = loop {
            let err = match self.runner.coverage(targets, &self.cancel).await {
                Ok(report) => break report,
                Err(StrataError::Cancelled(what)) => return Err(Stop::Cancelled(what)),
                Err(e) => e,
            };
            tracing::warn!("Coverage from {} runner failed: {}", self.runner.name(), err);
            match recovery.decide(&Failure::new(FailurePoint::Audit, vec![err.to_string()])) {
                RecoveryDecision::Retry => continue,
                RecoveryDecision::Skip => {
                    summary.notes.push(RunNote::AuditSkipped);
                    return Ok(None);
                }
                _ => return Err(err.into()),
            }
        };

        if let Some(threshold) = self.threshold {
            report.threshold = threshold;
        }
        let scoped = self.scope(&report, targets);
        let result = audit(&scoped, spec);
        tracing::info!(
            "Audit: {} of {} component(s) under {}% (overall {:.1}%)",
            result.under_covered.len(),
            result.audited,
            result.threshold,
            result.overall_percent
        );
        summary.last_audit = Some(result.clone());
        Ok(Some(result))
    }

    fn scope(&self, report: &CoverageReport, targets: &TargetSet) -> CoverageReport {
        if targets.files.is_empty() {
            return report.clone();
        }
        let scoped = report.restrict(&targets.labels());
        if scoped.components.is_empty() {
            tracing::debug!("No coverage data for the {} target file(s)", targets.files.len());
        }
        scoped
    }

    /// Emit test-layer artifacts for every feature behind `under_covered`.
    /// Returns the paths a dry run would write.
    fn generate(
        &self,
        under_covered: &[String],
        recovery: &mut RecoveryController,
        summary: &mut RunSummary,
    ) -> Step<Vec<String>> {
        let dry = self.dry_run.then(|| DryRunFileSystem::new(self.fs));
        let fs: &dyn FileSystem = match &dry {
            Some(dry) => dry,
            None => self.fs,
        };

        for (feature, components) in self.mapper.group(under_covered) {
            if self.cancel.is_cancelled() {
                summary.notes.push(RunNote::CancelledMidGeneration);
                return Err(Stop::Cancelled("generation".to_string()));
            }
            tracing::info!("Generating tests for {} ({} component(s))", feature, components.len());

            let mut request = RawFeatureRequest::for_tests(feature.as_str());
            loop {
                let scaffolder = Scaffolder::new(self.catalog, self.resolver, fs)
                    .only_layers([Layer::Tests])
                    .with_tie_break(self.tie_break)
                    .with_cancel(self.cancel.clone());

                let err = match scaffolder.run(&request, recovery) {
                    Ok(report) => {
                        summary.artifacts.extend(report.artifacts);
                        summary.failures.extend(report.failures);
                        match report.outcome {
                            ScaffoldOutcome::Completed => break,
                            ScaffoldOutcome::Aborted => {
                                return Err(Stop::Failed(format!("test generation for {feature} aborted")))
                            }
                            ScaffoldOutcome::Cancelled => {
                                summary.notes.push(RunNote::CancelledMidGeneration);
                                return Err(Stop::Cancelled("generation".to_string()));
                            }
                        }
                    }
                    Err(e) => e,
                };

                let failure = Failure::new(FailurePoint::Generate(feature.clone()), vec![err.to_string()])
                    .with_request(request.clone());
                match recovery.decide(&failure) {
                    RecoveryDecision::Retry => {}
                    RecoveryDecision::Modify(next) => request = next,
                    RecoveryDecision::Skip => {
                        summary.notes.push(RunNote::GenerationSkipped {
                            feature: feature.clone(),
                        });
                        break;
                    }
                    RecoveryDecision::Abort => return Err(err.into()),
                }
            }
        }

        Ok(dry
            .map(|d| d.planned().iter().map(|p: &PathBuf| p.display().to_string()).collect())
            .unwrap_or_default())
    }

    fn check_cancelled(&self, what: &str) -> Step<()> {
        if self.cancel.is_cancelled() {
            return Err(Stop::Cancelled(what.to_string()));
        }
        Ok(())
    }

    fn passing_outcome(&self, summary: &RunSummary) -> RunOutcome {
        let gaps = !summary.failures.is_empty()
            || summary.has_note(|n| {
                matches!(n, RunNote::GenerationSkipped { .. } | RunNote::DiscoverySkipped)
            });
        if gaps {
            RunOutcome::PassedWithGaps
        } else {
            RunOutcome::Passed
        }
    }
}
