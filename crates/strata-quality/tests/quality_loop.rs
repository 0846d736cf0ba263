//! Quality loop runs against fake collaborators.

use async_trait::async_trait;
use proptest::prelude::*;
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use strata_codegen::fs::{FileSystem, MemoryFileSystem};
use strata_codegen::TemplateCatalog;
use strata_core::cancel::{cancel_pair, CancelHandle, CancelSignal};
use strata_core::config::{RecoveryConfig, StrataConfig};
use strata_core::coverage::CoverageReport;
use strata_core::recovery::{RecoveryController, RecoveryDecisionKind};
use strata_core::spec::SpecResolver;
use strata_core::{StrataError, StrataResult};
use strata_quality::{
    BuildRunner, Collaborators, Phase, QualityOrchestrator, RunNote, RunOutcome, RunSummary, Target,
    TargetSet, VersionControl,
};

struct FakeVcs {
    changed: Vec<PathBuf>,
}

#[async_trait]
impl VersionControl for FakeVcs {
    async fn uncommitted(&self) -> StrataResult<Vec<PathBuf>> {
        Ok(self.changed.clone())
    }

    async fn last_change(&self) -> StrataResult<Vec<PathBuf>> {
        Err(StrataError::Vcs("no commits yet".to_string()))
    }
}

/// Answers with queued results, then with `fallback` forever.
struct ScriptedRunner {
    queue: Mutex<VecDeque<StrataResult<CoverageReport>>>,
    fallback: CoverageReport,
    calls: AtomicUsize,
}

impl ScriptedRunner {
    fn always(report: CoverageReport) -> Self {
        Self::scripted(Vec::new(), report)
    }

    fn scripted(queue: Vec<StrataResult<CoverageReport>>, fallback: CoverageReport) -> Self {
        Self {
            queue: Mutex::new(queue.into()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BuildRunner for ScriptedRunner {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn coverage(&self, _targets: &TargetSet, _cancel: &CancelSignal) -> StrataResult<CoverageReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.queue.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// Trips cancellation right after the first successful write.
struct CancellingFs {
    inner: MemoryFileSystem,
    handle: CancelHandle,
}

impl FileSystem for CancellingFs {
    fn read(&self, path: &Path) -> io::Result<Option<String>> {
        self.inner.read(path)
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        self.inner.write(path, content)?;
        self.handle.cancel();
        Ok(())
    }
}

struct Fixture {
    config: StrataConfig,
    resolver: SpecResolver,
    catalog: TemplateCatalog,
    vcs: FakeVcs,
}

impl Fixture {
    fn new() -> Self {
        let config = StrataConfig::default();
        Self {
            resolver: SpecResolver::from_config(&config),
            catalog: TemplateCatalog::builtin(&config.options).unwrap(),
            vcs: FakeVcs { changed: Vec::new() },
            config,
        }
    }

    fn orchestrator<'a>(&'a self, fs: &'a dyn FileSystem, runner: &'a dyn BuildRunner) -> QualityOrchestrator<'a> {
        QualityOrchestrator::new(
            &self.config,
            &self.resolver,
            &self.catalog,
            Collaborators {
                fs,
                vcs: &self.vcs,
                runner,
            },
        )
        .unwrap()
    }
}

fn headless(kind: RecoveryDecisionKind) -> RecoveryController {
    RecoveryController::headless(&RecoveryConfig {
        default: kind,
        max_retries: 2,
    })
}

fn target(raw: &str) -> Target {
    raw.parse().unwrap()
}

fn x_and_y(x: f64) -> CoverageReport {
    CoverageReport::new(85.0, 72.5)
        .with_component("X", x)
        .with_component("Y", 90.0)
}

#[tokio::test]
async fn test_under_covered_component_gets_tests_then_passes() {
    let fixture = Fixture::new();
    let fs = MemoryFileSystem::new();
    let runner = ScriptedRunner::scripted(vec![Ok(x_and_y(60.0))], x_and_y(88.0));

    let summary = fixture
        .orchestrator(&fs, &runner)
        .run(&target("files:X,Y"), &mut headless(RecoveryDecisionKind::Abort))
        .await;

    assert_eq!(summary.outcome, RunOutcome::Passed);
    assert_eq!(summary.exit_code(), 0);
    assert_eq!(summary.iterations, 1);
    assert_eq!(runner.calls(), 2);
    assert_eq!(
        summary.phases,
        vec![
            Phase::Discovery,
            Phase::Review,
            Phase::Audit,
            Phase::Generate,
            Phase::Audit,
            Phase::Report,
            Phase::Done
        ]
    );
    // Only X was under-covered, so only X gets tests.
    assert!(fs.get("tests/Domain.UnitTests/Entities/XTests.cs").is_some());
    assert!(fs.get("tests/Domain.UnitTests/Entities/YTests.cs").is_none());
    assert!(summary.artifacts.iter().all(|a| a.layer == strata_core::Layer::Tests));

    let last = summary.last_audit.unwrap();
    assert!(last.under_covered.is_empty());
    assert_eq!(last.overall_percent, 72.5);
}

#[tokio::test]
async fn test_iteration_cap_ends_in_report() {
    let fixture = Fixture::new();
    let fs = MemoryFileSystem::new();
    let runner = ScriptedRunner::always(x_and_y(60.0));

    let summary = fixture
        .orchestrator(&fs, &runner)
        .run(&target("files:X,Y"), &mut headless(RecoveryDecisionKind::Abort))
        .await;

    assert_eq!(summary.final_phase, Phase::Report);
    assert_eq!(summary.outcome, RunOutcome::PassedWithGaps);
    assert_eq!(summary.exit_code(), 1);
    assert_eq!(summary.iterations, 2);
    assert_eq!(runner.calls(), 3);
    assert_eq!(
        summary.notes,
        vec![RunNote::IterationCapExceeded {
            iterations: 2,
            residual: vec!["X".to_string()],
        }]
    );
    // The second generation cycle found everything already in place.
    assert_eq!(fs.write_count(), summary.written());
    assert_eq!(fs.files().len(), summary.written());
}

#[tokio::test]
async fn test_cancelled_mid_generation_keeps_written_artifacts() {
    let fixture = Fixture::new();
    let (handle, signal) = cancel_pair();
    let fs = CancellingFs {
        inner: MemoryFileSystem::new(),
        handle,
    };
    let runner = ScriptedRunner::always(x_and_y(60.0));

    let summary = fixture
        .orchestrator(&fs, &runner)
        .with_cancel(signal)
        .run(&target("files:X,Y"), &mut headless(RecoveryDecisionKind::Abort))
        .await;

    assert_eq!(summary.outcome, RunOutcome::Cancelled);
    assert_eq!(summary.exit_code(), 3);
    assert_eq!(summary.final_phase, Phase::Failed);
    assert!(summary.has_note(|n| *n == RunNote::CancelledMidGeneration));
    assert_eq!(fs.inner.write_count(), 1);
    assert_eq!(summary.written(), 1);
}

#[tokio::test]
async fn test_runner_failure_recovery() {
    let fixture = Fixture::new();
    let fs = MemoryFileSystem::new();

    // Retry gets past one failure.
    let runner = ScriptedRunner::scripted(
        vec![Err(StrataError::CoverageUnavailable("build failed".to_string()))],
        x_and_y(95.0),
    );
    let mut recovery = headless(RecoveryDecisionKind::Retry);
    let summary = fixture
        .orchestrator(&fs, &runner)
        .run(&target("files:X,Y"), &mut recovery)
        .await;
    assert_eq!(summary.outcome, RunOutcome::Passed);
    assert_eq!(summary.decisions.len(), 1);
    assert_eq!(summary.decisions[0].decision, RecoveryDecisionKind::Retry);

    // Skip reports without an audit.
    let runner = ScriptedRunner::scripted(
        vec![Err(StrataError::CoverageUnavailable("build failed".to_string()))],
        x_and_y(95.0),
    );
    let summary = fixture
        .orchestrator(&fs, &runner)
        .run(&target("files:X,Y"), &mut headless(RecoveryDecisionKind::Skip))
        .await;
    assert_eq!(summary.outcome, RunOutcome::PassedWithGaps);
    assert_eq!(summary.notes, vec![RunNote::AuditSkipped]);
    assert!(summary.last_audit.is_none());

    // Abort fails the run.
    let runner = ScriptedRunner::scripted(
        vec![Err(StrataError::CoverageUnavailable("build failed".to_string()))],
        x_and_y(95.0),
    );
    let summary = fixture
        .orchestrator(&fs, &runner)
        .run(&target("files:X,Y"), &mut headless(RecoveryDecisionKind::Abort))
        .await;
    assert_eq!(summary.outcome, RunOutcome::Failed);
    assert_eq!(summary.exit_code(), 2);
    assert!(summary.last_error.unwrap().contains("build failed"));
}

#[tokio::test]
async fn test_discovery_outcomes() {
    let fixture = Fixture::new();
    let fs = MemoryFileSystem::new();
    let runner = ScriptedRunner::always(x_and_y(95.0));

    // No uncommitted changes: nothing to look at.
    let summary = fixture
        .orchestrator(&fs, &runner)
        .run(&Target::Uncommitted, &mut headless(RecoveryDecisionKind::Abort))
        .await;
    assert_eq!(summary.outcome, RunOutcome::Failed);
    assert_eq!(summary.phases, vec![Phase::Discovery, Phase::Failed, Phase::Done]);
    assert_eq!(runner.calls(), 0);

    // VCS failure skipped: the whole report is audited.
    let summary = fixture
        .orchestrator(&fs, &runner)
        .run(&Target::LastChange, &mut headless(RecoveryDecisionKind::Skip))
        .await;
    assert_eq!(summary.outcome, RunOutcome::PassedWithGaps);
    assert!(summary.has_note(|n| *n == RunNote::DiscoverySkipped));
    assert_eq!(summary.last_audit.unwrap().audited, 2);
}

#[tokio::test]
async fn test_feature_target_audits_matching_components() {
    let fixture = Fixture::new();
    let fs = MemoryFileSystem::new();
    let report = CoverageReport::new(85.0, 50.0)
        .with_component("src/Domain/Entities/Invoice.cs", 90.0)
        .with_component("src/WebApi/Controllers/InvoicesController.cs", 86.0)
        .with_component("src/Domain/Entities/Customer.cs", 10.0);
    let runner = ScriptedRunner::always(report);

    let summary = fixture
        .orchestrator(&fs, &runner)
        .run(&target("feature:Invoice"), &mut headless(RecoveryDecisionKind::Abort))
        .await;
    assert_eq!(summary.outcome, RunOutcome::Passed);
    assert_eq!(summary.targets, vec!["feature:Invoice".to_string()]);
    assert_eq!(summary.last_audit.unwrap().audited, 2);

    // A stricter threshold from the command line fails the controller.
    let summary = fixture
        .orchestrator(&fs, &runner)
        .with_threshold(87.0)
        .with_max_iterations(0)
        .run(&target("feature:Invoice"), &mut headless(RecoveryDecisionKind::Abort))
        .await;
    assert_eq!(summary.outcome, RunOutcome::PassedWithGaps);
    assert_eq!(
        summary.last_audit.unwrap().under_covered,
        vec!["src/WebApi/Controllers/InvoicesController.cs".to_string()]
    );
}

#[tokio::test]
async fn test_review_warnings_do_not_fail_the_run() {
    let fixture = Fixture::new();
    let fs = MemoryFileSystem::new().with_file("src/A.cs", "class A {\n    // TODO: tidy\n}\n");
    let runner = ScriptedRunner::always(CoverageReport::new(85.0, 90.0).with_component("src/A.cs", 90.0));

    let summary = fixture
        .orchestrator(&fs, &runner)
        .run(&target("files:src/A.cs"), &mut headless(RecoveryDecisionKind::Abort))
        .await;
    assert_eq!(summary.outcome, RunOutcome::Passed);
    assert_eq!(summary.review_warnings.len(), 1);
    assert_eq!(summary.review_warnings[0].line, Some(2));
}

#[tokio::test]
async fn test_dry_run_plans_without_writing() {
    let fixture = Fixture::new();
    let fs = MemoryFileSystem::new();
    let runner = ScriptedRunner::always(x_and_y(60.0));

    let summary: RunSummary = fixture
        .orchestrator(&fs, &runner)
        .dry_run(true)
        .run(&target("files:X,Y"), &mut headless(RecoveryDecisionKind::Abort))
        .await;

    assert_eq!(fs.write_count(), 0);
    assert_eq!(summary.iterations, 1);
    assert_eq!(runner.calls(), 1);
    match &summary.notes[..] {
        [RunNote::DryRun { planned }] => {
            assert!(planned.contains(&"tests/Domain.UnitTests/Entities/XTests.cs".to_string()))
        }
        other => panic!("unexpected notes: {other:?}"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_never_exceeds_iteration_cap(cap in 0u32..4) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let fixture = Fixture::new();
        let fs = MemoryFileSystem::new();
        let runner = ScriptedRunner::always(x_and_y(10.0));

        let summary = rt.block_on(
            fixture
                .orchestrator(&fs, &runner)
                .with_max_iterations(cap)
                .run(&target("files:X,Y"), &mut headless(RecoveryDecisionKind::Abort)),
        );

        prop_assert_eq!(summary.iterations, cap);
        prop_assert_eq!(runner.calls(), cap as usize + 1);
        prop_assert_eq!(summary.final_phase, Phase::Report);
    }
}
