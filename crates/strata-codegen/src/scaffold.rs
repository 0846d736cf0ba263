//! Layer-ordered scaffolding of one feature, with interactive recovery.

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

use strata_core::cancel::CancelSignal;
use strata_core::config::MarkerTieBreak;
use strata_core::layer::Layer;
use strata_core::recovery::{Failure, FailurePoint, RecoveryController, RecoveryDecision};
use strata_core::spec::{FeatureSpec, RawFeatureRequest, SpecResolver};
use strata_core::StrataResult;

use crate::catalog::{TemplateCatalog, TemplateDescriptor};
use crate::emitter::{ArtifactEmitter, ArtifactFailure, GeneratedArtifact};
use crate::fs::FileSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaffoldOutcome {
    Completed,
    Aborted,
    Cancelled,
}

/// A failed template as it appears in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub template_id: String,
    pub layer: Layer,
    pub kind: &'static str,
    pub message: String,
}

impl From<&ArtifactFailure> for FailureRecord {
    fn from(failure: &ArtifactFailure) -> Self {
        Self {
            template_id: failure.template_id.clone(),
            layer: failure.layer,
            kind: failure.error.kind(),
            message: failure.error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScaffoldReport {
    /// Pascal singular name of the feature that was emitted.
    pub feature: String,
    /// The request that produced the final attempt.
    pub request: RawFeatureRequest,
    pub artifacts: Vec<GeneratedArtifact>,
    pub failures: Vec<FailureRecord>,
    pub skipped_layers: Vec<Layer>,
    /// Number of times the run restarted on a modified request.
    pub restarts: u32,
    pub outcome: ScaffoldOutcome,
}

impl ScaffoldReport {
    fn start(spec: &FeatureSpec, request: &RawFeatureRequest, restarts: u32) -> Self {
        Self {
            feature: spec.naming.pascal_singular.clone(),
            request: request.clone(),
            artifacts: Vec::new(),
            failures: Vec::new(),
            skipped_layers: Vec::new(),
            restarts,
            outcome: ScaffoldOutcome::Completed,
        }
    }

    pub fn written(&self) -> impl Iterator<Item = &GeneratedArtifact> {
        self.artifacts.iter().filter(|a| a.wrote())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &GeneratedArtifact> {
        self.artifacts.iter().filter(|a| a.is_skipped())
    }

    /// Completed, but something was skipped or left failed.
    pub fn has_warnings(&self) -> bool {
        !self.failures.is_empty() || !self.skipped_layers.is_empty() || self.skipped().next().is_some()
    }

    /// Artifacts written by attempts abandoned through a modified request
    /// are still on disk; keep the ones this attempt did not supersede.
    fn carry(&mut self, earlier: Vec<GeneratedArtifact>) {
        let current: BTreeSet<PathBuf> = self.artifacts.iter().map(|a| a.path.clone()).collect();
        let kept: Vec<GeneratedArtifact> = earlier
            .into_iter()
            .filter(|a| a.wrote() && !current.contains(&a.path))
            .collect();
        self.artifacts.splice(0..0, kept);
    }
}

enum LayerStep {
    Done,
    Restart(RawFeatureRequest, FeatureSpec),
    Stop(ScaffoldOutcome),
}

/// Drives one feature through the catalog, layer by layer.
pub struct Scaffolder<'a> {
    catalog: &'a TemplateCatalog,
    resolver: &'a SpecResolver,
    fs: &'a dyn FileSystem,
    tie_break: MarkerTieBreak,
    layers: Option<BTreeSet<Layer>>,
    cancel: CancelSignal,
}

impl<'a> Scaffolder<'a> {
    pub fn new(catalog: &'a TemplateCatalog, resolver: &'a SpecResolver, fs: &'a dyn FileSystem) -> Self {
        Self {
            catalog,
            resolver,
            fs,
            tie_break: MarkerTieBreak::default(),
            layers: None,
            cancel: CancelSignal::never(),
        }
    }

    pub fn with_tie_break(mut self, tie_break: MarkerTieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Restrict emission to `layers`.
    pub fn only_layers(mut self, layers: impl IntoIterator<Item = Layer>) -> Self {
        self.layers = Some(layers.into_iter().collect());
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    fn layers_in_scope(&self) -> Vec<Layer> {
        self.catalog
            .layers()
            .into_iter()
            .filter(|l| self.layers.as_ref().map_or(true, |only| only.contains(l)))
            .collect()
    }

    /// Resolve `request` and emit every layer in order.
    ///
    /// Only request resolution errors are returned as `Err`; emission
    /// failures go through `recovery` and end up in the report.
    pub fn run(
        &self,
        request: &RawFeatureRequest,
        recovery: &mut RecoveryController,
    ) -> StrataResult<ScaffoldReport> {
        let mut request = request.clone();
        let mut spec = self.resolver.resolve(&request)?;
        let mut earlier: Vec<GeneratedArtifact> = Vec::new();
        let mut restarts = 0;

        loop {
            tracing::info!(
                "Scaffolding {} ({} layers)",
                spec.naming.pascal_singular,
                self.layers_in_scope().len()
            );
            let mut emitter = ArtifactEmitter::new(self.catalog, self.fs, self.tie_break);
            let mut report = ScaffoldReport::start(&spec, &request, restarts);
            let mut restart = None;

            for layer in self.layers_in_scope() {
                let templates = self.catalog.resolve(layer, &spec);
                if templates.is_empty() {
                    tracing::debug!("No templates apply to layer {}", layer);
                    continue;
                }
                match self.emit_layer(&mut emitter, &spec, &request, layer, templates, recovery, &mut report) {
                    LayerStep::Done => {}
                    LayerStep::Restart(next_request, next_spec) => {
                        restart = Some((next_request, next_spec));
                        break;
                    }
                    LayerStep::Stop(outcome) => {
                        report.outcome = outcome;
                        break;
                    }
                }
            }

            match restart {
                Some((next_request, next_spec)) => {
                    tracing::info!("Restarting with modified request for '{}'", next_request.name);
                    earlier.append(&mut report.artifacts);
                    request = next_request;
                    spec = next_spec;
                    restarts += 1;
                }
                None => {
                    report.carry(earlier);
                    return Ok(report);
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_layer(
        &self,
        emitter: &mut ArtifactEmitter<'_>,
        spec: &FeatureSpec,
        request: &RawFeatureRequest,
        layer: Layer,
        templates: Vec<&TemplateDescriptor>,
        recovery: &mut RecoveryController,
        report: &mut ScaffoldReport,
    ) -> LayerStep {
        let mut pending = templates;

        loop {
            let result = emitter.emit_layer(spec, layer, &pending, &self.cancel);
            report.artifacts.extend(result.artifacts);
            if result.cancelled {
                report.failures.extend(result.failures.iter().map(FailureRecord::from));
                return LayerStep::Stop(ScaffoldOutcome::Cancelled);
            }
            if result.failures.is_empty() {
                return LayerStep::Done;
            }

            let mut messages: Vec<String> = result.failures.iter().map(|f| f.error.to_string()).collect();
            loop {
                let failure = Failure::new(FailurePoint::Emit(layer), messages.clone())
                    .with_request(request.clone());
                match recovery.decide(&failure) {
                    RecoveryDecision::Retry => {
                        let failed: BTreeSet<&str> =
                            result.failures.iter().map(|f| f.template_id.as_str()).collect();
                        pending.retain(|t| failed.contains(t.id.as_str()));
                        break;
                    }
                    RecoveryDecision::Skip => {
                        report.failures.extend(result.failures.iter().map(FailureRecord::from));
                        report.skipped_layers.push(layer);
                        return LayerStep::Done;
                    }
                    RecoveryDecision::Modify(next) => match self.resolver.resolve(&next) {
                        Ok(next_spec) => return LayerStep::Restart(next, next_spec),
                        Err(e) => {
                            // Ask again with the resolution problem.
                            tracing::warn!("Modified request rejected: {}", e);
                            messages = vec![e.to_string()];
                        }
                    },
                    RecoveryDecision::Abort => {
                        report.failures.extend(result.failures.iter().map(FailureRecord::from));
                        return LayerStep::Stop(ScaffoldOutcome::Aborted);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogSource;
    use crate::fs::MemoryFileSystem;
    use strata_core::config::{OptionSchema, RecoveryConfig, StrataConfig};
    use strata_core::recovery::{RecoveryDecisionKind, RecoveryPolicy};
    use strata_core::StrataError;

    const MANIFEST: &str = r#"
        [[template]]
        id = "entity"
        layer = "domain"
        path = "src/{{ pascal_singular }}.cs"
        content = "class {{ pascal_singular }} {}\n"

        [[template]]
        id = "tenant"
        layer = "application"
        path = "src/{{ pascal_plural }}/Tenant.cs"
        content = "{% if name == 'Invoice' %}{{ tenant }}{% else %}ok{% endif %}\n"

        [[template]]
        id = "tests"
        layer = "tests"
        path = "tests/{{ pascal_singular }}Tests.cs"
        content = "tests\n"
    "#;

    fn catalog() -> TemplateCatalog {
        TemplateCatalog::from_manifest(MANIFEST, &OptionSchema::default(), CatalogSource::Builtin, |f| {
            Err(StrataError::Template(f.to_string()))
        })
        .unwrap()
    }

    fn resolver() -> SpecResolver {
        SpecResolver::from_config(&StrataConfig::default())
    }

    fn headless(kind: RecoveryDecisionKind) -> RecoveryController {
        RecoveryController::headless(&RecoveryConfig {
            default: kind,
            max_retries: 2,
        })
    }

    struct RenameOnFailure;

    impl RecoveryPolicy for RenameOnFailure {
        fn decide(&mut self, failure: &Failure) -> RecoveryDecision {
            match &failure.request {
                Some(request) => RecoveryDecision::Modify(request.renamed("Receipt")),
                None => RecoveryDecision::Abort,
            }
        }
    }

    #[test]
    fn test_skip_continues_with_later_layers() {
        let (catalog, resolver, fs) = (catalog(), resolver(), MemoryFileSystem::new());
        let mut recovery = headless(RecoveryDecisionKind::Skip);
        let report = Scaffolder::new(&catalog, &resolver, &fs)
            .run(&RawFeatureRequest::for_tests("Invoice"), &mut recovery)
            .unwrap();

        assert_eq!(report.outcome, ScaffoldOutcome::Completed);
        assert_eq!(report.skipped_layers, vec![Layer::Application]);
        assert_eq!(report.failures[0].kind, "unresolved_placeholder");
        assert!(report.has_warnings());
        assert!(fs.get("tests/InvoiceTests.cs").is_some());
    }

    #[test]
    fn test_abort_stops_before_later_layers() {
        let (catalog, resolver, fs) = (catalog(), resolver(), MemoryFileSystem::new());
        let mut recovery = headless(RecoveryDecisionKind::Abort);
        let report = Scaffolder::new(&catalog, &resolver, &fs)
            .run(&RawFeatureRequest::for_tests("Invoice"), &mut recovery)
            .unwrap();

        assert_eq!(report.outcome, ScaffoldOutcome::Aborted);
        assert_eq!(report.written().count(), 1);
        assert!(fs.get("tests/InvoiceTests.cs").is_none());
    }

    #[test]
    fn test_retry_is_bounded_then_aborts() {
        let (catalog, resolver, fs) = (catalog(), resolver(), MemoryFileSystem::new());
        let mut recovery = headless(RecoveryDecisionKind::Retry);
        let report = Scaffolder::new(&catalog, &resolver, &fs)
            .run(&RawFeatureRequest::for_tests("Invoice"), &mut recovery)
            .unwrap();

        assert_eq!(report.outcome, ScaffoldOutcome::Aborted);
        let kinds: Vec<_> = recovery.decisions().iter().map(|d| d.decision).collect();
        assert_eq!(
            kinds,
            vec![
                RecoveryDecisionKind::Retry,
                RecoveryDecisionKind::Retry,
                RecoveryDecisionKind::Abort
            ]
        );
    }

    #[test]
    fn test_modify_restarts_with_new_request() {
        let (catalog, resolver, fs) = (catalog(), resolver(), MemoryFileSystem::new());
        let mut recovery = RecoveryController::new(Box::new(RenameOnFailure), 2);
        let report = Scaffolder::new(&catalog, &resolver, &fs)
            .run(&RawFeatureRequest::for_tests("Invoice"), &mut recovery)
            .unwrap();

        assert_eq!(report.outcome, ScaffoldOutcome::Completed);
        assert_eq!(report.feature, "Receipt");
        assert_eq!(report.restarts, 1);
        assert_eq!(fs.get("src/Receipts/Tenant.cs").as_deref(), Some("ok\n"));
        // The first attempt's entity stays on disk and in the report.
        assert!(report.artifacts.iter().any(|a| a.path == PathBuf::from("src/Invoice.cs")));
        assert!(report.artifacts.iter().any(|a| a.path == PathBuf::from("src/Receipt.cs")));
    }

    #[test]
    fn test_layer_filter_and_cancellation() {
        let (catalog, resolver, fs) = (catalog(), resolver(), MemoryFileSystem::new());
        let mut recovery = headless(RecoveryDecisionKind::Abort);
        let report = Scaffolder::new(&catalog, &resolver, &fs)
            .only_layers([Layer::Tests])
            .run(&RawFeatureRequest::for_tests("Invoice"), &mut recovery)
            .unwrap();
        assert_eq!(report.outcome, ScaffoldOutcome::Completed);
        assert_eq!(fs.files().len(), 1);

        let (handle, signal) = strata_core::cancel_pair();
        handle.cancel();
        let fs = MemoryFileSystem::new();
        let report = Scaffolder::new(&catalog, &resolver, &fs)
            .with_cancel(signal)
            .run(&RawFeatureRequest::for_tests("Invoice"), &mut recovery)
            .unwrap();
        assert_eq!(report.outcome, ScaffoldOutcome::Cancelled);
        assert_eq!(fs.write_count(), 0);
    }

    #[test]
    fn test_invalid_request_is_an_error() {
        let (catalog, resolver, fs) = (catalog(), resolver(), MemoryFileSystem::new());
        let mut recovery = headless(RecoveryDecisionKind::Abort);
        let err = Scaffolder::new(&catalog, &resolver, &fs)
            .run(&RawFeatureRequest::for_tests("42"), &mut recovery)
            .unwrap_err();
        assert!(matches!(err, StrataError::InvalidName { .. }));
    }
}
