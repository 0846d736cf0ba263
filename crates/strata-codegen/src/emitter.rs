//! Artifact emission: render, decide write/merge/skip, write once.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tera::Context;

use strata_core::cancel::CancelSignal;
use strata_core::config::MarkerTieBreak;
use strata_core::layer::Layer;
use strata_core::spec::FeatureSpec;
use strata_core::{StrataError, StrataResult};

use crate::catalog::{CollisionPolicy, TemplateCatalog, TemplateDescriptor};
use crate::fs::FileSystem;
use crate::hash::ContentHash;

/// What happened to one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ArtifactOutcome {
    Written,
    Merged,
    /// Target already had the intended content.
    Unchanged,
    Skipped { reason: String },
}

impl ArtifactOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Written => "written",
            Self::Merged => "merged",
            Self::Unchanged => "unchanged",
            Self::Skipped { .. } => "skipped",
        }
    }
}

/// A rendered artifact and its outcome. Never mutated once produced.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedArtifact {
    pub template_id: String,
    pub path: PathBuf,
    pub layer: Layer,
    #[serde(skip)]
    pub content: String,
    pub content_hash: ContentHash,
    pub collision: CollisionPolicy,
    #[serde(flatten)]
    pub outcome: ArtifactOutcome,
}

impl GeneratedArtifact {
    /// Whether the file system was written.
    pub fn wrote(&self) -> bool {
        matches!(self.outcome, ArtifactOutcome::Written | ArtifactOutcome::Merged)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, ArtifactOutcome::Skipped { .. })
    }
}

/// A template that failed to emit.
#[derive(Debug)]
pub struct ArtifactFailure {
    pub template_id: String,
    pub layer: Layer,
    pub error: StrataError,
}

/// Result of emitting one layer. Failures do not stop siblings.
#[derive(Debug)]
pub struct LayerReport {
    pub layer: Layer,
    pub artifacts: Vec<GeneratedArtifact>,
    pub failures: Vec<ArtifactFailure>,
    /// Cancellation was observed before every template was attempted.
    pub cancelled: bool,
}

enum Plan {
    Write { content: String, outcome: ArtifactOutcome },
    Keep { content: String, outcome: ArtifactOutcome },
}

/// Emits templates against one file system. Holds the run-wide path
/// claims, so one emitter is used per scaffolding run.
pub struct ArtifactEmitter<'a> {
    catalog: &'a TemplateCatalog,
    fs: &'a dyn FileSystem,
    tie_break: MarkerTieBreak,
    claims: BTreeMap<PathBuf, String>,
}

impl<'a> ArtifactEmitter<'a> {
    pub fn new(catalog: &'a TemplateCatalog, fs: &'a dyn FileSystem, tie_break: MarkerTieBreak) -> Self {
        Self {
            catalog,
            fs,
            tie_break,
            claims: BTreeMap::new(),
        }
    }

    /// Emit a single template.
    pub fn emit(
        &mut self,
        spec: &FeatureSpec,
        layer: Layer,
        template: &TemplateDescriptor,
    ) -> StrataResult<GeneratedArtifact> {
        let context = self.catalog.context(spec);
        self.emit_with(&context, layer, template)
    }

    /// Emit `templates` in order, collecting failures. Cancellation is
    /// checked before each template.
    pub fn emit_layer(
        &mut self,
        spec: &FeatureSpec,
        layer: Layer,
        templates: &[&TemplateDescriptor],
        cancel: &CancelSignal,
    ) -> LayerReport {
        let context = self.catalog.context(spec);
        let mut report = LayerReport {
            layer,
            artifacts: Vec::new(),
            failures: Vec::new(),
            cancelled: false,
        };

        for template in templates {
            if cancel.is_cancelled() {
                tracing::warn!("Cancelled during layer {} before '{}'", layer, template.id);
                report.cancelled = true;
                break;
            }
            match self.emit_with(&context, layer, template) {
                Ok(artifact) => report.artifacts.push(artifact),
                Err(error) => {
                    tracing::warn!("Template '{}' failed: {}", template.id, error);
                    report.failures.push(ArtifactFailure {
                        template_id: template.id.clone(),
                        layer,
                        error,
                    });
                }
            }
        }
        report
    }

    fn emit_with(
        &mut self,
        context: &Context,
        layer: Layer,
        template: &TemplateDescriptor,
    ) -> StrataResult<GeneratedArtifact> {
        if template.layer != layer {
            return Err(StrataError::layering(format!(
                "template '{}' belongs to layer '{}', not '{}'",
                template.id, template.layer, layer
            )));
        }

        let path = self.catalog.render_path(template, context)?;
        let rendered = self.catalog.render_body(template, context)?;
        self.claim(&path, &template.id)?;

        let snapshot = self.read(&path)?;
        let mut plan = self.plan(template, &rendered, snapshot.as_deref());

        // The target may have changed since the snapshot; decide again on
        // what is actually there now.
        let fresh = self.read(&path)?;
        if ContentHash::of_existing(fresh.as_deref()) != ContentHash::of_existing(snapshot.as_deref()) {
            tracing::warn!("{} changed during planning, re-applying policy", path.display());
            plan = self.plan(template, &rendered, fresh.as_deref());
        }

        let (content, outcome) = match plan {
            Plan::Write { content, outcome } => {
                self.fs
                    .write(&path, &content)
                    .map_err(|e| StrataError::emit(&path, e))?;
                tracing::info!("{} {}", outcome.as_str(), path.display());
                (content, outcome)
            }
            Plan::Keep { content, outcome } => {
                match &outcome {
                    ArtifactOutcome::Skipped { reason } => {
                        tracing::warn!("Skipped {}: {}", path.display(), reason)
                    }
                    _ => tracing::debug!("Unchanged {}", path.display()),
                }
                (content, outcome)
            }
        };

        Ok(GeneratedArtifact {
            template_id: template.id.clone(),
            path,
            layer,
            content_hash: ContentHash::of(&content),
            content,
            collision: template.collision,
            outcome,
        })
    }

    /// First template to resolve to a path owns it for the whole run.
    fn claim(&mut self, path: &Path, template_id: &str) -> StrataResult<()> {
        match self.claims.get(path) {
            Some(owner) if owner != template_id => Err(StrataError::PathCollision {
                path: path.to_path_buf(),
                first: owner.clone(),
                second: template_id.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.claims.insert(path.to_path_buf(), template_id.to_string());
                Ok(())
            }
        }
    }

    fn read(&self, path: &Path) -> StrataResult<Option<String>> {
        self.fs.read(path).map_err(|e| StrataError::emit(path, e))
    }

    fn plan(&self, template: &TemplateDescriptor, rendered: &str, existing: Option<&str>) -> Plan {
        let write = |content: String| Plan::Write {
            content,
            outcome: ArtifactOutcome::Written,
        };
        let skip = |reason: String| Plan::Keep {
            content: rendered.to_string(),
            outcome: ArtifactOutcome::Skipped { reason },
        };
        let unchanged = |existing: &str| Plan::Keep {
            content: existing.to_string(),
            outcome: ArtifactOutcome::Unchanged,
        };

        match (template.collision, existing) {
            (CollisionPolicy::Overwrite | CollisionPolicy::Skip, None) => write(rendered.to_string()),
            (_, Some(current)) if ContentHash::of(current) == ContentHash::of(rendered) => unchanged(current),
            (CollisionPolicy::Overwrite, Some(_)) => write(rendered.to_string()),
            (CollisionPolicy::Skip, Some(_)) => skip("file exists and policy is skip".to_string()),
            (CollisionPolicy::MergeGuarded, None) => skip("merge target does not exist".to_string()),
            (CollisionPolicy::MergeGuarded, Some(current)) => {
                let marker = template.marker.as_deref().unwrap_or_default();
                match merge_before_marker(current, rendered, marker, self.tie_break) {
                    Ok(Some(merged)) => Plan::Write {
                        content: merged,
                        outcome: ArtifactOutcome::Merged,
                    },
                    Ok(None) => unchanged(current),
                    Err(reason) => skip(reason),
                }
            }
        }
    }
}

/// Insert `fragment` immediately before the marker line of `existing`.
///
/// `Ok(None)` when the fragment is already present. `Err` carries the
/// reason the merge was skipped.
pub fn merge_before_marker(
    existing: &str,
    fragment: &str,
    marker: &str,
    tie_break: MarkerTieBreak,
) -> Result<Option<String>, String> {
    let needle = fragment.trim();
    if needle.is_empty() || existing.contains(needle) {
        return Ok(None);
    }

    let lines: Vec<&str> = existing.split_inclusive('\n').collect();
    let markers: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.contains(marker))
        .map(|(i, _)| i)
        .collect();

    let at = match (markers.as_slice(), tie_break) {
        ([], _) => return Err(format!("marker '{marker}' not found")),
        ([only], _) => *only,
        (many, MarkerTieBreak::Skip) => {
            return Err(format!("marker '{marker}' appears {} times", many.len()))
        }
        (many, MarkerTieBreak::First) => many[0],
        (many, MarkerTieBreak::Last) => many[many.len() - 1],
    };

    let mut merged = String::with_capacity(existing.len() + fragment.len() + 1);
    for line in &lines[..at] {
        merged.push_str(line);
    }
    merged.push_str(fragment);
    if !fragment.ends_with('\n') {
        merged.push('\n');
    }
    for line in &lines[at..] {
        merged.push_str(line);
    }
    Ok(Some(merged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogSource;
    use crate::fs::MemoryFileSystem;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use strata_core::config::{OptionSchema, StrataConfig};
    use strata_core::spec::{RawFeatureRequest, SpecResolver};

    const MANIFEST: &str = r#"
        [[template]]
        id = "entity"
        layer = "domain"
        path = "src/{{ pascal_singular }}.cs"
        content = "class {{ pascal_singular }} {}\n"

        [[template]]
        id = "keep"
        layer = "domain"
        path = "src/{{ pascal_singular }}.Keep.cs"
        content = "generated\n"
        collision = "skip"

        [[template]]
        id = "broken"
        layer = "domain"
        path = "src/Broken.cs"
        content = "{{ tenant }}"

        [[template]]
        id = "dbset"
        layer = "data_access"
        path = "src/Db.cs"
        collision = "merge_guarded"
        marker = "// sets"
        content = "    DbSet<{{ pascal_singular }}> {{ pascal_plural }};\n"
    "#;

    fn catalog() -> TemplateCatalog {
        TemplateCatalog::from_manifest(MANIFEST, &OptionSchema::default(), CatalogSource::Builtin, |f| {
            Err(StrataError::Template(f.to_string()))
        })
        .unwrap()
    }

    fn invoice() -> FeatureSpec {
        SpecResolver::from_config(&StrataConfig::default())
            .resolve(&RawFeatureRequest::for_tests("Invoice"))
            .unwrap()
    }

    #[test]
    fn test_overwrite_then_unchanged() {
        let catalog = catalog();
        let fs = MemoryFileSystem::new().with_file("src/Invoice.cs", "old");
        let mut emitter = ArtifactEmitter::new(&catalog, &fs, MarkerTieBreak::Skip);
        let template = catalog.get("entity").unwrap();

        let first = emitter.emit(&invoice(), Layer::Domain, template).unwrap();
        assert_eq!(first.outcome, ArtifactOutcome::Written);
        assert_eq!(fs.get("src/Invoice.cs").as_deref(), Some("class Invoice {}\n"));

        let second = emitter.emit(&invoice(), Layer::Domain, template).unwrap();
        assert_eq!(second.outcome, ArtifactOutcome::Unchanged);
        assert_eq!(fs.write_count(), 1);
    }

    #[test]
    fn test_skip_keeps_existing() {
        let catalog = catalog();
        let fs = MemoryFileSystem::new().with_file("src/Invoice.Keep.cs", "hand edited\n");
        let mut emitter = ArtifactEmitter::new(&catalog, &fs, MarkerTieBreak::Skip);
        let artifact = emitter
            .emit(&invoice(), Layer::Domain, catalog.get("keep").unwrap())
            .unwrap();
        assert!(artifact.is_skipped());
        assert_eq!(fs.get("src/Invoice.Keep.cs").as_deref(), Some("hand edited\n"));
        assert_eq!(fs.write_count(), 0);
    }

    #[test]
    fn test_merge_inserts_before_marker_once() {
        let catalog = catalog();
        let fs = MemoryFileSystem::new().with_file("src/Db.cs", "class Db {\n    // sets\n}\n");
        let mut emitter = ArtifactEmitter::new(&catalog, &fs, MarkerTieBreak::Skip);
        let template = catalog.get("dbset").unwrap();

        let merged = emitter.emit(&invoice(), Layer::DataAccess, template).unwrap();
        assert_eq!(merged.outcome, ArtifactOutcome::Merged);
        assert_eq!(
            fs.get("src/Db.cs").as_deref(),
            Some("class Db {\n    DbSet<Invoice> Invoices;\n    // sets\n}\n")
        );

        let again = emitter.emit(&invoice(), Layer::DataAccess, template).unwrap();
        assert_eq!(again.outcome, ArtifactOutcome::Unchanged);
        assert_eq!(fs.write_count(), 1);
    }

    #[test]
    fn test_merge_without_target_or_marker_skips() {
        let catalog = catalog();
        let template = catalog.get("dbset").unwrap();

        let fs = MemoryFileSystem::new();
        let mut emitter = ArtifactEmitter::new(&catalog, &fs, MarkerTieBreak::Skip);
        assert!(emitter.emit(&invoice(), Layer::DataAccess, template).unwrap().is_skipped());

        let fs = MemoryFileSystem::new().with_file("src/Db.cs", "class Db {}\n");
        let mut emitter = ArtifactEmitter::new(&catalog, &fs, MarkerTieBreak::Skip);
        assert!(emitter.emit(&invoice(), Layer::DataAccess, template).unwrap().is_skipped());
        assert_eq!(fs.get("src/Db.cs").as_deref(), Some("class Db {}\n"));
    }

    #[test]
    fn test_multiple_markers_tie_break() {
        let existing = "a\n// m\nb\n// m\n";
        assert!(merge_before_marker(existing, "x\n", "// m", MarkerTieBreak::Skip).is_err());
        assert_eq!(
            merge_before_marker(existing, "x\n", "// m", MarkerTieBreak::First).unwrap().as_deref(),
            Some("a\nx\n// m\nb\n// m\n")
        );
        assert_eq!(
            merge_before_marker(existing, "x", "// m", MarkerTieBreak::Last).unwrap().as_deref(),
            Some("a\n// m\nb\nx\n// m\n")
        );
    }

    #[test]
    fn test_failure_does_not_stop_siblings() {
        let catalog = catalog();
        let fs = MemoryFileSystem::new();
        let mut emitter = ArtifactEmitter::new(&catalog, &fs, MarkerTieBreak::Skip);
        let spec = invoice();
        let templates = catalog.resolve(Layer::Domain, &spec);

        let report = emitter.emit_layer(&spec, Layer::Domain, &templates, &CancelSignal::never());
        assert_eq!(report.artifacts.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].template_id, "broken");
        assert!(matches!(
            report.failures[0].error,
            StrataError::UnresolvedPlaceholder { ref placeholder, .. } if placeholder == "tenant"
        ));
        assert!(!report.cancelled);
    }

    #[test]
    fn test_cancelled_layer_stops_before_next_template() {
        let catalog = catalog();
        let fs = MemoryFileSystem::new();
        let mut emitter = ArtifactEmitter::new(&catalog, &fs, MarkerTieBreak::Skip);
        let spec = invoice();
        let templates = catalog.resolve(Layer::Domain, &spec);
        let (handle, signal) = strata_core::cancel_pair();
        handle.cancel();

        let report = emitter.emit_layer(&spec, Layer::Domain, &templates, &signal);
        assert!(report.cancelled);
        assert!(report.artifacts.is_empty());
        assert_eq!(fs.write_count(), 0);
    }

    #[test]
    fn test_dot_segments_claim_the_same_path() {
        let manifest = r#"
            [[template]]
            id = "dotted"
            layer = "domain"
            path = "src/./{{ pascal_singular }}.cs"
            content = "a"

            [[template]]
            id = "plain"
            layer = "domain"
            path = "src/{{ pascal_singular }}.cs"
            content = "b"
        "#;
        let catalog = TemplateCatalog::from_manifest(manifest, &OptionSchema::default(), CatalogSource::Builtin, |f| {
            Err(StrataError::Template(f.to_string()))
        })
        .unwrap();
        let fs = MemoryFileSystem::new();
        let mut emitter = ArtifactEmitter::new(&catalog, &fs, MarkerTieBreak::Skip);

        let first = emitter
            .emit(&invoice(), Layer::Domain, catalog.get("dotted").unwrap())
            .unwrap();
        assert_eq!(first.path, PathBuf::from("src/Invoice.cs"));

        let err = emitter
            .emit(&invoice(), Layer::Domain, catalog.get("plain").unwrap())
            .unwrap_err();
        assert!(matches!(
            err,
            StrataError::PathCollision { ref first, ref second, .. } if first == "dotted" && second == "plain"
        ));
        assert_eq!(fs.get("src/Invoice.cs").as_deref(), Some("a"));
    }

    #[test]
    fn test_wrong_layer_rejected() {
        let catalog = catalog();
        let fs = MemoryFileSystem::new();
        let mut emitter = ArtifactEmitter::new(&catalog, &fs, MarkerTieBreak::Skip);
        let err = emitter
            .emit(&invoice(), Layer::Tests, catalog.get("entity").unwrap())
            .unwrap_err();
        assert!(matches!(err, StrataError::LayeringViolation(_)));
    }

    /// Simulates another writer creating the file between the planning
    /// read and the pre-write re-check.
    struct RacingFileSystem {
        inner: MemoryFileSystem,
        reads: AtomicUsize,
    }

    impl FileSystem for RacingFileSystem {
        fn read(&self, path: &Path) -> io::Result<Option<String>> {
            let current = self.inner.read(path)?;
            if self.reads.fetch_add(1, Ordering::SeqCst) == 0 {
                self.inner.write(path, "written by someone else\n")?;
            }
            Ok(current)
        }

        fn write(&self, path: &Path, content: &str) -> io::Result<()> {
            self.inner.write(path, content)
        }
    }

    #[test]
    fn test_recheck_before_write_reapplies_policy() {
        let catalog = catalog();
        let fs = RacingFileSystem {
            inner: MemoryFileSystem::new(),
            reads: AtomicUsize::new(0),
        };
        let mut emitter = ArtifactEmitter::new(&catalog, &fs, MarkerTieBreak::Skip);

        // Planned as a fresh write; the re-check sees the file and skips.
        let artifact = emitter
            .emit(&invoice(), Layer::Domain, catalog.get("keep").unwrap())
            .unwrap();
        assert!(artifact.is_skipped());
        assert_eq!(
            fs.inner.get("src/Invoice.Keep.cs").as_deref(),
            Some("written by someone else\n")
        );
    }
}
