//! Template catalog: the read-only registry of artifact templates.
//!
//! A catalog is loaded once from `catalog.toml` (or the built-in copy),
//! validated as a whole, and then only read. Templates are stored in
//! emission order, so `resolve` never has to sort.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use tera::Context;

use strata_core::config::{OptionSchema, StrataConfig};
use strata_core::layer::{DependencyNode, DependencyOrderer, Layer};
use strata_core::spec::FeatureSpec;
use strata_core::{StrataError, StrataResult};

use crate::predicate::Predicate;
use crate::render::{feature_context, Renderer};

/// Manifest file name inside a catalog directory.
pub const MANIFEST_FILE: &str = "catalog.toml";

const BUILTIN_MANIFEST: &str = include_str!("templates/catalog.toml");

const BUILTIN_BODIES: &[(&str, &str)] = &[
    ("domain/entity.cs.tera", include_str!("templates/domain/entity.cs.tera")),
    ("domain/events.cs.tera", include_str!("templates/domain/events.cs.tera")),
    ("application/response.cs.tera", include_str!("templates/application/response.cs.tera")),
    ("application/repository.cs.tera", include_str!("templates/application/repository.cs.tera")),
    ("application/create.cs.tera", include_str!("templates/application/create.cs.tera")),
    ("application/update.cs.tera", include_str!("templates/application/update.cs.tera")),
    ("application/delete.cs.tera", include_str!("templates/application/delete.cs.tera")),
    ("application/get.cs.tera", include_str!("templates/application/get.cs.tera")),
    ("application/search.cs.tera", include_str!("templates/application/search.cs.tera")),
    ("mapping/mapping.cs.tera", include_str!("templates/mapping/mapping.cs.tera")),
    ("data/configuration.cs.tera", include_str!("templates/data/configuration.cs.tera")),
    ("data/repository.cs.tera", include_str!("templates/data/repository.cs.tera")),
    ("data/docker-compose.yml.tera", include_str!("templates/data/docker-compose.yml.tera")),
    ("transport/controller.cs.tera", include_str!("templates/transport/controller.cs.tera")),
    ("transport/hub.cs.tera", include_str!("templates/transport/hub.cs.tera")),
    ("presentation/list.razor.tera", include_str!("templates/presentation/list.razor.tera")),
    ("tests/entity.cs.tera", include_str!("templates/tests/entity.cs.tera")),
    ("tests/commands.cs.tera", include_str!("templates/tests/commands.cs.tera")),
    ("tests/controller.cs.tera", include_str!("templates/tests/controller.cs.tera")),
];

/// What to do when the target file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    #[default]
    Overwrite,
    Skip,
    /// Insert before an extension-point marker in the existing file.
    #[serde(alias = "merge-guarded")]
    MergeGuarded,
}

impl CollisionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overwrite => "overwrite",
            Self::Skip => "skip",
            Self::MergeGuarded => "merge_guarded",
        }
    }
}

/// One validated template.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateDescriptor {
    pub id: String,
    pub layer: Layer,
    /// Output path pattern, relative to the project root.
    pub path_pattern: String,
    #[serde(skip)]
    pub body: String,
    pub collision: CollisionPolicy,
    pub requires_layers: Vec<Layer>,
    /// Template ids emitted before this one.
    pub after: Vec<String>,
    pub predicate: Predicate,
    /// Extension-point marker for merge-guarded templates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
}

impl TemplateDescriptor {
    fn path_template(&self) -> String {
        path_template_name(&self.id)
    }
}

fn path_template_name(id: &str) -> String {
    format!("{id}#path")
}

/// Where a catalog came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    Builtin,
    Directory(PathBuf),
}

impl std::fmt::Display for CatalogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Builtin => f.write_str("built-in"),
            Self::Directory(dir) => write!(f, "{}", dir.display()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    #[serde(default)]
    types: BTreeMap<String, String>,
    #[serde(default, rename = "template")]
    templates: Vec<RawTemplate>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTemplate {
    id: String,
    layer: String,
    path: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    collision: CollisionPolicy,
    #[serde(default)]
    requires: Vec<String>,
    #[serde(default)]
    after: Vec<String>,
    #[serde(default)]
    when: Vec<String>,
    #[serde(default)]
    marker: Option<String>,
}

/// The loaded, validated template registry.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    templates: Vec<TemplateDescriptor>,
    types: BTreeMap<String, String>,
    renderer: Renderer,
    source: CatalogSource,
}

impl TemplateCatalog {
    /// Load the catalog configured for a project: `[catalog].path` when
    /// set, otherwise the built-in one.
    pub fn load(config: &StrataConfig, project_dir: &Path) -> StrataResult<Self> {
        match &config.catalog.path {
            Some(path) => Self::load_dir(&project_dir.join(path), &config.options),
            None => Self::builtin(&config.options),
        }
    }

    /// The embedded .NET clean-architecture catalog.
    pub fn builtin(schema: &OptionSchema) -> StrataResult<Self> {
        Self::from_manifest(BUILTIN_MANIFEST, schema, CatalogSource::Builtin, |file| {
            BUILTIN_BODIES
                .iter()
                .find(|(name, _)| *name == file)
                .map(|(_, body)| body.to_string())
                .ok_or_else(|| StrataError::Template(format!("no built-in body '{file}'")))
        })
    }

    /// Load `<dir>/catalog.toml`; body files resolve relative to `dir`.
    pub fn load_dir(dir: &Path, schema: &OptionSchema) -> StrataResult<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest = std::fs::read_to_string(&manifest_path).map_err(|e| {
            StrataError::config(format!("cannot read {}: {}", manifest_path.display(), e))
        })?;
        Self::from_manifest(
            &manifest,
            schema,
            CatalogSource::Directory(dir.to_path_buf()),
            |file| {
                let path = dir.join(file);
                std::fs::read_to_string(&path).map_err(|e| {
                    StrataError::Template(format!("cannot read body {}: {}", path.display(), e))
                })
            },
        )
    }

    /// Parse and validate a manifest. Every problem here is fatal.
    pub fn from_manifest<F>(
        manifest: &str,
        schema: &OptionSchema,
        source: CatalogSource,
        load_body: F,
    ) -> StrataResult<Self>
    where
        F: Fn(&str) -> StrataResult<String>,
    {
        let manifest: Manifest = toml::from_str(manifest)
            .map_err(|e| StrataError::Template(format!("{source}: invalid manifest: {e}")))?;

        let mut templates = Vec::with_capacity(manifest.templates.len());
        let mut renderer = Renderer::new();
        let mut ids = BTreeSet::new();

        for raw in manifest.templates {
            let invalid = |msg: String| StrataError::Template(format!("template '{}': {}", raw.id, msg));

            if raw.id.trim().is_empty() {
                return Err(StrataError::Template("template with empty id".to_string()));
            }
            if !ids.insert(raw.id.clone()) {
                return Err(invalid("duplicate id".to_string()));
            }
            let layer = Layer::from_str(&raw.layer)
                .ok_or_else(|| invalid(format!("unknown layer '{}'", raw.layer)))?;
            let requires_layers = raw
                .requires
                .iter()
                .map(|l| Layer::from_str(l).ok_or_else(|| invalid(format!("unknown layer '{l}'"))))
                .collect::<StrataResult<Vec<_>>>()?;

            let predicate = Predicate::parse(&raw.when).map_err(&invalid)?;
            predicate.validate(schema).map_err(&invalid)?;

            if raw.collision == CollisionPolicy::MergeGuarded
                && raw.marker.as_deref().map_or(true, |m| m.trim().is_empty())
            {
                return Err(invalid("merge_guarded requires a marker".to_string()));
            }
            if raw.path.trim().is_empty() {
                return Err(invalid("empty path".to_string()));
            }

            let body = match (&raw.body, &raw.content) {
                (Some(file), None) => load_body(file)?,
                (None, Some(inline)) => inline.clone(),
                (Some(_), Some(_)) => return Err(invalid("both body and content given".to_string())),
                (None, None) => return Err(invalid("needs a body file or inline content".to_string())),
            };

            renderer.register(&raw.id, &body)?;
            renderer.register(&path_template_name(&raw.id), raw.path.trim())?;

            templates.push(TemplateDescriptor {
                id: raw.id,
                layer,
                path_pattern: raw.path.trim().to_string(),
                body,
                collision: raw.collision,
                requires_layers,
                after: raw.after,
                predicate,
                marker: raw.marker.map(|m| m.trim().to_string()),
            });
        }

        let templates = order_templates(templates)?;
        tracing::debug!("Loaded {} templates from {} catalog", templates.len(), source);

        Ok(Self {
            templates,
            types: manifest.types,
            renderer,
            source,
        })
    }

    /// Templates for `layer` whose predicate holds for `spec`, in emission
    /// order.
    pub fn resolve(&self, layer: Layer, spec: &FeatureSpec) -> Vec<&TemplateDescriptor> {
        self.templates
            .iter()
            .filter(|t| t.layer == layer && t.predicate.evaluate(spec))
            .collect()
    }

    /// Every template in emission order.
    pub fn list(&self) -> &[TemplateDescriptor] {
        &self.templates
    }

    pub fn get(&self, id: &str) -> Option<&TemplateDescriptor> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// Layers that have at least one template, in order.
    pub fn layers(&self) -> Vec<Layer> {
        DependencyOrderer::new().order_layers(self.templates.iter().map(|t| t.layer))
    }

    pub fn source(&self) -> &CatalogSource {
        &self.source
    }

    /// Render context for a spec, with this catalog's type table.
    pub fn context(&self, spec: &FeatureSpec) -> Context {
        feature_context(spec, &self.types)
    }

    /// Render a template's output path. The result must stay inside the
    /// project root.
    pub fn render_path(&self, template: &TemplateDescriptor, context: &Context) -> StrataResult<PathBuf> {
        let rendered = self.renderer.render(&template.path_template(), context)?;
        let raw = PathBuf::from(rendered.trim());
        let escapes = raw
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        // `src/./X.cs` and `src/X.cs` must name the same file.
        let path: PathBuf = raw
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect();
        if escapes || path.as_os_str().is_empty() {
            return Err(StrataError::emit(
                raw,
                format!("template '{}' renders a path outside the project", template.id),
            ));
        }
        Ok(path)
    }

    pub fn render_body(&self, template: &TemplateDescriptor, context: &Context) -> StrataResult<String> {
        self.renderer.render(&template.id, context)
    }
}

/// Sort into emission order, enforcing layering rules.
fn order_templates(templates: Vec<TemplateDescriptor>) -> StrataResult<Vec<TemplateDescriptor>> {
    let nodes: Vec<DependencyNode<String>> = templates
        .iter()
        .map(|t| DependencyNode {
            key: t.id.clone(),
            layer: t.layer,
            depends_on: t.after.clone(),
            requires_layers: t.requires_layers.clone(),
        })
        .collect();
    let order = DependencyOrderer::new().order(&nodes)?;

    let mut by_id: BTreeMap<String, TemplateDescriptor> =
        templates.into_iter().map(|t| (t.id.clone(), t)).collect();
    Ok(order.iter().filter_map(|id| by_id.remove(id)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::spec::{RawFeatureRequest, SpecResolver};

    fn schema() -> OptionSchema {
        OptionSchema::default()
    }

    fn load(manifest: &str) -> StrataResult<TemplateCatalog> {
        TemplateCatalog::from_manifest(manifest, &schema(), CatalogSource::Builtin, |f| {
            Err(StrataError::Template(format!("no file {f}")))
        })
    }

    fn spec(ops: &[&str], options: &[&str]) -> FeatureSpec {
        SpecResolver::from_config(&StrataConfig::default())
            .resolve(&RawFeatureRequest {
                name: "Invoice".to_string(),
                properties: Vec::new(),
                operations: ops.iter().map(|s| s.to_string()).collect(),
                options: options.iter().map(|s| s.to_string()).collect(),
            })
            .unwrap()
    }

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = TemplateCatalog::builtin(&schema()).unwrap();
        assert!(!catalog.list().is_empty());
        assert_eq!(catalog.layers().first(), Some(&Layer::Domain));
        assert_eq!(catalog.layers().last(), Some(&Layer::Tests));
        for pair in catalog.list().windows(2) {
            assert!(pair[0].layer <= pair[1].layer);
        }
    }

    #[test]
    fn test_resolve_filters_by_layer_and_predicate() {
        let catalog = load(
            r#"
            [[template]]
            id = "entity"
            layer = "domain"
            path = "src/{{ pascal_singular }}.cs"
            content = "class {{ pascal_singular }} {}"

            [[template]]
            id = "soft-delete"
            layer = "domain"
            path = "src/{{ pascal_singular }}.SoftDelete.cs"
            content = "partial class {{ pascal_singular }} {}"
            when = ["softDelete"]

            [[template]]
            id = "create"
            layer = "application"
            path = "src/Create{{ pascal_singular }}.cs"
            content = "record Create{{ pascal_singular }};"
            when = ["op:create"]
            requires = ["domain"]
            "#,
        )
        .unwrap();

        let plain = spec(&["create"], &[]);
        let ids: Vec<&str> = catalog.resolve(Layer::Domain, &plain).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["entity"]);

        let soft = spec(&["read"], &["softDelete"]);
        assert_eq!(catalog.resolve(Layer::Domain, &soft).len(), 2);
        assert!(catalog.resolve(Layer::Application, &soft).is_empty());
    }

    #[test]
    fn test_after_orders_within_layer() {
        let catalog = load(
            r#"
            [[template]]
            id = "handler"
            layer = "application"
            path = "h.cs"
            content = "h"
            after = ["command"]

            [[template]]
            id = "command"
            layer = "application"
            path = "c.cs"
            content = "c"
            "#,
        )
        .unwrap();
        let ids: Vec<&str> = catalog.list().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["command", "handler"]);
    }

    #[test]
    fn test_forward_requirement_is_layering_violation() {
        let err = load(
            r#"
            [[template]]
            id = "entity"
            layer = "domain"
            path = "e.cs"
            content = "e"
            requires = ["transport"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, StrataError::LayeringViolation(_)));
    }

    #[test]
    fn test_cycle_is_layering_violation() {
        let err = load(
            r#"
            [[template]]
            id = "a"
            layer = "application"
            path = "a.cs"
            content = "a"
            after = ["b"]

            [[template]]
            id = "b"
            layer = "application"
            path = "b.cs"
            content = "b"
            after = ["a"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, StrataError::LayeringViolation(_)));
    }

    #[test]
    fn test_load_time_validation() {
        let cases = [
            // unknown layer
            "[[template]]\nid = \"x\"\nlayer = \"middleware\"\npath = \"x\"\ncontent = \"x\"\n",
            // unknown option
            "[[template]]\nid = \"x\"\nlayer = \"domain\"\npath = \"x\"\ncontent = \"x\"\nwhen = [\"colour\"]\n",
            // choice outside the schema
            "[[template]]\nid = \"x\"\nlayer = \"domain\"\npath = \"x\"\ncontent = \"x\"\nwhen = [\"databaseProvider=oracle\"]\n",
            // merge without marker
            "[[template]]\nid = \"x\"\nlayer = \"domain\"\npath = \"x\"\ncontent = \"x\"\ncollision = \"merge_guarded\"\n",
            // tera syntax
            "[[template]]\nid = \"x\"\nlayer = \"domain\"\npath = \"x\"\ncontent = \"{% if %}\"\n",
            // no body
            "[[template]]\nid = \"x\"\nlayer = \"domain\"\npath = \"x\"\n",
            // duplicate id
            "[[template]]\nid = \"x\"\nlayer = \"domain\"\npath = \"x\"\ncontent = \"x\"\n[[template]]\nid = \"x\"\nlayer = \"domain\"\npath = \"y\"\ncontent = \"y\"\n",
            // unknown field
            "[[template]]\nid = \"x\"\nlayer = \"domain\"\npath = \"x\"\ncontent = \"x\"\npriority = 1\n",
        ];
        for manifest in cases {
            let err = load(manifest).unwrap_err();
            assert!(err.is_configuration(), "expected configuration error for:\n{manifest}\ngot {err}");
        }
    }

    #[test]
    fn test_render_path_rejects_escape() {
        let catalog = load(
            "[[template]]\nid = \"x\"\nlayer = \"domain\"\npath = \"../{{ pascal_singular }}.cs\"\ncontent = \"x\"\n",
        )
        .unwrap();
        let s = spec(&["create"], &[]);
        let template = catalog.get("x").unwrap();
        let err = catalog.render_path(template, &catalog.context(&s)).unwrap_err();
        assert!(matches!(err, StrataError::Emit { .. }));
    }

    #[test]
    fn test_load_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("domain")).unwrap();
        std::fs::write(dir.path().join("domain/entity.tera"), "class {{ pascal_singular }} {}").unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            "[[template]]\nid = \"entity\"\nlayer = \"domain\"\npath = \"{{ pascal_singular }}.cs\"\nbody = \"domain/entity.tera\"\n",
        )
        .unwrap();
        let catalog = TemplateCatalog::load_dir(dir.path(), &schema()).unwrap();
        let s = spec(&["create"], &[]);
        let template = catalog.get("entity").unwrap();
        assert_eq!(catalog.render_body(template, &catalog.context(&s)).unwrap(), "class Invoice {}");
        assert!(matches!(catalog.source(), CatalogSource::Directory(_)));
    }
}
