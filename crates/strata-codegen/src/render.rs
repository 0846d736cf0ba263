//! Template rendering with tera.

use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error as _;
use tera::{Context, Tera};

use strata_core::naming::split_words;
use strata_core::spec::FeatureSpec;
use strata_core::{StrataError, StrataResult};

/// Compiled templates, keyed by name.
#[derive(Debug, Clone)]
pub struct Renderer {
    tera: Tera,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        let mut tera = Tera::default();
        tera.autoescape_on(Vec::new());
        Self { tera }
    }

    /// Compile `source` under `name`. Syntax errors are template errors.
    pub fn register(&mut self, name: &str, source: &str) -> StrataResult<()> {
        self.tera
            .add_raw_template(name, source)
            .map_err(|e| StrataError::Template(format!("{name}: {}", error_chain(&e))))
    }

    /// Render `name`. A variable missing from the context is an
    /// [`StrataError::UnresolvedPlaceholder`].
    pub fn render(&self, name: &str, context: &Context) -> StrataResult<String> {
        self.tera.render(name, context).map_err(|e| {
            let chain = error_chain(&e);
            match missing_variable(&chain) {
                Some(placeholder) => StrataError::UnresolvedPlaceholder {
                    template: name.to_string(),
                    placeholder,
                },
                None => StrataError::Template(format!("{name}: {chain}")),
            }
        })
    }
}

/// Every message in the error's source chain, joined.
fn error_chain(err: &tera::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}

/// Extract `x` from tera's "Variable `x` not found" message.
fn missing_variable(chain: &str) -> Option<String> {
    let start = chain.find("Variable `")? + "Variable `".len();
    let rest = &chain[start..];
    let end = rest.find('`')?;
    rest[end..]
        .starts_with("` not found")
        .then(|| rest[..end].to_string())
}

#[derive(Debug, Serialize)]
struct PropertyContext<'a> {
    name: &'a str,
    pascal: String,
    camel: String,
    kind: &'static str,
    #[serde(rename = "type")]
    type_name: String,
    required: bool,
    default: Option<&'a str>,
}

/// Build the render context for a feature.
///
/// Naming variants are top-level (`pascal_singular`, `kebab_plural`, ...).
/// `properties`, `operations` and `options` carry the rest of the feature;
/// `options` only holds options the request set. `types` maps property
/// kinds to target-language type names.
pub fn feature_context(spec: &FeatureSpec, types: &BTreeMap<String, String>) -> Context {
    let mut context = Context::new();
    let naming = &spec.naming;

    context.insert("name", &spec.base_name);
    context.insert("words", &naming.words);
    context.insert("pascal_singular", &naming.pascal_singular);
    context.insert("pascal_plural", &naming.pascal_plural);
    context.insert("camel_singular", &naming.camel_singular);
    context.insert("camel_plural", &naming.camel_plural);
    context.insert("kebab_singular", &naming.kebab_singular);
    context.insert("kebab_plural", &naming.kebab_plural);
    context.insert("snake_singular", &naming.snake_singular);
    context.insert("snake_plural", &naming.snake_plural);
    context.insert("title_singular", &naming.title_singular);
    context.insert("title_plural", &naming.title_plural);

    let properties: Vec<PropertyContext<'_>> = spec
        .properties
        .iter()
        .map(|p| {
            let words = split_words(&p.name);
            let pascal: String = words.iter().map(|w| capitalize(w)).collect();
            let camel = lower_first(&pascal);
            PropertyContext {
                name: &p.name,
                pascal,
                camel,
                kind: p.kind.as_str(),
                type_name: types
                    .get(p.kind.as_str())
                    .cloned()
                    .unwrap_or_else(|| p.kind.as_str().to_string()),
                required: p.required,
                default: p.default_value.as_deref(),
            }
        })
        .collect();
    context.insert("properties", &properties);

    let operations: Vec<&str> = spec.operations.iter().map(|o| o.as_str()).collect();
    context.insert("operations", &operations);
    context.insert("options", &spec.options);
    context
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn lower_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
