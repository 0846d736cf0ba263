//! Mapping under-covered components back to feature names.

use std::collections::BTreeMap;
use std::path::Path;

use strata_core::config::QualityConfig;
use strata_core::naming::{split_words, NamingEngine};

/// Derives a feature name from a component id such as
/// `src/Application/Invoices/Commands/CreateInvoiceCommandHandler.cs`.
#[derive(Debug, Clone)]
pub struct ComponentMapper {
    prefixes: Vec<String>,
    /// Longest first, so `CommandHandler` wins over `Handler`.
    suffixes: Vec<String>,
    naming: NamingEngine,
}

impl ComponentMapper {
    pub fn new(config: &QualityConfig, naming: NamingEngine) -> Self {
        let mut suffixes = config.component_suffixes.clone();
        suffixes.sort_by_key(|s| std::cmp::Reverse(s.len()));
        let mut prefixes = config.component_prefixes.clone();
        prefixes.sort_by_key(|s| std::cmp::Reverse(s.len()));
        Self {
            prefixes,
            suffixes,
            naming,
        }
    }

    /// Pascal singular feature name, or `None` when nothing nameable is left.
    pub fn feature_name(&self, component: &str) -> Option<String> {
        let normalized = component.replace('\\', "/");
        let stem = Path::new(&normalized).file_stem()?.to_str()?;
        // Strip compound extensions such as `List.razor.cs`.
        let stem = stem.split('.').next().unwrap_or(stem);

        let mut core = stem;
        if let Some(rest) = self.strip_suffix(core) {
            core = rest;
        }
        if let Some(rest) = self.strip_prefix(core) {
            core = rest;
        }

        let mut words = split_words(core);
        if words.is_empty() || !words.iter().any(|w| w.chars().any(char::is_alphabetic)) {
            words = split_words(stem);
        }
        let last = words.pop()?;
        words.push(self.naming.singularize(&last));
        Some(words.iter().map(|w| capitalize(w)).collect())
    }

    /// Group components by feature, dropping those without a name.
    pub fn group<'a, I>(&self, components: I) -> BTreeMap<String, Vec<String>>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for component in components {
            match self.feature_name(component) {
                Some(name) => groups.entry(name).or_default().push(component.clone()),
                None => tracing::warn!("No feature name for component {}", component),
            }
        }
        groups
    }

    fn strip_prefix<'s>(&self, stem: &'s str) -> Option<&'s str> {
        self.prefixes.iter().find_map(|p| {
            stem.strip_prefix(p.as_str())
                .filter(|rest| rest.chars().next().is_some_and(char::is_uppercase))
        })
    }

    fn strip_suffix<'s>(&self, stem: &'s str) -> Option<&'s str> {
        self.suffixes
            .iter()
            .find_map(|s| stem.strip_suffix(s.as_str()).filter(|rest| !rest.is_empty()))
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
