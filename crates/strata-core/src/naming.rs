//! Naming engine: every casing and pluralization variant of a feature name.
//!
//! Variants are a pure function of the base name and the rule table held by
//! [`NamingEngine`]. Re-deriving from any produced variant yields the same
//! set, which is what lets generated artifacts cross-reference each other by
//! name without coordination.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{StrataError, StrataResult};

/// Built-in irregular plurals (singular, plural).
const IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("tooth", "teeth"),
    ("foot", "feet"),
    ("ox", "oxen"),
    ("leaf", "leaves"),
    ("life", "lives"),
    ("knife", "knives"),
    ("wife", "wives"),
    ("half", "halves"),
    ("shelf", "shelves"),
    ("wolf", "wolves"),
    ("criterion", "criteria"),
    ("analysis", "analyses"),
    ("quiz", "quizzes"),
];

/// Words that are their own plural.
const UNCOUNTABLE: &[&str] = &[
    "equipment",
    "information",
    "money",
    "news",
    "rice",
    "series",
    "sheep",
    "species",
    "fish",
    "metadata",
    "data",
];

/// All derived forms of a feature name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingVariantSet {
    /// Lowercase singular words, e.g. `["order", "item"]`.
    pub words: Vec<String>,
    /// Lowercase plural words, e.g. `["order", "items"]`.
    pub plural_words: Vec<String>,
    pub pascal_singular: String,
    pub pascal_plural: String,
    pub camel_singular: String,
    pub camel_plural: String,
    pub kebab_singular: String,
    pub kebab_plural: String,
    pub snake_singular: String,
    pub snake_plural: String,
    pub title_singular: String,
    pub title_plural: String,
}

impl NamingVariantSet {
    /// Whether some segment of `path` names this feature.
    ///
    /// Each segment's stem is split into words and must start with the
    /// singular or plural words, optionally after an interface or verb
    /// prefix (`IInvoiceRepository`, `CreateInvoiceCommand`). `Order` matches
    /// `OrdersController.cs` but neither `BorderStyle.cs` nor, for `Item`,
    /// `OrderItem.cs`.
    pub fn is_mentioned_in(&self, path: &str) -> bool {
        path.split(['/', '\\'])
            .filter_map(|segment| segment.split('.').next())
            .any(|stem| {
                let words = split_words(stem);
                leads_with(&words, &self.words) || leads_with(&words, &self.plural_words)
            })
    }
}

/// Words allowed before the feature inside one path segment.
const SEGMENT_PREFIXES: &[&str] = &[
    "i", "create", "update", "delete", "get", "list", "search", "find", "add", "remove", "edit",
];

fn leads_with(words: &[String], feature: &[String]) -> bool {
    if feature.is_empty() {
        return false;
    }
    for start in 0..words.len() {
        if words[start..].starts_with(feature) {
            return true;
        }
        if !SEGMENT_PREFIXES.contains(&words[start].as_str()) {
            return false;
        }
    }
    false
}

/// Pluralization rules and the derivation entry point.
#[derive(Debug, Clone)]
pub struct NamingEngine {
    irregular: BTreeMap<String, String>,
    uncountable: BTreeSet<String>,
}

impl Default for NamingEngine {
    fn default() -> Self {
        Self {
            irregular: IRREGULAR_PLURALS
                .iter()
                .map(|(s, p)| (s.to_string(), p.to_string()))
                .collect(),
            uncountable: UNCOUNTABLE.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl NamingEngine {
    /// Built-in rules extended with configured overrides.
    pub fn with_overrides(irregular: &BTreeMap<String, String>, uncountable: &[String]) -> Self {
        let mut engine = Self::default();
        for (singular, plural) in irregular {
            engine
                .irregular
                .insert(singular.to_lowercase(), plural.to_lowercase());
        }
        engine
            .uncountable
            .extend(uncountable.iter().map(|w| w.to_lowercase()));
        engine
    }

    /// Derive every variant of `base_name`.
    ///
    /// Base names are ASCII only. Generated identifiers must stay valid in
    /// every target language, and letters whose case mapping changes length
    /// (`ß` → `SS`) would not re-derive to the same words.
    pub fn derive(&self, base_name: &str) -> StrataResult<NamingVariantSet> {
        if base_name.trim().is_empty() {
            return Err(StrataError::invalid_name(base_name, "name is empty"));
        }
        if !base_name.is_ascii() {
            return Err(StrataError::invalid_name(base_name, "name must be ASCII"));
        }
        if !base_name.chars().any(char::is_alphabetic) {
            return Err(StrataError::invalid_name(
                base_name,
                "name must contain at least one letter",
            ));
        }

        let words = split_words(base_name);
        let mut plural_words = words.clone();
        if let Some(last) = plural_words.last_mut() {
            *last = self.pluralize(last);
        }

        Ok(NamingVariantSet {
            pascal_singular: pascal(&words),
            pascal_plural: pascal(&plural_words),
            camel_singular: camel(&words),
            camel_plural: camel(&plural_words),
            kebab_singular: joined(&words, '-'),
            kebab_plural: joined(&plural_words, '-'),
            snake_singular: joined(&words, '_'),
            snake_plural: joined(&plural_words, '_'),
            title_singular: title(&words),
            title_plural: title(&plural_words),
            words,
            plural_words,
        })
    }

    /// Plural of a single lowercase word.
    pub fn pluralize(&self, word: &str) -> String {
        let word = word.to_lowercase();
        if self.uncountable.contains(&word) {
            return word;
        }
        if let Some(plural) = self.irregular.get(&word) {
            return plural.clone();
        }
        if word.chars().all(|c| c.is_numeric()) {
            return format!("{word}s");
        }
        if let Some(stem) = word.strip_suffix('y') {
            if stem.chars().last().is_some_and(|c| !is_vowel(c)) {
                return format!("{stem}ies");
            }
        }
        if ["s", "x", "z", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
            return format!("{word}es");
        }
        format!("{word}s")
    }

    /// Best-effort inverse of [`pluralize`](Self::pluralize).
    pub fn singularize(&self, word: &str) -> String {
        let word = word.to_lowercase();
        if self.uncountable.contains(&word) {
            return word;
        }
        if let Some((singular, _)) = self.irregular.iter().find(|(_, p)| **p == word) {
            return singular.clone();
        }
        if let Some(stem) = word.strip_suffix("ies") {
            if !stem.is_empty() {
                return format!("{stem}y");
            }
        }
        if ["sses", "shes", "ches", "xes", "uses"]
            .iter()
            .any(|s| word.ends_with(s))
        {
            return word[..word.len() - 2].to_string();
        }
        match word.strip_suffix('s') {
            Some(stem) if !stem.is_empty() && !stem.ends_with('s') => stem.to_string(),
            _ => word,
        }
    }
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Split an identifier or phrase into lowercase words.
///
/// Boundaries: any non-alphanumeric character, lower→upper, the last capital
/// of an acronym run (`HTTPServer` → `http`, `server`), and every
/// letter↔digit transition. Adjacent single-letter words are merged so that
/// `A B` and its Pascal form `Ab` split identically; adjacent digit runs
/// merge for the same reason.
pub fn split_words(input: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();

    for chunk in input.split(|c: char| !c.is_alphanumeric()) {
        let chars: Vec<char> = chunk.chars().collect();
        let mut current = String::new();

        for (i, &c) in chars.iter().enumerate() {
            if i > 0 && !current.is_empty() {
                let prev = chars[i - 1];
                let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
                let boundary = (c.is_uppercase() && prev.is_lowercase())
                    || (c.is_uppercase() && prev.is_uppercase() && next_is_lower)
                    || (c.is_numeric() != prev.is_numeric());
                if boundary {
                    words.push(std::mem::take(&mut current));
                }
            }
            current.push(c);
        }
        if !current.is_empty() {
            words.push(current);
        }
    }

    let mut merged: Vec<String> = Vec::with_capacity(words.len());
    for word in words.into_iter().map(|w| w.to_lowercase()) {
        match merged.last_mut() {
            Some(prev)
                if (is_single_letter(prev) && is_single_letter(&word))
                    || (is_numeric(prev) && is_numeric(&word)) =>
            {
                prev.push_str(&word);
            }
            _ => merged.push(word),
        }
    }
    merged
}

fn is_single_letter(word: &str) -> bool {
    let mut chars = word.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_alphabetic())
}

fn is_numeric(word: &str) -> bool {
    !word.is_empty() && word.chars().all(char::is_numeric)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn pascal(words: &[String]) -> String {
    words.iter().map(|w| capitalize(w)).collect()
}

fn camel(words: &[String]) -> String {
    match words.split_first() {
        Some((first, rest)) => {
            let mut out = first.clone();
            out.extend(rest.iter().map(|w| capitalize(w)));
            out
        }
        None => String::new(),
    }
}

/// Join with a separator; digit runs stay attached to the preceding word.
fn joined(words: &[String], sep: char) -> String {
    let mut out = String::new();
    for word in words {
        if !out.is_empty() && !is_numeric(word) {
            out.push(sep);
        }
        out.push_str(word);
    }
    out
}

fn title(words: &[String]) -> String {
    words
        .iter()
        .map(|w| capitalize(w))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regular_plural() {
        let names = NamingEngine::default().derive("Invoice").unwrap();
        assert_eq!(names.pascal_singular, "Invoice");
        assert_eq!(names.pascal_plural, "Invoices");
        assert_eq!(names.kebab_plural, "invoices");
    }

    #[test]
    fn test_y_to_ies() {
        let names = NamingEngine::default().derive("Category").unwrap();
        assert_eq!(names.pascal_singular, "Category");
        assert_eq!(names.pascal_plural, "Categories");
        assert_eq!(NamingEngine::default().pluralize("day"), "days");
    }

    #[test]
    fn test_es_suffixes() {
        let engine = NamingEngine::default();
        assert_eq!(engine.pluralize("box"), "boxes");
        assert_eq!(engine.pluralize("address"), "addresses");
        assert_eq!(engine.pluralize("batch"), "batches");
        assert_eq!(engine.pluralize("wish"), "wishes");
    }

    #[test]
    fn test_irregular_and_uncountable() {
        let engine = NamingEngine::default();
        assert_eq!(engine.derive("person").unwrap().pascal_plural, "People");
        assert_eq!(engine.derive("Equipment").unwrap().pascal_plural, "Equipment");
    }

    #[test]
    fn test_configured_override() {
        let mut irregular = BTreeMap::new();
        irregular.insert("Cactus".to_string(), "Cacti".to_string());
        let engine = NamingEngine::with_overrides(&irregular, &["Feedback".to_string()]);
        assert_eq!(engine.pluralize("cactus"), "cacti");
        assert_eq!(engine.pluralize("feedback"), "feedback");
    }

    #[test]
    fn test_casings_from_phrase() {
        let names = NamingEngine::default().derive("order item").unwrap();
        assert_eq!(names.words, vec!["order", "item"]);
        assert_eq!(names.pascal_singular, "OrderItem");
        assert_eq!(names.camel_plural, "orderItems");
        assert_eq!(names.kebab_singular, "order-item");
        assert_eq!(names.snake_plural, "order_items");
        assert_eq!(names.title_plural, "Order Items");
    }

    #[test]
    fn test_split_acronyms_and_digits() {
        assert_eq!(split_words("HTTPServer"), vec!["http", "server"]);
        assert_eq!(split_words("oauth2_client"), vec!["oauth", "2", "client"]);
        assert_eq!(split_words("A B"), vec!["ab"]);
        assert_eq!(split_words("x-ray"), vec!["x", "ray"]);
        assert_eq!(split_words("v1 2 beta"), vec!["v", "12", "beta"]);
    }

    #[test]
    fn test_digits_stay_attached_in_snake() {
        let names = NamingEngine::default().derive("Oauth2Client").unwrap();
        assert_eq!(names.snake_singular, "oauth2_client");
        assert_eq!(names.kebab_plural, "oauth2-clients");
    }

    #[test]
    fn test_rederive_from_pascal() {
        let engine = NamingEngine::default();
        for name in ["order item", "HTTPServer", "line_item-v2", "A B c", "x ray"] {
            let first = engine.derive(name).unwrap();
            let second = engine.derive(&first.pascal_singular).unwrap();
            assert_eq!(first, second, "re-derivation changed variants of {name}");
        }
    }

    #[test]
    fn test_invalid_names() {
        let engine = NamingEngine::default();
        assert!(matches!(engine.derive(""), Err(StrataError::InvalidName { .. })));
        assert!(matches!(engine.derive("   "), Err(StrataError::InvalidName { .. })));
        assert!(matches!(engine.derive("123-45"), Err(StrataError::InvalidName { .. })));
    }

    #[test]
    fn test_non_ascii_names_rejected() {
        let engine = NamingEngine::default();
        for name in ["ßa", "Café", "Ünit Price", "Order\u{00a0}Item"] {
            let err = engine.derive(name).unwrap_err();
            assert!(err.to_string().contains("ASCII"), "{name:?}: {err}");
        }
    }

    #[test]
    fn test_singularize() {
        let engine = NamingEngine::default();
        assert_eq!(engine.singularize("invoices"), "invoice");
        assert_eq!(engine.singularize("categories"), "category");
        assert_eq!(engine.singularize("statuses"), "status");
        assert_eq!(engine.singularize("boxes"), "box");
        assert_eq!(engine.singularize("people"), "person");
        assert_eq!(engine.singularize("address"), "address");
    }

    #[test]
    fn test_mentions() {
        let names = NamingEngine::default().derive("Invoice").unwrap();
        assert!(names.is_mentioned_in("src/Application/Invoices/CreateInvoiceCommand.cs"));
        assert!(!names.is_mentioned_in("src/Domain/Entities/Customer.cs"));
        assert!(names.is_mentioned_in("src\\Domain\\Interfaces\\IInvoiceRepository.cs"));
        assert!(names.is_mentioned_in("tests/invoice_service_tests.rs"));
    }

    #[test]
    fn test_mentions_need_whole_words() {
        let engine = NamingEngine::default();
        let order = engine.derive("Order").unwrap();
        assert!(!order.is_mentioned_in("src/UI/BorderStyle.cs"));
        assert!(!order.is_mentioned_in("src/Domain/Recorder.cs"));
        assert!(order.is_mentioned_in("src/WebApi/Controllers/OrdersController.cs"));

        let item = engine.derive("Item").unwrap();
        assert!(!item.is_mentioned_in("src/Domain/Entities/OrderItem.cs"));
        assert!(item.is_mentioned_in("src/Application/Items/GetItemQuery.cs"));

        let line = engine.derive("Order Item").unwrap();
        assert!(line.is_mentioned_in("src/WebApi/Controllers/OrderItemsController.cs"));
        assert!(!line.is_mentioned_in("src/Domain/Entities/Order.cs"));
    }
}
