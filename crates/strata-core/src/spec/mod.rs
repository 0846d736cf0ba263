//! Feature requests and their resolution into canonical specs.

pub mod model;
pub mod parser;

pub use model::{
    FeatureSpec, Operation, OptionValue, PropertyKind, PropertySpec, RawFeatureRequest,
};

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{OptionKind, OptionSchema, StrataConfig};
use crate::error::{StrataError, StrataResult};
use crate::naming::NamingEngine;

/// Validates raw requests and produces [`FeatureSpec`]s. Side-effect free.
#[derive(Debug, Clone)]
pub struct SpecResolver {
    naming: NamingEngine,
    reserved: BTreeSet<String>,
    options: OptionSchema,
}

impl SpecResolver {
    pub fn new(naming: NamingEngine, reserved: &[String], options: OptionSchema) -> Self {
        let reserved = reserved
            .iter()
            .filter_map(|r| parser::normalize_property_name(r))
            .collect();
        Self {
            naming,
            reserved,
            options,
        }
    }

    pub fn from_config(config: &StrataConfig) -> Self {
        Self::new(
            config.naming_engine(),
            &config.spec.reserved_properties,
            config.options.clone(),
        )
    }

    pub fn naming(&self) -> &NamingEngine {
        &self.naming
    }

    pub fn option_schema(&self) -> &OptionSchema {
        &self.options
    }

    /// Resolve `raw` into a spec.
    ///
    /// An invalid base name is reported on its own; every other problem is
    /// collected into a single [`StrataError::Spec`].
    pub fn resolve(&self, raw: &RawFeatureRequest) -> StrataResult<FeatureSpec> {
        let base_name = raw.name.trim().to_string();
        let naming = self.naming.derive(&base_name)?;

        let mut problems: Vec<String> = Vec::new();

        let mut properties = Vec::new();
        let mut seen = BTreeSet::new();
        for entry in raw.properties.iter().flat_map(|p| parser::split_list(p)) {
            match parser::parse_property(&entry) {
                Ok(prop) => {
                    if self.reserved.contains(&prop.name) {
                        problems.push(format!("property '{}' is reserved", prop.name));
                    } else if !seen.insert(prop.name.clone()) {
                        problems.push(format!("property '{}' is declared twice", prop.name));
                    } else {
                        properties.push(prop);
                    }
                }
                Err(e) => problems.push(e),
            }
        }

        let mut operations = BTreeSet::new();
        match parser::parse_operations(&raw.operations) {
            Ok(ops) if ops.is_empty() => {
                problems.push("at least one operation is required".to_string())
            }
            Ok(ops) => operations.extend(ops),
            Err(e) => problems.push(e),
        }

        let mut options = BTreeMap::new();
        for entry in raw.options.iter().flat_map(|o| parser::split_list(o)) {
            match self.resolve_option(&entry) {
                Ok((key, value)) => {
                    if options.insert(key.clone(), value).is_some() {
                        problems.push(format!("option '{key}' given twice"));
                    }
                }
                Err(e) => problems.push(e),
            }
        }

        if !problems.is_empty() {
            return Err(StrataError::spec(problems.join("; ")));
        }

        tracing::debug!(
            "Resolved feature '{}' ({} properties, {} operations, {} options)",
            naming.pascal_singular,
            properties.len(),
            operations.len(),
            options.len()
        );

        Ok(FeatureSpec {
            base_name,
            naming,
            properties,
            operations,
            options,
        })
    }

    /// Match `key[=value]` against the option schema. Keys match
    /// case-insensitively and are stored under their schema spelling.
    fn resolve_option(&self, entry: &str) -> Result<(String, OptionValue), String> {
        let (key, value) = parser::parse_option(entry);
        let (canonical, kind) = self
            .options
            .0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
            .ok_or_else(|| {
                let known: Vec<&str> = self.options.keys().collect();
                format!("unknown option '{key}' (known: {})", known.join(", "))
            })?;

        let value = match kind {
            OptionKind::Bool => match value.as_deref() {
                None => OptionValue::Flag(true),
                Some(v) => OptionValue::Flag(
                    parser::parse_bool(v)
                        .ok_or_else(|| format!("option '{canonical}' expects a boolean, got '{v}'"))?,
                ),
            },
            OptionKind::Choice(choices) => {
                let v = value
                    .map(|v| v.to_lowercase())
                    .ok_or_else(|| format!("option '{canonical}' needs a value: {}", choices.join("|")))?;
                if !choices.contains(&v) {
                    return Err(format!(
                        "option '{canonical}' must be one of {}, got '{v}'",
                        choices.join("|")
                    ));
                }
                OptionValue::Choice(v)
            }
        };
        Ok((canonical.clone(), value))
    }
}
