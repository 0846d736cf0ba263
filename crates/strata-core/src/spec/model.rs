//! Feature specification models.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::naming::NamingVariantSet;

/// An unvalidated feature request as it arrives from the command line or a
/// recovery prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFeatureRequest {
    pub name: String,
    /// Property shorthand entries, `name:kind[?][=default]`.
    pub properties: Vec<String>,
    /// Operation names; `crud` and `all` expand.
    pub operations: Vec<String>,
    /// `key=value` pairs; a bare `key` means `key=true`.
    pub options: Vec<String>,
}

impl RawFeatureRequest {
    /// Request for `name` with every operation and nothing else, used when
    /// the quality loop regenerates tests for a component.
    pub fn for_tests(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operations: vec!["all".to_string()],
            ..Default::default()
        }
    }

    /// Same request under a different base name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }
}

/// Value kind of a feature property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    String,
    Text,
    Integer,
    Decimal,
    Boolean,
    Date,
    DateTime,
    Uuid,
}

impl PropertyKind {
    /// Parse from string, accepting common aliases.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "string" | "str" => Some(Self::String),
            "text" => Some(Self::Text),
            "integer" | "int" => Some(Self::Integer),
            "decimal" | "money" => Some(Self::Decimal),
            "boolean" | "bool" => Some(Self::Boolean),
            "date" => Some(Self::Date),
            "datetime" | "timestamp" => Some(Self::DateTime),
            "uuid" | "guid" => Some(Self::Uuid),
            _ => None,
        }
    }

    /// Convert to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Uuid => "uuid",
        }
    }

    /// Whether `value` is an acceptable default for this kind.
    pub fn accepts_default(&self, value: &str) -> bool {
        match self {
            Self::Integer => value.parse::<i64>().is_ok(),
            Self::Decimal => value.parse::<f64>().is_ok_and(f64::is_finite),
            Self::Boolean => super::parser::parse_bool(value).is_some(),
            _ => true,
        }
    }
}

/// One field of the scaffolded entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySpec {
    /// snake_case name.
    pub name: String,
    pub kind: PropertyKind,
    pub required: bool,
    pub default_value: Option<String>,
}

/// CRUD-style operation to scaffold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Search,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Create,
        Operation::Read,
        Operation::Update,
        Operation::Delete,
        Operation::Search,
    ];

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "create" => Some(Self::Create),
            "read" | "get" => Some(Self::Read),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            "search" | "list" => Some(Self::Search),
            _ => None,
        }
    }

    /// Convert to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Search => "search",
        }
    }
}

/// Value of a feature option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Flag(bool),
    Choice(String),
}

impl OptionValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            Self::Choice(_) => None,
        }
    }

    pub fn as_choice(&self) -> Option<&str> {
        match self {
            Self::Choice(c) => Some(c),
            Self::Flag(_) => None,
        }
    }
}

/// Canonical, validated description of a feature to scaffold.
///
/// Never mutated after resolution; edits go through a new
/// [`RawFeatureRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureSpec {
    pub base_name: String,
    pub naming: NamingVariantSet,
    pub properties: Vec<PropertySpec>,
    pub operations: BTreeSet<Operation>,
    pub options: BTreeMap<String, OptionValue>,
}

impl FeatureSpec {
    pub fn has_operation(&self, op: Operation) -> bool {
        self.operations.contains(&op)
    }

    /// Option lookup; absent options are `None`, never a default.
    pub fn option(&self, key: &str) -> Option<&OptionValue> {
        self.options.get(key)
    }
}
