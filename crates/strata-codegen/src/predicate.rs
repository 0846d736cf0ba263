//! Template inclusion predicates.
//!
//! A predicate is a conjunction of clauses:
//!
//! | clause        | holds when                                   |
//! |---------------|----------------------------------------------|
//! | `flag`        | option `flag` is present and true            |
//! | `!flag`       | option `flag` is present and false           |
//! | `key=value`   | option `key` is present and equals `value`   |
//! | `key!=value`  | option `key` is present and differs          |
//! | `op:create`   | the feature includes the operation           |
//! | `!op:create`  | the feature does not include the operation   |
//!
//! Option clauses fail closed: an option absent from the feature makes the
//! clause false whatever its polarity.

use serde::Serialize;

use strata_core::config::{OptionKind, OptionSchema};
use strata_core::spec::parser::parse_bool;
use strata_core::spec::{FeatureSpec, Operation, OptionValue};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "clause", rename_all = "snake_case")]
pub enum Clause {
    Flag { key: String, negated: bool },
    Equals { key: String, value: String, negated: bool },
    Operation { op: Operation, negated: bool },
}

impl Clause {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        let (negated, body) = match raw.strip_prefix('!') {
            Some(rest) if !rest.contains('=') => (true, rest.trim()),
            _ => (false, raw),
        };
        if body.is_empty() {
            return Err(format!("empty clause '{raw}'"));
        }

        if let Some(op) = body.strip_prefix("op:") {
            let op = Operation::from_str(op.trim())
                .ok_or_else(|| format!("unknown operation in clause '{raw}'"))?;
            return Ok(Self::Operation { op, negated });
        }

        if let Some((key, value)) = body.split_once("!=") {
            return Self::equals(raw, key, value, true);
        }
        if let Some((key, value)) = body.split_once('=') {
            return Self::equals(raw, key, value, false);
        }

        if !is_identifier(body) {
            return Err(format!("malformed clause '{raw}'"));
        }
        Ok(Self::Flag {
            key: body.to_string(),
            negated,
        })
    }

    fn equals(raw: &str, key: &str, value: &str, negated: bool) -> Result<Self, String> {
        let (key, value) = (key.trim(), value.trim());
        if !is_identifier(key) || value.is_empty() {
            return Err(format!("malformed clause '{raw}'"));
        }
        Ok(Self::Equals {
            key: key.to_string(),
            value: value.to_lowercase(),
            negated,
        })
    }

    /// Check the clause against the recognized option schema.
    pub fn validate(&self, schema: &OptionSchema) -> Result<(), String> {
        match self {
            Self::Operation { .. } => Ok(()),
            Self::Flag { key, .. } => match schema.get(key) {
                Some(OptionKind::Bool) => Ok(()),
                Some(OptionKind::Choice(_)) => {
                    Err(format!("option '{key}' is a choice; use '{key}=<value>'"))
                }
                None => Err(format!("clause references unknown option '{key}'")),
            },
            Self::Equals { key, value, .. } => match schema.get(key) {
                Some(OptionKind::Bool) if parse_bool(value).is_some() => Ok(()),
                Some(OptionKind::Bool) => {
                    Err(format!("option '{key}' is boolean, clause compares to '{value}'"))
                }
                Some(OptionKind::Choice(choices)) if choices.contains(value) => Ok(()),
                Some(OptionKind::Choice(choices)) => Err(format!(
                    "'{value}' is not a choice of option '{key}' ({})",
                    choices.join("|")
                )),
                None => Err(format!("clause references unknown option '{key}'")),
            },
        }
    }

    pub fn holds(&self, spec: &FeatureSpec) -> bool {
        match self {
            Self::Operation { op, negated } => spec.has_operation(*op) != *negated,
            Self::Flag { key, negated } => match spec.option(key) {
                Some(OptionValue::Flag(b)) => *b != *negated,
                _ => false,
            },
            Self::Equals { key, value, negated } => {
                let equal = match spec.option(key) {
                    Some(OptionValue::Choice(c)) => c == value,
                    Some(OptionValue::Flag(b)) => parse_bool(value) == Some(*b),
                    None => return false,
                };
                equal != *negated
            }
        }
    }
}

impl std::fmt::Display for Clause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bang = |negated: &bool| if *negated { "!" } else { "" };
        match self {
            Self::Flag { key, negated } => write!(f, "{}{}", bang(negated), key),
            Self::Equals { key, value, negated } => {
                write!(f, "{}{}={}", key, bang(negated), value)
            }
            Self::Operation { op, negated } => write!(f, "{}op:{}", bang(negated), op.as_str()),
        }
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Conjunction of clauses. Empty means always.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Predicate {
    clauses: Vec<Clause>,
}

impl Predicate {
    pub fn parse<S: AsRef<str>>(clauses: &[S]) -> Result<Self, String> {
        Ok(Self {
            clauses: clauses
                .iter()
                .map(|c| Clause::parse(c.as_ref()))
                .collect::<Result<_, _>>()?,
        })
    }

    pub fn validate(&self, schema: &OptionSchema) -> Result<(), String> {
        self.clauses.iter().try_for_each(|c| c.validate(schema))
    }

    pub fn evaluate(&self, spec: &FeatureSpec) -> bool {
        self.clauses.iter().all(|c| c.holds(spec))
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_always(&self) -> bool {
        self.clauses.is_empty()
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.clauses.is_empty() {
            return f.write_str("always");
        }
        let parts: Vec<String> = self.clauses.iter().map(|c| c.to_string()).collect();
        f.write_str(&parts.join(" & "))
    }
}
