//! Parsers for the command-line shorthand of a feature request.

use super::model::{Operation, PropertyKind, PropertySpec};
use crate::naming::split_words;

/// Parse one property entry: `name:kind[?][=default]`.
///
/// A bare `name` is a required string. `?` marks the property optional.
/// The name is normalized to snake_case.
pub fn parse_property(entry: &str) -> Result<PropertySpec, String> {
    let entry = entry.trim();
    let (head, default_value) = match entry.split_once('=') {
        Some((head, default)) => (head.trim(), Some(default.trim().replace("\\,", ","))),
        None => (entry, None),
    };

    let (raw_name, raw_kind) = match head.split_once(':') {
        Some((name, kind)) => (name.trim(), kind.trim()),
        None => (head, "string"),
    };

    let (raw_kind, required) = match raw_kind.strip_suffix('?') {
        Some(kind) => (kind.trim(), false),
        None => (raw_kind, true),
    };

    let name = normalize_property_name(raw_name)
        .ok_or_else(|| format!("property '{entry}' has no usable name"))?;

    let kind = PropertyKind::from_str(raw_kind)
        .ok_or_else(|| format!("property '{name}' has unknown kind '{raw_kind}'"))?;

    let default_value = match default_value {
        Some(default) if !kind.accepts_default(&default) => {
            return Err(format!(
                "property '{name}' default '{default}' is not a valid {}",
                kind.as_str()
            ));
        }
        Some(default) if kind == PropertyKind::Boolean => parse_bool(&default).map(|b| b.to_string()),
        other => other,
    };

    Ok(PropertySpec {
        name,
        kind,
        required,
        default_value,
    })
}

/// snake_case form of a property name, `None` when it has no letters.
pub fn normalize_property_name(raw: &str) -> Option<String> {
    if !raw.chars().any(char::is_alphabetic) {
        return None;
    }
    Some(split_words(raw).join("_"))
}

/// Expand operation names, including the `crud` and `all` shorthands.
pub fn parse_operations(entries: &[String]) -> Result<Vec<Operation>, String> {
    let mut ops = Vec::new();
    for entry in entries.iter().flat_map(|e| split_list(e)) {
        match entry.to_lowercase().as_str() {
            "all" => ops.extend(Operation::ALL),
            "crud" => ops.extend([
                Operation::Create,
                Operation::Read,
                Operation::Update,
                Operation::Delete,
            ]),
            other => {
                let op = Operation::from_str(other)
                    .ok_or_else(|| format!("unknown operation '{entry}'"))?;
                ops.push(op);
            }
        }
    }
    Ok(ops)
}

/// Split `key=value`; a bare `key` has no value.
pub fn parse_option(entry: &str) -> (String, Option<String>) {
    match entry.split_once('=') {
        Some((key, value)) => (key.trim().to_string(), Some(value.trim().to_string())),
        None => (entry.trim().to_string(), None),
    }
}

/// Parse a boolean option value.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Split a comma-separated list, dropping empty entries.
///
/// `\,` does not split and is kept as written, so splitting an entry again
/// is a no-op. [`parse_property`] turns it into a plain comma.
pub fn split_list(input: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in input.chars() {
        if c == ',' && !escaped {
            entries.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
        escaped = c == '\\' && !escaped;
    }
    entries.push(current);
    entries
        .iter()
        .map(|e| e.trim())
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .collect()
}
