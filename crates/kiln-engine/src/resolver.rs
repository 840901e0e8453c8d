//! Configuration resolver
//!
//! Validates raw overrides against a blueprint's variable schema and freezes
//! the outcome into a [`ResolvedConfig`].

use kiln_core::types::{
    BlueprintManifest, RawValue, ResolvedConfig, Value, VariableDefinition, VariableKind,
};
use kiln_core::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Raw overrides keyed by variable name
pub type Overrides = BTreeMap<String, RawValue>;

/// Resolve overrides against the manifest's declared variables.
///
/// Every problem (unknown key, type error, invalid choice, missing required
/// value) is collected and reported in one validation error.
pub fn resolve(
    manifest: &BlueprintManifest,
    overrides: &Overrides,
) -> Result<Arc<ResolvedConfig>> {
    let mut problems = Vec::new();

    for key in overrides.keys() {
        if manifest.variable(key).is_none() {
            problems.push(unknown_key_problem(manifest, key));
        }
    }

    let mut declared = BTreeMap::new();
    let mut values = BTreeMap::new();

    for var in &manifest.variables {
        declared.insert(var.name.clone(), var.kind);

        let (raw, origin) = match (overrides.get(&var.name), &var.default) {
            (Some(raw), _) => (raw, "value"),
            (None, Some(default)) => (default, "default"),
            (None, None) if var.required => {
                problems.push(format!("missing required variable '{}'", var.name));
                continue;
            }
            (None, None) => continue,
        };

        match coerce(var, raw) {
            Ok(value) => {
                debug!("Resolved {} = {} ({})", var.name, value, origin);
                values.insert(var.name.clone(), value);
            }
            Err(msg) => problems.push(format!("{} of '{}': {}", origin, var.name, msg)),
        }
    }

    if !problems.is_empty() {
        return Err(Error::validation(&manifest.id, problems));
    }

    Ok(Arc::new(ResolvedConfig::new(&manifest.id, declared, values)))
}

fn unknown_key_problem(manifest: &BlueprintManifest, key: &str) -> String {
    let lowered = key.to_lowercase();
    match manifest
        .variables
        .iter()
        .find(|v| v.name.to_lowercase() == lowered)
    {
        Some(close) => format!("unknown variable '{}' (did you mean '{}'?)", key, close.name),
        None => format!("unknown variable '{}'", key),
    }
}

/// Convert a raw value to the variable's kind, checking enum choices
pub(crate) fn coerce(
    var: &VariableDefinition,
    raw: &RawValue,
) -> std::result::Result<Value, String> {
    match (var.kind, raw) {
        (VariableKind::String, RawValue::String(s)) => Ok(Value::String(s.clone())),
        (VariableKind::Enum, RawValue::String(s)) => {
            if var.choices.iter().any(|c| c == s) {
                Ok(Value::Enum(s.clone()))
            } else {
                Err(format!(
                    "{:?} is not one of [{}]",
                    s,
                    var.choices
                        .iter()
                        .map(|c| format!("{:?}", c))
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            }
        }
        (VariableKind::Bool, RawValue::Bool(b)) => Ok(Value::Bool(*b)),
        (VariableKind::Bool, RawValue::String(s)) => parse_bool(s)
            .map(Value::Bool)
            .ok_or_else(|| format!("{:?} is not a boolean (true/false/yes/no/1/0)", s)),
        (VariableKind::Int, RawValue::Int(i)) => Ok(Value::Int(*i)),
        (VariableKind::Int, RawValue::String(s)) => s
            .trim()
            .parse()
            .map(Value::Int)
            .map_err(|_| format!("{:?} is not an integer", s)),
        (kind, raw) => Err(format!("expected {}, got {} {}", kind, raw.type_name(), raw)),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}
