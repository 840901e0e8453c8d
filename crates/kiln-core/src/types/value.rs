//! Typed configuration values

use super::manifest::VariableKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Untyped override as supplied by a caller (CLI flag, values file, web form)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Bool(bool),
    Int(i64),
    String(String),
}

impl RawValue {
    /// Short type label for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            RawValue::Bool(_) => "bool",
            RawValue::Int(_) => "int",
            RawValue::String(_) => "string",
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Bool(b) => write!(f, "{}", b),
            RawValue::Int(i) => write!(f, "{}", i),
            RawValue::String(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::String(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::String(value)
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        RawValue::Bool(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Int(value)
    }
}

/// Validated, typed variable value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Value {
    String(String),
    Bool(bool),
    Int(i64),
    Enum(String),
}

impl Value {
    pub fn kind(&self) -> VariableKind {
        match self {
            Value::String(_) => VariableKind::String,
            Value::Bool(_) => VariableKind::Bool,
            Value::Int(_) => VariableKind::Int,
            Value::Enum(_) => VariableKind::Enum,
        }
    }

    /// String content of string and enum values
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Plain JSON representation used as template context
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) | Value::Enum(s) => serde_json::Value::String(s.clone()),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) | Value::Enum(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
        }
    }
}

/// Immutable mapping from declared variable name to typed value.
///
/// Built once per generation by the resolver and shared read-only (behind an
/// `Arc`) by every later stage. There are no mutating methods; a new
/// invocation builds a new value.
///
/// Unset optional variables read as their kind's zero value through
/// [`ResolvedConfig::value`]: `""` for strings and enums, `false` for bools.
/// Unset ints have no zero value and stay absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedConfig {
    blueprint: String,
    declared: BTreeMap<String, VariableKind>,
    values: BTreeMap<String, Value>,
    #[serde(skip)]
    zeroes: BTreeMap<String, Value>,
}

fn zero_value(kind: VariableKind) -> Option<Value> {
    match kind {
        VariableKind::String => Some(Value::String(String::new())),
        VariableKind::Enum => Some(Value::Enum(String::new())),
        VariableKind::Bool => Some(Value::Bool(false)),
        VariableKind::Int => None,
    }
}

impl ResolvedConfig {
    /// Freeze a resolved set of values.
    ///
    /// Every key in `values` must appear in `declared`; values for undeclared
    /// names are dropped.
    pub fn new(
        blueprint: impl Into<String>,
        declared: BTreeMap<String, VariableKind>,
        mut values: BTreeMap<String, Value>,
    ) -> Self {
        values.retain(|name, _| declared.contains_key(name));
        let zeroes = declared
            .iter()
            .filter(|(name, _)| !values.contains_key(*name))
            .filter_map(|(name, kind)| zero_value(*kind).map(|zero| (name.clone(), zero)))
            .collect();
        Self {
            blueprint: blueprint.into(),
            declared,
            values,
            zeroes,
        }
    }

    pub fn blueprint(&self) -> &str {
        &self.blueprint
    }

    /// Value of a variable, `None` when declared but unset (or undeclared)
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Value as seen by conditions and templates: the set value, else the
    /// zero value of the declared kind
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name).or_else(|| self.zeroes.get(name))
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.declared.contains_key(name)
    }

    pub fn declared_kind(&self, name: &str) -> Option<VariableKind> {
        self.declared.get(name).copied()
    }

    pub fn declared_names(&self) -> impl Iterator<Item = &str> {
        self.declared.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Template context: one top-level key per variable with a value or a
    /// zero value
    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.zeroes
            .iter()
            .chain(self.values.iter())
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }
}
