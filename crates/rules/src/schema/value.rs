//! Typed policy values and their loosely-typed persisted text form.
//!
//! Stores keep every comparison value as text (`2048`, `true`, `drop table`,
//! `["OPE.DELETE.001"]`, `[20000,100000]`). [`PolicyValue::coerce`] rebuilds
//! the tagged value from that text; [`PolicyValue::to_raw`] produces it.

use std::fmt;

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

use super::dimension::{Dimension, ValueType};
use super::vocab::{ActionType, KeyWordType, OperateType};
use crate::error::{PolicyError, Result};

/// A string-typed value already mapped onto its dimension's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextValue {
    Operate(OperateType),
    Action(ActionType),
    KeyWord(KeyWordType),
}

impl TextValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextValue::Operate(v) => v.as_str(),
            TextValue::Action(v) => v.as_str(),
            TextValue::KeyWord(v) => v.as_str(),
        }
    }

    fn value_type(&self) -> ValueType {
        match self {
            TextValue::Operate(_) => ValueType::Operate,
            TextValue::Action(_) => ValueType::Action,
            TextValue::KeyWord(_) => ValueType::KeyWord,
        }
    }
}

/// Comparison value of a policy, tagged by shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyValue {
    Int(i64),
    Bool(bool),
    Text(TextValue),
    StrList(Vec<String>),
    IntList(Vec<i64>),
}

impl PolicyValue {
    /// Rebuild a typed value from its persisted text.
    ///
    /// Pure digits become an int, `true`/`false` a bool, `[...]` a JSON array
    /// classified by its first element, and anything else a vocabulary value
    /// of the named dimension.
    pub fn coerce(raw: &str, dimension: &str) -> Result<Self> {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            return raw
                .parse::<i64>()
                .map(PolicyValue::Int)
                .map_err(|e| PolicyError::ValueShape(format!("integer '{}': {}", raw, e)));
        }

        if let Some(b) = parse_bool(raw) {
            return Ok(PolicyValue::Bool(b));
        }

        let trimmed = raw.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            return parse_list(trimmed);
        }

        let dim: Dimension = dimension.parse()?;
        let text = match dim.value_type() {
            ValueType::Operate => TextValue::Operate(raw.parse()?),
            ValueType::Action => TextValue::Action(raw.parse()?),
            ValueType::KeyWord => TextValue::KeyWord(raw.parse()?),
            other => {
                return Err(PolicyError::ValueShape(format!(
                    "text value '{}' given for {} dimension {}",
                    raw, other, dim
                )));
            }
        };
        Ok(PolicyValue::Text(text))
    }

    /// Persisted text form; `coerce(to_raw(v))` gives `v` back.
    pub fn to_raw(&self) -> String {
        match self {
            PolicyValue::Int(n) => n.to_string(),
            PolicyValue::Bool(b) => b.to_string(),
            PolicyValue::Text(t) => t.as_str().to_string(),
            PolicyValue::StrList(items) => json_list(items),
            PolicyValue::IntList(items) => json_list(items),
        }
    }

    /// Whether this value's shape fits a dimension's declared type.
    ///
    /// Int dimensions also accept an int list, the operand of `between`.
    pub fn fits(&self, value_type: ValueType) -> bool {
        match (self, value_type) {
            (PolicyValue::Int(_) | PolicyValue::IntList(_), ValueType::Int) => true,
            (PolicyValue::Bool(_), ValueType::Bool) => true,
            (PolicyValue::Text(t), vt) => t.value_type() == vt,
            (PolicyValue::StrList(_), ValueType::BasicRuleSet) => true,
            _ => false,
        }
    }

    pub fn shape(&self) -> &'static str {
        match self {
            PolicyValue::Int(_) => "int",
            PolicyValue::Bool(_) => "bool",
            PolicyValue::Text(_) => "string",
            PolicyValue::StrList(_) => "string list",
            PolicyValue::IntList(_) => "int list",
        }
    }

    pub fn as_str_list(&self) -> Option<&[String]> {
        match self {
            PolicyValue::StrList(items) => Some(items),
            _ => None,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "true" | "TRUE" | "True" => Some(true),
        "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn parse_list(text: &str) -> Result<PolicyValue> {
    let items: Vec<serde_json::Value> = serde_json::from_str(text)
        .map_err(|e| PolicyError::ValueShape(format!("array '{}': {}", text, e)))?;

    match items.first() {
        None => Ok(PolicyValue::StrList(Vec::new())),
        Some(serde_json::Value::String(_)) => items
            .iter()
            .map(|v| match v {
                serde_json::Value::String(s) => Ok(s.clone()),
                other => Err(mixed(text, other)),
            })
            .collect::<Result<Vec<_>>>()
            .map(PolicyValue::StrList),
        Some(serde_json::Value::Number(_)) => items
            .iter()
            .map(|v| v.as_i64().ok_or_else(|| mixed(text, v)))
            .collect::<Result<Vec<_>>>()
            .map(PolicyValue::IntList),
        Some(other) => Err(PolicyError::ValueShape(format!(
            "array '{}': unsupported element {}",
            text, other
        ))),
    }
}

fn mixed(text: &str, element: &serde_json::Value) -> PolicyError {
    PolicyError::ValueShape(format!("array '{}': unexpected element {}", text, element))
}

fn json_list<T: Serialize>(items: &[T]) -> String {
    // Serializing strings and integers to JSON cannot fail.
    serde_json::to_string(items).unwrap_or_else(|_| String::from("[]"))
}

impl fmt::Display for PolicyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_raw())
    }
}

impl Serialize for PolicyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            PolicyValue::Int(n) => serializer.serialize_i64(*n),
            PolicyValue::Bool(b) => serializer.serialize_bool(*b),
            PolicyValue::Text(t) => serializer.serialize_str(t.as_str()),
            PolicyValue::StrList(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            PolicyValue::IntList(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}
