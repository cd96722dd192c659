//! Policy records (persisted shape) and typed policies (evaluated shape).

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::dimension::{Dimension, RuleKind};
use super::level::Level;
use super::operator::Operator;
use super::value::PolicyValue;
use crate::error::PolicyError;

fn default_true() -> bool {
    true
}

/// A policy exactly as a store persists it: the value is loosely-typed text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(rename = "type")]
    pub kind: RuleKind,
    pub rule_id: String,
    pub operator: Operator,
    #[serde(serialize_with = "write_raw_value", deserialize_with = "raw_value")]
    pub value: String,
    pub level: Level,
    #[serde(default)]
    pub special: bool,
    #[serde(default)]
    pub priority: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub suggestion: String,
}

/// Accept any YAML/JSON scalar or sequence and canonicalize it to the
/// persisted text form (`2048`, `true`, `drop table`, `[20000,100000]`).
fn raw_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        v @ serde_json::Value::Array(_) => serde_json::to_string(&v).map_err(D::Error::custom),
        other => Err(D::Error::custom(format!("unsupported policy value {}", other))),
    }
}

/// Write the text form back as a native scalar or sequence where it is one.
#[allow(clippy::ptr_arg)]
fn write_raw_value<S: Serializer>(raw: &String, serializer: S) -> Result<S::Ok, S::Error> {
    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = raw.parse::<i64>() {
            return serializer.serialize_i64(n);
        }
    }
    match raw.as_str() {
        "true" => return serializer.serialize_bool(true),
        "false" => return serializer.serialize_bool(false),
        _ => {}
    }
    if raw.starts_with('[') {
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(raw) {
            return v.serialize(serializer);
        }
    }
    serializer.serialize_str(raw)
}

/// A policy with its value reconstructed and, once compiled, its expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PolicyRecord")]
pub struct Policy {
    pub id: String,
    pub name: String,
    pub enable: bool,
    #[serde(rename = "type")]
    pub kind: RuleKind,
    pub rule_id: Dimension,
    pub operator: Operator,
    pub value: PolicyValue,
    pub level: Level,
    pub special: bool,
    pub priority: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub suggestion: String,
    /// Compiled expression; derived, never persisted.
    #[serde(skip)]
    pub expr: String,
}

impl Policy {
    pub fn is_basic(&self) -> bool {
        self.kind == RuleKind::Basic
    }

    pub fn is_aggregate(&self) -> bool {
        self.kind == RuleKind::Aggregate
    }
}

impl TryFrom<PolicyRecord> for Policy {
    type Error = PolicyError;

    fn try_from(r: PolicyRecord) -> Result<Self, Self::Error> {
        let value = PolicyValue::coerce(&r.value, &r.rule_id)?;
        let rule_id: Dimension = r.rule_id.parse()?;
        Ok(Self {
            id: r.id,
            name: r.name,
            enable: r.enable,
            kind: r.kind,
            rule_id,
            operator: r.operator,
            value,
            level: r.level,
            special: r.special,
            priority: r.priority,
            description: r.description,
            suggestion: r.suggestion,
            expr: String::new(),
        })
    }
}

impl From<&Policy> for PolicyRecord {
    fn from(p: &Policy) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            enable: p.enable,
            kind: p.kind,
            rule_id: p.rule_id.as_str().to_string(),
            operator: p.operator,
            value: p.value.to_raw(),
            level: p.level,
            special: p.special,
            priority: p.priority,
            description: p.description.clone(),
            suggestion: p.suggestion.clone(),
        }
    }
}
