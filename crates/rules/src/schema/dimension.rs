//! The rule catalog: every fact axis a policy can test.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::operator::Operator;
use crate::error::PolicyError;

/// Whether a policy reads raw facts or reasons over other matched policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleKind {
    #[serde(rename = "BASIC")]
    Basic,
    #[serde(rename = "AGG")]
    Aggregate,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Basic => write!(f, "BASIC"),
            RuleKind::Aggregate => write!(f, "AGG"),
        }
    }
}

impl FromStr for RuleKind {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BASIC" => Ok(RuleKind::Basic),
            "AGG" => Ok(RuleKind::Aggregate),
            other => Err(PolicyError::ValueShape(format!("'{}' is not a rule type", other))),
        }
    }
}

/// Declared type of a dimension's comparison value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    Operate,
    Action,
    KeyWord,
    Int,
    Bool,
    /// List of Basic policy ids (or `*`).
    BasicRuleSet,
}

impl ValueType {
    /// String-typed dimensions whose text maps onto a vocabulary enum.
    pub fn is_vocabulary(&self) -> bool {
        matches!(self, ValueType::Operate | ValueType::Action | ValueType::KeyWord)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueType::Operate => "OPERATE",
            ValueType::Action => "ACTION",
            ValueType::KeyWord => "KEY_WORD",
            ValueType::Int => "INT",
            ValueType::Bool => "BOOL",
            ValueType::BasicRuleSet => "BASIC_RULE_SET",
        };
        f.write_str(s)
    }
}

/// Dimension identifiers. The id text doubles as the expression variable name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dimension {
    Operate,
    Action,
    KeyWord,
    TableExist,
    TableSize,
    TableRows,
    AffectRows,
    FreeDisk,
    CpuUsage,
    DiskSufficient,
    PrimaryKeyExist,
    ForeignKeyExist,
    TriggerExist,
    IndexExistInWhere,
    BigTransaction,
    RuleMatch,
    RulePriority,
    RuleLevel,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        self.meta().id_str
    }

    /// Catalog entry for this dimension.
    pub fn meta(&self) -> &'static RuleMeta {
        &CATALOG[*self as usize]
    }

    pub fn kind(&self) -> RuleKind {
        self.meta().kind
    }

    pub fn value_type(&self) -> ValueType {
        self.meta().value_type
    }

    pub fn allows(&self, op: Operator) -> bool {
        self.meta().operators.contains(&op)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CATALOG
            .iter()
            .find(|m| m.id_str == s)
            .map(|m| m.id)
            .ok_or_else(|| PolicyError::UnknownDimension(s.to_string()))
    }
}

impl Serialize for Dimension {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Dimension {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One catalog row (`RuleMeta`): immutable, defined at compile time.
#[derive(Debug, Clone, Serialize)]
pub struct RuleMeta {
    #[serde(skip)]
    pub id: Dimension,
    #[serde(rename = "id")]
    pub id_str: &'static str,
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: RuleKind,
    pub value_type: ValueType,
    #[serde(rename = "operator")]
    pub operators: &'static [Operator],
    pub description: &'static str,
}

const EQUALITY: &[Operator] = &[Operator::Eq, Operator::Ne];
const ORDERING: &[Operator] = &[
    Operator::Lt,
    Operator::Le,
    Operator::Eq,
    Operator::Ne,
    Operator::Gt,
    Operator::Ge,
    Operator::Between,
];
const MEMBERSHIP: &[Operator] = &[Operator::All, Operator::Any];
const DIRECTION: &[Operator] = &[Operator::Highest, Operator::Lowest];

const fn meta(
    id: Dimension,
    id_str: &'static str,
    name: &'static str,
    kind: RuleKind,
    value_type: ValueType,
    operators: &'static [Operator],
    description: &'static str,
) -> RuleMeta {
    RuleMeta { id, id_str, name, kind, value_type, operators, description }
}

use Dimension as D;
use RuleKind::{Aggregate, Basic};

// Indexed by `Dimension as usize`; keep in declaration order.
static CATALOG: [RuleMeta; 18] = [
    meta(D::Operate, "Operate", "operation kind", Basic, ValueType::Operate, EQUALITY,
        "statement category: DQL, DDL, DML, DCL"),
    meta(D::Action, "Action", "action", Basic, ValueType::Action, EQUALITY,
        "leading statement verb"),
    meta(D::KeyWord, "KeyWord", "keyword", Basic, ValueType::KeyWord, EQUALITY,
        "statement shape, e.g. 'drop table' or 'delete from where'"),
    meta(D::TableExist, "TableExist", "table exists", Basic, ValueType::Bool, EQUALITY,
        "every touched table already exists"),
    meta(D::TableSize, "TableSize", "table size (MB)", Basic, ValueType::Int, ORDERING,
        "largest touched table, data plus index, in MB"),
    meta(D::TableRows, "TableRows", "table rows", Basic, ValueType::Int, ORDERING,
        "largest row count among touched tables"),
    meta(D::AffectRows, "AffectRows", "affected rows", Basic, ValueType::Int, ORDERING,
        "estimated rows changed by the statement"),
    meta(D::FreeDisk, "FreeDisk", "free disk (MB)", Basic, ValueType::Int, ORDERING,
        "free space on the data volume in MB"),
    meta(D::CpuUsage, "CpuUsage", "CPU usage (%)", Basic, ValueType::Int, ORDERING,
        "current server CPU utilisation"),
    meta(D::DiskSufficient, "DiskSufficient", "disk sufficient", Basic, ValueType::Bool, EQUALITY,
        "free disk exceeds the size of the touched table"),
    meta(D::PrimaryKeyExist, "PrimaryKeyExist", "primary key exists", Basic, ValueType::Bool,
        EQUALITY, "every touched table has a primary key"),
    meta(D::ForeignKeyExist, "ForeignKeyExist", "foreign key exists", Basic, ValueType::Bool,
        EQUALITY, "any touched table has a foreign key"),
    meta(D::TriggerExist, "TriggerExist", "trigger exists", Basic, ValueType::Bool, EQUALITY,
        "any touched table has a trigger"),
    meta(D::IndexExistInWhere, "IndexExistInWhere", "index in where", Basic, ValueType::Bool,
        EQUALITY, "a WHERE column leads an index (delete/update only)"),
    meta(D::BigTransaction, "BigTransaction", "big transaction", Basic, ValueType::Bool,
        EQUALITY, "a long-running transaction touches the same tables"),
    meta(D::RuleMatch, "RuleMatch", "rule match", Aggregate, ValueType::BasicRuleSet, MEMBERSHIP,
        "all/any of the listed basic policies matched"),
    meta(D::RulePriority, "RulePriority", "rule priority", Aggregate, ValueType::BasicRuleSet,
        DIRECTION, "verdict is the highest/lowest priority matched basic policy"),
    meta(D::RuleLevel, "RuleLevel", "rule level", Aggregate, ValueType::BasicRuleSet, DIRECTION,
        "verdict is the highest/lowest level matched basic policy"),
];

/// The full rule catalog in declaration order.
pub fn rule_catalog() -> &'static [RuleMeta] {
    &CATALOG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_indexed_by_discriminant() {
        for (i, m) in CATALOG.iter().enumerate() {
            assert_eq!(m.id as usize, i, "catalog row {} out of order", m.id_str);
            assert_eq!(m.id_str.parse::<Dimension>().unwrap(), m.id);
        }
    }

    #[test]
    fn aggregate_dimensions_take_rule_sets() {
        for m in rule_catalog() {
            assert_eq!(m.kind == RuleKind::Aggregate, m.value_type == ValueType::BasicRuleSet);
        }
    }

    #[test]
    fn unknown_dimension_is_an_error() {
        let err = "TabSize".parse::<Dimension>().unwrap_err();
        assert!(matches!(err, PolicyError::UnknownDimension(ref s) if s == "TabSize"));
    }

    #[test]
    fn operator_sets() {
        assert!(Dimension::AffectRows.allows(Operator::Between));
        assert!(!Dimension::KeyWord.allows(Operator::Gt));
        assert!(Dimension::RuleLevel.allows(Operator::Lowest));
        assert!(!Dimension::RuleMatch.allows(Operator::Highest));
    }
}
