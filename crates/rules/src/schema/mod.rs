//! Policy data model: rule catalog, operators, levels, vocabularies, values.

mod dimension;
mod level;
mod operator;
mod policy;
mod value;
mod vocab;

#[cfg(test)]
mod tests;

pub use dimension::{rule_catalog, Dimension, RuleKind, RuleMeta, ValueType};
pub use level::Level;
pub use operator::Operator;
pub use policy::{Policy, PolicyRecord};
pub use value::{PolicyValue, TextValue};
pub use vocab::{ActionType, KeyWordType, OperateType};
