//! Validated, compiled, immutable policy sets.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::compiler::compile_policies;
use crate::defaults::default_policies;
use crate::error::{PolicyError, Result};
use crate::schema::{Dimension, Operator, Policy, PolicyRecord, RuleKind};
use crate::validation::{validate_policies, validate_records, ValidationResult};

/// An installed policy catalog. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct PolicySet {
    policies: Vec<Policy>,
    loaded_at: DateTime<Utc>,
}

impl PolicySet {
    /// Name, validate and compile typed policies.
    pub fn build(mut policies: Vec<Policy>) -> Result<Self> {
        name_rule_match_policies(&mut policies);
        let result = validate_policies(&policies);
        Self::finish(policies, result)
    }

    /// Validate persisted records, convert them, then build.
    pub fn from_records(records: Vec<PolicyRecord>) -> Result<Self> {
        let result = validate_records(&records);
        if !result.valid {
            return Err(PolicyError::Validation(result.summary()));
        }
        let mut policies = records
            .into_iter()
            .map(Policy::try_from)
            .collect::<Result<Vec<_>>>()?;
        name_rule_match_policies(&mut policies);
        Self::finish(policies, result)
    }

    /// The built-in catalog.
    pub fn defaults() -> Result<Self> {
        Self::build(default_policies())
    }

    fn finish(policies: Vec<Policy>, result: ValidationResult) -> Result<Self> {
        if !result.valid {
            return Err(PolicyError::Validation(result.summary()));
        }
        for w in &result.warnings {
            warn!(path = %w.path, "{}", w.message);
        }
        let policies = compile_policies(&policies)?;
        debug!(count = policies.len(), "compiled policy set");
        Ok(Self { policies, loaded_at: Utc::now() })
    }

    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    pub fn get(&self, id: &str) -> Option<&Policy> {
        self.policies.iter().find(|p| p.id == id)
    }

    /// Enabled basic policies in catalog order.
    pub fn basic(&self) -> impl Iterator<Item = &Policy> {
        self.enabled(RuleKind::Basic)
    }

    /// Enabled aggregate policies in catalog order.
    pub fn aggregate(&self) -> impl Iterator<Item = &Policy> {
        self.enabled(RuleKind::Aggregate)
    }

    fn enabled(&self, kind: RuleKind) -> impl Iterator<Item = &Policy> {
        self.policies.iter().filter(move |p| p.enable && p.kind == kind)
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

/// Fill empty names of `RuleMatch` aggregates from the referenced basic
/// policies: names joined with `&&` for `all`, `||` for `any`.
pub fn name_rule_match_policies(policies: &mut [Policy]) {
    let generated: Vec<(usize, String)> = policies
        .iter()
        .enumerate()
        .filter(|(_, p)| {
            p.kind == RuleKind::Aggregate && p.rule_id == Dimension::RuleMatch && p.name.is_empty()
        })
        .filter_map(|(i, p)| {
            let sep = match p.operator {
                Operator::All => "&&",
                Operator::Any => "||",
                _ => return None,
            };
            let ids = p.value.as_str_list()?;
            let names: Vec<&str> = ids
                .iter()
                .map(|id| {
                    policies
                        .iter()
                        .find(|b| &b.id == id)
                        .map(|b| b.name.as_str())
                        .unwrap_or(id.as_str())
                })
                .collect();
            Some((i, names.join(sep)))
        })
        .collect();

    for (i, name) in generated {
        policies[i].name = name;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Level, PolicyValue};

    fn record(id: &str, kind: &str, rule_id: &str, op: &str, value: &str) -> PolicyRecord {
        let yaml = format!(
            "id: {id}\nname: n\ntype: {kind}\nrule_id: {rule_id}\noperator: '{op}'\nvalue: '{value}'\nlevel: low\n"
        );
        serde_yaml::from_str(&yaml).unwrap()
    }

    #[test]
    fn defaults_build_and_compile() {
        let set = PolicySet::defaults().unwrap();
        assert!(set.policies().iter().all(|p| !p.expr.is_empty()));
        assert_eq!(
            set.get("OPE.AFFECTROWS.002").unwrap().expr,
            "20000 <= AffectRows && AffectRows <= 100000"
        );
        assert!(set.basic().all(|p| p.kind == RuleKind::Basic));
        assert!(set.aggregate().count() >= 4);
    }

    #[test]
    fn invalid_records_are_rejected_as_a_whole() {
        let records = vec![
            record("OPE.DROP.001", "BASIC", "KeyWord", "==", "drop table"),
            record("bad-id", "BASIC", "KeyWord", "==", "drop table"),
            record("OPE.SIZE.001", "BASIC", "TabSize", ">", "10"),
        ];
        let err = PolicySet::from_records(records).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("bad-id"), "{msg}");
        assert!(msg.contains("did you mean 'TableSize'"), "{msg}");
    }

    #[test]
    fn operator_not_allowed_for_dimension() {
        let records = vec![
            record("OPE.DROP.001", "BASIC", "KeyWord", ">", "drop table"),
            record("AGG.RULEMATCH.001", "AGG", "RuleMatch", "all", r#"["OPE.DROP.001"]"#),
        ];
        let msg = PolicySet::from_records(records).unwrap_err().to_string();
        assert!(msg.contains("OPE.DROP.001.operator"), "{msg}");
    }

    #[test]
    fn aggregate_references_must_exist() {
        let records = vec![
            record("OPE.DROP.001", "BASIC", "KeyWord", "==", "drop table"),
            record("AGG.RULEMATCH.001", "AGG", "RuleMatch", "all", r#"["OPE.DROP.002"]"#),
        ];
        let msg = PolicySet::from_records(records).unwrap_err().to_string();
        assert!(msg.contains("unknown policy 'OPE.DROP.002'"), "{msg}");
    }

    #[test]
    fn empty_rule_match_name_is_generated() {
        let mut policies = vec![
            Policy::try_from(record("OPE.DROP.001", "BASIC", "KeyWord", "==", "drop table")).unwrap(),
            Policy::try_from(record("RUN.CAPACITY.001", "BASIC", "TableSize", ">", "2048")).unwrap(),
            Policy::try_from(record(
                "AGG.RULEMATCH.001",
                "AGG",
                "RuleMatch",
                "any",
                r#"["OPE.DROP.001","RUN.CAPACITY.001"]"#,
            ))
            .unwrap(),
        ];
        policies[0].name = "drop".into();
        policies[1].name = "big".into();
        policies[2].name.clear();
        let set = PolicySet::build(policies).unwrap();
        assert_eq!(set.get("AGG.RULEMATCH.001").unwrap().name, "drop||big");
    }

    #[test]
    fn wrong_value_shape_for_dimension() {
        let mut p = Policy::try_from(record("RUN.CAPACITY.001", "BASIC", "TableSize", ">", "2048")).unwrap();
        p.value = PolicyValue::Bool(true);
        p.level = Level::High;
        let msg = PolicySet::build(vec![p]).unwrap_err().to_string();
        assert!(msg.contains("does not fit"), "{msg}");
    }
}
