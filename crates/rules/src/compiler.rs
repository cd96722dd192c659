//! Policy compiler: turns a policy into an expression string.
//!
//! Basic policies compare a dimension variable with a literal
//! (`TableSize > 2048`, `KeyWord == "drop table"`,
//! `20000 <= AffectRows && AffectRows <= 100000`). Aggregate policies call a
//! matcher function over the matched basic ids
//! (`ALL(matchedBasicIds, "OPE.DELETE.002", "OPE.AFFECTROWS.001")`).

use crate::error::{PolicyError, Result};
use crate::schema::{Dimension, Operator, Policy, PolicyValue, RuleKind};

/// Variable bound to the ids of matched basic policies.
pub const MATCHED_BASIC_IDS: &str = "matchedBasicIds";

/// Set-membership functions for `RuleMatch`.
pub const FN_ALL: &str = "ALL";
pub const FN_ANY: &str = "ANY";

/// Wildcard that stands for every matched basic policy.
pub const WILDCARD: &str = "*";

/// Name of the direction function for a priority/level aggregate.
pub fn direction_function(dimension: Dimension, op: Operator) -> Option<&'static str> {
    match (dimension, op) {
        (Dimension::RulePriority, Operator::Highest) => Some("RulePriorityHIGHEST"),
        (Dimension::RulePriority, Operator::Lowest) => Some("RulePriorityLOWEST"),
        (Dimension::RuleLevel, Operator::Highest) => Some("RuleLevelHIGHEST"),
        (Dimension::RuleLevel, Operator::Lowest) => Some("RuleLevelLOWEST"),
        _ => None,
    }
}

/// All four direction function names.
pub const DIRECTION_FUNCTIONS: [&str; 4] = [
    "RulePriorityHIGHEST",
    "RulePriorityLOWEST",
    "RuleLevelHIGHEST",
    "RuleLevelLOWEST",
];

/// Compile one policy according to its kind.
pub fn compile(policy: &Policy) -> Result<String> {
    match policy.kind {
        RuleKind::Basic => compile_basic(policy),
        RuleKind::Aggregate => compile_aggregate(policy),
    }
}

/// Compile a basic policy into a comparison over its dimension variable.
pub fn compile_basic(policy: &Policy) -> Result<String> {
    let dim = policy.rule_id.as_str();
    let op = policy.operator;

    if op.is_scalar() {
        return match &policy.value {
            PolicyValue::Int(n) => Ok(format!("{} {} {}", dim, op, n)),
            PolicyValue::Bool(b) => Ok(format!("{} {} {}", dim, op, b)),
            PolicyValue::Text(t) => Ok(format!("{} {} {}", dim, op, quote(t.as_str()))),
            v @ (PolicyValue::StrList(_) | PolicyValue::IntList(_)) => Err(unsupported(
                policy,
                format!("{} value needs a range or aggregate operator", v.shape()),
            )),
        };
    }

    match (op, &policy.value) {
        (Operator::Between, PolicyValue::IntList(bounds)) => match bounds.as_slice() {
            [low, high] => Ok(format!("{} <= {} && {} <= {}", low, dim, dim, high)),
            _ => Err(PolicyError::ValueShape(format!(
                "policy {}: between needs exactly 2 bounds, got {}",
                policy.id,
                bounds.len()
            ))),
        },
        (Operator::Between, v) => {
            Err(unsupported(policy, format!("between needs an int list, got {}", v.shape())))
        }
        _ => Err(unsupported(policy, "aggregate operator on a basic policy".to_string())),
    }
}

/// Compile an aggregate policy into a matcher-function call.
pub fn compile_aggregate(policy: &Policy) -> Result<String> {
    let ids = match &policy.value {
        PolicyValue::StrList(ids) if !ids.is_empty() => ids,
        v => {
            return Err(PolicyError::ValueShape(format!(
                "policy {}: aggregate value must be a non-empty list of policy ids, got {} '{}'",
                policy.id,
                v.shape(),
                v
            )));
        }
    };

    let func = match (policy.rule_id, policy.operator) {
        (Dimension::RuleMatch, Operator::All) => FN_ALL,
        (Dimension::RuleMatch, Operator::Any) => FN_ANY,
        (dim, op) => direction_function(dim, op).ok_or_else(|| {
            unsupported(policy, "no matcher function for this pairing".to_string())
        })?,
    };

    let args: Vec<String> = ids.iter().map(|id| quote(id)).collect();
    Ok(format!("{}({}, {})", func, MATCHED_BASIC_IDS, args.join(", ")))
}

/// Compile every policy, returning new copies with `expr` filled in.
///
/// The input slice is never modified.
pub fn compile_policies(policies: &[Policy]) -> Result<Vec<Policy>> {
    policies
        .iter()
        .map(|p| {
            let mut compiled = p.clone();
            compiled.expr = compile(p)?;
            Ok(compiled)
        })
        .collect()
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn unsupported(policy: &Policy, reason: String) -> PolicyError {
    PolicyError::UnsupportedOperator {
        policy_id: policy.id.clone(),
        dimension: policy.rule_id,
        operator: policy.operator,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{KeyWordType, Level, TextValue};

    fn policy(kind: RuleKind, dim: Dimension, op: Operator, value: PolicyValue) -> Policy {
        Policy {
            id: "TST.POLICY.001".into(),
            name: "test".into(),
            enable: true,
            kind,
            rule_id: dim,
            operator: op,
            value,
            level: Level::Low,
            special: false,
            priority: 1,
            description: String::new(),
            suggestion: String::new(),
            expr: String::new(),
        }
    }

    fn basic(dim: Dimension, op: Operator, value: PolicyValue) -> Policy {
        policy(RuleKind::Basic, dim, op, value)
    }

    fn agg(dim: Dimension, op: Operator, ids: &[&str]) -> Policy {
        let ids = ids.iter().map(|s| s.to_string()).collect();
        policy(RuleKind::Aggregate, dim, op, PolicyValue::StrList(ids))
    }

    #[test]
    fn scalar_comparisons() {
        let p = basic(Dimension::TableSize, Operator::Gt, PolicyValue::Int(2048));
        assert_eq!(compile_basic(&p).unwrap(), "TableSize > 2048");

        let p = basic(Dimension::DiskSufficient, Operator::Eq, PolicyValue::Bool(false));
        assert_eq!(compile_basic(&p).unwrap(), "DiskSufficient == false");

        let kw = PolicyValue::Text(TextValue::KeyWord(KeyWordType::DropTable));
        let p = basic(Dimension::KeyWord, Operator::Ne, kw);
        assert_eq!(compile_basic(&p).unwrap(), r#"KeyWord != "drop table""#);
    }

    #[test]
    fn between_is_two_sided() {
        let p = basic(Dimension::AffectRows, Operator::Between, PolicyValue::IntList(vec![20000, 100000]));
        assert_eq!(
            compile_basic(&p).unwrap(),
            "20000 <= AffectRows && AffectRows <= 100000"
        );
    }

    #[test]
    fn between_needs_two_bounds() {
        let p = basic(Dimension::AffectRows, Operator::Between, PolicyValue::IntList(vec![1, 2, 3]));
        assert!(matches!(compile_basic(&p), Err(PolicyError::ValueShape(_))));
        let p = basic(Dimension::AffectRows, Operator::Between, PolicyValue::Int(5));
        assert!(matches!(compile_basic(&p), Err(PolicyError::UnsupportedOperator { .. })));
    }

    #[test]
    fn scalar_operator_rejects_lists() {
        let p = basic(Dimension::TableRows, Operator::Ge, PolicyValue::IntList(vec![1, 2]));
        let err = compile_basic(&p).unwrap_err();
        assert!(matches!(err, PolicyError::UnsupportedOperator { operator: Operator::Ge, .. }));
    }

    #[test]
    fn rule_match_calls() {
        let p = agg(Dimension::RuleMatch, Operator::All, &["OPE.DELETE.002", "OPE.AFFECTROWS.001"]);
        assert_eq!(
            compile_aggregate(&p).unwrap(),
            r#"ALL(matchedBasicIds, "OPE.DELETE.002", "OPE.AFFECTROWS.001")"#
        );
        let p = agg(Dimension::RuleMatch, Operator::Any, &["OPE.INSERT.000"]);
        assert_eq!(compile_aggregate(&p).unwrap(), r#"ANY(matchedBasicIds, "OPE.INSERT.000")"#);
    }

    #[test]
    fn direction_calls() {
        let p = agg(Dimension::RulePriority, Operator::Highest, &["*"]);
        assert_eq!(compile_aggregate(&p).unwrap(), r#"RulePriorityHIGHEST(matchedBasicIds, "*")"#);
        let p = agg(Dimension::RuleLevel, Operator::Lowest, &["*"]);
        assert_eq!(compile_aggregate(&p).unwrap(), r#"RuleLevelLOWEST(matchedBasicIds, "*")"#);
    }

    #[test]
    fn aggregate_pairing_errors() {
        let p = agg(Dimension::RuleMatch, Operator::Highest, &["*"]);
        assert!(matches!(compile_aggregate(&p), Err(PolicyError::UnsupportedOperator { .. })));
        let p = agg(Dimension::RuleLevel, Operator::All, &["*"]);
        assert!(matches!(compile_aggregate(&p), Err(PolicyError::UnsupportedOperator { .. })));
        let p = agg(Dimension::RuleMatch, Operator::All, &[]);
        assert!(matches!(compile_aggregate(&p), Err(PolicyError::ValueShape(_))));
    }

    #[test]
    fn compiling_is_pure_and_idempotent() {
        let input = vec![
            basic(Dimension::TableRows, Operator::Le, PolicyValue::Int(100000)),
            agg(Dimension::RuleMatch, Operator::All, &["A", "B"]),
        ];
        let before = input.clone();
        let first = compile_policies(&input).unwrap();
        let second = compile_policies(&input).unwrap();
        assert_eq!(input, before, "input must not be mutated");
        assert!(input.iter().all(|p| p.expr.is_empty()));
        assert_eq!(first, second);
        assert_eq!(first[0].expr, "TableRows <= 100000");
    }

    #[test]
    fn quotes_are_escaped() {
        assert_eq!(quote(r#"a"b\c"#), r#""a\"b\\c""#);
    }
}
