use std::collections::{HashMap, HashSet};

use super::fuzzy::fuzzy_match;
use super::ValidationResult;
use crate::compiler::{self, WILDCARD};
use crate::schema::{Policy, RuleKind};

pub(super) fn validate_unique_ids(policies: &[Policy], result: &mut ValidationResult) {
    let mut seen = HashSet::new();
    for p in policies {
        if !seen.insert(p.id.as_str()) {
            result.error(format!("{}.id", p.id), format!("duplicate policy id '{}'", p.id));
        }
    }
}

pub(super) fn validate_policy(p: &Policy, result: &mut ValidationResult) {
    if p.name.trim().is_empty() {
        result.error(format!("{}.name", p.id), "name must not be empty");
    }

    let dim = p.rule_id;
    if dim.kind() != p.kind {
        result.error(
            format!("{}.type", p.id),
            format!("dimension {} is {} but the policy is {}", dim, dim.kind(), p.kind),
        );
        return;
    }

    if !dim.allows(p.operator) {
        let allowed: Vec<&str> = dim.meta().operators.iter().map(|o| o.as_str()).collect();
        let msg = format!("operator '{}' is not allowed for {}", p.operator, dim);
        match fuzzy_match(p.operator.as_str(), &allowed) {
            Some(s) => result.error_with_suggestion(format!("{}.operator", p.id), msg, s),
            None => result.error(
                format!("{}.operator", p.id),
                format!("{} (allowed: {})", msg, allowed.join(", ")),
            ),
        }
        return;
    }

    if !p.value.fits(dim.value_type()) {
        result.error(
            format!("{}.value", p.id),
            format!(
                "{} value '{}' does not fit {} dimension {}",
                p.value.shape(),
                p.value,
                dim.value_type(),
                dim
            ),
        );
        return;
    }

    if let Err(e) = compiler::compile(p) {
        result.error(format!("{}.value", p.id), e.to_string());
    }
}

/// Aggregate values must name existing basic policies (or the wildcard).
pub(super) fn validate_references(policies: &[Policy], result: &mut ValidationResult) {
    let by_id: HashMap<&str, &Policy> = policies.iter().map(|p| (p.id.as_str(), p)).collect();
    let basic_ids: Vec<&str> = policies
        .iter()
        .filter(|p| p.kind == RuleKind::Basic)
        .map(|p| p.id.as_str())
        .collect();

    for agg in policies.iter().filter(|p| p.kind == RuleKind::Aggregate) {
        let Some(ids) = agg.value.as_str_list() else { continue };
        for id in ids {
            if id == WILDCARD {
                continue;
            }
            let path = format!("{}.value", agg.id);
            match by_id.get(id.as_str()) {
                None => {
                    let msg = format!("references unknown policy '{}'", id);
                    match fuzzy_match(id, &basic_ids) {
                        Some(s) => result.error_with_suggestion(path, msg, s),
                        None => result.error(path, msg),
                    }
                }
                Some(target) if target.kind != RuleKind::Basic => {
                    result.error(path, format!("references aggregate policy '{}'", id));
                }
                Some(target) if agg.enable && !target.enable => {
                    result.warn(path, format!("references disabled policy '{}'", id));
                }
                Some(_) => {}
            }
        }
    }
}

/// Warn when a kind has no enabled policy: every statement would fail.
pub(super) fn validate_coverage(policies: &[Policy], result: &mut ValidationResult) {
    for kind in [RuleKind::Basic, RuleKind::Aggregate] {
        if !policies.iter().any(|p| p.enable && p.kind == kind) {
            result.warn(
                "policies",
                format!("no enabled {} policy; every statement will fail classification", kind),
            );
        }
    }
}
