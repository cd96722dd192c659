use std::sync::LazyLock;

use regex::Regex;

use super::fuzzy::fuzzy_match;
use super::ValidationResult;
use crate::schema::{
    rule_catalog, ActionType, Dimension, KeyWordType, OperateType, PolicyRecord, PolicyValue,
    ValueType,
};

/// `UPPER.UPPER.NNN`, e.g. `OPE.DROP.001`.
static POLICY_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z]{3,}\.[A-Z]{3,}\.\d{3}$").expect("policy id regex is valid")
});

pub(crate) fn is_valid_policy_id(id: &str) -> bool {
    POLICY_ID.is_match(id)
}

pub(super) fn validate_id(record: &PolicyRecord, result: &mut ValidationResult) {
    if !is_valid_policy_id(&record.id) {
        result.error(
            format!("{}.id", record.id),
            format!(
                "policy id '{}' must look like CATEGORY.NAME.NNN (at least 3 uppercase letters per part)",
                record.id
            ),
        );
    }
}

pub(super) fn validate_dimension_and_value(record: &PolicyRecord, result: &mut ValidationResult) {
    if record.rule_id.parse::<Dimension>().is_err() {
        let ids: Vec<&str> = rule_catalog().iter().map(|m| m.id_str).collect();
        let msg = format!("unknown dimension '{}'", record.rule_id);
        match fuzzy_match(&record.rule_id, &ids) {
            Some(s) => result.error_with_suggestion(format!("{}.rule_id", record.id), msg, s),
            None => result.error(format!("{}.rule_id", record.id), msg),
        }
        return;
    }

    if let Err(e) = PolicyValue::coerce(&record.value, &record.rule_id) {
        let path = format!("{}.value", record.id);
        match vocabulary_suggestion(record) {
            Some(s) => result.error_with_suggestion(path, e.to_string(), s),
            None => result.error(path, e.to_string()),
        }
    }
}

fn vocabulary_suggestion(record: &PolicyRecord) -> Option<&'static str> {
    let dim: Dimension = record.rule_id.parse().ok()?;
    let words: Vec<&'static str> = match dim.value_type() {
        ValueType::Operate => OperateType::ALL.iter().map(|v| v.as_str()).collect(),
        ValueType::Action => ActionType::ALL.iter().map(|v| v.as_str()).collect(),
        ValueType::KeyWord => KeyWordType::ALL.iter().map(|v| v.as_str()).collect(),
        _ => return None,
    };
    fuzzy_match(&record.value, &words)
}
