//! Policy validation with structured errors and suggestions.
//!
//! Record checks look at one persisted record in isolation (id format,
//! dimension, value text). Set checks look at typed policies together
//! (names, duplicates, kind/operator/value agreement, aggregate references,
//! compilability). Returns a [`ValidationResult`] with errors (block install)
//! and warnings (advisory).

mod record_checks;
mod set_checks;

pub(crate) mod fuzzy;

use serde::{Deserialize, Serialize};

use crate::schema::{Policy, PolicyRecord};

// ── Result types ────────────────────────────────────────────────────

/// Overall validation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

/// A blocking validation error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    /// Location, e.g. `"OPE.DROP.001.operator"`.
    pub path: String,
    pub message: String,
    /// Optional "Did you mean …?" suggestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// A non-blocking advisory warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationResult {
    pub(crate) fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(ValidationError {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        });
    }

    pub(crate) fn error_with_suggestion(
        &mut self,
        path: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) {
        self.valid = false;
        self.errors.push(ValidationError {
            path: path.into(),
            message: message.into(),
            suggestion: Some(suggestion.into()),
        });
    }

    pub(crate) fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationWarning {
            path: path.into(),
            message: message.into(),
        });
    }

    fn merge(&mut self, other: ValidationResult) {
        self.valid &= other.valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// One-line rendering of all errors.
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| match &e.suggestion {
                Some(s) => format!("{}: {} (did you mean '{}'?)", e.path, e.message, s),
                None => format!("{}: {}", e.path, e.message),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// ── Public API ──────────────────────────────────────────────────────

/// Validate a single persisted record.
pub fn validate_record(record: &PolicyRecord) -> ValidationResult {
    let mut result = ValidationResult::new();
    record_checks::validate_id(record, &mut result);
    record_checks::validate_dimension_and_value(record, &mut result);
    result
}

/// Validate typed policies as a set.
pub fn validate_policies(policies: &[Policy]) -> ValidationResult {
    let mut result = ValidationResult::new();
    set_checks::validate_unique_ids(policies, &mut result);
    for policy in policies {
        set_checks::validate_policy(policy, &mut result);
    }
    set_checks::validate_references(policies, &mut result);
    set_checks::validate_coverage(policies, &mut result);
    result
}

/// Validate persisted records, then the typed set they convert to.
pub fn validate_records(records: &[PolicyRecord]) -> ValidationResult {
    let mut result = ValidationResult::new();
    for record in records {
        result.merge(validate_record(record));
    }
    if !result.valid {
        return result;
    }

    let mut policies = Vec::with_capacity(records.len());
    for record in records {
        match Policy::try_from(record.clone()) {
            Ok(p) => policies.push(p),
            Err(e) => result.error(record.id.clone(), e.to_string()),
        }
    }
    if result.valid {
        crate::set::name_rule_match_policies(&mut policies);
        result.merge(validate_policies(&policies));
    }
    result
}
