//! Per-statement risk record.

use serde::Serialize;
use sqlrisk_rules::schema::{Dimension, Level, Policy};
use sqlrisk_rules::{EnvValue, MatchOutcome};

use crate::sql::{Classification, TableRef};

/// One collected fact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactRecord {
    /// Human-readable dimension name, e.g. "table rows".
    pub name: &'static str,
    pub id: Dimension,
    pub value: EnvValue,
    pub cost_ms: i64,
}

/// A fact that could not be collected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactErrorRecord {
    pub name: &'static str,
    pub error: String,
}

/// Risk level and whether special approval is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PreResult {
    pub level: Level,
    pub special: bool,
}

impl PreResult {
    /// The result of a statement or work order that could not be classified.
    pub const FATAL: PreResult = PreResult { level: Level::Fatal, special: false };
}

/// Verdict policies grouped by level.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LevelBuckets {
    pub info: Vec<Policy>,
    pub low: Vec<Policy>,
    pub high: Vec<Policy>,
    pub fatal: Vec<Policy>,
}

impl LevelBuckets {
    pub fn push(&mut self, policy: Policy) {
        self.bucket_mut(policy.level).push(policy);
    }

    pub fn get(&self, level: Level) -> &[Policy] {
        match level {
            Level::Info => &self.info,
            Level::Low => &self.low,
            Level::High => &self.high,
            Level::Fatal => &self.fatal,
        }
    }

    fn bucket_mut(&mut self, level: Level) -> &mut Vec<Policy> {
        match level {
            Level::Info => &mut self.info,
            Level::Low => &mut self.low,
            Level::High => &mut self.high,
            Level::Fatal => &mut self.fatal,
        }
    }

    /// All policies, most severe bucket first.
    pub fn iter(&self) -> impl Iterator<Item = &Policy> {
        Level::ALL.into_iter().flat_map(move |level| self.get(level).iter())
    }

    pub fn len(&self) -> usize {
        self.info.len() + self.low.len() + self.high.len() + self.fatal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything known about one statement of a work order.
#[derive(Debug, Clone, Serialize)]
pub struct StatementRisk {
    /// SHA-256 of the statement text.
    pub sql_id: String,
    pub sql: String,
    pub database: String,
    pub fingerprint: String,
    pub finger_id: String,
    pub classification: Classification,
    /// Tables the statement writes to or defines.
    pub tables: Vec<TableRef>,
    /// Touched tables plus every table read.
    pub related_tables: Vec<TableRef>,
    pub facts: Vec<FactRecord>,
    pub matched_basic: Vec<Policy>,
    pub matched_aggregate: Vec<Policy>,
    pub decisive: Option<Policy>,
    #[serde(flatten)]
    pub verdict: LevelBuckets,
    pub pre_result: Option<PreResult>,
    pub errors: Vec<FactErrorRecord>,
    pub cost_ms: i64,
}

impl StatementRisk {
    pub fn fact(&self, dimension: Dimension) -> Option<&EnvValue> {
        self.facts.iter().find(|f| f.id == dimension).map(|f| &f.value)
    }

    /// Record a fact, replacing an earlier value for the same dimension.
    pub fn record_fact(&mut self, dimension: Dimension, value: EnvValue, cost_ms: i64) {
        let record = FactRecord { name: dimension.meta().name, id: dimension, value, cost_ms };
        match self.facts.iter_mut().find(|f| f.id == dimension) {
            Some(existing) => *existing = record,
            None => self.facts.push(record),
        }
    }

    /// Record a collection failure once per (fact, message).
    pub fn record_error(&mut self, dimension: Dimension, error: impl ToString) {
        let record = FactErrorRecord { name: dimension.meta().name, error: error.to_string() };
        if !self.errors.contains(&record) {
            self.errors.push(record);
        }
    }

    /// Store the matching outcome and bucket its verdict.
    pub fn apply(&mut self, outcome: MatchOutcome) {
        self.pre_result = Some(PreResult {
            level: outcome.verdict.level,
            special: outcome.verdict.special,
        });
        self.verdict = LevelBuckets::default();
        self.verdict.push(outcome.verdict);
        self.matched_basic = outcome.matched_basic;
        self.matched_aggregate = outcome.matched_aggregate;
        self.decisive = Some(outcome.decisive);
    }

    pub fn level(&self) -> Option<Level> {
        self.pre_result.map(|r| r.level)
    }
}
