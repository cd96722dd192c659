//! Work-order risk record: a batch of statements submitted together.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlrisk_rules::schema::{Level, Policy};
use uuid::Uuid;

use crate::statement::{LevelBuckets, PreResult, StatementRisk};

/// Stage of the work-order pipeline an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ParseSql,
    Authority,
    IdentifyRisk,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::ParseSql => "parse sql",
            ErrorKind::Authority => "authority",
            ErrorKind::IdentifyRisk => "identify risk",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub error: String,
}

/// Counts over the statements of a work order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub database_count: usize,
    pub table_count: usize,
    pub statement_count: usize,
    pub error_count: usize,
    pub fatal_count: usize,
    pub high_count: usize,
    pub low_count: usize,
    pub info_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkOrderRisk {
    pub id: Uuid,
    pub database: String,
    pub sql: String,
    pub submitted_at: DateTime<Utc>,
    pub statements: Vec<StatementRisk>,
    pub summary: Summary,
    /// The work-order verdict, bucketed by level.
    #[serde(flatten)]
    pub verdict: LevelBuckets,
    pub pre_result: Option<PreResult>,
    pub errors: Vec<ErrorRecord>,
    pub cost_ms: i64,
}

impl WorkOrderRisk {
    pub fn new(database: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            database: database.into(),
            sql: sql.into(),
            submitted_at: Utc::now(),
            statements: Vec::new(),
            summary: Summary::default(),
            verdict: LevelBuckets::default(),
            pre_result: None,
            errors: Vec::new(),
            cost_ms: 0,
        }
    }

    pub fn record_error(&mut self, kind: ErrorKind, error: impl ToString) {
        self.errors.push(ErrorRecord { kind, error: error.to_string() });
    }

    /// Mark the work order unclassifiable.
    pub fn fail(&mut self, kind: ErrorKind, error: impl ToString) {
        self.pre_result = Some(PreResult::FATAL);
        self.record_error(kind, error);
    }

    pub fn set_verdict(&mut self, policy: Policy) {
        self.pre_result = Some(PreResult { level: policy.level, special: policy.special });
        self.verdict = LevelBuckets::default();
        self.verdict.push(policy);
    }

    pub fn level(&self) -> Option<Level> {
        self.pre_result.map(|r| r.level)
    }

    /// Count databases, tables and statements from the touched tables.
    pub fn count_statements(&mut self) {
        let mut databases = BTreeSet::new();
        let mut tables = BTreeSet::new();
        for stmt in &self.statements {
            for table in &stmt.tables {
                databases.insert(table.database.as_str());
                tables.insert(table);
            }
        }
        self.summary.database_count = databases.len();
        self.summary.table_count = tables.len();
        self.summary.statement_count = self.statements.len();
    }

    /// Refresh the error and per-level verdict counts.
    pub fn count_verdicts(&mut self) {
        self.summary.error_count = self.errors.len();
        let statements = &self.statements;
        let count = |level: Level| -> usize {
            statements.iter().map(|s| s.verdict.get(level).len()).sum()
        };
        self.summary.fatal_count = count(Level::Fatal);
        self.summary.high_count = count(Level::High);
        self.summary.low_count = count(Level::Low);
        self.summary.info_count = count(Level::Info);
    }
}
