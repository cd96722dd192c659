use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlrisk_core::CoreError;

use crate::error::FactError;
use crate::sql::{TableConstraint, TableRef};

/// An index and its columns in key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub columns: Vec<String>,
}

/// An open transaction as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub started: DateTime<Utc>,
    /// Statement the transaction is currently running; may be empty.
    #[serde(default)]
    pub query: String,
    /// Empty when the server reports no state.
    #[serde(default)]
    pub state: String,
}

/// Live database and host metrics consulted by the fact collectors.
///
/// Tables the server does not know report zero size and rows, and no
/// constraints, triggers or indexes, the way `information_schema` does.
pub trait DatabaseProbe: Send + Sync {
    fn table_exists(&self, table: &TableRef) -> Result<bool, FactError>;

    /// Data plus index size in MB.
    fn table_size_mb(&self, table: &TableRef) -> Result<i64, FactError>;

    /// Estimated row count from table statistics.
    fn table_rows(&self, table: &TableRef) -> Result<i64, FactError>;

    /// Free space on the data volume in MB.
    fn free_disk_mb(&self) -> Result<i64, FactError>;

    /// Current CPU utilisation in percent.
    fn cpu_usage(&self) -> Result<i64, FactError>;

    fn constraints(&self, table: &TableRef) -> Result<Vec<TableConstraint>, FactError>;

    /// Trigger names defined on the table.
    fn triggers(&self, table: &TableRef) -> Result<Vec<String>, FactError>;

    fn indexes(&self, table: &TableRef) -> Result<Vec<IndexInfo>, FactError>;

    /// Execute a `SELECT COUNT(*)` query.
    fn count_rows(&self, sql: &str) -> Result<i64, FactError>;

    /// Row estimates from `EXPLAIN`, one per plan row.
    fn explain_rows(&self, sql: &str) -> Result<Vec<i64>, FactError>;

    fn transactions(&self) -> Result<Vec<Transaction>, FactError>;
}

// ── Static probe ──────────────────────────────────────────────

/// Recorded facts for one table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TableFacts {
    pub size_mb: i64,
    pub rows: i64,
    pub constraints: Vec<TableConstraint>,
    pub triggers: Vec<String>,
    pub indexes: Vec<IndexInfo>,
}

/// The document a [`StaticProbe`] is loaded from.
///
/// ```yaml
/// free_disk_mb: 51200
/// cpu_usage: 12
/// tables:
///   shop.orders:
///     size_mb: 300
///     rows: 150000
///     constraints: [{ kind: primary_key, columns: [id] }]
///     indexes: [{ name: idx_user, columns: [user_id] }]
/// default_count: 10
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticFacts {
    pub free_disk_mb: Option<i64>,
    pub cpu_usage: Option<i64>,
    /// Keyed by `db.table`.
    pub tables: BTreeMap<String, TableFacts>,
    /// Exact `COUNT(*)` results keyed by query text.
    pub counts: BTreeMap<String, i64>,
    /// Used when a count query has no recorded result.
    pub default_count: Option<i64>,
    /// `EXPLAIN` row estimates keyed by query text.
    pub explain: BTreeMap<String, Vec<i64>>,
    pub default_explain: Option<Vec<i64>>,
    pub transactions: Vec<Transaction>,
    /// Unknown tables fail instead of reading as empty.
    pub strict: bool,
}

/// In-memory [`DatabaseProbe`] answering from [`StaticFacts`].
///
/// Every call is logged so callers can check which lookups were made.
#[derive(Debug, Default)]
pub struct StaticProbe {
    facts: StaticFacts,
    calls: Mutex<Vec<String>>,
}

impl StaticProbe {
    pub fn new(facts: StaticFacts) -> Self {
        Self { facts, calls: Mutex::new(Vec::new()) }
    }

    pub fn from_yaml(text: &str) -> Result<Self, CoreError> {
        let facts: StaticFacts =
            serde_yaml::from_str(text).map_err(|e| CoreError::Serialize(e.to_string()))?;
        Ok(Self::new(facts))
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn facts(&self) -> &StaticFacts {
        &self.facts
    }

    /// Calls received so far, as `operation` or `operation target`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of received calls whose operation is `op`.
    pub fn call_count(&self, op: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split(' ').next() == Some(op))
            .count()
    }

    fn record(&self, op: &str, target: impl std::fmt::Display) {
        let entry = format!("{} {}", op, target).trim_end().to_string();
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(entry);
    }

    fn table(&self, table: &TableRef) -> Result<Option<&TableFacts>, FactError> {
        match self.facts.tables.get(&table.to_string()) {
            Some(t) => Ok(Some(t)),
            None if self.facts.strict => Err(FactError::UnknownTable(table.clone())),
            None => Ok(None),
        }
    }
}

impl DatabaseProbe for StaticProbe {
    fn table_exists(&self, table: &TableRef) -> Result<bool, FactError> {
        self.record("table_exists", table);
        Ok(self.facts.tables.contains_key(&table.to_string()))
    }

    fn table_size_mb(&self, table: &TableRef) -> Result<i64, FactError> {
        self.record("table_size_mb", table);
        Ok(self.table(table)?.map_or(0, |t| t.size_mb))
    }

    fn table_rows(&self, table: &TableRef) -> Result<i64, FactError> {
        self.record("table_rows", table);
        Ok(self.table(table)?.map_or(0, |t| t.rows))
    }

    fn free_disk_mb(&self) -> Result<i64, FactError> {
        self.record("free_disk_mb", "");
        self.facts
            .free_disk_mb
            .ok_or_else(|| FactError::probe("free_disk_mb", "host", "no data point"))
    }

    fn cpu_usage(&self) -> Result<i64, FactError> {
        self.record("cpu_usage", "");
        self.facts
            .cpu_usage
            .ok_or_else(|| FactError::probe("cpu_usage", "host", "no data point"))
    }

    fn constraints(&self, table: &TableRef) -> Result<Vec<TableConstraint>, FactError> {
        self.record("constraints", table);
        Ok(self.table(table)?.map(|t| t.constraints.clone()).unwrap_or_default())
    }

    fn triggers(&self, table: &TableRef) -> Result<Vec<String>, FactError> {
        self.record("triggers", table);
        Ok(self.table(table)?.map(|t| t.triggers.clone()).unwrap_or_default())
    }

    fn indexes(&self, table: &TableRef) -> Result<Vec<IndexInfo>, FactError> {
        self.record("indexes", table);
        Ok(self.table(table)?.map(|t| t.indexes.clone()).unwrap_or_default())
    }

    fn count_rows(&self, sql: &str) -> Result<i64, FactError> {
        self.record("count_rows", sql);
        self.facts
            .counts
            .get(sql)
            .copied()
            .or(self.facts.default_count)
            .ok_or_else(|| FactError::probe("count_rows", sql, "no recorded result"))
    }

    fn explain_rows(&self, sql: &str) -> Result<Vec<i64>, FactError> {
        self.record("explain_rows", sql);
        self.facts
            .explain
            .get(sql)
            .or(self.facts.default_explain.as_ref())
            .cloned()
            .ok_or_else(|| FactError::probe("explain_rows", sql, "no recorded plan"))
    }

    fn transactions(&self) -> Result<Vec<Transaction>, FactError> {
        self.record("transactions", "");
        Ok(self.facts.transactions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::ConstraintKind;

    const FACTS: &str = r#"
free_disk_mb: 51200
tables:
  shop.orders:
    size_mb: 300
    rows: 150000
    constraints:
      - { kind: primary_key, columns: [id] }
    triggers: [orders_audit]
    indexes:
      - { name: idx_user, columns: [user_id, created_at] }
counts:
  "SELECT COUNT(*) AS row_count FROM orders WHERE id = 1": 1
transactions:
  - id: "421"
    started: 2026-01-01T00:00:00Z
    query: "UPDATE orders SET state = 2"
    state: RUNNING
"#;

    #[test]
    fn loads_yaml_facts() {
        let probe = StaticProbe::from_yaml(FACTS).unwrap();
        let orders = TableRef::new("shop", "orders");

        assert!(probe.table_exists(&orders).unwrap());
        assert_eq!(probe.table_rows(&orders).unwrap(), 150_000);
        assert_eq!(probe.constraints(&orders).unwrap()[0].kind, ConstraintKind::PrimaryKey);
        assert_eq!(probe.indexes(&orders).unwrap()[0].columns[0], "user_id");
        assert_eq!(probe.transactions().unwrap()[0].state, "RUNNING");
        assert_eq!(
            probe.count_rows("SELECT COUNT(*) AS row_count FROM orders WHERE id = 1").unwrap(),
            1
        );
    }

    #[test]
    fn unknown_tables_read_as_empty_unless_strict() {
        let probe = StaticProbe::from_yaml(FACTS).unwrap();
        let missing = TableRef::new("shop", "missing");
        assert!(!probe.table_exists(&missing).unwrap());
        assert_eq!(probe.table_size_mb(&missing).unwrap(), 0);

        let strict = StaticProbe::new(StaticFacts { strict: true, ..Default::default() });
        assert_eq!(strict.table_rows(&missing), Err(FactError::UnknownTable(missing.clone())));
    }

    #[test]
    fn missing_metrics_are_probe_errors() {
        let probe = StaticProbe::default();
        assert!(matches!(probe.cpu_usage(), Err(FactError::Probe { op: "cpu_usage", .. })));
        assert!(probe.count_rows("SELECT COUNT(*) FROM t").is_err());
        assert!(probe.explain_rows("SELECT * FROM t").is_err());
    }

    #[test]
    fn records_calls() {
        let probe = StaticProbe::from_yaml(FACTS).unwrap();
        probe.table_rows(&TableRef::new("shop", "orders")).unwrap();
        probe.free_disk_mb().unwrap();
        assert_eq!(probe.calls(), vec!["table_rows shop.orders", "free_disk_mb"]);
        assert_eq!(probe.call_count("table_rows"), 1);
        assert_eq!(probe.call_count("count_rows"), 0);
    }

    #[test]
    fn bad_yaml_is_a_serialize_error() {
        let err = StaticProbe::from_yaml("tables: [1, 2").unwrap_err();
        assert!(matches!(err, CoreError::Serialize(_)));
    }
}
