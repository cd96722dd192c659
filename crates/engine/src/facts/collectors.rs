//! Fact collectors, one per basic dimension.
//!
//! Collectors run in registry order against a shared [`Environment`], so a
//! collector may read facts produced earlier (AffectRows reads TableRows and
//! TableSize, DiskSufficient reads FreeDisk and TableSize). A missing
//! dependency is a [`FactError::Dependency`], never a default value.

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use sqlrisk_core::RiskConfig;
use sqlrisk_rules::schema::{ActionType, Dimension, KeyWordType, OperateType};
use sqlrisk_rules::{EnvValue, Environment};
use tracing::{debug, warn};

use super::probe::DatabaseProbe;
use crate::error::FactError;
use crate::sql::{Classification, ConstraintKind, SqlExtractor, TableRef};

/// Everything a collector may consult for one statement.
pub struct CollectContext<'a> {
    pub sql: &'a str,
    pub statement_id: &'a str,
    pub database: &'a str,
    pub classification: Classification,
    /// Facts collected so far for this statement.
    pub facts: &'a Environment,
    pub probe: &'a dyn DatabaseProbe,
    pub extractor: &'a dyn SqlExtractor,
    pub config: &'a RiskConfig,
    pub now: DateTime<Utc>,
}

impl CollectContext<'_> {
    /// An integer fact `dimension` depends on.
    pub fn int_fact(&self, dimension: Dimension, missing: Dimension) -> Result<i64, FactError> {
        match self.facts.get(missing.as_str()) {
            Some(EnvValue::Int(n)) => Ok(*n),
            other => Err(dependency(dimension, missing, other)),
        }
    }

    /// A boolean fact `dimension` depends on.
    pub fn bool_fact(&self, dimension: Dimension, missing: Dimension) -> Result<bool, FactError> {
        match self.facts.get(missing.as_str()) {
            Some(EnvValue::Bool(b)) => Ok(*b),
            other => Err(dependency(dimension, missing, other)),
        }
    }
}

fn dependency(dimension: Dimension, missing: Dimension, found: Option<&EnvValue>) -> FactError {
    let message = match found {
        Some(v) => format!("unexpected value {}", v),
        None => "not collected".to_string(),
    };
    FactError::Dependency { dimension, missing, message }
}

/// Produces one fact from the statement's touched tables.
pub type CollectFn = fn(&CollectContext<'_>, &[TableRef]) -> Result<EnvValue, FactError>;

/// How far a collected fact may be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheScope {
    /// Depends only on the tables; shared by every statement on them.
    Tables,
    /// Depends on the statement text; keyed by statement id as well.
    Statement,
}

#[derive(Debug, Clone, Copy)]
pub struct Collector {
    pub scope: CacheScope,
    pub collect: CollectFn,
}

/// Ordered dimension → collector table.
#[derive(Debug, Clone)]
pub struct CollectorRegistry {
    collectors: IndexMap<Dimension, Collector>,
}

impl CollectorRegistry {
    pub fn empty() -> Self {
        Self { collectors: IndexMap::new() }
    }

    /// Every basic fact dimension, dependencies first.
    pub fn standard() -> Self {
        use CacheScope::{Statement, Tables};

        let mut registry = Self::empty();
        registry.register(Dimension::TableExist, Statement, table_exist);
        registry.register(Dimension::TableSize, Tables, table_size);
        registry.register(Dimension::TableRows, Tables, table_rows);
        registry.register(Dimension::AffectRows, Statement, affect_rows);
        registry.register(Dimension::FreeDisk, Tables, free_disk);
        registry.register(Dimension::DiskSufficient, Tables, disk_sufficient);
        registry.register(Dimension::PrimaryKeyExist, Statement, primary_key_exist);
        registry.register(Dimension::ForeignKeyExist, Tables, foreign_key_exist);
        registry.register(Dimension::TriggerExist, Tables, trigger_exist);
        registry.register(Dimension::IndexExistInWhere, Statement, index_exist_in_where);
        registry.register(Dimension::CpuUsage, Tables, cpu_usage);
        registry.register(Dimension::BigTransaction, Tables, big_transaction);
        registry
    }

    /// Add or replace a collector. A replaced collector keeps its position.
    pub fn register(
        &mut self,
        dimension: Dimension,
        scope: CacheScope,
        collect: CollectFn,
    ) -> Option<Collector> {
        self.collectors.insert(dimension, Collector { scope, collect })
    }

    pub fn remove(&mut self, dimension: Dimension) -> Option<Collector> {
        self.collectors.shift_remove(&dimension)
    }

    pub fn get(&self, dimension: Dimension) -> Option<&Collector> {
        self.collectors.get(&dimension)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Dimension, &Collector)> {
        self.collectors.iter().map(|(d, c)| (*d, c))
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }
}

impl Default for CollectorRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

// ── Collectors ────────────────────────────────────────────────

/// Tables with both a database and a name; only these are probed.
fn complete(tables: &[TableRef]) -> impl Iterator<Item = &TableRef> {
    tables.iter().filter(|t| t.is_complete())
}

fn max_over(
    tables: &[TableRef],
    probe: impl Fn(&TableRef) -> Result<i64, FactError>,
) -> Result<EnvValue, FactError> {
    let mut max = 0;
    for table in complete(tables) {
        max = max.max(probe(table)?);
    }
    Ok(EnvValue::Int(max))
}

fn any_over(
    tables: &[TableRef],
    probe: impl Fn(&TableRef) -> Result<bool, FactError>,
) -> Result<EnvValue, FactError> {
    for table in complete(tables) {
        if probe(table)? {
            return Ok(EnvValue::Bool(true));
        }
    }
    Ok(EnvValue::Bool(false))
}

pub fn table_exist(ctx: &CollectContext<'_>, tables: &[TableRef]) -> Result<EnvValue, FactError> {
    if ctx.classification.keyword.creates_table() {
        return Ok(EnvValue::Bool(false));
    }
    for table in complete(tables) {
        if !ctx.probe.table_exists(table)? {
            debug!(table = %table, "table does not exist");
            return Ok(EnvValue::Bool(false));
        }
    }
    Ok(EnvValue::Bool(true))
}

pub fn table_size(ctx: &CollectContext<'_>, tables: &[TableRef]) -> Result<EnvValue, FactError> {
    max_over(tables, |t| ctx.probe.table_size_mb(t))
}

pub fn table_rows(ctx: &CollectContext<'_>, tables: &[TableRef]) -> Result<EnvValue, FactError> {
    max_over(tables, |t| ctx.probe.table_rows(t))
}

/// Rows a DML statement changes.
///
/// A DELETE/UPDATE without WHERE affects the whole table; a VALUES insert
/// affects one row per tuple. Anything else is rewritten as a query and
/// counted exactly on small tables, estimated with EXPLAIN on large ones.
pub fn affect_rows(ctx: &CollectContext<'_>, _tables: &[TableRef]) -> Result<EnvValue, FactError> {
    if ctx.classification.operate != OperateType::Dml {
        return Ok(EnvValue::Int(0));
    }
    let rows = ctx.int_fact(Dimension::AffectRows, Dimension::TableRows)?;
    let size = ctx.int_fact(Dimension::AffectRows, Dimension::TableSize)?;

    match ctx.classification.keyword {
        KeyWordType::Delete | KeyWordType::Update => return Ok(EnvValue::Int(rows)),
        KeyWordType::Insert | KeyWordType::Replace => {
            // REPLACE ... SELECT has no tuples and falls through to the query.
            if let Ok(n) = ctx.extractor.insert_row_count(ctx.sql) {
                return Ok(EnvValue::Int(n));
            }
        }
        _ => {}
    }

    let select = ctx.extractor.to_select(ctx.sql)?;
    let affected = if ctx.config.is_small_table(rows, size) {
        let count = ctx.extractor.to_count(&select)?;
        ctx.probe.count_rows(&count)?
    } else {
        ctx.probe.explain_rows(&select)?.into_iter().max().unwrap_or(0)
    };
    debug!(sql_id = %ctx.statement_id, affected, rows, size_mb = size, "estimated affected rows");
    Ok(EnvValue::Int(affected))
}

pub fn free_disk(ctx: &CollectContext<'_>, _tables: &[TableRef]) -> Result<EnvValue, FactError> {
    ctx.probe.free_disk_mb().map(EnvValue::Int)
}

pub fn disk_sufficient(ctx: &CollectContext<'_>, _tables: &[TableRef]) -> Result<EnvValue, FactError> {
    let free = ctx.int_fact(Dimension::DiskSufficient, Dimension::FreeDisk)?;
    let size = ctx.int_fact(Dimension::DiskSufficient, Dimension::TableSize)?;
    Ok(EnvValue::Bool(free > size))
}

/// A table that does not exist yet only has a primary key if the creating
/// statement declares one.
pub fn primary_key_exist(ctx: &CollectContext<'_>, tables: &[TableRef]) -> Result<EnvValue, FactError> {
    let exists = ctx.bool_fact(Dimension::PrimaryKeyExist, Dimension::TableExist)?;
    if !exists {
        let creates = ctx.classification.action == ActionType::Create
            && ctx.classification.keyword.creates_table();
        if !creates {
            return Ok(EnvValue::Bool(false));
        }
        let declared = ctx.extractor.table_constraints(ctx.sql)?;
        return Ok(EnvValue::Bool(
            declared.iter().any(|c| c.kind == ConstraintKind::PrimaryKey),
        ));
    }

    let mut probed = false;
    for table in complete(tables) {
        probed = true;
        let constraints = ctx.probe.constraints(table)?;
        if !constraints.iter().any(|c| c.kind == ConstraintKind::PrimaryKey) {
            debug!(table = %table, "table has no primary key");
            return Ok(EnvValue::Bool(false));
        }
    }
    Ok(EnvValue::Bool(probed))
}

pub fn foreign_key_exist(ctx: &CollectContext<'_>, tables: &[TableRef]) -> Result<EnvValue, FactError> {
    any_over(tables, |t| {
        Ok(ctx
            .probe
            .constraints(t)?
            .iter()
            .any(|c| c.kind == ConstraintKind::ForeignKey))
    })
}

pub fn trigger_exist(ctx: &CollectContext<'_>, tables: &[TableRef]) -> Result<EnvValue, FactError> {
    any_over(tables, |t| Ok(!ctx.probe.triggers(t)?.is_empty()))
}

/// Whether a WHERE column leads an index. Only DELETE and UPDATE are checked.
pub fn index_exist_in_where(
    ctx: &CollectContext<'_>,
    tables: &[TableRef],
) -> Result<EnvValue, FactError> {
    if !matches!(ctx.classification.action, ActionType::Delete | ActionType::Update) {
        return Ok(EnvValue::Bool(false));
    }
    let columns = ctx.extractor.where_columns(ctx.sql, ctx.database)?;
    for table in complete(tables) {
        let Some(cols) = columns.get(&table.to_string()).or_else(|| columns.get("")) else {
            continue;
        };
        let indexes = ctx.probe.indexes(table)?;
        let hit = indexes
            .iter()
            .filter_map(|idx| idx.columns.first())
            .any(|lead| cols.iter().any(|c| c.eq_ignore_ascii_case(lead)));
        if hit {
            return Ok(EnvValue::Bool(true));
        }
    }
    Ok(EnvValue::Bool(false))
}

pub fn cpu_usage(ctx: &CollectContext<'_>, _tables: &[TableRef]) -> Result<EnvValue, FactError> {
    ctx.probe.cpu_usage().map(EnvValue::Int)
}

/// Whether a transaction running longer than `tx_duration_secs` touches one
/// of the statement's tables.
pub fn big_transaction(ctx: &CollectContext<'_>, tables: &[TableRef]) -> Result<EnvValue, FactError> {
    let threshold = Duration::seconds(ctx.config.tx_duration_secs);
    for trx in ctx.probe.transactions()? {
        if trx.state.is_empty() || ctx.now - trx.started < threshold {
            continue;
        }
        let Ok(trx_tables) = ctx.extractor.touched_tables(&trx.query, ctx.database) else {
            continue;
        };
        if let Some(shared) = trx_tables.iter().find(|t| tables.contains(t)) {
            warn!(
                trx_id = %trx.id,
                table = %shared,
                query = %trx.query,
                "table is involved in a long-running transaction"
            );
            return Ok(EnvValue::Bool(true));
        }
    }
    Ok(EnvValue::Bool(false))
}
