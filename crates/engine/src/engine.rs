//! The risk engine: per-statement identification and work-order assessment.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use sqlrisk_core::RiskConfig;
use sqlrisk_rules::schema::{Dimension, KeyWordType, Policy};
use sqlrisk_rules::{
    ConflictOrder, Environment, EvalexprEvaluator, ExprEvaluator, MatchError, Matcher, PolicySet,
};
use tracing::{debug, info, warn};

use crate::error::{Result, RiskError, SqlError};
use crate::facts::{CacheScope, CollectContext, CollectorRegistry, DatabaseProbe, FactCache, FactKey};
use crate::sql::{fingerprint_id, statement_id, LexicalSql, SqlExtractor, SqlSplitter};
use crate::statement::{PreResult, StatementRisk};
use crate::work_order::{ErrorKind, WorkOrderRisk};

const FULL_WIDTH_SPACE: char = '\u{3000}';

fn elapsed_ms(start: Instant) -> i64 {
    start.elapsed().as_millis() as i64
}

/// Classifies statements and work orders against one policy snapshot.
pub struct RiskEngine {
    policies: Arc<PolicySet>,
    evaluator: Arc<dyn ExprEvaluator>,
    splitter: Arc<dyn SqlSplitter>,
    extractor: Arc<dyn SqlExtractor>,
    probe: Arc<dyn DatabaseProbe>,
    collectors: CollectorRegistry,
    config: RiskConfig,
}

impl RiskEngine {
    /// Engine with the lexical SQL collaborators, the `evalexpr` evaluator
    /// and the standard collectors.
    pub fn new(policies: Arc<PolicySet>, probe: Arc<dyn DatabaseProbe>, config: RiskConfig) -> Self {
        let sql = Arc::new(LexicalSql::new());
        Self {
            policies,
            evaluator: Arc::new(EvalexprEvaluator::new()),
            splitter: sql.clone(),
            extractor: sql,
            probe,
            collectors: CollectorRegistry::standard(),
            config,
        }
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn ExprEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Use one implementation for both splitting and extraction.
    pub fn with_sql<S>(mut self, sql: S) -> Self
    where
        S: SqlSplitter + SqlExtractor + 'static,
    {
        let sql = Arc::new(sql);
        self.splitter = sql.clone();
        self.extractor = sql;
        self
    }

    pub fn with_collectors(mut self, collectors: CollectorRegistry) -> Self {
        self.collectors = collectors;
        self
    }

    pub fn policies(&self) -> &PolicySet {
        &self.policies
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// A fact cache sized for one work order.
    pub fn new_cache(&self) -> FactCache {
        FactCache::new(self.config.fact_cache_capacity)
    }

    /// Parse one statement: ids, fingerprint, tables and classification facts.
    pub fn statement(&self, sql: &str, database: &str) -> std::result::Result<StatementRisk, SqlError> {
        let start = Instant::now();
        let classification = self.extractor.classify(sql)?;
        let classify_ms = elapsed_ms(start);
        let tables = self.extractor.touched_tables(sql, database)?;
        let related_tables = self.extractor.related_tables(sql, database)?;
        let fingerprint = self.extractor.fingerprint(sql);

        let mut stmt = StatementRisk {
            sql_id: statement_id(sql),
            sql: sql.to_string(),
            database: database.to_string(),
            finger_id: fingerprint_id(&fingerprint),
            fingerprint,
            classification,
            tables,
            related_tables,
            facts: Vec::new(),
            matched_basic: Vec::new(),
            matched_aggregate: Vec::new(),
            decisive: None,
            verdict: Default::default(),
            pre_result: None,
            errors: Vec::new(),
            cost_ms: 0,
        };
        stmt.record_fact(Dimension::Operate, classification.operate.as_str().into(), classify_ms);
        stmt.record_fact(Dimension::Action, classification.action.as_str().into(), classify_ms);
        stmt.record_fact(Dimension::KeyWord, classification.keyword.as_str().into(), classify_ms);
        stmt.cost_ms = elapsed_ms(start);
        Ok(stmt)
    }

    /// Collect facts for `stmt`, then match and resolve its verdict.
    ///
    /// Collection failures are recorded on the statement and do not stop
    /// evaluation; a policy that reads a missing fact fails in matching.
    pub fn identify(
        &self,
        stmt: &mut StatementRisk,
        cache: &mut FactCache,
    ) -> std::result::Result<(), MatchError> {
        let start = Instant::now();
        let mut env = Environment::new();
        for fact in &stmt.facts {
            env.set(fact.id.as_str(), fact.value.clone());
        }

        let now = Utc::now();
        for (dimension, collector) in self.collectors.iter() {
            let begin = Instant::now();
            let key = match collector.scope {
                CacheScope::Tables => FactKey::new(&stmt.tables, dimension, &[]),
                CacheScope::Statement => FactKey::new(&stmt.tables, dimension, &[stmt.sql_id.as_str()]),
            };
            let fact = match cache.get(&key) {
                Some(fact) => fact,
                None => {
                    let ctx = CollectContext {
                        sql: &stmt.sql,
                        statement_id: &stmt.sql_id,
                        database: &stmt.database,
                        classification: stmt.classification,
                        facts: &env,
                        probe: self.probe.as_ref(),
                        extractor: self.extractor.as_ref(),
                        config: &self.config,
                        now,
                    };
                    let fact = (collector.collect)(&ctx, &stmt.tables);
                    cache.put(key, fact.clone());
                    fact
                }
            };
            let cost_ms = elapsed_ms(begin);

            match fact {
                Ok(value) => {
                    debug!(sql_id = %stmt.sql_id, dimension = %dimension, value = %value, cost_ms, "collected fact");
                    env.set(dimension.as_str(), value.clone());
                    stmt.record_fact(dimension, value, cost_ms);
                }
                Err(e) => {
                    warn!(sql_id = %stmt.sql_id, dimension = %dimension, error = %e, "fact collection failed");
                    stmt.record_error(dimension, e);
                }
            }
        }

        let outcome = Matcher::new(&self.policies, self.evaluator.as_ref()).evaluate(&env);
        stmt.cost_ms += elapsed_ms(start);
        match outcome {
            Ok(outcome) => {
                debug!(
                    sql_id = %stmt.sql_id,
                    verdict = %outcome.verdict.id,
                    level = %outcome.verdict.level,
                    cost_ms = stmt.cost_ms,
                    "identified statement risk"
                );
                stmt.apply(outcome);
                Ok(())
            }
            Err(e) => {
                stmt.pre_result = Some(PreResult::FATAL);
                Err(e)
            }
        }
    }

    /// Assess every statement of a work order and pick the work-order verdict.
    ///
    /// On failure the work order is left at `fatal` with the error recorded,
    /// and the error is returned.
    pub fn assess(&self, order: &mut WorkOrderRisk) -> Result<()> {
        let start = Instant::now();
        let result = self.run(order);
        order.cost_ms = elapsed_ms(start);
        order.count_verdicts();

        match &result {
            Ok(()) => info!(
                work_order = %order.id,
                statements = order.statements.len(),
                level = ?order.level(),
                cost_ms = order.cost_ms,
                "work order assessed"
            ),
            Err(e) => warn!(work_order = %order.id, error = %e, "work order could not be classified"),
        }
        result
    }

    fn run(&self, order: &mut WorkOrderRisk) -> Result<()> {
        if let Some(pos) = order.sql.find(FULL_WIDTH_SPACE) {
            order.sql = order.sql.replace(FULL_WIDTH_SPACE, " ");
            order.record_error(
                ErrorKind::ParseSql,
                format!("full-width space found near byte {}", pos),
            );
        }

        let texts = self.splitter.split(&order.sql);
        if texts.is_empty() {
            return Err(fail(order, ErrorKind::ParseSql, RiskError::NoStatements));
        }

        let mut statements = Vec::with_capacity(texts.len());
        for (index, text) in texts.iter().enumerate() {
            match self.statement(text, &order.database) {
                Ok(stmt) => statements.push(stmt),
                Err(source) => {
                    return Err(fail(order, ErrorKind::ParseSql, RiskError::Parse { index, source }))
                }
            }
        }
        order.statements = statements;
        order.count_statements();

        if let Err(e) = check_permissions(&order.database, &order.statements) {
            return Err(fail(order, ErrorKind::Authority, e));
        }

        let sampled = sample_inserts(&mut order.statements);
        if sampled > 0 {
            debug!(work_order = %order.id, sampled, "skipped inserts sharing a fingerprint");
        }

        let mut cache = self.new_cache();
        for index in 0..order.statements.len() {
            if let Err(source) = self.identify(&mut order.statements[index], &mut cache) {
                return Err(fail(order, ErrorKind::IdentifyRisk, RiskError::Identify { index, source }));
            }
        }
        debug!(
            work_order = %order.id,
            hits = cache.hits(),
            misses = cache.misses(),
            "fact cache"
        );

        let Some(verdict) = pool_verdict(&order.statements) else {
            return Err(fail(order, ErrorKind::IdentifyRisk, RiskError::EmptyPool));
        };
        order.set_verdict(verdict);
        Ok(())
    }
}

fn fail(order: &mut WorkOrderRisk, kind: ErrorKind, err: RiskError) -> RiskError {
    order.fail(kind, &err);
    err
}

/// Every table a statement touches or reads must live in the declared
/// database.
fn check_permissions(database: &str, statements: &[StatementRisk]) -> Result<()> {
    for stmt in statements {
        if let Some(table) = stmt.related_tables.iter().find(|t| t.database != database) {
            return Err(RiskError::ExceedingPermissions {
                database: database.to_string(),
                table: table.clone(),
            });
        }
    }
    Ok(())
}

/// The most severe statement verdict. Level leads, so a high-priority Low
/// verdict never outranks a High one from another statement.
fn pool_verdict(statements: &[StatementRisk]) -> Option<Policy> {
    let mut pool: Vec<&Policy> = statements.iter().flat_map(|s| s.verdict.iter()).collect();
    ConflictOrder::Level.sort(&mut pool);
    pool.first().map(|p| (*p).clone())
}

/// Keep the first plain INSERT per fingerprint. Returns how many were dropped.
fn sample_inserts(statements: &mut Vec<StatementRisk>) -> usize {
    let before = statements.len();
    let mut seen = HashSet::new();
    statements.retain(|s| {
        s.classification.keyword != KeyWordType::Insert || seen.insert(s.fingerprint.clone())
    });
    before - statements.len()
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::StaticProbe;
    use crate::sql::TableRef;
    use sqlrisk_rules::schema::Level;
    use sqlrisk_rules::EnvValue;

    fn engine() -> RiskEngine {
        RiskEngine::new(
            Arc::new(PolicySet::defaults().unwrap()),
            Arc::new(StaticProbe::default()),
            RiskConfig::default(),
        )
    }

    fn statements(sqls: &[&str], database: &str) -> Vec<StatementRisk> {
        let engine = engine();
        sqls.iter().map(|s| engine.statement(s, database).unwrap()).collect()
    }

    #[test]
    fn statement_carries_classification_facts() {
        let stmt = engine().statement("DELETE FROM orders WHERE id = 7", "shop").unwrap();

        assert_eq!(stmt.sql_id.len(), 64);
        assert_eq!(stmt.finger_id.len(), 16);
        assert_eq!(stmt.fingerprint, "delete from orders where id = ?");
        assert_eq!(stmt.tables, vec![TableRef::new("shop", "orders")]);
        assert_eq!(stmt.fact(Dimension::Operate), Some(&EnvValue::from("DML")));
        assert_eq!(stmt.fact(Dimension::Action), Some(&EnvValue::from("delete")));
        assert_eq!(stmt.fact(Dimension::KeyWord), Some(&EnvValue::from("delete from where")));
        assert!(stmt.pre_result.is_none());
    }

    #[test]
    fn blank_statement_is_a_parse_error() {
        assert_eq!(engine().statement("  ", "shop").unwrap_err(), SqlError::Empty);
    }

    #[test]
    fn related_tables_outside_the_database_are_refused() {
        let ok = statements(&["INSERT INTO t1 SELECT * FROM t2"], "d1");
        assert!(check_permissions("d1", &ok).is_ok());

        let reads_elsewhere = statements(&["INSERT INTO t1 SELECT * FROM d2.t2"], "d1");
        match check_permissions("d1", &reads_elsewhere) {
            Err(RiskError::ExceedingPermissions { database, table }) => {
                assert_eq!(database, "d1");
                assert_eq!(table, TableRef::new("d2", "t2"));
            }
            other => panic!("expected ExceedingPermissions, got {:?}", other),
        }
    }

    fn verdict(id: &str, level: Level, priority: i64, special: bool) -> Policy {
        let mut policy = PolicySet::defaults().unwrap().get("OPE.AFFECTROWS.003").unwrap().clone();
        policy.id = id.into();
        policy.level = level;
        policy.priority = priority;
        policy.special = special;
        policy
    }

    #[test]
    fn pooled_verdict_ranks_level_before_priority() {
        let mut stmts = statements(&["INSERT INTO t (a) VALUES (1)", "DELETE FROM t"], "d1");
        stmts[0].verdict.push(verdict("AGG.LOW.001", Level::Low, 900, false));
        stmts[1].verdict.push(verdict("AGG.HIGH.001", Level::High, 10, false));
        assert_eq!(pool_verdict(&stmts).unwrap().id, "AGG.HIGH.001");

        // Same level: priority decides, then non-special first.
        stmts[0].verdict.push(verdict("AGG.HIGH.002", Level::High, 50, true));
        stmts[1].verdict.push(verdict("AGG.HIGH.003", Level::High, 50, false));
        assert_eq!(pool_verdict(&stmts).unwrap().id, "AGG.HIGH.003");

        assert!(pool_verdict(&statements(&["DELETE FROM t"], "d1")).is_none());
    }

    #[test]
    fn inserts_are_sampled_by_fingerprint() {
        let mut stmts = statements(
            &[
                "INSERT INTO t (a) VALUES (1)",
                "INSERT INTO t (a) VALUES (2), (3)",
                "DELETE FROM t WHERE a = 1",
                "DELETE FROM t WHERE a = 2",
                "INSERT INTO u (a) VALUES (1)",
                "INSERT INTO t SELECT * FROM v",
                "INSERT INTO t SELECT * FROM v",
            ],
            "d1",
        );
        assert_eq!(sample_inserts(&mut stmts), 1);

        let kept: Vec<&str> = stmts.iter().map(|s| s.sql.as_str()).collect();
        assert_eq!(
            kept,
            [
                "INSERT INTO t (a) VALUES (1)",
                "DELETE FROM t WHERE a = 1",
                "DELETE FROM t WHERE a = 2",
                "INSERT INTO u (a) VALUES (1)",
                "INSERT INTO t SELECT * FROM v",
                "INSERT INTO t SELECT * FROM v",
            ]
        );
    }
}
