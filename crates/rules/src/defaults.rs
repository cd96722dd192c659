//! Built-in policy catalog seeded into empty stores.

use crate::schema::{
    ActionType, Dimension, KeyWordType, Level, Operator, Policy, PolicyValue, RuleKind, TextValue,
};

#[allow(clippy::too_many_arguments)]
fn policy(
    id: &str,
    name: &str,
    kind: RuleKind,
    dim: Dimension,
    op: Operator,
    value: PolicyValue,
    level: Level,
    special: bool,
    priority: i64,
) -> Policy {
    Policy {
        id: id.to_string(),
        name: name.to_string(),
        enable: true,
        kind,
        rule_id: dim,
        operator: op,
        value,
        level,
        special,
        priority,
        description: String::new(),
        suggestion: String::new(),
        expr: String::new(),
    }
}

fn action(id: &str, action: ActionType) -> Policy {
    policy(
        id,
        &format!("{} statement", action),
        RuleKind::Basic,
        Dimension::Action,
        Operator::Eq,
        PolicyValue::Text(TextValue::Action(action)),
        Level::Low,
        false,
        10,
    )
}

fn keyword(id: &str, name: &str, kw: KeyWordType, level: Level, priority: i64) -> Policy {
    policy(
        id,
        name,
        RuleKind::Basic,
        Dimension::KeyWord,
        Operator::Eq,
        PolicyValue::Text(TextValue::KeyWord(kw)),
        level,
        false,
        priority,
    )
}

#[allow(clippy::too_many_arguments)]
fn fact(id: &str, name: &str, dim: Dimension, op: Operator, value: PolicyValue, level: Level, special: bool, priority: i64) -> Policy {
    policy(id, name, RuleKind::Basic, dim, op, value, level, special, priority)
}

fn agg(id: &str, dim: Dimension, op: Operator, ids: &[&str], level: Level, special: bool, priority: i64) -> Policy {
    let ids = ids.iter().map(|s| s.to_string()).collect();
    // RuleMatch names are generated from the referenced policies.
    let name = match dim {
        Dimension::RulePriority | Dimension::RuleLevel => format!("{} {}", dim, op),
        _ => String::new(),
    };
    policy(id, &name, RuleKind::Aggregate, dim, op, PolicyValue::StrList(ids), level, special, priority)
}

fn with_suggestion(mut p: Policy, suggestion: &str) -> Policy {
    p.suggestion = suggestion.to_string();
    p
}

/// The default policy catalog.
pub fn default_policies() -> Vec<Policy> {
    use Dimension as D;
    use KeyWordType as K;
    use Level::{Fatal, High, Low};
    use Operator as O;
    use PolicyValue::{Bool, Int, IntList};

    let mut policies = vec![
        // ── Actions ───────────────────────────────────────────────
        action("OPE.UNKNOWN.000", ActionType::Unknown),
        action("OPE.SELECT.000", ActionType::Select),
        action("OPE.DROP.000", ActionType::Drop),
        action("OPE.TRUNCATE.000", ActionType::Truncate),
        action("OPE.CREATE.000", ActionType::Create),
        action("OPE.ALTER.000", ActionType::Alter),
        action("OPE.RENAME.000", ActionType::Rename),
        action("OPE.INSERT.000", ActionType::Insert),
        action("OPE.REPLACE.000", ActionType::Replace),
        action("OPE.DELETE.000", ActionType::Delete),
        action("OPE.UPDATE.000", ActionType::Update),
        // ── Keywords ──────────────────────────────────────────────
        keyword("OPE.UNKNOWN.001", "unrecognised statement", K::Unknown, Low, 999),
        keyword("OPE.SELECT.001", "query", K::Select, Low, 60),
        keyword("OPE.DROP.001", "drop table", K::DropTable, High, 60),
        keyword("OPE.DROP.002", "drop database", K::DropDatabase, High, 60),
        keyword("OPE.DROP.003", "drop index", K::DropIndex, High, 60),
        keyword("OPE.DROP.004", "drop procedure", K::DropProcedure, Fatal, 999),
        keyword("OPE.DROP.005", "drop function", K::DropFunction, Fatal, 999),
        keyword("OPE.DROP.006", "drop view", K::DropView, Fatal, 999),
        keyword("OPE.DROP.007", "drop trigger", K::DropTrigger, Fatal, 999),
        keyword("OPE.DROP.008", "drop table if exists", K::DropTableIfExists, High, 60),
        keyword("OPE.TRUNCATE.001", "truncate table", K::TruncateTable, High, 60),
        keyword("OPE.CREATE.001", "create table", K::CreateTable, Low, 60),
        keyword("OPE.CREATE.002", "copy table", K::CreateTableAs, Fatal, 999),
        keyword("OPE.CREATE.003", "create temporary table", K::CreateTemporaryTable, Fatal, 999),
        keyword("OPE.CREATE.004", "create index", K::CreateIndex, High, 60),
        keyword("OPE.CREATE.005", "create unique index", K::CreateUniqueIndex, High, 60),
        keyword("OPE.CREATE.006", "create procedure", K::CreateProcedure, Fatal, 999),
        keyword("OPE.CREATE.007", "create function", K::CreateFunction, Fatal, 999),
        keyword("OPE.CREATE.008", "create view", K::CreateView, Fatal, 999),
        keyword("OPE.CREATE.009", "create trigger", K::CreateTrigger, Fatal, 999),
        keyword("OPE.ALTER.001", "alter table", K::Alter, High, 60),
        keyword("OPE.ALTER.002", "add column", K::AlterAddColumn, High, 60),
        keyword("OPE.ALTER.003", "drop column", K::AlterDropColumn, High, 60),
        keyword("OPE.ALTER.004", "modify column", K::AlterModifyColumn, High, 60),
        keyword("OPE.ALTER.005", "rename column", K::AlterRenameColumn, High, 60),
        keyword("OPE.ALTER.006", "change column", K::AlterChangeColumn, High, 50),
        keyword("OPE.ALTER.007", "add primary key", K::AlterAddPrimaryKey, High, 60),
        keyword("OPE.ALTER.008", "drop primary key", K::AlterDropPrimaryKey, Fatal, 999),
        keyword("OPE.ALTER.009", "add index", K::AlterAddIndex, High, 60),
        keyword("OPE.ALTER.010", "add unique constraint", K::AlterAddUnique, High, 60),
        keyword("OPE.ALTER.011", "add unique index", K::AlterAddUniqueIndex, High, 60),
        keyword("OPE.ALTER.012", "drop index via alter", K::AlterDropIndex, High, 60),
        keyword("OPE.RENAME.001", "rename table", K::RenameTable, High, 60),
        keyword("OPE.INSERT.001", "insert rows", K::Insert, Low, 60),
        keyword("OPE.INSERT.002", "insert from query", K::InsertSelect, High, 60),
        keyword("OPE.REPLACE.003", "replace rows", K::Replace, Low, 60),
        keyword("OPE.DELETE.001", "delete matching rows", K::DeleteWhere, High, 60),
        with_suggestion(
            keyword("OPE.DELETE.002", "delete every row", K::Delete, High, 60),
            "add a WHERE clause or use TRUNCATE with approval",
        ),
        keyword("OPE.UPDATE.001", "update matching rows", K::UpdateWhere, High, 60),
        with_suggestion(
            keyword("OPE.UPDATE.002", "update every row", K::Update, High, 60),
            "add a WHERE clause",
        ),
        // ── Affected rows ─────────────────────────────────────────
        fact("OPE.AFFECTROWS.001", "affects at least 100k rows", D::AffectRows, O::Ge, Int(100_000), High, true, 70),
        fact("OPE.AFFECTROWS.002", "affects 20k to 100k rows", D::AffectRows, O::Between, IntList(vec![20_000, 100_000]), High, true, 70),
        fact("OPE.AFFECTROWS.003", "affects at most 20k rows", D::AffectRows, O::Le, Int(20_000), Low, false, 70),
        // ── Capacity ──────────────────────────────────────────────
        fact("RUN.CAPACITY.001", "table larger than 2GB", D::TableSize, O::Gt, Int(2048), High, false, 50),
        fact("RUN.CAPACITY.002", "table at most 2GB", D::TableSize, O::Le, Int(2048), Low, false, 50),
        fact("RUN.CAPACITY.003", "table at most 100k rows", D::TableRows, O::Le, Int(100_000), Low, false, 10),
        fact("RUN.CAPACITY.004", "table over 20k rows", D::TableRows, O::Gt, Int(20_000), Low, false, 10),
        fact("RUN.CAPACITY.005", "table at most 20k rows", D::TableRows, O::Le, Int(20_000), Low, false, 10),
        fact("RUN.CAPACITY.006", "disk space sufficient", D::DiskSufficient, O::Eq, Bool(true), Low, false, 10),
        fact("RUN.CAPACITY.007", "disk space insufficient", D::DiskSufficient, O::Eq, Bool(false), Low, false, 10),
        // ── Table info ────────────────────────────────────────────
        fact("RUN.TABINFO.001", "primary key present", D::PrimaryKeyExist, O::Eq, Bool(true), Low, false, 10),
        fact("RUN.TABINFO.002", "primary key missing", D::PrimaryKeyExist, O::Eq, Bool(false), Low, false, 10),
        fact("RUN.TABINFO.003", "foreign key present", D::ForeignKeyExist, O::Eq, Bool(true), Low, false, 10),
        fact("RUN.TABINFO.004", "no foreign key", D::ForeignKeyExist, O::Eq, Bool(false), Low, false, 10),
        fact("RUN.TABINFO.005", "trigger present", D::TriggerExist, O::Eq, Bool(true), Low, false, 10),
        fact("RUN.TABINFO.006", "no trigger", D::TriggerExist, O::Eq, Bool(false), Low, false, 10),
        fact("RUN.TABINFO.007", "where clause uses an index", D::IndexExistInWhere, O::Eq, Bool(true), Low, false, 10),
        fact("RUN.TABINFO.008", "where clause uses no index", D::IndexExistInWhere, O::Eq, Bool(false), Low, false, 10),
        // ── Aggregates ────────────────────────────────────────────
        agg("AGG.RULEPRIORITY.001", D::RulePriority, O::Highest, &["*"], Low, true, 150),
        agg("AGG.RULEPRIORITY.002", D::RulePriority, O::Lowest, &["*"], Low, false, 140),
        agg("AGG.RULELEVEL.001", D::RuleLevel, O::Highest, &["*"], Low, false, 130),
        agg("AGG.RULELEVEL.002", D::RuleLevel, O::Lowest, &["*"], Low, false, 120),
        agg("AGG.RULEMATCH.001", D::RuleMatch, O::Any, &["OPE.INSERT.000"], Low, false, 150),
        agg("AGG.RULEMATCH.002", D::RuleMatch, O::All, &["OPE.ALTER.000", "RUN.CAPACITY.002"], Low, false, 200),
        agg("AGG.RULEMATCH.003", D::RuleMatch, O::All, &["OPE.ALTER.000", "RUN.CAPACITY.001"], High, false, 200),
        agg("AGG.RULEMATCH.004", D::RuleMatch, O::All, &["OPE.DELETE.002", "OPE.AFFECTROWS.001"], High, true, 200),
        agg("AGG.RULEMATCH.005", D::RuleMatch, O::All, &["OPE.DELETE.002", "OPE.AFFECTROWS.002"], Low, true, 200),
        agg("AGG.RULEMATCH.006", D::RuleMatch, O::All, &["OPE.DELETE.002", "OPE.AFFECTROWS.003"], Low, true, 200),
        agg("AGG.RULEMATCH.007", D::RuleMatch, O::All, &["OPE.DELETE.001", "RUN.CAPACITY.003"], Low, true, 210),
        agg("AGG.RULEMATCH.008", D::RuleMatch, O::All, &["OPE.DELETE.001", "RUN.TABINFO.008", "RUN.CAPACITY.004"], High, true, 200),
        agg("AGG.RULEMATCH.009", D::RuleMatch, O::All, &["OPE.DELETE.001", "RUN.TABINFO.008", "OPE.AFFECTROWS.003"], High, false, 200),
        agg("AGG.RULEMATCH.010", D::RuleMatch, O::All, &["OPE.DELETE.001", "RUN.TABINFO.007", "RUN.CAPACITY.004"], High, true, 200),
        agg("AGG.RULEMATCH.011", D::RuleMatch, O::All, &["OPE.DELETE.001", "RUN.TABINFO.007", "OPE.AFFECTROWS.003"], Low, false, 200),
        agg("AGG.RULEMATCH.012", D::RuleMatch, O::All, &["OPE.UPDATE.002", "OPE.AFFECTROWS.001"], High, true, 200),
        agg("AGG.RULEMATCH.013", D::RuleMatch, O::All, &["OPE.UPDATE.002", "OPE.AFFECTROWS.002"], Low, true, 200),
        agg("AGG.RULEMATCH.014", D::RuleMatch, O::All, &["OPE.UPDATE.002", "OPE.AFFECTROWS.003"], Low, false, 200),
        agg("AGG.RULEMATCH.015", D::RuleMatch, O::All, &["OPE.UPDATE.001", "RUN.CAPACITY.003"], Low, false, 210),
        agg("AGG.RULEMATCH.016", D::RuleMatch, O::All, &["OPE.UPDATE.001", "RUN.TABINFO.008", "RUN.CAPACITY.004"], High, true, 200),
        agg("AGG.RULEMATCH.017", D::RuleMatch, O::All, &["OPE.UPDATE.001", "RUN.TABINFO.008", "OPE.AFFECTROWS.003"], High, false, 200),
        agg("AGG.RULEMATCH.018", D::RuleMatch, O::All, &["OPE.UPDATE.001", "RUN.TABINFO.007", "RUN.CAPACITY.004"], High, true, 200),
        agg("AGG.RULEMATCH.019", D::RuleMatch, O::All, &["OPE.UPDATE.001", "RUN.TABINFO.007", "OPE.AFFECTROWS.003"], Low, false, 200),
        agg("AGG.RULEMATCH.020", D::RuleMatch, O::All, &["OPE.ALTER.000", "RUN.CAPACITY.007"], Fatal, false, 200),
    ];
    crate::set::name_rule_match_policies(&mut policies);
    policies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate_policies;

    #[test]
    fn defaults_are_valid() {
        let result = validate_policies(&default_policies());
        assert!(result.valid, "{}", result.summary());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn rule_match_names_are_generated() {
        let policies = default_policies();
        let p = policies.iter().find(|p| p.id == "AGG.RULEMATCH.004").unwrap();
        assert_eq!(p.name, "delete every row&&affects at least 100k rows");
        let p = policies.iter().find(|p| p.id == "AGG.RULEMATCH.001").unwrap();
        assert_eq!(p.name, "insert statement");
    }

    #[test]
    fn every_keyword_has_a_policy() {
        let policies = default_policies();
        for kw in KeyWordType::ALL {
            let covered = policies.iter().any(|p| {
                p.value == PolicyValue::Text(TextValue::KeyWord(*kw))
            });
            assert!(covered, "no default policy for keyword '{}'", kw);
        }
    }
}
