//! Table references, aliases, WHERE columns and DDL constraints.

use std::collections::BTreeMap;

use sqlrisk_rules::schema::{ActionType, KeyWordType};

use super::stream::Stream;
use super::{Classification, ConstraintKind, TableConstraint, TableRef, WhereColumns};
use crate::error::SqlError;

/// Words that end a table reference instead of aliasing it.
const NOT_ALIAS: &[&str] = &[
    "where", "join", "inner", "left", "right", "outer", "cross", "natural", "straight_join", "on",
    "using", "set", "order", "group", "limit", "having", "union", "for", "lock", "partition", "use",
    "force", "ignore", "window", "values", "value", "select", "into", "as", "from", "to", "with",
];

/// Functions whose arguments may contain a non-table `FROM`.
const FROM_FUNCTIONS: &[&str] = &["extract", "trim", "substring", "substr", "position"];

/// Words that never name a column inside a WHERE clause.
const WHERE_WORDS: &[&str] = &[
    "and", "or", "not", "xor", "in", "is", "null", "like", "between", "exists", "true", "false",
    "regexp", "rlike", "div", "mod", "escape", "binary", "interval", "case", "when", "then",
    "else", "end", "collate", "sounds", "any", "all", "some", "distinct", "as", "asc", "desc",
    "unknown", "current_timestamp", "current_date", "current_time", "now", "date", "time",
    "timestamp", "day", "hour", "minute", "second", "microsecond", "week", "month", "quarter",
    "year",
];

/// Alias (or bare table name) to the table it stands for.
pub(super) type AliasMap = BTreeMap<String, TableRef>;

fn resolve(db: Option<String>, name: String, default_db: &str) -> TableRef {
    TableRef::new(db.unwrap_or_else(|| default_db.to_string()), name)
}

fn push_unique(out: &mut Vec<TableRef>, t: TableRef) {
    if !out.contains(&t) {
        out.push(t);
    }
}

/// Skip leading statement modifiers such as `LOW_PRIORITY` or `IGNORE`.
fn skip_modifiers(s: &Stream<'_>, mut i: usize) -> usize {
    while s.kw_any(i, &["low_priority", "delayed", "high_priority", "quick", "ignore"]) {
        i += 1;
    }
    i
}

/// Parse one table reference with its optional alias at `i`.
/// Returns the reference and the index after it; subqueries yield `None`.
fn table_ref(
    s: &Stream<'_>,
    i: usize,
    default_db: &str,
    aliases: &mut AliasMap,
) -> (Option<TableRef>, usize) {
    if s.punct(i, "(") {
        let next = s.close_of(i).map_or(s.len(), |c| c + 1);
        return (None, skip_alias(s, next));
    }
    let Some((db, name, mut next)) = s.object_name(i) else {
        return (None, i + 1);
    };
    let table = resolve(db, name.clone(), default_db);
    aliases.insert(name, table.clone());
    aliases.insert(table.to_string(), table.clone());

    if s.kw(next, "as") {
        next += 1;
    }
    if let Some(t) = s.get(next).filter(|t| t.is_ident()) {
        if !s.kw_any(next, NOT_ALIAS) {
            aliases.insert(t.ident(), table.clone());
            next += 1;
        }
    }
    (Some(table), next)
}

fn skip_alias(s: &Stream<'_>, mut i: usize) -> usize {
    if s.kw(i, "as") {
        i += 1;
    }
    if s.get(i).is_some_and(|t| t.is_ident()) && !s.kw_any(i, NOT_ALIAS) {
        i += 1;
    }
    i
}

/// Comma-separated references starting at `i`, stopping at the first
/// token that does not continue the list.
fn table_list(
    s: &Stream<'_>,
    mut i: usize,
    default_db: &str,
    aliases: &mut AliasMap,
) -> (Vec<TableRef>, usize) {
    let mut out = Vec::new();
    loop {
        let (table, next) = table_ref(s, i, default_db, aliases);
        if let Some(t) = table {
            push_unique(&mut out, t);
        }
        i = next;
        if s.punct(i, ",") {
            i += 1;
            continue;
        }
        return (out, i);
    }
}

/// `FROM` inside `EXTRACT(.. FROM ..)` and friends is not a table list.
fn is_function_from(s: &Stream<'_>, i: usize) -> bool {
    s.open_of(i)
        .and_then(|open| open.checked_sub(1))
        .is_some_and(|f| s.kw_any(f, FROM_FUNCTIONS))
}

/// Every table read through `FROM`/`JOIN` anywhere in the statement.
fn read_tables(s: &Stream<'_>, default_db: &str, aliases: &mut AliasMap) -> Vec<TableRef> {
    let mut out = Vec::new();
    for i in 0..s.len() {
        let refs = if s.kw(i, "from") && !is_function_from(s, i) {
            table_list(s, i + 1, default_db, aliases).0
        } else if s.kw_any(i, &["join", "straight_join"]) {
            table_ref(s, i + 1, default_db, aliases).0.into_iter().collect()
        } else {
            continue;
        };
        for t in refs {
            push_unique(&mut out, t);
        }
    }
    out
}

/// Tables the statement writes to or defines, plus the alias map.
pub(super) fn touched(
    s: &Stream<'_>,
    class: &Classification,
    default_db: &str,
) -> (Vec<TableRef>, AliasMap) {
    let mut aliases = AliasMap::new();
    let mut out = Vec::new();

    match s.word(0).as_str() {
        "use" => {
            if let Some(db) = s.get(1).filter(|t| t.is_ident()) {
                out.push(TableRef::new(db.ident(), ""));
            }
        }
        "drop" | "create" | "alter" | "truncate" => {
            ddl_targets(s, class, default_db, &mut aliases, &mut out)
        }
        "rename" => {
            // RENAME TABLE a TO b, c TO d: the old names.
            let mut i = 2;
            while i < s.len() {
                let (old, next) = table_ref(s, i, default_db, &mut aliases);
                out.extend(old);
                let Some(to) = (next..s.len()).find(|&j| s.kw(j, "to")) else { break };
                let (_, after) = table_ref(s, to + 1, default_db, &mut aliases);
                if !s.punct(after, ",") {
                    break;
                }
                i = after + 1;
            }
        }
        "insert" | "replace" => {
            let mut i = skip_modifiers(s, 1);
            if s.kw(i, "into") {
                i += 1;
            }
            if let Some((db, name, _)) = s.object_name(i) {
                out.push(resolve(db, name, default_db));
            }
        }
        "update" => {
            let i = skip_modifiers(s, 1);
            let end = s.find_top(i, &["set"]).unwrap_or(s.len());
            out = update_refs(s, i, end, default_db, &mut aliases);
        }
        "delete" => out = delete_targets(s, default_db, &mut aliases),
        _ => {}
    }

    if class.action == ActionType::Select {
        read_tables(s, default_db, &mut aliases)
            .into_iter()
            .for_each(|t| push_unique(&mut out, t));
    }
    (out, aliases)
}

/// Touched tables plus every table read, and rename targets.
pub(super) fn related(s: &Stream<'_>, class: &Classification, default_db: &str) -> Vec<TableRef> {
    let (mut out, mut aliases) = touched(s, class, default_db);
    for t in read_tables(s, default_db, &mut aliases) {
        push_unique(&mut out, t);
    }
    if class.keyword == KeyWordType::RenameTable {
        for i in 0..s.len() {
            if s.kw(i, "to") {
                if let (Some(t), _) = table_ref(s, i + 1, default_db, &mut aliases) {
                    push_unique(&mut out, t);
                }
            }
        }
    }
    out
}

fn ddl_targets(
    s: &Stream<'_>,
    class: &Classification,
    default_db: &str,
    aliases: &mut AliasMap,
    out: &mut Vec<TableRef>,
) {
    use KeyWordType as K;

    let after = |word: &str| (0..s.len()).find(|&i| s.kw(i, word)).map(|i| s.skip_if_exists(i + 1));
    match class.keyword {
        K::DropDatabase => {
            let db = after("database").or_else(|| after("schema"));
            if let Some(t) = db.and_then(|i| s.get(i)).filter(|t| t.is_ident()) {
                out.push(TableRef::new(t.ident(), ""));
            }
        }
        K::DropTable | K::DropTableIfExists | K::DropView => {
            let word = if class.keyword == K::DropView { "view" } else { "table" };
            if let Some(i) = after(word) {
                out.extend(table_list(s, i, default_db, aliases).0);
            }
        }
        K::DropIndex | K::CreateIndex | K::CreateUniqueIndex | K::CreateTrigger => {
            if let Some(on) = (0..s.len()).find(|&i| s.kw(i, "on")) {
                out.extend(table_ref(s, on + 1, default_db, aliases).0);
            }
        }
        K::TruncateTable => {
            let i = if s.kw(1, "table") { 2 } else { 1 };
            out.extend(table_ref(s, i, default_db, aliases).0);
        }
        K::CreateTable | K::CreateTableAs | K::CreateTemporaryTable | K::CreateView => {
            let word = if class.keyword == K::CreateView { "view" } else { "table" };
            if let Some((db, name, _)) = after(word).and_then(|i| s.object_name(i)) {
                out.push(resolve(db, name, default_db));
            }
        }
        _ if class.action == ActionType::Alter => {
            if let Some((db, name, _)) = after("table").and_then(|i| s.object_name(i)) {
                out.push(resolve(db, name, default_db));
            }
        }
        _ => {}
    }
}

/// `UPDATE a JOIN b ON .. SET`: every reference before `SET`.
fn update_refs(
    s: &Stream<'_>,
    from: usize,
    end: usize,
    default_db: &str,
    aliases: &mut AliasMap,
) -> Vec<TableRef> {
    let mut out = Vec::new();
    let (first, _) = table_list(s, from, default_db, aliases);
    out.extend(first);
    for i in from..end {
        if s.kw_any(i, &["join", "straight_join"]) {
            if let (Some(t), _) = table_ref(s, i + 1, default_db, aliases) {
                push_unique(&mut out, t);
            }
        }
    }
    out
}

/// `DELETE t1 FROM t1 JOIN t2` deletes from the targets named before
/// `FROM`; plain `DELETE FROM t` from the tables after it.
fn delete_targets(s: &Stream<'_>, default_db: &str, aliases: &mut AliasMap) -> Vec<TableRef> {
    let start = skip_modifiers(s, 1);
    let Some(from) = s.find_top(start, &["from"]) else {
        return Vec::new();
    };
    let (sources, after) = table_list(s, from + 1, default_db, aliases);
    // Register joined tables' aliases too.
    read_tables(s, default_db, aliases);

    if from == start {
        // DELETE FROM a, b USING t1 AS a JOIN t2 AS b ...
        if s.kw(after, "using") {
            table_list(s, after + 1, default_db, aliases);
            return sources
                .into_iter()
                .map(|t| aliases.get(&t.table).cloned().unwrap_or(t))
                .collect();
        }
        return sources;
    }

    let mut out = Vec::new();
    let mut i = start;
    while i < from {
        if let Some((db, name, next)) = s.object_name(i) {
            let target = aliases.get(&name).cloned().unwrap_or_else(|| resolve(db, name, default_db));
            push_unique(&mut out, target);
            i = next;
        } else {
            i += 1;
        }
    }
    out
}

/// Columns referenced by the top-level WHERE clause.
pub(super) fn where_columns(
    s: &Stream<'_>,
    class: &Classification,
    default_db: &str,
) -> WhereColumns {
    let mut columns = WhereColumns::new();
    let Some(start) = s.find_top(0, &["where"]) else {
        return columns;
    };
    let (touched, mut aliases) = touched(s, class, default_db);
    let mut tables = touched;
    for t in read_tables(s, default_db, &mut aliases) {
        push_unique(&mut tables, t);
    }
    let default_key = match tables.as_slice() {
        [only] => only.to_string(),
        _ => String::new(),
    };

    let mut i = start + 1;
    while i < s.len() {
        if s.depth(i) == 0 && s.kw_any(i, &["order", "group", "limit", "having", "union", "for", "lock"]) {
            break;
        }
        if s.punct(i, "(") && s.kw(i + 1, "select") {
            i = s.close_of(i).map_or(s.len(), |c| c + 1);
            continue;
        }
        let Some(tok) = s.get(i).filter(|t| t.is_ident()) else {
            i += 1;
            continue;
        };
        // Function call or user variable.
        if s.punct(i + 1, "(") || (i > 0 && s.punct(i - 1, "@")) {
            i += 1;
            continue;
        }

        let mut parts = vec![tok.ident()];
        let mut j = i + 1;
        while s.punct(j, ".") && s.get(j + 1).is_some_and(|t| t.is_ident()) {
            parts.push(s.get(j + 1).map(|t| t.ident()).unwrap_or_default());
            j += 2;
        }
        i = j;

        if parts.len() == 1 && s.kw_any(j - 1, WHERE_WORDS) {
            continue;
        }
        let column = parts.pop().unwrap_or_default();
        let key = match parts.as_slice() {
            [] => default_key.clone(),
            [qualifier] => aliases
                .get(qualifier)
                .map(|t| t.to_string())
                .unwrap_or_else(|| TableRef::new(default_db, qualifier.as_str()).to_string()),
            [db, table] => TableRef::new(db.as_str(), table.as_str()).to_string(),
            _ => continue,
        };
        let entry = columns.entry(key).or_default();
        if !entry.contains(&column) {
            entry.push(column);
        }
    }
    columns
}

/// Constraints and indexes declared by `CREATE TABLE`, including inline
/// column `PRIMARY KEY` / `UNIQUE` / `REFERENCES`.
pub(super) fn table_constraints(s: &Stream<'_>) -> Result<Vec<TableConstraint>, SqlError> {
    let Some(table) = (0..s.len()).find(|&i| s.kw(i, "table")) else {
        return Err(SqlError::Malformed("not a CREATE TABLE statement".into()));
    };
    let Some(open) = (table..s.len()).find(|&i| s.depth(i) == 0 && s.punct(i, "(")) else {
        return Ok(Vec::new());
    };
    let close = s.close_of(open).unwrap_or(s.len());

    let mut out = Vec::new();
    let mut item = open + 1;
    while item < close {
        let end = (item..close)
            .find(|&j| s.depth(j) == s.depth(open) + 1 && s.punct(j, ","))
            .unwrap_or(close);
        if let Some(c) = definition(s, item, end) {
            out.push(c);
        }
        item = end + 1;
    }
    Ok(out)
}

fn definition(s: &Stream<'_>, mut i: usize, end: usize) -> Option<TableConstraint> {
    let mut name = String::new();
    if s.kw(i, "constraint") {
        i += 1;
        if !s.kw_any(i, &["primary", "unique", "foreign", "check"]) {
            name = s.get(i)?.ident();
            i += 1;
        }
    }

    let kind = match s.word(i).as_str() {
        "primary" => ConstraintKind::PrimaryKey,
        "unique" => ConstraintKind::Unique,
        "key" | "index" => ConstraintKind::Key,
        "fulltext" | "spatial" => ConstraintKind::Fulltext,
        "foreign" => ConstraintKind::ForeignKey,
        "check" => ConstraintKind::Check,
        _ => return inline_constraint(s, i, end),
    };

    let open = (i..end).find(|&j| s.punct(j, "("));
    if kind == ConstraintKind::PrimaryKey {
        name = "PRIMARY".to_string();
    } else if name.is_empty() {
        // Optional index name between the keywords and the column list.
        if let Some(n) = (i + 1..open.unwrap_or(end)).find(|&j| {
            s.get(j).is_some_and(|t| t.is_ident())
                && !s.kw_any(j, &["key", "index", "using", "btree", "hash"])
        }) {
            name = s.get(n).map(|t| t.ident()).unwrap_or_default();
        }
    }
    let columns = match (kind, open) {
        (ConstraintKind::Check, _) | (_, None) => Vec::new(),
        (_, Some(open)) => column_list(s, open),
    };
    Some(TableConstraint { name, kind, columns })
}

/// `col type ... PRIMARY KEY | UNIQUE [KEY] | REFERENCES t(c)`.
fn inline_constraint(s: &Stream<'_>, i: usize, end: usize) -> Option<TableConstraint> {
    let column = s.get(i).filter(|t| t.is_ident())?.ident();
    let kind = (i + 1..end).find_map(|j| match s.word(j).as_str() {
        "primary" if s.kw(j + 1, "key") => Some(ConstraintKind::PrimaryKey),
        "unique" => Some(ConstraintKind::Unique),
        "references" => Some(ConstraintKind::ForeignKey),
        _ => None,
    })?;
    let name = match kind {
        ConstraintKind::PrimaryKey => "PRIMARY".to_string(),
        _ => column.clone(),
    };
    Some(TableConstraint { name, kind, columns: vec![column] })
}

/// Column names inside the parenthesised list at `open`.
fn column_list(s: &Stream<'_>, open: usize) -> Vec<String> {
    let close = s.close_of(open).unwrap_or(s.len());
    let inner = s.depth(open) + 1;
    let mut out = Vec::new();
    let mut expect_name = true;
    for j in open + 1..close {
        if s.depth(j) != inner {
            continue;
        }
        if s.punct(j, ",") {
            expect_name = true;
        } else if expect_name {
            if let Some(t) = s.get(j).filter(|t| t.is_ident()) {
                out.push(t.ident());
            }
            expect_name = false;
        }
    }
    out
}

/// Top-level tuples after `VALUES`, or one row for `INSERT ... SET`.
pub(super) fn insert_row_count(s: &Stream<'_>) -> Result<i64, SqlError> {
    if let Some(values) = s.find_top(1, &["values", "value"]) {
        let mut rows = 0;
        let mut i = values + 1;
        while s.punct(i, "(") {
            rows += 1;
            i = s.close_of(i).map_or(s.len(), |c| c + 1);
            if !s.punct(i, ",") {
                break;
            }
            i += 1;
        }
        return Ok(rows);
    }
    if s.find_top(1, &["set"]).is_some() {
        return Ok(1);
    }
    Err(SqlError::Malformed("insert takes its rows from a query".into()))
}
