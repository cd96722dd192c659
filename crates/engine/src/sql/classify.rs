//! Statement classification onto the operate/action/keyword vocabularies.

use sqlrisk_rules::schema::{ActionType as A, KeyWordType as K, OperateType as O};

use super::stream::Stream;
use super::Classification;
use crate::error::SqlError;

const OBJECTS: &[&str] = &[
    "table", "index", "view", "procedure", "function", "trigger", "database", "schema", "event",
    "user", "role", "server", "tablespace", "logfile",
];

fn ddl(action: A, keyword: K) -> Classification {
    Classification::new(O::Ddl, action, keyword)
}

fn dml(action: A, keyword: K) -> Classification {
    Classification::new(O::Dml, action, keyword)
}

pub(super) fn classify(s: &Stream<'_>) -> Result<Classification, SqlError> {
    if s.is_empty() {
        return Err(SqlError::Empty);
    }
    let c = match s.word(0).as_str() {
        "select" | "with" => Classification::new(O::Dql, A::Select, K::Select),
        "" if s.punct(0, "(") && s.kw(1, "select") => Classification::new(O::Dql, A::Select, K::Select),
        "drop" => classify_drop(s),
        "truncate" => ddl(A::Truncate, K::TruncateTable),
        "create" => classify_create(s),
        "alter" => classify_alter(s),
        "rename" if s.kw(1, "table") => ddl(A::Rename, K::RenameTable),
        "insert" if is_insert_select(s) => dml(A::Insert, K::InsertSelect),
        "insert" => dml(A::Insert, K::Insert),
        "replace" => dml(A::Replace, K::Replace),
        "delete" if s.find_top(1, &["where"]).is_some() => dml(A::Delete, K::DeleteWhere),
        "delete" => dml(A::Delete, K::Delete),
        "update" if s.find_top(1, &["where"]).is_some() => dml(A::Update, K::UpdateWhere),
        "update" => dml(A::Update, K::Update),
        _ => Classification::UNKNOWN,
    };
    Ok(c)
}

/// Index of the object word (`table`, `index`, ...) after `CREATE`/`DROP`
/// and whether `TEMPORARY` / `UNIQUE` preceded it.
fn object_word(s: &Stream<'_>) -> Option<(usize, String, bool, bool)> {
    let (mut temporary, mut unique) = (false, false);
    for i in 1..s.len() {
        if s.punct(i, "(") {
            return None;
        }
        let w = s.word(i);
        match w.as_str() {
            "temporary" => temporary = true,
            "unique" => unique = true,
            _ if OBJECTS.contains(&w.as_str()) => return Some((i, w, temporary, unique)),
            _ => {}
        }
    }
    None
}

fn classify_drop(s: &Stream<'_>) -> Classification {
    let Some((i, object, _, _)) = object_word(s) else {
        return Classification::UNKNOWN;
    };
    match object.as_str() {
        "table" if s.skip_if_exists(i + 1) != i + 1 => ddl(A::Drop, K::DropTableIfExists),
        "table" => ddl(A::Drop, K::DropTable),
        "view" => ddl(A::Drop, K::DropView),
        "database" | "schema" => ddl(A::Drop, K::DropDatabase),
        "index" => ddl(A::Drop, K::DropIndex),
        "procedure" => ddl(A::Drop, K::DropProcedure),
        "function" => ddl(A::Drop, K::DropFunction),
        "trigger" => ddl(A::Drop, K::DropTrigger),
        _ => Classification::UNKNOWN,
    }
}

fn classify_create(s: &Stream<'_>) -> Classification {
    let Some((i, object, temporary, unique)) = object_word(s) else {
        return Classification::UNKNOWN;
    };
    match object.as_str() {
        "table" if temporary => ddl(A::Create, K::CreateTemporaryTable),
        "table" if s.find_top(i + 1, &["select"]).is_some() => ddl(A::Create, K::CreateTableAs),
        "table" => ddl(A::Create, K::CreateTable),
        "index" if unique => ddl(A::Create, K::CreateUniqueIndex),
        "index" => ddl(A::Create, K::CreateIndex),
        "view" => ddl(A::Create, K::CreateView),
        "procedure" => ddl(A::Create, K::CreateProcedure),
        "function" => ddl(A::Create, K::CreateFunction),
        "trigger" => ddl(A::Create, K::CreateTrigger),
        _ => Classification::UNKNOWN,
    }
}

/// The first recognised alter specification decides the keyword.
fn classify_alter(s: &Stream<'_>) -> Classification {
    let Some(table) = (1..s.len().min(4)).find(|&i| s.kw(i, "table")) else {
        return Classification::UNKNOWN;
    };
    let Some((_, _, mut i)) = s.object_name(table + 1) else {
        return ddl(A::Alter, K::Alter);
    };

    while i < s.len() {
        if let Some(keyword) = alter_spec(s, i) {
            return ddl(A::Alter, keyword);
        }
        // Next specification.
        match (i..s.len()).find(|&j| s.depth(j) == 0 && s.punct(j, ",")) {
            Some(comma) => i = comma + 1,
            None => break,
        }
    }
    ddl(A::Alter, K::Alter)
}

fn alter_spec(s: &Stream<'_>, i: usize) -> Option<K> {
    match s.word(i).as_str() {
        "add" => {
            let mut k = i + 1;
            if s.kw(k, "constraint") {
                k += 1;
                if !s.kw_any(k, &["primary", "unique", "foreign", "check"]) {
                    k += 1;
                }
            }
            match s.word(k).as_str() {
                "column" => Some(K::AlterAddColumn),
                "primary" => Some(K::AlterAddPrimaryKey),
                "unique" => Some(K::AlterAddUnique),
                "index" | "key" => Some(K::AlterAddIndex),
                "fulltext" | "spatial" | "foreign" | "check" | "partition" | "constraint" => None,
                _ => Some(K::AlterAddColumn),
            }
        }
        "drop" => match s.word(i + 1).as_str() {
            "column" => Some(K::AlterDropColumn),
            "primary" => Some(K::AlterDropPrimaryKey),
            "index" | "key" => Some(K::AlterDropIndex),
            "foreign" | "check" | "constraint" | "partition" => None,
            _ => Some(K::AlterDropColumn),
        },
        "modify" => Some(K::AlterModifyColumn),
        "change" => Some(K::AlterChangeColumn),
        "rename" if s.kw(i + 1, "column") => Some(K::AlterRenameColumn),
        _ => None,
    }
}

/// `INSERT ... SELECT`: a query source and no `VALUES`/`SET` list.
fn is_insert_select(s: &Stream<'_>) -> bool {
    s.find_top(1, &["values", "value", "set"]).is_none()
        && (1..s.len()).any(|i| s.kw(i, "select"))
}
