//! SQL collaborators: statement splitting and lexical extraction.
//!
//! The engine only needs a statement's shape, the tables it touches, the
//! columns its WHERE clause filters on and a normalized fingerprint. All of
//! that comes from a token stream; there is no full parser.

mod classify;
mod fingerprint;
mod lexer;
mod lexical;
mod rewrite;
mod stream;
mod tables;

#[cfg(test)]
mod tests;

pub use fingerprint::{fingerprint, fingerprint_id, statement_id};
pub use lexer::{tokenize, Token, TokenKind};
pub use lexical::LexicalSql;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlrisk_rules::schema::{ActionType, KeyWordType, OperateType};

use crate::error::SqlError;

/// A `database.table` reference. `DROP DATABASE d` yields `d.` with an
/// empty table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableRef {
    pub database: String,
    pub table: String,
}

impl TableRef {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self { database: database.into(), table: table.into() }
    }

    /// Parse `db.table`, `table` (taking `default_db`) or `db.`.
    pub fn parse(text: &str, default_db: &str) -> Self {
        match text.split_once('.') {
            Some((db, table)) => Self::new(db, table),
            None => Self::new(default_db, text),
        }
    }

    /// Both parts are known, so the table can be probed.
    pub fn is_complete(&self) -> bool {
        !self.database.is_empty() && !self.table.is_empty()
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

impl Serialize for TableRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TableRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(TableRef::parse(&s, ""))
    }
}

/// Operation kind, action and keyword of one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub operate: OperateType,
    pub action: ActionType,
    pub keyword: KeyWordType,
}

impl Classification {
    pub const UNKNOWN: Classification = Classification {
        operate: OperateType::Unknown,
        action: ActionType::Unknown,
        keyword: KeyWordType::Unknown,
    };

    pub fn new(operate: OperateType, action: ActionType, keyword: KeyWordType) -> Self {
        Self { operate, action, keyword }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
    Key,
    ForeignKey,
    Fulltext,
    Check,
}

/// A table constraint or index, declared in DDL or reported by the probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConstraint {
    #[serde(default)]
    pub name: String,
    pub kind: ConstraintKind,
    #[serde(default)]
    pub columns: Vec<String>,
}

/// WHERE-clause columns keyed by `db.table`. Columns that could not be
/// tied to one table are keyed by the empty string.
pub type WhereColumns = BTreeMap<String, Vec<String>>;

/// Splits a submission into statements.
pub trait SqlSplitter: Send + Sync {
    /// Statement texts in submission order, comments removed, empty
    /// statements dropped.
    fn split(&self, text: &str) -> Vec<String>;
}

/// Extracts what the engine needs from one statement.
pub trait SqlExtractor: Send + Sync {
    fn classify(&self, sql: &str) -> Result<Classification, SqlError>;

    /// Tables the statement writes to or defines.
    fn touched_tables(&self, sql: &str, default_db: &str) -> Result<Vec<TableRef>, SqlError>;

    /// Touched tables plus every table it reads from.
    fn related_tables(&self, sql: &str, default_db: &str) -> Result<Vec<TableRef>, SqlError>;

    fn where_columns(&self, sql: &str, default_db: &str) -> Result<WhereColumns, SqlError>;

    /// Constraints declared by a `CREATE TABLE`.
    fn table_constraints(&self, sql: &str) -> Result<Vec<TableConstraint>, SqlError>;

    /// Literal- and whitespace-insensitive signature.
    fn fingerprint(&self, sql: &str) -> String;

    /// Number of value tuples an INSERT/REPLACE supplies.
    fn insert_row_count(&self, sql: &str) -> Result<i64, SqlError>;

    /// Equivalent `SELECT` for a DML statement.
    fn to_select(&self, sql: &str) -> Result<String, SqlError>;

    /// `SELECT COUNT(*)` form of a query.
    fn to_count(&self, select: &str) -> Result<String, SqlError>;
}
