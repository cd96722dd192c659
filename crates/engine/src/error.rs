use sqlrisk_rules::schema::Dimension;
use sqlrisk_rules::MatchError;
use thiserror::Error;

use crate::sql::TableRef;

/// Failures of the lexical SQL collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SqlError {
    #[error("empty statement")]
    Empty,

    #[error("cannot rewrite statement as a query: {0}")]
    NotRewritable(String),

    #[error("malformed statement: {0}")]
    Malformed(String),
}

/// A fact that could not be collected. Cached like a value, so it clones.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FactError {
    #[error("{op} failed for {target}: {message}")]
    Probe {
        op: &'static str,
        target: String,
        message: String,
    },

    #[error("table {0} is unknown to the probe")]
    UnknownTable(TableRef),

    #[error("{dimension} requires {missing}: {message}")]
    Dependency {
        dimension: Dimension,
        missing: Dimension,
        message: String,
    },

    #[error(transparent)]
    Sql(#[from] SqlError),
}

impl FactError {
    pub fn probe(op: &'static str, target: impl ToString, message: impl ToString) -> Self {
        FactError::Probe { op, target: target.to_string(), message: message.to_string() }
    }
}

/// Work-order failures. Each one leaves the work order at `fatal`.
#[derive(Error, Debug)]
pub enum RiskError {
    #[error("no SQL statement found")]
    NoStatements,

    #[error("statement {index}: {source}")]
    Parse {
        index: usize,
        #[source]
        source: SqlError,
    },

    #[error("exceeding permissions: {table} is outside database '{database}'")]
    ExceedingPermissions { database: String, table: TableRef },

    #[error("identify risk for statement {index}: {source}")]
    Identify {
        index: usize,
        #[source]
        source: MatchError,
    },

    #[error("no matched policies found for the work order")]
    EmptyPool,
}

pub type Result<T> = std::result::Result<T, RiskError>;
