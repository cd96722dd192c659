//! SQL risk gating.
//!
//! A work order (a batch of SQL statements against one database) is split
//! into statements, each statement is classified and measured through a
//! [`DatabaseProbe`](facts::DatabaseProbe), and the resulting facts are run
//! through the policy matcher of `sqlrisk-rules`. The most severe statement
//! verdict becomes the work-order verdict.

pub mod engine;
pub mod error;
pub mod facts;
pub mod sql;
pub mod statement;
pub mod work_order;

pub use engine::RiskEngine;
pub use error::{FactError, Result, RiskError, SqlError};
pub use facts::{CollectorRegistry, DatabaseProbe, FactCache, StaticFacts, StaticProbe};
pub use sql::{Classification, LexicalSql, SqlExtractor, SqlSplitter, TableRef};
pub use statement::{FactErrorRecord, FactRecord, LevelBuckets, PreResult, StatementRisk};
pub use work_order::{ErrorKind, ErrorRecord, Summary, WorkOrderRisk};
