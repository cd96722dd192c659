//! Declarative SQL risk policies.
//!
//! This crate provides:
//! - The rule catalog, policy model and persisted record format
//! - Validation with fuzzy "did you mean" suggestions
//! - Compilation of policies into boolean expressions
//! - Two-phase matching (basic, then aggregate) and conflict resolution
//! - YAML and SQLite policy stores, a live registry, and hot-reload

pub mod compiler;
pub mod defaults;
pub mod error;
pub mod expr;
pub mod matcher;
pub mod registry;
pub mod schema;
pub mod set;
pub mod store;
pub mod validation;

pub use error::PolicyError;
pub use expr::{EnvValue, Environment, EvalError, EvalexprEvaluator, ExprEvaluator};
pub use matcher::{ConflictOrder, MatchError, MatchOutcome, Matcher};
pub use registry::{PolicyRegistry, PolicyWatcher};
pub use set::PolicySet;
pub use store::{open_store, FileStore, PolicyStore, SqliteStore, StoreError};
