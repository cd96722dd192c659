//! Shared configuration and error types for the sqlrisk workspace.

pub mod config;
pub mod error;

pub use config::{Config, PolicyStoreConfig, RiskConfig, StoreKind};
pub use error::*;
