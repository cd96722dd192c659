//! Policy persistence.
//!
//! A [`PolicyStore`] keeps the rule catalog and the policy records. Two
//! backends ship: a single YAML document ([`FileStore`]) and an embedded
//! SQLite database ([`SqliteStore`]). Both seed the default catalog on
//! first initialization.

mod file;
mod sqlite;

pub use file::FileStore;
pub use sqlite::SqliteStore;

use sqlrisk_core::{PolicyStoreConfig, StoreKind};

use crate::error::PolicyError;
use crate::schema::{Policy, PolicyRecord};

/// Errors raised by policy stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse/serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// SQLite error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON encoding of catalog columns.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored record could not be turned into a policy.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// Filesystem watcher error.
    #[error("Notify watcher error: {0}")]
    Notify(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistent home of the policy catalog.
pub trait PolicyStore: Send + Sync {
    /// Create storage if missing and seed the default catalog when empty.
    fn init(&self) -> Result<()>;

    /// Every stored record, in catalog order.
    fn read_records(&self) -> Result<Vec<PolicyRecord>>;

    /// Replace the stored records.
    fn write_records(&self, records: &[PolicyRecord]) -> Result<()>;

    /// Human-readable location, for logs.
    fn location(&self) -> String;

    /// Every stored policy, reconstructed from its record.
    fn read(&self) -> Result<Vec<Policy>> {
        let policies = self
            .read_records()?
            .into_iter()
            .map(Policy::try_from)
            .collect::<std::result::Result<Vec<_>, PolicyError>>()?;
        Ok(policies)
    }

    /// Persist typed policies through their record form.
    fn write(&self, policies: &[Policy]) -> Result<()> {
        let records: Vec<PolicyRecord> = policies.iter().map(PolicyRecord::from).collect();
        self.write_records(&records)
    }
}

/// Open the configured backend. Does not initialize it.
pub fn open_store(config: &PolicyStoreConfig) -> Result<Box<dyn PolicyStore>> {
    Ok(match config.kind {
        StoreKind::File => Box::new(FileStore::new(config.path.clone())),
        StoreKind::Sqlite => Box::new(SqliteStore::open(&config.path)?),
    })
}

/// Default catalog as records, in the order the stores seed them.
fn default_records() -> Vec<PolicyRecord> {
    crate::defaults::default_policies()
        .iter()
        .map(PolicyRecord::from)
        .collect()
}
