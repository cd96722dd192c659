//! The live policy set and its hot-reload.
//!
//! Callers take an [`Arc<PolicySet>`] snapshot at the start of an
//! evaluation and keep it to the end; a reload swaps in a new set for
//! later snapshots and never touches one already handed out.

mod watcher;

pub use watcher::PolicyWatcher;

use std::sync::{Arc, RwLock};

use tracing::info;

use crate::set::PolicySet;
use crate::store::{PolicyStore, Result};

/// Holder of the currently installed policy set.
pub struct PolicyRegistry {
    current: RwLock<Arc<PolicySet>>,
}

impl PolicyRegistry {
    pub fn new(set: PolicySet) -> Self {
        Self { current: RwLock::new(Arc::new(set)) }
    }

    /// Initialize the store (seeding defaults if empty) and load from it.
    pub fn open(store: &dyn PolicyStore) -> Result<Self> {
        store.init()?;
        let set = PolicySet::from_records(store.read_records()?)?;
        info!(location = %store.location(), count = set.len(), "loaded policy set");
        Ok(Self::new(set))
    }

    /// The set new evaluations should use.
    pub fn snapshot(&self) -> Arc<PolicySet> {
        Arc::clone(&self.current.read().expect("policy set lock poisoned"))
    }

    /// Replace the live set, returning the previous one.
    pub fn install(&self, set: PolicySet) -> Arc<PolicySet> {
        let next = Arc::new(set);
        let mut current = self.current.write().expect("policy set lock poisoned");
        std::mem::replace(&mut *current, next)
    }

    /// Re-read the store and install the result. On any error the
    /// previous set stays live.
    pub fn reload(&self, store: &dyn PolicyStore) -> Result<Arc<PolicySet>> {
        let set = PolicySet::from_records(store.read_records()?)?;
        let count = set.len();
        self.install(set);
        info!(location = %store.location(), count, "reloaded policy set");
        Ok(self.snapshot())
    }
}
