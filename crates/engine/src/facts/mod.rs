//! Fact collection: the database probe, the collector registry and the
//! per-work-order fact cache.

pub mod cache;
pub mod collectors;
pub mod probe;

pub use cache::{CachedFact, FactCache, FactKey};
pub use collectors::{CacheScope, CollectContext, CollectFn, Collector, CollectorRegistry};
pub use probe::{DatabaseProbe, IndexInfo, StaticFacts, StaticProbe, TableFacts, Transaction};
