use std::num::NonZeroUsize;

use lru::LruCache;
use sqlrisk_rules::schema::Dimension;
use sqlrisk_rules::EnvValue;

use crate::error::FactError;
use crate::sql::TableRef;

/// A collector outcome. Failures are cached like values.
pub type CachedFact = Result<EnvValue, FactError>;

/// Cache key: sorted tables, the dimension, and any extra keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FactKey {
    tables: Vec<TableRef>,
    dimension: Dimension,
    extra: Vec<String>,
}

impl FactKey {
    pub fn new(tables: &[TableRef], dimension: Dimension, extra: &[&str]) -> Self {
        let mut tables = tables.to_vec();
        tables.sort();
        tables.dedup();
        Self {
            tables,
            dimension,
            extra: extra.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }
}

/// LRU cache of collected facts, scoped to one work order.
pub struct FactCache {
    cache: LruCache<FactKey, CachedFact>,
    hits: u64,
    misses: u64,
}

impl FactCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
            hits: 0,
            misses: 0,
        }
    }

    /// Look up a collected fact.
    pub fn get(&mut self, key: &FactKey) -> Option<CachedFact> {
        if let Some(fact) = self.cache.get(key) {
            self.hits += 1;
            Some(fact.clone())
        } else {
            self.misses += 1;
            None
        }
    }

    pub fn put(&mut self, key: FactKey, fact: CachedFact) {
        self.cache.put(key, fact);
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
