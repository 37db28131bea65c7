//! Key/value memoization shared by every engine component.
//!
//! Keys are process-global strings; callers namespace them by operation
//! kind and source path (see [`crate::keys`]). `add` unconditionally
//! overwrites, and every write replaces a freshly computed full value, so
//! concurrent readers can never observe a partial update.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use cre_model::{HierarchyLevel, MedDraDictionary, WhoDrugDictionary};

/// A cached derived structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValue {
    /// Study-wide value frequencies.
    Counts(BTreeMap<String, u64>),
    /// A set of variable or value names.
    Names(BTreeSet<String>),
    /// "/"-joined hierarchy paths.
    Paths(HashSet<String>),
    /// Valid (code, term) pairs partitioned by hierarchy level.
    LevelPairs(BTreeMap<HierarchyLevel, HashSet<(String, String)>>),
    /// A parsed MedDRA term tree, keyed by its dictionary path.
    Meddra(MedDraDictionary),
    /// A parsed WhoDrug term tree, keyed by its dictionary path.
    Whodrug(WhoDrugDictionary),
}

impl CacheValue {
    pub fn as_counts(&self) -> Option<&BTreeMap<String, u64>> {
        match self {
            CacheValue::Counts(counts) => Some(counts),
            _ => None,
        }
    }

    pub fn as_names(&self) -> Option<&BTreeSet<String>> {
        match self {
            CacheValue::Names(names) => Some(names),
            _ => None,
        }
    }

    pub fn as_paths(&self) -> Option<&HashSet<String>> {
        match self {
            CacheValue::Paths(paths) => Some(paths),
            _ => None,
        }
    }

    pub fn as_level_pairs(&self) -> Option<&BTreeMap<HierarchyLevel, HashSet<(String, String)>>> {
        match self {
            CacheValue::LevelPairs(pairs) => Some(pairs),
            _ => None,
        }
    }

    pub fn as_meddra(&self) -> Option<&MedDraDictionary> {
        match self {
            CacheValue::Meddra(dictionary) => Some(dictionary),
            _ => None,
        }
    }

    pub fn as_whodrug(&self) -> Option<&WhoDrugDictionary> {
        match self {
            CacheValue::Whodrug(dictionary) => Some(dictionary),
            _ => None,
        }
    }
}

/// The cache facade. Implementations must be safe under concurrent
/// `get`/`add` from scan tasks.
pub trait CacheService: Send + Sync {
    fn get(&self, key: &str) -> Option<Arc<CacheValue>>;
    fn add(&self, key: &str, value: CacheValue);
}

/// Process-lifetime in-memory cache. Values are shared behind `Arc` so
/// readers of a large index never copy it.
#[derive(Debug, Default)]
pub struct InMemoryCacheService {
    entries: RwLock<HashMap<String, Arc<CacheValue>>>,
}

impl InMemoryCacheService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheService for InMemoryCacheService {
    fn get(&self, key: &str) -> Option<Arc<CacheValue>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn add(&self, key: &str, value: CacheValue) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), Arc::new(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_overwrites_unconditionally() {
        let cache = InMemoryCacheService::new();
        cache.add("k", CacheValue::Names(BTreeSet::from(["A".to_string()])));
        cache.add("k", CacheValue::Names(BTreeSet::from(["B".to_string()])));

        let value = cache.get("k").expect("cached value");
        assert_eq!(
            value.as_names().expect("names"),
            &BTreeSet::from(["B".to_string()])
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn missing_key_is_none() {
        let cache = InMemoryCacheService::new();
        assert!(cache.get("absent").is_none());
    }

    #[test]
    fn values_shared_not_copied() {
        let cache = InMemoryCacheService::new();
        cache.add("k", CacheValue::Counts(BTreeMap::from([("X".to_string(), 2)])));
        let a = cache.get("k").expect("value");
        let b = cache.get("k").expect("value");
        assert!(Arc::ptr_eq(&a, &b));
    }
}
