//! Identity-keyed weak map
//!
//! Keys are compared by `Arc` pointer identity and held through `Weak`, so
//! an entry never keeps its key alive. A `Weak` pins the allocation (not the
//! value), which means a live entry's address cannot be reused by another
//! object while the entry exists.

use std::fmt;
use std::sync::{Arc, Weak};

use rustc_hash::FxHashMap;

/// Map from object identity to `V`, with weak retention of keys
pub struct IdentityWeakMap<K, V> {
    entries: FxHashMap<usize, (Weak<K>, V)>,
}

fn identity<K>(key: &Arc<K>) -> usize {
    Arc::as_ptr(key) as *const () as usize
}

impl<K, V> IdentityWeakMap<K, V> {
    /// Create an empty map
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }

    /// Look up the value associated with `key`
    pub fn get(&self, key: &Arc<K>) -> Option<&V> {
        self.entries
            .get(&identity(key))
            .filter(|(weak, _)| weak.strong_count() > 0)
            .map(|(_, value)| value)
    }

    /// Check whether `key` has a live entry
    pub fn contains_key(&self, key: &Arc<K>) -> bool {
        self.get(key).is_some()
    }

    /// Associate `value` with `key`, returning the previous value.
    ///
    /// Entries whose keys have been dropped are pruned first.
    pub fn insert(&mut self, key: &Arc<K>, value: V) -> Option<V> {
        self.prune();
        self.entries
            .insert(identity(key), (Arc::downgrade(key), value))
            .map(|(_, previous)| previous)
    }

    /// Remove the entry for `key`
    pub fn remove(&mut self, key: &Arc<K>) -> Option<V> {
        self.entries
            .remove(&identity(key))
            .map(|(_, value)| value)
    }

    /// Drop entries whose keys are gone
    pub fn prune(&mut self) {
        self.entries.retain(|_, (weak, _)| weak.strong_count() > 0);
    }

    /// Number of entries with live keys
    pub fn len(&self) -> usize {
        self.entries
            .values()
            .filter(|(weak, _)| weak.strong_count() > 0)
            .count()
    }

    /// Check if no live entries remain
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<K, V> Default for IdentityWeakMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for IdentityWeakMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityWeakMap")
            .field("live_entries", &self.len())
            .finish()
    }
}
