//! Keyed map used for the auxiliary pid/tgid/comm indexes
//!
//! A thin wrapper over `HashMap` with an explicit contract:
//! - `get_or_insert` keeps the *first* default ever inserted for a key
//! - `get` never panics on a missing key
//! - `set` is an upsert (last write wins)
//!
//! Iteration order is unspecified.

use std::collections::hash_map::{self, HashMap};
use std::hash::Hash;

/// Associative container with get-or-default and upsert semantics
#[derive(Debug, Clone)]
pub struct KeyedMap<K, V> {
    map: HashMap<K, V>,
}

impl<K, V> Default for KeyedMap<K, V> {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, V> KeyedMap<K, V> {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the existing value for `key`, inserting `default` first if absent
    ///
    /// Calling this twice with the same key leaves the value from the first call.
    pub fn get_or_insert(&mut self, key: K, default: V) -> &mut V {
        self.map.entry(key).or_insert(default)
    }

    /// Look up the value for `key`
    pub fn get(&self, key: &K) -> Option<&V> {
        self.map.get(key)
    }

    /// Mutable lookup for `key`
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.map.get_mut(key)
    }

    /// Insert or overwrite the value for `key`
    pub fn set(&mut self, key: K, value: V) {
        self.map.insert(key, value);
    }

    /// Remove `key`, returning its value if present
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.map.remove(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate entries in unspecified order
    pub fn iter(&self) -> hash_map::Iter<'_, K, V> {
        self.map.iter()
    }
}
