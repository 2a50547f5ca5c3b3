//! String interning pool for trace text
//!
//! Every textual field of a trace (comm, system, event name, timeline, raw
//! field keys and values) repeats millions of times across a capture. The
//! pool stores one copy of each distinct string and hands out a small `Copy`
//! handle ([`StrId`]) that all other structures keep instead of the text.
//!
//! Lookups go by a 32-bit FNV-1a derived hash. Hash values are not
//! guaranteed collision-free, so each hash bucket keeps every distinct string
//! that landed in it and interning compares bytes before reusing an entry.

use crate::keyed_map::KeyedMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hasher;

/// Handle to a string owned by a [`StringPool`]
///
/// Handles are only meaningful for the pool that produced them and stay
/// valid for the whole lifetime of that pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StrId(u32);

impl StrId {
    /// Raw index of the handle inside its pool
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for StrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "str#{}", self.0)
    }
}

/// Compute the 32-bit hash used to key interned strings
///
/// FNV-1a over the raw bytes, folded from 64 to 32 bits.
pub fn hash_str32(bytes: &[u8]) -> u32 {
    let mut hasher = fnv::FnvHasher::default();
    hasher.write(bytes);
    let h = hasher.finish();
    (h ^ (h >> 32)) as u32
}

/// Interning statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Distinct strings stored
    pub strings: usize,
    /// Bytes of text stored
    pub bytes: usize,
    /// Total intern requests
    pub requests: u64,
    /// Requests answered with an existing entry
    pub hits: u64,
    /// Strings stored into a hash bucket that already held another string
    pub collisions: u64,
}

impl PoolStats {
    /// Percentage of intern requests served without storing a new string
    pub fn hit_rate(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        (self.hits as f64 / self.requests as f64) * 100.0
    }
}

/// Owner of all interned trace text
#[derive(Debug, Default)]
pub struct StringPool {
    strings: Vec<Box<str>>,
    by_hash: KeyedMap<u32, Vec<StrId>>,
    bytes: usize,
    requests: u64,
    hits: u64,
    collisions: u64,
}

impl StringPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pool with room for `capacity` distinct strings
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            strings: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Intern `s`, returning the handle of the canonical stored copy
    ///
    /// Byte-identical input always yields the same handle.
    pub fn intern(&mut self, s: &str) -> StrId {
        self.requests += 1;
        let hash = hash_str32(s.as_bytes());

        if let Some(bucket) = self.by_hash.get(&hash) {
            for &id in bucket {
                if *self.strings[id.0 as usize] == *s {
                    self.hits += 1;
                    return id;
                }
            }
        }

        // Handles are u32 indices
        let index = u32::try_from(self.strings.len())
            .unwrap_or_else(|_| panic!("string pool exhausted after {} entries", u32::MAX));
        let id = StrId(index);
        self.strings.push(s.into());
        self.bytes += s.len();

        let bucket = self.by_hash.get_or_insert(hash, Vec::new());
        if !bucket.is_empty() {
            self.collisions += 1;
            tracing::debug!(hash, "string pool hash collision");
        }
        bucket.push(id);
        id
    }

    /// Intern raw bytes
    ///
    /// With `len == None` the input is treated as NUL-terminated: everything
    /// from the first NUL byte on is ignored. With `Some(n)` at most `n`
    /// bytes are used. Invalid UTF-8 is replaced lossily.
    pub fn intern_bytes(&mut self, bytes: &[u8], len: Option<usize>) -> StrId {
        let end = match len {
            Some(n) => n.min(bytes.len()),
            None => bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len()),
        };
        let text = String::from_utf8_lossy(&bytes[..end]);
        self.intern(&text)
    }

    /// Find an interned string by its hash value
    ///
    /// Lookup by hash value is not guaranteed collision-free: when several
    /// distinct strings share `hash` the first one stored is returned.
    pub fn find_by_hash(&self, hash: u32) -> Option<&str> {
        self.by_hash
            .get(&hash)
            .and_then(|bucket| bucket.first())
            .map(|id| &*self.strings[id.0 as usize])
    }

    /// Handle of `s` if it has already been interned (never inserts)
    pub fn lookup(&self, s: &str) -> Option<StrId> {
        let bucket = self.by_hash.get(&hash_str32(s.as_bytes()))?;
        bucket
            .iter()
            .copied()
            .find(|id| *self.strings[id.0 as usize] == *s)
    }

    /// Text behind `id`, or `None` for a handle this pool never issued
    pub fn get(&self, id: StrId) -> Option<&str> {
        self.strings.get(id.0 as usize).map(|s| &**s)
    }

    /// Convenience for optional handles stored on events
    pub fn resolve(&self, id: Option<StrId>) -> Option<&str> {
        id.and_then(|id| self.get(id))
    }

    /// Number of distinct strings stored
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            strings: self.strings.len(),
            bytes: self.bytes,
            requests: self.requests,
            hits: self.hits,
            collisions: self.collisions,
        }
    }
}
