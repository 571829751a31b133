//! A fixed-shard-count concurrent map. Each shard is an independent
//! read-write-locked `HashMap`, so unrelated keys rarely contend.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::RwLock; // nonstandard mutex to avoid poisoning API

/// FNV-32a, the default shard-routing hash when the caller doesn't supply
/// their own.
fn fnv32a(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c9dc5;
    const PRIME: u32 = 0x0100_0193;
    bytes.iter().fold(OFFSET_BASIS, |hash, &b| {
        (hash ^ b as u32).wrapping_mul(PRIME)
    })
}

/// A function from key to shard-routing hash.
pub type HashFn<K> = Box<dyn Fn(&K) -> u32 + Send + Sync>;

/// A concurrent map split across a fixed number of independently locked
/// shards.
pub struct ShardedMap<K, V> {
    shards: Vec<RwLock<HashMap<K, V>>>,
    hash_fn: HashFn<K>,
}

impl<K, V> ShardedMap<K, V>
where
    K: Eq + Hash + AsRef<[u8]>,
{
    /// Creates a map with `shard_count` shards, routing keys with FNV-32a.
    pub fn new(shard_count: usize) -> Self {
        Self::with_hasher(shard_count, Box::new(|k: &K| fnv32a(k.as_ref())))
    }
}

impl<K, V> ShardedMap<K, V>
where
    K: Eq + Hash,
{
    /// Creates a map with `shard_count` shards, routing keys with a
    /// caller-supplied hash function.
    pub fn with_hasher(shard_count: usize, hash_fn: HashFn<K>) -> Self {
        let shard_count = shard_count.max(1);
        let mut shards = Vec::with_capacity(shard_count);
        shards.resize_with(shard_count, || RwLock::new(HashMap::new()));
        Self { shards, hash_fn }
    }

    fn shard_index(&self, key: &K) -> usize {
        (self.hash_fn)(key) as usize % self.shards.len()
    }

    /// Inserts `value` under `key`, returning any previous value.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        let idx = self.shard_index(&key);
        self.shards[idx].write().insert(key, value)
    }

    /// Removes and returns the value for `key`, if present.
    pub fn remove(&self, key: &K) -> Option<V> {
        let idx = self.shard_index(key);
        self.shards[idx].write().remove(key)
    }

    /// Returns a clone of the value for `key`, if present.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let idx = self.shard_index(key);
        self.shards[idx].read().get(key).cloned()
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        let idx = self.shard_index(key);
        self.shards[idx].read().contains_key(key)
    }

    /// Total entries across all shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    /// Whether every shard is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visits every entry, shard by shard, holding one shard's read lock at a
    /// time. Stops early — without visiting remaining shards — the first
    /// time `f` returns `false`.
    ///
    /// `f` must not call back into this map's mutating API: each shard is
    /// held under its own read lock for the duration of that shard's
    /// callbacks, and re-entrant writes would deadlock.
    pub fn for_each(&self, mut f: impl FnMut(&K, &V) -> bool) {
        for shard in &self.shards {
            let guard = shard.read();
            for (k, v) in guard.iter() {
                if !f(k, v) {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove_roundtrip() {
        let m: ShardedMap<String, i32> = ShardedMap::new(4);
        m.insert("a".to_string(), 1);
        m.insert("b".to_string(), 2);
        assert_eq!(m.get(&"a".to_string()), Some(1));
        assert_eq!(m.len(), 2);
        assert_eq!(m.remove(&"a".to_string()), Some(1));
        assert_eq!(m.get(&"a".to_string()), None);
    }

    #[test]
    fn for_each_can_abort_early() {
        let m: ShardedMap<String, i32> = ShardedMap::new(2);
        for i in 0..10 {
            m.insert(format!("k{i}"), i);
        }
        let mut seen = 0;
        m.for_each(|_, _| {
            seen += 1;
            seen < 3
        });
        assert_eq!(seen, 3);
    }

    #[test]
    fn custom_hash_fn_routes_deterministically() {
        let m: ShardedMap<u32, &'static str> =
            ShardedMap::with_hasher(4, Box::new(|k: &u32| *k));
        m.insert(5, "five");
        assert_eq!(m.get(&5), Some("five"));
    }
}
