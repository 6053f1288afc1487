//! Short-lived caches for platform lookups, backed by Moka.
//!
//! Telegram answers such as "how many profile photos does this user have"
//! change rarely, and a raid produces the same question many times in a few
//! seconds. Entries expire after a fixed TTL and the cache is bounded.

use std::fmt;
use std::hash::Hash;
use std::time::Duration;

use moka::sync::Cache;

/// Named, bounded, expiring cache. Clones share the same entries.
#[derive(Clone)]
pub struct TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<K, V>,
    name: &'static str,
}

impl<K, V> TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// At most `capacity` entries, each dropped `ttl` after insertion.
    pub fn new(name: &'static str, capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .name(name)
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
            name,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        self.inner.insert(key, value);
    }

    /// The cached value, unless it expired.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key)
    }
}

impl<K, V> fmt::Debug for TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedCache")
            .field("name", &self.name)
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}
