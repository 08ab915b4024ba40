//! Agent working memory.
//!
//! A capped key/value store with least-recently-used eviction. Reads and
//! writes both promote the touched key to most-recently-used; when the
//! store exceeds its cap, keys fall off the least-recently-used end.

use serde_json::Value;
use std::collections::HashMap;

/// LRU working memory for a single agent.
///
/// Keys are promoted to most-recently-used on both `get` and `set`.
/// A `max_size` of 0 means unbounded.
///
/// Recency order is kept in a separate vector rather than piggybacked on
/// map iteration order; the vector front is the LRU end.
#[derive(Debug, Clone, Default)]
pub struct LruMemory {
    values: HashMap<String, Value>,
    /// Keys in recency order. Front = least recently used.
    order: Vec<String>,
    max_size: usize,
}

impl LruMemory {
    /// Creates a memory capped at `max_size` entries (0 = unbounded).
    pub fn new(max_size: usize) -> Self {
        Self {
            values: HashMap::new(),
            order: Vec::new(),
            max_size,
        }
    }

    /// Returns the value for `key` and promotes it to most-recently-used.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        if !self.values.contains_key(key) {
            return None;
        }
        self.touch(key);
        self.values.get(key).cloned()
    }

    /// Reads `key` without promoting it.
    pub fn peek(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Upserts `key`, promotes it to most-recently-used, and evicts from
    /// the least-recently-used end while the cap is exceeded.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        self.values.insert(key.clone(), value);
        self.touch(&key);

        if self.max_size > 0 {
            while self.values.len() > self.max_size {
                if let Some(evicted) = self.evict_lru() {
                    tracing::trace!(key = %evicted, "memory entry evicted");
                } else {
                    break;
                }
            }
        }
    }

    /// Removes `key`, returning its value if present.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.order.retain(|k| k != key);
        self.values.remove(key)
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.values.clear();
        self.order.clear();
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Configured cap (0 = unbounded).
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Keys in recency order, least-recently-used first.
    pub fn keys_lru_first(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }

    /// Keys in recency order, most-recently-used first.
    pub fn keys_mru_first(&self) -> impl Iterator<Item = &String> {
        self.order.iter().rev()
    }

    /// Snapshot of `(key, value)` pairs, least-recently-used first.
    ///
    /// This is the persisted representation: reloading pairs in this
    /// order through `set` reproduces the recency order exactly.
    pub fn entries_lru_first(&self) -> Vec<(String, Value)> {
        self.order
            .iter()
            .filter_map(|k| self.values.get(k).map(|v| (k.clone(), v.clone())))
            .collect()
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let k = self.order.remove(pos);
            self.order.push(k);
        } else {
            self.order.push(key.to_string());
        }
    }

    fn evict_lru(&mut self) -> Option<String> {
        if self.order.is_empty() {
            return None;
        }
        let key = self.order.remove(0);
        self.values.remove(&key);
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_and_get_round_trip() {
        let mut memory = LruMemory::new(10);
        memory.set("greeting", json!("hello"));

        assert_eq!(memory.get("greeting"), Some(json!("hello")));
        assert_eq!(memory.get("missing"), None);
    }

    #[test]
    fn get_promotes_to_mru() {
        let mut memory = LruMemory::new(3);
        memory.set("a", json!(1));
        memory.set("b", json!(2));
        memory.set("c", json!(3));

        memory.get("a");

        let keys: Vec<&String> = memory.keys_mru_first().collect();
        assert_eq!(keys, vec!["a", "c", "b"]);
    }

    #[test]
    fn eviction_drops_lru_end() {
        let mut memory = LruMemory::new(2);
        memory.set("a", json!(1));
        memory.set("b", json!(2));
        memory.get("a");
        memory.set("c", json!(3));

        // "b" was least recently used
        assert_eq!(memory.get("b"), None);
        let keys: Vec<&String> = memory.keys_mru_first().collect();
        assert_eq!(keys, vec!["c", "a"]);
    }

    #[test]
    fn overflow_keeps_last_max_size_writes() {
        let mut memory = LruMemory::new(3);
        for i in 0..10 {
            memory.set(format!("k{i}"), json!(i));
        }

        assert_eq!(memory.len(), 3);
        let keys: Vec<&String> = memory.keys_mru_first().collect();
        assert_eq!(keys, vec!["k9", "k8", "k7"]);
    }

    #[test]
    fn zero_cap_is_unbounded() {
        let mut memory = LruMemory::new(0);
        for i in 0..500 {
            memory.set(format!("k{i}"), json!(i));
        }
        assert_eq!(memory.len(), 500);
    }

    #[test]
    fn upsert_does_not_grow() {
        let mut memory = LruMemory::new(2);
        memory.set("a", json!(1));
        memory.set("a", json!(2));

        assert_eq!(memory.len(), 1);
        assert_eq!(memory.get("a"), Some(json!(2)));
    }

    #[test]
    fn entries_round_trip_preserves_order() {
        let mut memory = LruMemory::new(4);
        memory.set("a", json!(1));
        memory.set("b", json!(2));
        memory.get("a");
        memory.set("c", json!(3));

        let entries = memory.entries_lru_first();

        let mut rebuilt = LruMemory::new(4);
        for (k, v) in entries {
            rebuilt.set(k, v);
        }

        let original: Vec<&String> = memory.keys_mru_first().collect();
        let restored: Vec<&String> = rebuilt.keys_mru_first().collect();
        assert_eq!(original, restored);
    }

    #[test]
    fn remove_and_clear() {
        let mut memory = LruMemory::new(4);
        memory.set("a", json!(1));
        memory.set("b", json!(2));

        assert_eq!(memory.remove("a"), Some(json!(1)));
        assert_eq!(memory.len(), 1);

        memory.clear();
        assert!(memory.is_empty());
        assert_eq!(memory.keys_lru_first().count(), 0);
    }
}
