//! In-memory memoization map.
//!
//! Pure memoization: no TTL and no size bound. Entries only leave through
//! [`MemoMap::remove`] and [`MemoMap::purge_where`].

use dashmap::DashMap;
use std::hash::Hash;

#[derive(Debug)]
pub struct MemoMap<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, V>,
}

impl<K, V> MemoMap<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Gets a cached value, if available.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Stores a value. Inserting an existing key overwrites it.
    pub fn insert(&self, key: K, value: V) {
        self.entries.insert(key, value);
    }

    pub fn remove(&self, key: &K) {
        self.entries.remove(key);
    }

    /// Removes every entry whose key matches, returning how many were removed.
    pub fn purge_where(&self, mut matches: impl FnMut(&K) -> bool) -> usize {
        let mut removed = 0;
        self.entries.retain(|key, _| {
            if matches(key) {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    /// Returns the number of cached entries.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_twice_keeps_value() {
        let memo = MemoMap::new();
        memo.insert("a", 5.25);
        memo.insert("a", 5.25);
        assert_eq!(memo.get(&"a"), Some(5.25));
        assert_eq!(memo.len(), 1);
    }

    #[test]
    fn test_zero_is_a_value() {
        let memo = MemoMap::new();
        memo.insert("a", 0.0);
        assert_eq!(memo.get(&"a"), Some(0.0));

        memo.remove(&"a");
        assert_eq!(memo.get(&"a"), None);
    }

    #[test]
    fn test_purge_where() {
        let memo = MemoMap::new();
        memo.insert(("abc", 0), 1.0);
        memo.insert(("abc", 1), 2.0);
        memo.insert(("def", 0), 3.0);

        assert_eq!(memo.purge_where(|(md5, _)| *md5 == "abc"), 2);
        assert_eq!(memo.purge_where(|(md5, _)| *md5 == "abc"), 0);
        assert_eq!(memo.get(&("def", 0)), Some(3.0));
        assert_eq!(memo.len(), 1);
    }
}
