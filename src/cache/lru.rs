//! Recency Map Module
//!
//! Keyed storage whose iteration order is access order, used for LRU eviction.

use lru::LruCache;

// == Recency Map ==
/// Primary key-value map ordered by recency.
///
/// Backed by an unbounded `LruCache`; capacity is enforced by the owning
/// store so that eviction can unindex the victim before it disappears.
/// - Oldest = least recently touched, evicted first
/// - Newest = most recently touched
pub struct RecencyMap<V> {
    inner: LruCache<String, V>,
}

impl<V> RecencyMap<V> {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            inner: LruCache::unbounded(),
        }
    }

    // == Insert ==
    /// Inserts or replaces a value and marks the key most recently used.
    pub fn insert(&mut self, key: String, value: V) -> Option<V> {
        self.inner.put(key, value)
    }

    // == Touch ==
    /// Marks a key as recently used. Returns false if absent.
    pub fn touch(&mut self, key: &str) -> bool {
        self.inner.get(key).is_some()
    }

    /// Mutable access that also touches the key.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.inner.get_mut(key)
    }

    /// Read without affecting recency.
    pub fn peek(&self, key: &str) -> Option<&V> {
        self.inner.peek(key)
    }

    /// Mutable access without affecting recency.
    pub fn peek_mut(&mut self, key: &str) -> Option<&mut V> {
        self.inner.peek_mut(key)
    }

    // == Remove ==
    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.inner.pop(key)
    }

    // == Oldest ==
    /// The least recently touched key other than `except`.
    pub fn oldest_except(&self, except: &str) -> Option<String> {
        self.inner
            .iter()
            .rev()
            .map(|(k, _)| k)
            .find(|k| k.as_str() != except)
            .cloned()
    }

    /// Keys from least to most recently touched.
    pub fn keys_oldest_first(&self) -> Vec<String> {
        self.inner.iter().rev().map(|(k, _)| k.clone()).collect()
    }

    /// Entries from least to most recently touched.
    pub fn iter_oldest_first(&self) -> impl Iterator<Item = (&String, &V)> {
        self.inner.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains(key)
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

impl<V> Default for RecencyMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn map_with(keys: &[&str]) -> RecencyMap<u32> {
        let mut map = RecencyMap::new();
        for (i, k) in keys.iter().enumerate() {
            map.insert(k.to_string(), i as u32);
        }
        map
    }

    #[test]
    fn test_new_is_empty() {
        let map: RecencyMap<u32> = RecencyMap::new();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);
        assert_eq!(map.oldest_except(""), None);
    }

    #[test]
    fn test_insertion_order_is_oldest_first() {
        let map = map_with(&["a", "b", "c"]);
        assert_eq!(map.keys_oldest_first(), vec!["a", "b", "c"]);
        assert_eq!(map.oldest_except(""), Some("a".to_string()));
    }

    #[test]
    fn test_touch_moves_to_newest() {
        let mut map = map_with(&["a", "b", "c"]);
        assert!(map.touch("a"));
        assert_eq!(map.keys_oldest_first(), vec!["b", "c", "a"]);
        assert!(!map.touch("missing"));
    }

    #[test]
    fn test_peek_does_not_touch() {
        let map = map_with(&["a", "b"]);
        assert_eq!(map.peek("a"), Some(&0));
        assert_eq!(map.oldest_except(""), Some("a".to_string()));
    }

    #[test]
    fn test_reinsert_moves_to_newest() {
        let mut map = map_with(&["a", "b", "c"]);
        map.insert("b".to_string(), 9);
        assert_eq!(map.keys_oldest_first(), vec!["a", "c", "b"]);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_oldest_except_skips_excluded_key() {
        let map = map_with(&["a", "b"]);
        assert_eq!(map.oldest_except("a"), Some("b".to_string()));
    }

    #[test]
    fn test_remove() {
        let mut map = map_with(&["a", "b", "c"]);
        assert_eq!(map.remove("b"), Some(1));
        assert!(!map.contains("b"));
        assert_eq!(map.remove("b"), None);
        assert_eq!(map.keys_oldest_first(), vec!["a", "c"]);
    }
}
