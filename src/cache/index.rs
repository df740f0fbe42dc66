//! Secondary Index Module
//!
//! Tag and path lookups over cache keys. Both indexes are auxiliary: the
//! store keeps them in step with the primary map and purges anything
//! dangling it discovers on lookup.

use std::collections::{BTreeSet, HashMap};

// == Tag Index ==
/// Maps a tag to every key carrying it.
#[derive(Debug, Default)]
pub struct TagIndex {
    by_tag: HashMap<String, BTreeSet<String>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `key` under each tag.
    pub fn insert(&mut self, key: &str, tags: &[String]) {
        for tag in tags {
            self.by_tag
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }
    }

    /// Unregisters `key` from each tag, dropping tags left empty.
    pub fn remove(&mut self, key: &str, tags: &[String]) {
        for tag in tags {
            self.forget(tag, key);
        }
    }

    /// Drops a single tag -> key reference.
    pub fn forget(&mut self, tag: &str, key: &str) {
        if let Some(keys) = self.by_tag.get_mut(tag) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_tag.remove(tag);
            }
        }
    }

    pub fn lookup(&self, tag: &str) -> Vec<String> {
        self.by_tag
            .get(tag)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn tag_count(&self) -> usize {
        self.by_tag.len()
    }

    pub fn clear(&mut self) {
        self.by_tag.clear();
    }
}

// == Path Index ==
/// Maps a normalized originating path to keys, with the inverse mapping so a
/// deleted key can be scrubbed without scanning every path.
#[derive(Debug, Default)]
pub struct PathIndex {
    by_path: HashMap<String, BTreeSet<String>>,
    by_key: HashMap<String, BTreeSet<String>>,
}

impl PathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn associate(&mut self, key: &str, path: &str) {
        self.by_path
            .entry(path.to_string())
            .or_default()
            .insert(key.to_string());
        self.by_key
            .entry(key.to_string())
            .or_default()
            .insert(path.to_string());
    }

    pub fn keys_for(&self, path: &str) -> Vec<String> {
        self.by_path
            .get(path)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn paths_for(&self, key: &str) -> Vec<String> {
        self.by_key
            .get(key)
            .map(|paths| paths.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Removes every path association of `key`.
    pub fn remove_key(&mut self, key: &str) {
        if let Some(paths) = self.by_key.remove(key) {
            for path in paths {
                if let Some(keys) = self.by_path.get_mut(&path) {
                    keys.remove(key);
                    if keys.is_empty() {
                        self.by_path.remove(&path);
                    }
                }
            }
        }
    }

    /// Drops a single path -> key reference (and its inverse).
    pub fn forget(&mut self, path: &str, key: &str) {
        if let Some(keys) = self.by_path.get_mut(path) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_path.remove(path);
            }
        }
        if let Some(paths) = self.by_key.get_mut(key) {
            paths.remove(path);
            if paths.is_empty() {
                self.by_key.remove(key);
            }
        }
    }

    pub fn path_count(&self) -> usize {
        self.by_path.len()
    }

    pub fn clear(&mut self) {
        self.by_path.clear();
        self.by_key.clear();
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_tag_insert_and_lookup() {
        let mut index = TagIndex::new();
        index.insert("k1", &tags(&["a", "b"]));
        index.insert("k2", &tags(&["b"]));

        assert_eq!(index.lookup("a"), vec!["k1"]);
        assert_eq!(index.lookup("b"), vec!["k1", "k2"]);
        assert!(index.lookup("c").is_empty());
    }

    #[test]
    fn test_tag_remove_drops_empty_tags() {
        let mut index = TagIndex::new();
        index.insert("k1", &tags(&["a", "b"]));
        index.remove("k1", &tags(&["a", "b"]));

        assert_eq!(index.tag_count(), 0);
        assert!(index.lookup("a").is_empty());
    }

    #[test]
    fn test_path_associate_and_remove_key() {
        let mut index = PathIndex::new();
        index.associate("k1", "/users");
        index.associate("k1", "/users/1");
        index.associate("k2", "/users");

        assert_eq!(index.keys_for("/users"), vec!["k1", "k2"]);
        assert_eq!(index.paths_for("k1"), vec!["/users", "/users/1"]);

        index.remove_key("k1");
        assert_eq!(index.keys_for("/users"), vec!["k2"]);
        assert!(index.keys_for("/users/1").is_empty());
        assert!(index.paths_for("k1").is_empty());
        assert_eq!(index.path_count(), 1);
    }

    #[test]
    fn test_path_forget_single_reference() {
        let mut index = PathIndex::new();
        index.associate("k1", "/a");
        index.forget("/a", "k1");

        assert!(index.keys_for("/a").is_empty());
        assert!(index.paths_for("k1").is_empty());
    }
}
