//! Name → dependent-keys index used for invalidation.

use std::collections::{BTreeSet, HashMap};

use parking_lot::RwLock;

/// Maps a table or tag name to the cache keys that depend on it.
///
/// Process-local and advisory: losing an entry only leaves a stale value
/// until its TTL runs out.
#[derive(Debug, Default)]
pub struct KeyIndex {
    entries: RwLock<HashMap<String, BTreeSet<String>>>,
}

impl KeyIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `key` depends on `name`.
    pub fn insert(&self, name: &str, key: &str) {
        self.entries
            .write()
            .entry(name.to_lowercase())
            .or_default()
            .insert(key.to_string());
    }

    /// Remove and return every key recorded for `name`.
    pub fn take(&self, name: &str) -> Vec<String> {
        self.entries
            .write()
            .remove(&name.to_lowercase())
            .map(|keys| keys.into_iter().collect())
            .unwrap_or_default()
    }

    /// Keys recorded for `name`, without removing them.
    pub fn keys_for(&self, name: &str) -> Vec<String> {
        self.entries
            .read()
            .get(&name.to_lowercase())
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Forget `key` under every name.
    pub fn forget_key(&self, key: &str) {
        let mut entries = self.entries.write();
        entries.retain(|_, keys| {
            keys.remove(key);
            !keys.is_empty()
        });
    }

    /// Number of indexed names.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_clears_entry() {
        let index = KeyIndex::new();
        index.insert("Users", "k1");
        index.insert("users", "k2");
        index.insert("orders", "k1");

        assert_eq!(index.keys_for("USERS"), vec!["k1", "k2"]);
        assert_eq!(index.take("users"), vec!["k1", "k2"]);
        assert!(index.take("users").is_empty());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_forget_key() {
        let index = KeyIndex::new();
        index.insert("a", "k");
        index.insert("b", "k");
        index.insert("b", "other");
        index.forget_key("k");
        assert!(index.keys_for("a").is_empty());
        assert_eq!(index.keys_for("b"), vec!["other"]);
    }
}
