//! Local key-value store
//!
//! Concurrent-safe string map, exclusively owned by its participant.
//! Mutation happens only during the participant's own commit step.

use parking_lot::RwLock;
use std::collections::HashMap;

/// One replica's key-value map
pub struct Store {
    map: RwLock<HashMap<String, String>>,
}

impl Store {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
        }
    }

    /// Read the current value for a key
    pub fn get(&self, key: &str) -> Option<String> {
        self.map.read().get(key).cloned()
    }

    /// Upsert a key-value pair, returning the previous value
    pub fn put(&self, key: String, value: String) -> Option<String> {
        self.map.write().insert(key, value)
    }

    /// Remove a key if present, returning the removed value
    pub fn delete(&self, key: &str) -> Option<String> {
        self.map.write().remove(key)
    }

    /// Number of keys currently stored
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// True if no keys are stored
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    /// Copy of the full map, for tests and diagnostics
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.map.read().clone()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_delete() {
        let store = Store::new();
        assert_eq!(store.get("APPLE"), None);

        assert_eq!(store.put("APPLE".into(), "$1".into()), None);
        assert_eq!(store.get("APPLE"), Some("$1".into()));

        // Upsert returns the previous value
        assert_eq!(store.put("APPLE".into(), "$2".into()), Some("$1".into()));
        assert_eq!(store.get("APPLE"), Some("$2".into()));

        assert_eq!(store.delete("APPLE"), Some("$2".into()));
        assert_eq!(store.get("APPLE"), None);

        // Delete of an absent key is a no-op
        assert_eq!(store.delete("APPLE"), None);
    }

    #[test]
    fn test_snapshot() {
        let store = Store::new();
        store.put("a".into(), "1".into());
        store.put("b".into(), "2".into());

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("a"), Some(&"1".to_string()));
    }
}
