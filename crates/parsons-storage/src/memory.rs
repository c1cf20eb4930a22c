//! In-memory storage implementations
//!
//! This module provides an in-memory implementation of [`LocalStore`],
//! suitable for testing and simulation environments. Sharing one instance
//! between two loggers simulates a page reload in the same browser.

use dashmap::DashMap;
use tracing::trace;

use crate::LocalStore;
use crate::error::StorageError;

/// In-memory implementation of LocalStore
///
/// Uses `DashMap` for concurrent access.
#[derive(Debug, Default)]
pub struct InMemoryLocalStore {
    entries: DashMap<String, String>,
}

impl InMemoryLocalStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every key
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl LocalStore for InMemoryLocalStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        trace!(key, len = value.len(), "Setting local value");
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        trace!(key, "Removing local value");
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_len_and_clear() {
        let store = InMemoryLocalStore::new();
        assert!(store.is_empty());

        store.set("a", "1").unwrap();
        store.set("a", "2").unwrap();
        store.set("b", "3").unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("a").unwrap().as_deref(), Some("2"));

        store.clear();
        assert!(store.is_empty());
    }
}
