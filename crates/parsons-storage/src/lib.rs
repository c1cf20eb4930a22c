//! # Parsons Storage
//!
//! Storage abstractions for the Parsons problem event logger.
//!
//! This crate provides the durable local key/value store the session logger
//! uses to survive reloads, plus the hidden form-field storage elements
//! widgets use to keep their state across form submission.
//!
//! ## Features
//!
//! - **LocalStore trait**: Synchronous durable key/value store
//! - **InMemoryLocalStore**: In-memory implementation for testing/simulation
//! - **RedbLocalStore**: redb-backed persistent implementation
//! - **RecoveryBuffer**: Serialized copy of an unflushed log
//! - **ElemStorage / LocalStorageElements**: Form-field storage elements
//!
//! ## Example
//!
//! ```rust,ignore
//! use parsons_storage::{InMemoryLocalStore, LocalStore, RecoveryBuffer, StorageKeys};
//!
//! let store = InMemoryLocalStore::new();
//! let keys = StorageKeys::default();
//!
//! store.set(&keys.session_hash, "-1289314")?;
//! RecoveryBuffer::new(&store, &keys.recovery).write(&records)?;
//!
//! // On the next load
//! let restored = RecoveryBuffer::new(&store, &keys.recovery).take()?;
//! ```

pub mod elements;
pub mod error;
pub mod memory;
pub mod recovery;
pub mod redb_store;

// Re-exports
pub use elements::{
    ElemStorage, ElementContent, FormDocument, FormField, InMemoryForm, InMemoryField,
    LocalStorageElements, StoreAccessor, StoreWriter,
};
pub use error::{ElementError, StorageError};
pub use memory::InMemoryLocalStore;
pub use recovery::RecoveryBuffer;
pub use redb_store::{RedbLocalStore, RedbLocalStoreConfig};

use serde::{Deserialize, Serialize};

/// Durable local key/value store (the browser's `localStorage`)
///
/// Reads happen at session bootstrap and writes at session transitions, all
/// from the thread driving the logger, so the trait is synchronous.
pub trait LocalStore: Send + Sync {
    /// Get the value stored under `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// All keys currently stored, sorted
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Names of the keys the session logger persists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageKeys {
    /// Hash of the last session seen by this store
    pub session_hash: String,
    /// Remote document handle of the current session
    pub doc_id: String,
    /// Serialized log awaiting recovery
    pub recovery: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            session_hash: "sessionHash".to_string(),
            doc_id: "docId".to_string(),
            recovery: "recovery".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that the LocalStore trait is object-safe
    fn _assert_object_safe(_: &dyn LocalStore) {}

    #[test]
    fn test_default_keys() {
        let keys = StorageKeys::default();
        assert_eq!(keys.session_hash, "sessionHash");
        assert_eq!(keys.doc_id, "docId");
        assert_eq!(keys.recovery, "recovery");
    }

    #[test]
    fn test_keys_partial_override() {
        let keys: StorageKeys = serde_json::from_str(r#"{ "recovery": "fpp-recovery" }"#).unwrap();
        assert_eq!(keys.recovery, "fpp-recovery");
        assert_eq!(keys.doc_id, "docId");
    }

    #[test]
    fn test_in_memory_local_store() {
        let store = InMemoryLocalStore::new();
        assert_eq!(store.get("docId").unwrap(), None);

        store.set("docId", "doc-1").unwrap();
        store.set("sessionHash", "42").unwrap();
        assert_eq!(store.get("docId").unwrap().as_deref(), Some("doc-1"));
        assert_eq!(store.keys().unwrap(), vec!["docId", "sessionHash"]);

        store.remove("docId").unwrap();
        store.remove("docId").unwrap();
        assert_eq!(store.get("docId").unwrap(), None);
    }
}
