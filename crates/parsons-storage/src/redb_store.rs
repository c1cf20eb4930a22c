//! redb-backed local store
//!
//! Persists the logger's session keys in a single redb table so they survive
//! process restarts the way browser local storage survives page reloads.

use std::path::PathBuf;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};
use tracing::{debug, info, instrument};

use crate::LocalStore;
use crate::error::StorageError;

// Key: storage key, Value: stored string
const LOCAL_STORAGE: TableDefinition<&str, &str> = TableDefinition::new("local_storage");

/// Configuration for the redb local store
#[derive(Debug, Clone)]
pub struct RedbLocalStoreConfig {
    /// Path to the database file
    pub db_path: PathBuf,
}

impl Default for RedbLocalStoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/parsons-local.redb"),
        }
    }
}

/// Persistent implementation of LocalStore
pub struct RedbLocalStore {
    db: Arc<Database>,
    config: RedbLocalStoreConfig,
}

impl RedbLocalStore {
    /// Open or create the database
    #[instrument(skip(config), fields(path = %config.db_path.display()))]
    pub fn open(config: RedbLocalStoreConfig) -> Result<Self, StorageError> {
        // Ensure parent directory exists
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(&config.db_path)
            .map_err(|e| StorageError::database(e.to_string()))?;

        info!("Opened local store");

        let store = Self {
            db: Arc::new(db),
            config,
        };
        store.init_table()?;
        Ok(store)
    }

    /// Create the table if it does not exist yet
    fn init_table(&self) -> Result<(), StorageError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| StorageError::database(e.to_string()))?;
        write_txn
            .open_table(LOCAL_STORAGE)
            .map_err(|e| StorageError::database(e.to_string()))?;
        write_txn
            .commit()
            .map_err(|e| StorageError::database(e.to_string()))?;

        debug!("Initialized local storage table");
        Ok(())
    }

    /// Get the configuration
    pub fn config(&self) -> &RedbLocalStoreConfig {
        &self.config
    }
}

impl LocalStore for RedbLocalStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| StorageError::database(e.to_string()))?;
        let table = read_txn
            .open_table(LOCAL_STORAGE)
            .map_err(|e| StorageError::database(e.to_string()))?;

        let value = table
            .get(key)
            .map_err(|e| StorageError::database(e.to_string()))?
            .map(|v| v.value().to_string());
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| StorageError::database(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(LOCAL_STORAGE)
                .map_err(|e| StorageError::database(e.to_string()))?;
            table
                .insert(key, value)
                .map_err(|e| StorageError::database(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| StorageError::database(e.to_string()))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| StorageError::database(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(LOCAL_STORAGE)
                .map_err(|e| StorageError::database(e.to_string()))?;
            table
                .remove(key)
                .map_err(|e| StorageError::database(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| StorageError::database(e.to_string()))?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| StorageError::database(e.to_string()))?;
        let table = read_txn
            .open_table(LOCAL_STORAGE)
            .map_err(|e| StorageError::database(e.to_string()))?;

        let mut keys = Vec::new();
        for entry in table
            .iter()
            .map_err(|e| StorageError::database(e.to_string()))?
        {
            let (key, _) = entry.map_err(|e| StorageError::database(e.to_string()))?;
            keys.push(key.value().to_string());
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (RedbLocalStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = RedbLocalStoreConfig {
            db_path: temp_dir.path().join("local.redb"),
        };
        let store = RedbLocalStore::open(config).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_set_get_remove() {
        let (store, _temp) = create_test_store();

        assert_eq!(store.get("docId").unwrap(), None);
        store.set("docId", "doc-000001").unwrap();
        assert_eq!(store.get("docId").unwrap().as_deref(), Some("doc-000001"));

        store.remove("docId").unwrap();
        assert_eq!(store.get("docId").unwrap(), None);
        store.remove("docId").unwrap();
    }

    #[test]
    fn test_keys_sorted() {
        let (store, _temp) = create_test_store();
        store.set("sessionHash", "7").unwrap();
        store.set("docId", "d").unwrap();
        store.set("recovery", "[]").unwrap();
        assert_eq!(store.keys().unwrap(), vec!["docId", "recovery", "sessionHash"]);
    }

    #[test]
    fn test_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let config = RedbLocalStoreConfig {
            db_path: temp_dir.path().join("nested").join("local.redb"),
        };

        {
            let store = RedbLocalStore::open(config.clone()).unwrap();
            store.set("sessionHash", "-42").unwrap();
        }

        let store = RedbLocalStore::open(config).unwrap();
        assert_eq!(store.get("sessionHash").unwrap().as_deref(), Some("-42"));
    }
}
