//! Recovery buffer
//!
//! When a page is torn down (or a commit fails) with records that never
//! reached the remote store, the log is serialized as a JSON array under the
//! recovery key. The next compatible session loads it back as the prefix of
//! its log and deletes it.

use parsons_core::EventRecord;
use tracing::{debug, warn};

use crate::LocalStore;
use crate::error::StorageError;

/// View of the recovery entry in a [`LocalStore`]
pub struct RecoveryBuffer<'a> {
    store: &'a dyn LocalStore,
    key: &'a str,
}

impl<'a> RecoveryBuffer<'a> {
    pub fn new(store: &'a dyn LocalStore, key: &'a str) -> Self {
        Self { store, key }
    }

    /// Serialize `records` into the buffer, replacing what was there
    pub fn write(&self, records: &[EventRecord]) -> Result<(), StorageError> {
        let json = serde_json::to_string(records)
            .map_err(|e| StorageError::serialization(e.to_string()))?;
        self.store.set(self.key, &json)?;
        debug!(records = records.len(), "Wrote recovery buffer");
        Ok(())
    }

    /// Whether a buffer is present
    pub fn exists(&self) -> Result<bool, StorageError> {
        Ok(self.store.get(self.key)?.is_some())
    }

    /// Read the buffer without consuming it
    ///
    /// A buffer that cannot be parsed reads as `None`.
    pub fn peek(&self) -> Result<Option<Vec<EventRecord>>, StorageError> {
        let Some(raw) = self.store.get(self.key)? else {
            return Ok(None);
        };

        match serde_json::from_str::<Vec<EventRecord>>(&raw) {
            Ok(records) => Ok(Some(records)),
            Err(e) => {
                warn!(error = %e, len = raw.len(), "Discarding corrupt recovery buffer");
                Ok(None)
            }
        }
    }

    /// Read and delete the buffer
    ///
    /// A corrupt buffer is deleted too; it could never be loaded.
    pub fn take(&self) -> Result<Option<Vec<EventRecord>>, StorageError> {
        let records = self.peek()?;
        self.store.remove(self.key)?;
        if let Some(records) = &records {
            debug!(records = records.len(), "Consumed recovery buffer");
        }
        Ok(records)
    }

    /// Delete the buffer
    pub fn discard(&self) -> Result<(), StorageError> {
        self.store.remove(self.key)
    }
}
