//! Logger configuration

use std::time::Duration;

use parsons_storage::StorageKeys;
use serde::{Deserialize, Serialize};

use crate::error::LoggerError;

/// Debounce window for keystroke bursts
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_millis(1500);

/// Remote collection that receives session logs
pub const DEFAULT_COLLECTION: &str = "logs";

/// Configuration for a [`SessionLogger`](crate::SessionLogger)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Quiet period after which a keystroke burst is logged
    pub flush_timeout_ms: u64,
    /// Remote collection for session documents
    pub collection: String,
    /// Local storage key names
    pub keys: StorageKeys,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            flush_timeout_ms: DEFAULT_FLUSH_TIMEOUT.as_millis() as u64,
            collection: DEFAULT_COLLECTION.to_string(),
            keys: StorageKeys::default(),
        }
    }
}

impl LoggerConfig {
    /// Parse a TOML document; missing fields keep their defaults
    pub fn from_toml_str(s: &str) -> Result<Self, LoggerError> {
        let config: Self = toml::from_str(s).map_err(|e| LoggerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values are usable
    pub fn validate(&self) -> Result<(), LoggerError> {
        if self.collection.trim().is_empty() {
            return Err(LoggerError::Config("collection must not be empty".into()));
        }
        let keys = [&self.keys.session_hash, &self.keys.doc_id, &self.keys.recovery];
        if keys.iter().any(|k| k.is_empty()) {
            return Err(LoggerError::Config("storage keys must not be empty".into()));
        }
        if keys[0] == keys[1] || keys[0] == keys[2] || keys[1] == keys[2] {
            return Err(LoggerError::Config("storage keys must be distinct".into()));
        }
        Ok(())
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    pub fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }
}
