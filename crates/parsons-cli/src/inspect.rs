//! Operations behind the `parsons-log` subcommands

use std::fmt;
use std::sync::Arc;

use parsons_core::{EventRecord, InMemoryRemoteStore, RecordError};
use parsons_session::{LoggerConfig, LoggerError, SessionContext, SessionLogger};
use parsons_storage::{LocalStore, RecoveryBuffer, StorageError, StorageKeys};
use serde_json::{Map, Value};
use tracing::{debug, info};

/// Session state found in a local store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSummary {
    pub session_hash: Option<String>,
    pub doc_id: Option<String>,
    /// `None` when there is no buffer or it cannot be parsed
    pub recovery_records: Option<usize>,
    pub keys: Vec<String>,
}

impl fmt::Display for StoreSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let or_none = |v: &Option<String>| v.clone().unwrap_or_else(|| "(none)".to_string());
        writeln!(f, "session hash: {}", or_none(&self.session_hash))?;
        writeln!(f, "document id:  {}", or_none(&self.doc_id))?;
        match self.recovery_records {
            Some(n) => writeln!(f, "recovery:     {} records", n)?,
            None => writeln!(f, "recovery:     (none)")?,
        }
        write!(f, "keys:         {}", self.keys.join(", "))
    }
}

pub fn summarize(store: &dyn LocalStore, keys: &StorageKeys) -> Result<StoreSummary, StorageError> {
    let recovery = RecoveryBuffer::new(store, &keys.recovery).peek()?;
    Ok(StoreSummary {
        session_hash: store.get(&keys.session_hash)?,
        doc_id: store.get(&keys.doc_id)?,
        recovery_records: recovery.map(|records| records.len()),
        keys: store.keys()?,
    })
}

/// The recovery buffer as JSON lines
pub fn recovery_lines(store: &dyn LocalStore, keys: &StorageKeys) -> Result<Vec<String>, StorageError> {
    let records = RecoveryBuffer::new(store, &keys.recovery)
        .peek()?
        .unwrap_or_default();
    Ok(records
        .iter()
        .map(|record| record.to_value().to_string())
        .collect())
}

/// Remove session keys; returns the keys that were present
pub fn clear(
    store: &dyn LocalStore,
    keys: &StorageKeys,
    keep_session: bool,
) -> Result<Vec<String>, StorageError> {
    let mut targets = vec![&keys.recovery, &keys.doc_id];
    if !keep_session {
        targets.push(&keys.session_hash);
    }

    let mut removed = Vec::new();
    for key in targets {
        if store.get(key)?.is_some() {
            store.remove(key)?;
            removed.push(key.clone());
        }
    }
    info!(removed = removed.len(), keep_session, "Cleared local session state");
    Ok(removed)
}

/// Parse JSON lines into records; blank lines are skipped
pub fn parse_events(input: &str) -> Result<Vec<EventRecord>, LoggerError> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| -> Result<EventRecord, LoggerError> {
            let value: Value = serde_json::from_str(line).map_err(|e| {
                LoggerError::InvalidRecord(RecordError::Malformed(format!(
                    "line {}: {}",
                    index + 1,
                    e
                )))
            })?;
            Ok(EventRecord::from_value(value)?)
        })
        .collect()
}

/// Run `records` through a session on `local` and commit to a fresh
/// in-memory remote; returns the committed document
pub async fn replay(
    local: Arc<dyn LocalStore>,
    config: LoggerConfig,
    user: &str,
    problem: &str,
    records: Vec<EventRecord>,
) -> Result<Map<String, Value>, LoggerError> {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let collection = config.collection.clone();
    let logger = SessionLogger::new(
        SessionContext::builder(user, problem)
            .local_store(local)
            .remote_store(remote.clone())
            .config(config)
            .build(),
    );

    let total = records.len();
    let appended = records
        .into_iter()
        .map(|record| logger.log_event(record))
        .filter(|appended| *appended)
        .count();
    debug!(total, appended, "Replayed records");

    let doc_id = logger.commit_detailed(true).await?;
    remote
        .document(&collection, &doc_id)
        .ok_or_else(|| LoggerError::Serialization(format!("document {} vanished", doc_id)))
}
