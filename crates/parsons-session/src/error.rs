//! Error types for the session logger

use parsons_core::{RecordError, RemoteError};
use parsons_storage::StorageError;
use thiserror::Error;

/// Errors raised by the session logger
///
/// Only [`LoggerError::InvalidRecord`] and [`LoggerError::Config`] abort a
/// call. Everything that threatens data loss is handled by moving the log
/// into local recovery storage, and surfaces here only as the reason a
/// commit did not reach the remote store.
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] RecordError),

    #[error("Error adding document: {0}")]
    TransportFailure(#[from] RemoteError),

    #[error("Remote store not configured. Commit aborted!")]
    MisconfiguredRemote,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Commit cancelled by a pre-commit mapper")]
    CommitCancelled,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl LoggerError {
    /// Whether the remote store was never reached or refused the write
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            LoggerError::TransportFailure(_) | LoggerError::MisconfiguredRemote
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_record_error() {
        let err: LoggerError = RecordError::Null.into();
        assert!(matches!(err, LoggerError::InvalidRecord(RecordError::Null)));
        assert!(!err.is_transport());
    }

    #[test]
    fn test_transport_messages() {
        let err: LoggerError = RemoteError::unreachable("offline").into();
        assert!(err.is_transport());
        assert!(err.to_string().starts_with("Error adding document"));

        assert!(LoggerError::MisconfiguredRemote.is_transport());
        assert!(
            LoggerError::MisconfiguredRemote
                .to_string()
                .contains("not configured")
        );
    }
}
