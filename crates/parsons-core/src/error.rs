//! Error types shared across the Parsons logging crates

use thiserror::Error;

/// Errors raised when an untyped value cannot become an [`EventRecord`]
///
/// [`EventRecord`]: crate::record::EventRecord
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("events cannot be null")]
    Null,

    #[error("events must have a string type")]
    NonStringType,

    #[error("malformed event: {0}")]
    Malformed(String),
}

/// Errors reported by a remote document store
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Remote store unreachable: {0}")]
    Unreachable(String),

    #[error("Remote store rejected the write: {0}")]
    Rejected(String),

    #[error("Document not found: {0}")]
    NotFound(String),
}

impl RemoteError {
    /// Create a new Unreachable error
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable(message.into())
    }

    /// Create a new Rejected error
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_error_messages() {
        assert_eq!(RecordError::Null.to_string(), "events cannot be null");
        assert_eq!(
            RecordError::NonStringType.to_string(),
            "events must have a string type"
        );
    }

    #[test]
    fn test_remote_error_constructors() {
        let err = RemoteError::unreachable("connection refused");
        assert!(matches!(err, RemoteError::Unreachable(_)));
        assert!(err.to_string().contains("connection refused"));

        let err = RemoteError::rejected("permission denied");
        assert!(matches!(err, RemoteError::Rejected(_)));
    }
}
