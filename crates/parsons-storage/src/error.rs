//! Error types for parsons-storage
//!
//! This module defines the error types used throughout the storage crate.

use thiserror::Error;

/// Errors that can occur in local storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error during storage operations
    #[error("I/O error: {0}")]
    Io(String),

    /// Error during serialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error during deserialization
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl StorageError {
    /// Create a new Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Create a new Deserialization error
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization(message.into())
    }

    /// Create a new Database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }
}

/// Errors raised by misuse of the form-field storage elements
///
/// These are programmer errors and abort the call that caused them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ElementError {
    /// Store id was empty
    #[error("Invalid store id: '{0}'")]
    InvalidStore(String),

    /// A store is already registered for this id
    #[error("A store already exists for id {0}")]
    DuplicateStore(String),

    /// No store is registered for this id
    #[error("No storage element is registered to id: {0}")]
    NotRegistered(String),

    /// Content was neither text nor a DOM node
    #[error("Store contents must be string or Node, got {0}")]
    UnsupportedContent(String),

    /// The backing form field does not exist
    #[error("No element exists for '{0}'")]
    MissingElement(String),

    /// The stored value could not be decoded
    #[error("Failed to decode stored value: {0}")]
    Decode(String),
}
