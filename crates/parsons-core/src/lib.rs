//! # Parsons Core
//!
//! Core records, traits, and errors for the Parsons problem event logger.
//!
//! This crate provides the vocabulary shared by the storage layer and the
//! session logger, so that the same logging pipeline can run against an
//! in-memory document store (tests, demos) or a real remote one.
//!
//! ## Key Types
//!
//! - [`EventRecord`]: One logged interaction or lifecycle event
//! - [`EventKind`]: Open set of record type tags (`init`, `text`, `paste`, ...)
//! - [`SessionIdentity`]: User/problem hashes identifying one attempt
//! - [`DocumentPatch`]: Field-level update sent to the remote store
//!
//! ## Key Traits
//!
//! - [`RemoteStore`]: The document-store client the logger commits through
//! - [`Clock`]: Time abstraction for testability
//! - [`Notifier`]: User-visible notification sink

pub mod error;
pub mod identity;
pub mod mock_remote;
pub mod record;
pub mod remote;
pub mod traits;

// Re-export main types
pub use error::*;
pub use identity::*;
pub use mock_remote::*;
pub use record::*;
pub use remote::*;
pub use traits::*;
