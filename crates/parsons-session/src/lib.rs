//! # Parsons Session
//!
//! Event logging for Parsons problem widgets.
//!
//! A [`SessionLogger`] records what a student does while solving one
//! exercise (keystrokes, pastes, line moves, submissions), commits the log
//! to a remote document store, and parks anything it could not commit in a
//! local recovery buffer that the next visit to the same exercise picks up.
//!
//! ## Components
//!
//! - [`SessionLogger`]: The log, its bootstrap, recovery, and commit paths
//! - [`TextEditAggregator`]: Collapses keystroke bursts into `text` records
//! - [`MapperRegistry`]: Per-type hooks that rewrite or cancel records
//! - [`ParsonsLogger`]: Adapter from a Parsons widget to the logger
//!
//! ## Example
//!
//! ```rust,ignore
//! use parsons_session::{SessionContext, SessionLogger};
//!
//! let ctx = SessionContext::builder("alice", "Q1")
//!     .local_store(local)
//!     .remote_store(remote)
//!     .build();
//! let logger = SessionLogger::new(ctx);
//!
//! logger.on_field_input("insertText", Some("L1".into()), "def f(", None);
//! logger.on_submit().await;
//! ```

pub mod aggregator;
pub mod commit;
pub mod config;
pub mod context;
pub mod error;
pub mod logger;
pub mod mapper;
pub mod parsons;

pub use aggregator::{FlushTimer, InputKind, PendingEdit, TextEditAggregator};
pub use commit::{CommitPayload, LOG_FIELD};
pub use config::{DEFAULT_COLLECTION, DEFAULT_FLUSH_TIMEOUT, LoggerConfig};
pub use context::{SessionContext, SessionContextBuilder};
pub use error::LoggerError;
pub use logger::SessionLogger;
pub use mapper::{CommitMapper, MapperRegistry, RecordMapper};
pub use parsons::{INDENT_WIDTH, ParsonsList, ParsonsLogger, ParsonsWidget, SortableUpdate, grab_list};
