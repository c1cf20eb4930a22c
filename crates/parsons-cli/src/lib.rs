//! Operator tooling for Parsons session logs
//!
//! Reads and edits the durable local store a session logger writes to, and
//! replays recorded events through the full logging pipeline.

pub mod config;
pub mod inspect;

pub use inspect::{StoreSummary, clear, parse_events, recovery_lines, replay, summarize};
