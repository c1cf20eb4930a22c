//! Per-type record mappers
//!
//! A mapper sees every record of one type just before it is appended and may
//! rewrite it or cancel it by returning `None`. Registering a second mapper
//! for the same type composes with the first rather than replacing it, so a
//! widget adapter and a page script can both hook `init`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parsons_core::{EventKind, EventRecord};

use crate::commit::CommitPayload;

/// Rewrites or cancels a record before it is appended
pub type RecordMapper = Arc<dyn Fn(EventRecord) -> Option<EventRecord> + Send + Sync>;

/// Rewrites or cancels a commit before it is sent
pub type CommitMapper = Arc<dyn Fn(CommitPayload) -> Option<CommitPayload> + Send + Sync>;

/// Registry of record and commit mappers
#[derive(Clone, Default)]
pub struct MapperRegistry {
    records: HashMap<EventKind, RecordMapper>,
    commit: Option<CommitMapper>,
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapper for records of `kind`
    ///
    /// An existing mapper for the same kind runs first; the new one sees its
    /// output, and a cancellation by either cancels the record.
    pub fn register<F>(&mut self, kind: impl Into<EventKind>, mapper: F)
    where
        F: Fn(EventRecord) -> Option<EventRecord> + Send + Sync + 'static,
    {
        let kind = kind.into();
        let mapper: RecordMapper = match self.records.remove(&kind) {
            Some(previous) => {
                Arc::new(move |record: EventRecord| previous(record).and_then(&mapper))
            }
            None => Arc::new(mapper),
        };
        self.records.insert(kind, mapper);
    }

    /// Add a pre-commit mapper, composed after any existing one
    pub fn register_commit<F>(&mut self, mapper: F)
    where
        F: Fn(CommitPayload) -> Option<CommitPayload> + Send + Sync + 'static,
    {
        let mapper: CommitMapper = match self.commit.take() {
            Some(previous) => {
                Arc::new(move |payload: CommitPayload| previous(payload).and_then(&mapper))
            }
            None => Arc::new(mapper),
        };
        self.commit = Some(mapper);
    }

    /// Run the mapper registered for the record's type, if any
    pub fn apply(&self, record: EventRecord) -> Option<EventRecord> {
        match self.records.get(&record.kind) {
            Some(mapper) => mapper(record),
            None => Some(record),
        }
    }

    /// Handle to the composed pre-commit mapper, for running it elsewhere
    pub fn commit_mapper(&self) -> Option<CommitMapper> {
        self.commit.clone()
    }

    /// Run the pre-commit mapper, if any
    pub fn apply_commit(&self, payload: CommitPayload) -> Option<CommitPayload> {
        match &self.commit {
            Some(mapper) => mapper(payload),
            None => Some(payload),
        }
    }

    pub fn has_mapper(&self, kind: &EventKind) -> bool {
        self.records.contains_key(kind)
    }

    pub fn has_commit_mapper(&self) -> bool {
        self.commit.is_some()
    }
}

impl fmt::Debug for MapperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.records.keys().map(EventKind::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("MapperRegistry")
            .field("kinds", &kinds)
            .field("commit", &self.commit.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parsons_core::DocId;

    #[test]
    fn test_unmapped_passes_through() {
        let registry = MapperRegistry::new();
        let record = EventRecord::submit().with_time(5);
        assert_eq!(registry.apply(record.clone()), Some(record));
    }

    #[test]
    fn test_mapper_rewrites_only_its_kind() {
        let mut registry = MapperRegistry::new();
        registry.register(EventKind::Init, |record| {
            Some(record.with_field("lines", "[]"))
        });

        let init = registry.apply(EventRecord::new(EventKind::Init)).unwrap();
        assert_eq!(init.field_str("lines"), Some("[]"));

        let submit = registry.apply(EventRecord::submit()).unwrap();
        assert!(submit.field("lines").is_none());
        assert!(registry.has_mapper(&EventKind::Init));
        assert!(!registry.has_mapper(&EventKind::Submit));
    }

    #[test]
    fn test_mappers_compose_in_registration_order() {
        let mut registry = MapperRegistry::new();
        registry.register("hint", |record| Some(record.with_field("step", 1)));
        registry.register("hint", |mut record| {
            let step = record.field("step").and_then(|v| v.as_i64()).unwrap_or(0);
            record.set_field("step", step + 1);
            Some(record)
        });

        let record = registry.apply(EventRecord::new("hint")).unwrap();
        assert_eq!(record.field("step"), Some(&serde_json::json!(2)));
    }

    #[test]
    fn test_cancellation_short_circuits() {
        let mut registry = MapperRegistry::new();
        registry.register(EventKind::Text, |_| None);
        registry.register(EventKind::Text, |_| panic!("must not run after a cancel"));
        assert_eq!(registry.apply(EventRecord::text(0, "x", None)), None);
    }

    #[test]
    fn test_commit_mapper() {
        let mut registry = MapperRegistry::new();
        assert!(!registry.has_commit_mapper());
        registry.register_commit(|mut payload| {
            payload.set_field("solutionCode", "x = 1");
            Some(payload)
        });

        let payload = CommitPayload::append(DocId::new("doc-1"), Vec::new());
        let payload = registry.apply_commit(payload).unwrap();
        assert_eq!(payload.field("solutionCode"), Some(&serde_json::json!("x = 1")));

        registry.register_commit(|_| None);
        let payload = CommitPayload::append(DocId::new("doc-1"), Vec::new());
        assert!(registry.apply_commit(payload).is_none());
    }
}
