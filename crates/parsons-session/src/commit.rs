//! Commit payloads
//!
//! A commit either creates the session's remote document (first commit) or
//! appends to it (every later one). The payload is built under the logger
//! lock, passed through the pre-commit mapper, and then turned into the
//! remote call.

use parsons_core::{DocId, DocumentPatch, EventRecord};
use serde_json::{Map, Value};

/// Field of the remote document holding the log
pub const LOG_FIELD: &str = "log";

/// What a commit will send
#[derive(Debug, Clone, PartialEq)]
pub struct CommitPayload {
    target: Option<DocId>,
    log: Vec<Value>,
    fields: Map<String, Value>,
}

impl CommitPayload {
    /// First commit of a session: `metadata` becomes the document's fields
    pub fn create(log: Vec<Value>, metadata: Map<String, Value>) -> Self {
        Self {
            target: None,
            log,
            fields: metadata,
        }
    }

    /// Later commit: the log is union-appended to `doc_id`
    pub fn append(doc_id: DocId, log: Vec<Value>) -> Self {
        Self {
            target: Some(doc_id),
            log,
            fields: Map::new(),
        }
    }

    pub fn from_records(records: &[EventRecord]) -> Vec<Value> {
        records.iter().map(EventRecord::to_value).collect()
    }

    /// Document being appended to; `None` for a create
    pub fn target(&self) -> Option<&DocId> {
        self.target.as_ref()
    }

    pub fn is_create(&self) -> bool {
        self.target.is_none()
    }

    /// Log entries carried by this commit
    pub fn log(&self) -> &[Value] {
        &self.log
    }

    /// Set a top-level document field (`solutionCode`, ...)
    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Document body for a create
    pub fn into_document(self) -> Map<String, Value> {
        let mut document = self.fields;
        document.insert(LOG_FIELD.to_string(), Value::Array(self.log));
        document
    }

    /// Field updates for an append
    pub fn into_patch(self) -> DocumentPatch {
        self.fields
            .into_iter()
            .filter(|(key, _)| key != LOG_FIELD)
            .fold(
                DocumentPatch::new().array_union(LOG_FIELD, self.log),
                |patch, (key, value)| patch.set(key, value),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parsons_core::FieldUpdate;
    use serde_json::json;

    #[test]
    fn test_create_document_layout() {
        let mut metadata = Map::new();
        metadata.insert("docTitle".into(), json!("Q1"));
        let mut payload = CommitPayload::create(vec![json!({"type": "init"})], metadata);
        payload.set_field("solutionCode", "a;b");
        assert!(payload.is_create());

        let document = payload.into_document();
        assert_eq!(document["docTitle"], "Q1");
        assert_eq!(document["solutionCode"], "a;b");
        assert_eq!(document["log"], json!([{"type": "init"}]));
    }

    #[test]
    fn test_append_patch_unions_log() {
        let mut payload = CommitPayload::append(DocId::new("doc-9"), vec![json!({"type": "submit"})]);
        payload.set_field("solutionCode", "x");
        assert_eq!(payload.target().map(DocId::as_str), Some("doc-9"));

        let patch = payload.into_patch();
        assert_eq!(
            patch.get("log"),
            Some(&FieldUpdate::ArrayUnion(vec![json!({"type": "submit"})]))
        );
        assert_eq!(patch.get("solutionCode"), Some(&FieldUpdate::Set(json!("x"))));
    }

    #[test]
    fn test_mapper_cannot_overwrite_log_on_append() {
        let mut payload = CommitPayload::append(DocId::new("d"), vec![json!(1)]);
        payload.set_field("log", json!([]));
        let patch = payload.into_patch();
        assert_eq!(patch.get("log"), Some(&FieldUpdate::ArrayUnion(vec![json!(1)])));
    }
}
