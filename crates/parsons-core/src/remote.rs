//! Remote document store contract
//!
//! The logger durably records its log in a remote document store. It needs
//! only two operations: create a document in a collection, and update fields
//! of an existing one. The log field is always updated with
//! [`FieldUpdate::ArrayUnion`], which appends only values not already present,
//! so a retried or duplicated commit never corrupts the remote log.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RemoteError;

/// Opaque handle of a remote document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(String);

impl DocId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Update applied to one field of a remote document
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    /// Overwrite the field
    Set(Value),
    /// Append each value not already present in the array field
    ArrayUnion(Vec<Value>),
}

/// Field-level patch for [`RemoteStore::update_document`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentPatch {
    fields: BTreeMap<String, FieldUpdate>,
}

impl DocumentPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite `field` with `value`
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields
            .insert(field.into(), FieldUpdate::Set(value.into()));
        self
    }

    /// Union-append `values` into the array `field`
    pub fn array_union(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.fields
            .insert(field.into(), FieldUpdate::ArrayUnion(values));
        self
    }

    /// Get the update for a field
    pub fn get(&self, field: &str) -> Option<&FieldUpdate> {
        self.fields.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldUpdate)> {
        self.fields.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Apply the patch to a document's fields
    ///
    /// `ArrayUnion` on a missing or non-array field replaces it with an
    /// array of the deduplicated values.
    pub fn apply_to(&self, document: &mut Map<String, Value>) {
        for (field, update) in &self.fields {
            match update {
                FieldUpdate::Set(value) => {
                    document.insert(field.clone(), value.clone());
                }
                FieldUpdate::ArrayUnion(values) => {
                    let entry = document
                        .entry(field.clone())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if !entry.is_array() {
                        *entry = Value::Array(Vec::new());
                    }
                    if let Value::Array(existing) = entry {
                        for value in values {
                            if !existing.contains(value) {
                                existing.push(value.clone());
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Client of the remote document store
///
/// Calls run to completion or failure; the logger applies no timeout or retry
/// of its own.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create a new document in `collection` and return its handle
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] if the store is unreachable or rejects the write.
    async fn create_document(
        &self,
        collection: &str,
        data: Map<String, Value>,
    ) -> Result<DocId, RemoteError>;

    /// Apply `patch` to an existing document
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::NotFound`] if the document does not exist, or
    /// another [`RemoteError`] if the store is unreachable or rejects the write.
    async fn update_document(
        &self,
        collection: &str,
        doc_id: &DocId,
        patch: DocumentPatch,
    ) -> Result<(), RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn _assert_object_safe(_: &dyn RemoteStore) {}

    #[test]
    fn test_array_union_skips_present_values() {
        let mut doc = json!({ "log": [{ "type": "init" }] })
            .as_object()
            .cloned()
            .unwrap();

        let patch = DocumentPatch::new().array_union(
            "log",
            vec![json!({ "type": "init" }), json!({ "type": "submit" })],
        );
        patch.apply_to(&mut doc);
        patch.apply_to(&mut doc);

        assert_eq!(doc["log"], json!([{ "type": "init" }, { "type": "submit" }]));
    }

    #[test]
    fn test_array_union_creates_missing_field() {
        let mut doc = Map::new();
        DocumentPatch::new()
            .array_union("log", vec![json!(1), json!(1), json!(2)])
            .apply_to(&mut doc);
        assert_eq!(doc["log"], json!([1, 2]));
    }

    #[test]
    fn test_set_overwrites() {
        let mut doc = json!({ "solutionCode": ["a"] }).as_object().cloned().unwrap();
        DocumentPatch::new()
            .set("solutionCode", json!(["b"]))
            .apply_to(&mut doc);
        assert_eq!(doc["solutionCode"], json!(["b"]));
    }

    #[test]
    fn test_doc_id_display() {
        let id = DocId::new("abc123");
        assert_eq!(id.to_string(), "abc123");
        assert_eq!(serde_json::to_value(&id).unwrap(), json!("abc123"));
    }
}
